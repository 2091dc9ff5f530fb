//! Pre-flight kernel upgrade for RPM-family nodes
//!
//! Driver modules must build against the kernel the node will actually be
//! running. When the repositories carry a newer kernel than the one booted,
//! the node installs it and reboots; the procedure restarts from scratch
//! under the new kernel. Breadcrumbs (patched startup scripts, archived
//! log) keep the next boot from looping back into the upgrade.

use gpuprov_core::{OsFamily, PathsConfig, PlatformIdentity, ProvisionResult, RetryPolicy};
use gpuprov_exec::{run_checked_with_retries, CommandRunner};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Line inserted into startup scripts so the next boot skips provisioning
const EARLY_EXIT_LINE: &str = "exit 0";

/// Pre-flight kernel reconciliation
pub struct KernelUpgrader {
    runner: Arc<dyn CommandRunner>,
    retry: RetryPolicy,
}

impl KernelUpgrader {
    pub fn new(runner: Arc<dyn CommandRunner>, retry: RetryPolicy) -> Self {
        Self { runner, retry }
    }

    /// Run the pre-flight check; returns true when a reboot was issued and
    /// the remainder of the procedure must not run in this process
    pub async fn preflight(
        &self,
        platform: &PlatformIdentity,
        paths: &PathsConfig,
    ) -> ProvisionResult<bool> {
        if platform.family != OsFamily::Rocky {
            return Ok(false);
        }

        let running = self
            .runner
            .run_checked("uname", &["-r"])
            .await?
            .stdout
            .trim()
            .to_string();
        let latest = self.latest_available_kernel().await?;

        if latest.is_empty() || latest == running {
            debug!(kernel = %running, "Running kernel is current");
            // A previous run may have died mid-transaction; clean that up
            // before the installers touch the package manager.
            let _ = self
                .runner
                .run("yum-complete-transaction", &["--cleanup-only"])
                .await;
            return Ok(false);
        }

        info!(running = %running, latest = %latest, "Upgrading kernel before driver installation");
        run_checked_with_retries(
            self.runner.as_ref(),
            &self.retry,
            "dnf",
            &["-y", "upgrade", "kernel"],
        )
        .await?;

        for script in &paths.startup_scripts {
            patch_exit_early(script)?;
        }
        archive_log(&paths.init_log)?;

        info!("Rebooting into the upgraded kernel");
        self.runner.run_checked("systemctl", &["reboot"]).await?;
        Ok(true)
    }

    async fn latest_available_kernel(&self) -> ProvisionResult<String> {
        let output = self
            .runner
            .run_checked(
                "dnf",
                &[
                    "repoquery",
                    "--latest-limit",
                    "1",
                    "--queryformat",
                    "%{VERSION}-%{RELEASE}.%{ARCH}",
                    "kernel",
                ],
            )
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}

/// Insert an early exit after the shebang so a boot-time re-run of the
/// script does nothing
pub fn patch_exit_early(script: &Path) -> ProvisionResult<()> {
    let content = match std::fs::read_to_string(script) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(script = %script.display(), "Startup script missing; nothing to patch");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut lines: Vec<&str> = content.lines().collect();
    if lines.get(1).copied() == Some(EARLY_EXIT_LINE) {
        return Ok(());
    }
    let insert_at = if lines.first().is_some_and(|l| l.starts_with("#!")) {
        1
    } else {
        0
    };
    lines.insert(insert_at, EARLY_EXIT_LINE);
    std::fs::write(script, lines.join("\n") + "\n")?;
    Ok(())
}

/// Move the initialization log aside so the post-reboot run starts fresh
pub fn archive_log(log: &Path) -> ProvisionResult<()> {
    if !log.exists() {
        return Ok(());
    }
    let mut archived = log.as_os_str().to_owned();
    archived.push(".old");
    std::fs::rename(log, Path::new(&archived))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gpuprov_exec::CommandOutput;
    use std::sync::Mutex;

    /// Scripted node: fixed running kernel, fixed repository kernel
    struct KernelNode {
        running: &'static str,
        latest: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl KernelNode {
        fn new(running: &'static str, latest: &'static str) -> Self {
            Self {
                running,
                latest,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for KernelNode {
        async fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program, args.join(" ")).trim_end().to_string());
            let stdout = match program {
                "uname" => self.running,
                "dnf" if args.first() == Some(&"repoquery") => self.latest,
                _ => "",
            };
            Ok(CommandOutput::ok(stdout))
        }
    }

    fn rocky() -> PlatformIdentity {
        PlatformIdentity {
            family: OsFamily::Rocky,
            release: "9".to_string(),
        }
    }

    fn scratch_paths(dir: &std::path::Path) -> PathsConfig {
        let mut paths = PathsConfig::default();
        paths.init_log = dir.join("provision.log");
        paths.startup_scripts = vec![dir.join("startup.sh")];
        paths
    }

    #[tokio::test]
    async fn test_non_rpm_family_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(KernelNode::new("6.1.0-18-amd64", "ignored"));
        let upgrader = KernelUpgrader::new(runner.clone(), RetryPolicy::default());
        let platform = PlatformIdentity {
            family: OsFamily::Debian,
            release: "12".to_string(),
        };

        let rebooted = upgrader
            .preflight(&platform, &scratch_paths(dir.path()))
            .await
            .unwrap();

        assert!(!rebooted);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_current_kernel_reconciles_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = "5.14.0-362.el9.x86_64";
        let runner = Arc::new(KernelNode::new(kernel, kernel));
        let upgrader = KernelUpgrader::new(runner.clone(), RetryPolicy::default());

        let rebooted = upgrader
            .preflight(&rocky(), &scratch_paths(dir.path()))
            .await
            .unwrap();

        assert!(!rebooted);
        let calls = runner.calls();
        assert!(calls
            .iter()
            .any(|c| c == "yum-complete-transaction --cleanup-only"));
        assert!(!calls.iter().any(|c| c.contains("reboot")));
    }

    #[tokio::test]
    async fn test_stale_kernel_upgrades_and_reboots() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("startup.sh");
        std::fs::write(&script, "#!/bin/bash\necho provisioning\n").unwrap();
        std::fs::write(dir.path().join("provision.log"), "partial log").unwrap();

        let runner = Arc::new(KernelNode::new(
            "5.14.0-362.el9.x86_64",
            "5.14.0-425.el9.x86_64",
        ));
        let upgrader = KernelUpgrader::new(
            runner.clone(),
            RetryPolicy {
                max_attempts: 1,
                delay_secs: 0,
            },
        );

        let rebooted = upgrader
            .preflight(&rocky(), &scratch_paths(dir.path()))
            .await
            .unwrap();

        assert!(rebooted);
        let calls = runner.calls();
        assert!(calls.iter().any(|c| c == "dnf -y upgrade kernel"));
        assert_eq!(calls.last().unwrap(), "systemctl reboot");
        // Breadcrumbs: patched startup script and archived log
        let patched = std::fs::read_to_string(&script).unwrap();
        assert!(patched.starts_with("#!/bin/bash\nexit 0\n"));
        assert!(!dir.path().join("provision.log").exists());
        assert!(dir.path().join("provision.log.old").exists());
    }

    #[test]
    fn test_patch_inserts_after_shebang() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("startup.sh");
        std::fs::write(&script, "#!/bin/bash\necho provisioning\n").unwrap();

        patch_exit_early(&script).unwrap();

        let patched = std::fs::read_to_string(&script).unwrap();
        assert_eq!(patched, "#!/bin/bash\nexit 0\necho provisioning\n");
    }

    #[test]
    fn test_patch_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("startup.sh");
        std::fs::write(&script, "#!/bin/bash\necho provisioning\n").unwrap();

        patch_exit_early(&script).unwrap();
        let once = std::fs::read_to_string(&script).unwrap();
        patch_exit_early(&script).unwrap();
        let twice = std::fs::read_to_string(&script).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_patch_missing_script_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        patch_exit_early(&dir.path().join("missing.sh")).unwrap();
    }

    #[test]
    fn test_archive_log_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("provision.log");
        std::fs::write(&log, "log text").unwrap();

        archive_log(&log).unwrap();

        assert!(!log.exists());
        let archived = dir.path().join("provision.log.old");
        assert_eq!(std::fs::read_to_string(archived).unwrap(), "log text");
    }

    #[test]
    fn test_archive_missing_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        archive_log(&dir.path().join("missing.log")).unwrap();
    }
}
