//! Declarative background-unit registration

use gpuprov_core::ProvisionResult;
use gpuprov_exec::CommandRunner;
use std::path::Path;
use tracing::info;

/// Declarative description of a recurring background unit
#[derive(Debug, Clone)]
pub struct UnitSpec {
    /// Unit file name, e.g. "kernel-header-sync.service"
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Command the unit runs
    pub exec_start: String,
    /// Ordering dependency
    pub after: String,
    /// Whether the unit is a run-once (oneshot) unit
    pub oneshot: bool,
    /// Boot target that pulls the unit in
    pub wanted_by: String,
}

impl UnitSpec {
    /// A oneshot unit started at every boot
    pub fn boot_oneshot(name: &str, description: &str, exec_start: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            exec_start: exec_start.to_string(),
            after: "network-online.target".to_string(),
            oneshot: true,
            wanted_by: "multi-user.target".to_string(),
        }
    }

    /// Render the unit file text
    pub fn render(&self) -> String {
        let service_type = if self.oneshot { "oneshot" } else { "simple" };
        format!(
            "[Unit]\n\
             Description={}\n\
             After={}\n\
             \n\
             [Service]\n\
             Type={}\n\
             ExecStart={}\n\
             \n\
             [Install]\n\
             WantedBy={}\n",
            self.description, self.after, service_type, self.exec_start, self.wanted_by
        )
    }
}

/// Write a unit file and enable it for every boot
pub async fn register_unit(
    runner: &dyn CommandRunner,
    unit_dir: &Path,
    spec: &UnitSpec,
) -> ProvisionResult<()> {
    let unit_path = unit_dir.join(&spec.name);
    info!(unit = %spec.name, path = %unit_path.display(), "Registering unit");

    tokio::fs::create_dir_all(unit_dir).await?;
    tokio::fs::write(&unit_path, spec.render()).await?;

    runner.run_checked("systemctl", &["daemon-reload"]).await?;
    runner
        .run_checked("systemctl", &["enable", &spec.name])
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gpuprov_exec::CommandOutput;
    use std::sync::Mutex;

    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, program: &str, args: &[&str]) -> ProvisionResult<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program, args.join(" ")));
            Ok(CommandOutput::ok(""))
        }
    }

    #[test]
    fn test_render_oneshot_unit() {
        let spec = UnitSpec::boot_oneshot(
            "kernel-header-sync.service",
            "Reconcile kernel headers with the running kernel",
            "/usr/local/sbin/sync-kernel-headers",
        );
        let text = spec.render();
        assert!(text.contains("Description=Reconcile kernel headers with the running kernel"));
        assert!(text.contains("After=network-online.target"));
        assert!(text.contains("Type=oneshot"));
        assert!(text.contains("ExecStart=/usr/local/sbin/sync-kernel-headers"));
        assert!(text.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let spec = UnitSpec::boot_oneshot("a.service", "a", "/bin/true");
        assert_eq!(spec.render(), spec.render());
    }

    #[tokio::test]
    async fn test_register_writes_and_enables() {
        let dir = tempfile::tempdir().unwrap();
        let runner = RecordingRunner {
            calls: Mutex::new(Vec::new()),
        };
        let spec = UnitSpec::boot_oneshot("demo.service", "demo", "/bin/true");

        register_unit(&runner, dir.path(), &spec).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("demo.service")).unwrap();
        assert_eq!(written, spec.render());
        let calls = runner.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                "systemctl daemon-reload".to_string(),
                "systemctl enable demo.service".to_string(),
            ]
        );
    }
}
