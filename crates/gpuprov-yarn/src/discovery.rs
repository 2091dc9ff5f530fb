//! GPU discovery executable generation
//!
//! The scheduler invokes a discovery executable that prints a JSON object
//! naming the resource and its device addresses. On a partitioned
//! accelerator the address list is synthesized at generation time (one
//! address per partition); otherwise it is derived from the management
//! tool at run time.

use gpuprov_core::{AcceleratorTopology, ProvisionResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the generated discovery executable
pub const DISCOVERY_SCRIPT_NAME: &str = "get-gpu-resources.sh";

/// Render the discovery executable for this topology
pub fn discovery_script(topology: &AcceleratorTopology) -> String {
    if topology.partitioned {
        let addresses: Vec<String> = (0..topology.partition_count)
            .map(|i| format!("\"{}\"", i))
            .collect();
        format!(
            "#!/usr/bin/env bash\necho '{{\"name\": \"gpu\", \"addresses\": [{}]}}'\n",
            addresses.join(",")
        )
    } else {
        concat!(
            "#!/usr/bin/env bash\n",
            r#"ADDRS=$(nvidia-smi --query-gpu=index --format=csv,noheader | sed -e ':a;N;$!ba;s/\n/","/g')"#,
            "\n",
            r#"echo {\"name\": \"gpu\", \"addresses\": [\"$ADDRS\"]}"#,
            "\n"
        )
        .to_string()
    }
}

/// Write the discovery executable into the bundle directory
pub fn write_discovery_script(
    dir: &Path,
    topology: &AcceleratorTopology,
) -> ProvisionResult<PathBuf> {
    let path = dir.join(DISCOVERY_SCRIPT_NAME);
    info!(path = %path.display(), partitioned = topology.partitioned, "Writing discovery executable");

    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, discovery_script(topology))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_partitioned_script_emits_fixed_shape() {
        let topology =
            AcceleratorTopology::partitioned(2, Some(508), PathBuf::from("/usr/local/yarn-gpu"));
        let script = discovery_script(&topology);

        // The synthesized payload must be exactly the contract shape
        let json_line = script
            .lines()
            .find(|line| line.starts_with("echo '"))
            .unwrap();
        let payload = json_line
            .trim_start_matches("echo '")
            .trim_end_matches('\'');
        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value["name"], "gpu");
        assert_eq!(value["addresses"], serde_json::json!(["0", "1"]));
    }

    #[test]
    fn test_standard_script_queries_management_tool() {
        let script = discovery_script(&AcceleratorTopology::standard());
        assert!(script.starts_with("#!/usr/bin/env bash\n"));
        assert!(script.contains("nvidia-smi --query-gpu=index"));
        assert!(script.contains(r#"\"addresses\""#));
    }

    #[test]
    fn test_write_makes_executable() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_discovery_script(dir.path(), &AcceleratorTopology::standard()).unwrap();
        assert!(path.ends_with(DISCOVERY_SCRIPT_NAME));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
