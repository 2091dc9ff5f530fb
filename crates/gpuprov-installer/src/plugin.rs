//! Spark acceleration plugin installation
//!
//! The plugin and its ML-library companions are plain jars dropped onto
//! the Spark classpath.

use gpuprov_core::{ProvisionResult, RetryPolicy, VersionSet};
use gpuprov_exec::{fetch_with_retries, url_file_name, Fetcher};
use std::path::Path;
use tracing::info;

const MAVEN_BASE: &str = "https://repo1.maven.org/maven2";

/// Jars the accelerated runtime needs on the Spark classpath
pub fn plugin_jar_urls(versions: &VersionSet) -> Vec<String> {
    vec![
        format!(
            "{}/com/nvidia/rapids-4-spark_2.12/{}/rapids-4-spark_2.12-{}.jar",
            MAVEN_BASE, versions.plugin, versions.plugin
        ),
        format!(
            "{}/ml/dmlc/xgboost4j-gpu_2.12/{}/xgboost4j-gpu_2.12-{}.jar",
            MAVEN_BASE, versions.ml_library, versions.ml_library
        ),
        format!(
            "{}/ml/dmlc/xgboost4j-spark-gpu_2.12/{}/xgboost4j-spark-gpu_2.12-{}.jar",
            MAVEN_BASE, versions.ml_library, versions.ml_library
        ),
    ]
}

/// Install the acceleration plugin jars
pub async fn install_spark_plugin(
    fetcher: &dyn Fetcher,
    retry: &RetryPolicy,
    versions: &VersionSet,
    jars_dir: &Path,
) -> ProvisionResult<()> {
    info!(plugin = %versions.plugin, ml_library = %versions.ml_library, "Installing acceleration plugin");
    std::fs::create_dir_all(jars_dir)?;
    for url in plugin_jar_urls(versions) {
        let dest = jars_dir.join(url_file_name(&url));
        fetch_with_retries(fetcher, retry, &url, &dest).await?;
    }
    Ok(())
}
