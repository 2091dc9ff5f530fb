//! Hadoop-style XML property files
//!
//! The scheduler's configuration store is a set of flat XML documents of
//! `<property><name/><value/></property>` blocks. Writes clobber: setting
//! a property removes any existing block of the same name and appends a
//! fresh one, so repeated runs produce identical bytes.

use gpuprov_core::{ProvisionError, ProvisionResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

const EMPTY_CONFIGURATION: &str = "<?xml version=\"1.0\"?>\n<configuration>\n</configuration>\n";

/// One XML configuration document
pub struct PropertyFile {
    path: PathBuf,
}

impl PropertyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty configuration document if the file is absent
    pub fn ensure_exists(&self) -> ProvisionResult<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, EMPTY_CONFIGURATION)?;
        Ok(())
    }

    /// Set a property, replacing any existing value
    pub fn set_property(&self, name: &str, value: &str) -> ProvisionResult<()> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => EMPTY_CONFIGURATION.to_string(),
            Err(e) => return Err(e.into()),
        };

        let cleaned = remove_property(&content, name);
        let close = cleaned.rfind("</configuration>").ok_or_else(|| {
            ProvisionError::Config(format!(
                "{} is not a configuration document",
                self.path.display()
            ))
        })?;

        let block = format!(
            "  <property>\n    <name>{}</name>\n    <value>{}</value>\n  </property>\n",
            name, value
        );
        let mut updated = String::with_capacity(cleaned.len() + block.len());
        updated.push_str(&cleaned[..close]);
        updated.push_str(&block);
        updated.push_str(&cleaned[close..]);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, updated)?;
        debug!(file = %self.path.display(), name, value, "Set property");
        Ok(())
    }

    /// Read a property value back, if present
    pub fn get_property(&self, name: &str) -> ProvisionResult<Option<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let re = Regex::new(&format!(
            r"(?s)<name>{}</name>\s*<value>(.*?)</value>",
            regex::escape(name)
        ))
        .expect("property regex");
        Ok(re.captures(&content).map(|caps| caps[1].to_string()))
    }
}

fn remove_property(content: &str, name: &str) -> String {
    let re = Regex::new(&format!(
        r"(?s)[ \t]*<property>\s*<name>{}</name>.*?</property>\n?",
        regex::escape(name)
    ))
    .expect("property regex");
    re.replace_all(content, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_in(dir: &tempfile::TempDir, name: &str) -> PropertyFile {
        PropertyFile::new(dir.path().join(name))
    }

    #[test]
    fn test_ensure_exists_creates_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir, "resource-types.xml");
        file.ensure_exists().unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, EMPTY_CONFIGURATION);

        // A second call leaves the file alone
        file.set_property("a", "1").unwrap();
        file.ensure_exists().unwrap();
        assert_eq!(file.get_property("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_set_and_get_property() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir, "yarn-site.xml");
        file.set_property("yarn.resource-types", "yarn.io/gpu").unwrap();
        assert_eq!(
            file.get_property("yarn.resource-types").unwrap().as_deref(),
            Some("yarn.io/gpu")
        );
        assert_eq!(file.get_property("absent").unwrap(), None);
    }

    #[test]
    fn test_set_property_clobbers_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir, "yarn-site.xml");
        file.set_property("key", "old").unwrap();
        file.set_property("key", "new").unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(!content.contains("old"));
        assert_eq!(content.matches("<name>key</name>").count(), 1);
        assert_eq!(file.get_property("key").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_repeated_writes_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir, "capacity-scheduler.xml");
        file.set_property("calc", "dominant").unwrap();
        file.set_property("other", "x").unwrap();
        let once = std::fs::read_to_string(file.path()).unwrap();

        file.set_property("calc", "dominant").unwrap();
        file.set_property("other", "x").unwrap();
        let twice = std::fs::read_to_string(file.path()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_multiple_properties_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let file = file_in(&dir, "yarn-site.xml");
        file.set_property("a", "1").unwrap();
        file.set_property("b", "2").unwrap();
        assert_eq!(file.get_property("a").unwrap().as_deref(), Some("1"));
        assert_eq!(file.get_property("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_rejects_non_configuration_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.xml");
        std::fs::write(&path, "not xml at all").unwrap();
        let err = PropertyFile::new(path).set_property("a", "1").unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }
}
