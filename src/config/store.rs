//! JSON-backed configuration store

use super::ConfigAccessor;
use crate::utils::fs::{read_json_safe, save_json_safe};
use crate::utils::{BridgeError, BridgeResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

type Sections = BTreeMap<String, BTreeMap<String, Value>>;

/// Sectioned configuration persisted as a JSON object of objects
#[derive(Debug, Default)]
pub struct JsonConfig {
    path: Option<PathBuf>,
    user: Sections,
    defaults: Sections,
}

impl JsonConfig {
    /// Configuration that lives only in memory; `save` is a no-op
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the file at `path`; a missing file starts empty
    pub fn open(path: &Path) -> BridgeResult<Self> {
        let mut config = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        config.reload()?;
        Ok(config)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn parse_sections(value: Value) -> BridgeResult<Sections> {
        let Value::Object(root) = value else {
            return Err(BridgeError::Config(
                "configuration root must be an object".to_string(),
            ));
        };

        let mut sections = Sections::new();
        for (name, section) in root {
            match section {
                Value::Object(entries) => {
                    sections.insert(name, entries.into_iter().collect());
                }
                other => {
                    tracing::warn!("Ignoring non-object config section {}: {}", name, other);
                }
            }
        }
        Ok(sections)
    }

    fn to_value(&self) -> Value {
        let root: Map<String, Value> = self
            .user
            .iter()
            .map(|(name, entries)| {
                let section: Map<String, Value> = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                (name.clone(), Value::Object(section))
            })
            .collect();
        Value::Object(root)
    }
}

impl ConfigAccessor for JsonConfig {
    fn get(&self, section: &str, key: &str) -> Option<Value> {
        self.user
            .get(section)
            .and_then(|s| s.get(key))
            .or_else(|| self.defaults.get(section).and_then(|s| s.get(key)))
            .cloned()
    }

    fn set(&mut self, section: &str, key: &str, value: Value) {
        self.user
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn set_default(&mut self, section: &str, key: &str, value: Value) {
        self.defaults
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    fn has_user_value(&self, section: &str, key: &str) -> bool {
        self.user
            .get(section)
            .map(|s| s.contains_key(key))
            .unwrap_or(false)
    }

    fn remove_value(&mut self, section: &str, key: &str) -> bool {
        self.user
            .get_mut(section)
            .map(|s| s.remove(key).is_some())
            .unwrap_or(false)
    }

    fn save(&self) -> BridgeResult<()> {
        match &self.path {
            Some(path) => save_json_safe(path, &self.to_value()),
            None => Ok(()),
        }
    }

    fn reload(&mut self) -> BridgeResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        self.user = match read_json_safe(path) {
            Some(value) => Self::parse_sections(value)?,
            None => {
                if path.exists() {
                    tracing::warn!("Unreadable config {:?}, starting empty", path);
                }
                Sections::new()
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::section;
    use tempfile::tempdir;

    #[test]
    fn test_user_value_overrides_default() {
        let mut config = JsonConfig::in_memory();
        config.set_default(section::SIMPLE_OUTPUT, "VBitrate", Value::from(2500));
        assert_eq!(config.get_uint(section::SIMPLE_OUTPUT, "VBitrate"), 2500);
        assert!(!config.has_user_value(section::SIMPLE_OUTPUT, "VBitrate"));

        config.set_uint(section::SIMPLE_OUTPUT, "VBitrate", 6000);
        assert_eq!(config.get_uint(section::SIMPLE_OUTPUT, "VBitrate"), 6000);
        assert!(config.has_user_value(section::SIMPLE_OUTPUT, "VBitrate"));

        assert!(config.remove_value(section::SIMPLE_OUTPUT, "VBitrate"));
        assert_eq!(config.get_uint(section::SIMPLE_OUTPUT, "VBitrate"), 2500);
    }

    #[test]
    fn test_loose_typing() {
        let mut config = JsonConfig::in_memory();
        config.set_string(section::VIDEO, "OutputCX", "1280");
        config.set_int(section::OUTPUT, "Reconnect", 1);
        config.set_int(section::OUTPUT, "DelaySec", -5);

        assert_eq!(config.get_uint(section::VIDEO, "OutputCX"), 1280);
        assert!(config.get_bool(section::OUTPUT, "Reconnect"));
        assert_eq!(config.get_uint(section::OUTPUT, "DelaySec"), 0);
        assert_eq!(config.get_int(section::OUTPUT, "Missing"), 0);
        assert!(config.get_string(section::OUTPUT, "Missing").is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("basic.json");

        let mut config = JsonConfig::open(&path).unwrap();
        config.set_string(section::OUTPUT, "Mode", "Advanced");
        config.save().unwrap();

        let mut other = JsonConfig::open(&path).unwrap();
        assert_eq!(
            other.get_string(section::OUTPUT, "Mode").as_deref(),
            Some("Advanced")
        );

        config.set_string(section::OUTPUT, "Mode", "Simple");
        config.save().unwrap();
        other.reload().unwrap();
        assert_eq!(
            other.get_string(section::OUTPUT, "Mode").as_deref(),
            Some("Simple")
        );
    }
}
