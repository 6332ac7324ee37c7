//! Configuration access
//!
//! The bridge never defines the storage format of its settings; it reads and
//! writes known keys through [`ConfigAccessor`]. [`JsonConfig`] is the
//! file-backed implementation used by the binary and the tests.

pub mod defaults;
pub mod store;

use crate::utils::BridgeResult;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub use defaults::apply_basic_defaults;
pub use store::JsonConfig;

/// Section names of the basic configuration
pub mod section {
    pub const VIDEO: &str = "Video";
    pub const AUDIO: &str = "Audio";
    pub const OUTPUT: &str = "Output";
    pub const SIMPLE_OUTPUT: &str = "SimpleOutput";
    pub const ADV_OUT: &str = "AdvOut";
}

/// Read/write access to sectioned key-value configuration
///
/// Getters follow the engine's config conventions: a missing or mistyped
/// numeric value reads as 0, a missing boolean as `false`.
pub trait ConfigAccessor: Send {
    /// Effective value (user value, else default)
    fn get(&self, section: &str, key: &str) -> Option<Value>;

    /// Set a user value
    fn set(&mut self, section: &str, key: &str, value: Value);

    /// Set a default value, used when no user value exists
    fn set_default(&mut self, section: &str, key: &str, value: Value);

    /// Whether a user value (not just a default) exists
    fn has_user_value(&self, section: &str, key: &str) -> bool;

    /// Remove a user value; returns whether one existed
    fn remove_value(&mut self, section: &str, key: &str) -> bool;

    /// Persist user values
    fn save(&self) -> BridgeResult<()>;

    /// Re-read user values from the backing store
    fn reload(&mut self) -> BridgeResult<()>;

    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match self.get(section, key)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn get_int(&self, section: &str, key: &str) -> i64 {
        match self.get(section, key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Bool(b)) => b as i64,
            _ => 0,
        }
    }

    fn get_uint(&self, section: &str, key: &str) -> u64 {
        self.get_int(section, key).max(0) as u64
    }

    fn get_bool(&self, section: &str, key: &str) -> bool {
        match self.get(section, key) {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(Value::String(s)) => {
                s.eq_ignore_ascii_case("true") || s == "1"
            }
            _ => false,
        }
    }

    fn set_string(&mut self, section: &str, key: &str, value: &str) {
        self.set(section, key, Value::from(value));
    }

    fn set_int(&mut self, section: &str, key: &str, value: i64) {
        self.set(section, key, Value::from(value));
    }

    fn set_uint(&mut self, section: &str, key: &str, value: u64) {
        self.set(section, key, Value::from(value));
    }

    fn set_bool(&mut self, section: &str, key: &str, value: bool) {
        self.set(section, key, Value::from(value));
    }
}

/// Locations of the persisted files the bridge reads
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Basic configuration (sections Video, Audio, Output, ...)
    pub basic: PathBuf,
    /// Streaming service record `{type, settings}`
    pub service: PathBuf,
    /// Advanced-mode streaming encoder settings
    pub stream_encoder: PathBuf,
    /// Advanced-mode recording encoder settings
    pub record_encoder: PathBuf,
}

impl ConfigPaths {
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            basic: dir.join("basic.json"),
            service: dir.join("service.json"),
            stream_encoder: dir.join("streamEncoder.json"),
            record_encoder: dir.join("recordEncoder.json"),
        }
    }
}
