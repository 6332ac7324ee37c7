//! Safe JSON file persistence
//!
//! Files are written to a `.tmp` sibling first, the previous version is kept
//! as `.bak`, then the temporary file is renamed into place.

use super::error::BridgeResult;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// Write `value` as pretty JSON to `path`, keeping a backup of the old file
pub fn save_json_safe(path: &Path, value: &Value) -> BridgeResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = sibling(path, "tmp");
    fs::write(&tmp_path, serde_json::to_string_pretty(value)?)?;

    if path.exists() {
        fs::copy(path, sibling(path, "bak"))?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Read a JSON file, falling back to its `.bak` copy when the main file is
/// missing or unreadable
pub fn read_json_safe(path: &Path) -> Option<Value> {
    let read = |p: &Path| -> Option<Value> {
        let content = fs::read_to_string(p).ok()?;
        serde_json::from_str(&content).ok()
    };

    read(path).or_else(|| {
        let backup = sibling(path, "bak");
        let value = read(&backup);
        if value.is_some() {
            tracing::warn!("Loaded {:?} from backup copy", path);
        }
        value
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_save_keeps_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("service.json");

        save_json_safe(&path, &json!({ "type": "first" })).unwrap();
        save_json_safe(&path, &json!({ "type": "second" })).unwrap();

        assert_eq!(read_json_safe(&path).unwrap()["type"], "second");
        let backup = fs::read_to_string(dir.path().join("service.json.bak")).unwrap();
        assert!(backup.contains("first"));
        assert!(!dir.path().join("service.json.tmp").exists());
    }

    #[test]
    fn test_read_falls_back_to_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("streamEncoder.json");
        fs::write(dir.path().join("streamEncoder.json.bak"), r#"{"bitrate": 6000}"#).unwrap();
        fs::write(&path, "not json").unwrap();

        assert_eq!(read_json_safe(&path).unwrap()["bitrate"], 6000);
        assert!(read_json_safe(&dir.path().join("missing.json")).is_none());
    }
}
