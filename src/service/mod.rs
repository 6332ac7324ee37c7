//! Streaming service
//!
//! The streaming destination is persisted as `{type, settings, hotkeys?}`.
//! Without a saved record a Twitch `rtmp_common` service is created and
//! written back.

use crate::engine::{EngineSettings, MediaEngine, ServiceId};
use crate::utils::fs::{read_json_safe, save_json_safe};
use crate::utils::BridgeResult;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_SERVICE_TYPE: &str = "rtmp_common";

const SERVICE_NAME: &str = "default_service";

/// Owned engine service, released on drop
pub struct StreamService {
    engine: Arc<dyn MediaEngine>,
    id: ServiceId,
    hotkeys: Option<Value>,
}

fn default_settings() -> EngineSettings {
    let mut settings = EngineSettings::new();
    settings.insert("streamType".to_string(), json!(DEFAULT_SERVICE_TYPE));
    settings.insert("service".to_string(), json!("Twitch"));
    settings.insert("show_all".to_string(), json!(false));
    settings.insert("server".to_string(), json!("auto"));
    settings.insert("key".to_string(), json!(""));
    settings
}

impl StreamService {
    /// Create the service from the record at `path`, or the default one
    ///
    /// The resulting record is saved back to `path`; a failed save is only
    /// logged.
    pub fn load_or_create(engine: &Arc<dyn MediaEngine>, path: &Path) -> BridgeResult<Self> {
        let record = if path.exists() {
            let record = read_json_safe(path);
            if record.is_none() {
                tracing::warn!("Unreadable service file {:?}, using defaults", path);
            }
            record
        } else {
            None
        };

        let service = match record {
            Some(data) => {
                let type_id = data
                    .get("type")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(DEFAULT_SERVICE_TYPE)
                    .to_string();
                let settings = data
                    .get("settings")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                let hotkeys = data.get("hotkeys").filter(|h| h.is_object()).cloned();

                let id = engine.create_service(&type_id, SERVICE_NAME, &settings, hotkeys.as_ref())?;
                tracing::info!("Loaded {} streaming service", type_id);
                Self {
                    engine: engine.clone(),
                    id,
                    hotkeys,
                }
            }
            None => {
                let id = engine.create_service(
                    DEFAULT_SERVICE_TYPE,
                    SERVICE_NAME,
                    &default_settings(),
                    None,
                )?;
                tracing::info!("Created default streaming service");
                Self {
                    engine: engine.clone(),
                    id,
                    hotkeys: None,
                }
            }
        };

        if let Err(e) = service.save(path) {
            tracing::warn!("Failed to save service {:?}: {}", path, e);
        }
        Ok(service)
    }

    /// Persist `{type, settings, hotkeys?}`
    pub fn save(&self, path: &Path) -> BridgeResult<()> {
        let mut record = json!({
            "type": self.type_id(),
            "settings": Value::Object(self.settings()),
        });
        if let Some(hotkeys) = &self.hotkeys {
            record["hotkeys"] = hotkeys.clone();
        }
        save_json_safe(path, &record)
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn type_id(&self) -> String {
        self.engine.service_type(self.id)
    }

    pub fn settings(&self) -> EngineSettings {
        self.engine.service_settings(self.id)
    }

    pub fn update(&self, settings: &EngineSettings) {
        self.engine.update_service(self.id, settings);
    }

    pub fn url(&self) -> Option<String> {
        self.engine.service_url(self.id)
    }

    /// Output type the service mandates, if any
    pub fn output_type(&self) -> Option<String> {
        self.engine.service_output_type(self.id)
    }

    pub fn apply_encoder_settings(&self, video: &mut EngineSettings, audio: &mut EngineSettings) {
        self.engine
            .service_apply_encoder_settings(self.id, video, audio);
    }

    /// Twitch with no server picks the closest ingest automatically
    pub fn ensure_twitch_server(&self) {
        let settings = self.settings();
        let is_twitch = settings.get("service").and_then(Value::as_str) == Some("Twitch");
        let has_server = self.url().map(|u| !u.is_empty()).unwrap_or(false);

        if is_twitch && !has_server {
            let mut update = EngineSettings::new();
            update.insert("server".to_string(), json!("auto"));
            self.update(&update);
        }
    }
}

impl Drop for StreamService {
    fn drop(&mut self) {
        self.engine.release_service(self.id);
    }
}
