//! Bridge session
//!
//! One [`Session`] owns everything a connected caller drives: the basic
//! configuration, the streaming service and the output manager with its
//! encoders. Dropping the session releases every engine object it created.

use crate::config::{apply_basic_defaults, ConfigAccessor, ConfigPaths, JsonConfig};
use crate::engine::MediaEngine;
use crate::output::OutputManager;
use crate::service::StreamService;
use crate::signals::SignalRelay;
use crate::utils::BridgeResult;
use crate::video;
use std::path::Path;
use std::sync::Arc;

pub struct Session {
    // Drops before the configuration so engine objects go first
    manager: OutputManager,
    config: Box<dyn ConfigAccessor>,
    paths: ConfigPaths,
    engine: Arc<dyn MediaEngine>,
}

impl Session {
    /// Session over an existing configuration
    ///
    /// Defaults are applied to `config` and the streaming service is loaded
    /// (or created) from `paths.service`.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        mut config: Box<dyn ConfigAccessor>,
        paths: ConfigPaths,
        relay: Arc<SignalRelay>,
    ) -> BridgeResult<Self> {
        apply_basic_defaults(config.as_mut());

        let service = StreamService::load_or_create(&engine, &paths.service)?;
        let manager = OutputManager::new(engine.clone(), relay, paths.clone(), service);

        Ok(Self {
            manager,
            config,
            paths,
            engine,
        })
    }

    /// Session over the configuration files in `dir`
    pub fn open(
        engine: Arc<dyn MediaEngine>,
        dir: &Path,
        relay: Arc<SignalRelay>,
    ) -> BridgeResult<Self> {
        let paths = ConfigPaths::from_dir(dir);
        let config = JsonConfig::open(&paths.basic)?;
        tracing::info!("Opened configuration in {:?}", dir);
        Self::new(engine, Box::new(config), paths, relay)
    }

    pub fn config(&self) -> &dyn ConfigAccessor {
        self.config.as_ref()
    }

    pub fn config_mut(&mut self) -> &mut dyn ConfigAccessor {
        self.config.as_mut()
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn manager(&self) -> &OutputManager {
        &self.manager
    }

    pub fn reset_audio_context(&mut self, reload: bool) -> BridgeResult<bool> {
        video::reset_audio_context(self.engine.as_ref(), self.config.as_mut(), reload)
    }

    pub fn reset_video_context(&mut self, reload: bool) -> BridgeResult<i32> {
        video::reset_video_context(self.engine.as_ref(), self.config.as_mut(), reload)
    }

    pub fn start_streaming(&mut self) -> BridgeResult<()> {
        self.manager.start_streaming(self.config.as_mut())
    }

    pub fn start_recording(&mut self) -> BridgeResult<()> {
        self.manager.start_recording(self.config.as_mut())
    }

    pub fn start_replay_buffer(&mut self) -> BridgeResult<()> {
        self.manager.start_replay_buffer(self.config.as_mut())
    }

    pub fn stop_streaming(&mut self, force: bool) {
        self.manager.stop_streaming(force);
    }

    pub fn stop_recording(&mut self) {
        self.manager.stop_recording();
    }

    pub fn stop_replay_buffer(&mut self, force: bool) {
        self.manager.stop_replay_buffer(force);
    }

    pub fn connect_output_signals(&self) -> usize {
        self.manager.connect_output_signals()
    }

    pub fn process_replay_buffer_hotkey(&self) -> usize {
        self.manager.process_replay_buffer_hotkey()
    }

    pub fn last_replay(&self) -> String {
        self.manager.last_replay()
    }

    /// Persist the streaming service record
    pub fn save_service(&self) -> BridgeResult<()> {
        self.manager.service().save(&self.paths.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::section;
    use crate::engine::SimulatedEngine;
    use tempfile::tempdir;

    #[test]
    fn test_open_applies_defaults_and_writes_service() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(SimulatedEngine::new());

        let session = Session::open(engine, dir.path(), Arc::new(SignalRelay::new())).unwrap();

        assert_eq!(
            session.config().get_string(section::OUTPUT, "Mode").as_deref(),
            Some("Simple")
        );
        assert!(!session.config().has_user_value(section::OUTPUT, "Mode"));
        assert!(session.paths().service.exists());
    }

    #[test]
    fn test_video_reset_persists_resolution() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(SimulatedEngine::new());
        engine.set_resolutions(vec![(2560, 1440), (1920, 1080)]);

        let mut session =
            Session::open(engine.clone(), dir.path(), Arc::new(SignalRelay::new())).unwrap();
        assert_eq!(session.reset_video_context(false).unwrap(), 0);
        assert!(session.reset_audio_context(false).unwrap());

        let reopened = JsonConfig::open(&session.paths().basic).unwrap();
        assert_eq!(reopened.get_uint(section::VIDEO, "BaseCX"), 2560);
        assert_eq!(reopened.get_uint(section::VIDEO, "OutputCX"), 1280);
        assert_eq!(engine.last_audio_reset().unwrap().samples_per_sec, 44100);
    }

    #[test]
    fn test_drop_releases_engine_objects() {
        let dir = tempdir().unwrap();
        let engine = Arc::new(SimulatedEngine::new());
        let mut session =
            Session::open(engine.clone(), dir.path(), Arc::new(SignalRelay::new())).unwrap();
        session
            .config_mut()
            .set_string(section::SIMPLE_OUTPUT, "FilePath", dir.path().to_str().unwrap());

        session.start_streaming().unwrap();
        session.start_recording().unwrap();
        drop(session);

        assert_eq!(engine.live_outputs(), 0);
        assert_eq!(engine.live_encoders(), 0);
    }
}
