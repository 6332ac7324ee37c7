//! Output lifecycle
//!
//! [`OutputManager`] creates, configures, starts and stops the streaming,
//! recording and replay buffer outputs. Settings are read from the basic
//! configuration on every start, so a start always reflects the current
//! configuration.

pub mod filename;
pub mod handle;
pub mod manager;
mod recording;
mod replay;
mod streaming;

use crate::config::{section, ConfigAccessor};

pub use handle::{Output, OutputKind};
pub use manager::{ModeState, OutputManager};

/// `Output.Mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Simple,
    Advanced,
}

impl OutputMode {
    pub fn from_config(config: &dyn ConfigAccessor) -> Self {
        match config.get_string(section::OUTPUT, "Mode").as_deref() {
            Some("Advanced") => Self::Advanced,
            _ => Self::Simple,
        }
    }
}

/// Simple-mode recording quality sharing the streaming encoders
pub const QUALITY_STREAM: &str = "Stream";

/// Simple-mode recording quality using the lossless FFmpeg preset
pub const QUALITY_LOSSLESS: &str = "Lossless";

/// Advanced-mode recording type writing through a custom FFmpeg output
pub const REC_TYPE_FFMPEG: &str = "Custom Output (FFmpeg)";

#[cfg(test)]
pub(crate) mod testing {
    use super::OutputManager;
    use crate::config::{apply_basic_defaults, section, ConfigAccessor, ConfigPaths, JsonConfig};
    use crate::engine::{MediaEngine, SimulatedEngine};
    use crate::service::StreamService;
    use crate::signals::SignalRelay;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    pub(crate) struct Fixture {
        pub engine: Arc<SimulatedEngine>,
        pub relay: Arc<SignalRelay>,
        pub manager: OutputManager,
        pub config: JsonConfig,
        pub dir: TempDir,
    }

    /// Manager over a simulated engine, defaults applied and recording
    /// paths pointing into a temp dir
    pub(crate) fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let engine = Arc::new(SimulatedEngine::new());
        let dyn_engine: Arc<dyn MediaEngine> = engine.clone();
        let paths = ConfigPaths::from_dir(dir.path());
        let relay = Arc::new(SignalRelay::new());
        let service = StreamService::load_or_create(&dyn_engine, &paths.service).unwrap();
        let manager = OutputManager::new(dyn_engine, relay.clone(), paths, service);

        let mut config = JsonConfig::in_memory();
        apply_basic_defaults(&mut config);
        let videos = dir.path().join("videos");
        config.set_string(section::SIMPLE_OUTPUT, "FilePath", videos.to_str().unwrap());
        config.set_string(section::ADV_OUT, "RecFilePath", videos.to_str().unwrap());

        Fixture {
            engine,
            relay,
            manager,
            config,
            dir,
        }
    }

    pub(crate) fn drain_all(relay: &SignalRelay) -> Vec<(String, String)> {
        std::iter::from_fn(|| relay.drain())
            .map(|s| (s.output_type, s.signal))
            .collect()
    }
}
