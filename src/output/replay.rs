//! Replay buffer settings

use super::filename::replay_buffer_format;
use super::manager::{filename_template, load_encoder_settings, OutputManager};
use super::{QUALITY_LOSSLESS, QUALITY_STREAM};
use crate::config::{section, ConfigAccessor};
use crate::encoder::rate_control::uses_bitrate;
use crate::engine::EngineSettings;
use crate::utils::{BridgeError, BridgeResult};
use serde_json::json;
use std::path::Path;

/// Settings shared by both modes' replay buffer configuration
struct ReplayTarget {
    directory: String,
    extension: String,
    no_space: bool,
    max_time_sec: u64,
    max_size_mb: u64,
}

impl ReplayTarget {
    fn to_settings(&self, config: &dyn ConfigAccessor) -> EngineSettings {
        let prefix = config
            .get_string(section::SIMPLE_OUTPUT, "RecRBPrefix")
            .unwrap_or_default();
        let suffix = config
            .get_string(section::SIMPLE_OUTPUT, "RecRBSuffix")
            .unwrap_or_default();

        let mut settings = EngineSettings::new();
        settings.insert("directory".to_string(), json!(self.directory));
        settings.insert(
            "format".to_string(),
            json!(replay_buffer_format(&prefix, &filename_template(config), &suffix)),
        );
        settings.insert("extension".to_string(), json!(self.extension));
        settings.insert("allow_spaces".to_string(), json!(!self.no_space));
        settings.insert("max_time_sec".to_string(), json!(self.max_time_sec));
        settings.insert("max_size_mb".to_string(), json!(self.max_size_mb));
        settings
    }
}

impl OutputManager {
    fn apply_replay_target(&self, config: &dyn ConfigAccessor, target: &ReplayTarget) {
        if let Some(output) = &self.replay_buffer {
            output.update(&target.to_settings(config));
        }
        tracing::info!(
            "Replay buffer in {} ({} s, {} MB)",
            target.directory,
            target.max_time_sec,
            target.max_size_mb
        );
    }

    /// Simple mode: replay buffer over the simple recording encoders
    pub(super) fn update_simple_replay_buffer(
        &mut self,
        config: &mut dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        let quality = config
            .get_string(section::SIMPLE_OUTPUT, "RecQuality")
            .unwrap_or_default();
        if quality == QUALITY_LOSSLESS {
            return Err(BridgeError::Config(
                "Replay buffer is unavailable with lossless recording quality".to_string(),
            ));
        }

        self.update_video_recording_encoder(config)?;

        let directory = config
            .get_string(section::SIMPLE_OUTPUT, "FilePath")
            .unwrap_or_default();
        if directory.trim().is_empty() {
            return Err(BridgeError::Config("Recording path is not set".to_string()));
        }
        std::fs::create_dir_all(&directory)?;

        let target = ReplayTarget {
            directory,
            extension: config
                .get_string(section::SIMPLE_OUTPUT, "RecFormat")
                .unwrap_or_else(|| "flv".to_string()),
            no_space: config.get_bool(section::SIMPLE_OUTPUT, "FileNameWithoutSpace"),
            max_time_sec: config.get_uint(section::SIMPLE_OUTPUT, "RecRBTime"),
            max_size_mb: if self.state.using_recording_preset {
                config.get_uint(section::SIMPLE_OUTPUT, "RecRBSize")
            } else {
                0
            },
        };
        self.apply_replay_target(config, &target);

        let use_streaming = quality == QUALITY_STREAM;
        if use_streaming {
            self.associate_streaming_context(config);
        } else {
            self.associate_recording_context(config);
        }
        self.bind_recording_encoders(config, use_streaming);
        Ok(())
    }

    /// Advanced mode: replay buffer in `AdvOut.RecFilePath`, which must
    /// already exist
    pub(super) fn update_advanced_replay_buffer(
        &mut self,
        config: &mut dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        self.state.ffmpeg_output = false;

        let directory = config
            .get_string(section::ADV_OUT, "RecFilePath")
            .unwrap_or_default();
        if directory.trim().is_empty() || !Path::new(&directory).is_dir() {
            return Err(BridgeError::Config(format!(
                "Replay buffer directory {:?} does not exist",
                directory
            )));
        }

        let label = config
            .get_string(section::ADV_OUT, "RecEncoder")
            .unwrap_or_default();
        let settings_path = if label.is_empty() || label == "none" {
            &self.paths.stream_encoder
        } else {
            &self.paths.record_encoder
        };
        let bitrate_driven = load_encoder_settings(settings_path)
            .map(|s| uses_bitrate(&s))
            .unwrap_or(false);

        let use_streaming = self.prepare_advanced_recording_encoders(config)?;

        let target = ReplayTarget {
            directory,
            extension: config
                .get_string(section::ADV_OUT, "RecFormat")
                .unwrap_or_else(|| "flv".to_string()),
            no_space: config.get_bool(section::ADV_OUT, "RecFileNameWithoutSpace"),
            max_time_sec: config.get_uint(section::ADV_OUT, "RecRBTime"),
            max_size_mb: if bitrate_driven {
                0
            } else {
                config.get_uint(section::ADV_OUT, "RecRBSize")
            },
        };
        self.apply_replay_target(config, &target);

        if use_streaming {
            self.associate_streaming_context(config);
        } else {
            self.associate_recording_context(config);
        }
        self.bind_recording_encoders(config, use_streaming);
        self.bind_track_mask(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{section, ConfigAccessor};
    use crate::output::testing::fixture;
    use crate::output::OutputKind;
    use crate::utils::BridgeError;

    #[test]
    fn test_simple_replay_buffer_settings() {
        let mut f = fixture();
        f.config.set_string(section::SIMPLE_OUTPUT, "RecQuality", "Small");
        f.config.set_uint(section::SIMPLE_OUTPUT, "RecRBTime", 30);
        f.config.set_uint(section::SIMPLE_OUTPUT, "RecRBSize", 256);
        f.config.set_string(section::SIMPLE_OUTPUT, "RecRBSuffix", "clip");
        f.config.set_string(section::OUTPUT, "FilenameFormatting", "%CCYY");

        f.manager.start_replay_buffer(&mut f.config).unwrap();

        let output = f.manager.output(OutputKind::ReplayBuffer).unwrap();
        assert_eq!(output.type_id(), "replay_buffer");
        let sim = f.engine.output(output.id()).unwrap();
        assert_eq!(sim.settings["format"], "Replay %CCYY clip");
        assert_eq!(sim.settings["max_time_sec"], 30);
        assert_eq!(sim.settings["max_size_mb"], 256);
        assert_eq!(sim.settings["allow_spaces"], true);
        assert_eq!(
            sim.video_encoder,
            f.manager.encoders().video_recording().map(|e| e.id())
        );
    }

    #[test]
    fn test_stream_quality_replay_has_no_size_limit() {
        let mut f = fixture();
        f.config.set_uint(section::SIMPLE_OUTPUT, "RecRBSize", 256);

        f.manager.start_replay_buffer(&mut f.config).unwrap();

        let id = f.manager.output(OutputKind::ReplayBuffer).unwrap().id();
        assert_eq!(f.engine.output(id).unwrap().settings["max_size_mb"], 0);
        assert!(f.manager.encoders().recording_shares_streaming());
    }

    #[test]
    fn test_lossless_replay_buffer_is_rejected() {
        let mut f = fixture();
        f.config.set_string(section::SIMPLE_OUTPUT, "RecQuality", "Lossless");

        let err = f.manager.start_replay_buffer(&mut f.config).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert!(!f.manager.is_active(OutputKind::ReplayBuffer));
    }

    #[test]
    fn test_advanced_replay_buffer_requires_directory() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");

        let err = f.manager.start_replay_buffer(&mut f.config).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert_eq!(f.engine.encoders_created(), 0);

        std::fs::create_dir_all(f.dir.path().join("videos")).unwrap();
        f.manager.start_replay_buffer(&mut f.config).unwrap();
        assert!(f.manager.is_active(OutputKind::ReplayBuffer));
    }

    #[test]
    fn test_advanced_replay_buffer_keeps_live_stream_encoder() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");
        std::fs::create_dir_all(f.dir.path().join("videos")).unwrap();
        f.manager.start_streaming(&mut f.config).unwrap();
        let stream_encoder = f.manager.encoders().video_streaming().unwrap().id();

        f.config.set_string(section::ADV_OUT, "Encoder", "obs_qsv11");
        f.manager.start_replay_buffer(&mut f.config).unwrap();

        assert!(f.engine.encoder(stream_encoder).is_some());
        assert_eq!(f.engine.encoders_released(), 0);
        let output = f.manager.output(OutputKind::ReplayBuffer).unwrap();
        assert_eq!(
            f.engine.output(output.id()).unwrap().video_encoder,
            Some(stream_encoder)
        );
    }

    #[test]
    fn test_advanced_bitrate_encoder_drops_size_limit() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");
        f.config.set_string(section::ADV_OUT, "RecEncoder", "obs_x264");
        f.config.set_uint(section::ADV_OUT, "RecRBSize", 512);
        std::fs::create_dir_all(f.dir.path().join("videos")).unwrap();
        std::fs::write(
            f.dir.path().join("recordEncoder.json"),
            r#"{"rate_control":"cbr","bitrate":6000}"#,
        )
        .unwrap();

        f.manager.start_replay_buffer(&mut f.config).unwrap();

        let output = f.manager.output(OutputKind::ReplayBuffer).unwrap();
        let sim = f.engine.output(output.id()).unwrap();
        assert_eq!(sim.settings["max_size_mb"], 0);
        assert_eq!(sim.audio_encoders.len(), 1);
        assert_eq!(
            sim.video_encoder,
            f.manager.encoders().video_recording().map(|e| e.id())
        );
    }
}
