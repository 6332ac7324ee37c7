//! Recording encoders and output settings

use super::manager::{load_encoder_settings, recording_path, rescale, OutputManager};
use super::{OutputKind, OutputMode, QUALITY_LOSSLESS, QUALITY_STREAM};
use crate::config::{section, ConfigAccessor};
use crate::encoder::rate_control::base_crf;
use crate::encoder::{
    calc_crf, recording_settings, AudioSlot, Encoder, VideoEncoderFamily, MAX_AUDIO_MIXES,
};
use crate::engine::EngineSettings;
use crate::utils::BridgeResult;
use serde_json::Value;
use std::sync::Arc;

/// AAC bitrate of the simple-mode dedicated recording encoder
const SIMPLE_RECORDING_AUDIO_BITRATE: u32 = 192;

/// Move a file path stored in `AdvOut.FFURL` over to `AdvOut.FFFilePath`
///
/// Only runs while `FFFilePath` has no user value and `FFURL` holds a path
/// (contains a separator but no `://` scheme). Returns whether it migrated.
pub fn migrate_ffmpeg_url(config: &mut dyn ConfigAccessor) -> bool {
    if config.has_user_value(section::ADV_OUT, "FFFilePath") {
        return false;
    }

    let url = config
        .get_string(section::ADV_OUT, "FFURL")
        .unwrap_or_default();
    if url.is_empty() || url.contains("://") || !(url.contains('/') || url.contains('\\')) {
        return false;
    }

    let normalized = url.replace('\\', "/");
    let Some(split) = normalized.rfind('/') else {
        return false;
    };
    let directory = &normalized[..split];
    let extension = normalized[split + 1..]
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default();

    config.set_string(section::ADV_OUT, "FFFilePath", directory);
    if !extension.is_empty() {
        config.set_string(section::ADV_OUT, "FFExtension", &extension);
    }
    config.set_bool(section::ADV_OUT, "FFOutputToFile", true);
    tracing::info!("Migrated FFmpeg output path {:?} to {:?}", url, directory);
    true
}

fn put(settings: &mut EngineSettings, key: &str, value: impl Into<Value>) {
    settings.insert(key.to_string(), value.into());
}

impl OutputManager {
    /// Configure the recording encoders and output for the current mode
    pub(super) fn update_record_settings(
        &mut self,
        config: &mut dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        let use_streaming = match OutputMode::from_config(config) {
            OutputMode::Simple => {
                let quality = config
                    .get_string(section::SIMPLE_OUTPUT, "RecQuality")
                    .unwrap_or_default();

                self.update_video_recording_encoder(config)?;
                if quality == QUALITY_LOSSLESS {
                    self.load_lossless_preset();
                    return self.update_recording_output(config);
                }
                self.update_recording_output(config)?;
                quality == QUALITY_STREAM
            }
            OutputMode::Advanced => {
                if Self::uses_custom_ffmpeg(config) {
                    self.state.ffmpeg_output = true;
                    return self.update_ffmpeg_output(config);
                }
                self.state.ffmpeg_output = false;

                let use_streaming = self.prepare_advanced_recording_encoders(config)?;
                self.update_advanced_recording_output(config)?;
                use_streaming
            }
        };

        if use_streaming {
            self.associate_streaming_context(config);
        } else {
            self.associate_recording_context(config);
        }
        self.bind_recording_encoders(config, use_streaming);
        Ok(())
    }

    /// Simple mode: pick the recording encoders for `SimpleOutput.RecQuality`
    ///
    /// `Stream` shares the streaming encoders, `Lossless` uses the FFmpeg
    /// preset, any other quality gets a dedicated constant-quality encoder.
    pub(super) fn update_video_recording_encoder(
        &mut self,
        config: &mut dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        let quality = config
            .get_string(section::SIMPLE_OUTPUT, "RecQuality")
            .unwrap_or_default();
        self.state.ffmpeg_output = false;

        if quality == QUALITY_STREAM {
            if !self.state.is_streaming {
                self.update_audio_streaming_encoder(config)?;
                self.update_video_streaming_encoder(config)?;
            }
            if !self.encoders.recording_shares_streaming() {
                self.encoders.share_streaming_for_recording()?;
            }
            self.state.using_recording_preset = false;
            return Ok(());
        }

        if quality == QUALITY_LOSSLESS {
            self.state.using_recording_preset = true;
            self.state.ffmpeg_output = true;
            return Ok(());
        }

        let family = VideoEncoderFamily::from_label(
            &config
                .get_string(section::SIMPLE_OUTPUT, "RecEncoder")
                .unwrap_or_default(),
        );
        self.state.low_cpu_x264 = family.is_low_cpu();

        let (encoder, _) = self.encoders.ensure_video_recording(family.engine_id())?;
        self.state.using_recording_preset = true;

        let (bitrate, type_id) = self.aac_for(SIMPLE_RECORDING_AUDIO_BITRATE)?;
        self.encoders
            .ensure_audio(AudioSlot::SimpleRecording, &type_id, bitrate, 0)?;

        let crf = calc_crf(
            base_crf(&quality),
            config.get_uint(section::VIDEO, "OutputCX"),
            config.get_uint(section::VIDEO, "OutputCY"),
            family.is_low_cpu(),
        );
        let icq_available = self
            .engine
            .encoder_rate_controls(encoder.type_id())
            .iter()
            .any(|rc| rc == "ICQ");

        tracing::debug!(
            "Recording encoder {} at crf {} ({} quality)",
            encoder.type_id(),
            crf,
            quality
        );
        encoder.update(&recording_settings(family, crf, icq_available));
        Ok(())
    }

    fn load_lossless_preset(&self) {
        let Some(output) = &self.recording else {
            return;
        };
        let mut settings = EngineSettings::new();
        put(&mut settings, "format_name", "avi");
        put(&mut settings, "video_encoder", "utvideo");
        put(&mut settings, "audio_encoder", "pcm_s16le");
        output.update(&settings);
    }

    /// Simple mode: target file of the recording output
    fn update_recording_output(&self, config: &dyn ConfigAccessor) -> BridgeResult<()> {
        let directory = config
            .get_string(section::SIMPLE_OUTPUT, "FilePath")
            .unwrap_or_default();
        let format = config
            .get_string(section::SIMPLE_OUTPUT, "RecFormat")
            .unwrap_or_else(|| "flv".to_string());
        let no_space = config.get_bool(section::SIMPLE_OUTPUT, "FileNameWithoutSpace");
        let extension = if self.state.ffmpeg_output { "avi" } else { &format };

        let path = recording_path(config, &directory, extension, no_space)?;

        let key = if self.state.ffmpeg_output { "url" } else { "path" };
        if let Some(output) = &self.recording {
            let mut settings = EngineSettings::new();
            put(&mut settings, key, path.as_str());
            output.update(&settings);
        }
        tracing::info!("Recording to {}", path);
        Ok(())
    }

    /// Advanced mode: recording video encoder (dedicated or shared) plus the
    /// track encoders; returns whether the streaming encoder is used
    pub(super) fn prepare_advanced_recording_encoders(
        &mut self,
        config: &dyn ConfigAccessor,
    ) -> BridgeResult<bool> {
        let label = config
            .get_string(section::ADV_OUT, "RecEncoder")
            .unwrap_or_default();
        let use_streaming = label.is_empty() || label == "none";

        if use_streaming {
            if self.is_active(OutputKind::Streaming) && self.encoders.video_streaming().is_some() {
                tracing::debug!("Streaming output active, recording reuses its encoder as is");
            } else {
                self.prepare_advanced_streaming_encoder(config)?;
            }
            self.encoders.share_streaming_for_recording()?;
        } else {
            let family = VideoEncoderFamily::from_label(&label);
            let (encoder, _) = self.encoders.ensure_video_recording(family.engine_id())?;
            if let Some(settings) = load_encoder_settings(&self.paths.record_encoder) {
                encoder.update(&settings);
            }
        }

        self.ensure_advanced_audio_tracks(config)?;
        Ok(use_streaming)
    }

    fn update_advanced_recording_output(&mut self, config: &dyn ConfigAccessor) -> BridgeResult<()> {
        let directory = config
            .get_string(section::ADV_OUT, "RecFilePath")
            .unwrap_or_default();
        let format = config
            .get_string(section::ADV_OUT, "RecFormat")
            .unwrap_or_else(|| "flv".to_string());
        let no_space = config.get_bool(section::ADV_OUT, "RecFileNameWithoutSpace");
        let muxer = config
            .get_string(section::ADV_OUT, "RecMuxerCustom")
            .unwrap_or_default();

        let path = recording_path(config, &directory, &format, no_space)?;
        self.bind_track_mask(config);

        if let Some(output) = &self.recording {
            let mut settings = EngineSettings::new();
            put(&mut settings, "path", path.as_str());
            put(&mut settings, "muxer_settings", muxer);
            output.update(&settings);
        }
        tracing::info!("Recording to {}", path);
        Ok(())
    }

    /// Bind the tracks selected by the `AdvOut.RecTracks` bitmask to
    /// consecutive audio indices of the inactive file outputs
    pub(super) fn bind_track_mask(&mut self, config: &dyn ConfigAccessor) {
        let mask = config.get_uint(section::ADV_OUT, "RecTracks");
        let tracks: Vec<Arc<Encoder>> = (0..MAX_AUDIO_MIXES)
            .filter(|i| mask & (1 << i) != 0)
            .filter_map(|i| self.encoders.audio_track(i))
            .collect();

        for output in [self.recording.as_mut(), self.replay_buffer.as_mut()]
            .into_iter()
            .flatten()
        {
            if output.is_active() {
                continue;
            }
            for (idx, track) in tracks.iter().enumerate() {
                output.set_audio_encoder(track, idx);
            }
        }
    }

    /// Custom FFmpeg recording output from the `AdvOut.FF*` keys
    fn update_ffmpeg_output(&self, config: &mut dyn ConfigAccessor) -> BridgeResult<()> {
        migrate_ffmpeg_url(config);

        let Some(output) = &self.recording else {
            return Ok(());
        };

        let url = if config.get_bool(section::ADV_OUT, "FFOutputToFile") {
            let directory = config
                .get_string(section::ADV_OUT, "FFFilePath")
                .unwrap_or_default();
            let extension = config
                .get_string(section::ADV_OUT, "FFExtension")
                .unwrap_or_default();
            let no_space = config.get_bool(section::ADV_OUT, "FFFileNameWithoutSpace");
            recording_path(config, &directory, &extension, no_space)?
        } else {
            config
                .get_string(section::ADV_OUT, "FFURL")
                .unwrap_or_default()
        };

        let text = |key: &str| config.get_string(section::ADV_OUT, key).unwrap_or_default();
        let int = |key: &str| config.get_int(section::ADV_OUT, key);

        let mut settings = EngineSettings::new();
        put(&mut settings, "url", url.as_str());
        put(&mut settings, "format_name", text("FFFormat"));
        put(&mut settings, "format_mime_type", text("FFFormatMimeType"));
        put(&mut settings, "muxer_settings", text("FFMCustom"));
        put(&mut settings, "gop_size", int("FFVGOPSize"));
        put(&mut settings, "video_bitrate", int("FFVBitrate"));
        put(&mut settings, "video_encoder", text("FFVEncoder"));
        put(&mut settings, "video_encoder_id", int("FFVEncoderId"));
        put(&mut settings, "video_settings", text("FFVCustom"));
        put(&mut settings, "audio_bitrate", int("FFABitrate"));
        put(&mut settings, "audio_encoder", text("FFAEncoder"));
        put(&mut settings, "audio_encoder_id", int("FFAEncoderId"));
        put(&mut settings, "audio_settings", text("FFACustom"));

        if let Some((width, height)) = rescale(config, section::ADV_OUT, "FFRescale", "FFRescaleRes")
            .filter(|(w, h)| *w > 0 && *h > 0)
        {
            put(&mut settings, "scale_width", width);
            put(&mut settings, "scale_height", height);
        }

        let track = config
            .get_uint(section::ADV_OUT, "FFAudioTrack")
            .clamp(1, MAX_AUDIO_MIXES as u64) as usize
            - 1;
        output.set_mixer(track);
        output.set_media();
        output.update(&settings);

        tracing::info!("Custom FFmpeg output to {}", url);
        Ok(())
    }

    /// Attach the recording encoders to the media pipelines
    pub(super) fn associate_recording_context(&self, config: &dyn ConfigAccessor) {
        let video = self.encoders.video_recording();

        match OutputMode::from_config(config) {
            OutputMode::Advanced => {
                if let Some(video) = &video {
                    if let Some((width, height)) =
                        rescale(config, section::ADV_OUT, "RecRescale", "RecRescaleRes")
                    {
                        video.set_scaled_size(width, height);
                    }
                }
                for idx in 0..MAX_AUDIO_MIXES {
                    if let Some(track) = self.encoders.audio_track(idx) {
                        track.attach_media();
                    }
                }
            }
            OutputMode::Simple => {
                if let Some(audio) = self.encoders.audio(AudioSlot::SimpleRecording) {
                    audio.attach_media();
                }
            }
        }

        if let Some(video) = video {
            video.attach_media();
        }
    }

    /// Bind video (and simple-mode audio) encoders to the inactive file
    /// outputs
    pub(super) fn bind_recording_encoders(&mut self, config: &dyn ConfigAccessor, use_streaming: bool) {
        let simple = OutputMode::from_config(config) == OutputMode::Simple;
        let (video, audio) = if use_streaming {
            (
                self.encoders.video_streaming(),
                self.encoders.audio(AudioSlot::SimpleStreaming),
            )
        } else {
            (
                self.encoders.video_recording(),
                self.encoders.audio(AudioSlot::SimpleRecording),
            )
        };

        for output in [self.recording.as_mut(), self.replay_buffer.as_mut()]
            .into_iter()
            .flatten()
        {
            if output.is_active() {
                continue;
            }
            if let Some(video) = &video {
                output.set_video_encoder(video);
            }
            if simple {
                if let Some(audio) = &audio {
                    output.set_audio_encoder(audio, 0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfig;
    use crate::output::testing::fixture;
    use crate::output::OutputKind;

    #[test]
    fn test_stream_quality_shares_streaming_encoder() {
        let mut f = fixture();
        f.manager.start_streaming(&mut f.config).unwrap();
        let created = f.engine.encoders_created();

        f.manager.start_recording(&mut f.config).unwrap();
        assert_eq!(f.engine.encoders_created(), created);
        assert!(f.manager.encoders().recording_shares_streaming());
        assert!(!f.manager.state().using_recording_preset);

        let recording = f.manager.output(OutputKind::Recording).unwrap();
        let streaming = f.manager.output(OutputKind::Streaming).unwrap();
        assert_eq!(
            recording.video_encoder().unwrap().id(),
            streaming.video_encoder().unwrap().id()
        );
        let path = f.engine.output(recording.id()).unwrap().settings["path"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(path.ends_with(".flv"));
        assert!(path.starts_with(f.dir.path().to_str().unwrap()));
    }

    #[test]
    fn test_switching_between_stream_and_dedicated_quality() {
        let mut f = fixture();
        f.manager.start_recording(&mut f.config).unwrap();
        f.manager.stop_recording();
        let shared = f.engine.encoders_created();

        f.config.set_string(section::SIMPLE_OUTPUT, "RecQuality", "Small");
        f.manager.start_recording(&mut f.config).unwrap();
        f.manager.stop_recording();
        // Dedicated video plus its AAC companion
        assert_eq!(f.engine.encoders_created(), shared + 2);
        assert!(f.manager.state().using_recording_preset);

        let video_id = f.manager.encoders().video_recording().unwrap().id();
        let settings = f.engine.encoder(video_id).unwrap().settings;
        assert_eq!(settings["rate_control"], "CRF");
        assert_eq!(settings["preset"], "veryfast");

        f.manager.start_recording(&mut f.config).unwrap();
        f.manager.stop_recording();
        assert_eq!(f.engine.encoders_created(), shared + 2);

        f.config.set_string(section::SIMPLE_OUTPUT, "RecQuality", "Stream");
        let released = f.engine.encoders_released();
        f.manager.start_recording(&mut f.config).unwrap();
        assert_eq!(f.engine.encoders_released(), released + 2);
        assert!(f.engine.encoder(video_id).is_none());
        assert!(f.manager.encoders().recording_shares_streaming());
    }

    #[test]
    fn test_recording_keeps_encoder_of_active_stream() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");
        f.config.set_string(section::ADV_OUT, "Encoder", "obs_x264");
        f.manager.start_streaming(&mut f.config).unwrap();
        let stream_encoder = f.manager.encoders().video_streaming().unwrap().id();

        f.config.set_string(section::ADV_OUT, "Encoder", "ffmpeg_nvenc");
        f.config.set_string(section::ADV_OUT, "RecEncoder", "none");
        f.manager.start_recording(&mut f.config).unwrap();

        let streaming = f.manager.output(OutputKind::Streaming).unwrap();
        assert!(streaming.is_active());
        assert_eq!(streaming.video_encoder().map(|e| e.id()), Some(stream_encoder));
        assert!(f.engine.encoder(stream_encoder).is_some());
        assert_eq!(f.engine.encoders_released(), 0);

        let recording = f.manager.output(OutputKind::Recording).unwrap();
        assert_eq!(recording.video_encoder().map(|e| e.id()), Some(stream_encoder));
        assert_eq!(
            f.engine.encoder(stream_encoder).unwrap().type_id,
            "obs_x264"
        );
    }

    #[test]
    fn test_track_encoders_kept_while_recording() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");
        f.config.set_string(section::ADV_OUT, "RecEncoder", "obs_x264");
        f.manager.start_recording(&mut f.config).unwrap();
        let track = f.manager.encoders().audio_track(0).unwrap().id();
        let created = f.engine.encoders_created();

        f.config.set_uint(section::ADV_OUT, "Track1Bitrate", 320);
        f.manager.start_streaming(&mut f.config).unwrap();

        assert_eq!(f.manager.encoders().audio_track(0).unwrap().id(), track);
        assert_eq!(f.engine.encoder(track).unwrap().settings["bitrate"], 160);
        assert_eq!(f.engine.encoders_released(), 0);
        // Only the streaming video encoder is new
        assert_eq!(f.engine.encoders_created(), created + 1);
    }

    #[test]
    fn test_qsv_recording_prefers_icq() {
        let mut f = fixture();
        f.config.set_string(section::SIMPLE_OUTPUT, "RecQuality", "HQ");
        f.config.set_string(section::SIMPLE_OUTPUT, "RecEncoder", "qsv");
        f.config.set_uint(section::VIDEO, "OutputCX", 1920);
        f.config.set_uint(section::VIDEO, "OutputCY", 1080);

        f.manager.start_recording(&mut f.config).unwrap();

        let video = f.manager.encoders().video_recording().unwrap();
        let settings = f.engine.encoder(video.id()).unwrap().settings;
        assert_eq!(settings["rate_control"], "ICQ");
        assert_eq!(settings["icq_quality"], 16);
    }

    #[test]
    fn test_lossless_uses_ffmpeg_output() {
        let mut f = fixture();
        f.config.set_string(section::SIMPLE_OUTPUT, "RecQuality", "Lossless");

        f.manager.start_recording(&mut f.config).unwrap();

        let output = f.manager.output(OutputKind::Recording).unwrap();
        assert_eq!(output.type_id(), "ffmpeg_output");
        let settings = f.engine.output(output.id()).unwrap().settings;
        assert_eq!(settings["format_name"], "avi");
        assert_eq!(settings["video_encoder"], "utvideo");
        assert!(settings["url"].as_str().unwrap().ends_with(".avi"));
        assert!(f.manager.state().ffmpeg_output);
    }

    #[test]
    fn test_existing_file_is_not_overwritten() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "FilenameFormatting", "capture");
        let videos = f.dir.path().join("videos");
        std::fs::create_dir_all(&videos).unwrap();
        std::fs::write(videos.join("capture.flv"), b"old").unwrap();

        f.manager.start_recording(&mut f.config).unwrap();

        let id = f.manager.output(OutputKind::Recording).unwrap().id();
        let path = f.engine.output(id).unwrap().settings["path"].clone();
        assert!(path.as_str().unwrap().ends_with("capture (2).flv"));
    }

    #[test]
    fn test_advanced_recording_binds_selected_tracks() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");
        f.config.set_string(section::ADV_OUT, "RecEncoder", "obs_x264");
        f.config.set_uint(section::ADV_OUT, "RecTracks", 0b101);
        f.config.set_bool(section::ADV_OUT, "RecRescale", true);
        f.config.set_string(section::ADV_OUT, "RecRescaleRes", "1280x720");

        f.manager.start_recording(&mut f.config).unwrap();

        let encoders = f.manager.encoders();
        let output = f.manager.output(OutputKind::Recording).unwrap();
        let sim = f.engine.output(output.id()).unwrap();
        assert_eq!(sim.audio_encoders.len(), 2);
        assert_eq!(sim.audio_encoders[&0], encoders.audio_track(0).unwrap().id());
        assert_eq!(sim.audio_encoders[&1], encoders.audio_track(2).unwrap().id());

        let video = encoders.video_recording().unwrap();
        assert!(!encoders.recording_shares_streaming());
        assert_eq!(f.engine.encoder(video.id()).unwrap().scaled_size, Some((1280, 720)));
    }

    #[test]
    fn test_custom_ffmpeg_output() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");
        f.config.set_string(section::ADV_OUT, "RecEncoder", "obs_x264");
        f.config.set_string(section::ADV_OUT, "RecType", "Custom Output (FFmpeg)");
        f.config.set_bool(section::ADV_OUT, "FFOutputToFile", false);
        f.config.set_string(section::ADV_OUT, "FFURL", "udp://127.0.0.1:5000");
        f.config.set_uint(section::ADV_OUT, "FFAudioTrack", 3);
        f.config.set_bool(section::ADV_OUT, "FFRescale", true);
        f.config.set_string(section::ADV_OUT, "FFRescaleRes", "640x360");

        f.manager.start_recording(&mut f.config).unwrap();

        let output = f.manager.output(OutputKind::Recording).unwrap();
        assert_eq!(output.type_id(), "ffmpeg_output");
        let sim = f.engine.output(output.id()).unwrap();
        assert_eq!(sim.settings["url"], "udp://127.0.0.1:5000");
        assert_eq!(sim.settings["scale_width"], 640);
        assert_eq!(sim.mixer, Some(2));
        assert!(sim.raw_media);
    }

    #[test]
    fn test_ffmpeg_audio_track_is_clamped() {
        let mut f = fixture();
        f.config.set_string(section::OUTPUT, "Mode", "Advanced");
        f.config.set_string(section::ADV_OUT, "RecEncoder", "obs_x264");
        f.config.set_string(section::ADV_OUT, "RecType", "Custom Output (FFmpeg)");
        f.config.set_bool(section::ADV_OUT, "FFOutputToFile", false);
        f.config.set_string(section::ADV_OUT, "FFURL", "udp://127.0.0.1:5000");
        f.config.set_uint(section::ADV_OUT, "FFAudioTrack", 99);

        f.manager.start_recording(&mut f.config).unwrap();

        let id = f.manager.output(OutputKind::Recording).unwrap().id();
        assert_eq!(f.engine.output(id).unwrap().mixer, Some(MAX_AUDIO_MIXES - 1));
    }

    #[test]
    fn test_migrate_ffmpeg_url() {
        let mut config = JsonConfig::in_memory();
        config.set_string(section::ADV_OUT, "FFURL", "/home/user/videos/out.mkv");

        assert!(migrate_ffmpeg_url(&mut config));
        assert_eq!(
            config.get_string(section::ADV_OUT, "FFFilePath").as_deref(),
            Some("/home/user/videos")
        );
        assert_eq!(
            config.get_string(section::ADV_OUT, "FFExtension").as_deref(),
            Some("mkv")
        );
        assert!(config.get_bool(section::ADV_OUT, "FFOutputToFile"));

        // Already migrated
        assert!(!migrate_ffmpeg_url(&mut config));
    }

    #[test]
    fn test_urls_are_not_migrated() {
        let mut config = JsonConfig::in_memory();
        config.set_string(section::ADV_OUT, "FFURL", "rtmp://example.com/live");
        assert!(!migrate_ffmpeg_url(&mut config));

        config.set_string(section::ADV_OUT, "FFURL", "output.mkv");
        assert!(!migrate_ffmpeg_url(&mut config));
        assert!(!config.has_user_value(section::ADV_OUT, "FFFilePath"));
    }
}
