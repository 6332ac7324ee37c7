//! Streaming encoders and output settings

use super::manager::{load_encoder_settings, rescale, streaming_track_index, OutputManager};
use super::{OutputMode, QUALITY_STREAM};
use crate::config::{section, ConfigAccessor};
use crate::encoder::rate_control::apply_amd_streaming;
use crate::encoder::{encoder_for_codec, AudioSlot, Encoder, VideoEncoderFamily};
use crate::engine::{EngineSettings, VideoFormat};
use crate::utils::{BridgeError, BridgeResult};
use serde_json::json;
use std::sync::Arc;

/// Written back when `SimpleOutput.VBitrate` is unset
const DEFAULT_VIDEO_BITRATE: u32 = 2500;

impl OutputManager {
    /// Simple mode: a dedicated recording at `Stream` quality already holds
    /// the streaming encoders
    fn recording_holds_stream_encoders(&self, config: &dyn ConfigAccessor) -> bool {
        let quality = config
            .get_string(section::SIMPLE_OUTPUT, "RecQuality")
            .unwrap_or_default();
        quality == QUALITY_STREAM && self.state.is_recording
    }

    /// Audio encoder for the codec the streaming output accepts
    pub(super) fn update_audio_streaming_encoder(
        &mut self,
        config: &dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        let codec = self
            .streaming
            .as_ref()
            .and_then(|o| o.audio_codec())
            .unwrap_or_else(|| "aac".to_string());

        match OutputMode::from_config(config) {
            OutputMode::Simple => {
                if self.recording_holds_stream_encoders(config) {
                    return Ok(());
                }

                let (type_id, bitrate) = if codec == "aac" {
                    let (bitrate, type_id) = self.simple_audio_bitrate(config)?;
                    (type_id, bitrate)
                } else {
                    let type_id = self.codec_encoder(&codec)?;
                    let bitrate = config.get_uint(section::SIMPLE_OUTPUT, "ABitrate") as u32;
                    (type_id, bitrate)
                };

                let encoder = self
                    .encoders
                    .ensure_audio(AudioSlot::SimpleStreaming, &type_id, bitrate, 0)?;
                encoder.attach_media();
            }
            OutputMode::Advanced => {
                let idx = streaming_track_index(config);

                if codec == "aac" {
                    self.ensure_advanced_audio_tracks(config)?;
                    self.encoders.share_track_for_streaming(idx);
                } else {
                    let type_id = self.codec_encoder(&codec)?;
                    let (bitrate, _) = self.advanced_track_bitrate(config, idx)?;
                    self.encoders
                        .ensure_audio(AudioSlot::AdvancedStreaming, &type_id, bitrate, idx)?;
                }

                if let Some(encoder) = self.encoders.audio(AudioSlot::AdvancedStreaming) {
                    encoder.attach_media();
                }
            }
        }

        Ok(())
    }

    fn codec_encoder(&self, codec: &str) -> BridgeResult<String> {
        encoder_for_codec(self.engine.as_ref(), codec).ok_or_else(|| {
            BridgeError::EncoderCreation(format!("No audio encoder produces {}", codec))
        })
    }

    /// Attach the service to the streaming output
    pub(super) fn update_service(&self) {
        self.service.ensure_twitch_server();
        if let Some(output) = &self.streaming {
            output.set_service(self.service.id());
        }
    }

    /// Simple mode: provision and configure the streaming encoders
    pub(super) fn update_video_streaming_encoder(
        &mut self,
        config: &mut dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        let mut video_bitrate = config.get_uint(section::SIMPLE_OUTPUT, "VBitrate") as u32;
        if video_bitrate == 0 {
            video_bitrate = DEFAULT_VIDEO_BITRATE;
            config.set_uint(section::SIMPLE_OUTPUT, "VBitrate", video_bitrate as u64);
            if let Err(e) = config.save() {
                tracing::warn!("Failed to save default video bitrate: {}", e);
            }
        }

        let (audio_bitrate, _) = self.simple_audio_bitrate(config)?;
        let advanced = config.get_bool(section::SIMPLE_OUTPUT, "UseAdvanced");
        let enforce = config.get_bool(section::SIMPLE_OUTPUT, "EnforceBitrate");
        let family = VideoEncoderFamily::from_label(
            &config
                .get_string(section::SIMPLE_OUTPUT, "StreamEncoder")
                .unwrap_or_default(),
        );

        let (encoder, _) = self.encoders.ensure_video_streaming(family.engine_id())?;

        let mut video = EngineSettings::new();
        if family == VideoEncoderFamily::Amd {
            apply_amd_streaming(&mut video, video_bitrate);
        }
        video.insert("rate_control".to_string(), json!("CBR"));
        video.insert("bitrate".to_string(), json!(video_bitrate));

        if advanced {
            let preset = config
                .get_string(section::SIMPLE_OUTPUT, family.preset_key())
                .unwrap_or_default();
            let custom = config
                .get_string(section::SIMPLE_OUTPUT, "x264Settings")
                .unwrap_or_default();
            video.insert("preset".to_string(), json!(preset));
            video.insert("x264opts".to_string(), json!(custom));
        }

        let mut audio = EngineSettings::new();
        audio.insert("rate_control".to_string(), json!("CBR"));
        audio.insert("bitrate".to_string(), json!(audio_bitrate));

        self.service.apply_encoder_settings(&mut video, &mut audio);

        if advanced && !enforce {
            video.insert("bitrate".to_string(), json!(video_bitrate));
            audio.insert("bitrate".to_string(), json!(audio_bitrate));
        }

        let format = self.engine.video_format();
        if format != VideoFormat::NV12 && format != VideoFormat::I420 {
            encoder.set_preferred_format(VideoFormat::NV12);
        }

        tracing::debug!(
            "Streaming encoder {} at {} kbps video / {} kbps audio",
            encoder.type_id(),
            video_bitrate,
            audio_bitrate
        );

        encoder.update(&video);
        if let Some(audio_encoder) = self.encoders.audio(AudioSlot::SimpleStreaming) {
            audio_encoder.update(&audio);
        }
        Ok(())
    }

    /// Advanced mode: streaming video encoder from `AdvOut.Encoder` and the
    /// saved stream encoder settings
    pub(super) fn prepare_advanced_streaming_encoder(
        &mut self,
        config: &dyn ConfigAccessor,
    ) -> BridgeResult<Arc<Encoder>> {
        let family = VideoEncoderFamily::from_label(
            &config
                .get_string(section::ADV_OUT, "Encoder")
                .unwrap_or_default(),
        );
        let (encoder, _) = self.encoders.ensure_video_streaming(family.engine_id())?;

        if let Some(settings) = load_encoder_settings(&self.paths.stream_encoder) {
            encoder.update(&settings);
        }
        Ok(encoder)
    }

    /// Configure the streaming encoders and output
    pub(super) fn update_stream_settings(
        &mut self,
        config: &mut dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        match OutputMode::from_config(config) {
            OutputMode::Simple => {
                if !self.recording_holds_stream_encoders(config) {
                    self.update_video_streaming_encoder(config)?;
                }
            }
            OutputMode::Advanced => {
                let encoder = self.prepare_advanced_streaming_encoder(config)?;
                if config.get_bool(section::ADV_OUT, "ApplyServiceSettings") {
                    let mut video = encoder.settings();
                    let mut audio = EngineSettings::new();
                    self.service.apply_encoder_settings(&mut video, &mut audio);
                    encoder.update(&video);
                }
            }
        }

        let output = self.streaming.as_ref().ok_or_else(|| {
            BridgeError::OutputCreation("Streaming output does not exist".to_string())
        })?;

        let bind_ip = config
            .get_string(section::OUTPUT, "BindIP")
            .unwrap_or_else(|| "default".to_string());
        let mut settings = EngineSettings::new();
        settings.insert("bind_ip".to_string(), json!(bind_ip));
        settings.insert(
            "new_socket_loop_enabled".to_string(),
            json!(config.get_bool(section::OUTPUT, "NewSocketLoopEnable")),
        );
        settings.insert(
            "low_latency_mode_enabled".to_string(),
            json!(config.get_bool(section::OUTPUT, "LowLatencyEnable")),
        );
        output.update(&settings);

        let delay_sec = if config.get_bool(section::OUTPUT, "DelayEnable") {
            config.get_int(section::OUTPUT, "DelaySec").max(0) as u32
        } else {
            0
        };
        output.set_delay(delay_sec, config.get_bool(section::OUTPUT, "DelayPreserve"));

        let max_retries = if config.get_bool(section::OUTPUT, "Reconnect") {
            config.get_uint(section::OUTPUT, "MaxRetries") as u32
        } else {
            0
        };
        let retry_delay = config.get_uint(section::OUTPUT, "RetryDelay") as u32;
        output.set_reconnect(max_retries, retry_delay);

        self.associate_streaming_context(config);
        self.bind_streaming_encoders(config);
        Ok(())
    }

    /// Attach the streaming video encoder to the video pipeline, scaled in
    /// advanced mode when rescaling is on
    pub(super) fn associate_streaming_context(&self, config: &dyn ConfigAccessor) {
        let Some(video) = self.encoders.video_streaming() else {
            return;
        };

        if OutputMode::from_config(config) == OutputMode::Advanced {
            if let Some((width, height)) =
                rescale(config, section::ADV_OUT, "Rescale", "RescaleRes")
            {
                video.set_scaled_size(width, height);
            }
        }
        video.attach_media();
    }

    fn bind_streaming_encoders(&mut self, config: &dyn ConfigAccessor) {
        let video = self.encoders.video_streaming();
        let audio = match OutputMode::from_config(config) {
            OutputMode::Simple => self.encoders.audio(AudioSlot::SimpleStreaming),
            OutputMode::Advanced => self.encoders.audio(AudioSlot::AdvancedStreaming),
        };

        let Some(output) = self.streaming.as_mut() else {
            return;
        };
        if let Some(video) = &video {
            output.set_video_encoder(video);
        }
        if let Some(audio) = &audio {
            output.set_audio_encoder(audio, 0);
        }
    }
}
