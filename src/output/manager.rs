//! Output manager: output slots, start/stop, signal wiring and hotkeys

use super::filename::{
    ensure_directory_exists, find_best_filename, generate_formatted_filename, join_directory,
};
use super::handle::{Output, OutputKind};
use super::{OutputMode, QUALITY_LOSSLESS, REC_TYPE_FFMPEG};
use crate::config::defaults::DEFAULT_FILENAME_FORMAT;
use crate::config::{section, ConfigAccessor, ConfigPaths};
use crate::encoder::{aac_encoder_for_bitrate, EncoderSet, MAX_AUDIO_MIXES};
use crate::engine::{EngineSettings, MediaEngine};
use crate::service::StreamService;
use crate::signals::SignalRelay;
use crate::utils::fs::read_json_safe;
use crate::utils::{BridgeError, BridgeResult};
use crate::video::parse_resolution;
use chrono::Local;
use std::path::Path;
use std::sync::Arc;

/// Hotkey the replay buffer output registers for saving a replay
pub const REPLAY_BUFFER_SAVE_HOTKEY: &str = "ReplayBuffer.Save";

/// Streaming output type when the service does not mandate one
pub const DEFAULT_STREAM_OUTPUT: &str = "rtmp_output";

/// Mode flags, changed only by start/stop operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeState {
    pub is_streaming: bool,
    pub is_recording: bool,
    /// The recording uses its own encoders rather than the streaming ones
    pub using_recording_preset: bool,
    /// The recording output is an FFmpeg output (lossless or custom)
    pub ffmpeg_output: bool,
    pub low_cpu_x264: bool,
}

/// Owner of the session's outputs, encoders and streaming service
pub struct OutputManager {
    // Outputs are declared first so they drop before their encoders
    pub(super) streaming: Option<Output>,
    pub(super) recording: Option<Output>,
    pub(super) replay_buffer: Option<Output>,
    pub(super) encoders: EncoderSet,
    pub(super) service: StreamService,
    pub(super) engine: Arc<dyn MediaEngine>,
    pub(super) relay: Arc<SignalRelay>,
    pub(super) paths: ConfigPaths,
    pub(super) state: ModeState,
}

/// Make `slot` hold an output of `type_id`, replacing one of another type
fn ensure_output(
    engine: &Arc<dyn MediaEngine>,
    relay: &SignalRelay,
    slot: &mut Option<Output>,
    kind: OutputKind,
    type_id: &str,
) -> BridgeResult<()> {
    if let Some(existing) = slot.as_ref() {
        if existing.type_id() == type_id {
            return Ok(());
        }
        tracing::info!(
            "Replacing {} output {} with {}",
            kind.as_str(),
            existing.type_id(),
            type_id
        );
    }

    if let Some(old) = slot.take() {
        relay.forget(old.id());
        drop(old);
    }

    let output = Output::create(engine, kind, type_id)?;
    relay.connect(engine, output.id(), kind);
    *slot = Some(output);
    Ok(())
}

/// `Output.FilenameFormatting`, or the default template when unset
pub(super) fn filename_template(config: &dyn ConfigAccessor) -> String {
    config
        .get_string(section::OUTPUT, "FilenameFormatting")
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME_FORMAT.to_string())
}

/// Full path of a new recording in `directory`
///
/// Creates the directory and picks a free name unless overwriting is allowed.
pub(super) fn recording_path(
    config: &dyn ConfigAccessor,
    directory: &str,
    extension: &str,
    no_space: bool,
) -> BridgeResult<String> {
    if directory.trim().is_empty() {
        return Err(BridgeError::Config("Recording path is not set".to_string()));
    }

    let filename = generate_formatted_filename(
        extension,
        !no_space,
        &filename_template(config),
        &Local::now(),
    );
    let path = join_directory(directory, &filename);
    ensure_directory_exists(&path)?;

    if config.get_bool(section::OUTPUT, "OverwriteIfExists") {
        Ok(path)
    } else {
        find_best_filename(&path, no_space)
    }
}

/// Scaled size from a `<enabled>`/`<resolution>` key pair
pub(super) fn rescale(
    config: &dyn ConfigAccessor,
    section: &str,
    enabled_key: &str,
    resolution_key: &str,
) -> Option<(u32, u32)> {
    if !config.get_bool(section, enabled_key) {
        return None;
    }
    config
        .get_string(section, resolution_key)
        .and_then(|r| parse_resolution(&r))
}

/// Encoder settings saved as a JSON object
pub(super) fn load_encoder_settings(path: &Path) -> Option<EngineSettings> {
    read_json_safe(path).and_then(|v| v.as_object().cloned())
}

/// Zero-based `AdvOut.TrackIndex`
pub(super) fn streaming_track_index(config: &dyn ConfigAccessor) -> usize {
    config
        .get_uint(section::ADV_OUT, "TrackIndex")
        .clamp(1, MAX_AUDIO_MIXES as u64) as usize
        - 1
}

impl OutputManager {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        relay: Arc<SignalRelay>,
        paths: ConfigPaths,
        service: StreamService,
    ) -> Self {
        Self {
            streaming: None,
            recording: None,
            replay_buffer: None,
            encoders: EncoderSet::new(engine.clone()),
            service,
            engine,
            relay,
            paths,
            state: ModeState::default(),
        }
    }

    pub fn state(&self) -> &ModeState {
        &self.state
    }

    pub fn encoders(&self) -> &EncoderSet {
        &self.encoders
    }

    pub fn service(&self) -> &StreamService {
        &self.service
    }

    pub fn output(&self, kind: OutputKind) -> Option<&Output> {
        match kind {
            OutputKind::Streaming => self.streaming.as_ref(),
            OutputKind::Recording => self.recording.as_ref(),
            OutputKind::ReplayBuffer => self.replay_buffer.as_ref(),
        }
    }

    pub fn is_active(&self, kind: OutputKind) -> bool {
        self.output(kind).map(Output::is_active).unwrap_or(false)
    }

    fn start_output(&self, kind: OutputKind) -> BridgeResult<()> {
        let output = self.output(kind).ok_or_else(|| {
            BridgeError::OutputStart(format!("No {} output to start", kind.as_str()))
        })?;

        if output.start() {
            tracing::info!("Started {} output", kind.as_str());
            return Ok(());
        }

        let error = output
            .last_error()
            .unwrap_or_else(|| format!("{} output failed to start", kind.as_str()));
        tracing::warn!("Last {} error: {}", kind.as_str(), error);
        Err(BridgeError::OutputStart(error))
    }

    // ========================================================================
    // Shared encoder helpers
    // ========================================================================

    /// `SimpleOutput.ABitrate` snapped to an AAC encoder: `(bitrate, type)`
    pub(super) fn simple_audio_bitrate(
        &self,
        config: &dyn ConfigAccessor,
    ) -> BridgeResult<(u32, String)> {
        let requested = config.get_uint(section::SIMPLE_OUTPUT, "ABitrate") as u32;
        self.aac_for(requested)
    }

    /// `AdvOut.Track<N>Bitrate` snapped to an AAC encoder
    pub(super) fn advanced_track_bitrate(
        &self,
        config: &dyn ConfigAccessor,
        idx: usize,
    ) -> BridgeResult<(u32, String)> {
        let key = format!("Track{}Bitrate", idx + 1);
        let requested = config.get_uint(section::ADV_OUT, &key) as u32;
        self.aac_for(requested)
    }

    pub(super) fn aac_for(&self, requested: u32) -> BridgeResult<(u32, String)> {
        aac_encoder_for_bitrate(&self.engine.aac_bitrates(), requested).ok_or_else(|| {
            BridgeError::EncoderCreation(format!("No AAC encoder available for {} kbps", requested))
        })
    }

    /// Tell the encoder slots which encoders the active outputs are bound to
    fn mark_bound_encoders(&mut self) {
        let ids: Vec<_> = [&self.streaming, &self.recording, &self.replay_buffer]
            .into_iter()
            .flatten()
            .filter(|output| output.is_active())
            .flat_map(|output| output.bound_encoder_ids())
            .collect();
        self.encoders.set_in_use(ids);
    }

    /// One AAC encoder per mixer track at the configured track bitrates
    ///
    /// Existing tracks are left alone while any output is active.
    pub(super) fn ensure_advanced_audio_tracks(
        &mut self,
        config: &dyn ConfigAccessor,
    ) -> BridgeResult<()> {
        let any_active = [
            OutputKind::Streaming,
            OutputKind::Recording,
            OutputKind::ReplayBuffer,
        ]
        .into_iter()
        .any(|kind| self.is_active(kind));
        if any_active && self.encoders.has_audio_tracks() {
            tracing::debug!("Outputs active, keeping the audio track encoders");
            return Ok(());
        }

        let mut tracks: [(String, u32); MAX_AUDIO_MIXES] = Default::default();
        for (idx, track) in tracks.iter_mut().enumerate() {
            let (bitrate, type_id) = self.advanced_track_bitrate(config, idx)?;
            *track = (type_id, bitrate);
        }
        self.encoders.ensure_audio_tracks(&tracks)
    }

    // ========================================================================
    // Start / stop
    // ========================================================================

    /// Configure and start the streaming output
    ///
    /// Success means the start was initiated; completion arrives as signals.
    pub fn start_streaming(&mut self, config: &mut dyn ConfigAccessor) -> BridgeResult<()> {
        if self.is_active(OutputKind::Streaming) {
            tracing::info!("Streaming output already active");
            return Ok(());
        }
        self.mark_bound_encoders();

        let type_id = self
            .service
            .output_type()
            .unwrap_or_else(|| DEFAULT_STREAM_OUTPUT.to_string());
        ensure_output(
            &self.engine,
            &self.relay,
            &mut self.streaming,
            OutputKind::Streaming,
            &type_id,
        )?;

        self.update_audio_streaming_encoder(config)?;
        self.update_service();
        self.update_stream_settings(config)?;

        self.state.is_streaming = true;
        let result = self.start_output(OutputKind::Streaming);
        if result.is_err() {
            self.state.is_streaming = false;
        }
        result
    }

    /// Recording output type the configuration calls for
    pub(super) fn recording_output_type(config: &dyn ConfigAccessor) -> &'static str {
        let ffmpeg = match OutputMode::from_config(config) {
            OutputMode::Simple => {
                config.get_string(section::SIMPLE_OUTPUT, "RecQuality").as_deref()
                    == Some(QUALITY_LOSSLESS)
            }
            OutputMode::Advanced => Self::uses_custom_ffmpeg(config),
        };
        if ffmpeg {
            "ffmpeg_output"
        } else {
            "ffmpeg_muxer"
        }
    }

    /// Advanced mode with a dedicated recording encoder and a custom FFmpeg
    /// output
    pub(super) fn uses_custom_ffmpeg(config: &dyn ConfigAccessor) -> bool {
        let encoder = config
            .get_string(section::ADV_OUT, "RecEncoder")
            .unwrap_or_default();
        let rec_type = config.get_string(section::ADV_OUT, "RecType");

        !encoder.is_empty() && encoder != "none" && rec_type.as_deref() == Some(REC_TYPE_FFMPEG)
    }

    /// Configure and start the recording output
    pub fn start_recording(&mut self, config: &mut dyn ConfigAccessor) -> BridgeResult<()> {
        if self.is_active(OutputKind::Recording) {
            tracing::info!("Recording output already active");
            return Ok(());
        }
        self.mark_bound_encoders();

        let type_id = Self::recording_output_type(config);
        ensure_output(
            &self.engine,
            &self.relay,
            &mut self.recording,
            OutputKind::Recording,
            type_id,
        )?;

        self.update_record_settings(config)?;

        self.state.is_recording = true;
        let result = self.start_output(OutputKind::Recording);
        if result.is_err() {
            self.state.is_recording = false;
        }
        result
    }

    /// Configure and start the replay buffer output
    pub fn start_replay_buffer(&mut self, config: &mut dyn ConfigAccessor) -> BridgeResult<()> {
        if self.is_active(OutputKind::ReplayBuffer) {
            tracing::info!("Replay buffer already active");
            return Ok(());
        }
        self.mark_bound_encoders();

        ensure_output(
            &self.engine,
            &self.relay,
            &mut self.replay_buffer,
            OutputKind::ReplayBuffer,
            "replay_buffer",
        )?;

        match OutputMode::from_config(config) {
            OutputMode::Simple => self.update_simple_replay_buffer(config)?,
            OutputMode::Advanced => self.update_advanced_replay_buffer(config)?,
        }

        self.start_output(OutputKind::ReplayBuffer)
    }

    pub fn stop_streaming(&mut self, force: bool) {
        match &self.streaming {
            Some(output) => output.stop(force),
            None => tracing::debug!("No streaming output to stop"),
        }
        self.state.is_streaming = false;
    }

    pub fn stop_recording(&mut self) {
        match &self.recording {
            Some(output) => output.stop(false),
            None => tracing::debug!("No recording output to stop"),
        }
        self.state.is_recording = false;
    }

    pub fn stop_replay_buffer(&mut self, force: bool) {
        match &self.replay_buffer {
            Some(output) => output.stop(force),
            None => tracing::debug!("No replay buffer output to stop"),
        }
    }

    // ========================================================================
    // Signals, hotkeys, replays
    // ========================================================================

    /// Subscribe every existing output that is not connected yet; returns
    /// how many were newly connected
    pub fn connect_output_signals(&self) -> usize {
        [&self.streaming, &self.recording, &self.replay_buffer]
            .into_iter()
            .flatten()
            .filter(|output| self.relay.connect(&self.engine, output.id(), output.kind()))
            .count()
    }

    /// Trigger every output-registered replay-save hotkey; returns how many
    /// fired
    pub fn process_replay_buffer_hotkey(&self) -> usize {
        let mut fired = 0;
        for hotkey in self.engine.hotkeys() {
            if hotkey.output_owned && hotkey.name == REPLAY_BUFFER_SAVE_HOTKEY {
                self.engine.trigger_hotkey(hotkey.id, true);
                fired += 1;
            }
        }
        tracing::debug!("Triggered {} replay buffer save hotkey(s)", fired);
        fired
    }

    /// Path of the last saved replay; empty when there is none
    pub fn last_replay(&self) -> String {
        self.replay_buffer
            .as_ref()
            .and_then(Output::last_replay)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SignalData, OUTPUT_ERROR};
    use crate::output::testing::{drain_all, fixture, Fixture};

    #[test]
    fn test_start_streaming_is_idempotent() {
        let mut f = fixture();

        f.manager.start_streaming(&mut f.config).unwrap();
        let created = f.engine.encoders_created();
        let output = f.manager.output(OutputKind::Streaming).unwrap().id();

        f.manager.start_streaming(&mut f.config).unwrap();
        assert_eq!(f.engine.encoders_created(), created);
        assert_eq!(f.engine.outputs_created(), 1);
        assert_eq!(f.engine.listener_count(output, "start"), 1);

        assert_eq!(f.manager.connect_output_signals(), 0);
        assert_eq!(f.engine.listener_count(output, "stop"), 1);

        let signals = drain_all(&f.relay);
        assert_eq!(signals.iter().filter(|(_, s)| s == "start").count(), 1);
    }

    #[test]
    fn test_streaming_binds_encoders_and_service() {
        let mut f = fixture();
        f.config.set_uint(section::OUTPUT, "RetryDelay", 5);
        f.config.set_bool(section::OUTPUT, "Reconnect", false);

        f.manager.start_streaming(&mut f.config).unwrap();
        assert!(f.manager.state().is_streaming);

        let output = f.manager.output(OutputKind::Streaming).unwrap();
        let snapshot = f.engine.output(output.id()).unwrap();
        assert_eq!(snapshot.type_id, DEFAULT_STREAM_OUTPUT);
        assert_eq!(snapshot.service, Some(f.manager.service().id()));
        assert_eq!(snapshot.reconnect, Some((0, 5)));
        assert_eq!(snapshot.settings["bind_ip"], "default");

        let video = output.video_encoder().unwrap();
        let settings = f.engine.encoder(video.id()).unwrap().settings;
        assert_eq!(settings["rate_control"], "CBR");
        assert_eq!(settings["bitrate"], 2500);
        assert!(output.audio_encoder(0).is_some());
    }

    #[test]
    fn test_restart_reuses_output_and_encoders() {
        let mut f = fixture();

        f.manager.start_streaming(&mut f.config).unwrap();
        f.manager.stop_streaming(false);
        assert!(!f.manager.state().is_streaming);
        let encoders = f.engine.encoders_created();

        f.manager.start_streaming(&mut f.config).unwrap();
        assert_eq!(f.engine.outputs_created(), 1);
        assert_eq!(f.engine.encoders_created(), encoders);
    }

    #[test]
    fn test_service_output_type_change_recreates_output() {
        let mut f = fixture();

        f.manager.start_streaming(&mut f.config).unwrap();
        f.manager.stop_streaming(true);
        let old = f.manager.output(OutputKind::Streaming).unwrap().id();

        f.engine.set_service_output_type(Some("ftl_output"));
        f.manager.start_streaming(&mut f.config).unwrap();

        let new = f.manager.output(OutputKind::Streaming).unwrap();
        assert_eq!(new.type_id(), "ftl_output");
        assert!(f.engine.output(old).is_none());
        assert_eq!(f.engine.live_outputs(), 1);
        assert!(!f.relay.is_connected(old));
    }

    #[test]
    fn test_streaming_start_failure_reports_error() {
        let mut f = fixture();
        f.engine.fail_start(DEFAULT_STREAM_OUTPUT);

        let err = f.manager.start_streaming(&mut f.config).unwrap_err();
        assert!(matches!(err, BridgeError::OutputStart(_)));
        assert!(!f.manager.state().is_streaming);
    }

    #[test]
    fn test_recording_failure_resets_flag() {
        let mut f = fixture();
        f.engine.fail_start("ffmpeg_muxer");

        let err = f.manager.start_recording(&mut f.config).unwrap_err();
        assert!(matches!(err, BridgeError::OutputStart(_)));
        assert!(!f.manager.state().is_recording);
    }

    #[test]
    fn test_recording_without_path_is_config_error() {
        let mut f = fixture();
        f.config.set_string(section::SIMPLE_OUTPUT, "FilePath", "");

        let err = f.manager.start_recording(&mut f.config).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert!(!f.manager.state().is_recording);
    }

    #[test]
    fn test_recording_stop_error_becomes_output_error() {
        let mut f = fixture();
        f.manager.start_recording(&mut f.config).unwrap();
        let id = f.manager.output(OutputKind::Recording).unwrap().id();
        drain_all(&f.relay);

        f.engine.set_last_error(id, "Disk full");
        f.manager.stop_recording();

        let stop = std::iter::from_fn(|| f.relay.drain())
            .find(|s| s.signal == "stop")
            .unwrap();
        assert_eq!(stop.output_type, "recording");
        assert_eq!(stop.code, OUTPUT_ERROR);
        assert_eq!(stop.error_message, "Disk full");
    }

    #[test]
    fn test_replay_hotkey_and_last_replay() {
        let mut f = fixture();
        assert_eq!(f.manager.last_replay(), "");

        let save = f.engine.register_hotkey(REPLAY_BUFFER_SAVE_HOTKEY, true);
        f.engine.register_hotkey(REPLAY_BUFFER_SAVE_HOTKEY, false);
        f.engine.register_hotkey("OBSBasic.StartStreaming", true);

        assert_eq!(f.manager.process_replay_buffer_hotkey(), 1);
        assert_eq!(f.engine.triggered_hotkeys(), vec![(save, true)]);

        f.manager.start_replay_buffer(&mut f.config).unwrap();
        let id = f.manager.output(OutputKind::ReplayBuffer).unwrap().id();
        f.engine.set_last_replay(id, "/videos/Replay 1.mp4");
        f.engine.emit(id, "wrote", SignalData::default());

        assert_eq!(f.manager.last_replay(), "/videos/Replay 1.mp4");
        assert!(drain_all(&f.relay).contains(&("replay-buffer".to_string(), "wrote".to_string())));
    }

    #[test]
    fn test_drop_releases_everything() {
        let mut f = fixture();
        f.manager.start_streaming(&mut f.config).unwrap();
        f.manager.start_recording(&mut f.config).unwrap();

        let Fixture {
            engine,
            manager,
            dir,
            ..
        } = f;
        drop(manager);

        assert_eq!(engine.live_outputs(), 0);
        assert_eq!(engine.live_encoders(), 0);
        assert_eq!(engine.encoders_created(), engine.encoders_released());
        drop(dir);
    }
}
