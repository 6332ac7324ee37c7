//! In-process engine
//!
//! Keeps every object the bridge creates in memory, counts creations and
//! releases, emits the usual lifecycle signals on start/stop and can be told
//! to fail. The binary uses it when no native engine is linked; the tests use
//! it to observe exactly which engine calls an operation made.

use super::{
    AudioInfo, EncoderId, EncoderKind, EngineSettings, HotkeyId, HotkeyInfo, MediaEngine,
    OutputId, ServiceId, SignalData, SignalListener, VideoFormat, VideoInfo, VIDEO_SUCCESS,
};
use crate::utils::{BridgeError, BridgeResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const AAC_BITRATES: [u32; 13] = [32, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 288, 320];

/// Snapshot of a simulated encoder
#[derive(Debug, Clone)]
pub struct SimEncoder {
    pub type_id: String,
    pub name: String,
    pub kind: EncoderKind,
    pub settings: EngineSettings,
    pub mixer_idx: Option<usize>,
    pub scaled_size: Option<(u32, u32)>,
    pub preferred_format: Option<VideoFormat>,
}

/// Snapshot of a simulated output
#[derive(Clone)]
pub struct SimOutput {
    pub type_id: String,
    pub name: String,
    pub settings: EngineSettings,
    pub active: bool,
    pub video_encoder: Option<EncoderId>,
    pub audio_encoders: BTreeMap<usize, EncoderId>,
    pub service: Option<ServiceId>,
    pub delay: Option<(u32, bool)>,
    pub reconnect: Option<(u32, u32)>,
    pub mixer: Option<usize>,
    pub raw_media: bool,
    listeners: Vec<(String, Arc<dyn SignalListener>)>,
    last_error: Option<String>,
    last_replay: Option<String>,
}

impl std::fmt::Debug for SimOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimOutput")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct SimService {
    type_id: String,
    settings: EngineSettings,
}

struct SimState {
    next_id: u64,
    encoders: HashMap<EncoderId, SimEncoder>,
    outputs: HashMap<OutputId, SimOutput>,
    services: HashMap<ServiceId, SimService>,
    encoders_created: usize,
    encoders_released: usize,
    outputs_created: usize,
    outputs_released: usize,
    failing_encoders: HashSet<String>,
    failing_outputs: HashSet<String>,
    failing_starts: HashSet<String>,
    rate_controls: HashMap<String, Vec<String>>,
    output_audio_codecs: HashMap<String, String>,
    service_output_type: Option<String>,
    audio: Option<AudioInfo>,
    video: Option<VideoInfo>,
    video_result: i32,
    resolutions: Vec<(u32, u32)>,
    video_format: VideoFormat,
    hotkeys: Vec<HotkeyInfo>,
    triggered: Vec<(HotkeyId, bool)>,
}

impl SimState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simulated media engine
pub struct SimulatedEngine {
    state: Mutex<SimState>,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    pub fn new() -> Self {
        let rate_controls = [
            ("obs_x264", &["CBR", "ABR", "VBR", "CRF"][..]),
            ("obs_qsv11", &["CBR", "AVBR", "VBR", "CQP", "ICQ"][..]),
            ("ffmpeg_nvenc", &["CBR", "VBR", "CQP", "lossless"][..]),
            ("amd_amf_h264", &["CBR", "VBR", "CQP"][..]),
        ]
        .into_iter()
        .map(|(id, rc)| (id.to_string(), rc.iter().map(|s| s.to_string()).collect()))
        .collect();

        Self {
            state: Mutex::new(SimState {
                next_id: 0,
                encoders: HashMap::new(),
                outputs: HashMap::new(),
                services: HashMap::new(),
                encoders_created: 0,
                encoders_released: 0,
                outputs_created: 0,
                outputs_released: 0,
                failing_encoders: HashSet::new(),
                failing_outputs: HashSet::new(),
                failing_starts: HashSet::new(),
                rate_controls,
                output_audio_codecs: HashMap::new(),
                service_output_type: None,
                audio: None,
                video: None,
                video_result: VIDEO_SUCCESS,
                resolutions: vec![(1920, 1080)],
                video_format: VideoFormat::NV12,
                hotkeys: Vec::new(),
                triggered: Vec::new(),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Failure injection and knobs
    // ------------------------------------------------------------------------

    /// Make creation of the encoder type fail
    pub fn fail_encoder(&self, type_id: &str) {
        self.state.lock().failing_encoders.insert(type_id.to_string());
    }

    /// Make creation of the output type fail
    pub fn fail_output(&self, type_id: &str) {
        self.state.lock().failing_outputs.insert(type_id.to_string());
    }

    /// Make starting outputs of the type fail and record a last error
    pub fn fail_start(&self, type_id: &str) {
        self.state.lock().failing_starts.insert(type_id.to_string());
    }

    pub fn set_rate_controls(&self, type_id: &str, controls: &[&str]) {
        self.state.lock().rate_controls.insert(
            type_id.to_string(),
            controls.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn set_output_audio_codecs(&self, output_type: &str, codecs: &str) {
        self.state
            .lock()
            .output_audio_codecs
            .insert(output_type.to_string(), codecs.to_string());
    }

    pub fn set_service_output_type(&self, output_type: Option<&str>) {
        self.state.lock().service_output_type = output_type.map(str::to_string);
    }

    pub fn set_video_result(&self, code: i32) {
        self.state.lock().video_result = code;
    }

    pub fn set_resolutions(&self, resolutions: Vec<(u32, u32)>) {
        self.state.lock().resolutions = resolutions;
    }

    pub fn set_video_format(&self, format: VideoFormat) {
        self.state.lock().video_format = format;
    }

    pub fn set_last_error(&self, output: OutputId, error: &str) {
        if let Some(out) = self.state.lock().outputs.get_mut(&output) {
            out.last_error = Some(error.to_string());
        }
    }

    pub fn set_last_replay(&self, output: OutputId, path: &str) {
        if let Some(out) = self.state.lock().outputs.get_mut(&output) {
            out.last_replay = Some(path.to_string());
        }
    }

    pub fn register_hotkey(&self, name: &str, output_owned: bool) -> HotkeyId {
        let mut state = self.state.lock();
        let id = HotkeyId(state.next_id());
        state.hotkeys.push(HotkeyInfo {
            id,
            name: name.to_string(),
            output_owned,
        });
        id
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn encoders_created(&self) -> usize {
        self.state.lock().encoders_created
    }

    pub fn encoders_released(&self) -> usize {
        self.state.lock().encoders_released
    }

    pub fn outputs_created(&self) -> usize {
        self.state.lock().outputs_created
    }

    pub fn outputs_released(&self) -> usize {
        self.state.lock().outputs_released
    }

    pub fn live_encoders(&self) -> usize {
        self.state.lock().encoders.len()
    }

    pub fn live_outputs(&self) -> usize {
        self.state.lock().outputs.len()
    }

    pub fn encoder(&self, id: EncoderId) -> Option<SimEncoder> {
        self.state.lock().encoders.get(&id).cloned()
    }

    pub fn output(&self, id: OutputId) -> Option<SimOutput> {
        self.state.lock().outputs.get(&id).cloned()
    }

    /// Live outputs of the given type
    pub fn outputs_of_type(&self, type_id: &str) -> Vec<OutputId> {
        let state = self.state.lock();
        let mut ids: Vec<OutputId> = state
            .outputs
            .iter()
            .filter(|(_, o)| o.type_id == type_id)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of listeners connected to `signal` on the output
    pub fn listener_count(&self, output: OutputId, signal: &str) -> usize {
        self.state
            .lock()
            .outputs
            .get(&output)
            .map(|o| o.listeners.iter().filter(|(s, _)| s == signal).count())
            .unwrap_or(0)
    }

    pub fn last_audio_reset(&self) -> Option<AudioInfo> {
        self.state.lock().audio.clone()
    }

    pub fn last_video_reset(&self) -> Option<VideoInfo> {
        self.state.lock().video.clone()
    }

    pub fn triggered_hotkeys(&self) -> Vec<(HotkeyId, bool)> {
        self.state.lock().triggered.clone()
    }

    /// Deliver a signal to the output's listeners, as an engine thread would
    pub fn emit(&self, output: OutputId, signal: &str, data: SignalData) {
        let listeners: Vec<Arc<dyn SignalListener>> = {
            let state = self.state.lock();
            match state.outputs.get(&output) {
                Some(out) => out
                    .listeners
                    .iter()
                    .filter(|(s, _)| s == signal)
                    .map(|(_, l)| l.clone())
                    .collect(),
                None => return,
            }
        };

        // Listeners may call back into the engine
        for listener in listeners {
            listener.on_signal(output, signal, &data);
        }
    }

    fn stop_inner(&self, id: OutputId) {
        let was_active = {
            let mut state = self.state.lock();
            match state.outputs.get_mut(&id) {
                Some(out) if out.active => {
                    out.active = false;
                    true
                }
                _ => false,
            }
        };

        if was_active {
            self.emit(id, "stopping", SignalData::default());
            self.emit(id, "stop", SignalData { code: Some(0) });
            self.emit(id, "deactivate", SignalData::default());
        }
    }
}

fn merge(target: &mut EngineSettings, source: &EngineSettings) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

fn codec_of(type_id: &str) -> Option<&'static str> {
    match type_id {
        "obs_x264" | "obs_qsv11" | "ffmpeg_nvenc" | "amd_amf_h264" => Some("h264"),
        "ffmpeg_aac" | "mf_aac" | "CoreAudio_AAC" => Some("aac"),
        "ffmpeg_opus" => Some("opus"),
        _ => None,
    }
}

impl MediaEngine for SimulatedEngine {
    fn reset_audio(&self, info: &AudioInfo) -> bool {
        self.state.lock().audio = Some(info.clone());
        true
    }

    fn reset_video(&self, info: &VideoInfo) -> i32 {
        let mut state = self.state.lock();
        if state.video_result == VIDEO_SUCCESS {
            state.video = Some(info.clone());
            state.video_format = info.output_format;
        }
        state.video_result
    }

    fn available_resolutions(&self) -> Vec<(u32, u32)> {
        self.state.lock().resolutions.clone()
    }

    fn video_format(&self) -> VideoFormat {
        self.state.lock().video_format
    }

    fn encoder_types(&self) -> Vec<String> {
        [
            "obs_x264",
            "obs_qsv11",
            "ffmpeg_nvenc",
            "amd_amf_h264",
            "ffmpeg_aac",
            "ffmpeg_opus",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn encoder_codec(&self, type_id: &str) -> Option<String> {
        codec_of(type_id).map(str::to_string)
    }

    fn aac_bitrates(&self) -> Vec<(u32, String)> {
        AAC_BITRATES
            .iter()
            .map(|b| (*b, "ffmpeg_aac".to_string()))
            .collect()
    }

    fn create_video_encoder(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
    ) -> BridgeResult<EncoderId> {
        let mut state = self.state.lock();
        if state.failing_encoders.contains(type_id) {
            return Err(BridgeError::EncoderCreation(format!(
                "failed to create video encoder {} ({})",
                name, type_id
            )));
        }

        let id = EncoderId(state.next_id());
        state.encoders.insert(
            id,
            SimEncoder {
                type_id: type_id.to_string(),
                name: name.to_string(),
                kind: EncoderKind::Video,
                settings: settings.clone(),
                mixer_idx: None,
                scaled_size: None,
                preferred_format: None,
            },
        );
        state.encoders_created += 1;
        Ok(id)
    }

    fn create_audio_encoder(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
        mixer_idx: usize,
    ) -> BridgeResult<EncoderId> {
        let mut state = self.state.lock();
        if state.failing_encoders.contains(type_id) {
            return Err(BridgeError::EncoderCreation(format!(
                "failed to create audio encoder {} ({})",
                name, type_id
            )));
        }

        let id = EncoderId(state.next_id());
        state.encoders.insert(
            id,
            SimEncoder {
                type_id: type_id.to_string(),
                name: name.to_string(),
                kind: EncoderKind::Audio,
                settings: settings.clone(),
                mixer_idx: Some(mixer_idx),
                scaled_size: None,
                preferred_format: None,
            },
        );
        state.encoders_created += 1;
        Ok(id)
    }

    fn release_encoder(&self, id: EncoderId) {
        let mut state = self.state.lock();
        if state.encoders.remove(&id).is_some() {
            state.encoders_released += 1;
        }
    }

    fn update_encoder(&self, id: EncoderId, settings: &EngineSettings) {
        if let Some(encoder) = self.state.lock().encoders.get_mut(&id) {
            merge(&mut encoder.settings, settings);
        }
    }

    fn encoder_settings(&self, id: EncoderId) -> EngineSettings {
        self.state
            .lock()
            .encoders
            .get(&id)
            .map(|e| e.settings.clone())
            .unwrap_or_default()
    }

    fn encoder_rate_controls(&self, type_id: &str) -> Vec<String> {
        self.state
            .lock()
            .rate_controls
            .get(type_id)
            .cloned()
            .unwrap_or_default()
    }

    fn set_encoder_video(&self, _id: EncoderId) {}

    fn set_encoder_audio(&self, _id: EncoderId) {}

    fn set_encoder_scaled_size(&self, id: EncoderId, width: u32, height: u32) {
        if let Some(encoder) = self.state.lock().encoders.get_mut(&id) {
            encoder.scaled_size = Some((width, height));
        }
    }

    fn set_preferred_video_format(&self, id: EncoderId, format: VideoFormat) {
        if let Some(encoder) = self.state.lock().encoders.get_mut(&id) {
            encoder.preferred_format = Some(format);
        }
    }

    fn create_output(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
    ) -> BridgeResult<OutputId> {
        let mut state = self.state.lock();
        if state.failing_outputs.contains(type_id) {
            return Err(BridgeError::OutputCreation(format!(
                "failed to create output {} ({})",
                name, type_id
            )));
        }

        let id = OutputId(state.next_id());
        state.outputs.insert(
            id,
            SimOutput {
                type_id: type_id.to_string(),
                name: name.to_string(),
                settings: settings.clone(),
                active: false,
                video_encoder: None,
                audio_encoders: BTreeMap::new(),
                service: None,
                delay: None,
                reconnect: None,
                mixer: None,
                raw_media: false,
                listeners: Vec::new(),
                last_error: None,
                last_replay: None,
            },
        );
        state.outputs_created += 1;
        Ok(id)
    }

    fn release_output(&self, id: OutputId) {
        let mut state = self.state.lock();
        if state.outputs.remove(&id).is_some() {
            state.outputs_released += 1;
        }
    }

    fn update_output(&self, id: OutputId, settings: &EngineSettings) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            merge(&mut out.settings, settings);
        }
    }

    fn output_active(&self, id: OutputId) -> bool {
        self.state
            .lock()
            .outputs
            .get(&id)
            .map(|o| o.active)
            .unwrap_or(false)
    }

    fn start_output(&self, id: OutputId) -> bool {
        {
            let mut state = self.state.lock();
            let failing = match state.outputs.get(&id) {
                Some(out) => state.failing_starts.contains(&out.type_id),
                None => return false,
            };
            let Some(out) = state.outputs.get_mut(&id) else {
                return false;
            };
            if failing {
                out.last_error = Some(format!("{} could not be started", out.name));
                return false;
            }
            if out.active {
                return true;
            }
            out.active = true;
            out.last_error = None;
        }

        self.emit(id, "starting", SignalData::default());
        self.emit(id, "activate", SignalData::default());
        self.emit(id, "start", SignalData::default());
        true
    }

    fn stop_output(&self, id: OutputId) {
        self.stop_inner(id);
    }

    fn force_stop_output(&self, id: OutputId) {
        self.stop_inner(id);
    }

    fn output_last_error(&self, id: OutputId) -> Option<String> {
        self.state
            .lock()
            .outputs
            .get(&id)
            .and_then(|o| o.last_error.clone())
    }

    fn output_supported_audio_codecs(&self, id: OutputId) -> Option<String> {
        let state = self.state.lock();
        let out = state.outputs.get(&id)?;
        Some(
            state
                .output_audio_codecs
                .get(&out.type_id)
                .cloned()
                .unwrap_or_else(|| "aac".to_string()),
        )
    }

    fn set_output_video_encoder(&self, id: OutputId, encoder: EncoderId) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.video_encoder = Some(encoder);
        }
    }

    fn set_output_audio_encoder(&self, id: OutputId, encoder: EncoderId, idx: usize) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.audio_encoders.insert(idx, encoder);
        }
    }

    fn set_output_service(&self, id: OutputId, service: ServiceId) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.service = Some(service);
        }
    }

    fn set_output_delay(&self, id: OutputId, delay_sec: u32, preserve: bool) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.delay = Some((delay_sec, preserve));
        }
    }

    fn set_output_reconnect(&self, id: OutputId, max_retries: u32, retry_delay: u32) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.reconnect = Some((max_retries, retry_delay));
        }
    }

    fn set_output_mixer(&self, id: OutputId, mixer_idx: usize) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.mixer = Some(mixer_idx);
        }
    }

    fn set_output_media(&self, id: OutputId) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.raw_media = true;
        }
    }

    fn connect_signal(&self, id: OutputId, signal: &str, listener: Arc<dyn SignalListener>) {
        if let Some(out) = self.state.lock().outputs.get_mut(&id) {
            out.listeners.push((signal.to_string(), listener));
        }
    }

    fn last_replay(&self, id: OutputId) -> Option<String> {
        self.state
            .lock()
            .outputs
            .get(&id)
            .and_then(|o| o.last_replay.clone())
    }

    fn create_service(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
        _hotkeys: Option<&Value>,
    ) -> BridgeResult<ServiceId> {
        if type_id.is_empty() {
            return Err(BridgeError::ServiceCreation(format!(
                "service {} has no type",
                name
            )));
        }

        let mut state = self.state.lock();
        let id = ServiceId(state.next_id());
        state.services.insert(
            id,
            SimService {
                type_id: type_id.to_string(),
                settings: settings.clone(),
            },
        );
        Ok(id)
    }

    fn release_service(&self, id: ServiceId) {
        self.state.lock().services.remove(&id);
    }

    fn service_settings(&self, id: ServiceId) -> EngineSettings {
        self.state
            .lock()
            .services
            .get(&id)
            .map(|s| s.settings.clone())
            .unwrap_or_default()
    }

    fn update_service(&self, id: ServiceId, settings: &EngineSettings) {
        if let Some(service) = self.state.lock().services.get_mut(&id) {
            merge(&mut service.settings, settings);
        }
    }

    fn service_type(&self, id: ServiceId) -> String {
        self.state
            .lock()
            .services
            .get(&id)
            .map(|s| s.type_id.clone())
            .unwrap_or_default()
    }

    fn service_url(&self, id: ServiceId) -> Option<String> {
        self.state
            .lock()
            .services
            .get(&id)
            .and_then(|s| s.settings.get("server"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn service_output_type(&self, _id: ServiceId) -> Option<String> {
        self.state.lock().service_output_type.clone()
    }

    fn service_apply_encoder_settings(
        &self,
        id: ServiceId,
        video: &mut EngineSettings,
        audio: &mut EngineSettings,
    ) {
        let settings = self.service_settings(id);
        let clamp = |target: &mut EngineSettings, limit_key: &str| {
            let Some(limit) = settings.get(limit_key).and_then(Value::as_u64) else {
                return;
            };
            let current = target.get("bitrate").and_then(Value::as_u64).unwrap_or(0);
            if current > limit {
                target.insert("bitrate".to_string(), Value::from(limit));
            }
        };
        clamp(video, "max_video_bitrate");
        clamp(audio, "max_audio_bitrate");
    }

    fn hotkeys(&self) -> Vec<HotkeyInfo> {
        self.state.lock().hotkeys.clone()
    }

    fn trigger_hotkey(&self, id: HotkeyId, pressed: bool) {
        self.state.lock().triggered.push((id, pressed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Mutex<Vec<(String, Option<i32>)>>);

    impl SignalListener for Recorder {
        fn on_signal(&self, _output: OutputId, signal: &str, data: &SignalData) {
            self.0.lock().push((signal.to_string(), data.code));
        }
    }

    #[test]
    fn test_start_stop_emits_lifecycle_signals() {
        let engine = SimulatedEngine::new();
        let out = engine
            .create_output("rtmp_output", "stream", &EngineSettings::new())
            .unwrap();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        for signal in ["start", "stop", "stopping"] {
            engine.connect_signal(out, signal, recorder.clone());
        }

        assert!(engine.start_output(out));
        assert!(engine.output_active(out));
        engine.stop_output(out);
        assert!(!engine.output_active(out));

        let seen = recorder.0.lock().clone();
        assert_eq!(
            seen,
            vec![
                ("start".to_string(), None),
                ("stopping".to_string(), None),
                ("stop".to_string(), Some(0)),
            ]
        );
    }

    #[test]
    fn test_counts_and_failures() {
        let engine = SimulatedEngine::new();
        let id = engine
            .create_video_encoder("obs_x264", "stream", &EngineSettings::new())
            .unwrap();
        engine.release_encoder(id);
        engine.release_encoder(id);
        assert_eq!(engine.encoders_created(), 1);
        assert_eq!(engine.encoders_released(), 1);

        engine.fail_encoder("ffmpeg_nvenc");
        assert!(engine
            .create_video_encoder("ffmpeg_nvenc", "stream", &EngineSettings::new())
            .is_err());

        engine.fail_start("ffmpeg_muxer");
        let out = engine
            .create_output("ffmpeg_muxer", "rec", &EngineSettings::new())
            .unwrap();
        assert!(!engine.start_output(out));
        assert!(engine.output_last_error(out).is_some());
    }
}
