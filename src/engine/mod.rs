//! Media engine interface
//!
//! The native capture engine owns encoders, outputs and the streaming service.
//! The bridge only reaches it through the [`MediaEngine`] trait, addressing
//! objects by opaque handles.

pub mod simulated;

use crate::utils::BridgeResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

pub use simulated::SimulatedEngine;

/// Engine object settings, a JSON object of key/value pairs
pub type EngineSettings = Map<String, Value>;

/// Result code of a successful video reset
pub const VIDEO_SUCCESS: i32 = 0;

/// Stop code reported when an output failed without a specific code
pub const OUTPUT_ERROR: i32 = -4;

/// Handle to an engine encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EncoderId(pub u64);

/// Handle to an engine output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutputId(pub u64);

/// Handle to an engine streaming service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceId(pub u64);

/// Handle to an engine hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HotkeyId(pub u64);

/// Audio or video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    Video,
    Audio,
}

/// Speaker layout handed to the audio reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerLayout {
    Mono,
    Stereo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub samples_per_sec: u32,
    pub speakers: SpeakerLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFormat {
    I420,
    NV12,
    I444,
    RGBA,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Cs601,
    Cs709,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorRange {
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    Bilinear,
    Bicubic,
    Lanczos,
}

/// Parameters of a video pipeline reset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub base_width: u32,
    pub base_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub output_format: VideoFormat,
    pub colorspace: ColorSpace,
    pub range: ColorRange,
    pub scale_type: ScaleType,
}

/// A hotkey as enumerated by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyInfo {
    pub id: HotkeyId,
    pub name: String,
    /// Whether the hotkey was registered by an output
    pub output_owned: bool,
}

/// Parameters delivered with an engine signal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalData {
    /// Present on `stop` signals
    pub code: Option<i32>,
}

/// Receiver of engine signals for one output
///
/// Called from engine threads; implementations must not block.
pub trait SignalListener: Send + Sync {
    fn on_signal(&self, output: OutputId, signal: &str, data: &SignalData);
}

/// The fixed call vocabulary of the native engine
pub trait MediaEngine: Send + Sync {
    // ========================================================================
    // Contexts
    // ========================================================================

    fn reset_audio(&self, info: &AudioInfo) -> bool;

    /// Returns the engine's result code, [`VIDEO_SUCCESS`] on success
    fn reset_video(&self, info: &VideoInfo) -> i32;

    /// Resolutions of the attached displays
    fn available_resolutions(&self) -> Vec<(u32, u32)>;

    /// Output format of the current video pipeline
    fn video_format(&self) -> VideoFormat;

    // ========================================================================
    // Encoders
    // ========================================================================

    /// All registered encoder type identifiers
    fn encoder_types(&self) -> Vec<String>;

    fn encoder_codec(&self, type_id: &str) -> Option<String>;

    /// Available AAC encoders as `(bitrate, encoder type id)` pairs
    fn aac_bitrates(&self) -> Vec<(u32, String)>;

    fn create_video_encoder(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
    ) -> BridgeResult<EncoderId>;

    fn create_audio_encoder(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
        mixer_idx: usize,
    ) -> BridgeResult<EncoderId>;

    fn release_encoder(&self, id: EncoderId);

    fn update_encoder(&self, id: EncoderId, settings: &EngineSettings);

    fn encoder_settings(&self, id: EncoderId) -> EngineSettings;

    /// Rate control names the encoder type advertises
    fn encoder_rate_controls(&self, type_id: &str) -> Vec<String>;

    /// Bind the encoder to the main video pipeline
    fn set_encoder_video(&self, id: EncoderId);

    /// Bind the encoder to the main audio pipeline
    fn set_encoder_audio(&self, id: EncoderId);

    fn set_encoder_scaled_size(&self, id: EncoderId, width: u32, height: u32);

    fn set_preferred_video_format(&self, id: EncoderId, format: VideoFormat);

    // ========================================================================
    // Outputs
    // ========================================================================

    fn create_output(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
    ) -> BridgeResult<OutputId>;

    fn release_output(&self, id: OutputId);

    fn update_output(&self, id: OutputId, settings: &EngineSettings);

    fn output_active(&self, id: OutputId) -> bool;

    fn start_output(&self, id: OutputId) -> bool;

    fn stop_output(&self, id: OutputId);

    fn force_stop_output(&self, id: OutputId);

    fn output_last_error(&self, id: OutputId) -> Option<String>;

    /// Audio codecs the output type accepts, `;` separated
    fn output_supported_audio_codecs(&self, id: OutputId) -> Option<String>;

    fn set_output_video_encoder(&self, id: OutputId, encoder: EncoderId);

    fn set_output_audio_encoder(&self, id: OutputId, encoder: EncoderId, idx: usize);

    fn set_output_service(&self, id: OutputId, service: ServiceId);

    fn set_output_delay(&self, id: OutputId, delay_sec: u32, preserve: bool);

    fn set_output_reconnect(&self, id: OutputId, max_retries: u32, retry_delay: u32);

    fn set_output_mixer(&self, id: OutputId, mixer_idx: usize);

    /// Bind the output directly to the raw video and audio pipelines
    fn set_output_media(&self, id: OutputId);

    fn connect_signal(&self, id: OutputId, signal: &str, listener: Arc<dyn SignalListener>);

    /// Path of the last file the replay buffer output wrote
    fn last_replay(&self, id: OutputId) -> Option<String>;

    // ========================================================================
    // Service
    // ========================================================================

    fn create_service(
        &self,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
        hotkeys: Option<&Value>,
    ) -> BridgeResult<ServiceId>;

    fn release_service(&self, id: ServiceId);

    fn service_settings(&self, id: ServiceId) -> EngineSettings;

    fn update_service(&self, id: ServiceId, settings: &EngineSettings);

    fn service_type(&self, id: ServiceId) -> String;

    fn service_url(&self, id: ServiceId) -> Option<String>;

    /// Output type the service requires, if it mandates one
    fn service_output_type(&self, id: ServiceId) -> Option<String>;

    /// Let the service clamp encoder settings to its limits
    fn service_apply_encoder_settings(
        &self,
        id: ServiceId,
        video: &mut EngineSettings,
        audio: &mut EngineSettings,
    );

    // ========================================================================
    // Hotkeys
    // ========================================================================

    fn hotkeys(&self) -> Vec<HotkeyInfo>;

    fn trigger_hotkey(&self, id: HotkeyId, pressed: bool);
}
