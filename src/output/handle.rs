//! Engine output handles

use crate::encoder::Encoder;
use crate::engine::{EncoderId, EngineSettings, MediaEngine, OutputId, ServiceId};
use crate::utils::BridgeResult;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// The three outputs a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    Streaming,
    Recording,
    ReplayBuffer,
}

impl OutputKind {
    /// Output type label carried by relayed signals
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Recording => "recording",
            Self::ReplayBuffer => "replay-buffer",
        }
    }

    /// Engine signals relayed for this kind of output
    pub fn signals(self) -> &'static [&'static str] {
        match self {
            Self::Streaming => &[
                "start",
                "stop",
                "starting",
                "stopping",
                "activate",
                "deactivate",
                "reconnect",
                "reconnect_success",
            ],
            Self::Recording => &["start", "stop", "stopping"],
            Self::ReplayBuffer => &[
                "start",
                "stop",
                "stopping",
                "writing",
                "wrote",
                "writing_error",
            ],
        }
    }

    /// Engine object name for an output of this kind and type
    pub fn object_name(self, type_id: &str) -> &'static str {
        match self {
            Self::Streaming => "simple_stream",
            Self::Recording if type_id == "ffmpeg_output" => "simple_ffmpeg_output",
            Self::Recording => "simple_file_output",
            Self::ReplayBuffer => "ReplayBuffer",
        }
    }
}

/// Owned engine output, released on drop
///
/// Bound encoders are tracked weakly; the output never keeps an encoder
/// alive on its own.
pub struct Output {
    engine: Arc<dyn MediaEngine>,
    id: OutputId,
    kind: OutputKind,
    type_id: String,
    video_encoder: Option<Weak<Encoder>>,
    audio_encoders: Vec<(usize, Weak<Encoder>)>,
}

impl Output {
    pub fn create(
        engine: &Arc<dyn MediaEngine>,
        kind: OutputKind,
        type_id: &str,
    ) -> BridgeResult<Self> {
        let name = kind.object_name(type_id);
        let id = engine.create_output(type_id, name, &EngineSettings::new())?;
        tracing::info!("Created {} output {} ({})", kind.as_str(), name, type_id);

        Ok(Self {
            engine: engine.clone(),
            id,
            kind,
            type_id: type_id.to_string(),
            video_encoder: None,
            audio_encoders: Vec::new(),
        })
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Queried from the engine on every call
    pub fn is_active(&self) -> bool {
        self.engine.output_active(self.id)
    }

    pub fn update(&self, settings: &EngineSettings) {
        tracing::debug!("Updating {} output: {:?}", self.kind.as_str(), settings);
        self.engine.update_output(self.id, settings);
    }

    pub fn start(&self) -> bool {
        self.engine.start_output(self.id)
    }

    pub fn stop(&self, force: bool) {
        if force {
            self.engine.force_stop_output(self.id);
        } else {
            self.engine.stop_output(self.id);
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.engine.output_last_error(self.id)
    }

    /// First audio codec the output accepts
    pub fn audio_codec(&self) -> Option<String> {
        let codecs = self.engine.output_supported_audio_codecs(self.id)?;
        codecs
            .split(';')
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(str::to_string)
    }

    pub fn set_video_encoder(&mut self, encoder: &Arc<Encoder>) {
        self.engine.set_output_video_encoder(self.id, encoder.id());
        self.video_encoder = Some(Arc::downgrade(encoder));
    }

    pub fn set_audio_encoder(&mut self, encoder: &Arc<Encoder>, idx: usize) {
        self.engine.set_output_audio_encoder(self.id, encoder.id(), idx);
        self.audio_encoders.retain(|(i, _)| *i != idx);
        self.audio_encoders.push((idx, Arc::downgrade(encoder)));
    }

    /// Bound video encoder, if it is still alive
    pub fn video_encoder(&self) -> Option<Arc<Encoder>> {
        self.video_encoder.as_ref().and_then(Weak::upgrade)
    }

    /// Bound audio encoder at `idx`, if it is still alive
    pub fn audio_encoder(&self, idx: usize) -> Option<Arc<Encoder>> {
        self.audio_encoders
            .iter()
            .find(|(i, _)| *i == idx)
            .and_then(|(_, e)| e.upgrade())
    }

    /// Ids of the bound encoders that are still alive
    pub fn bound_encoder_ids(&self) -> Vec<EncoderId> {
        self.video_encoder
            .iter()
            .chain(self.audio_encoders.iter().map(|(_, e)| e))
            .filter_map(Weak::upgrade)
            .map(|e| e.id())
            .collect()
    }

    pub fn set_service(&self, service: ServiceId) {
        self.engine.set_output_service(self.id, service);
    }

    pub fn set_delay(&self, delay_sec: u32, preserve: bool) {
        self.engine.set_output_delay(self.id, delay_sec, preserve);
    }

    pub fn set_reconnect(&self, max_retries: u32, retry_delay: u32) {
        self.engine.set_output_reconnect(self.id, max_retries, retry_delay);
    }

    pub fn set_mixer(&self, mixer_idx: usize) {
        self.engine.set_output_mixer(self.id, mixer_idx);
    }

    pub fn set_media(&self) {
        self.engine.set_output_media(self.id);
    }

    pub fn last_replay(&self) -> Option<String> {
        self.engine.last_replay(self.id)
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        tracing::debug!("Releasing {} output ({})", self.kind.as_str(), self.type_id);
        self.engine.release_output(self.id);
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("type_id", &self.type_id)
            .finish()
    }
}
