//! Encoder slots
//!
//! Each slot holds at most one engine encoder. Encoders are reference counted
//! so the recording slot can share the streaming encoder; the engine release
//! happens when the last holder drops its reference. A slot never lets go of
//! the last reference to an encoder an active output is bound to.

use crate::engine::{EncoderId, EncoderKind, EngineSettings, MediaEngine, VideoFormat};
use crate::utils::{BridgeError, BridgeResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Number of audio mixer tracks
pub const MAX_AUDIO_MIXES: usize = 6;

/// Owned engine encoder, released on drop
pub struct Encoder {
    engine: Arc<dyn MediaEngine>,
    id: EncoderId,
    kind: EncoderKind,
    type_id: String,
    name: String,
}

impl Encoder {
    fn create_video(
        engine: &Arc<dyn MediaEngine>,
        type_id: &str,
        name: &str,
    ) -> BridgeResult<Self> {
        let id = engine.create_video_encoder(type_id, name, &EngineSettings::new())?;
        tracing::debug!("Created video encoder {} ({})", name, type_id);
        Ok(Self {
            engine: engine.clone(),
            id,
            kind: EncoderKind::Video,
            type_id: type_id.to_string(),
            name: name.to_string(),
        })
    }

    fn create_audio(
        engine: &Arc<dyn MediaEngine>,
        type_id: &str,
        name: &str,
        settings: &EngineSettings,
        mixer_idx: usize,
    ) -> BridgeResult<Self> {
        let id = engine.create_audio_encoder(type_id, name, settings, mixer_idx)?;
        tracing::debug!("Created audio encoder {} ({}) on mixer {}", name, type_id, mixer_idx);
        Ok(Self {
            engine: engine.clone(),
            id,
            kind: EncoderKind::Audio,
            type_id: type_id.to_string(),
            name: name.to_string(),
        })
    }

    pub fn id(&self) -> EncoderId {
        self.id
    }

    pub fn kind(&self) -> EncoderKind {
        self.kind
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update(&self, settings: &EngineSettings) {
        self.engine.update_encoder(self.id, settings);
    }

    pub fn settings(&self) -> EngineSettings {
        self.engine.encoder_settings(self.id)
    }

    pub fn set_scaled_size(&self, width: u32, height: u32) {
        self.engine.set_encoder_scaled_size(self.id, width, height);
    }

    pub fn set_preferred_format(&self, format: VideoFormat) {
        self.engine.set_preferred_video_format(self.id, format);
    }

    /// Bind to the main video or audio pipeline, depending on the kind
    pub fn attach_media(&self) {
        match self.kind {
            EncoderKind::Video => self.engine.set_encoder_video(self.id),
            EncoderKind::Audio => self.engine.set_encoder_audio(self.id),
        }
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        tracing::debug!("Releasing encoder {} ({})", self.name, self.type_id);
        self.engine.release_encoder(self.id);
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .finish()
    }
}

/// Audio slots outside the advanced track array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSlot {
    SimpleStreaming,
    SimpleRecording,
    AdvancedStreaming,
}

impl AudioSlot {
    fn encoder_name(self) -> &'static str {
        match self {
            Self::SimpleStreaming => "simple_aac_streaming",
            Self::SimpleRecording => "simple_aac_recording",
            Self::AdvancedStreaming => "adv_audio_streaming",
        }
    }
}

/// All encoder slots of a session
pub struct EncoderSet {
    engine: Arc<dyn MediaEngine>,
    video_streaming: Option<Arc<Encoder>>,
    video_recording: Option<Arc<Encoder>>,
    audio_simple_streaming: Option<Arc<Encoder>>,
    audio_simple_recording: Option<Arc<Encoder>>,
    audio_advanced_streaming: Option<Arc<Encoder>>,
    audio_tracks: [Option<Arc<Encoder>>; MAX_AUDIO_MIXES],
    in_use: HashSet<EncoderId>,
}

/// Whether dropping the slot's reference would release an encoder that an
/// active output is still bound to
fn releases_in_use(slot: &Option<Arc<Encoder>>, in_use: &HashSet<EncoderId>) -> bool {
    slot.as_ref()
        .map(|e| Arc::strong_count(e) == 1 && in_use.contains(&e.id()))
        .unwrap_or(false)
}

fn in_use_error(slot: &Option<Arc<Encoder>>, replacement: &str) -> BridgeError {
    let name = slot.as_ref().map(|e| e.name()).unwrap_or_default();
    BridgeError::EncoderCreation(format!(
        "Encoder {} is bound to an active output and cannot be replaced by {}",
        name, replacement
    ))
}

/// Reuse the slot's encoder when the type matches, otherwise release it
/// before creating the replacement
fn ensure_slot(
    slot: &mut Option<Arc<Encoder>>,
    in_use: &HashSet<EncoderId>,
    type_id: &str,
    create: impl FnOnce() -> BridgeResult<Encoder>,
) -> BridgeResult<(Arc<Encoder>, bool)> {
    if let Some(existing) = slot.as_ref() {
        if existing.type_id() == type_id {
            return Ok((existing.clone(), false));
        }
    }
    if releases_in_use(slot, in_use) {
        return Err(in_use_error(slot, type_id));
    }

    drop(slot.take());
    let encoder = Arc::new(create()?);
    *slot = Some(encoder.clone());
    Ok((encoder, true))
}

impl EncoderSet {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            engine,
            video_streaming: None,
            video_recording: None,
            audio_simple_streaming: None,
            audio_simple_recording: None,
            audio_advanced_streaming: None,
            audio_tracks: Default::default(),
            in_use: HashSet::new(),
        }
    }

    /// Record the encoders active outputs are bound to; slots refuse to
    /// release them until the next call
    pub fn set_in_use(&mut self, ids: impl IntoIterator<Item = EncoderId>) {
        self.in_use = ids.into_iter().collect();
    }

    pub fn video_streaming(&self) -> Option<Arc<Encoder>> {
        self.video_streaming.clone()
    }

    pub fn video_recording(&self) -> Option<Arc<Encoder>> {
        self.video_recording.clone()
    }

    pub fn audio(&self, slot: AudioSlot) -> Option<Arc<Encoder>> {
        match slot {
            AudioSlot::SimpleStreaming => self.audio_simple_streaming.clone(),
            AudioSlot::SimpleRecording => self.audio_simple_recording.clone(),
            AudioSlot::AdvancedStreaming => self.audio_advanced_streaming.clone(),
        }
    }

    pub fn audio_track(&self, idx: usize) -> Option<Arc<Encoder>> {
        self.audio_tracks.get(idx).and_then(|t| t.clone())
    }

    /// Whether the recording slot holds the streaming encoder
    pub fn recording_shares_streaming(&self) -> bool {
        match (&self.video_recording, &self.video_streaming) {
            (Some(rec), Some(stream)) => Arc::ptr_eq(rec, stream),
            _ => false,
        }
    }

    /// Streaming video encoder of type `type_id`; returns it and whether it
    /// was newly created
    pub fn ensure_video_streaming(&mut self, type_id: &str) -> BridgeResult<(Arc<Encoder>, bool)> {
        let engine = self.engine.clone();
        ensure_slot(&mut self.video_streaming, &self.in_use, type_id, || {
            Encoder::create_video(&engine, type_id, "streaming_h264")
        })
    }

    /// Dedicated recording video encoder of type `type_id`
    ///
    /// A shared streaming encoder in the slot is never reused here; only the
    /// shared reference is dropped.
    pub fn ensure_video_recording(&mut self, type_id: &str) -> BridgeResult<(Arc<Encoder>, bool)> {
        if self.recording_shares_streaming() {
            self.video_recording = None;
        }

        let engine = self.engine.clone();
        ensure_slot(&mut self.video_recording, &self.in_use, type_id, || {
            Encoder::create_video(&engine, type_id, "simple_h264_recording")
        })
    }

    /// Point the recording slot at the streaming encoder, releasing any
    /// dedicated recording encoder and its audio companion
    pub fn share_streaming_for_recording(&mut self) -> BridgeResult<Option<Arc<Encoder>>> {
        if !self.recording_shares_streaming() && self.video_recording.is_some() {
            for slot in [&self.video_recording, &self.audio_simple_recording] {
                if releases_in_use(slot, &self.in_use) {
                    return Err(in_use_error(slot, "the streaming encoder"));
                }
            }
            tracing::debug!("Dropping dedicated recording encoders");
            self.audio_simple_recording = None;
        }
        self.video_recording = self.video_streaming.clone();
        Ok(self.video_recording.clone())
    }

    /// Audio encoder for `slot` of type `type_id` at `bitrate`
    pub fn ensure_audio(
        &mut self,
        slot: AudioSlot,
        type_id: &str,
        bitrate: u32,
        mixer_idx: usize,
    ) -> BridgeResult<Arc<Encoder>> {
        let engine = self.engine.clone();
        let mut settings = EngineSettings::new();
        settings.insert("bitrate".to_string(), bitrate.into());

        let target = match slot {
            AudioSlot::SimpleStreaming => &mut self.audio_simple_streaming,
            AudioSlot::SimpleRecording => &mut self.audio_simple_recording,
            AudioSlot::AdvancedStreaming => &mut self.audio_advanced_streaming,
        };

        let (encoder, created) = ensure_slot(target, &self.in_use, type_id, || {
            Encoder::create_audio(&engine, type_id, slot.encoder_name(), &settings, mixer_idx)
        })?;
        if !created {
            encoder.update(&settings);
        }
        Ok(encoder)
    }

    /// Point the advanced streaming audio slot at one of the track encoders
    pub fn share_track_for_streaming(&mut self, idx: usize) -> Option<Arc<Encoder>> {
        self.audio_advanced_streaming = self.audio_track(idx);
        self.audio_advanced_streaming.clone()
    }

    pub fn has_audio_tracks(&self) -> bool {
        self.audio_tracks.iter().all(Option::is_some)
    }

    /// One audio encoder per mixer track; `tracks[i]` is `(type_id, bitrate)`
    pub fn ensure_audio_tracks(
        &mut self,
        tracks: &[(String, u32); MAX_AUDIO_MIXES],
    ) -> BridgeResult<()> {
        let engine = self.engine.clone();

        for (idx, (type_id, bitrate)) in tracks.iter().enumerate() {
            let mut settings = EngineSettings::new();
            settings.insert("bitrate".to_string(), (*bitrate).into());
            let name = format!("adv_aac{}", idx);

            let (encoder, created) = ensure_slot(&mut self.audio_tracks[idx], &self.in_use, type_id, || {
                Encoder::create_audio(&engine, type_id, &name, &settings, idx)
            })?;
            if !created {
                encoder.update(&settings);
            }
            encoder.attach_media();
        }

        Ok(())
    }

    /// Drop every slot
    pub fn clear(&mut self) {
        self.video_recording = None;
        self.video_streaming = None;
        self.audio_simple_streaming = None;
        self.audio_simple_recording = None;
        self.audio_advanced_streaming = None;
        self.audio_tracks = Default::default();
    }
}
