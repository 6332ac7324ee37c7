//! Encoder selection and provisioning

pub mod catalog;
pub mod provisioner;
pub mod rate_control;

pub use catalog::{aac_encoder_for_bitrate, closest_aac_bitrate, encoder_for_codec, VideoEncoderFamily};
pub use provisioner::{AudioSlot, Encoder, EncoderSet, MAX_AUDIO_MIXES};
pub use rate_control::{calc_crf, recording_settings};
