//! Encoder labels, families and AAC selection

use crate::engine::MediaEngine;

/// Hardware/software family of an H.264 video encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEncoderFamily {
    X264,
    X264LowCpu,
    Qsv,
    Nvenc,
    Amd,
}

impl VideoEncoderFamily {
    /// Resolve a simple-mode or advanced-mode encoder label
    ///
    /// Unknown labels fall back to x264.
    pub fn from_label(label: &str) -> Self {
        match label {
            "x264" | "obs_x264" => Self::X264,
            "x264_lowcpu" => Self::X264LowCpu,
            "qsv" | "obs_qsv11" => Self::Qsv,
            "nvenc" | "ffmpeg_nvenc" => Self::Nvenc,
            "amd" | "amd_amf_h264" => Self::Amd,
            other => {
                tracing::debug!("Unknown encoder label {:?}, using x264", other);
                Self::X264
            }
        }
    }

    /// Engine encoder type identifier
    pub fn engine_id(self) -> &'static str {
        match self {
            Self::X264 | Self::X264LowCpu => "obs_x264",
            Self::Qsv => "obs_qsv11",
            Self::Nvenc => "ffmpeg_nvenc",
            Self::Amd => "amd_amf_h264",
        }
    }

    /// `SimpleOutput` key holding the preset for this family
    pub fn preset_key(self) -> &'static str {
        match self {
            Self::X264 | Self::X264LowCpu => "Preset",
            Self::Qsv => "QSVPreset",
            Self::Nvenc => "NVENCPreset",
            Self::Amd => "AMDPreset",
        }
    }

    pub fn is_low_cpu(self) -> bool {
        self == Self::X264LowCpu
    }
}

/// Snap `requested` to an advertised AAC bitrate
///
/// Exact match wins, else the smallest higher bitrate, else the largest lower
/// one. `None` when nothing is advertised.
pub fn closest_aac_bitrate(available: &[(u32, String)], requested: u32) -> Option<u32> {
    if available.iter().any(|(b, _)| *b == requested) {
        return Some(requested);
    }

    let higher = available
        .iter()
        .map(|(b, _)| *b)
        .filter(|b| *b > requested)
        .min();

    higher.or_else(|| {
        available
            .iter()
            .map(|(b, _)| *b)
            .filter(|b| *b < requested)
            .max()
    })
}

/// The AAC encoder type serving `requested`, with the bitrate it snapped to
pub fn aac_encoder_for_bitrate(
    available: &[(u32, String)],
    requested: u32,
) -> Option<(u32, String)> {
    let bitrate = closest_aac_bitrate(available, requested)?;
    available
        .iter()
        .find(|(b, _)| *b == bitrate)
        .map(|(b, id)| (*b, id.clone()))
}

/// First registered encoder type producing `codec`
pub fn encoder_for_codec(engine: &dyn MediaEngine, codec: &str) -> Option<String> {
    engine
        .encoder_types()
        .into_iter()
        .find(|id| engine.encoder_codec(id).as_deref() == Some(codec))
}
