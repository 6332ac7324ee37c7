//! Audio and video context resets
//!
//! Translates the `Video` and `Audio` configuration sections into the engine's
//! reset parameters, filling in and persisting derived values (base and
//! output resolution, frame rate) when they are unset.

use crate::config::{section, ConfigAccessor};
use crate::engine::{
    AudioInfo, ColorRange, ColorSpace, MediaEngine, ScaleType, SpeakerLayout, VideoFormat,
    VideoInfo, VIDEO_SUCCESS,
};
use crate::utils::BridgeResult;

/// Output resolution the default downscale aims for
const TARGET_WIDTH: u32 = 1280;
const TARGET_HEIGHT: u32 = 720;

/// Downscale factors tried in order for the default output resolution
const SCALE_LADDER: [f64; 11] = [
    1.0,
    1.25,
    1.0 / 0.75,
    1.5,
    1.0 / 0.6,
    1.75,
    2.0,
    2.25,
    2.5,
    2.75,
    3.0,
];

fn ladder_value(idx: usize) -> f64 {
    match SCALE_LADDER.get(idx) {
        Some(v) => *v,
        None => SCALE_LADDER[SCALE_LADDER.len() - 1] + (idx + 1 - SCALE_LADDER.len()) as f64 / 2.0,
    }
}

/// Default output resolution for a base canvas
///
/// Canvases larger than 1280x720 are divided by the first ladder factor that
/// brings either dimension down to the target.
pub fn default_output_resolution(base_width: u32, base_height: u32) -> (u32, u32) {
    if base_width <= TARGET_WIDTH || base_height <= TARGET_HEIGHT {
        return (base_width, base_height);
    }

    let mut idx = 0;
    loop {
        let factor = ladder_value(idx);
        let width = (base_width as f64 / factor) as u32;
        let height = (base_height as f64 / factor) as u32;
        if width <= TARGET_WIDTH || height <= TARGET_HEIGHT {
            return (width, height);
        }
        idx += 1;
    }
}

/// Resolution with the largest area
pub fn largest_resolution(resolutions: &[(u32, u32)]) -> Option<(u32, u32)> {
    resolutions
        .iter()
        .copied()
        .max_by_key(|(w, h)| *w as u64 * *h as u64)
}

/// Parse `"1280x720"`
pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

pub fn video_format_from_name(name: Option<&str>) -> VideoFormat {
    match name {
        None => VideoFormat::I420,
        Some(n) if n.eq_ignore_ascii_case("I420") => VideoFormat::I420,
        Some(n) if n.eq_ignore_ascii_case("NV12") => VideoFormat::NV12,
        Some(n) if n.eq_ignore_ascii_case("I444") => VideoFormat::I444,
        Some(_) => VideoFormat::RGBA,
    }
}

pub fn scale_type_from_name(name: Option<&str>) -> ScaleType {
    match name {
        Some(n) if n.eq_ignore_ascii_case("bilinear") => ScaleType::Bilinear,
        Some(n) if n.eq_ignore_ascii_case("lanczos") => ScaleType::Lanczos,
        _ => ScaleType::Bicubic,
    }
}

fn common_fps(value: &str) -> (u32, u32) {
    match value {
        "10" => (10, 1),
        "20" => (20, 1),
        "24 NTSC" => (24000, 1001),
        "25" => (25, 1),
        "29.97" => (30000, 1001),
        "48" => (48, 1),
        "59.94" => (60000, 1001),
        "60" => (60, 1),
        _ => (30, 1),
    }
}

/// Frame rate as `(num, den)` from the `Video` section
///
/// A missing common frame rate is reset to 30 and written back.
pub fn config_fps(config: &mut dyn ConfigAccessor) -> (u32, u32) {
    match config.get_uint(section::VIDEO, "FPSType") {
        1 => {
            let num = config.get_uint(section::VIDEO, "FPSInt").max(1) as u32;
            (num, 1)
        }
        2 => {
            let num = config.get_uint(section::VIDEO, "FPSNum").max(1) as u32;
            let den = config.get_uint(section::VIDEO, "FPSDen").max(1) as u32;
            if num / den == 0 {
                (1, 1)
            } else {
                (num, den)
            }
        }
        _ => match config.get_string(section::VIDEO, "FPSCommon") {
            Some(value) => common_fps(&value),
            None => {
                config.set_uint(section::VIDEO, "FPSType", 0);
                config.set_string(section::VIDEO, "FPSCommon", "30");
                (30, 1)
            }
        },
    }
}

/// Reset the engine's audio pipeline from the `Audio` section
pub fn reset_audio_context(
    engine: &dyn MediaEngine,
    config: &mut dyn ConfigAccessor,
    reload: bool,
) -> BridgeResult<bool> {
    if reload {
        config.reload()?;
    }

    let speakers = match config.get_string(section::AUDIO, "ChannelSetup").as_deref() {
        Some("Mono") => SpeakerLayout::Mono,
        _ => SpeakerLayout::Stereo,
    };
    let info = AudioInfo {
        samples_per_sec: config.get_uint(section::AUDIO, "SampleRate") as u32,
        speakers,
    };

    tracing::info!(
        "Resetting audio: {} Hz, {:?}",
        info.samples_per_sec,
        info.speakers
    );
    Ok(engine.reset_audio(&info))
}

/// Reset the engine's video pipeline from the `Video` section
///
/// Returns the engine's result code; [`VIDEO_SUCCESS`] on success.
pub fn reset_video_context(
    engine: &dyn MediaEngine,
    config: &mut dyn ConfigAccessor,
    reload: bool,
) -> BridgeResult<i32> {
    if reload {
        config.reload()?;
    }

    let mut base_width = config.get_uint(section::VIDEO, "BaseCX") as u32;
    let mut base_height = config.get_uint(section::VIDEO, "BaseCY") as u32;

    if base_width == 0 || base_height == 0 {
        if let Some((w, h)) = largest_resolution(&engine.available_resolutions()) {
            base_width = w;
            base_height = h;
        }
    }
    config.set_uint(section::VIDEO, "BaseCX", base_width as u64);
    config.set_uint(section::VIDEO, "BaseCY", base_height as u64);

    let mut output_width = config.get_uint(section::VIDEO, "OutputCX") as u32;
    let mut output_height = config.get_uint(section::VIDEO, "OutputCY") as u32;

    if output_width == 0 || output_height == 0 {
        (output_width, output_height) = default_output_resolution(base_width, base_height);
        config.set_uint(section::VIDEO, "OutputCX", output_width as u64);
        config.set_uint(section::VIDEO, "OutputCY", output_height as u64);
    }

    let (fps_num, fps_den) = config_fps(config);

    let colorspace = match config.get_string(section::VIDEO, "ColorSpace") {
        Some(cs) if cs.eq_ignore_ascii_case("601") => ColorSpace::Cs601,
        _ => ColorSpace::Cs709,
    };
    let range = match config.get_string(section::VIDEO, "ColorRange") {
        Some(r) if r.eq_ignore_ascii_case("Full") => ColorRange::Full,
        _ => ColorRange::Partial,
    };

    let info = VideoInfo {
        base_width,
        base_height,
        output_width,
        output_height,
        fps_num,
        fps_den,
        output_format: video_format_from_name(
            config.get_string(section::VIDEO, "ColorFormat").as_deref(),
        ),
        colorspace,
        range,
        scale_type: scale_type_from_name(config.get_string(section::VIDEO, "ScaleType").as_deref()),
    };

    config.save()?;

    let code = engine.reset_video(&info);
    if code == VIDEO_SUCCESS {
        tracing::info!(
            "Video reset: base {}x{}, output {}x{}, {}/{} fps",
            base_width,
            base_height,
            output_width,
            output_height,
            fps_num,
            fps_den
        );
    } else {
        tracing::warn!("Video reset failed with code {}", code);
    }
    Ok(code)
}
