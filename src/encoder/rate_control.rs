//! Rate-control settings per encoder family

use super::catalog::VideoEncoderFamily;
use crate::engine::EngineSettings;
use serde_json::Value;

/// Diagonal beyond which resolution no longer lowers the CRF
const CROSS_DIST_CUTOFF: f64 = 2000.0;

/// Base CRF for a simple-mode recording quality label
pub fn base_crf(quality: &str) -> i32 {
    if quality == "HQ" {
        16
    } else {
        23
    }
}

/// Lower `base` for small output resolutions and for the low-CPU x264 preset
pub fn calc_crf(base: i32, output_cx: u64, output_cy: u64, low_cpu: bool) -> i32 {
    let cx = output_cx as f64;
    let cy = output_cy as f64;

    let mut crf = base;
    if low_cpu {
        crf -= 2;
    }

    let cross_dist = (cx * cx + cy * cy).sqrt();
    let reduction = (1.0 - cross_dist.min(CROSS_DIST_CUTOFF) / CROSS_DIST_CUTOFF) * 10.0;

    crf - reduction as i32
}

fn put(settings: &mut EngineSettings, key: &str, value: impl Into<Value>) {
    settings.insert(key.to_string(), value.into());
}

/// Constant-quality settings for a dedicated recording encoder
///
/// `icq_available` only matters for QSV, which falls back to CQP without it.
pub fn recording_settings(
    family: VideoEncoderFamily,
    crf: i32,
    icq_available: bool,
) -> EngineSettings {
    let mut s = EngineSettings::new();

    match family {
        VideoEncoderFamily::X264 | VideoEncoderFamily::X264LowCpu => {
            put(&mut s, "crf", crf);
            put(&mut s, "use_bufsize", true);
            put(&mut s, "rate_control", "CRF");
            put(&mut s, "profile", "high");
            put(
                &mut s,
                "preset",
                if family.is_low_cpu() { "ultrafast" } else { "veryfast" },
            );
        }
        VideoEncoderFamily::Qsv => {
            put(&mut s, "profile", "high");
            if icq_available {
                put(&mut s, "rate_control", "ICQ");
                put(&mut s, "icq_quality", crf);
            } else {
                put(&mut s, "rate_control", "CQP");
                put(&mut s, "qpi", crf);
                put(&mut s, "qpp", crf);
                put(&mut s, "qpb", crf);
            }
        }
        VideoEncoderFamily::Nvenc => {
            put(&mut s, "rate_control", "CQP");
            put(&mut s, "profile", "high");
            put(&mut s, "preset", "hq");
            put(&mut s, "cqp", crf);
        }
        VideoEncoderFamily::Amd => {
            put(&mut s, "Usage", 0);
            put(&mut s, "Profile", 100);
            put(&mut s, "RateControlMethod", 0);
            put(&mut s, "QP.IFrame", crf);
            put(&mut s, "QP.PFrame", crf);
            put(&mut s, "QP.BFrame", crf);
            put(&mut s, "VBVBuffer", 1);
            put(&mut s, "VBVBuffer.Size", 100000);
            put(&mut s, "KeyframeInterval", 2.0);
            put(&mut s, "BFrame.Pattern", 0);
        }
    }

    s
}

/// Constant-bitrate block AMD encoders need when streaming
pub fn apply_amd_streaming(settings: &mut EngineSettings, bitrate: u32) {
    put(settings, "Usage", 0);
    put(settings, "Profile", 100);
    put(settings, "RateControlMethod", 3);
    put(settings, "Bitrate.Target", bitrate);
    put(settings, "FillerData", 1);
    put(settings, "VBVBuffer", 1);
    put(settings, "VBVBuffer.Size", bitrate);
    put(settings, "KeyframeInterval", 2.0);
    put(settings, "BFrame.Pattern", 0);
}

/// Whether encoder settings select a bitrate-driven rate control
pub fn uses_bitrate(settings: &EngineSettings) -> bool {
    let rate_control = settings
        .get("rate_control")
        .and_then(Value::as_str)
        .unwrap_or("");

    ["CBR", "VBR", "ABR"]
        .iter()
        .any(|rc| rate_control.eq_ignore_ascii_case(rc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_calc_crf() {
        assert_eq!(calc_crf(23, 1920, 1080, false), 23);
        assert_eq!(calc_crf(23, 640, 480, false), 17);
        assert_eq!(calc_crf(23, 3840, 2160, false), 23);
        assert_eq!(calc_crf(23, 1920, 1080, true), 21);
        assert_eq!(calc_crf(base_crf("HQ"), 1920, 1080, false), 16);
        assert_eq!(base_crf("Small"), 23);
    }

    #[test]
    fn test_qsv_falls_back_to_cqp() {
        let icq = recording_settings(VideoEncoderFamily::Qsv, 20, true);
        assert_eq!(icq["rate_control"], "ICQ");
        assert_eq!(icq["icq_quality"], 20);

        let cqp = recording_settings(VideoEncoderFamily::Qsv, 20, false);
        assert_eq!(cqp["rate_control"], "CQP");
        assert_eq!(cqp["qpb"], 20);
        assert!(cqp.get("icq_quality").is_none());
    }

    #[test]
    fn test_x264_preset_follows_low_cpu() {
        let fast = recording_settings(VideoEncoderFamily::X264, 23, false);
        let low = recording_settings(VideoEncoderFamily::X264LowCpu, 21, false);
        assert_eq!(fast["preset"], "veryfast");
        assert_eq!(low["preset"], "ultrafast");
        assert_eq!(low["crf"], 21);
    }

    #[test]
    fn test_amd_streaming_block() {
        let mut settings = EngineSettings::new();
        apply_amd_streaming(&mut settings, 6000);
        assert_eq!(settings["RateControlMethod"], 3);
        assert_eq!(settings["VBVBuffer.Size"], 6000);
        assert_eq!(settings["Bitrate.Target"], 6000);
    }

    #[test]
    fn test_uses_bitrate() {
        let as_settings = |v: serde_json::Value| v.as_object().cloned().unwrap();
        assert!(uses_bitrate(&as_settings(json!({ "rate_control": "cbr" }))));
        assert!(uses_bitrate(&as_settings(json!({ "rate_control": "VBR" }))));
        assert!(!uses_bitrate(&as_settings(json!({ "rate_control": "CRF" }))));
        assert!(!uses_bitrate(&EngineSettings::new()));
    }
}
