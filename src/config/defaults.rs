//! Default values for the basic configuration

use super::{section, ConfigAccessor};
use serde_json::Value;

/// Default recording file name template
pub const DEFAULT_FILENAME_FORMAT: &str = "%CCYY-%MM-%DD %hh-%mm-%ss";

/// Install the defaults layer every basic configuration starts from
pub fn apply_basic_defaults(config: &mut dyn ConfigAccessor) {
    let defaults: &[(&str, &str, Value)] = &[
        // Output
        (section::OUTPUT, "Mode", Value::from("Simple")),
        (section::OUTPUT, "FilenameFormatting", Value::from(DEFAULT_FILENAME_FORMAT)),
        (section::OUTPUT, "OverwriteIfExists", Value::from(false)),
        (section::OUTPUT, "Reconnect", Value::from(true)),
        (section::OUTPUT, "RetryDelay", Value::from(10)),
        (section::OUTPUT, "MaxRetries", Value::from(20)),
        (section::OUTPUT, "DelayEnable", Value::from(false)),
        (section::OUTPUT, "DelaySec", Value::from(20)),
        (section::OUTPUT, "DelayPreserve", Value::from(true)),
        (section::OUTPUT, "BindIP", Value::from("default")),
        (section::OUTPUT, "NewSocketLoopEnable", Value::from(false)),
        (section::OUTPUT, "LowLatencyEnable", Value::from(false)),
        // Simple output
        (section::SIMPLE_OUTPUT, "FilePath", Value::from("")),
        (section::SIMPLE_OUTPUT, "RecFormat", Value::from("flv")),
        (section::SIMPLE_OUTPUT, "VBitrate", Value::from(2500)),
        (section::SIMPLE_OUTPUT, "ABitrate", Value::from(160)),
        (section::SIMPLE_OUTPUT, "UseAdvanced", Value::from(false)),
        (section::SIMPLE_OUTPUT, "EnforceBitrate", Value::from(true)),
        (section::SIMPLE_OUTPUT, "Preset", Value::from("veryfast")),
        (section::SIMPLE_OUTPUT, "NVENCPreset", Value::from("hq")),
        (section::SIMPLE_OUTPUT, "QSVPreset", Value::from("balanced")),
        (section::SIMPLE_OUTPUT, "AMDPreset", Value::from("balanced")),
        (section::SIMPLE_OUTPUT, "StreamEncoder", Value::from("x264")),
        (section::SIMPLE_OUTPUT, "RecEncoder", Value::from("x264")),
        (section::SIMPLE_OUTPUT, "RecQuality", Value::from("Stream")),
        (section::SIMPLE_OUTPUT, "FileNameWithoutSpace", Value::from(false)),
        (section::SIMPLE_OUTPUT, "RecRB", Value::from(false)),
        (section::SIMPLE_OUTPUT, "RecRBTime", Value::from(20)),
        (section::SIMPLE_OUTPUT, "RecRBSize", Value::from(512)),
        (section::SIMPLE_OUTPUT, "RecRBPrefix", Value::from("Replay")),
        // Advanced output
        (section::ADV_OUT, "ApplyServiceSettings", Value::from(true)),
        (section::ADV_OUT, "Encoder", Value::from("obs_x264")),
        (section::ADV_OUT, "TrackIndex", Value::from(1)),
        (section::ADV_OUT, "RecType", Value::from("Standard")),
        (section::ADV_OUT, "RecFilePath", Value::from("")),
        (section::ADV_OUT, "RecFileNameWithoutSpace", Value::from(false)),
        (section::ADV_OUT, "RecFormat", Value::from("flv")),
        (section::ADV_OUT, "RecRescale", Value::from(false)),
        (section::ADV_OUT, "RecTracks", Value::from(1)),
        (section::ADV_OUT, "RecEncoder", Value::from("none")),
        (section::ADV_OUT, "RecRBTime", Value::from(20)),
        (section::ADV_OUT, "RecRBSize", Value::from(512)),
        (section::ADV_OUT, "FFOutputToFile", Value::from(true)),
        (section::ADV_OUT, "FFExtension", Value::from("mp4")),
        (section::ADV_OUT, "FFFormat", Value::from("")),
        (section::ADV_OUT, "FFFormatMimeType", Value::from("")),
        (section::ADV_OUT, "FFVGOPSize", Value::from(250)),
        (section::ADV_OUT, "FFVBitrate", Value::from(2500)),
        (section::ADV_OUT, "FFABitrate", Value::from(160)),
        (section::ADV_OUT, "FFAudioTrack", Value::from(1)),
        (section::ADV_OUT, "Track1Bitrate", Value::from(160)),
        (section::ADV_OUT, "Track2Bitrate", Value::from(160)),
        (section::ADV_OUT, "Track3Bitrate", Value::from(160)),
        (section::ADV_OUT, "Track4Bitrate", Value::from(160)),
        (section::ADV_OUT, "Track5Bitrate", Value::from(160)),
        (section::ADV_OUT, "Track6Bitrate", Value::from(160)),
        // Video
        (section::VIDEO, "BaseCX", Value::from(0)),
        (section::VIDEO, "BaseCY", Value::from(0)),
        (section::VIDEO, "OutputCX", Value::from(0)),
        (section::VIDEO, "OutputCY", Value::from(0)),
        (section::VIDEO, "FPSType", Value::from(0)),
        (section::VIDEO, "FPSCommon", Value::from("30")),
        (section::VIDEO, "FPSInt", Value::from(30)),
        (section::VIDEO, "FPSNum", Value::from(30)),
        (section::VIDEO, "FPSDen", Value::from(1)),
        (section::VIDEO, "ScaleType", Value::from("bicubic")),
        (section::VIDEO, "ColorFormat", Value::from("NV12")),
        (section::VIDEO, "ColorSpace", Value::from("601")),
        (section::VIDEO, "ColorRange", Value::from("Partial")),
        // Audio
        (section::AUDIO, "SampleRate", Value::from(44100)),
        (section::AUDIO, "ChannelSetup", Value::from("Stereo")),
    ];

    for (section, key, value) in defaults {
        config.set_default(section, key, value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfig;

    #[test]
    fn test_defaults_are_not_user_values() {
        let mut config = JsonConfig::in_memory();
        apply_basic_defaults(&mut config);

        assert_eq!(
            config.get_string(section::OUTPUT, "Mode").as_deref(),
            Some("Simple")
        );
        assert_eq!(config.get_uint(section::AUDIO, "SampleRate"), 44100);
        assert!(!config.has_user_value(section::OUTPUT, "Mode"));
    }
}
