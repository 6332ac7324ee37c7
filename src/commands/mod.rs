//! Remote call surface
//!
//! Every operation a caller can invoke is a [`Request`] variant; every answer
//! is a [`Reply`] with a leading `ok`/`error` status. [`ServiceBridge`]
//! dispatches requests to the session, [`transport`] frames them as JSON
//! lines.

pub mod service;
pub mod transport;

use crate::signals::SignalInfo;
use crate::utils::{BridgeError, ErrorResponse};
use serde::{Deserialize, Serialize};

pub use service::ServiceBridge;

/// Operations exposed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum Request {
    /// Reload the configuration and reset the audio pipeline
    ResetAudioContext,
    /// Reload the configuration and reset the video pipeline
    ResetVideoContext,
    StartStreaming,
    StartRecording,
    StartReplayBuffer,
    StopStreaming {
        #[serde(rename = "forceStop", default)]
        force_stop: bool,
    },
    StopRecording,
    StopReplayBuffer {
        #[serde(rename = "forceStop", default)]
        force_stop: bool,
    },
    ConnectOutputSignals,
    /// Pop one pending output signal
    Query,
    ProcessReplayBufferHotkey,
    GetLastReplay,
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Self::ResetAudioContext => "resetAudioContext",
            Self::ResetVideoContext => "resetVideoContext",
            Self::StartStreaming => "startStreaming",
            Self::StartRecording => "startRecording",
            Self::StartReplayBuffer => "startReplayBuffer",
            Self::StopStreaming { .. } => "stopStreaming",
            Self::StopRecording => "stopRecording",
            Self::StopReplayBuffer { .. } => "stopReplayBuffer",
            Self::ConnectOutputSignals => "connectOutputSignals",
            Self::Query => "query",
            Self::ProcessReplayBufferHotkey => "processReplayBufferHotkey",
            Self::GetLastReplay => "getLastReplay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// Answer to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub status: ReplyStatus,
    /// Error category, see [`ErrorResponse`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Engine result code of a failed video reset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Outputs connected or hotkeys fired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            code: None,
            message: None,
            engine_code: None,
            signal: None,
            path: None,
            count: None,
        }
    }

    pub fn error(response: ErrorResponse) -> Self {
        Self {
            status: ReplyStatus::Error,
            code: Some(response.code),
            message: Some(response.message),
            ..Self::ok()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    pub fn with_signal(mut self, signal: Option<SignalInfo>) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_path(mut self, path: String) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_engine_code(mut self, code: i32) -> Self {
        self.engine_code = Some(code);
        self
    }
}

impl From<BridgeError> for Reply {
    fn from(error: BridgeError) -> Self {
        Reply::error(error.into())
    }
}

impl<T> From<Result<T, BridgeError>> for Reply {
    fn from(result: Result<T, BridgeError>) -> Self {
        match result {
            Ok(_) => Reply::ok(),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request: Request =
            serde_json::from_value(json!({"method": "stopStreaming", "params": {"forceStop": true}}))
                .unwrap();
        assert_eq!(request, Request::StopStreaming { force_stop: true });

        let request: Request = serde_json::from_value(json!({"method": "query"})).unwrap();
        assert_eq!(request, Request::Query);
        assert_eq!(request.method(), "query");

        assert!(serde_json::from_value::<Request>(json!({"method": "launchRocket"})).is_err());
    }

    #[test]
    fn test_reply_omits_empty_fields() {
        let value = serde_json::to_value(Reply::ok().with_path(String::new())).unwrap();
        assert_eq!(value, json!({"status": "ok", "path": ""}));

        let value = serde_json::to_value(Reply::from(BridgeError::Config("no path".into()))).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "CONFIG_ERROR");
        assert_eq!(value["message"], "Configuration error: no path");
    }
}
