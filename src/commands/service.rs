//! Request dispatch

use super::{Reply, Request};
use crate::engine::VIDEO_SUCCESS;
use crate::session::Session;
use crate::signals::SignalRelay;
use crate::utils::BridgeError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Serializes calls into one session
///
/// `query` only touches the signal relay, so it never waits behind a running
/// operation.
pub struct ServiceBridge {
    session: Mutex<Session>,
    relay: Arc<SignalRelay>,
}

impl ServiceBridge {
    pub fn new(session: Session, relay: Arc<SignalRelay>) -> Self {
        Self {
            session: Mutex::new(session),
            relay,
        }
    }

    pub fn handle(&self, request: Request) -> Reply {
        if request == Request::Query {
            return Reply::ok().with_signal(self.relay.drain());
        }

        tracing::debug!("Handling {}", request.method());
        let mut session = self.session.lock();

        match request {
            Request::ResetAudioContext => match session.reset_audio_context(true) {
                Ok(true) => Reply::ok(),
                Ok(false) => BridgeError::Config("Engine rejected the audio settings".to_string()).into(),
                Err(e) => e.into(),
            },
            Request::ResetVideoContext => match session.reset_video_context(true) {
                Ok(VIDEO_SUCCESS) => Reply::ok(),
                Ok(code) => Reply::from(BridgeError::VideoReset(code)).with_engine_code(code),
                Err(e) => e.into(),
            },
            Request::StartStreaming => log_failure("streaming", session.start_streaming()),
            Request::StartRecording => log_failure("recording", session.start_recording()),
            Request::StartReplayBuffer => {
                log_failure("replay buffer", session.start_replay_buffer())
            }
            Request::StopStreaming { force_stop } => {
                session.stop_streaming(force_stop);
                Reply::ok()
            }
            Request::StopRecording => {
                session.stop_recording();
                Reply::ok()
            }
            Request::StopReplayBuffer { force_stop } => {
                session.stop_replay_buffer(force_stop);
                Reply::ok()
            }
            Request::ConnectOutputSignals => Reply::ok().with_count(session.connect_output_signals()),
            Request::ProcessReplayBufferHotkey => {
                Reply::ok().with_count(session.process_replay_buffer_hotkey())
            }
            Request::GetLastReplay => Reply::ok().with_path(session.last_replay()),
            Request::Query => Reply::ok().with_signal(self.relay.drain()),
        }
    }

    /// Persist what the session owns before shutting down
    pub fn shutdown(&self) {
        let session = self.session.lock();
        if let Err(e) = session.save_service() {
            tracing::warn!("Failed to save streaming service: {}", e);
        }
        if let Err(e) = session.config().save() {
            tracing::warn!("Failed to save configuration: {}", e);
        }
    }
}

fn log_failure(what: &str, result: Result<(), BridgeError>) -> Reply {
    if let Err(e) = &result {
        tracing::warn!("Failed to start {}: {}", what, e);
    }
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ReplyStatus;
    use crate::config::section;
    use crate::engine::{MediaEngine, SimulatedEngine};
    use tempfile::{tempdir, TempDir};

    fn bridge() -> (Arc<SimulatedEngine>, ServiceBridge, TempDir) {
        let dir = tempdir().unwrap();
        let engine = Arc::new(SimulatedEngine::new());
        let dyn_engine: Arc<dyn MediaEngine> = engine.clone();
        let relay = Arc::new(SignalRelay::new());

        let mut session = Session::open(dyn_engine, dir.path(), relay.clone()).unwrap();
        let videos = dir.path().join("videos");
        session
            .config_mut()
            .set_string(section::SIMPLE_OUTPUT, "FilePath", videos.to_str().unwrap());

        (engine, ServiceBridge::new(session, relay), dir)
    }

    #[test]
    fn test_start_then_query_signals() {
        let (_engine, bridge, _dir) = bridge();

        assert!(bridge.handle(Request::StartStreaming).is_ok());

        let first = bridge.handle(Request::Query).signal.unwrap();
        assert_eq!(first.output_type, "streaming");
        assert_eq!(first.signal, "starting");

        while bridge.handle(Request::Query).signal.is_some() {}
        assert!(bridge.handle(Request::Query).signal.is_none());
    }

    #[test]
    fn test_failed_start_is_error_reply() {
        let (engine, bridge, _dir) = bridge();
        engine.fail_start("rtmp_output");

        let reply = bridge.handle(Request::StartStreaming);
        assert_eq!(reply.status, ReplyStatus::Error);
        assert_eq!(reply.code.as_deref(), Some("START_ERROR"));
        assert!(reply.message.unwrap().contains("could not be started"));
    }

    #[test]
    fn test_video_reset_failure_carries_engine_code() {
        let (engine, bridge, _dir) = bridge();
        engine.set_video_result(-2);

        let reply = bridge.handle(Request::ResetVideoContext);
        assert_eq!(reply.status, ReplyStatus::Error);
        assert_eq!(reply.engine_code, Some(-2));

        engine.set_video_result(VIDEO_SUCCESS);
        assert!(bridge.handle(Request::ResetVideoContext).is_ok());
        assert!(bridge.handle(Request::ResetAudioContext).is_ok());
    }

    #[test]
    fn test_last_replay_and_hotkey_counts() {
        let (engine, bridge, _dir) = bridge();
        engine.register_hotkey("ReplayBuffer.Save", true);

        assert_eq!(bridge.handle(Request::GetLastReplay).path.as_deref(), Some(""));
        assert_eq!(bridge.handle(Request::ProcessReplayBufferHotkey).count, Some(1));
        assert_eq!(bridge.handle(Request::ConnectOutputSignals).count, Some(0));

        assert!(bridge.handle(Request::StopRecording).is_ok());
        assert!(bridge
            .handle(Request::StopReplayBuffer { force_stop: true })
            .is_ok());
    }
}
