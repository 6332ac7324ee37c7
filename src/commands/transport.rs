//! JSON-lines framing
//!
//! Each input line is `{"id": .., "call": {"method": .., "params": ..}}`; each
//! output line is `{"id": .., "reply": {..}}` with the same id. Lines that do
//! not parse get an error reply with a `null` id when none can be read.

use super::{Reply, Request, ServiceBridge};
use crate::utils::{BridgeError, BridgeResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Serialize)]
struct ReplyEnvelope {
    id: Value,
    reply: Reply,
}

/// Split a request line into its id and call
fn parse_line(line: &str) -> (Value, Result<Request, BridgeError>) {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => return (Value::Null, Err(e.into())),
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request = match value.get("call") {
        Some(call) => serde_json::from_value(call.clone()).map_err(BridgeError::from),
        None => Err(BridgeError::Config("Request has no call".to_string())),
    };
    (id, request)
}

/// Answer one request line
pub fn handle_line(bridge: &ServiceBridge, line: &str) -> BridgeResult<String> {
    let (id, request) = parse_line(line);
    let reply = match request {
        Ok(request) => bridge.handle(request),
        Err(e) => {
            tracing::warn!("Rejected request line: {}", e);
            e.into()
        }
    };
    Ok(serde_json::to_string(&ReplyEnvelope { id, reply })?)
}

/// Serve requests from `reader` until end of input
///
/// Each request runs on the blocking pool; replies are written in request
/// order.
pub async fn serve<R, W>(bridge: Arc<ServiceBridge>, reader: R, mut writer: W) -> BridgeResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let worker = bridge.clone();
        let response = tokio::task::spawn_blocking(move || handle_line(&worker, &line))
            .await
            .map_err(|e| BridgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    tracing::info!("Input closed, stopping transport");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MediaEngine, SimulatedEngine};
    use crate::session::Session;
    use crate::signals::SignalRelay;
    use tempfile::tempdir;

    fn bridge(dir: &std::path::Path) -> Arc<ServiceBridge> {
        let engine: Arc<dyn MediaEngine> = Arc::new(SimulatedEngine::new());
        let relay = Arc::new(SignalRelay::new());
        let session = Session::open(engine, dir, relay.clone()).unwrap();
        Arc::new(ServiceBridge::new(session, relay))
    }

    #[test]
    fn test_handle_line_echoes_id() {
        let dir = tempdir().unwrap();
        let bridge = bridge(dir.path());

        let out = handle_line(&bridge, r#"{"id":7,"call":{"method":"getLastReplay"}}"#).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["reply"]["status"], "ok");
        assert_eq!(value["reply"]["path"], "");
    }

    #[test]
    fn test_bad_lines_get_error_replies() {
        let dir = tempdir().unwrap();
        let bridge = bridge(dir.path());

        let out = handle_line(&bridge, "not json").unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["reply"]["status"], "error");

        let out = handle_line(&bridge, r#"{"id":"a","call":{"method":"explode"}}"#).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["id"], "a");
        assert_eq!(value["reply"]["code"], "SERIALIZATION_ERROR");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_serve_answers_in_order() {
        let dir = tempdir().unwrap();
        let bridge = bridge(dir.path());
        let input = concat!(
            r#"{"id":1,"call":{"method":"connectOutputSignals"}}"#,
            "\n\n",
            r#"{"id":2,"call":{"method":"query"}}"#,
            "\n",
        );
        let mut output = Vec::new();

        serve(bridge, input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[0]["reply"]["count"], 0);
        assert_eq!(replies[1]["id"], 2);
        assert!(replies[1]["reply"].get("signal").is_none());
    }
}
