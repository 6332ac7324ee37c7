//! Output signal relay
//!
//! Engine threads deliver output signals to [`OutputSignalListener`]s, which
//! push [`SignalInfo`] records into one unbounded FIFO. Callers poll the FIFO
//! with [`SignalRelay::drain`], which never blocks.

use crate::engine::{MediaEngine, OutputId, SignalData, SignalListener, OUTPUT_ERROR};
use crate::output::OutputKind;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One relayed output signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalInfo {
    pub output_type: String,
    pub signal: String,
    /// Only meaningful for `stop`
    pub code: i32,
    /// Only meaningful for `stop`
    pub error_message: String,
}

impl SignalInfo {
    pub fn new(kind: OutputKind, signal: &str) -> Self {
        Self {
            output_type: kind.as_str().to_string(),
            signal: signal.to_string(),
            code: 0,
            error_message: String::new(),
        }
    }
}

/// Listener attached to every relayed signal of one output
struct OutputSignalListener {
    kind: OutputKind,
    sender: UnboundedSender<SignalInfo>,
    engine: Weak<dyn MediaEngine>,
}

impl SignalListener for OutputSignalListener {
    fn on_signal(&self, output: OutputId, signal: &str, data: &SignalData) {
        let mut info = SignalInfo::new(self.kind, signal);

        if signal == "stop" {
            info.code = data.code.unwrap_or(0);

            let last_error = self
                .engine
                .upgrade()
                .and_then(|engine| engine.output_last_error(output));
            if let Some(error) = last_error {
                if self.kind == OutputKind::Recording && info.code == 0 {
                    info.code = OUTPUT_ERROR;
                }
                info.error_message = error;
            }
        }

        tracing::debug!(
            "Signal {} from {} output (code {})",
            info.signal,
            info.output_type,
            info.code
        );

        if self.sender.send(info).is_err() {
            tracing::warn!("Signal relay closed, dropping {} signal", signal);
        }
    }
}

/// Process-wide signal FIFO
pub struct SignalRelay {
    sender: UnboundedSender<SignalInfo>,
    receiver: Mutex<UnboundedReceiver<SignalInfo>>,
    connected: Mutex<HashSet<OutputId>>,
}

impl Default for SignalRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalRelay {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            connected: Mutex::new(HashSet::new()),
        }
    }

    /// Subscribe to the kind's signal set on `output`
    ///
    /// Returns `false` without subscribing again if the output is already
    /// connected.
    pub fn connect(&self, engine: &Arc<dyn MediaEngine>, output: OutputId, kind: OutputKind) -> bool {
        if !self.connected.lock().insert(output) {
            return false;
        }

        let listener: Arc<dyn SignalListener> = Arc::new(OutputSignalListener {
            kind,
            sender: self.sender.clone(),
            engine: Arc::downgrade(engine),
        });
        for signal in kind.signals() {
            engine.connect_signal(output, signal, listener.clone());
        }

        tracing::debug!("Connected {} signals for {:?}", kind.as_str(), output);
        true
    }

    /// Forget a released output
    pub fn forget(&self, output: OutputId) {
        self.connected.lock().remove(&output);
    }

    pub fn is_connected(&self, output: OutputId) -> bool {
        self.connected.lock().contains(&output)
    }

    /// Pop the oldest pending signal, if any
    pub fn drain(&self) -> Option<SignalInfo> {
        self.receiver.lock().try_recv().ok()
    }
}
