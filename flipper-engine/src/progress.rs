use tracing::warn;

/// Best-effort progress sink: emitting must never block a scan, and a
/// dropped or full receiver must never change results (§4.1.5). Grounded
/// on `barter-integration::channel::{ChannelTxDroppable, UnboundedTx}` —
/// the teacher's pattern for degrading a dead receiver to a silent drop
/// instead of propagating a send error up the call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Active,
    Disabled,
}

pub struct ProgressSink {
    tx: tokio::sync::mpsc::UnboundedSender<String>,
    state: std::sync::Mutex<ChannelState>,
}

impl ProgressSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<String>) -> Self {
        Self {
            tx,
            state: std::sync::Mutex::new(ChannelState::Active),
        }
    }

    /// A sink with no receiver at all — used by callers (tests, the route
    /// builder's inner beam-search helper) that do not care about
    /// progress, without needing an `Option<ProgressSink>` everywhere.
    pub fn noop() -> (Self, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, message: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        if *state == ChannelState::Disabled {
            return;
        }
        if self.tx.send(message.into()).is_err() {
            warn!("progress receiver dropped - further progress events will be discarded");
            *state = ChannelState::Disabled;
        }
    }
}
