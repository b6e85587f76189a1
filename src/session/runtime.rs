//! Event loop that owns the session controller.
//!
//! Host calls, capture callbacks and permission answers all land in one
//! unbounded queue and are applied by a single task, which gives the
//! one-callback-at-a-time semantics of a UI event loop without locks.

use crate::config::VoiceConfig;
use crate::error::{Result, VoiceError};
use crate::runtime::SessionEvent;
use crate::session::controller::{SessionAdapters, VoiceSessionController};
use crate::session::messages::{SessionInput, SessionSnapshot};
use crate::stt::CaptureEventSink;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cloneable handle for driving a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionInput>,
    events: broadcast::Sender<SessionEvent>,
}

/// Receiving side of the session queue, consumed by [`SessionRuntime::new`].
#[derive(Debug)]
pub struct SessionMailbox {
    rx: mpsc::UnboundedReceiver<SessionInput>,
}

/// Create the session queue and event stream.
///
/// The handle exists before the runtime so capture adapters can be given a
/// [`CaptureEventSink`] at construction.
#[must_use]
pub fn session_channel(event_capacity: usize) -> (SessionHandle, SessionMailbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(event_capacity.max(1));
    (SessionHandle { tx, events }, SessionMailbox { rx })
}

impl SessionHandle {
    fn send(&self, input: SessionInput) -> Result<()> {
        self.tx
            .send(input)
            .map_err(|e| VoiceError::Channel(format!("session runtime not running: {e}")))
    }

    /// # Errors
    ///
    /// Returns [`VoiceError::Channel`] if the runtime has stopped.
    pub fn open(&self) -> Result<()> {
        self.send(SessionInput::Open)
    }

    /// # Errors
    ///
    /// Returns [`VoiceError::Channel`] if the runtime has stopped.
    pub fn close(&self) -> Result<()> {
        self.send(SessionInput::Close)
    }

    /// # Errors
    ///
    /// Returns [`VoiceError::Channel`] if the runtime has stopped.
    pub fn toggle_listening(&self) -> Result<()> {
        self.send(SessionInput::ToggleListening)
    }

    /// Sink for capture adapters feeding this session.
    #[must_use]
    pub fn capture_sink(&self) -> CaptureEventSink {
        CaptureEventSink::new(self.tx.clone())
    }

    /// Current state, taken after every input queued before this call.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Channel`] if the runtime has stopped.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionInput::Snapshot(reply_tx))?;
        reply_rx
            .await
            .map_err(|e| VoiceError::Channel(format!("session snapshot dropped: {e}")))
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Single task applying queued inputs to the controller.
pub struct SessionRuntime {
    controller: VoiceSessionController,
    mailbox: SessionMailbox,
    cancel: CancellationToken,
}

impl SessionRuntime {
    #[must_use]
    pub fn new(
        config: &VoiceConfig,
        adapters: SessionAdapters,
        handle: &SessionHandle,
        mailbox: SessionMailbox,
    ) -> Self {
        let controller =
            VoiceSessionController::new(config, adapters, handle.tx.clone(), handle.events.clone());
        Self {
            controller,
            mailbox,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops [`SessionRuntime::run`].
    ///
    /// The controller keeps a sender to its own queue for permission
    /// answers, so the queue never closes on its own; cancellation is the
    /// shutdown path.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Apply inputs until cancelled, then close the session.
    pub async fn run(mut self) {
        info!("voice session runtime started");
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                input = self.mailbox.rx.recv() => match input {
                    Some(input) => self.controller.handle(input),
                    None => break,
                },
            }
        }
        self.controller.close();
        info!("voice session runtime stopped");
    }
}
