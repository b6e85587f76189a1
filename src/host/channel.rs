//! Host command channel and router for the voice session.

use crate::error::{Result, VoiceError};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use crate::permissions::PermissionBroker;
use crate::runtime::SessionEvent;
use crate::session::runtime::SessionHandle;
use crate::stt::{CaptureErrorKind, CaptureEventSink};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<Result<ResponseEnvelope>>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            VoiceError::Session(format!(
                "invalid host command envelope {}: {}",
                envelope.request_id, e
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| VoiceError::Channel(format!("failed to send host command request: {e}")))?;

        response_rx
            .await
            .map_err(|e| VoiceError::Channel(format!("host command response dropped: {e}")))?
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }
}

pub struct HostCommandServer {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    session: SessionHandle,
    capture: CaptureEventSink,
    permissions: PermissionBroker,
}

/// Create a command channel routing into `session`.
///
/// `event_tx` is the broadcast channel the host adapters already publish
/// on, so clients see adapter requests and session events on one stream.
#[must_use]
pub fn command_channel(
    request_capacity: usize,
    event_tx: broadcast::Sender<EventEnvelope>,
    session: SessionHandle,
    permissions: PermissionBroker,
) -> (HostCommandClient, HostCommandServer) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    let capture = session.capture_sink();

    (
        HostCommandClient {
            request_tx,
            event_tx,
        },
        HostCommandServer {
            request_rx,
            session,
            capture,
            permissions,
        },
    )
}

impl HostCommandServer {
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let response = self.route(&request.envelope).await;
            let _ = request.response_tx.send(response);
        }
    }

    /// Route a command envelope to the session or its adapters.
    pub async fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let request_id = envelope.request_id.clone();
        match envelope.command {
            CommandName::HostPing => Ok(ResponseEnvelope::ok(
                request_id,
                serde_json::json!({"pong": true}),
            )),
            CommandName::HostVersion => Ok(ResponseEnvelope::ok(
                request_id,
                serde_json::json!({
                    "contract_version": crate::host::contract::EVENT_VERSION,
                    "channel": "nova_host_v1",
                    "version": env!("CARGO_PKG_VERSION"),
                }),
            )),
            CommandName::SessionOpen => {
                self.session.open()?;
                Ok(accepted(request_id))
            }
            CommandName::SessionClose => {
                self.session.close()?;
                Ok(accepted(request_id))
            }
            CommandName::SessionToggleListening => {
                self.session.toggle_listening()?;
                Ok(accepted(request_id))
            }
            CommandName::SessionState => {
                let snapshot = self.session.snapshot().await?;
                let payload = serde_json::to_value(snapshot).map_err(|e| {
                    VoiceError::Session(format!("failed to serialize session state: {e}"))
                })?;
                Ok(ResponseEnvelope::ok(request_id, payload))
            }
            CommandName::CaptureStarted => {
                self.capture.started();
                Ok(accepted(request_id))
            }
            CommandName::CaptureResult => {
                let (transcript, is_final) = parse_capture_result(&envelope.payload)?;
                self.capture.result(transcript, is_final);
                Ok(accepted(request_id))
            }
            CommandName::CaptureError => {
                let kind = parse_capture_error(&envelope.payload)?;
                self.capture.error(kind);
                Ok(ResponseEnvelope::ok(
                    request_id,
                    serde_json::json!({"accepted": true, "kind": kind.as_str()}),
                ))
            }
            CommandName::CaptureEnded => {
                self.capture.ended();
                Ok(accepted(request_id))
            }
            CommandName::PermissionRespond => {
                let (id, granted) = parse_permission_response(&envelope.payload)?;
                self.permissions.respond(&id, granted)?;
                Ok(accepted(request_id))
            }
            CommandName::RuntimeStop => Ok(ResponseEnvelope::ok(
                request_id,
                serde_json::json!({"stopping": true}),
            )),
        }
    }
}

fn accepted(request_id: String) -> ResponseEnvelope {
    ResponseEnvelope::ok(request_id, serde_json::json!({"accepted": true}))
}

/// Republish session events as host event envelopes until either side closes.
pub async fn forward_session_events(
    mut session_events: broadcast::Receiver<SessionEvent>,
    event_tx: broadcast::Sender<EventEnvelope>,
) {
    loop {
        match session_events.recv().await {
            Ok(event) => {
                let envelope = EventEnvelope::fresh(event.name(), event.payload());
                if event_tx.send(envelope).is_err() {
                    debug!("no host event subscribers for session event");
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(lagged = n, "session event forwarder lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn parse_capture_result(payload: &serde_json::Value) -> Result<(String, bool)> {
    let Some(transcript) = payload.get("transcript").and_then(serde_json::Value::as_str) else {
        return Err(VoiceError::Session(
            "capture.result requires payload.transcript".to_owned(),
        ));
    };
    let is_final = match payload.get("is_final") {
        None => true,
        Some(value) => value.as_bool().ok_or_else(|| {
            VoiceError::Session("capture.result payload.is_final must be a boolean".to_owned())
        })?,
    };
    Ok((transcript.to_owned(), is_final))
}

fn parse_capture_error(payload: &serde_json::Value) -> Result<CaptureErrorKind> {
    let Some(code) = payload.get("code").and_then(serde_json::Value::as_str) else {
        return Err(VoiceError::Session(
            "capture.error requires payload.code".to_owned(),
        ));
    };
    Ok(CaptureErrorKind::from_code(code))
}

fn parse_permission_response(payload: &serde_json::Value) -> Result<(String, bool)> {
    let Some(id) = payload.get("id").and_then(serde_json::Value::as_str) else {
        return Err(VoiceError::Session(
            "permission.respond requires payload.id".to_owned(),
        ));
    };
    let Some(granted) = payload.get("granted").and_then(serde_json::Value::as_bool) else {
        return Err(VoiceError::Session(
            "permission.respond requires payload.granted (boolean)".to_owned(),
        ));
    };
    Ok((id.to_owned(), granted))
}
