//! Newline-delimited JSON bridge between a host shell and the voice session.
//!
//! Reads `CommandEnvelope` lines, dispatches them through the host command
//! router, and writes `ResponseEnvelope` and `EventEnvelope` lines back.
//!
//! When running over stdio, stdout is reserved for the protocol; all
//! diagnostics go to stderr.

use crate::config::VoiceConfig;
use crate::error::{Result, VoiceError};
use crate::host::adapters::build_host_session;
use crate::host::channel::{HostCommandClient, command_channel, forward_session_events};
use crate::host::contract::{CommandEnvelope, CommandName, ResponseEnvelope};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, broadcast};

/// Run the bridge on stdin/stdout until stdin closes or `runtime.stop`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or stdio fails.
pub async fn run_stdio_bridge(config: VoiceConfig) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::BufWriter::new(tokio::io::stdout());
    run_bridge(config, reader, writer).await
}

/// Run the bridge over arbitrary line-oriented I/O.
///
/// Four tasks run alongside the reader: the session runtime, the command
/// router, the session-event forwarder, and the event writer. All of them
/// are torn down when the reader finishes.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or I/O fails.
pub async fn run_bridge<R, W>(config: VoiceConfig, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (event_tx, _) = broadcast::channel(config.host.event_capacity.max(1));
    let session = build_host_session(&config, event_tx.clone())?;
    let (client, server) = command_channel(
        config.host.request_capacity,
        event_tx.clone(),
        session.handle.clone(),
        session.permissions.clone(),
    );

    let writer = Arc::new(Mutex::new(writer));

    // Subscribe before anything can emit so no early event is lost.
    let mut event_rx = client.subscribe_events();
    let session_events = session.handle.subscribe();

    let cancel = session.runtime.cancel_token();
    let runtime_handle = tokio::spawn(session.runtime.run());
    let server_handle = tokio::spawn(server.run());
    let forward_handle = tokio::spawn(forward_session_events(session_events, event_tx));

    let event_writer = Arc::clone(&writer);
    let event_handle = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event_envelope) => match serde_json::to_string(&event_envelope) {
                    Ok(json) => {
                        let mut w = event_writer.lock().await;
                        if let Err(e) = write_line(&mut *w, &json).await {
                            tracing::warn!(
                                error = %e,
                                "failed to write event envelope; stopping event writer"
                            );
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize event envelope; skipping");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "event writer lagged; some events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("event channel closed; stopping event writer");
                    break;
                }
            }
        }
    });

    let reader_result = run_reader(client, reader, Arc::clone(&writer)).await;

    // Closing the session cancels speech and capture; give the event writer
    // a moment to flush those before tearing it down.
    cancel.cancel();
    let _ = runtime_handle.await;
    let _ = server_handle.await;
    tokio::task::yield_now().await;
    forward_handle.abort();
    let _ = forward_handle.await;
    tokio::task::yield_now().await;
    event_handle.abort();
    let _ = event_handle.await;

    reader_result
}

/// Read command lines, dispatch each one, and write the responses.
async fn run_reader<R, W>(
    client: HostCommandClient,
    mut reader: R,
    writer: Arc<Mutex<W>>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| VoiceError::Channel(format!("failed to read command line: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                write_response(&writer, &response).await?;
                continue;
            }
        };

        let is_stop = envelope.command == CommandName::RuntimeStop;
        let request_id = envelope.request_id.clone();

        let response = match client.send(envelope).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, request_id, "host command failed");
                ResponseEnvelope::error(request_id, e.to_string())
            }
        };
        write_response(&writer, &response).await?;

        if is_stop {
            tracing::info!("runtime.stop received; shutting down bridge");
            break;
        }
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &Mutex<W>,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| VoiceError::Session(format!("failed to serialize response envelope: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut *w, &json).await
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| VoiceError::Channel(format!("failed to write output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| VoiceError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| VoiceError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
