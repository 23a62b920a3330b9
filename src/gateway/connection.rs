//! Per-connection WebSocket handling: split send/receive tasks, ping/pong
//! liveness, inbound frame dispatch to the orchestrator (spec §4.H, §5).

use super::frames::{
    error_frame, ChatPayload, ChatResponsePayload, ConnectionEstablishedPayload, InboundFrame,
    OutboundFrame, StreamChunkPayload,
};
use super::server::GatewayState;
use crate::error::Error;
use crate::llm::{ChannelSink, StreamChunk};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

const QUEUE_OVERFLOW_CLOSE: (u16, &str) = (1013, "Server overloaded");

/// Wall-clock millis since epoch, tracked as an atomic so the ping reaper
/// can read it without locking the connection.
struct Liveness(AtomicI64);

impl Liveness {
    fn now() -> Self {
        Self(AtomicI64::new(chrono::Utc::now().timestamp_millis()))
    }

    fn touch(&self) {
        self.0.store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let last = self.0.load(Ordering::Relaxed);
        let now = chrono::Utc::now().timestamp_millis();
        Duration::from_millis((now - last).max(0) as u64)
    }
}

pub async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let current = state.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
    if current > state.max_connections {
        state.active_connections.fetch_sub(1, Ordering::SeqCst);
        let (mut sender, _) = socket.split();
        let _ = sender
            .send(WsMessage::Close(Some(axum::extract::ws::CloseFrame {
                code: QUEUE_OVERFLOW_CLOSE.0,
                reason: QUEUE_OVERFLOW_CLOSE.1.into(),
            })))
            .await;
        return;
    }

    let session_id = Uuid::new_v4().to_string();
    let result = run_connection(socket, state.clone(), session_id.clone()).await;
    state.active_connections.fetch_sub(1, Ordering::SeqCst);
    if let Err(e) = result {
        warn!(session_id, error = %e, "connection ended with error");
    } else {
        info!(session_id, "connection closed");
    }
}

async fn run_connection(
    socket: WebSocket,
    state: GatewayState,
    session_id: String,
) -> crate::error::Result<()> {
    use futures_util::{SinkExt, StreamExt};

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(state.message_queue_size);
    let liveness = Arc::new(Liveness::now());
    let shutdown = CancellationToken::new();

    let send_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = outbound_rx.recv() => {
                        match frame {
                            Some(frame) => {
                                if ws_sender.send(WsMessage::Text(frame.to_json().into())).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
            let _ = ws_sender.close().await;
        })
    };

    outbound_tx
        .send(OutboundFrame::ConnectionEstablished {
            payload: ConnectionEstablishedPayload { session_id: session_id.clone() },
            timestamp: chrono::Utc::now(),
        })
        .await
        .map_err(|_| Error::other("failed to queue connection-established frame"))?;

    let mut ping_ticker = tokio::time::interval(state.ping_interval);
    ping_ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                let Some(inbound) = inbound else { break };
                let Ok(inbound) = inbound else { break };
                liveness.touch();
                match inbound {
                    WsMessage::Text(text) => {
                        if let Err(e) = dispatch_frame(&text, &state, &session_id, &outbound_tx, &shutdown).await {
                            warn!(session_id, error = %e, "failed to dispatch inbound frame");
                        }
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            _ = ping_ticker.tick() => {
                if liveness.idle_for() > state.ping_interval * 2 {
                    info!(session_id, "connection idle past 2x ping interval, closing");
                    break;
                }
            }
        }
    }

    shutdown.cancel();
    let _ = send_task.await;
    Ok(())
}

async fn dispatch_frame(
    text: &str,
    state: &GatewayState,
    session_id: &str,
    outbound_tx: &mpsc::Sender<OutboundFrame>,
    shutdown: &CancellationToken,
) -> crate::error::Result<()> {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(session_id, error = %e, "dropping unparseable inbound frame");
            return Ok(());
        }
    };

    match frame.kind.as_str() {
        "PING" => {
            let id = frame.id.unwrap_or_default();
            outbound_tx
                .send(OutboundFrame::Pong { id, timestamp: chrono::Utc::now() })
                .await
                .map_err(|_| Error::other("outbound queue closed"))?;
        }
        "CHAT_MESSAGE" => {
            let Some(id) = frame.id else {
                warn!(session_id, "CHAT_MESSAGE with no id, dropping");
                return Ok(());
            };
            let payload: ChatPayload = match frame.payload.and_then(|p| serde_json::from_value(p).ok()) {
                Some(p) => p,
                None => {
                    let err = Error::invalid_message("CHAT_MESSAGE payload missing or malformed");
                    outbound_tx.send(error_frame(Some(id), &err)).await.ok();
                    return Ok(());
                }
            };
            let effective_session = payload.session_id.clone().unwrap_or_else(|| session_id.to_string());
            handle_chat_message(state, effective_session, id, payload, outbound_tx, shutdown).await?;
        }
        other => {
            warn!(session_id, frame_type = other, "unknown inbound frame type, no reply");
        }
    }
    Ok(())
}

/// Drive one `CHAT_MESSAGE` through the orchestrator's streaming op,
/// collecting content deltas rather than forwarding them live. The wire
/// framing is only decided once the outcome is known: a request that
/// resolved in a single round with no tool calls (spec §8 scenario 1) gets
/// exactly one `CHAT_RESPONSE`; one that needed tool round-trips gets the
/// buffered deltas replayed as `STREAM_CHUNK`s followed by `STREAM_END`.
async fn handle_chat_message(
    state: &GatewayState,
    session_id: String,
    request_id: String,
    payload: ChatPayload,
    outbound_tx: &mpsc::Sender<OutboundFrame>,
    shutdown: &CancellationToken,
) -> crate::error::Result<()> {
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<StreamChunk>(32);
    let sink = ChannelSink(chunk_tx);

    let orchestrator = state.orchestrator.clone();
    let collect_task = tokio::spawn(async move {
        let mut deltas = Vec::new();
        while let Some(chunk) = chunk_rx.recv().await {
            if let StreamChunk::Content { delta } = chunk {
                deltas.push(delta);
            }
        }
        deltas
    });

    let cancel = shutdown.clone();
    state.telemetry.record_llm_request();
    let outcome = orchestrator
        .process_stream(&session_id, &payload.message, payload.history, &sink, cancel)
        .await;
    drop(sink);
    let deltas = collect_task.await.unwrap_or_default();

    match outcome {
        Ok(message) => {
            if message.error.is_some() {
                state.telemetry.record_llm_failure();
            }
            if message.tool_results.is_empty() {
                outbound_tx
                    .send(OutboundFrame::ChatResponse {
                        id: request_id,
                        payload: ChatResponsePayload { message, session_id },
                        timestamp: chrono::Utc::now(),
                    })
                    .await
                    .map_err(|_| Error::other("outbound queue closed"))?;
            } else {
                for delta in deltas {
                    if outbound_tx
                        .send(OutboundFrame::StreamChunk {
                            id: request_id.clone(),
                            payload: StreamChunkPayload { delta, session_id: session_id.clone() },
                        })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                outbound_tx
                    .send(OutboundFrame::StreamEnd {
                        id: request_id,
                        payload: ChatResponsePayload { message, session_id },
                        timestamp: chrono::Utc::now(),
                    })
                    .await
                    .map_err(|_| Error::other("outbound queue closed"))?;
            }
        }
        Err(Error::Cancelled) => {
            // no reply for a cancelled request, per spec §7 policy
        }
        Err(e) => {
            state.telemetry.record_llm_failure();
            outbound_tx.send(error_frame(Some(request_id), &e)).await.ok();
        }
    }
    Ok(())
}
