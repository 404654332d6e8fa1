use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::hub::{ClientHandle, OUTBOUND_QUEUE_CAPACITY};
use crate::protocol::{codec, ids, ErrorCode, ServerMessage};
use crate::server::GameServer;

/// Ping cadence on the write side.
pub const PING_PERIOD: Duration = Duration::from_secs(54);
/// Read deadline; refreshed by any inbound frame including pongs.
pub const PONG_WAIT: Duration = Duration::from_secs(60);
/// Write deadline for a single frame.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

pub(super) async fn handle_socket(socket: WebSocket, server: Arc<GameServer>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(OUTBOUND_QUEUE_CAPACITY);

    let player_id = ids::generate_player_id();
    let handle = ClientHandle::new(player_id.clone(), tx);
    let closed = handle.closed();
    server.hub.register(handle).await;
    info!(%player_id, "WebSocket connection established");

    server.hub.send_to_player(
        &player_id,
        ServerMessage::Connected {
            player_id: player_id.clone(),
        },
    );

    // Write pump: drains the outbound queue, coalescing whatever is
    // immediately available into one LF-separated frame, and keeps the
    // peer alive with periodic pings.
    let write_player_id = player_id.clone();
    let write_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_PERIOD);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ping.tick().await;

        loop {
            tokio::select! {
                () = closed.cancelled() => break,
                maybe = rx.recv() => {
                    let Some(first) = maybe else { break };
                    let mut frames = vec![codec::encode(&first)];
                    while let Ok(next) = rx.try_recv() {
                        frames.push(codec::encode(&next));
                    }
                    let batch = codec::join_frames(&frames);
                    match timeout(WRITE_WAIT, sender.send(Message::Text(batch.into()))).await {
                        Ok(Ok(())) => {
                            debug!(player_id = %write_player_id, frames = frames.len(), "Flushed outbound batch");
                        }
                        Ok(Err(err)) => {
                            debug!(player_id = %write_player_id, error = %err, "Write failed");
                            break;
                        }
                        Err(_) => {
                            warn!(player_id = %write_player_id, "Write deadline exceeded");
                            break;
                        }
                    }
                }
                _ = ping.tick() => {
                    let ping_frame = Message::Ping(Vec::new().into());
                    if !matches!(timeout(WRITE_WAIT, sender.send(ping_frame)).await, Ok(Ok(()))) {
                        debug!(player_id = %write_player_id, "Ping failed");
                        break;
                    }
                }
            }
        }
    });

    // Read pump: enforces the keep-alive deadline, dispatches text frames,
    // and invokes the disconnect hook on the way out. Reconnection swaps
    // the connection onto the original player identity mid-stream.
    let read_server = Arc::clone(&server);
    let read_task = tokio::spawn(async move {
        let mut player_id = player_id;
        loop {
            let frame = match timeout(PONG_WAIT, receiver.next()).await {
                Err(_) => {
                    info!(%player_id, "Keep-alive expired");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(err))) => {
                    debug!(%player_id, error = %err, "Read error");
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Message::Text(text) => {
                    if let Some(new_id) = read_server.handle_frame(&player_id, &text).await {
                        player_id = new_id;
                    }
                }
                Message::Binary(_) => {
                    read_server.send_error(
                        &player_id,
                        ErrorCode::InvalidMessage,
                        "binary frames are not part of this protocol",
                    );
                }
                Message::Close(_) => {
                    info!(%player_id, "WebSocket connection closed");
                    break;
                }
                // Any pong (or ping) already refreshed the read deadline
                Message::Pong(_) | Message::Ping(_) => {}
            }
        }

        read_server.handle_disconnect(&player_id).await;
    });

    // The disconnect hook cancels the write task's token, so both pumps
    // wind down once the read side exits.
    let _ = read_task.await;
    let _ = write_task.await;
}
