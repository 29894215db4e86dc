//! Per-connection protocol handler.
//!
//! Each connection runs a two-state machine: unauthenticated until a valid
//! `presence` record claims a nickname, then an authenticated dispatch
//! loop. Waiting for the next line (or the close signal) is the only
//! suspension point; everything after a read is synchronous apart from the
//! relay lock.

use crate::error::ProtocolError;
use crate::outbound::{self, OutboundSender};
use crate::server::{ChatRelay, RegisterError};
use futures::StreamExt;
use pairlink_types::{parse_line, ClientPacket, ServerPacket};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// Drive one client connection to completion.
pub async fn run_connection(relay: Arc<ChatRelay>, stream: TcpStream, addr: SocketAddr) {
    let (read_half, write_half) = stream.into_split();
    let outbound = outbound::spawn_writer(write_half, relay.config().limits.outbound_queue_depth);
    let codec = LinesCodec::new_with_max_length(relay.config().limits.max_line_bytes);
    let mut lines = FramedRead::new(read_half, codec);
    let closer = Arc::new(Notify::new());

    // Presence handshake: the first record must claim a nickname. Anything
    // else ends the connection with no side effects.
    let nick = match lines.next().await {
        Some(Ok(line)) => match parse_line(&line) {
            Ok(ClientPacket::Presence { nick }) => nick,
            Ok(_) | Err(_) => {
                tracing::debug!(%addr, "connection did not open with presence, closing");
                return;
            }
        },
        Some(Err(e)) => {
            tracing::debug!(%addr, "read failed before handshake: {e}");
            return;
        }
        None => return,
    };

    let conn_id = match relay
        .register(&nick, addr, outbound.clone(), closer.clone())
        .await
    {
        Ok(id) => id,
        Err(RegisterError::Banned(_)) => {
            let _ = outbound.enqueue(ServerPacket::Ban.to_line());
            tracing::info!(%addr, %nick, "banned nickname rejected");
            return;
        }
    };

    loop {
        tokio::select! {
            item = lines.next() => match item {
                Some(Ok(line)) => handle_line(&relay, &nick, &outbound, &line).await,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    // The codec resynchronizes at the next newline.
                    note_protocol_error(&relay, &nick, ProtocolError::LineTooLong);
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    tracing::debug!(%nick, "read failed: {e}");
                    break;
                }
                None => break,
            },
            _ = closer.notified() => break,
        }
    }

    relay.disconnect(&nick, conn_id).await;
}

/// Dispatch one authenticated-state record.
async fn handle_line(relay: &ChatRelay, nick: &str, outbound: &OutboundSender, line: &str) {
    match parse_line(line) {
        Ok(ClientPacket::CheckUsers { users }) => {
            let found = relay.check_users(&users).await;
            let reply = ServerPacket::RegisteredUsers { users: found };
            let _ = outbound.enqueue(reply.to_line());
        }
        Ok(ClientPacket::Routed(routed)) => relay.route(routed).await,
        Ok(ClientPacket::Presence { .. }) => {
            // Not part of the authenticated dispatch table.
            tracing::debug!(nick, "mid-stream presence discarded");
        }
        Err(e) => note_protocol_error(relay, nick, ProtocolError::Wire(e)),
    }
}

fn note_protocol_error(relay: &ChatRelay, nick: &str, err: ProtocolError) {
    relay
        .metrics()
        .protocol_errors
        .fetch_add(1, Ordering::Relaxed);
    tracing::debug!(nick, "discarding record: {err}");
}
