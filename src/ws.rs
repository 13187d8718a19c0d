//! Per-connection WebSocket handling: URL routing (`/create`, `/join/:key`),
//! frame forwarding into and out of a room actor, and close-code translation.
//! Grounded in the teacher's `accept_connection`, replacing its JSON
//! text-frame loop with the binary wire protocol and room-actor plumbing.

use futures_util::{SinkExt, StreamExt, TryStreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::key;
use crate::registry::{Key, Registry};
use crate::session::{self, Outbound, RoomEvent, CLOSE_JOIN_REFUSED};
use crate::wire;

/// The close code used when the peer drops the TCP connection without a
/// WebSocket close handshake (no code is observable in that case).
const CLOSE_ABNORMAL: u16 = 1006;

pub async fn accept_connection(stream: TcpStream, registry: &'static Registry) {
    log::info!("accepted new connection");

    let mut path = None;
    let callback = |req: &Request, response: Response| {
        path = Some(req.uri().path().to_owned());
        Ok(response)
    };
    let stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(stream) => stream,
        Err(err) => {
            log::error!("error during websocket handshake: {err}");
            return;
        }
    };

    let Some((sender, created_key)) = resolve_room(path.as_deref(), registry) else {
        log::debug!("join refused for path {path:?}");
        close_immediately(stream, CLOSE_JOIN_REFUSED).await;
        return;
    };

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
    let (reply_tx, reply_rx) = oneshot::channel();
    if sender.send(RoomEvent::Join { outbound: out_tx.clone(), reply: reply_tx }).is_err() {
        close_immediately(stream, CLOSE_JOIN_REFUSED).await;
        return;
    }
    let Ok(Some(id)) = reply_rx.await else {
        close_immediately(stream, CLOSE_JOIN_REFUSED).await;
        return;
    };

    if let Some(key) = created_key {
        let _ = out_tx.send(Outbound::Frame(wire::game_key(key)));
    }

    let (mut write, read) = stream.split();
    let mut read = read.fuse();

    loop {
        tokio::select! {
            msg = read.try_next() => {
                match msg {
                    Ok(Some(Message::Binary(data))) => {
                        let _ = sender.send(RoomEvent::Frame { client: id, data });
                    }
                    Ok(Some(Message::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_ABNORMAL);
                        let _ = sender.send(RoomEvent::Disconnect { client: id, code });
                        break;
                    }
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => {
                        let _ = sender.send(RoomEvent::Disconnect { client: id, code: CLOSE_ABNORMAL });
                        break;
                    }
                }
            }
            out = out_rx.recv() => {
                match out {
                    Some(Outbound::Frame(bytes)) => {
                        if write.send(Message::Binary(bytes.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close(code)) => {
                        let frame = CloseFrame { code: CloseCode::from(code), reason: "".into() };
                        let _ = write.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Resolves a request path to the target room's channel. `/create` spawns a
/// fresh room and returns its key (for the caller to send GAME_KEY back to
/// the creator); `/join/:key` looks up an existing room by its letter-encoded
/// key. Returns `None` on any failure — unroutable path, malformed key, or no
/// such room — which the caller treats as a join refusal.
fn resolve_room(path: Option<&str>, registry: &'static Registry) -> Option<(mpsc::UnboundedSender<RoomEvent>, Option<u32>)> {
    let path = path?;
    if path == "/create" {
        let key = session::spawn_room(registry);
        let sender = registry.lookup(key).ok()?;
        Some((sender, Some(key.to_u32())))
    } else if let Some(encoded) = path.strip_prefix("/join/") {
        let key_u32 = key::decode_key(encoded)?;
        let sender = registry.lookup(Key::from_u32(key_u32)).ok()?;
        Some((sender, None))
    } else {
        None
    }
}

async fn close_immediately<S>(mut stream: tokio_tungstenite::WebSocketStream<S>, code: u16)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let frame = CloseFrame { code: CloseCode::from(code), reason: "".into() };
    let _ = stream.send(Message::Close(Some(frame))).await;
}
