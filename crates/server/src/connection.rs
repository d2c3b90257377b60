//! Per-connection read/decode/dispatch/write loop.
//!
//! Each connection owns a read task (this loop) and a write task draining
//! an unbounded channel — the channel sender is the connection's session
//! sink. A zero-length read ends the loop; decode failures answer 400 and
//! keep going; `logout` only clears the session and leaves the socket
//! open.

use std::{net::SocketAddr, sync::Arc};

use {
    serde_json::Value,
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        sync::mpsc,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use {
    parlor_events::{Event, EventBus},
    parlor_protocol::{Response, actions, decode_frame, status},
    parlor_sessions::SessionRegistry,
    parlor_store::Store,
};

use crate::{handlers::HandlerContext, router::Router};

/// Pieces every connection task shares.
pub(crate) struct ConnectionShared {
    pub store: Arc<Store>,
    pub sessions: Arc<SessionRegistry>,
    pub events: Arc<EventBus>,
    pub router: Arc<Router>,
    pub buffer_size: usize,
}

pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<ConnectionShared>,
    conn_id: u64,
    cancel: CancellationToken,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Write loop: one frame per queued string, closed by dropping `tx`.
    let write_handle = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if writer.write_all(frame.as_bytes()).await.is_err() {
                debug!("write side closed");
                break;
            }
        }
    });

    let mut buf = vec![0u8; shared.buffer_size];
    loop {
        let read = tokio::select! {
            () = cancel.cancelled() => break,
            read = reader.read(&mut buf) => read,
        };
        let n = match read {
            Ok(0) => {
                debug!(conn_id, %peer, "client disconnected");
                break;
            },
            Ok(n) => n,
            Err(e) => {
                debug!(conn_id, %peer, error = %e, "connection read failed");
                break;
            },
        };

        // One recv is one frame; anything unparseable answers 400 and the
        // loop continues.
        let frame = match decode_frame(&buf[..n]) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(conn_id, %peer, error = %e, "malformed frame");
                let response = Response::malformed(None);
                shared.events.publish(Event::Response(response.to_value()));
                if tx.send(response.encode()).is_err() {
                    break;
                }
                continue;
            },
        };

        shared.events.publish(Event::Request(frame.raw.clone()));

        let mut request = frame.request;
        // login records where the client came from.
        if request.action.as_deref() == Some(actions::LOGIN) {
            request
                .data
                .insert("address".into(), Value::String(peer.to_string()));
        }

        let is_add_message = request.action.as_deref() == Some(actions::ADD_MESSAGE);
        let sender = request.data_str("username").map(str::to_string);
        let contact = request.data_str("contact_username").map(str::to_string);

        let ctx = HandlerContext {
            request,
            peer,
            conn_id,
            sink: tx.clone(),
            store: Arc::clone(&shared.store),
            sessions: Arc::clone(&shared.sessions),
            events: Arc::clone(&shared.events),
        };
        let response = shared.router.dispatch(ctx).await;
        shared.events.publish(Event::Response(response.to_value()));

        let encoded = response.encode();
        let succeeded = response.code == status::OK;
        if tx.send(encoded.clone()).is_err() {
            break;
        }

        if is_add_message && succeeded {
            fan_out(&shared, sender.as_deref(), contact.as_deref(), &encoded).await;
        }
    }

    // Disconnect cleanup: drop whatever bindings this connection holds and
    // let the write loop drain.
    for username in shared
        .sessions
        .unbind_connection(&shared.events, conn_id)
        .await
    {
        debug!(conn_id, username = %username, "session cleared on disconnect");
    }
    drop(tx);
    let _ = write_handle.await;
}

/// Deliver a successful `add_message` response beyond its sender: to the
/// named contact's session when one is given, otherwise to every active
/// session except the sender. Delivery is best-effort — a dead peer sink
/// is unbound and logged, never surfaced to the sender.
async fn fan_out(
    shared: &ConnectionShared,
    sender: Option<&str>,
    contact: Option<&str>,
    encoded: &str,
) {
    let Some(sender) = sender else { return };
    match contact {
        Some(peer_name) => {
            if shared
                .sessions
                .send_to(&shared.events, peer_name, encoded)
                .await
            {
                debug!(contact = peer_name, "message fanned out");
            }
        },
        None => {
            shared
                .sessions
                .broadcast_except(&shared.events, sender, encoded)
                .await;
        },
    }
}
