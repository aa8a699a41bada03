//! Relay of a session's completion stream.
//!
//! Upstream bytes go to the client verbatim while a parser collects the reply
//! text. A detached task owns the upstream stream, so the reply is still read
//! to the end and persisted when the client disconnects half way.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use chat2anyllm_gateway::{ByteStream, SseDeltaParser};
use chat2anyllm_store::MessageRole;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Chunks buffered between the upstream reader and a slow client.
const RELAY_BUFFER: usize = 64;

/// Spawn the relay task and return the client side of it.
pub fn spawn_relay(
    state: Arc<AppState>,
    session_id: Uuid,
    upstream: ByteStream,
) -> ReceiverStream<Result<Bytes, Infallible>> {
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(relay(state, session_id, upstream, tx));
    ReceiverStream::new(rx)
}

async fn relay(
    state: Arc<AppState>,
    session_id: Uuid,
    mut upstream: ByteStream,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
) {
    let mut parser = SseDeltaParser::new();
    let mut client_gone = false;

    while let Some(chunk) = upstream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                // The reply is incomplete; end the response without saving it.
                error!(session = %session_id, error = %e, "stream error");
                return;
            }
        };

        parser.feed(&bytes);
        if !client_gone && tx.send(Ok(bytes)).await.is_err() {
            debug!(session = %session_id, "client disconnected, draining upstream");
            client_gone = true;
        }
    }
    parser.finish();

    if !parser.is_done() {
        debug!(session = %session_id, "upstream closed without [DONE]");
    }
    persist_reply(&state, session_id, parser.into_content());
    // Dropping `tx` here ends the client response after the reply is saved.
}

fn persist_reply(state: &AppState, session_id: Uuid, content: String) {
    if content.trim().is_empty() {
        return;
    }
    let store = match state.store() {
        Ok(store) => store,
        Err(_) => return,
    };
    match store.add_message(session_id, MessageRole::Assistant, &content) {
        Ok(message) => info!(
            session = %session_id,
            message = %message.id,
            chars = content.chars().count(),
            "saved assistant reply"
        ),
        Err(e) => warn!(session = %session_id, error = %e, "failed to save assistant message"),
    }
}
