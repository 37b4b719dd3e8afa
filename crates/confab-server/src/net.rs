//! TCP transport: accept loop and per-connection request pump.
//!
//! One tokio task per connection. Each connection is a sequence of
//! framed [`ClientRequest`]s answered in order with framed
//! [`ServerResponse`]s. Core failures travel back as typed error
//! replies; only frame-level damage closes the connection.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use confab_proto::{read_frame, write_frame, ClientRequest, ErrorKind, ServerResponse, WireError};

use crate::error::ServerError;
use crate::registry::SharedRegistry;
use crate::service;

/// Run the accept loop until the listener fails.
pub async fn serve(
    registry: Arc<SharedRegistry>,
    listener: TcpListener,
    max_frame_len: usize,
) -> Result<(), ServerError> {
    loop {
        let (socket, peer) = listener.accept().await?;
        debug!(%peer, "client connected");

        let registry = registry.clone();
        tokio::spawn(async move {
            match handle_connection(registry, socket, max_frame_len).await {
                Ok(()) => debug!(%peer, "client disconnected"),
                Err(err) => warn!(%peer, error = %err, "connection failed"),
            }
        });
    }
}

async fn handle_connection(
    registry: Arc<SharedRegistry>,
    socket: TcpStream,
    max_frame_len: usize,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = socket.into_split();

    loop {
        let request: ClientRequest = match read_frame(&mut reader, max_frame_len).await {
            Ok(request) => request,
            // Clean EOF between frames: the peer hung up.
            Err(WireError::Io(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            // Undecodable body: tell the peer and close, since the stream
            // offset can no longer be trusted.
            Err(WireError::Codec(err)) => {
                let reply = ServerResponse::Error {
                    kind: ErrorKind::BadRequest,
                    message: err.to_string(),
                };
                let _ = write_frame(&mut writer, &reply).await;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        // All core work is in-memory and lock-scoped; nothing here
        // suspends while a conversation lock is held.
        let reply = service::handle_request(&registry, request);
        write_frame(&mut writer, &reply).await?;
    }
}
