//! Request/response connection to the authority.
//!
//! One framed request out, one framed reply back, in order. The typed
//! helpers unwrap the reply variants the caller expects and turn
//! `ServerResponse::Error` into [`ClientError::Server`].

use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use confab_proto::{
    read_frame, write_frame, ClientRequest, ConversationSnapshot, ErrorKind, ServerResponse,
    SyncRequest, SyncResponse, WireError, MAX_FRAME_LEN,
};

/// Errors surfaced to client callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Frame codec or transport failure.
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// The server answered with a typed error reply.
    #[error("Server error ({kind:?}): {message}")]
    Server { kind: ErrorKind, message: String },

    /// The server answered with a reply variant the request cannot
    /// produce -- a protocol bug on one side or the other.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// A connection to one server.
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    pub async fn connect(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!(peer = %stream.peer_addr()?, "connected to server");
        Ok(Self { stream })
    }

    /// Send one request and await its reply. Typed error replies are
    /// returned as `Ok(ServerResponse::Error { .. })` here; the typed
    /// helpers below convert them.
    pub async fn request(&mut self, request: &ClientRequest) -> Result<ServerResponse, ClientError> {
        write_frame(&mut self.stream, request).await?;
        Ok(read_frame(&mut self.stream, MAX_FRAME_LEN).await?)
    }

    /// Create a conversation and return its assigned number.
    pub async fn create_conversation(
        &mut self,
        name: impl Into<String>,
        initial_members: Vec<String>,
        acting_username: impl Into<String>,
    ) -> Result<u64, ClientError> {
        let reply = self
            .request(&ClientRequest::CreateConversation {
                name: name.into(),
                initial_members,
                acting_username: acting_username.into(),
            })
            .await?;
        match reply {
            ServerResponse::Created {
                conversation_number,
            } => Ok(conversation_number),
            other => Err(unexpected(other)),
        }
    }

    /// Fetch the snapshot a mirror is built from.
    pub async fn subscribe(
        &mut self,
        conversation_number: u64,
        acting_username: impl Into<String>,
    ) -> Result<ConversationSnapshot, ClientError> {
        let reply = self
            .request(&ClientRequest::Subscribe {
                conversation_number,
                acting_username: acting_username.into(),
            })
            .await?;
        match reply {
            ServerResponse::Snapshot(snapshot) => Ok(snapshot),
            other => Err(unexpected(other)),
        }
    }

    /// Run one delta poll.
    pub async fn sync(&mut self, request: SyncRequest) -> Result<SyncResponse, ClientError> {
        let reply = self.request(&ClientRequest::Sync(request)).await?;
        match reply {
            ServerResponse::Sync(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: ServerResponse) -> ClientError {
    match reply {
        ServerResponse::Error { kind, message } => ClientError::Server { kind, message },
        other => ClientError::UnexpectedReply(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// A one-shot stub authority: answers each request with a canned
    /// reply.
    async fn stub_server(replies: Vec<ServerResponse>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            for reply in replies {
                let _: ClientRequest = read_frame(&mut socket, MAX_FRAME_LEN).await.unwrap();
                write_frame(&mut socket, &reply).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn typed_helpers_unwrap_replies() {
        let addr = stub_server(vec![
            ServerResponse::Created {
                conversation_number: 11,
            },
            ServerResponse::Sync(SyncResponse::default()),
        ])
        .await;

        let mut connection = Connection::connect(addr).await.unwrap();
        let number = connection
            .create_conversation("", vec!["alice".into()], "alice")
            .await
            .unwrap();
        assert_eq!(number, 11);

        let response = connection
            .sync(SyncRequest {
                conversation_number: 11,
                date: chrono::Utc::now().date_naive(),
                last_message_number: 0,
                last_member_number: 1,
                last_deleted_member_number: 0,
                acting_username: "alice".into(),
            })
            .await
            .unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn error_replies_become_typed_errors() {
        let addr = stub_server(vec![ServerResponse::Error {
            kind: ErrorKind::NotMember,
            message: "'mallory' is not a member of this conversation".into(),
        }])
        .await;

        let mut connection = Connection::connect(addr).await.unwrap();
        let err = connection.subscribe(1, "mallory").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Server {
                kind: ErrorKind::NotMember,
                ..
            }
        ));
    }
}
