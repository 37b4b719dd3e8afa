use confab_proto::WireError;
use thiserror::Error;

/// Errors produced while serving client connections.
///
/// Core failures never show up here: they travel back to the client as
/// typed error replies instead of tearing the connection down.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Frame codec failure on the connection.
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Transport-level I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
