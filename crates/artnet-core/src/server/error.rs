use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors returned by [`ArtNetServer`](super::ArtNetServer).
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server is already bound; stop it before starting again")]
    AlreadyBound,
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to send datagram to {target}: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("unknown host: {host}")]
    UnknownHost { host: String },
    #[error("server is not running")]
    NotRunning,
    #[error("server must be stopped to change this setting")]
    NotStopped,
    #[error("no tokio runtime available to drive the receive loop")]
    Runtime,
}

impl ServerError {
    /// True for the bind-failure class: double start or a busy address.
    pub fn is_bind_failure(&self) -> bool {
        matches!(self, Self::AlreadyBound | Self::Bind { .. })
    }
}
