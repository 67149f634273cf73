use thiserror::Error;

use crate::server::ServerError;

/// Errors returned by [`NodeDiscovery`](super::NodeDiscovery).
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery is already started")]
    AlreadyStarted,
    #[error(transparent)]
    Server(#[from] ServerError),
}
