use crate::listeners::ListenerResult;
use crate::server::ServerError;

use super::node::Node;

/// Observer of registry changes. Every method defaults to a no-op.
pub trait DiscoveryListener: Send + Sync {
    /// First reply from a node not yet in the registry.
    fn on_node_discovered(&self, _node: &Node) -> ListenerResult {
        Ok(())
    }

    /// Reply from a known node; `node` holds the refreshed fields.
    fn on_node_updated(&self, _node: &Node) -> ListenerResult {
        Ok(())
    }

    /// A node was removed after staying silent past the reply timeout.
    fn on_node_disconnected(&self, _node: &Node) -> ListenerResult {
        Ok(())
    }

    fn on_poll_failed(&self, _error: &ServerError) -> ListenerResult {
        Ok(())
    }
}
