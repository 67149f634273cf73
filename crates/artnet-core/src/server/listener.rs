use std::net::SocketAddr;

use crate::listeners::ListenerResult;
use crate::packets::ArtNetPacket;

/// Observer of server events. Every method defaults to a no-op.
///
/// Callbacks run on the receive task (or on the sending caller for the
/// broadcast/unicast events) and should return quickly. An `Err` or a panic
/// is logged and does not reach other listeners.
pub trait ServerListener: Send + Sync {
    /// A datagram decoded into a known packet.
    fn on_received(&self, _packet: &ArtNetPacket, _source: SocketAddr) -> ListenerResult {
        Ok(())
    }

    fn on_broadcasted(&self, _packet: &ArtNetPacket, _target: SocketAddr) -> ListenerResult {
        Ok(())
    }

    fn on_unicasted(&self, _packet: &ArtNetPacket, _target: SocketAddr) -> ListenerResult {
        Ok(())
    }

    /// Fired synchronously from `start`, before the receive task runs.
    fn on_started(&self, _local_addr: SocketAddr) -> ListenerResult {
        Ok(())
    }

    /// Fired once the receive task has exited and the socket is released.
    fn on_stopped(&self) -> ListenerResult {
        Ok(())
    }
}
