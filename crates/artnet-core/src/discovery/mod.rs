//! Node discovery: periodic ArtPoll and a live registry of responders.
//!
//! [`NodeDiscovery`] registers a collector on the server. Every decoded
//! ArtPollReply goes through [`NodeDiscovery::discover_node`], which is the
//! only way entries enter or change. Each reply resets the node's
//! staleness clock; [`NodeDiscovery::active_nodes`] never returns a node
//! older than the reply timeout, and every poll cycle removes such nodes and
//! reports them through `on_node_disconnected`.
//!
//! Version française (résumé):
//! La découverte envoie un ArtPoll au démarrage puis à intervalle fixe, et
//! tient un registre des nœuds indexé par l'adresse IP de leur ArtPollReply.
//! Chaque réponse remet à zéro le délai d'expiration (3000 ms par défaut);
//! les nœuds silencieux sont exclus de la vue active et retirés à chaque
//! cycle. `stop()` annule le minuteur et conserve le registre.

mod config;
mod error;
mod listener;
mod node;
mod registry;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub use config::{DEFAULT_POLL_INTERVAL, DEFAULT_REPLY_TIMEOUT, DiscoveryConfig};
pub use error::DiscoveryError;
pub use listener::DiscoveryListener;
pub use node::Node;

use registry::{NodeRegistry, Upsert};

use crate::listeners::{ListenerId, ListenerResult, ListenerSet};
use crate::packets::{ArtNetPacket, ArtPoll, ArtPollReply};
use crate::server::{ArtNetServer, ServerError, ServerListener};

/// Polls the network through an [`ArtNetServer`] and tracks the replies.
///
/// # Examples
/// ```no_run
/// use std::sync::Arc;
///
/// use artnet_core::discovery::{DiscoveryConfig, NodeDiscovery};
/// use artnet_core::server::{ArtNetServer, ServerConfig};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let server = Arc::new(ArtNetServer::new(ServerConfig::default()));
/// server.start(None)?;
///
/// let discovery = NodeDiscovery::new(Arc::clone(&server), DiscoveryConfig::default());
/// discovery.start().await?;
/// tokio::time::sleep(std::time::Duration::from_secs(3)).await;
/// for node in discovery.active_nodes() {
///     println!("{} {}", node.ip, node.short_name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct NodeDiscovery {
    shared: Arc<Shared>,
    collector: ListenerId,
}

struct Shared {
    server: Arc<ArtNetServer>,
    config: DiscoveryConfig,
    registry: NodeRegistry,
    listeners: ListenerSet<dyn DiscoveryListener>,
    timer: Mutex<Option<Timer>>,
    next_timer: AtomicU64,
}

/// Cancellation handle of one `start` call.
struct Timer {
    id: u64,
    shutdown: watch::Sender<bool>,
}

/// Server listener feeding poll replies into the registry.
struct Collector {
    shared: Weak<Shared>,
}

impl ServerListener for Collector {
    fn on_received(&self, packet: &ArtNetPacket, source: SocketAddr) -> ListenerResult {
        let (ArtNetPacket::PollReply(reply), Some(shared)) = (packet, self.shared.upgrade()) else {
            return Ok(());
        };
        if shared.server.is_own_address(source) {
            tracing::trace!(%source, "ignoring our own ArtPollReply");
            return Ok(());
        }
        match (reply.ip_address().is_unspecified(), source.ip()) {
            // Replies without an IP are keyed by their sender.
            (true, IpAddr::V4(ip)) => {
                let mut reply = reply.clone();
                reply.set_ip_address(ip)?;
                shared.discover_node(&reply, Instant::now());
            }
            _ => {
                shared.discover_node(reply, Instant::now());
            }
        }
        Ok(())
    }
}

impl NodeDiscovery {
    pub fn new(server: Arc<ArtNetServer>, config: DiscoveryConfig) -> Self {
        let shared = Arc::new(Shared {
            server,
            config,
            registry: NodeRegistry::new(),
            listeners: ListenerSet::new(),
            timer: Mutex::new(None),
            next_timer: AtomicU64::new(1),
        });
        let collector = shared.server.add_listener(Arc::new(Collector {
            shared: Arc::downgrade(&shared),
        }));
        Self { shared, collector }
    }

    pub fn server(&self) -> &Arc<ArtNetServer> {
        &self.shared.server
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.shared.config
    }

    pub fn is_started(&self) -> bool {
        self.shared.timer.lock().is_some()
    }

    pub fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// Broadcasts an ArtPoll now and, when configured, on every interval.
    ///
    /// The server must be running. If the first poll cannot be sent the
    /// discovery stays stopped and the send error is returned.
    pub async fn start(&self) -> Result<(), DiscoveryError> {
        let (id, shutdown) = self.shared.arm_timer()?;

        if let Err(err) = self.shared.poll().await {
            self.shared.disarm_timer(id);
            return Err(err.into());
        }

        if let Some(period) = self.shared.config.poll_interval {
            tokio::spawn(poll_loop(Arc::clone(&self.shared), period, shutdown));
        }
        tracing::info!(interval = ?self.shared.config.poll_interval, "node discovery started");
        Ok(())
    }

    /// Cancels the re-poll timer. The registry is kept.
    pub fn stop(&self) {
        if let Some(timer) = self.shared.timer.lock().take() {
            timer.shutdown.send_replace(true);
            tracing::info!(nodes = self.shared.registry.len(), "node discovery stopped");
        }
    }

    /// Records `reply`, creating or refreshing the node with its IP.
    pub fn discover_node(&self, reply: &ArtPollReply) -> Node {
        self.shared.discover_node(reply, Instant::now())
    }

    /// Every known node, including stale ones not yet reaped.
    pub fn nodes(&self) -> Vec<Node> {
        self.shared.registry.all()
    }

    /// Nodes that replied within the reply timeout.
    pub fn active_nodes(&self) -> Vec<Node> {
        self.active_nodes_at(Instant::now())
    }

    pub fn active_nodes_at(&self, now: Instant) -> Vec<Node> {
        self.shared
            .registry
            .active(now, self.shared.config.reply_timeout)
    }

    pub fn node(&self, ip: Ipv4Addr) -> Option<Node> {
        self.shared.registry.get(ip)
    }

    /// Removes nodes that went stale by `now`; runs on every poll cycle.
    pub fn reap_stale(&self, now: Instant) -> Vec<Node> {
        self.shared.reap_stale(now)
    }
}

impl Drop for NodeDiscovery {
    fn drop(&mut self) {
        self.stop();
        self.shared.server.remove_listener(self.collector);
    }
}

impl Shared {
    fn arm_timer(&self) -> Result<(u64, watch::Receiver<bool>), DiscoveryError> {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return Err(DiscoveryError::AlreadyStarted);
        }
        let id = self.next_timer.fetch_add(1, Ordering::Relaxed);
        let (shutdown, rx) = watch::channel(false);
        *timer = Some(Timer { id, shutdown });
        Ok((id, rx))
    }

    /// Clears the timer armed as `id`; a newer one is left alone.
    fn disarm_timer(&self, id: u64) {
        let mut timer = self.timer.lock();
        if timer.as_ref().is_some_and(|armed| armed.id == id) {
            timer.take();
        }
    }

    async fn poll(&self) -> Result<(), ServerError> {
        let packet = ArtNetPacket::from(ArtPoll::new());
        match self.server.broadcast_packet(&packet).await {
            Ok(_) => {
                tracing::debug!("ArtPoll broadcast");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "ArtPoll broadcast failed");
                self.listeners.dispatch("on_poll_failed", |listener| listener.on_poll_failed(&err));
                Err(err)
            }
        }
    }

    fn discover_node(&self, reply: &ArtPollReply, now: Instant) -> Node {
        match self.registry.upsert(reply, now) {
            Upsert::Discovered(node) => {
                tracing::info!(ip = %node.ip, name = %node.short_name, "node discovered");
                self.listeners
                    .dispatch("on_node_discovered", |listener| listener.on_node_discovered(&node));
                node
            }
            Upsert::Updated(node) => {
                tracing::trace!(ip = %node.ip, "node refreshed");
                self.listeners
                    .dispatch("on_node_updated", |listener| listener.on_node_updated(&node));
                node
            }
        }
    }

    fn reap_stale(&self, now: Instant) -> Vec<Node> {
        let removed = self.registry.reap(now, self.config.reply_timeout);
        for node in &removed {
            tracing::info!(ip = %node.ip, name = %node.short_name, "node disconnected");
            self.listeners
                .dispatch("on_node_disconnected", |listener| listener.on_node_disconnected(node));
        }
        removed
    }
}

async fn poll_loop(shared: Arc<Shared>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if *shutdown.borrow() {
                    break;
                }
                shared.reap_stale(Instant::now());
                // Failures are logged and reported to listeners by `poll`.
                let _ = shared.poll().await;
            }
        }
    }
    tracing::debug!("poll timer cancelled");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{DiscoveryConfig, NodeDiscovery};
    use crate::server::{ArtNetServer, ServerConfig};

    #[test]
    fn failed_start_leaves_a_newer_timer_armed() {
        let server = Arc::new(ArtNetServer::new(ServerConfig::default().port(0)));
        let discovery = NodeDiscovery::new(server, DiscoveryConfig::default());

        let (first, _first_rx) = discovery.shared.arm_timer().unwrap();
        discovery.stop();
        let (second, _second_rx) = discovery.shared.arm_timer().unwrap();
        assert_ne!(first, second);

        discovery.shared.disarm_timer(first);
        assert!(discovery.is_started());
        discovery.shared.disarm_timer(second);
        assert!(!discovery.is_started());
    }
}
