//! UDP transport: socket ownership, receive loop, sends and poll answering.
//!
//! One tokio task owns the receive path while the server runs. Sends share
//! the same socket through an `Arc` and may be issued concurrently from any
//! task, including listener callbacks running on the receive task.
//!
//! Shutdown is cooperative. [`ArtNetServer::stop`] flips a `watch` flag; the
//! loop checks it at the top of every iteration and races each pending
//! receive against it, so a blocked `recv_from` is abandoned promptly. Only
//! the loop's exit path releases the socket and fires `on_stopped`.

mod config;
mod error;
mod listener;
mod state;

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;

pub use config::{
    DEFAULT_BROADCAST_ADDRESS, DEFAULT_RECEIVE_BUFFER_SIZE, NodeIdentity, ServerConfig,
};
pub use error::ServerError;
pub use listener::ServerListener;
pub use state::ServerState;

use crate::listeners::{ListenerId, ListenerSet};
use crate::packets::{ArtNetPacket, parse_packet};

/// Art-Net server bound to one UDP socket.
///
/// # Examples
/// ```no_run
/// use artnet_core::packets::ArtDmx;
/// use artnet_core::server::{ArtNetServer, ServerConfig};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let server = ArtNetServer::new(ServerConfig::default());
/// server.start(None)?;
///
/// let mut dmx = ArtDmx::new();
/// dmx.set_dmx(&[255, 0, 128], 3)?;
/// server.broadcast_packet(&dmx.into()).await?;
///
/// server.stop();
/// # Ok(())
/// # }
/// ```
pub struct ArtNetServer {
    shared: Arc<Shared>,
}

struct Shared {
    port: u16,
    send_port: u16,
    identity: NodeIdentity,
    reply_counter: AtomicU16,
    listeners: ListenerSet<dyn ServerListener>,
    inner: Mutex<ServerInner>,
}

struct ServerInner {
    state: ServerState,
    socket: Option<Arc<UdpSocket>>,
    shutdown: Option<watch::Sender<bool>>,
    local_addr: Option<SocketAddr>,
    broadcast_host: String,
    broadcast_addr: Option<SocketAddr>,
    receive_buffer_size: usize,
}

#[derive(Clone, Copy)]
enum SendKind {
    Broadcast,
    Unicast,
}

impl ArtNetServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                port: config.port,
                send_port: config.send_port,
                identity: config.identity,
                reply_counter: AtomicU16::new(0),
                listeners: ListenerSet::new(),
                inner: Mutex::new(ServerInner {
                    state: ServerState::Stopped,
                    socket: None,
                    shutdown: None,
                    local_addr: None,
                    broadcast_host: config.broadcast_address,
                    broadcast_addr: None,
                    receive_buffer_size: config.receive_buffer_size,
                }),
            }),
        }
    }

    pub fn state(&self) -> ServerState {
        self.shared.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.inner.lock().local_addr
    }

    /// Resolved broadcast target, once known.
    pub fn broadcast_address(&self) -> Option<SocketAddr> {
        self.shared.inner.lock().broadcast_addr
    }

    /// Whether `addr` is this server's own socket, as seen by a peer.
    ///
    /// With a wildcard bind, any local interface address on the bound port
    /// counts as our own.
    pub fn is_own_address(&self, addr: SocketAddr) -> bool {
        let Some(local) = self.local_addr() else {
            return false;
        };
        if addr.port() != local.port() {
            return false;
        }
        if local.ip().is_unspecified() {
            IpAddr::V4(route_local_ip(addr.ip())) == addr.ip()
        } else {
            addr.ip() == local.ip()
        }
    }

    pub fn send_port(&self) -> u16 {
        self.shared.send_port
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.shared.identity
    }

    pub fn receive_buffer_size(&self) -> usize {
        self.shared.inner.lock().receive_buffer_size
    }

    /// Changes the receive buffer size; only allowed while stopped.
    pub fn set_receive_buffer_size(&self, size: usize) -> Result<(), ServerError> {
        let mut inner = self.shared.inner.lock();
        if inner.state != ServerState::Stopped {
            return Err(ServerError::NotStopped);
        }
        inner.receive_buffer_size = size.max(1);
        Ok(())
    }

    /// Resolves `host` and makes it the broadcast target.
    ///
    /// On failure the previous target is kept.
    pub async fn set_broadcast_address(&self, host: &str) -> Result<SocketAddr, ServerError> {
        let addr = resolve(host, self.shared.send_port).await.inspect_err(|err| {
            tracing::warn!(host, error = %err, "broadcast address not resolved");
        })?;
        let mut inner = self.shared.inner.lock();
        inner.broadcast_host = host.to_string();
        inner.broadcast_addr = Some(addr);
        Ok(addr)
    }

    pub fn add_listener(&self, listener: Arc<dyn ServerListener>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// Binds the socket and spawns the receive loop on the current tokio
    /// runtime. `bind` defaults to the IPv4 wildcard address.
    ///
    /// `on_started` listeners run before this returns. Starting a server
    /// that is not stopped fails with [`ServerError::AlreadyBound`]. A
    /// broadcast host that is not an IP literal is resolved in the
    /// background; broadcasts fail with [`ServerError::UnknownHost`] until
    /// it resolves.
    pub fn start(&self, bind: Option<IpAddr>) -> Result<SocketAddr, ServerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ServerError::Runtime)?;

        let (socket, shutdown, local_addr, buffer_size, pending_host) = {
            let mut inner = self.shared.inner.lock();
            if inner.state != ServerState::Stopped {
                return Err(ServerError::AlreadyBound);
            }
            inner.state = ServerState::Starting;

            let addr = SocketAddr::new(
                bind.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
                self.shared.port,
            );
            let socket = match bind_socket(addr) {
                Ok(socket) => Arc::new(socket),
                Err(source) => {
                    inner.state = ServerState::Stopped;
                    return Err(ServerError::Bind { addr, source });
                }
            };
            let local_addr = socket.local_addr().unwrap_or(addr);

            let mut pending_host = None;
            if inner.broadcast_addr.is_none() {
                match parse_ip_literal(&inner.broadcast_host, self.shared.send_port) {
                    Some(target) => inner.broadcast_addr = Some(target),
                    None => pending_host = Some(inner.broadcast_host.clone()),
                }
            }

            let (tx, rx) = watch::channel(false);
            inner.socket = Some(Arc::clone(&socket));
            inner.shutdown = Some(tx);
            inner.local_addr = Some(local_addr);
            inner.state = ServerState::Running;
            (socket, rx, local_addr, inner.receive_buffer_size, pending_host)
        };

        if let Some(host) = pending_host {
            runtime.spawn(resolve_broadcast(Arc::clone(&self.shared), host));
        }

        tracing::info!(%local_addr, "Art-Net server started");
        self.shared
            .listeners
            .dispatch("on_started", |listener| listener.on_started(local_addr));

        runtime.spawn(receive_loop(
            Arc::clone(&self.shared),
            socket,
            shutdown,
            buffer_size,
        ));
        Ok(local_addr)
    }

    /// Asks the receive loop to exit. No-op unless running.
    ///
    /// Returns immediately; `on_stopped` fires once the loop has exited.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state != ServerState::Running {
            tracing::trace!(state = %inner.state, "stop ignored");
            return;
        }
        inner.state = ServerState::Stopping;
        if let Some(shutdown) = &inner.shutdown {
            shutdown.send_replace(true);
        }
        tracing::info!("stopping Art-Net server");
    }

    /// Sends `packet` to the broadcast address.
    pub async fn broadcast_packet(&self, packet: &ArtNetPacket) -> Result<usize, ServerError> {
        let (socket, target) = {
            let inner = self.shared.inner.lock();
            let socket = inner.socket.clone().ok_or(ServerError::NotRunning)?;
            let target = inner.broadcast_addr.ok_or_else(|| ServerError::UnknownHost {
                host: inner.broadcast_host.clone(),
            })?;
            (socket, target)
        };
        self.shared
            .send(&socket, packet, target, SendKind::Broadcast)
            .await
    }

    /// Sends `packet` to `ip` on the configured send port.
    pub async fn unicast_packet(
        &self,
        packet: &ArtNetPacket,
        ip: IpAddr,
    ) -> Result<usize, ServerError> {
        let socket = self.shared.socket()?;
        let target = SocketAddr::new(ip, self.shared.send_port);
        self.shared
            .send(&socket, packet, target, SendKind::Unicast)
            .await
    }

    /// Resolves `host` and unicasts `packet` to it.
    pub async fn unicast_packet_to_host(
        &self,
        packet: &ArtNetPacket,
        host: &str,
    ) -> Result<usize, ServerError> {
        let socket = self.shared.socket()?;
        let target = resolve(host, self.shared.send_port).await.inspect_err(|err| {
            tracing::warn!(host, error = %err, "unicast skipped");
        })?;
        self.shared
            .send(&socket, packet, target, SendKind::Unicast)
            .await
    }
}

impl Drop for ArtNetServer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn socket(&self) -> Result<Arc<UdpSocket>, ServerError> {
        self.inner.lock().socket.clone().ok_or(ServerError::NotRunning)
    }

    async fn send(
        &self,
        socket: &UdpSocket,
        packet: &ArtNetPacket,
        target: SocketAddr,
        kind: SendKind,
    ) -> Result<usize, ServerError> {
        let sent = match socket.send_to(packet.as_bytes(), target).await {
            Ok(sent) => sent,
            Err(source) => {
                tracing::warn!(%target, packet = packet.name(), error = %source, "send failed");
                return Err(ServerError::Send { target, source });
            }
        };
        tracing::trace!(%target, packet = packet.name(), bytes = sent, "datagram sent");
        match kind {
            SendKind::Broadcast => self
                .listeners
                .dispatch("on_broadcasted", |listener| listener.on_broadcasted(packet, target)),
            SendKind::Unicast => self
                .listeners
                .dispatch("on_unicasted", |listener| listener.on_unicasted(packet, target)),
        };
        Ok(sent)
    }

    async fn handle_datagram(&self, socket: &UdpSocket, data: &[u8], source: SocketAddr) {
        let packet = match parse_packet(data) {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                tracing::debug!(%source, len = data.len(), "dropping non Art-Net datagram");
                return;
            }
            Err(err) => {
                tracing::debug!(%source, error = %err, "dropping malformed datagram");
                return;
            }
        };
        tracing::trace!(%source, packet = packet.name(), "datagram received");

        if matches!(packet, ArtNetPacket::Poll(_)) {
            self.answer_poll(socket, source).await;
        }
        self.listeners.dispatch("on_received", |listener| listener.on_received(&packet, source));
    }

    async fn answer_poll(&self, socket: &UdpSocket, poller: SocketAddr) {
        let local_ip = match socket.local_addr().map(|addr| addr.ip()) {
            Ok(IpAddr::V4(ip)) if !ip.is_unspecified() => ip,
            _ => route_local_ip(poller.ip()),
        };
        let counter = self.reply_counter.fetch_add(1, Ordering::Relaxed);
        let reply = match self.identity.to_poll_reply(local_ip, self.port, counter) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = %err, "could not build ArtPollReply");
                return;
            }
        };
        let target = SocketAddr::new(poller.ip(), self.send_port);
        // Failures are already logged by `send`.
        let _ = self
            .send(socket, &reply.into(), target, SendKind::Unicast)
            .await;
    }
}

async fn receive_loop(
    shared: Arc<Shared>,
    socket: Arc<UdpSocket>,
    mut shutdown: watch::Receiver<bool>,
    buffer_size: usize,
) {
    let mut buffer = vec![0u8; buffer_size];
    loop {
        if *shutdown.borrow() {
            break;
        }
        let received = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = socket.recv_from(&mut buffer) => received,
        };
        match received {
            Ok((len, source)) => shared.handle_datagram(&socket, &buffer[..len], source).await,
            Err(err) => tracing::warn!(error = %err, "receive failed"),
        }
    }

    drop(socket);
    {
        let mut inner = shared.inner.lock();
        inner.socket = None;
        inner.shutdown = None;
        inner.local_addr = None;
        inner.state = ServerState::Stopped;
    }
    tracing::info!("Art-Net server stopped");
    shared
        .listeners
        .dispatch("on_stopped", |listener| listener.on_stopped());
}

fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Fills in the broadcast target once `host` resolves, unless it was
/// replaced in the meantime.
async fn resolve_broadcast(shared: Arc<Shared>, host: String) {
    let resolved = resolve(&host, shared.send_port).await;
    let mut inner = shared.inner.lock();
    if inner.broadcast_host != host || inner.broadcast_addr.is_some() {
        return;
    }
    match resolved {
        Ok(target) => {
            tracing::debug!(%host, %target, "broadcast address resolved");
            inner.broadcast_addr = Some(target);
        }
        Err(err) => tracing::warn!(%host, error = %err, "broadcast address not resolved"),
    }
}

fn parse_ip_literal(host: &str, port: u16) -> Option<SocketAddr> {
    host.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, port))
}

/// Prefers IPv4 results, since the default socket is IPv4.
async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    if let Some(addr) = parse_ip_literal(host, port) {
        return Ok(addr);
    }
    let unknown = || ServerError::UnknownHost {
        host: host.to_string(),
    };
    let mut addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| unknown())?
        .collect();
    addrs.sort_by_key(|addr| !addr.is_ipv4());
    addrs.into_iter().next().ok_or_else(unknown)
}

/// Local IPv4 address the OS would use to reach `peer`.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
fn route_local_ip(peer: IpAddr) -> Ipv4Addr {
    std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|probe| {
            probe.connect((peer, 9))?;
            probe.local_addr()
        })
        .ok()
        .and_then(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .unwrap_or(Ipv4Addr::UNSPECIFIED)
}
