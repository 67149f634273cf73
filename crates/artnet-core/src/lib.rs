//! Art-Net protocol engine: packet codec, UDP server and node discovery.
//!
//! The crate is layered the same way data flows through it:
//! `packets` (layout/buffer/model/codec) decodes and builds datagrams,
//! `server` owns the UDP socket, runs the receive loop and answers ArtPoll,
//! and `discovery` polls the network and keeps a registry of the nodes that
//! reply. `listeners` provides the fan-out used by both: registration under a
//! lock, dispatch from a snapshot, per-callback failure isolation.
//!
//! Invariants:
//! - A packet's wire bytes always reflect its logical fields.
//! - Malformed or unknown datagrams never reach listeners.
//! - One task owns the receive path; it alone releases the socket.
//! - A node older than the reply timeout never appears as active.
//!
//! The library never prints; diagnostics go through `tracing`.
//!
//! Version française (résumé):
//! Cette crate implémente le protocole Art-Net : codec des paquets (ArtDmx,
//! ArtPoll, ArtPollReply), serveur UDP avec boucle de réception et réponse
//! automatique aux ArtPoll, et découverte des nœuds avec expiration. Les
//! écouteurs sont notifiés depuis un instantané ; une erreur ou une panique
//! dans un écouteur n'interrompt pas les autres.
//!
//! # Examples
//! ```no_run
//! use std::sync::Arc;
//!
//! use artnet_core::packets::ArtDmx;
//! use artnet_core::server::{ArtNetServer, ServerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Arc::new(ArtNetServer::new(ServerConfig::default()));
//! server.start(None)?;
//!
//! let mut dmx = ArtDmx::new();
//! dmx.set_universe(0, 1)?;
//! dmx.set_dmx(&[255; 16], 16)?;
//! server.broadcast_packet(&dmx.into()).await?;
//! server.stop();
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod listeners;
pub mod packets;
pub mod server;

pub use discovery::{DiscoveryConfig, DiscoveryError, DiscoveryListener, Node, NodeDiscovery};
pub use listeners::{ListenerId, ListenerResult};
pub use packets::{ArtDmx, ArtNetPacket, ArtPoll, ArtPollReply, PacketError, parse_packet};
pub use server::{
    ArtNetServer, NodeIdentity, ServerConfig, ServerError, ServerListener, ServerState,
};
