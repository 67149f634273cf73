//! Art-Net packet models and codec.
//!
//! The module follows a layered structure:
//! - `layout`: byte offsets, ranges and opcodes (source of truth)
//! - `buffer`: fixed-capacity storage with bounds-checked, endian-aware access
//! - `dmx`, `poll`, `poll_reply`: typed packets that write every logical
//!   field straight into their buffer, so the wire bytes never drift from
//!   the logical state
//! - `codec`: identifier/opcode validation and dispatch to the packet parsers
//! - `error`: explicit, actionable errors
//!
//! Encoding is not a separate pass: a packet's `as_bytes()` is the datagram.
//!
//! Version française (résumé):
//! Le module décrit les paquets Art-Net (ArtDmx, ArtPoll, ArtPollReply). Les
//! positions sont dans `layout`, l'accès borné aux octets dans `buffer`, la
//! classification des datagrammes dans `codec`. Chaque mutation de champ est
//! écrite immédiatement dans le tampon.

pub mod buffer;
pub mod codec;
pub mod dmx;
pub mod error;
pub mod layout;
pub mod poll;
pub mod poll_reply;
pub mod tables;

pub use buffer::PacketBuffer;
pub use codec::parse_packet;
pub use dmx::ArtDmx;
pub use error::PacketError;
pub use poll::ArtPoll;
pub use poll_reply::{ArtPollReply, PortDescriptor};
pub use tables::{NodeStyle, PortType, ReportCode};

/// Any packet the codec understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtNetPacket {
    Dmx(ArtDmx),
    Poll(ArtPoll),
    PollReply(ArtPollReply),
}

impl ArtNetPacket {
    pub fn opcode(&self) -> u16 {
        match self {
            Self::Dmx(_) => layout::OP_OUTPUT,
            Self::Poll(_) => layout::OP_POLL,
            Self::PollReply(_) => layout::OP_POLL_REPLY,
        }
    }

    /// Short protocol name, e.g. `ArtDmx`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dmx(_) => "ArtDmx",
            Self::Poll(_) => "ArtPoll",
            Self::PollReply(_) => "ArtPollReply",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Dmx(packet) => packet.as_bytes(),
            Self::Poll(packet) => packet.as_bytes(),
            Self::PollReply(packet) => packet.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<ArtDmx> for ArtNetPacket {
    fn from(packet: ArtDmx) -> Self {
        Self::Dmx(packet)
    }
}

impl From<ArtPoll> for ArtNetPacket {
    fn from(packet: ArtPoll) -> Self {
        Self::Poll(packet)
    }
}

impl From<ArtPollReply> for ArtNetPacket {
    fn from(packet: ArtPollReply) -> Self {
        Self::PollReply(packet)
    }
}
