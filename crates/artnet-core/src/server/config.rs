//! Configuration types for the Art-Net server.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::packets::layout::DEFAULT_PORT;
use crate::packets::{ArtPollReply, NodeStyle, PacketError, PortDescriptor, ReportCode};

/// Default broadcast target (the primary Art-Net network, 2.x.x.x).
pub const DEFAULT_BROADCAST_ADDRESS: &str = "2.255.255.255";
/// Default receive buffer size in bytes.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 2048;

/// Configuration for an [`ArtNetServer`](super::ArtNetServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Local port to bind. Use 0 for an OS-assigned port.
    pub port: u16,
    /// Destination port for broadcasts, unicasts and poll replies.
    pub send_port: u16,
    /// Broadcast target, as an IP literal or a host name.
    pub broadcast_address: String,
    /// Receive buffer size in bytes.
    pub receive_buffer_size: usize,
    /// Self-description used to answer ArtPoll.
    pub identity: NodeIdentity,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            send_port: DEFAULT_PORT,
            broadcast_address: DEFAULT_BROADCAST_ADDRESS.into(),
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            identity: NodeIdentity::default(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn send_port(mut self, port: u16) -> Self {
        self.send_port = port;
        self
    }

    pub fn broadcast_address(mut self, address: impl Into<String>) -> Self {
        self.broadcast_address = address.into();
        self
    }

    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    pub fn identity(mut self, identity: NodeIdentity) -> Self {
        self.identity = identity;
        self
    }
}

/// How the server describes itself in ArtPollReply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Advertised IP; the bound address is used when unset or unspecified.
    pub ip: Option<Ipv4Addr>,
    pub short_name: String,
    pub long_name: String,
    pub oem_code: u16,
    pub esta_code: u16,
    pub firmware_version: u16,
    pub net_switch: u8,
    pub sub_switch: u8,
    pub status: u8,
    pub style: NodeStyle,
    pub ports: Vec<PortDescriptor>,
    pub mac: [u8; 6],
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            ip: None,
            short_name: "artnet".into(),
            long_name: concat!("artnet-rs ", env!("CARGO_PKG_VERSION")).into(),
            oem_code: 0xffff,
            esta_code: 0,
            firmware_version: 1,
            net_switch: 0,
            sub_switch: 0,
            status: 0,
            style: NodeStyle::Controller,
            ports: Vec::new(),
            mac: [0; 6],
        }
    }
}

impl NodeIdentity {
    pub fn with_names(
        mut self,
        short_name: impl Into<String>,
        long_name: impl Into<String>,
    ) -> Self {
        self.short_name = short_name.into();
        self.long_name = long_name.into();
        self
    }

    pub fn with_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_ports(mut self, ports: Vec<PortDescriptor>) -> Self {
        self.ports = ports;
        self
    }

    /// Builds the reply sent in answer to an ArtPoll.
    ///
    /// `fallback_ip` is advertised when no explicit IP is configured.
    /// `counter` is the poll-reply count carried in the node report.
    pub fn to_poll_reply(
        &self,
        fallback_ip: Ipv4Addr,
        port: u16,
        counter: u16,
    ) -> Result<ArtPollReply, PacketError> {
        let ip = match self.ip {
            Some(ip) if !ip.is_unspecified() => ip,
            _ => fallback_ip,
        };
        let mut reply = ArtPollReply::new();
        reply.set_ip_address(ip)?;
        reply.set_port(port)?;
        reply.set_firmware_version(self.firmware_version)?;
        reply.set_switches(self.net_switch, self.sub_switch)?;
        reply.set_oem_code(self.oem_code)?;
        reply.set_node_status(self.status)?;
        reply.set_esta_code(self.esta_code)?;
        reply.set_short_name(&self.short_name)?;
        reply.set_long_name(&self.long_name)?;
        reply.set_node_report(ReportCode::PowerOk, counter, "OK")?;
        reply.set_ports(&self.ports)?;
        reply.set_style(self.style)?;
        reply.set_mac(self.mac)?;
        reply.set_bind_ip(ip)?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::{NodeIdentity, ServerConfig};
    use crate::packets::{ArtPollReply, NodeStyle, PortDescriptor, PortType, ReportCode};

    #[test]
    fn defaults_match_art_net_conventions() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 6454);
        assert_eq!(config.send_port, 6454);
        assert_eq!(config.broadcast_address, "2.255.255.255");
        assert_eq!(config.receive_buffer_size, 2048);
        assert_eq!(config.identity.style, NodeStyle::Controller);
    }

    #[test]
    fn poll_reply_carries_identity_fields() {
        let identity = NodeIdentity::default()
            .with_names("desk", "Front of house desk")
            .with_ports(vec![PortDescriptor::new(PortType::Dmx512, true, false)]);

        let reply = identity
            .to_poll_reply(Ipv4Addr::new(10, 0, 0, 5), 6454, 3)
            .unwrap();
        let decoded = ArtPollReply::parse(reply.as_bytes()).unwrap();
        assert_eq!(decoded.ip_address(), Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(decoded.short_name(), "desk");
        assert_eq!(decoded.long_name(), "Front of house desk");
        assert_eq!(decoded.style(), Some(NodeStyle::Controller));
        assert_eq!(decoded.report_code(), Some(ReportCode::PowerOk));
        assert!(decoded.node_report().contains("[0003]"));
        assert_eq!(decoded.ports().len(), 1);
    }

    #[test]
    fn explicit_ip_overrides_bound_address() {
        let identity = NodeIdentity::default().with_ip(Ipv4Addr::new(2, 1, 1, 1));
        let reply = identity
            .to_poll_reply(Ipv4Addr::LOCALHOST, 6454, 0)
            .unwrap();
        assert_eq!(reply.ip_address(), Ipv4Addr::new(2, 1, 1, 1));
    }
}
