use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::packets::layout::MAX_PORTS;
use crate::packets::{ArtPollReply, NodeStyle, PortDescriptor, ReportCode};

/// A peer known from its ArtPollReply.
///
/// Every field except `ip` is re-extracted from each fresh reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub short_name: String,
    pub long_name: String,
    pub node_report: String,
    pub report_code: Option<ReportCode>,
    pub style: Option<NodeStyle>,
    pub firmware_version: u16,
    pub oem_code: u16,
    pub esta_code: u16,
    pub net_switch: u8,
    pub sub_switch: u8,
    pub node_status: u8,
    pub ports: Vec<PortDescriptor>,
    pub dmx_ins: [u8; MAX_PORTS],
    pub dmx_outs: [u8; MAX_PORTS],
    pub mac: [u8; 6],
    #[serde(skip)]
    pub last_seen: Instant,
}

impl Node {
    pub fn from_reply(reply: &ArtPollReply, seen_at: Instant) -> Self {
        Self {
            ip: reply.ip_address(),
            port: reply.port(),
            short_name: reply.short_name().to_string(),
            long_name: reply.long_name().to_string(),
            node_report: reply.node_report().to_string(),
            report_code: reply.report_code(),
            style: reply.style(),
            firmware_version: reply.firmware_version(),
            oem_code: reply.oem_code(),
            esta_code: reply.esta_code(),
            net_switch: reply.net_switch(),
            sub_switch: reply.sub_switch(),
            node_status: reply.node_status(),
            ports: reply.ports().to_vec(),
            dmx_ins: reply.dmx_ins(),
            dmx_outs: reply.dmx_outs(),
            mac: reply.mac(),
            last_seen: seen_at,
        }
    }

    /// Overwrites every extracted field and refreshes `last_seen`.
    pub fn update(&mut self, reply: &ArtPollReply, seen_at: Instant) {
        *self = Self::from_reply(reply, seen_at);
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        self.age(now) > timeout
    }
}
