use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::buffer::PacketBuffer;
use super::error::PacketError;
use super::layout;
use super::tables::{NodeStyle, PortType, ReportCode};

const PORT_CAN_OUTPUT: u8 = 0x80;
const PORT_CAN_INPUT: u8 = 0x40;
const PORT_TYPE_MASK: u8 = 0x3f;

/// Capabilities of one node port, decoded from its port-type byte.
///
/// # Examples
/// ```
/// use artnet_core::packets::{PortDescriptor, PortType};
///
/// let port = PortDescriptor::from_id(0x80);
/// assert!(port.can_output);
/// assert!(!port.can_input);
/// assert_eq!(port.port_type, Some(PortType::Dmx512));
/// assert_eq!(port.id(), 0x80);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub can_input: bool,
    pub can_output: bool,
    pub port_type: Option<PortType>,
}

impl PortDescriptor {
    pub fn new(port_type: PortType, can_input: bool, can_output: bool) -> Self {
        Self {
            can_input,
            can_output,
            port_type: Some(port_type),
        }
    }

    pub fn from_id(id: u8) -> Self {
        Self {
            can_input: id & PORT_CAN_INPUT != 0,
            can_output: id & PORT_CAN_OUTPUT != 0,
            port_type: PortType::from_id(id & PORT_TYPE_MASK),
        }
    }

    pub fn id(&self) -> u8 {
        let mut id = self.port_type.map(PortType::id).unwrap_or(PORT_TYPE_MASK);
        if self.can_input {
            id |= PORT_CAN_INPUT;
        }
        if self.can_output {
            id |= PORT_CAN_OUTPUT;
        }
        id
    }
}

/// ArtPollReply: a node describing itself in answer to ArtPoll.
///
/// Decoding is best-effort. A field that cannot be read (for instance because
/// the datagram is truncated) keeps its default and the remaining fields are
/// still decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPollReply {
    buffer: PacketBuffer,
    ip: Ipv4Addr,
    port: u16,
    firmware_version: u16,
    net_switch: u8,
    sub_switch: u8,
    oem_code: u16,
    node_status: u8,
    esta_code: u16,
    short_name: String,
    long_name: String,
    node_report: String,
    ports: Vec<PortDescriptor>,
    good_input: [u8; layout::MAX_PORTS],
    good_output: [u8; layout::MAX_PORTS],
    dmx_ins: [u8; layout::MAX_PORTS],
    dmx_outs: [u8; layout::MAX_PORTS],
    style: u8,
    mac: [u8; 6],
    bind_ip: Ipv4Addr,
    status2: u8,
}

impl Default for ArtPollReply {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtPollReply {
    pub fn new() -> Self {
        let [port_lo, port_hi] = layout::DEFAULT_PORT.to_le_bytes();
        // IP (zeroed) then port follow the opcode directly.
        let buffer = PacketBuffer::with_header(
            layout::REPLY_LEN,
            layout::REPLY_LEN,
            layout::OP_POLL_REPLY,
            false,
            &[0, 0, 0, 0, port_lo, port_hi],
        );
        Self {
            buffer,
            ip: Ipv4Addr::UNSPECIFIED,
            port: layout::DEFAULT_PORT,
            firmware_version: 0,
            net_switch: 0,
            sub_switch: 0,
            oem_code: 0,
            node_status: 0,
            esta_code: 0,
            short_name: String::new(),
            long_name: String::new(),
            node_report: String::new(),
            ports: Vec::new(),
            good_input: [0; layout::MAX_PORTS],
            good_output: [0; layout::MAX_PORTS],
            dmx_ins: [0; layout::MAX_PORTS],
            dmx_outs: [0; layout::MAX_PORTS],
            style: NodeStyle::Node.id(),
            mac: [0; 6],
            bind_ip: Ipv4Addr::UNSPECIFIED,
            status2: 0,
        }
    }

    /// Decodes an ArtPollReply datagram whose header has already been validated.
    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        let reader = PacketBuffer::from_bytes(raw);
        reader.slice(0..layout::HEADER_LEN)?;

        let mut buffer = PacketBuffer::new(layout::REPLY_LEN);
        let kept = raw.len().min(layout::REPLY_LEN);
        buffer.set_bytes(0, &raw[..kept])?;

        let num_ports = field("num_ports", reader.u16_be(layout::REPLY_NUM_PORTS_RANGE.start));
        let port_types: [u8; layout::MAX_PORTS] =
            field("port_types", reader.array(layout::REPLY_PORT_TYPES_RANGE));
        let ports = port_types
            .iter()
            .take((num_ports as usize).min(layout::MAX_PORTS))
            .map(|id| PortDescriptor::from_id(*id))
            .collect();

        Ok(Self {
            buffer,
            ip: Ipv4Addr::from(field::<[u8; 4]>("ip", reader.array(layout::REPLY_IP_RANGE))),
            port: field("port", reader.u16_le(layout::REPLY_PORT_RANGE.start)),
            firmware_version: field(
                "firmware_version",
                reader.u16_be(layout::REPLY_VERSION_RANGE.start),
            ),
            net_switch: field("net_switch", reader.u8(layout::REPLY_NET_SWITCH_OFFSET)),
            sub_switch: field("sub_switch", reader.u8(layout::REPLY_SUB_SWITCH_OFFSET)),
            oem_code: field("oem_code", reader.u16_be(layout::REPLY_OEM_RANGE.start)),
            node_status: field("node_status", reader.u8(layout::REPLY_STATUS_OFFSET)),
            esta_code: field("esta_code", reader.u16_le(layout::REPLY_ESTA_RANGE.start)),
            short_name: field("short_name", reader.ascii(layout::REPLY_SHORT_NAME_RANGE)),
            long_name: field("long_name", reader.ascii(layout::REPLY_LONG_NAME_RANGE)),
            node_report: field("node_report", reader.ascii(layout::REPLY_NODE_REPORT_RANGE)),
            ports,
            good_input: field("good_input", reader.array(layout::REPLY_GOOD_INPUT_RANGE)),
            good_output: field("good_output", reader.array(layout::REPLY_GOOD_OUTPUT_RANGE)),
            dmx_ins: field("sw_in", reader.array(layout::REPLY_SW_IN_RANGE)),
            dmx_outs: field("sw_out", reader.array(layout::REPLY_SW_OUT_RANGE)),
            style: field("style", reader.u8(layout::REPLY_STYLE_OFFSET)),
            mac: field("mac", reader.array(layout::REPLY_MAC_RANGE)),
            bind_ip: Ipv4Addr::from(field::<[u8; 4]>(
                "bind_ip",
                reader.array(layout::REPLY_BIND_IP_RANGE),
            )),
            status2: field("status2", reader.u8(layout::REPLY_STATUS2_OFFSET)),
        })
    }

    pub fn ip_address(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn set_ip_address(&mut self, ip: Ipv4Addr) -> Result<(), PacketError> {
        self.buffer.set_bytes(layout::REPLY_IP_RANGE.start, &ip.octets())?;
        self.ip = ip;
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), PacketError> {
        self.buffer.set_u16_le(layout::REPLY_PORT_RANGE.start, port)?;
        self.port = port;
        Ok(())
    }

    pub fn firmware_version(&self) -> u16 {
        self.firmware_version
    }

    pub fn set_firmware_version(&mut self, version: u16) -> Result<(), PacketError> {
        self.buffer.set_u16_be(layout::REPLY_VERSION_RANGE.start, version)?;
        self.firmware_version = version;
        Ok(())
    }

    pub fn net_switch(&self) -> u8 {
        self.net_switch
    }

    pub fn sub_switch(&self) -> u8 {
        self.sub_switch
    }

    pub fn set_switches(&mut self, net_switch: u8, sub_switch: u8) -> Result<(), PacketError> {
        let net_switch = net_switch & 0x7f;
        let sub_switch = sub_switch & 0x0f;
        self.buffer.set_u8(layout::REPLY_NET_SWITCH_OFFSET, net_switch)?;
        self.buffer.set_u8(layout::REPLY_SUB_SWITCH_OFFSET, sub_switch)?;
        self.net_switch = net_switch;
        self.sub_switch = sub_switch;
        Ok(())
    }

    pub fn oem_code(&self) -> u16 {
        self.oem_code
    }

    pub fn set_oem_code(&mut self, oem_code: u16) -> Result<(), PacketError> {
        self.buffer.set_u16_be(layout::REPLY_OEM_RANGE.start, oem_code)?;
        self.oem_code = oem_code;
        Ok(())
    }

    pub fn node_status(&self) -> u8 {
        self.node_status
    }

    pub fn set_node_status(&mut self, status: u8) -> Result<(), PacketError> {
        self.buffer.set_u8(layout::REPLY_STATUS_OFFSET, status)?;
        self.node_status = status;
        Ok(())
    }

    pub fn esta_code(&self) -> u16 {
        self.esta_code
    }

    pub fn set_esta_code(&mut self, esta_code: u16) -> Result<(), PacketError> {
        self.buffer.set_u16_le(layout::REPLY_ESTA_RANGE.start, esta_code)?;
        self.esta_code = esta_code;
        Ok(())
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn set_short_name(&mut self, name: &str) -> Result<(), PacketError> {
        self.buffer.set_ascii(layout::REPLY_SHORT_NAME_RANGE, name)?;
        self.short_name = self.buffer.ascii(layout::REPLY_SHORT_NAME_RANGE)?;
        Ok(())
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn set_long_name(&mut self, name: &str) -> Result<(), PacketError> {
        self.buffer.set_ascii(layout::REPLY_LONG_NAME_RANGE, name)?;
        self.long_name = self.buffer.ascii(layout::REPLY_LONG_NAME_RANGE)?;
        Ok(())
    }

    pub fn node_report(&self) -> &str {
        &self.node_report
    }

    /// Report code parsed from the `#xxxx` prefix of the node report.
    pub fn report_code(&self) -> Option<ReportCode> {
        self.node_report
            .split_whitespace()
            .next()
            .and_then(ReportCode::from_id)
    }

    /// Writes the node report as `#xxxx [counter] text`.
    pub fn set_node_report(
        &mut self,
        code: ReportCode,
        counter: u16,
        text: &str,
    ) -> Result<(), PacketError> {
        let report = format!("{} [{:04}] {}", code.id(), counter % 10_000, text);
        self.buffer.set_ascii(layout::REPLY_NODE_REPORT_RANGE, &report)?;
        self.node_report = self.buffer.ascii(layout::REPLY_NODE_REPORT_RANGE)?;
        Ok(())
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        &self.ports
    }

    /// Keeps at most four ports; the port count field follows.
    pub fn set_ports(&mut self, ports: &[PortDescriptor]) -> Result<(), PacketError> {
        let ports = &ports[..ports.len().min(layout::MAX_PORTS)];
        let mut ids = [0u8; layout::MAX_PORTS];
        for (slot, port) in ids.iter_mut().zip(ports) {
            *slot = port.id();
        }
        self.buffer.set_u16_be(layout::REPLY_NUM_PORTS_RANGE.start, ports.len() as u16)?;
        self.buffer.set_bytes(layout::REPLY_PORT_TYPES_RANGE.start, &ids)?;
        self.ports = ports.to_vec();
        Ok(())
    }

    pub fn good_input(&self) -> [u8; layout::MAX_PORTS] {
        self.good_input
    }

    pub fn good_output(&self) -> [u8; layout::MAX_PORTS] {
        self.good_output
    }

    pub fn set_good_io(
        &mut self,
        input: [u8; layout::MAX_PORTS],
        output: [u8; layout::MAX_PORTS],
    ) -> Result<(), PacketError> {
        self.buffer.set_bytes(layout::REPLY_GOOD_INPUT_RANGE.start, &input)?;
        self.buffer.set_bytes(layout::REPLY_GOOD_OUTPUT_RANGE.start, &output)?;
        self.good_input = input;
        self.good_output = output;
        Ok(())
    }

    /// Per-port input universe switches (SwIn).
    pub fn dmx_ins(&self) -> [u8; layout::MAX_PORTS] {
        self.dmx_ins
    }

    /// Per-port output universe switches (SwOut).
    pub fn dmx_outs(&self) -> [u8; layout::MAX_PORTS] {
        self.dmx_outs
    }

    pub fn set_dmx_ins(&mut self, ins: [u8; layout::MAX_PORTS]) -> Result<(), PacketError> {
        self.buffer.set_bytes(layout::REPLY_SW_IN_RANGE.start, &ins)?;
        self.dmx_ins = ins;
        Ok(())
    }

    pub fn set_dmx_outs(&mut self, outs: [u8; layout::MAX_PORTS]) -> Result<(), PacketError> {
        self.buffer.set_bytes(layout::REPLY_SW_OUT_RANGE.start, &outs)?;
        self.dmx_outs = outs;
        Ok(())
    }

    /// Raw style byte; see [`ArtPollReply::style`].
    pub fn style_id(&self) -> u8 {
        self.style
    }

    pub fn style(&self) -> Option<NodeStyle> {
        NodeStyle::from_id(self.style)
    }

    pub fn set_style(&mut self, style: NodeStyle) -> Result<(), PacketError> {
        self.buffer.set_u8(layout::REPLY_STYLE_OFFSET, style.id())?;
        self.style = style.id();
        Ok(())
    }

    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }

    pub fn set_mac(&mut self, mac: [u8; 6]) -> Result<(), PacketError> {
        self.buffer.set_bytes(layout::REPLY_MAC_RANGE.start, &mac)?;
        self.mac = mac;
        Ok(())
    }

    pub fn bind_ip(&self) -> Ipv4Addr {
        self.bind_ip
    }

    pub fn set_bind_ip(&mut self, ip: Ipv4Addr) -> Result<(), PacketError> {
        self.buffer.set_bytes(layout::REPLY_BIND_IP_RANGE.start, &ip.octets())?;
        self.bind_ip = ip;
        Ok(())
    }

    pub fn status2(&self) -> u8 {
        self.status2
    }

    pub fn set_status2(&mut self, status: u8) -> Result<(), PacketError> {
        self.buffer.set_u8(layout::REPLY_STATUS2_OFFSET, status)?;
        self.status2 = status;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }
}

fn field<T: Default>(name: &'static str, value: Result<T, PacketError>) -> T {
    value.unwrap_or_else(|err| {
        tracing::debug!(field = name, error = %err, "ArtPollReply field unreadable, using default");
        T::default()
    })
}
