use super::buffer::PacketBuffer;
use super::error::PacketError;
use super::layout;

/// ArtDmx (OpOutput) packet: one universe worth of DMX512 slot data.
///
/// Every setter writes through to the backing buffer, so [`ArtDmx::as_bytes`]
/// is always the datagram to send. The payload is padded to an even length
/// on the wire.
///
/// # Examples
/// ```
/// use artnet_core::packets::ArtDmx;
///
/// let mut dmx = ArtDmx::new();
/// dmx.set_universe(1, 2).unwrap();
/// dmx.set_dmx(&[255, 128, 0], 3).unwrap();
/// assert_eq!(dmx.len(), 18 + 4);
/// assert_eq!(dmx.dmx(), &[255, 128, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    buffer: PacketBuffer,
    sequence: u8,
    subnet: u8,
    universe: u8,
    num_channels: usize,
}

impl Default for ArtDmx {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtDmx {
    pub fn new() -> Self {
        let buffer = PacketBuffer::with_header(
            layout::DMX_CAPACITY,
            layout::DMX_DATA_OFFSET,
            layout::OP_OUTPUT,
            true,
            &[0, layout::DMX_PHYSICAL_PORT],
        );
        Self {
            buffer,
            sequence: 0,
            subnet: 0,
            universe: 0,
            num_channels: 0,
        }
    }

    /// Decodes an ArtDmx datagram whose header has already been validated.
    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        let reader = PacketBuffer::from_bytes(raw);
        reader.slice(0..layout::DMX_DATA_OFFSET)?;

        let length = reader.u16_be(layout::DMX_LENGTH_RANGE.start)?;
        if length == 0 || length as usize > layout::DMX_MAX_SLOTS {
            return Err(PacketError::InvalidLength { length });
        }
        let wire_len = layout::DMX_DATA_OFFSET + length as usize;
        let bytes = reader.slice(0..wire_len)?;

        let mut buffer = PacketBuffer::new(layout::DMX_CAPACITY);
        buffer.set_bytes(0, bytes)?;
        buffer.set_len(wire_len)?;

        let port_address = reader.u16_le(layout::DMX_UNIVERSE_RANGE.start)?;
        Ok(Self {
            buffer,
            sequence: reader.u8(layout::DMX_SEQUENCE_OFFSET)?,
            subnet: ((port_address >> 4) & 0x0f) as u8,
            universe: (port_address & 0x0f) as u8,
            num_channels: length as usize,
        })
    }

    pub fn sequence_id(&self) -> u8 {
        self.sequence
    }

    /// Stores `id mod 256`.
    pub fn set_sequence_id(&mut self, id: u32) -> Result<(), PacketError> {
        let sequence = (id % 256) as u8;
        self.buffer.set_u8(layout::DMX_SEQUENCE_OFFSET, sequence)?;
        self.sequence = sequence;
        Ok(())
    }

    pub fn subnet_id(&self) -> u8 {
        self.subnet
    }

    pub fn universe_id(&self) -> u8 {
        self.universe
    }

    pub fn set_subnet_id(&mut self, subnet: u8) -> Result<(), PacketError> {
        self.set_universe(subnet, self.universe)
    }

    pub fn set_universe_id(&mut self, universe: u8) -> Result<(), PacketError> {
        self.set_universe(self.subnet, universe)
    }

    /// Keeps the low nibble of each id and packs them as `subnet << 4 | universe`.
    pub fn set_universe(&mut self, subnet: u8, universe: u8) -> Result<(), PacketError> {
        let subnet = subnet & 0x0f;
        let universe = universe & 0x0f;
        let packed = u16::from(subnet) << 4 | u16::from(universe);
        self.buffer.set_u16_le(layout::DMX_UNIVERSE_RANGE.start, packed)?;
        self.subnet = subnet;
        self.universe = universe;
        tracing::trace!(subnet, universe, "ArtDmx universe set");
        Ok(())
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Caps at 512 channels; the wire length follows.
    pub fn set_num_channels(&mut self, num_channels: usize) -> Result<(), PacketError> {
        self.num_channels = num_channels.min(layout::DMX_MAX_SLOTS);
        self.sync_length()
    }

    /// Copies up to `num_channels` slots from `data`; missing slots and the
    /// padding byte are zeroed.
    pub fn set_dmx(&mut self, data: &[u8], num_channels: usize) -> Result<(), PacketError> {
        let count = num_channels.min(layout::DMX_MAX_SLOTS);
        let copied = count.min(data.len());
        tracing::trace!(channels = count, "setting ArtDmx payload");
        self.buffer.clear(
            layout::DMX_DATA_OFFSET..layout::DMX_DATA_OFFSET + padded(count),
        )?;
        self.buffer.set_bytes(layout::DMX_DATA_OFFSET, &data[..copied])?;
        self.num_channels = count;
        self.sync_length()
    }

    /// Slot data for the current channel count, without padding.
    pub fn dmx(&self) -> &[u8] {
        let start = layout::DMX_DATA_OFFSET;
        &self.buffer.as_bytes()[start..start + self.num_channels]
    }

    /// Wire length: header plus the even-padded payload.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_channels == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    fn sync_length(&mut self) -> Result<(), PacketError> {
        let wire = padded(self.num_channels);
        if wire != self.num_channels {
            self.buffer.set_u8(layout::DMX_DATA_OFFSET + self.num_channels, 0)?;
        }
        self.buffer.set_u16_be(layout::DMX_LENGTH_RANGE.start, wire as u16)?;
        self.buffer.set_len(layout::DMX_DATA_OFFSET + wire)
    }
}

fn padded(count: usize) -> usize {
    if count % 2 == 1 { count + 1 } else { count }
}

#[cfg(test)]
mod tests {
    use super::ArtDmx;
    use crate::packets::{PacketError, layout};

    fn frame(count: usize) -> Vec<u8> {
        (0..count).map(|i| (i % 251) as u8 + 1).collect()
    }

    #[test]
    fn header_is_written_on_construction() {
        let dmx = ArtDmx::new();
        let bytes = dmx.as_bytes();
        assert_eq!(&bytes[layout::ID_RANGE], layout::ARTNET_ID);
        assert_eq!(&bytes[layout::OP_CODE_RANGE], &layout::OP_OUTPUT.to_le_bytes());
        assert_eq!(
            &bytes[layout::PROTOCOL_VERSION_RANGE],
            &layout::PROTOCOL_VERSION.to_be_bytes()
        );
        assert_eq!(bytes[layout::DMX_PHYSICAL_OFFSET], layout::DMX_PHYSICAL_PORT);
        assert_eq!(dmx.len(), layout::DMX_DATA_OFFSET);
    }

    #[test]
    fn round_trip_preserves_fields() {
        for count in [1usize, 2, 511, 512] {
            let data = frame(count);
            let mut dmx = ArtDmx::new();
            dmx.set_sequence_id(42).unwrap();
            dmx.set_universe(3, 9).unwrap();
            dmx.set_dmx(&data, count).unwrap();

            let expected_wire = if count % 2 == 1 { count + 1 } else { count };
            assert_eq!(dmx.len(), layout::DMX_DATA_OFFSET + expected_wire);

            let decoded = ArtDmx::parse(dmx.as_bytes()).unwrap();
            assert_eq!(decoded.num_channels(), expected_wire);
            assert_eq!(decoded.subnet_id(), 3);
            assert_eq!(decoded.universe_id(), 9);
            assert_eq!(decoded.sequence_id(), 42);
            assert_eq!(&decoded.dmx()[..count], &data[..]);
            if expected_wire != count {
                assert_eq!(decoded.dmx()[count], 0);
            }
            assert_eq!(decoded.as_bytes(), dmx.as_bytes());
        }
    }

    #[test]
    fn sequence_wraps_mod_256() {
        let mut dmx = ArtDmx::new();
        dmx.set_sequence_id(256).unwrap();
        assert_eq!(dmx.sequence_id(), 0);
        assert_eq!(dmx.as_bytes()[layout::DMX_SEQUENCE_OFFSET], 0);
        dmx.set_sequence_id(255).unwrap();
        assert_eq!(dmx.sequence_id(), 255);
        assert_eq!(dmx.as_bytes()[layout::DMX_SEQUENCE_OFFSET], 255);
    }

    #[test]
    fn universe_ids_are_masked_to_four_bits() {
        let mut dmx = ArtDmx::new();
        dmx.set_universe(0x1f, 0x1f).unwrap();
        assert_eq!(dmx.subnet_id(), 0x0f);
        assert_eq!(dmx.universe_id(), 0x0f);
        assert_eq!(&dmx.as_bytes()[layout::DMX_UNIVERSE_RANGE], &[0xff, 0x00]);

        dmx.set_universe_id(0x02).unwrap();
        assert_eq!(&dmx.as_bytes()[layout::DMX_UNIVERSE_RANGE], &[0xf2, 0x00]);
        dmx.set_subnet_id(0x31).unwrap();
        assert_eq!(&dmx.as_bytes()[layout::DMX_UNIVERSE_RANGE], &[0x12, 0x00]);
    }

    #[test]
    fn channel_count_is_capped() {
        let mut dmx = ArtDmx::new();
        dmx.set_num_channels(600).unwrap();
        assert_eq!(dmx.num_channels(), layout::DMX_MAX_SLOTS);
        dmx.set_dmx(&frame(600), 600).unwrap();
        assert_eq!(dmx.len(), layout::DMX_CAPACITY);
    }

    #[test]
    fn short_data_is_zero_filled() {
        let mut dmx = ArtDmx::new();
        dmx.set_dmx(&[9; 8], 8).unwrap();
        dmx.set_dmx(&[1, 2], 4).unwrap();
        assert_eq!(dmx.dmx(), &[1, 2, 0, 0]);
    }

    #[test]
    fn parse_rejects_invalid_length() {
        let mut dmx = ArtDmx::new();
        dmx.set_dmx(&[1, 2], 2).unwrap();
        let mut raw = dmx.as_bytes().to_vec();
        raw[layout::DMX_LENGTH_RANGE].copy_from_slice(&0u16.to_be_bytes());
        assert_eq!(
            ArtDmx::parse(&raw).unwrap_err(),
            PacketError::InvalidLength { length: 0 }
        );
    }

    #[test]
    fn parse_rejects_truncated_payload() {
        let mut dmx = ArtDmx::new();
        dmx.set_dmx(&frame(16), 16).unwrap();
        let raw = &dmx.as_bytes()[..layout::DMX_DATA_OFFSET + 8];
        let msg = ArtDmx::parse(raw).unwrap_err().to_string();
        assert!(msg.contains("payload too short"));
    }
}
