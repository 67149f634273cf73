use super::buffer::PacketBuffer;
use super::error::PacketError;
use super::layout;
use super::{ArtDmx, ArtNetPacket, ArtPoll, ArtPollReply};

/// Validates and classifies one datagram.
///
/// Returns `Ok(None)` when the datagram is not Art-Net (bad identifier) or
/// carries an opcode this crate does not model, and `Err` when it is Art-Net
/// but truncated or internally inconsistent.
///
/// # Examples
/// ```
/// use artnet_core::packets::{ArtDmx, ArtNetPacket, parse_packet};
///
/// let mut dmx = ArtDmx::new();
/// dmx.set_dmx(&[1, 2, 3, 4], 4).unwrap();
/// let packet = parse_packet(dmx.as_bytes()).unwrap();
/// assert!(matches!(packet, Some(ArtNetPacket::Dmx(_))));
///
/// assert!(parse_packet(b"not-art-net-at-all").unwrap().is_none());
/// ```
pub fn parse_packet(raw: &[u8]) -> Result<Option<ArtNetPacket>, PacketError> {
    let reader = PacketBuffer::from_bytes(raw);
    reader.slice(0..layout::HEADER_LEN)?;

    let signature = reader.slice(layout::ID_RANGE)?;
    if signature != layout::ARTNET_ID {
        return Ok(None);
    }

    let opcode = reader.u16_le(layout::OP_CODE_RANGE.start)?;
    let packet = match opcode {
        layout::OP_OUTPUT => ArtNetPacket::Dmx(ArtDmx::parse(raw)?),
        layout::OP_POLL => ArtNetPacket::Poll(ArtPoll::parse(raw)?),
        layout::OP_POLL_REPLY => ArtNetPacket::PollReply(ArtPollReply::parse(raw)?),
        _ => {
            tracing::trace!(opcode, "unsupported Art-Net opcode");
            return Ok(None);
        }
    };
    Ok(Some(packet))
}

#[cfg(test)]
mod tests {
    use super::parse_packet;
    use crate::packets::{ArtDmx, ArtNetPacket, ArtPoll, ArtPollReply, layout};

    #[test]
    fn dispatches_known_opcodes() {
        let poll = ArtPoll::new();
        assert!(matches!(
            parse_packet(poll.as_bytes()).unwrap(),
            Some(ArtNetPacket::Poll(_))
        ));

        let reply = ArtPollReply::new();
        assert!(matches!(
            parse_packet(reply.as_bytes()).unwrap(),
            Some(ArtNetPacket::PollReply(_))
        ));

        let mut dmx = ArtDmx::new();
        dmx.set_dmx(&[7; 3], 3).unwrap();
        match parse_packet(dmx.as_bytes()).unwrap() {
            Some(ArtNetPacket::Dmx(decoded)) => assert_eq!(&decoded.dmx()[..3], &[7, 7, 7]),
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn corrupted_identifier_is_not_artnet() {
        let mut raw = ArtPoll::new().as_bytes().to_vec();
        raw[0] = b'X';
        assert!(parse_packet(&raw).unwrap().is_none());
    }

    #[test]
    fn unknown_opcode_is_ignored() {
        let mut raw = ArtPoll::new().as_bytes().to_vec();
        raw[layout::OP_CODE_RANGE].copy_from_slice(&0x9900u16.to_le_bytes());
        assert!(parse_packet(&raw).unwrap().is_none());
    }

    #[test]
    fn truncated_header_is_an_error() {
        let err = parse_packet(&layout::ARTNET_ID[..6]).unwrap_err();
        assert!(err.to_string().contains("payload too short"));
    }

    #[test]
    fn variant_errors_surface_to_the_caller() {
        let mut dmx = ArtDmx::new();
        dmx.set_dmx(&[1; 10], 10).unwrap();
        let raw = &dmx.as_bytes()[..layout::DMX_DATA_OFFSET + 2];
        assert!(parse_packet(raw).is_err());
    }
}
