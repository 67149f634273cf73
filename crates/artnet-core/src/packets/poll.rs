use super::buffer::PacketBuffer;
use super::error::PacketError;
use super::layout;

/// TalkToMe bit: send ArtPollReply whenever node conditions change.
pub const TALK_TO_ME_REPLY_ON_CHANGE: u8 = 0x02;
/// TalkToMe bit: send diagnostics messages.
pub const TALK_TO_ME_DIAGNOSTICS: u8 = 0x04;
/// TalkToMe bit: diagnostics are unicast instead of broadcast.
pub const TALK_TO_ME_DIAGNOSTICS_UNICAST: u8 = 0x08;

/// ArtPoll discovery request. Flags and priority are carried through as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPoll {
    buffer: PacketBuffer,
    flags: u8,
    priority: u8,
}

impl Default for ArtPoll {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtPoll {
    pub fn new() -> Self {
        Self::with_flags(TALK_TO_ME_REPLY_ON_CHANGE, 0)
    }

    pub fn with_flags(flags: u8, priority: u8) -> Self {
        Self {
            buffer: PacketBuffer::with_header(
                layout::POLL_LEN,
                layout::POLL_LEN,
                layout::OP_POLL,
                true,
                &[flags, priority],
            ),
            flags,
            priority,
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        let reader = PacketBuffer::from_bytes(raw);
        let bytes = reader.slice(0..layout::POLL_LEN)?;
        let mut buffer = PacketBuffer::new(layout::POLL_LEN);
        buffer.set_bytes(0, bytes)?;
        Ok(Self {
            flags: reader.u8(layout::POLL_FLAGS_OFFSET)?,
            priority: reader.u8(layout::POLL_PRIORITY_OFFSET)?,
            buffer,
        })
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u8) -> Result<(), PacketError> {
        self.buffer.set_u8(layout::POLL_FLAGS_OFFSET, flags)?;
        self.flags = flags;
        Ok(())
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: u8) -> Result<(), PacketError> {
        self.buffer.set_u8(layout::POLL_PRIORITY_OFFSET, priority)?;
        self.priority = priority;
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

#[cfg(test)]
mod tests {
    use super::{ArtPoll, TALK_TO_ME_DIAGNOSTICS};
    use crate::packets::layout;

    #[test]
    fn flags_and_priority_survive_decoding() {
        let mut poll = ArtPoll::new();
        poll.set_flags(TALK_TO_ME_DIAGNOSTICS).unwrap();
        poll.set_priority(0x40).unwrap();
        assert_eq!(poll.len(), layout::POLL_LEN);

        let decoded = ArtPoll::parse(poll.as_bytes()).unwrap();
        assert_eq!(decoded.flags(), TALK_TO_ME_DIAGNOSTICS);
        assert_eq!(decoded.priority(), 0x40);
        assert_eq!(&decoded.as_bytes()[layout::OP_CODE_RANGE], &layout::OP_POLL.to_le_bytes());
    }

    #[test]
    fn parse_short_payload() {
        let poll = ArtPoll::new();
        let err = ArtPoll::parse(&poll.as_bytes()[..12]).unwrap_err();
        assert!(err.to_string().contains("payload too short"));
    }
}
