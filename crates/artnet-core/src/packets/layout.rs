use std::ops::Range;

pub const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
pub const ID_RANGE: Range<usize> = 0..8;
pub const OP_CODE_RANGE: Range<usize> = 8..10;
pub const PROTOCOL_VERSION_RANGE: Range<usize> = 10..12;
pub const HEADER_LEN: usize = 10;

pub const PROTOCOL_VERSION: u16 = 14;
pub const DEFAULT_PORT: u16 = 0x1936;

pub const OP_POLL: u16 = 0x2000;
pub const OP_POLL_REPLY: u16 = 0x2100;
pub const OP_OUTPUT: u16 = 0x5000;

// ArtDmx
pub const DMX_SEQUENCE_OFFSET: usize = 12;
pub const DMX_PHYSICAL_OFFSET: usize = 13;
pub const DMX_UNIVERSE_RANGE: Range<usize> = 14..16;
pub const DMX_LENGTH_RANGE: Range<usize> = 16..18;
pub const DMX_DATA_OFFSET: usize = 18;
pub const DMX_MAX_SLOTS: usize = 512;
pub const DMX_PHYSICAL_PORT: u8 = 0x02;
pub const DMX_CAPACITY: usize = DMX_DATA_OFFSET + DMX_MAX_SLOTS;

// ArtPoll
pub const POLL_FLAGS_OFFSET: usize = 12;
pub const POLL_PRIORITY_OFFSET: usize = 13;
pub const POLL_LEN: usize = 14;

// ArtPollReply
pub const REPLY_IP_RANGE: Range<usize> = 10..14;
pub const REPLY_PORT_RANGE: Range<usize> = 14..16;
pub const REPLY_VERSION_RANGE: Range<usize> = 16..18;
pub const REPLY_NET_SWITCH_OFFSET: usize = 18;
pub const REPLY_SUB_SWITCH_OFFSET: usize = 19;
pub const REPLY_OEM_RANGE: Range<usize> = 20..22;
pub const REPLY_UBEA_OFFSET: usize = 22;
pub const REPLY_STATUS_OFFSET: usize = 23;
pub const REPLY_ESTA_RANGE: Range<usize> = 24..26;
pub const REPLY_SHORT_NAME_RANGE: Range<usize> = 26..44;
pub const REPLY_LONG_NAME_RANGE: Range<usize> = 44..108;
pub const REPLY_NODE_REPORT_RANGE: Range<usize> = 108..172;
pub const REPLY_NUM_PORTS_RANGE: Range<usize> = 172..174;
pub const REPLY_PORT_TYPES_RANGE: Range<usize> = 174..178;
pub const REPLY_GOOD_INPUT_RANGE: Range<usize> = 178..182;
pub const REPLY_GOOD_OUTPUT_RANGE: Range<usize> = 182..186;
pub const REPLY_SW_IN_RANGE: Range<usize> = 186..190;
pub const REPLY_SW_OUT_RANGE: Range<usize> = 190..194;
pub const REPLY_STYLE_OFFSET: usize = 200;
pub const REPLY_MAC_RANGE: Range<usize> = 201..207;
pub const REPLY_BIND_IP_RANGE: Range<usize> = 207..211;
pub const REPLY_STATUS2_OFFSET: usize = 212;
pub const REPLY_LEN: usize = 239;
pub const MAX_PORTS: usize = 4;
