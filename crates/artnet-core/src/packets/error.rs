use thiserror::Error;

/// Errors returned by Art-Net packet encoding and decoding.
///
/// # Examples
/// ```
/// use artnet_core::packets::PacketError;
///
/// let err = PacketError::InvalidLength { length: 600 };
/// assert!(err.to_string().contains("invalid ArtDmx length"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("payload too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("access of {width} bytes at offset {offset} exceeds buffer capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        width: usize,
        capacity: usize,
    },
    #[error("invalid ArtDmx length: {length}")]
    InvalidLength { length: u16 },
}
