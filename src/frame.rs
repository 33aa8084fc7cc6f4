//! X10A frame encoding and validation.
//!
//! The unit answers a registry query with one block holding every register of that registry:
//!
//! ```text
//! request:  0x03 0x40 <registry> <checksum>
//! response: 0x40 <registry> <len> <payload: len - 2 bytes> <checksum>
//! ```
//!
//! The checksum is the bitwise NOT of the wrapping byte sum of everything before it.
//! A register is `dataSize` bytes of the payload starting at its `offset`.

use thiserror::Error;

/// First two bytes of every query.
pub const REQUEST_PREFIX: [u8; 2] = [0x03, 0x40];
/// First byte of every well-formed response.
pub const RESPONSE_HEADER: u8 = 0x40;
/// The unit answers with this instead of a frame when it does not know the registry.
pub const NAK: [u8; 2] = [0x15, 0xEA];
/// Header bytes ahead of the payload: header, registry echo, length.
pub const HEADER_LEN: usize = 3;
/// Smallest legal response: header plus checksum, empty payload.
pub const MIN_RESPONSE_LEN: usize = HEADER_LEN + 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("response shorter than its header")]
    TooShort,
    #[error("unexpected response header 0x{0:02X}")]
    BadHeader(u8),
    #[error("response echoes registry 0x{found:02X}, expected 0x{expected:02X}")]
    RegistryMismatch { expected: u8, found: u8 },
    #[error("response announces {announced} bytes but {received} were received")]
    LengthMismatch { announced: usize, received: usize },
    #[error("checksum 0x{found:02X} does not match computed 0x{computed:02X}")]
    BadChecksum { computed: u8, found: u8 },
    #[error("register at offset {offset} with size {size} lies outside a {payload}-byte payload")]
    OutOfRange {
        offset: usize,
        size: usize,
        payload: usize,
    },
    #[error("response does not fit the frame buffer")]
    BufferFull,
}

/// Bitwise NOT of the wrapping sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Build the query frame for one registry.
pub fn encode_request(registry_id: u8) -> [u8; 4] {
    let mut request = [REQUEST_PREFIX[0], REQUEST_PREFIX[1], registry_id, 0];
    request[3] = checksum(&request[..3]);
    request
}

/// Returns true once `partial` is recognisably a NAK.
pub fn is_nak(partial: &[u8]) -> bool {
    partial.starts_with(&NAK)
}

/// Total frame length announced by the first [`HEADER_LEN`] bytes of a response.
pub fn expected_len(header: &[u8]) -> Result<usize, FrameError> {
    let [first, _, len, ..] = header else {
        return Err(FrameError::TooShort);
    };
    if *first != RESPONSE_HEADER {
        return Err(FrameError::BadHeader(*first));
    }
    let total = *len as usize + 2;
    if total < MIN_RESPONSE_LEN {
        return Err(FrameError::LengthMismatch {
            announced: total,
            received: header.len(),
        });
    }
    Ok(total)
}

/// Validate a complete response for `registry_id` and return its payload.
pub fn parse_response(frame: &[u8], registry_id: u8) -> Result<&[u8], FrameError> {
    let total = expected_len(frame)?;
    if frame.len() != total {
        return Err(FrameError::LengthMismatch {
            announced: total,
            received: frame.len(),
        });
    }
    if frame[1] != registry_id {
        return Err(FrameError::RegistryMismatch {
            expected: registry_id,
            found: frame[1],
        });
    }

    let (body, trailer) = frame.split_at(total - 1);
    let computed = checksum(body);
    if computed != trailer[0] {
        return Err(FrameError::BadChecksum {
            computed,
            found: trailer[0],
        });
    }
    Ok(&body[HEADER_LEN..])
}

/// The `size` bytes of `payload` that belong to a register at `offset`.
pub fn register_slice(payload: &[u8], offset: usize, size: usize) -> Result<&[u8], FrameError> {
    offset
        .checked_add(size)
        .and_then(|end| payload.get(offset..end))
        .ok_or(FrameError::OutOfRange {
            offset,
            size,
            payload: payload.len(),
        })
}

#[cfg(test)]
pub(crate) fn encode_response(registry_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![RESPONSE_HEADER, registry_id, (payload.len() + 2) as u8];
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    frame
}
