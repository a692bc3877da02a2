//! Decoding of WL-134 reader frames.
//!
//! The card number is sent as ten uppercase hexadecimal ASCII digits with the
//! least significant digit first. Decoding walks the field from its last byte
//! back to the first, shifting the accumulator left one nibble per digit, so
//! the digit next to the header ends up as the least significant nibble.
//!
//! ```text
//! bytes 1..=10:  '5' 'A' '1' '0' '0' '0' '0' '0' '0' '0'
//! reversed:      0000000 1 A 5  ->  0x1A5 = 421
//! ```
//!
//! # Example
//!
//! ```
//! use feedgate_core::TagId;
//! use feedgate_rfid::{decode, encode_frame};
//!
//! let tag = TagId::new(421).unwrap();
//! let frame = encode_frame(tag);
//! assert_eq!(frame[1], b'5');
//! assert_eq!(decode(&frame), Some(tag));
//! ```

use feedgate_core::{
    FrameError, TagId,
    constants::{CARD_NUMBER_LEN, CARD_NUMBER_OFFSET, END_BYTE, END_BYTE_OFFSET, FRAME_LEN, START_BYTE},
};

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Decode a frame, discarding the rejection reason.
///
/// Returns `None` for any malformed frame. A tag whose number is zero decodes
/// to `Some(TagId(0))`.
#[must_use]
pub fn decode(buffer: &[u8]) -> Option<TagId> {
    parse_frame(buffer).ok()
}

/// Decode a frame and report why it was rejected.
///
/// # Errors
/// - `FrameError::InvalidLength` unless `buffer` is exactly 30 bytes
/// - `FrameError::BadHeader` / `FrameError::BadFooter` on wrong markers
/// - `FrameError::InvalidDigit` for anything outside `0-9` / `A-F`
///   (lowercase digits are rejected)
pub fn parse_frame(buffer: &[u8]) -> Result<TagId, FrameError> {
    if buffer.len() != FRAME_LEN {
        return Err(FrameError::InvalidLength {
            expected: FRAME_LEN,
            actual: buffer.len(),
        });
    }

    if buffer[0] != START_BYTE {
        return Err(FrameError::BadHeader { found: buffer[0] });
    }

    if buffer[END_BYTE_OFFSET] != END_BYTE {
        return Err(FrameError::BadFooter {
            found: buffer[END_BYTE_OFFSET],
        });
    }

    let mut value: u64 = 0;
    for i in (0..CARD_NUMBER_LEN).rev() {
        let offset = CARD_NUMBER_OFFSET + i;
        let byte = buffer[offset];
        let nibble = hex_value(byte).ok_or(FrameError::InvalidDigit { offset, byte })?;
        value = (value << 4) | u64::from(nibble);
    }

    Ok(TagId::truncating(value))
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Build the frame a reader would emit for `tag`.
///
/// Country code and flag fields are filled with ASCII `'0'`, matching a tag
/// without country registration. Used by tests, benchmarks and the
/// `decode` tooling.
#[must_use]
pub fn encode_frame(tag: TagId) -> [u8; FRAME_LEN] {
    let mut frame = [b'0'; FRAME_LEN];
    frame[0] = START_BYTE;
    frame[END_BYTE_OFFSET] = END_BYTE;

    let mut value = tag.as_u64();
    for slot in &mut frame[CARD_NUMBER_OFFSET..CARD_NUMBER_OFFSET + CARD_NUMBER_LEN] {
        *slot = HEX_DIGITS[(value & 0xF) as usize];
        value >>= 4;
    }

    frame
}
