//! Core constants for the WL-134 reader frame and the feeding policy.
//!
//! The WL-134 family of FDX-B animal tag readers emits a fixed 30-byte ASCII
//! frame every time a tag enters the antenna field:
//!
//! ```text
//! offset  0      1..=10        11..=14       15     16     17..=28    29
//!        +-----+-------------+-------------+------+------+----------+-----+
//!        | STX | card number | country     | data | anim | reserved | ETX |
//!        |0x02 | 10 hex, LSD | 4 digits    | flag | flag |          |0x03 |
//!        |     | first       |             |      |      |          |     |
//!        +-----+-------------+-------------+------+------+----------+-----+
//! ```
//!
//! The card number field holds uppercase hexadecimal ASCII digits with the
//! least significant digit first.
//!
//! # Usage
//!
//! ```
//! use feedgate_core::constants::*;
//!
//! assert_eq!(FRAME_LEN, 30);
//! assert_eq!(CARD_NUMBER_OFFSET + CARD_NUMBER_LEN, COUNTRY_CODE_OFFSET);
//! ```

// ============================================================================
// Frame Markers
// ============================================================================

/// Start of text marker (STX).
///
/// ```text
/// <STX>2A0000000000...<ETX>
/// ^^^^^
/// Start marker
/// ```
pub const START_BYTE: u8 = 0x02; // STX

/// End of text marker (ETX), always the last byte of a frame.
pub const END_BYTE: u8 = 0x03; // ETX

// ============================================================================
// Frame Layout
// ============================================================================

/// Total length of a reader frame in bytes, markers included.
pub const FRAME_LEN: usize = 30;

/// Offset of the first card number digit.
pub const CARD_NUMBER_OFFSET: usize = 1;

/// Number of hexadecimal ASCII digits in the card number field.
pub const CARD_NUMBER_LEN: usize = 10;

/// Offset of the 4-digit country code field.
pub const COUNTRY_CODE_OFFSET: usize = 11;

/// Length of the country code field.
pub const COUNTRY_CODE_LEN: usize = 4;

/// Offset of the data block flag.
pub const DATA_BLOCK_FLAG_OFFSET: usize = 15;

/// Offset of the animal flag.
pub const ANIMAL_FLAG_OFFSET: usize = 16;

/// Offset of the trailing end marker.
pub const END_BYTE_OFFSET: usize = FRAME_LEN - 1;

/// Largest value a 10-digit card number can encode (`0xFF_FFFF_FFFF`).
pub const MAX_TAG_VALUE: u64 = (1 << (4 * CARD_NUMBER_LEN)) - 1;

// ============================================================================
// Reader Link
// ============================================================================

/// Baud rate the WL-134 module ships with (8N1, no flow control).
pub const DEFAULT_BAUD_RATE: u32 = 9600;

// ============================================================================
// Feeding Policy Defaults
// ============================================================================

/// Default quantity dispensed per feeding event.
pub const DEFAULT_RATION_SIZE: f64 = 1.0;

/// Default minimum time between two rations for the same animal (seconds).
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 600;

/// Tolerance used when comparing accumulated quantities.
///
/// Rations such as `0.1` do not add up exactly in binary floating point.
pub const QUANTITY_EPSILON: f64 = 1e-9;

// ============================================================================
// Time
// ============================================================================

/// Length of a calendar day in seconds.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Earliest instant a [`SystemClock`](crate::SystemClock) accepts as
/// synchronised (2024-01-01T00:00:00Z, Unix seconds).
///
/// A controller whose RTC was never set boots at the Unix epoch; decisions
/// taken against that time would reset every quota.
pub const DEFAULT_CLOCK_SYNC_FLOOR_SECS: i64 = 1_704_067_200;
