use thiserror::Error;

/// Reasons a reader frame is rejected by the decoder.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid header byte: expected 0x02, got {found:#04x}")]
    BadHeader { found: u8 },

    #[error("Invalid footer byte: expected 0x03, got {found:#04x}")]
    BadFooter { found: u8 },

    #[error("Invalid card number digit {byte:#04x} at offset {offset}")]
    InvalidDigit { offset: usize, byte: u8 },
}

/// Identifier validation failures.
///
/// Frame and clock failures have their own types ([`FrameError`],
/// [`ClockError`](crate::ClockError)) so callers can match on them directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid animal ID: {0}")]
    InvalidAnimalId(String),
}

pub type Result<T> = std::result::Result<T, Error>;
