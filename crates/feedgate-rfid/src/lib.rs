//! WL-134 FDX-B reader support.
//!
//! - [`frame`]: pure decoding of a 30-byte reader frame into a [`TagId`](feedgate_core::TagId)
//! - [`codec`]: [`Wl134Codec`], a `tokio_util` decoder that assembles frames
//!   from an arbitrary UART byte stream

pub mod codec;
pub mod frame;

pub use codec::Wl134Codec;
pub use frame::{decode, encode_frame, parse_frame};
