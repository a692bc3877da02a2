//! Tokio codec that turns a raw UART byte stream into reader frames.
//!
//! The WL-134 module pushes frames without length prefix; the UART driver may
//! deliver them split across reads, glued together, or preceded by line
//! noise after power-up. [`Wl134Codec`] owns that buffering so the frame
//! decoder only ever sees complete 30-byte candidates:
//!
//! ```text
//! UART bytes -> discard until STX -> wait for 30 bytes -> check ETX -> parse_frame
//!                                                         |
//!                                                         +-- bad ETX: drop STX, resync
//! ```
//!
//! Rejected frames are yielded as `Err(FrameError)` items rather than
//! decoder errors, because a `Framed` stream stops after the first error and
//! the reader must keep going.
//!
//! # Usage with FramedRead
//!
//! ```rust,no_run
//! use feedgate_rfid::Wl134Codec;
//! use futures::StreamExt;
//! use tokio_util::codec::FramedRead;
//!
//! # async fn example(port: impl tokio::io::AsyncRead + Unpin) {
//! let mut frames = FramedRead::new(port, Wl134Codec::new());
//! while let Some(Ok(item)) = frames.next().await {
//!     match item {
//!         Ok(tag) => println!("tag {tag}"),
//!         Err(e) => eprintln!("dropped frame: {e}"),
//!     }
//! }
//! # }
//! ```

use bytes::{Buf, BytesMut};
use feedgate_core::{
    FrameError, TagId,
    constants::{END_BYTE, END_BYTE_OFFSET, FRAME_LEN, START_BYTE},
};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::frame::parse_frame;

/// Frame assembler for WL-134 readers.
#[derive(Debug, Default)]
pub struct Wl134Codec {
    /// Bytes dropped while searching for a start marker.
    discarded: u64,
}

impl Wl134Codec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of noise bytes discarded so far.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    fn discard(&mut self, src: &mut BytesMut, count: usize) {
        if count > 0 {
            trace!(count, "discarding bytes before STX");
            src.advance(count);
            self.discarded += count as u64;
        }
    }
}

impl Decoder for Wl134Codec {
    type Item = Result<TagId, FrameError>;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|&b| b == START_BYTE) {
            Some(pos) => self.discard(src, pos),
            None => {
                let len = src.len();
                self.discard(src, len);
                return Ok(None);
            }
        }

        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }

        if src[END_BYTE_OFFSET] != END_BYTE {
            // Not a frame boundary: skip this STX and rescan from the next byte.
            let found = src[END_BYTE_OFFSET];
            self.discard(src, 1);
            return Ok(Some(Err(FrameError::BadFooter { found })));
        }

        let frame = src.split_to(FRAME_LEN);
        Ok(Some(parse_frame(&frame)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(item) => Ok(Some(item)),
            None => {
                if !buf.is_empty() {
                    debug!(remaining = buf.len(), "dropping partial frame at end of stream");
                    buf.clear();
                }
                Ok(None)
            }
        }
    }
}
