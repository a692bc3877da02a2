//! Reader loop: UART bytes in, rations out.
//!
//! A blocking thread owns the serial port and forwards whatever it reads as
//! [`Bytes`] chunks over a bounded channel. The async side assembles frames
//! with [`Wl134Codec`], asks the authorizer, dispenses, and books the ration.
//! Nothing that goes wrong with one frame stops the loop.

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use feedgate_core::{AnimalId, Clock, FrameError, TagId};
use feedgate_rfid::Wl134Codec;
use feedgate_storage::{Eligibility, FeedingAuthorizer, StorageError};
use serialport::{DataBits, Parity, StopBits};
use std::io::{self, Read};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, warn};

const READ_CHUNK: usize = 64;
const CHANNEL_CAPACITY: usize = 32;
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Feed actuator
pub trait Dispenser {
    fn dispense(&mut self, animal_id: AnimalId, quantity: f64) -> Result<()>;
}

/// Dispenser that only logs; used until an actuator driver is configured.
#[derive(Debug, Default)]
pub struct LogDispenser;

impl Dispenser for LogDispenser {
    fn dispense(&mut self, animal_id: AnimalId, quantity: f64) -> Result<()> {
        info!(animal_id = %animal_id, quantity, "Dispensing ration");
        Ok(())
    }
}

/// What happened to one frame
#[derive(Debug)]
pub enum FrameOutcome {
    Fed { tag: TagId, event_id: i64 },
    Denied { tag: TagId, reason: Eligibility },
    Rejected(FrameError),
    Failed { tag: TagId, error: anyhow::Error },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    pub fed: u64,
    pub denied: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl ReaderStats {
    fn count(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Fed { .. } => self.fed += 1,
            FrameOutcome::Denied { .. } => self.denied += 1,
            FrameOutcome::Rejected(_) => self.rejected += 1,
            FrameOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct ReaderLoop<'a, C: Clock, D: Dispenser> {
    authorizer: &'a FeedingAuthorizer<C>,
    dispenser: D,
    codec: Wl134Codec,
    buffer: BytesMut,
    stats: ReaderStats,
}

impl<'a, C: Clock, D: Dispenser> ReaderLoop<'a, C, D> {
    pub fn new(authorizer: &'a FeedingAuthorizer<C>, dispenser: D) -> Self {
        Self {
            authorizer,
            dispenser,
            codec: Wl134Codec::new(),
            buffer: BytesMut::with_capacity(256),
            stats: ReaderStats::default(),
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Process chunks until the channel closes
    pub async fn run(mut self, mut chunks: mpsc::Receiver<Bytes>) -> Result<ReaderStats> {
        while let Some(chunk) = chunks.recv().await {
            self.push(&chunk).await?;
        }

        while let Some(item) = self.codec.decode_eof(&mut self.buffer)? {
            self.handle(item).await;
        }

        info!(
            fed = self.stats.fed,
            denied = self.stats.denied,
            rejected = self.stats.rejected,
            failed = self.stats.failed,
            discarded_bytes = self.codec.discarded_bytes(),
            "Reader loop stopped"
        );
        Ok(self.stats)
    }

    /// Append raw bytes and handle every complete frame
    pub async fn push(&mut self, chunk: &[u8]) -> io::Result<Vec<FrameOutcome>> {
        self.buffer.extend_from_slice(chunk);

        let mut outcomes = Vec::new();
        while let Some(item) = self.codec.decode(&mut self.buffer)? {
            outcomes.push(self.handle(item).await);
        }
        Ok(outcomes)
    }

    async fn handle(&mut self, item: Result<TagId, FrameError>) -> FrameOutcome {
        let outcome = match item {
            Ok(tag) => self.serve(tag).await,
            Err(e) => {
                warn!(error = %e, "Malformed frame dropped");
                FrameOutcome::Rejected(e)
            }
        };
        self.stats.count(&outcome);
        outcome
    }

    async fn serve(&mut self, tag: TagId) -> FrameOutcome {
        let animal_id = tag.animal_id();
        debug!(tag = %tag, "Tag read");

        let eligibility = match self.authorizer.check_eligibility(animal_id).await {
            Ok(eligibility) => eligibility,
            Err(e) => return self.failure(tag, e),
        };

        if !eligibility.is_eligible() {
            info!(animal_id = %animal_id, reason = %eligibility, "Feeding denied");
            return FrameOutcome::Denied {
                tag,
                reason: eligibility,
            };
        }

        let ration = self.authorizer.policy().ration_size;
        if let Err(e) = self.dispenser.dispense(animal_id, ration) {
            error!(animal_id = %animal_id, error = %e, "Dispenser failed, nothing recorded");
            return FrameOutcome::Failed { tag, error: e };
        }

        match self.authorizer.record_ration(animal_id).await {
            Ok(event_id) => FrameOutcome::Fed { tag, event_id },
            Err(e) => self.failure(tag, e),
        }
    }

    fn failure(&self, tag: TagId, e: StorageError) -> FrameOutcome {
        if e.is_not_found() {
            warn!(tag = %tag, "Unregistered animal");
        } else {
            error!(tag = %tag, error = %e, "Feeding decision failed");
        }
        FrameOutcome::Failed {
            tag,
            error: e.into(),
        }
    }
}

/// Open the reader port (8N1) and start the blocking read thread
///
/// The thread stops when the receiver is dropped or the port fails.
pub fn spawn_serial_reader(
    port_name: &str,
    baud_rate: u32,
) -> Result<(mpsc::Receiver<Bytes>, JoinHandle<()>)> {
    let mut port = serialport::new(port_name, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(PORT_READ_TIMEOUT)
        .open()
        .with_context(|| format!("Failed to open serial port {port_name}"))?;

    info!(port = port_name, baud_rate, "Serial reader opened");

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let port_name = port_name.to_string();

    let handle = std::thread::Builder::new()
        .name("wl134-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match port.read(&mut buf) {
                    Ok(0) => continue,
                    Ok(n) => {
                        if tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                        if tx.is_closed() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        error!(port = %port_name, error = %e, "Serial read failed");
                        break;
                    }
                }
            }
            debug!(port = %port_name, "Serial reader thread exiting");
        })
        .context("Failed to spawn serial reader thread")?;

    Ok((rx, handle))
}
