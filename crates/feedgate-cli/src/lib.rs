//! Feeder station runtime: configuration and the tag reader loop.

pub mod config;
pub mod reader;

pub use config::FeederConfig;
pub use reader::{Dispenser, FrameOutcome, LogDispenser, ReaderLoop, ReaderStats};
