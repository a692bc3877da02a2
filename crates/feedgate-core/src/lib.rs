pub mod clock;
pub mod constants;
pub mod error;
pub mod types;

pub use clock::{Clock, ClockError, ManualClock, SystemClock};
pub use error::{Error, FrameError, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
