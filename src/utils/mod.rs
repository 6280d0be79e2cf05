// Mon Feb 16 2026 - Alex

pub mod cbytes;
pub mod logging;

pub use cbytes::{NativeBuffer, ScratchBuffer};
pub use logging::LoggingUtils;
