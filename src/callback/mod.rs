// Mon Feb 16 2026 - Alex

//! Scan callback protocol: the managed capability traits, the per-scan
//! container and the trampoline the engine calls.

pub mod collect;
pub mod container;
pub mod context;
pub mod dispatch;
pub mod traits;

pub use collect::MatchRules;
pub use container::ScanCallbackContainer;
pub use context::ScanContext;
pub use traits::{
    CallbackResult, Capabilities, ImportResult, ScanCallback, ScanCallbackConsoleLog, ScanCallbackFinished,
    ScanCallbackMatch, ScanCallbackModuleImport, ScanCallbackModuleImportFinished, ScanCallbackNoMatch,
    ScanCallbackTooManyMatches,
};
