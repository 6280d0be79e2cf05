// Mon Feb 16 2026 - Alex

//! Bridge between a managed API and a YARA-style native scanning engine.
//!
//! Native code only ever sees opaque tokens issued by [`handle`]; scan
//! callbacks, block iterators and streams are resolved back to borrowed
//! Rust objects through them for the duration of one call.
//!
//! The engine behind the bridge is internal; only its status codes are
//! public, through [`codes`].
//!
//! ```
//! assert_eq!(yara_bridge::codes::ERROR_SCAN_TIMEOUT, 26);
//! ```
//!
//! ```compile_fail
//! use yara_bridge::native::scanner::yr_rules_scan_mem;
//! ```

pub mod callback;
pub mod compiler;
pub mod config;
pub mod error;
pub mod handle;
pub mod memblocks;
pub(crate) mod native;
pub mod rules;
pub mod scanner;
pub mod stream;
pub mod utils;

pub use callback::{
    CallbackResult, Capabilities, ImportResult, MatchRules, ScanCallback, ScanCallbackConsoleLog, ScanCallbackFinished,
    ScanCallbackMatch, ScanCallbackModuleImport, ScanCallbackModuleImportFinished, ScanCallbackNoMatch,
    ScanCallbackTooManyMatches, ScanContext,
};
pub use compiler::{compile, must_compile, Compiler, Variable};
pub use config::Config;
pub use error::{codes, CallbackError, CompileErrors, CompilerMessage, EngineError, Error, Result};
pub use memblocks::{BlockList, MemoryBlock, MemoryBlockIterator, MemoryBlockIteratorWithFilesize};
pub use rules::{MatchRule, MatchString, Meta, MetaValue, Object, ObjectType, Rule, RuleString, Rules};
pub use scanner::{ScanFlags, Scanner};
