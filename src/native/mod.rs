// Mon Feb 16 2026 - Alex

//! In-process scanning engine with libyara's function names and calling
//! convention. It is internal to the crate: the bridge layer calls its
//! `extern "C"` functions through Rust paths and never exports them.

pub mod abi;
pub mod error;
pub mod pattern;
pub mod hex;
pub mod strings;
pub mod rules;
pub mod condition;
pub mod modules;
pub mod lexer;
pub mod parser;
pub mod compiler;
pub mod iterators;
pub mod scanner;
pub mod ruleset;
