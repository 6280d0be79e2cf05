// Mon Feb 16 2026 - Alex

use crate::native::error::{error_message, ERROR_CALLBACK_ERROR, ERROR_SUCCESS};
use libc::c_int;
use std::fmt;
use thiserror::Error;

/// Status codes carried by [`EngineError`], numbered as in libyara.
pub mod codes {
    pub use crate::native::error::*;
}

/// A non-zero status returned by the native engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{}", self.message())]
pub struct EngineError(pub c_int);

impl EngineError {
    pub fn code(&self) -> c_int {
        self.0
    }

    pub fn message(&self) -> String {
        match error_message(self.0) {
            Some(msg) => msg.to_string(),
            None => format!("unknown error {}", self.0),
        }
    }

    /// True when a scan callback reported an error.
    pub fn is_callback_error(&self) -> bool {
        self.0 == ERROR_CALLBACK_ERROR
    }

    pub(crate) fn check(status: c_int) -> Result<()> {
        if status == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(Error::Engine(EngineError(status)))
        }
    }
}

/// Error or warning reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerMessage {
    pub filename: Option<String>,
    pub line: i32,
    pub rule: Option<String>,
    pub text: String,
}

impl fmt::Display for CompilerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filename {
            Some(name) => write!(f, "{}({}): {}", name, self.line, self.text),
            None => write!(f, "line {}: {}", self.line, self.text),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", describe(.0))]
pub struct CompileErrors(pub Vec<CompilerMessage>);

fn describe(messages: &[CompilerMessage]) -> String {
    match messages {
        [] => "compilation failed".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

/// Error returned by a scan callback handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("callback error: {0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileErrors),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn engine_code(&self) -> Option<c_int> {
        match self {
            Error::Engine(e) => Some(e.code()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::error::ERROR_SCAN_TIMEOUT;

    #[test]
    fn test_engine_error_message() {
        let err = EngineError(ERROR_CALLBACK_ERROR);
        assert!(err.is_callback_error());
        assert_eq!(err.to_string(), "callback error");
        assert!(!EngineError(ERROR_SCAN_TIMEOUT).is_callback_error());
        assert_eq!(EngineError(9999).to_string(), "unknown error 9999");
    }

    #[test]
    fn test_check() {
        assert!(EngineError::check(ERROR_SUCCESS).is_ok());
        let err = EngineError::check(ERROR_SCAN_TIMEOUT).unwrap_err();
        assert_eq!(err.engine_code(), Some(ERROR_SCAN_TIMEOUT));
    }

    #[test]
    fn test_compile_errors_display() {
        let msg = CompilerMessage { filename: None, line: 3, rule: None, text: "syntax error".to_string() };
        let errors = CompileErrors(vec![msg.clone(), msg]);
        assert_eq!(errors.to_string(), "line 3: syntax error (and 1 more)");
    }
}
