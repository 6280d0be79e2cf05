// Mon Feb 16 2026 - Alex

use crate::callback::container::run_scan;
use crate::callback::{MatchRules, ScanCallback};
use crate::compiler::Variable;
use crate::config::Config;
use crate::error::{EngineError, Error, Result};
use crate::memblocks::{with_block_iterator, MemoryBlockIterator};
use crate::native::abi::{SCAN_FLAGS_FAST_MODE, SCAN_FLAGS_PROCESS_MEMORY};
use crate::native::scanner::{self as native, YrScanner};
use crate::rules::{timeout_seconds, MatchRule, Rules};
use crate::utils::logging::scoped_timer;
use bitflags::bitflags;
use libc::{c_int, c_void};
use std::ffi::CString;
use std::path::Path;
use std::ptr::{self, NonNull};
use std::time::Duration;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScanFlags: u32 {
        /// Stop searching a string after its first hit.
        const FAST_MODE = SCAN_FLAGS_FAST_MODE as u32;
        /// The target is process memory; `filesize` is undefined.
        const PROCESS_MEMORY = SCAN_FLAGS_PROCESS_MEMORY as u32;
    }
}

/// Scans with per-scanner external variables, flags and timeout. A scanner
/// borrows its callback, if any, for `'cb`.
pub struct Scanner<'cb> {
    raw: NonNull<YrScanner>,
    rules: Rules,
    flags: ScanFlags,
    timeout: Duration,
    callback: Option<&'cb mut dyn ScanCallback>,
}

impl<'cb> Scanner<'cb> {
    pub fn new(rules: &Rules) -> Result<Self> {
        let mut raw = ptr::null_mut();
        EngineError::check(unsafe { native::yr_scanner_create(rules.as_ptr(), &mut raw) })?;
        let raw = NonNull::new(raw).ok_or_else(|| Error::InvalidArgument("null scanner".to_string()))?;
        let config = Config::global();
        Ok(Self {
            raw,
            rules: rules.clone(),
            flags: config.scan_flags(),
            timeout: config.default_timeout(),
            callback: None,
        })
    }

    pub fn set_flags(&mut self, flags: ScanFlags) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Whole seconds; zero means no timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Routes scan events to `callback` instead of collecting matches.
    pub fn set_callback(&mut self, callback: &'cb mut dyn ScanCallback) -> &mut Self {
        self.callback = Some(callback);
        self
    }

    pub fn define_variable(&mut self, identifier: &str, value: impl Into<Variable>) -> Result<&mut Self> {
        let name = CString::new(identifier).map_err(|_| Error::InvalidArgument("identifier contains NUL".to_string()))?;
        let raw = self.raw.as_ptr();
        let status = unsafe {
            match value.into() {
                Variable::Boolean(b) => native::yr_scanner_define_boolean_variable(raw, name.as_ptr(), b as c_int),
                Variable::Integer(i) => native::yr_scanner_define_integer_variable(raw, name.as_ptr(), i),
                Variable::Float(f) => native::yr_scanner_define_float_variable(raw, name.as_ptr(), f),
                Variable::String(s) => {
                    let value =
                        CString::new(s).map_err(|_| Error::InvalidArgument("value contains NUL".to_string()))?;
                    native::yr_scanner_define_string_variable(raw, name.as_ptr(), value.as_ptr())
                }
            }
        };
        EngineError::check(status)?;
        Ok(self)
    }

    /// Runs `scan` with the scanner's callback, or with a [`MatchRules`]
    /// collector whose results are returned when none is set.
    fn scan(&mut self, scan: impl FnOnce(*mut YrScanner) -> c_int) -> Result<Vec<MatchRule>> {
        let raw = self.raw.as_ptr();
        let timeout = timeout_seconds(self.timeout);
        let run = |callback: &mut dyn ScanCallback| {
            run_scan(&self.rules, callback, self.flags, |flags, func, token: *mut c_void| unsafe {
                native::yr_scanner_set_callback(raw, Some(func), token);
                native::yr_scanner_set_flags(raw, flags);
                native::yr_scanner_set_timeout(raw, timeout);
                let status = scan(raw);
                native::yr_scanner_set_callback(raw, None, ptr::null_mut());
                status
            })
        };

        match self.callback.as_deref_mut() {
            Some(callback) => run(callback).map(|()| Vec::new()),
            None => {
                let mut collected = MatchRules::new();
                run(&mut collected)?;
                Ok(collected.into_inner())
            }
        }
    }

    pub fn scan_mem(&mut self, buf: &[u8]) -> Result<Vec<MatchRule>> {
        let _timer = scoped_timer("scanner.scan_mem");
        self.scan(|raw| unsafe { native::yr_scanner_scan_mem(raw, buf.as_ptr(), buf.len()) })
    }

    pub fn scan_file(&mut self, path: &Path) -> Result<Vec<MatchRule>> {
        let _timer = scoped_timer("scanner.scan_file");
        let filename = CString::new(path.to_string_lossy().into_owned())
            .map_err(|_| Error::InvalidArgument("path contains NUL".to_string()))?;
        self.scan(|raw| unsafe { native::yr_scanner_scan_file(raw, filename.as_ptr()) })
    }

    #[cfg(unix)]
    pub fn scan_fd(&mut self, fd: std::os::unix::io::RawFd) -> Result<Vec<MatchRule>> {
        let _timer = scoped_timer("scanner.scan_fd");
        self.scan(|raw| unsafe { native::yr_scanner_scan_fd(raw, fd) })
    }

    pub fn scan_proc(&mut self, pid: i32) -> Result<Vec<MatchRule>> {
        let _timer = scoped_timer("scanner.scan_proc");
        self.scan(|raw| unsafe { native::yr_scanner_scan_proc(raw, pid) })
    }

    pub fn scan_mem_blocks(&mut self, iterator: &mut dyn MemoryBlockIterator) -> Result<Vec<MatchRule>> {
        let _timer = scoped_timer("scanner.scan_mem_blocks");
        with_block_iterator(iterator, |native_iter| {
            self.scan(|raw| unsafe { native::yr_scanner_scan_mem_blocks(raw, native_iter) })
        })
    }
}

impl Drop for Scanner<'_> {
    fn drop(&mut self) {
        unsafe { native::yr_scanner_destroy(self.raw.as_ptr()) };
    }
}
