// Mon Feb 16 2026 - Alex

use crate::callback::dispatch::scan_callback;
use crate::callback::traits::ScanCallback;
use crate::error::{EngineError, Result};
use crate::handle::{callback_data, EntryKind, HandleGuard};
use crate::native::abi::{YrCallbackFunc, SCAN_FLAGS_REPORT_RULES_MATCHING, SCAN_FLAGS_REPORT_RULES_NOT_MATCHING};
use crate::rules::Rules;
use crate::scanner::ScanFlags;
use crate::utils::cbytes::NativeBuffer;
use libc::{c_int, c_void};
use log::debug;

/// State owned by one scan invocation: the callback, a clone of the
/// ruleset being scanned and any module data handed to the engine.
pub struct ScanCallbackContainer<'a> {
    pub(crate) callback: &'a mut dyn ScanCallback,
    pub(crate) rules: Rules,
    pub(crate) buffers: Vec<NativeBuffer>,
}

impl<'a> ScanCallbackContainer<'a> {
    pub fn new(callback: &'a mut dyn ScanCallback, rules: Rules) -> Self {
        Self {
            callback,
            rules,
            buffers: Vec::new(),
        }
    }

    /// Engine flags for `flags` plus the report bits the callback asks for.
    pub fn native_flags(&mut self, flags: ScanFlags) -> c_int {
        let mut bits = flags.bits() as c_int;
        if self.callback.as_rule_matching().is_some() {
            bits |= SCAN_FLAGS_REPORT_RULES_MATCHING;
        }
        if self.callback.as_rule_not_matching().is_some() {
            bits |= SCAN_FLAGS_REPORT_RULES_NOT_MATCHING;
        }
        bits
    }

    pub fn module_buffers(&self) -> usize {
        self.buffers.len()
    }
}

impl Drop for ScanCallbackContainer<'_> {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            debug!("releasing {} module data buffers", self.buffers.len());
        }
    }
}

/// Registers `callback` for the duration of `scan`, which receives the
/// engine flags, the trampoline and the user-data token.
pub(crate) fn run_scan<F>(rules: &Rules, callback: &mut dyn ScanCallback, flags: ScanFlags, scan: F) -> Result<()>
where
    F: FnOnce(c_int, YrCallbackFunc, *mut c_void) -> c_int,
{
    let mut container = ScanCallbackContainer::new(callback, rules.clone());
    let native_flags = container.native_flags(flags);
    let status = {
        let guard = HandleGuard::register(callback_data(), EntryKind::ScanCallback, &mut container);
        scan(native_flags, scan_callback, guard.token())
    };
    debug!("scan returned status {}", status);
    EngineError::check(status)
}
