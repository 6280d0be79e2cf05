// Mon Feb 16 2026 - Alex

use crate::callback::ScanContext;
use crate::error::CallbackError;
use crate::rules::{Object, Rule};
use bitflags::bitflags;

/// `Ok(true)` aborts the scan, `Ok(false)` continues it.
pub type CallbackResult = Result<bool, CallbackError>;

/// Module data to hand to the engine plus the abort decision.
pub type ImportResult = Result<(Option<Vec<u8>>, bool), CallbackError>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const RULE_MATCHING = 1 << 0;
        const RULE_NOT_MATCHING = 1 << 1;
        const SCAN_FINISHED = 1 << 2;
        const IMPORT_MODULE = 1 << 3;
        const MODULE_IMPORTED = 1 << 4;
        const CONSOLE_LOG = 1 << 5;
        const TOO_MANY_MATCHES = 1 << 6;
    }
}

/// Receives scan events. Each `as_*` accessor exposes one optional
/// capability; messages for a missing capability are acknowledged with
/// "continue".
pub trait ScanCallback {
    fn as_rule_matching(&mut self) -> Option<&mut dyn ScanCallbackMatch> {
        None
    }

    fn as_rule_not_matching(&mut self) -> Option<&mut dyn ScanCallbackNoMatch> {
        None
    }

    fn as_scan_finished(&mut self) -> Option<&mut dyn ScanCallbackFinished> {
        None
    }

    fn as_import_module(&mut self) -> Option<&mut dyn ScanCallbackModuleImport> {
        None
    }

    fn as_module_imported(&mut self) -> Option<&mut dyn ScanCallbackModuleImportFinished> {
        None
    }

    fn as_console_log(&mut self) -> Option<&mut dyn ScanCallbackConsoleLog> {
        None
    }

    fn as_too_many_matches(&mut self) -> Option<&mut dyn ScanCallbackTooManyMatches> {
        None
    }

    fn capabilities(&mut self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::RULE_MATCHING, self.as_rule_matching().is_some());
        caps.set(Capabilities::RULE_NOT_MATCHING, self.as_rule_not_matching().is_some());
        caps.set(Capabilities::SCAN_FINISHED, self.as_scan_finished().is_some());
        caps.set(Capabilities::IMPORT_MODULE, self.as_import_module().is_some());
        caps.set(Capabilities::MODULE_IMPORTED, self.as_module_imported().is_some());
        caps.set(Capabilities::CONSOLE_LOG, self.as_console_log().is_some());
        caps.set(Capabilities::TOO_MANY_MATCHES, self.as_too_many_matches().is_some());
        caps
    }
}

pub trait ScanCallbackMatch {
    fn rule_matching(&mut self, ctx: &ScanContext<'_>, rule: &Rule<'_>) -> CallbackResult;
}

/// Implementing this also asks the engine to report non-matching rules.
pub trait ScanCallbackNoMatch {
    fn rule_not_matching(&mut self, ctx: &ScanContext<'_>, rule: &Rule<'_>) -> CallbackResult;
}

pub trait ScanCallbackFinished {
    fn scan_finished(&mut self, ctx: &ScanContext<'_>) -> CallbackResult;
}

pub trait ScanCallbackModuleImport {
    /// Returns data for the module `name`. Non-empty data is copied into
    /// native memory that stays valid until the scan ends.
    fn import_module(&mut self, ctx: &ScanContext<'_>, name: &str) -> ImportResult;
}

pub trait ScanCallbackModuleImportFinished {
    fn module_imported(&mut self, ctx: &ScanContext<'_>, object: &Object<'_>) -> CallbackResult;
}

pub trait ScanCallbackConsoleLog {
    fn console_log(&mut self, ctx: &ScanContext<'_>, message: &str);
}

pub trait ScanCallbackTooManyMatches {
    fn too_many_matches(&mut self, ctx: &ScanContext<'_>, rule: &Rule<'_>, string: &str) -> CallbackResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;
    impl ScanCallback for Nothing {}

    struct Logger(Vec<String>);
    impl ScanCallback for Logger {
        fn as_console_log(&mut self) -> Option<&mut dyn ScanCallbackConsoleLog> {
            Some(self)
        }
        fn as_rule_not_matching(&mut self) -> Option<&mut dyn ScanCallbackNoMatch> {
            Some(self)
        }
    }
    impl ScanCallbackConsoleLog for Logger {
        fn console_log(&mut self, _ctx: &ScanContext<'_>, message: &str) {
            self.0.push(message.to_string());
        }
    }
    impl ScanCallbackNoMatch for Logger {
        fn rule_not_matching(&mut self, _ctx: &ScanContext<'_>, _rule: &Rule<'_>) -> CallbackResult {
            Ok(false)
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(Nothing.capabilities().is_empty());
        assert_eq!(
            Logger(Vec::new()).capabilities(),
            Capabilities::CONSOLE_LOG | Capabilities::RULE_NOT_MATCHING
        );
    }
}
