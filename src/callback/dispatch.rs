// Mon Feb 16 2026 - Alex

use crate::callback::container::ScanCallbackContainer;
use crate::callback::traits::CallbackResult;
use crate::callback::ScanContext;
use crate::error::CallbackError;
use crate::handle::{self, EntryKind};
use crate::native::abi::*;
use crate::native::modules::YrObject;
use crate::native::rules::{YrRule, YrString};
use crate::rules::{Object, Rule};
use crate::utils::cbytes::NativeBuffer;
use libc::{c_char, c_int, c_void};
use log::{trace, warn};
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};

/// Engine-facing trampoline. `user_data` is a token for a registered
/// [`ScanCallbackContainer`]; an unknown token is fatal.
pub(crate) unsafe extern "C" fn scan_callback(
    context: *mut YrScanContext,
    message: c_int,
    message_data: *mut c_void,
    user_data: *mut c_void,
) -> c_int {
    let entry = handle::lookup(user_data, EntryKind::ScanCallback);
    let container = &mut *(entry.as_ptr() as *mut ScanCallbackContainer);
    let ctx = ScanContext::new(context);

    trace!("dispatching scan message {}", message);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(container, &ctx, message, message_data)));
    match outcome {
        Ok(Ok(true)) => CALLBACK_ABORT,
        Ok(Ok(false)) => CALLBACK_CONTINUE,
        Ok(Err(err)) => {
            warn!("scan callback failed on message {}: {}", message, err);
            CALLBACK_ERROR
        }
        Err(_) => {
            warn!("scan callback panicked on message {}", message);
            CALLBACK_ERROR
        }
    }
}

unsafe fn dispatch(
    container: &mut ScanCallbackContainer<'_>,
    ctx: &ScanContext<'_>,
    message: c_int,
    data: *mut c_void,
) -> CallbackResult {
    let ScanCallbackContainer { callback, rules, buffers } = container;
    let rules = rules.raw();

    match message {
        CALLBACK_MSG_RULE_MATCHING => {
            let rule = Rule::new(rules, &*(data as *const YrRule));
            callback.as_rule_matching().map_or(Ok(false), |h| h.rule_matching(ctx, &rule))
        }
        CALLBACK_MSG_RULE_NOT_MATCHING => {
            let rule = Rule::new(rules, &*(data as *const YrRule));
            callback.as_rule_not_matching().map_or(Ok(false), |h| h.rule_not_matching(ctx, &rule))
        }
        CALLBACK_MSG_SCAN_FINISHED => callback.as_scan_finished().map_or(Ok(false), |h| h.scan_finished(ctx)),
        CALLBACK_MSG_IMPORT_MODULE => {
            let import = &mut *(data as *mut YrModuleImport);
            let name = CStr::from_ptr(import.module_name).to_string_lossy();
            let handler = match callback.as_import_module() {
                Some(handler) => handler,
                None => return Ok(false),
            };
            let (payload, abort) = handler.import_module(ctx, &name)?;
            if let Some(bytes) = payload.filter(|b| !b.is_empty()) {
                let buffer = NativeBuffer::copy_from(&bytes)
                    .ok_or_else(|| CallbackError::new(format!("could not allocate data for module {}", name)))?;
                import.module_data = buffer.as_ptr();
                import.module_data_size = buffer.len();
                buffers.push(buffer);
            }
            Ok(abort)
        }
        CALLBACK_MSG_MODULE_IMPORTED => {
            let object = Object::new(&*(data as *const YrObject));
            callback.as_module_imported().map_or(Ok(false), |h| h.module_imported(ctx, &object))
        }
        CALLBACK_MSG_TOO_MANY_MATCHES => {
            let string = data as *const YrString;
            let rule = find_rule(rules, string_rule_idx(string));
            if rule.is_null() {
                return Err(CallbackError::new("string has no owning rule"));
            }
            let rule = Rule::new(rules, &*rule);
            let identifier = (*string).identifier_str();
            callback
                .as_too_many_matches()
                .map_or(Ok(false), |h| h.too_many_matches(ctx, &rule, identifier))
        }
        CALLBACK_MSG_CONSOLE_LOG => {
            let text = CStr::from_ptr(data as *const c_char).to_string_lossy();
            if let Some(handler) = callback.as_console_log() {
                handler.console_log(ctx, &text);
            }
            Ok(false)
        }
        _ => Ok(false),
    }
}
