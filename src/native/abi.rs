// Mon Feb 16 2026 - Alex

//! C-compatible surface of the native engine. Message numbers, flag bits,
//! callback signatures and the `#[repr(C)]` layouts of `YrMemoryBlock`,
//! `YrMemoryBlockIterator`, `YrStream` and `YrModuleImport` follow libyara
//! 4.x. Rules, strings, matches and the scan context are plain Rust types
//! that the bridge reads directly.

use crate::native::rules::{YrMatch, YrRule, YrRules, YrString};
use crate::native::scanner::YrScanner;
use libc::{c_char, c_int, c_void};

pub type YrScanContext = YrScanner;

pub const CALLBACK_MSG_RULE_MATCHING: c_int = 1;
pub const CALLBACK_MSG_RULE_NOT_MATCHING: c_int = 2;
pub const CALLBACK_MSG_SCAN_FINISHED: c_int = 3;
pub const CALLBACK_MSG_IMPORT_MODULE: c_int = 4;
pub const CALLBACK_MSG_MODULE_IMPORTED: c_int = 5;
pub const CALLBACK_MSG_TOO_MANY_MATCHES: c_int = 6;
pub const CALLBACK_MSG_CONSOLE_LOG: c_int = 7;

pub const CALLBACK_CONTINUE: c_int = 0;
pub const CALLBACK_ABORT: c_int = 1;
pub const CALLBACK_ERROR: c_int = 2;

pub const SCAN_FLAGS_FAST_MODE: c_int = 1;
pub const SCAN_FLAGS_PROCESS_MEMORY: c_int = 2;
pub const SCAN_FLAGS_NO_TRYCATCH: c_int = 4;
pub const SCAN_FLAGS_REPORT_RULES_MATCHING: c_int = 8;
pub const SCAN_FLAGS_REPORT_RULES_NOT_MATCHING: c_int = 16;

pub const META_TYPE_INTEGER: c_int = 1;
pub const META_TYPE_STRING: c_int = 2;
pub const META_TYPE_BOOLEAN: c_int = 3;

pub const OBJECT_TYPE_INTEGER: c_int = 1;
pub const OBJECT_TYPE_STRING: c_int = 2;
pub const OBJECT_TYPE_STRUCTURE: c_int = 3;
pub const OBJECT_TYPE_FUNCTION: c_int = 5;

pub const RULE_FLAGS_PRIVATE: u32 = 0x01;
pub const RULE_FLAGS_GLOBAL: u32 = 0x02;

pub const YARA_ERROR_LEVEL_ERROR: c_int = 0;
pub const YARA_ERROR_LEVEL_WARNING: c_int = 1;

pub const YR_UNDEFINED: i64 = 0xFFFABADAFABADAFFu64 as i64;
pub const YR_MAX_STRING_MATCHES: usize = 1_000_000;
pub const YR_MAX_MATCH_DATA: usize = 512;
pub const YR_MAX_INCLUDE_DEPTH: usize = 16;

pub type YrCallbackFunc = unsafe extern "C" fn(
    context: *mut YrScanContext,
    message: c_int,
    message_data: *mut c_void,
    user_data: *mut c_void,
) -> c_int;

pub type YrCompilerCallbackFunc = unsafe extern "C" fn(
    error_level: c_int,
    file_name: *const c_char,
    line_number: c_int,
    rule: *const YrRule,
    message: *const c_char,
    user_data: *mut c_void,
);

pub type YrCompilerIncludeCallbackFunc = unsafe extern "C" fn(
    include_name: *const c_char,
    calling_rule_filename: *const c_char,
    calling_rule_namespace: *const c_char,
    user_data: *mut c_void,
) -> *const c_char;

pub type YrCompilerIncludeFreeFunc =
    unsafe extern "C" fn(callback_result_ptr: *const c_char, user_data: *mut c_void);

pub type YrMemoryBlockFetchDataFunc = unsafe extern "C" fn(block: *mut YrMemoryBlock) -> *const u8;

pub type YrMemoryBlockIteratorFunc =
    unsafe extern "C" fn(iterator: *mut YrMemoryBlockIterator) -> *mut YrMemoryBlock;

pub type YrMemoryBlockIteratorSizeFunc =
    unsafe extern "C" fn(iterator: *mut YrMemoryBlockIterator) -> u64;

pub type YrStreamReadFunc =
    unsafe extern "C" fn(ptr: *mut c_void, size: usize, count: usize, user_data: *mut c_void) -> usize;

pub type YrStreamWriteFunc =
    unsafe extern "C" fn(ptr: *const c_void, size: usize, count: usize, user_data: *mut c_void) -> usize;

#[repr(C)]
#[derive(Debug)]
pub struct YrMemoryBlock {
    pub size: usize,
    pub base: u64,
    pub context: *mut c_void,
    pub fetch_data: Option<YrMemoryBlockFetchDataFunc>,
}

impl Default for YrMemoryBlock {
    fn default() -> Self {
        Self {
            size: 0,
            base: 0,
            context: std::ptr::null_mut(),
            fetch_data: None,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct YrMemoryBlockIterator {
    pub context: *mut c_void,
    pub first: Option<YrMemoryBlockIteratorFunc>,
    pub next: Option<YrMemoryBlockIteratorFunc>,
    pub file_size: Option<YrMemoryBlockIteratorSizeFunc>,
    pub last_error: c_int,
}

#[repr(C)]
#[derive(Debug)]
pub struct YrStream {
    pub user_data: *mut c_void,
    pub read: Option<YrStreamReadFunc>,
    pub write: Option<YrStreamWriteFunc>,
}

#[repr(C)]
#[derive(Debug)]
pub struct YrModuleImport {
    pub module_name: *const c_char,
    pub module_data: *mut c_void,
    pub module_data_size: usize,
}

/// Returns a pointer to the rule at `rule_idx`, the way libyara code reaches
/// `rules->rules_table[idx]`.
pub unsafe fn find_rule(rules: *const YrRules, rule_idx: u32) -> *const YrRule {
    let rules = &*rules;
    match rules.rules.get(rule_idx as usize) {
        Some(rule) => rule as *const YrRule,
        None => std::ptr::null(),
    }
}

/// Owning rule index of a string, the `YR_STRING.rule_idx` field.
pub unsafe fn string_rule_idx(string: *const YrString) -> u32 {
    (*string).rule_idx
}

/// Matches recorded for `string` in the scan behind `context`. Only valid
/// while that scan is delivering callbacks.
pub unsafe fn string_matches<'a>(context: *const YrScanContext, string: *const YrString) -> &'a [YrMatch] {
    let scanner = &*context;
    scanner.matches.get((*string).idx as usize).map_or(&[], |m| m.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_memory_block_layout() {
        // size_t size; uint64_t base; void* context; fetch_data
        assert_eq!(size_of::<YrMemoryBlock>(), 32);
        assert_eq!(align_of::<YrMemoryBlock>(), 8);
        assert_eq!(size_of::<YrMemoryBlockIterator>(), 40);
        assert_eq!(size_of::<YrStream>(), 24);
        assert_eq!(size_of::<YrModuleImport>(), 24);
    }

    #[test]
    fn test_option_fn_is_pointer_sized() {
        assert_eq!(size_of::<Option<YrMemoryBlockFetchDataFunc>>(), size_of::<usize>());
        assert_eq!(size_of::<Option<YrStreamReadFunc>>(), size_of::<usize>());
    }

    #[test]
    fn test_message_numbering() {
        assert_eq!(CALLBACK_MSG_RULE_MATCHING, 1);
        assert_eq!(CALLBACK_MSG_CONSOLE_LOG, 7);
        assert_eq!(SCAN_FLAGS_REPORT_RULES_NOT_MATCHING, 16);
    }
}
