// Mon Feb 16 2026 - Alex

use crate::native::abi::*;
use crate::native::condition::{evaluate, EvalContext, Value};
use crate::native::error::*;
use crate::native::iterators::BlockSource;
use crate::native::modules::{LoadedModule, YrObject};
use crate::native::rules::{ExternalValue, YrMatch, YrRule, YrRules, YrString};
use crate::native::strings::RawMatch;
use ahash::AHashSet;
use libc::{c_char, c_double, c_int, c_void};
use log::{debug, trace};
use rayon::prelude::*;
use std::ffi::{CStr, CString};
use std::fs::File;
use std::ptr;
use std::time::{Duration, Instant};

enum Stop {
    Abort,
    Status(c_int),
}

type Flow = Result<(), Stop>;

/// Per-scan engine state. Also serves as the scan context handed to every
/// callback.
pub struct YrScanner {
    rules: *const YrRules,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
    flags: c_int,
    timeout: u64,
    externals: Vec<ExternalValue>,
    pub(crate) matches: Vec<Vec<YrMatch>>,
    modules: Vec<LoadedModule>,
    deadline: Option<Instant>,
}

struct Evaluation<'a> {
    matches: &'a [Vec<YrMatch>],
    results: &'a [bool],
    file_size: Option<u64>,
    externals: &'a [ExternalValue],
    modules: &'a [LoadedModule],
    logs: &'a mut Vec<String>,
}

impl EvalContext for Evaluation<'_> {
    fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    fn matches(&self, string_idx: u32) -> &[YrMatch] {
        self.matches.get(string_idx as usize).map_or(&[], |m| m.as_slice())
    }

    fn rule_result(&self, rule_idx: u32) -> bool {
        self.results.get(rule_idx as usize).copied().unwrap_or(false)
    }

    fn external(&self, idx: u32) -> Value {
        self.externals.get(idx as usize).map_or(Value::Undefined, Value::from)
    }

    fn field(&self, path: &[String]) -> Value {
        match self.modules.iter().find(|m| Some(&m.name) == path.first()) {
            Some(module) => module.field(&path[1..]),
            None => Value::Undefined,
        }
    }

    fn call(&mut self, path: &[String], args: Vec<Value>) -> Value {
        match self.modules.iter().find(|m| Some(&m.name) == path.first()) {
            Some(module) => module.call(&path[1..], args, self.logs),
            None => Value::Undefined,
        }
    }
}

impl YrScanner {
    fn new(rules: *const YrRules) -> Self {
        let externals = unsafe { &*rules }.externals.iter().map(|e| e.value.clone()).collect();
        Self {
            rules,
            callback: None,
            user_data: ptr::null_mut(),
            flags: 0,
            timeout: 0,
            externals,
            matches: Vec::new(),
            modules: Vec::new(),
            deadline: None,
        }
    }

    fn define(&mut self, identifier: *const c_char, value: ExternalValue) -> c_int {
        if identifier.is_null() {
            return ERROR_INVALID_ARGUMENT;
        }
        let name = unsafe { CStr::from_ptr(identifier) }.to_string_lossy();
        let rules = unsafe { &*self.rules };
        match rules.external_index(&name) {
            Some(idx) if rules.externals[idx].value.same_kind(&value) => {
                self.externals[idx] = value;
                ERROR_SUCCESS
            }
            Some(_) => ERROR_INVALID_EXTERNAL_VARIABLE_TYPE,
            None => ERROR_INVALID_ARGUMENT,
        }
    }

    fn notify(&mut self, message: c_int, data: *mut c_void) -> Flow {
        let callback = match self.callback {
            Some(callback) => callback,
            None => return Ok(()),
        };
        trace!("scan message {}", message);
        let context = self as *mut YrScanner;
        match unsafe { callback(context, message, data, self.user_data) } {
            CALLBACK_CONTINUE => Ok(()),
            CALLBACK_ABORT => Err(Stop::Abort),
            _ => Err(Stop::Status(ERROR_CALLBACK_ERROR)),
        }
    }

    fn check_timeout(&self) -> Flow {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Stop::Status(ERROR_SCAN_TIMEOUT)),
            _ => Ok(()),
        }
    }

    pub(crate) fn scan_blocks(&mut self, iterator: *mut YrMemoryBlockIterator) -> c_int {
        if self.callback.is_none() {
            return ERROR_CALLBACK_REQUIRED;
        }
        if iterator.is_null() {
            return ERROR_INVALID_ARGUMENT;
        }

        let mut flags = self.flags;
        if flags & (SCAN_FLAGS_REPORT_RULES_MATCHING | SCAN_FLAGS_REPORT_RULES_NOT_MATCHING) == 0 {
            flags |= SCAN_FLAGS_REPORT_RULES_MATCHING;
        }

        let rules = unsafe { &*self.rules };
        self.matches = vec![Vec::new(); rules.strings.len()];
        self.modules.clear();
        self.deadline = (self.timeout > 0).then(|| Instant::now() + Duration::from_secs(self.timeout));

        debug!("scan started: {} rules, {} strings, flags {:#x}", rules.rules.len(), rules.strings.len(), flags);
        let status = match self.run(rules, iterator, flags) {
            Ok(()) => ERROR_SUCCESS,
            Err(Stop::Abort) => ERROR_SUCCESS,
            Err(Stop::Status(code)) => code,
        };
        self.modules.clear();
        debug!("scan finished with status {}", status);
        status
    }

    fn run(&mut self, rules: &YrRules, iterator: *mut YrMemoryBlockIterator, flags: c_int) -> Flow {
        self.import_modules(rules)?;

        let file_size = unsafe {
            match (*iterator).file_size {
                Some(size_fn) if flags & SCAN_FLAGS_PROCESS_MEMORY == 0 => Some(size_fn(iterator)),
                _ => None,
            }
        };

        let mut too_many = vec![false; rules.strings.len()];
        unsafe {
            let mut block = match (*iterator).first {
                Some(first) => first(iterator),
                None => ptr::null_mut(),
            };
            while !block.is_null() {
                self.check_timeout()?;
                let (base, size, fetch) = ((*block).base, (*block).size, (*block).fetch_data);
                let data = match fetch {
                    Some(fetch) => fetch(block),
                    None => ptr::null(),
                };
                if data.is_null() {
                    if (*iterator).last_error != ERROR_SUCCESS {
                        return Err(Stop::Status((*iterator).last_error));
                    }
                    trace!("block at {:#x} has no data", base);
                } else {
                    let bytes = std::slice::from_raw_parts(data, size);
                    self.search_block(rules, bytes, base, flags, &mut too_many)?;
                }
                block = match (*iterator).next {
                    Some(next) => next(iterator),
                    None => ptr::null_mut(),
                };
            }
            if (*iterator).last_error != ERROR_SUCCESS {
                return Err(Stop::Status((*iterator).last_error));
            }
        }

        let results = self.evaluate_rules(rules, file_size)?;

        for (rule, matched) in rules.rules.iter().zip(results.iter()) {
            if rule.is_private() {
                continue;
            }
            let message = match matched {
                true if flags & SCAN_FLAGS_REPORT_RULES_MATCHING != 0 => CALLBACK_MSG_RULE_MATCHING,
                false if flags & SCAN_FLAGS_REPORT_RULES_NOT_MATCHING != 0 => CALLBACK_MSG_RULE_NOT_MATCHING,
                _ => continue,
            };
            self.notify(message, rule as *const YrRule as *mut c_void)?;
        }

        self.notify(CALLBACK_MSG_SCAN_FINISHED, ptr::null_mut())
    }

    fn import_modules(&mut self, rules: &YrRules) -> Flow {
        for name in &rules.imports {
            let mut import = YrModuleImport {
                module_name: name.as_ptr(),
                module_data: ptr::null_mut(),
                module_data_size: 0,
            };
            self.notify(CALLBACK_MSG_IMPORT_MODULE, &mut import as *mut YrModuleImport as *mut c_void)?;

            let module = LoadedModule::load(
                &name.to_string_lossy(),
                import.module_data as *const u8,
                import.module_data_size,
            )
            .ok_or(Stop::Status(ERROR_UNKNOWN_MODULE))?;

            self.notify(CALLBACK_MSG_MODULE_IMPORTED, &module.object as *const YrObject as *mut c_void)?;
            self.modules.push(module);
        }
        Ok(())
    }

    fn search_block(&mut self, rules: &YrRules, data: &[u8], base: u64, flags: c_int, too_many: &mut [bool]) -> Flow {
        let fast = flags & SCAN_FLAGS_FAST_MODE != 0;
        let limits: Vec<usize> = self
            .matches
            .iter()
            .zip(too_many.iter())
            .map(|(found, &exhausted)| match (exhausted, fast, found.is_empty()) {
                (true, _, _) => 0,
                (false, true, false) => 0,
                (false, true, true) => 1,
                (false, false, _) => YR_MAX_STRING_MATCHES + 1 - found.len().min(YR_MAX_STRING_MATCHES),
            })
            .collect();

        let hits: Vec<Vec<RawMatch>> = rules
            .strings
            .par_iter()
            .zip(limits.par_iter())
            .map(|(string, &limit)| {
                if limit == 0 {
                    Vec::new()
                } else {
                    string.pattern.find_matches(data, &string.modifiers, limit)
                }
            })
            .collect();

        for (idx, found) in hits.into_iter().enumerate() {
            for hit in found {
                if self.matches[idx].len() >= YR_MAX_STRING_MATCHES {
                    too_many[idx] = true;
                    let string = &rules.strings[idx] as *const YrString as *mut c_void;
                    self.notify(CALLBACK_MSG_TOO_MANY_MATCHES, string)?;
                    break;
                }
                let end = (hit.offset + hit.length.min(YR_MAX_MATCH_DATA)).min(data.len());
                self.matches[idx].push(YrMatch {
                    base: base as i64,
                    offset: hit.offset as i64,
                    match_length: hit.length,
                    data: data[hit.offset..end].to_vec(),
                    xor_key: hit.xor_key,
                });
            }
        }

        self.check_timeout()
    }

    fn evaluate_rules(&mut self, rules: &YrRules, file_size: Option<u64>) -> Result<Vec<bool>, Stop> {
        let mut results = vec![false; rules.rules.len()];
        let mut logs = Vec::new();

        for (idx, rule) in rules.rules.iter().enumerate() {
            self.check_timeout()?;
            let matched = {
                let mut ctx = Evaluation {
                    matches: &self.matches,
                    results: &results,
                    file_size,
                    externals: &self.externals,
                    modules: &self.modules,
                    logs: &mut logs,
                };
                evaluate(&rule.condition, &mut ctx).is_true()
            };
            results[idx] = matched;

            for line in logs.drain(..) {
                let line = CString::new(line.replace('\0', " ")).unwrap_or_default();
                self.notify(CALLBACK_MSG_CONSOLE_LOG, line.as_ptr() as *mut c_void)?;
            }
        }

        let failed: AHashSet<u32> = rules
            .rules
            .iter()
            .zip(results.iter())
            .filter(|(rule, &matched)| rule.is_global() && !matched)
            .map(|(rule, _)| rule.ns_idx)
            .collect();
        for (rule, matched) in rules.rules.iter().zip(results.iter_mut()) {
            if failed.contains(&rule.ns_idx) {
                *matched = false;
            }
        }

        Ok(results)
    }

    fn scan_source(&mut self, mut source: Box<BlockSource>) -> c_int {
        self.scan_blocks(&mut source.iterator)
    }
}

pub unsafe extern "C" fn yr_scanner_create(rules: *mut YrRules, scanner: *mut *mut YrScanner) -> c_int {
    if rules.is_null() || scanner.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    *scanner = Box::into_raw(Box::new(YrScanner::new(rules)));
    ERROR_SUCCESS
}

pub unsafe extern "C" fn yr_scanner_destroy(scanner: *mut YrScanner) {
    if !scanner.is_null() {
        drop(Box::from_raw(scanner));
    }
}

pub unsafe extern "C" fn yr_scanner_set_callback(
    scanner: *mut YrScanner,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
) {
    (*scanner).callback = callback;
    (*scanner).user_data = user_data;
}

pub unsafe extern "C" fn yr_scanner_set_flags(scanner: *mut YrScanner, flags: c_int) {
    (*scanner).flags = flags;
}

/// Timeout in whole seconds; zero disables it.
pub unsafe extern "C" fn yr_scanner_set_timeout(scanner: *mut YrScanner, timeout: c_int) {
    (*scanner).timeout = timeout.max(0) as u64;
}

pub unsafe extern "C" fn yr_scanner_define_integer_variable(
    scanner: *mut YrScanner,
    identifier: *const c_char,
    value: i64,
) -> c_int {
    (*scanner).define(identifier, ExternalValue::Integer(value))
}

pub unsafe extern "C" fn yr_scanner_define_boolean_variable(
    scanner: *mut YrScanner,
    identifier: *const c_char,
    value: c_int,
) -> c_int {
    (*scanner).define(identifier, ExternalValue::Boolean(value != 0))
}

pub unsafe extern "C" fn yr_scanner_define_float_variable(
    scanner: *mut YrScanner,
    identifier: *const c_char,
    value: c_double,
) -> c_int {
    (*scanner).define(identifier, ExternalValue::Float(value))
}

pub unsafe extern "C" fn yr_scanner_define_string_variable(
    scanner: *mut YrScanner,
    identifier: *const c_char,
    value: *const c_char,
) -> c_int {
    if value.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    (*scanner).define(identifier, ExternalValue::String(CStr::from_ptr(value).to_owned()))
}

pub unsafe extern "C" fn yr_scanner_scan_mem_blocks(scanner: *mut YrScanner, iterator: *mut YrMemoryBlockIterator) -> c_int {
    (*scanner).scan_blocks(iterator)
}

pub unsafe extern "C" fn yr_scanner_scan_mem(scanner: *mut YrScanner, buffer: *const u8, buffer_size: usize) -> c_int {
    (*scanner).scan_source(BlockSource::memory(buffer, buffer_size))
}

pub unsafe extern "C" fn yr_scanner_scan_file(scanner: *mut YrScanner, filename: *const c_char) -> c_int {
    if filename.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    let path = CStr::from_ptr(filename).to_string_lossy().into_owned();
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(_) => return ERROR_COULD_NOT_OPEN_FILE,
    };
    match BlockSource::file(&file) {
        Ok(source) => (*scanner).scan_source(source),
        Err(code) => code,
    }
}

#[cfg(unix)]
pub unsafe extern "C" fn yr_scanner_scan_fd(scanner: *mut YrScanner, fd: c_int) -> c_int {
    use std::mem::ManuallyDrop;
    use std::os::unix::io::FromRawFd;

    // The descriptor stays owned by the caller.
    let file = ManuallyDrop::new(File::from_raw_fd(fd));
    match BlockSource::file(&file) {
        Ok(source) => (*scanner).scan_source(source),
        Err(code) => code,
    }
}

pub unsafe extern "C" fn yr_scanner_scan_proc(scanner: *mut YrScanner, pid: c_int) -> c_int {
    let source = match BlockSource::process(pid) {
        Ok(source) => source,
        Err(code) => return code,
    };
    let scanner = &mut *scanner;
    let flags = scanner.flags;
    scanner.flags |= SCAN_FLAGS_PROCESS_MEMORY;
    let status = scanner.scan_source(source);
    scanner.flags = flags;
    status
}

unsafe fn with_scanner(
    rules: *mut YrRules,
    flags: c_int,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
    timeout: c_int,
    scan: impl FnOnce(*mut YrScanner) -> c_int,
) -> c_int {
    let mut scanner = ptr::null_mut();
    let status = yr_scanner_create(rules, &mut scanner);
    if status != ERROR_SUCCESS {
        return status;
    }
    yr_scanner_set_callback(scanner, callback, user_data);
    yr_scanner_set_flags(scanner, flags);
    yr_scanner_set_timeout(scanner, timeout);
    let status = scan(scanner);
    yr_scanner_destroy(scanner);
    status
}

pub unsafe extern "C" fn yr_rules_scan_mem(
    rules: *mut YrRules,
    buffer: *const u8,
    buffer_size: usize,
    flags: c_int,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
    timeout: c_int,
) -> c_int {
    with_scanner(rules, flags, callback, user_data, timeout, |s| yr_scanner_scan_mem(s, buffer, buffer_size))
}

pub unsafe extern "C" fn yr_rules_scan_mem_blocks(
    rules: *mut YrRules,
    iterator: *mut YrMemoryBlockIterator,
    flags: c_int,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
    timeout: c_int,
) -> c_int {
    with_scanner(rules, flags, callback, user_data, timeout, |s| yr_scanner_scan_mem_blocks(s, iterator))
}

pub unsafe extern "C" fn yr_rules_scan_file(
    rules: *mut YrRules,
    filename: *const c_char,
    flags: c_int,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
    timeout: c_int,
) -> c_int {
    with_scanner(rules, flags, callback, user_data, timeout, |s| yr_scanner_scan_file(s, filename))
}

#[cfg(unix)]
pub unsafe extern "C" fn yr_rules_scan_fd(
    rules: *mut YrRules,
    fd: c_int,
    flags: c_int,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
    timeout: c_int,
) -> c_int {
    with_scanner(rules, flags, callback, user_data, timeout, |s| yr_scanner_scan_fd(s, fd))
}

pub unsafe extern "C" fn yr_rules_scan_proc(
    rules: *mut YrRules,
    pid: c_int,
    flags: c_int,
    callback: Option<YrCallbackFunc>,
    user_data: *mut c_void,
    timeout: c_int,
) -> c_int {
    with_scanner(rules, flags, callback, user_data, timeout, |s| yr_scanner_scan_proc(s, pid))
}
