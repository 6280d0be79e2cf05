// Mon Feb 16 2026 - Alex

use crate::native::abi::{
    YrCompilerCallbackFunc, YrCompilerIncludeCallbackFunc, YrCompilerIncludeFreeFunc, YARA_ERROR_LEVEL_ERROR,
    YARA_ERROR_LEVEL_WARNING,
};
use crate::native::error::*;
use crate::native::parser::{Fault, Parser};
use crate::native::rules::{ExternalValue, YrExternal, YrNamespace, YrRule, YrRules};
use libc::{c_char, c_double, c_int, c_void};
use log::{debug, trace};
use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr;

pub const DEFAULT_NAMESPACE: &str = "default";

enum IncludeMode {
    /// Resolve `include` against the filesystem.
    Filesystem,
    Disabled,
    Callback {
        func: YrCompilerIncludeCallbackFunc,
        free: Option<YrCompilerIncludeFreeFunc>,
        user_data: *mut c_void,
    },
}

pub struct YrCompiler {
    pub(crate) rules: YrRules,
    callback: Option<YrCompilerCallbackFunc>,
    callback_data: *mut c_void,
    include: IncludeMode,
    current_file: Option<CString>,
    errors: c_int,
    warnings: c_int,
    last_error: String,
}

impl YrCompiler {
    pub(crate) fn new() -> Self {
        Self {
            rules: YrRules::default(),
            callback: None,
            callback_data: ptr::null_mut(),
            include: IncludeMode::Filesystem,
            current_file: None,
            errors: 0,
            warnings: 0,
            last_error: String::new(),
        }
    }

    pub(crate) fn namespace_index(&mut self, name: &str) -> u32 {
        if let Some(idx) = self.rules.namespaces.iter().position(|ns| ns.name.as_bytes() == name.as_bytes()) {
            return idx as u32;
        }
        self.rules.namespaces.push(YrNamespace {
            name: CString::new(name).unwrap_or_default(),
        });
        (self.rules.namespaces.len() - 1) as u32
    }

    pub(crate) fn current_file(&self) -> Option<&CStr> {
        self.current_file.as_deref()
    }

    pub(crate) fn report(&mut self, level: c_int, line: usize, rule: Option<&YrRule>, message: &str) {
        if level == YARA_ERROR_LEVEL_WARNING {
            self.warnings += 1;
        } else {
            self.errors += 1;
            self.last_error = message.to_string();
        }

        let callback = match self.callback {
            Some(callback) => callback,
            None => return,
        };
        let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
        let file = self.current_file.as_ref().map_or(ptr::null(), |f| f.as_ptr());
        let rule = rule.map_or(ptr::null(), |r| r as *const YrRule);
        trace!("compiler message level={} line={}", level, line);
        unsafe { callback(level, file, line as c_int, rule, message.as_ptr(), self.callback_data) };
    }

    pub(crate) fn warning(&mut self, line: usize, message: &str) {
        self.report(YARA_ERROR_LEVEL_WARNING, line, None, message);
    }

    /// Fetches the source text for `include "name"`.
    pub(crate) fn include_source(&mut self, name: &str, namespace: &str) -> Result<(String, Option<CString>), String> {
        match &self.include {
            IncludeMode::Disabled => Err("includes are disabled".to_string()),
            IncludeMode::Filesystem => {
                let path = match self.current_file.as_ref().and_then(|f| f.to_str().ok()) {
                    Some(current) => Path::new(current).parent().map_or_else(|| PathBuf::from(name), |dir| dir.join(name)),
                    None => PathBuf::from(name),
                };
                let source = std::fs::read_to_string(&path).map_err(|e| format!("can't open include file: {} ({})", name, e))?;
                Ok((source, CString::new(path.to_string_lossy().into_owned()).ok()))
            }
            IncludeMode::Callback { func, free, user_data } => {
                let c_name = CString::new(name).map_err(|_| "invalid include name".to_string())?;
                let c_ns = CString::new(namespace).unwrap_or_default();
                let calling = self.current_file.as_ref().map_or(ptr::null(), |f| f.as_ptr());

                let result = unsafe { func(c_name.as_ptr(), calling, c_ns.as_ptr(), *user_data) };
                if result.is_null() {
                    return Err(format!("can't open include file: {}", name));
                }
                let source = unsafe { CStr::from_ptr(result) }.to_string_lossy().into_owned();
                if let Some(free) = free {
                    unsafe { free(result, *user_data) };
                }
                Ok((source, Some(c_name)))
            }
        }
    }

    pub(crate) fn swap_current_file(&mut self, file: Option<CString>) -> Option<CString> {
        std::mem::replace(&mut self.current_file, file)
    }

    fn add_source(&mut self, source: &str, namespace: Option<&str>) -> c_int {
        if self.errors > 0 {
            return self.errors;
        }

        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE).to_string();
        let snapshot = (
            self.rules.rules.len(),
            self.rules.strings.len(),
            self.rules.imports.len(),
            self.rules.namespaces.len(),
        );

        let ns_idx = self.namespace_index(&namespace);
        let result = Parser::new(source, self, ns_idx, 0).parse_source();

        if let Err(Fault { message, line, .. }) = result {
            self.rules.rules.truncate(snapshot.0);
            self.rules.strings.truncate(snapshot.1);
            self.rules.imports.truncate(snapshot.2);
            self.rules.namespaces.truncate(snapshot.3);
            self.report(YARA_ERROR_LEVEL_ERROR, line, None, &message);
        }

        debug!("compiler: {} rules after add, {} errors", self.rules.rules.len(), self.errors);
        self.errors
    }

    fn define(&mut self, identifier: *const c_char, value: ExternalValue) -> c_int {
        if identifier.is_null() {
            return ERROR_INVALID_ARGUMENT;
        }
        let identifier = unsafe { CStr::from_ptr(identifier) }.to_owned();
        if self.rules.external_index(&identifier.to_string_lossy()).is_some() {
            return ERROR_DUPLICATED_EXTERNAL_VARIABLE;
        }
        self.rules.externals.push(YrExternal { identifier, value });
        ERROR_SUCCESS
    }
}

unsafe fn opt_str<'a>(p: *const c_char) -> Option<&'a str> {
    if p.is_null() {
        None
    } else {
        CStr::from_ptr(p).to_str().ok()
    }
}

pub unsafe extern "C" fn yr_compiler_create(compiler: *mut *mut YrCompiler) -> c_int {
    if compiler.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    *compiler = Box::into_raw(Box::new(YrCompiler::new()));
    ERROR_SUCCESS
}

pub unsafe extern "C" fn yr_compiler_destroy(compiler: *mut YrCompiler) {
    if !compiler.is_null() {
        drop(Box::from_raw(compiler));
    }
}

pub unsafe extern "C" fn yr_compiler_set_callback(
    compiler: *mut YrCompiler,
    callback: Option<YrCompilerCallbackFunc>,
    user_data: *mut c_void,
) {
    let compiler = &mut *compiler;
    compiler.callback = callback;
    compiler.callback_data = user_data;
}

/// A `None` callback disables `include` statements altogether.
pub unsafe extern "C" fn yr_compiler_set_include_callback(
    compiler: *mut YrCompiler,
    callback: Option<YrCompilerIncludeCallbackFunc>,
    free: Option<YrCompilerIncludeFreeFunc>,
    user_data: *mut c_void,
) {
    let compiler = &mut *compiler;
    compiler.include = match callback {
        Some(func) => IncludeMode::Callback { func, free, user_data },
        None => IncludeMode::Disabled,
    };
}

pub unsafe extern "C" fn yr_compiler_add_string(
    compiler: *mut YrCompiler,
    rules_string: *const c_char,
    namespace: *const c_char,
) -> c_int {
    let compiler = &mut *compiler;
    if rules_string.is_null() {
        compiler.report(YARA_ERROR_LEVEL_ERROR, 0, None, "invalid argument");
        return compiler.errors;
    }
    let source = CStr::from_ptr(rules_string).to_string_lossy().into_owned();
    compiler.add_source(&source, opt_str(namespace))
}

/// Reads the whole of `fd` and compiles it. `file_name` is reported with
/// diagnostics and anchors relative includes.
pub unsafe extern "C" fn yr_compiler_add_fd(
    compiler: *mut YrCompiler,
    fd: c_int,
    namespace: *const c_char,
    file_name: *const c_char,
) -> c_int {
    let compiler = &mut *compiler;
    let mut source = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = libc::read(fd, chunk.as_mut_ptr() as *mut c_void, chunk.len());
        if n < 0 {
            if std::io::Error::last_os_error().kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            compiler.report(YARA_ERROR_LEVEL_ERROR, 0, None, "could not read file");
            return compiler.errors;
        }
        if n == 0 {
            break;
        }
        source.extend_from_slice(&chunk[..n as usize]);
    }

    let file = if file_name.is_null() { None } else { Some(CStr::from_ptr(file_name).to_owned()) };
    let previous = compiler.swap_current_file(file);
    let errors = compiler.add_source(&String::from_utf8_lossy(&source), opt_str(namespace));
    compiler.swap_current_file(previous);
    errors
}

pub unsafe extern "C" fn yr_compiler_define_integer_variable(
    compiler: *mut YrCompiler,
    identifier: *const c_char,
    value: i64,
) -> c_int {
    (*compiler).define(identifier, ExternalValue::Integer(value))
}

pub unsafe extern "C" fn yr_compiler_define_boolean_variable(
    compiler: *mut YrCompiler,
    identifier: *const c_char,
    value: c_int,
) -> c_int {
    (*compiler).define(identifier, ExternalValue::Boolean(value != 0))
}

pub unsafe extern "C" fn yr_compiler_define_float_variable(
    compiler: *mut YrCompiler,
    identifier: *const c_char,
    value: c_double,
) -> c_int {
    (*compiler).define(identifier, ExternalValue::Float(value))
}

pub unsafe extern "C" fn yr_compiler_define_string_variable(
    compiler: *mut YrCompiler,
    identifier: *const c_char,
    value: *const c_char,
) -> c_int {
    if value.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    (*compiler).define(identifier, ExternalValue::String(CStr::from_ptr(value).to_owned()))
}

pub unsafe extern "C" fn yr_compiler_get_rules(compiler: *mut YrCompiler, rules: *mut *mut YrRules) -> c_int {
    let compiler = &*compiler;
    if rules.is_null() || compiler.errors > 0 {
        return ERROR_INVALID_ARGUMENT;
    }
    *rules = Box::into_raw(Box::new(compiler.rules.clone()));
    ERROR_SUCCESS
}

pub unsafe extern "C" fn yr_compiler_get_error_message(
    compiler: *mut YrCompiler,
    buffer: *mut c_char,
    buffer_size: c_int,
) -> *mut c_char {
    if buffer.is_null() || buffer_size <= 0 {
        return buffer;
    }
    let message = (*compiler).last_error.as_bytes();
    let n = message.len().min(buffer_size as usize - 1);
    ptr::copy_nonoverlapping(message.as_ptr() as *const c_char, buffer, n);
    *buffer.add(n) = 0;
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static MESSAGES: RefCell<Vec<(c_int, c_int, String)>> = RefCell::new(Vec::new());
    }

    unsafe extern "C" fn record(
        level: c_int,
        _file: *const c_char,
        line: c_int,
        _rule: *const YrRule,
        message: *const c_char,
        _user_data: *mut c_void,
    ) {
        let message = CStr::from_ptr(message).to_string_lossy().into_owned();
        MESSAGES.with(|m| m.borrow_mut().push((level, line, message)));
    }

    unsafe fn compile(source: &str) -> (*mut YrCompiler, c_int) {
        let mut compiler = ptr::null_mut();
        assert_eq!(yr_compiler_create(&mut compiler), ERROR_SUCCESS);
        yr_compiler_set_callback(compiler, Some(record), ptr::null_mut());
        let source = CString::new(source).unwrap();
        let errors = yr_compiler_add_string(compiler, source.as_ptr(), ptr::null());
        (compiler, errors)
    }

    #[test]
    fn test_compile_and_get_rules() {
        unsafe {
            let (compiler, errors) = compile("rule a { condition: true } rule b { condition: a }");
            assert_eq!(errors, 0);
            let mut rules = ptr::null_mut();
            assert_eq!(yr_compiler_get_rules(compiler, &mut rules), ERROR_SUCCESS);
            assert_eq!((*rules).rules.len(), 2);
            drop(Box::from_raw(rules));
            yr_compiler_destroy(compiler);
        }
    }

    #[test]
    fn test_errors_go_through_callback() {
        MESSAGES.with(|m| m.borrow_mut().clear());
        unsafe {
            let (compiler, errors) = compile("rule a {\n strings: $a = \"abc\"\n condition: true }");
            assert_eq!(errors, 1);
            let mut rules = ptr::null_mut();
            assert_eq!(yr_compiler_get_rules(compiler, &mut rules), ERROR_INVALID_ARGUMENT);

            let mut buf = [0 as c_char; 64];
            yr_compiler_get_error_message(compiler, buf.as_mut_ptr(), 64);
            let message = CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned();
            assert!(message.contains("unreferenced string"));
            yr_compiler_destroy(compiler);
        }
        MESSAGES.with(|m| {
            let m = m.borrow();
            assert_eq!(m.len(), 1);
            assert_eq!(m[0].0, YARA_ERROR_LEVEL_ERROR);
        });
    }

    #[test]
    fn test_duplicate_external() {
        unsafe {
            let mut compiler = ptr::null_mut();
            yr_compiler_create(&mut compiler);
            let name = CString::new("x").unwrap();
            assert_eq!(yr_compiler_define_integer_variable(compiler, name.as_ptr(), 1), ERROR_SUCCESS);
            assert_eq!(
                yr_compiler_define_boolean_variable(compiler, name.as_ptr(), 1),
                ERROR_DUPLICATED_EXTERNAL_VARIABLE
            );
            yr_compiler_destroy(compiler);
        }
    }

    #[test]
    fn test_disabled_includes() {
        unsafe {
            let mut compiler = ptr::null_mut();
            yr_compiler_create(&mut compiler);
            yr_compiler_set_include_callback(compiler, None, None, ptr::null_mut());
            let source = CString::new("include \"other.yar\"").unwrap();
            assert_eq!(yr_compiler_add_string(compiler, source.as_ptr(), ptr::null()), 1);
            yr_compiler_destroy(compiler);
        }
    }
}
