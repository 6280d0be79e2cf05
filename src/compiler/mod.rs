// Mon Feb 16 2026 - Alex

pub mod variable;

pub use variable::Variable;

use crate::error::{CompileErrors, CompilerMessage, EngineError, Error, Result};
use crate::handle::{self, callback_data, EntryKind, HandleGuard};
use crate::native::abi::YARA_ERROR_LEVEL_WARNING;
use crate::native::compiler::{self as native, YrCompiler};
use crate::native::rules::YrRule;
use crate::rules::Rules;
use crate::utils::cbytes::NativeBuffer;
use indexmap::IndexMap;
use libc::{c_char, c_int, c_void};
use log::{debug, warn};
use std::ffi::{CStr, CString};
use std::path::Path;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};

/// Resolves `include` directives: `(name, including file, namespace)` to
/// rule source, or `None` when the include cannot be found.
pub type IncludeCallback = Box<dyn FnMut(&str, Option<&str>, &str) -> Option<Vec<u8>>>;

#[derive(Default)]
struct CompilerState {
    errors: Vec<CompilerMessage>,
    warnings: Vec<CompilerMessage>,
    include: Option<IncludeCallback>,
}

enum Includes {
    Filesystem,
    Disabled,
    Callback,
}

/// Compiles rule sources into [`Rules`].
pub struct Compiler {
    raw: NonNull<YrCompiler>,
    state: CompilerState,
    includes: Includes,
}

/// `None` for an empty namespace, which the engine maps to its default.
fn namespace_arg(namespace: &str) -> Result<Option<CString>> {
    if namespace.is_empty() {
        return Ok(None);
    }
    CString::new(namespace)
        .map(Some)
        .map_err(|_| Error::InvalidArgument("namespace contains NUL".to_string()))
}

unsafe fn opt_str<'a>(p: *const c_char) -> Option<std::borrow::Cow<'a, str>> {
    if p.is_null() {
        None
    } else {
        Some(CStr::from_ptr(p).to_string_lossy())
    }
}

unsafe extern "C" fn compiler_callback(
    level: c_int,
    file_name: *const c_char,
    line: c_int,
    rule: *const YrRule,
    message: *const c_char,
    user_data: *mut c_void,
) {
    let entry = handle::lookup(user_data, EntryKind::Compiler);
    let state = &mut *(entry.as_ptr() as *mut CompilerState);
    let msg = CompilerMessage {
        filename: opt_str(file_name).map(|s| s.into_owned()),
        line,
        rule: if rule.is_null() { None } else { Some((*rule).identifier_str().to_string()) },
        text: opt_str(message).map(|s| s.into_owned()).unwrap_or_default(),
    };
    if level == YARA_ERROR_LEVEL_WARNING {
        debug!("compiler warning: {}", msg);
        state.warnings.push(msg);
    } else {
        debug!("compiler error: {}", msg);
        state.errors.push(msg);
    }
}

unsafe extern "C" fn include_callback(
    include_name: *const c_char,
    calling_file: *const c_char,
    namespace: *const c_char,
    user_data: *mut c_void,
) -> *const c_char {
    let entry = handle::lookup(user_data, EntryKind::Compiler);
    let state = &mut *(entry.as_ptr() as *mut CompilerState);
    let callback = match state.include.as_mut() {
        Some(callback) => callback,
        None => return ptr::null(),
    };

    let name = opt_str(include_name).unwrap_or_default();
    let file = opt_str(calling_file);
    let namespace = opt_str(namespace).unwrap_or_default();
    let source = panic::catch_unwind(AssertUnwindSafe(|| callback(&name, file.as_deref(), &namespace)));
    match source {
        Ok(Some(source)) => NativeBuffer::copy_from(&source).map_or(ptr::null(), NativeBuffer::into_c_string),
        Ok(None) => ptr::null(),
        Err(_) => {
            warn!("include callback panicked for {}", name);
            ptr::null()
        }
    }
}

unsafe extern "C" fn include_free(source: *const c_char, _user_data: *mut c_void) {
    if !source.is_null() {
        NativeBuffer::free_raw(source);
    }
}

impl Compiler {
    pub fn new() -> Result<Self> {
        let mut raw = ptr::null_mut();
        EngineError::check(unsafe { native::yr_compiler_create(&mut raw) })?;
        let raw = NonNull::new(raw).ok_or_else(|| Error::InvalidArgument("null compiler".to_string()))?;
        Ok(Self {
            raw,
            state: CompilerState::default(),
            includes: Includes::Filesystem,
        })
    }

    /// Installs a resolver for `include` directives.
    pub fn set_include_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&str, Option<&str>, &str) -> Option<Vec<u8>> + 'static,
    {
        self.state.include = Some(Box::new(callback));
        self.includes = Includes::Callback;
    }

    /// Makes every `include` directive a compile error.
    pub fn disable_includes(&mut self) {
        self.state.include = None;
        self.includes = Includes::Disabled;
    }

    pub fn errors(&self) -> &[CompilerMessage] {
        &self.state.errors
    }

    pub fn warnings(&self) -> &[CompilerMessage] {
        &self.state.warnings
    }

    /// Registers the compiler state and wires the engine's callbacks to it
    /// for the duration of `f`.
    fn with_callbacks(&mut self, f: impl FnOnce(*mut YrCompiler) -> c_int) -> Result<()> {
        let raw = self.raw.as_ptr();
        let errors_before = self.state.errors.len();
        let failed = {
            let guard = HandleGuard::register(callback_data(), EntryKind::Compiler, &mut self.state);
            let token = guard.token();
            unsafe {
                native::yr_compiler_set_callback(raw, Some(compiler_callback), token);
                match self.includes {
                    Includes::Filesystem => {}
                    Includes::Disabled => native::yr_compiler_set_include_callback(raw, None, None, ptr::null_mut()),
                    Includes::Callback => {
                        native::yr_compiler_set_include_callback(raw, Some(include_callback), Some(include_free), token)
                    }
                }
            }
            f(raw)
        };
        if failed > 0 {
            let errors = self.state.errors[errors_before.min(self.state.errors.len())..].to_vec();
            return Err(Error::Compile(CompileErrors(errors)));
        }
        Ok(())
    }

    pub fn add_string(&mut self, rules: &str, namespace: &str) -> Result<()> {
        let source = CString::new(rules).map_err(|_| Error::InvalidArgument("rules contain NUL".to_string()))?;
        let namespace = namespace_arg(namespace)?;
        let ns = namespace.as_ref().map_or(ptr::null(), |n| n.as_ptr());
        self.with_callbacks(|raw| unsafe { native::yr_compiler_add_string(raw, source.as_ptr(), ns) })
    }

    /// Compiles the file at `path`; diagnostics and relative includes use
    /// its name.
    pub fn add_file(&mut self, path: &Path, namespace: &str) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let file = std::fs::File::open(path)?;
            let file_name = CString::new(path.to_string_lossy().into_owned())
                .map_err(|_| Error::InvalidArgument("path contains NUL".to_string()))?;
            let namespace = namespace_arg(namespace)?;
            let ns = namespace.as_ref().map_or(ptr::null(), |n| n.as_ptr());
            self.with_callbacks(|raw| unsafe { native::yr_compiler_add_fd(raw, file.as_raw_fd(), ns, file_name.as_ptr()) })
        }
        #[cfg(not(unix))]
        {
            let source = std::fs::read_to_string(path)?;
            self.add_string(&source, namespace)
        }
    }

    pub fn define_variable(&mut self, identifier: &str, value: impl Into<Variable>) -> Result<()> {
        let name = CString::new(identifier).map_err(|_| Error::InvalidArgument("identifier contains NUL".to_string()))?;
        let raw = self.raw.as_ptr();
        let status = unsafe {
            match value.into() {
                Variable::Boolean(b) => native::yr_compiler_define_boolean_variable(raw, name.as_ptr(), b as c_int),
                Variable::Integer(i) => native::yr_compiler_define_integer_variable(raw, name.as_ptr(), i),
                Variable::Float(f) => native::yr_compiler_define_float_variable(raw, name.as_ptr(), f),
                Variable::String(s) => {
                    let value =
                        CString::new(s).map_err(|_| Error::InvalidArgument("value contains NUL".to_string()))?;
                    native::yr_compiler_define_string_variable(raw, name.as_ptr(), value.as_ptr())
                }
            }
        };
        EngineError::check(status)
    }

    pub fn get_rules(&mut self) -> Result<Rules> {
        if !self.state.errors.is_empty() {
            return Err(Error::Compile(CompileErrors(self.state.errors.clone())));
        }
        let mut raw = ptr::null_mut();
        EngineError::check(unsafe { native::yr_compiler_get_rules(self.raw.as_ptr(), &mut raw) })?;
        Rules::from_raw(raw)
    }
}

impl Drop for Compiler {
    fn drop(&mut self) {
        unsafe { native::yr_compiler_destroy(self.raw.as_ptr()) };
    }
}

/// Compiles `source` with the given external variables.
pub fn compile(source: &str, variables: &IndexMap<String, Variable>) -> Result<Rules> {
    let mut compiler = Compiler::new()?;
    for (name, value) in variables {
        compiler.define_variable(name, value.clone())?;
    }
    compiler.add_string(source, "")?;
    compiler.get_rules()
}

/// Like [`compile`] but panics on failure.
pub fn must_compile(source: &str, variables: &IndexMap<String, Variable>) -> Rules {
    match compile(source, variables) {
        Ok(rules) => rules,
        Err(e) => panic!("rules failed to compile: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_list_rules() {
        let rules = must_compile(
            r#"
            import "tests"
            private rule helper { condition: true }
            global rule gate : first second { meta: author = "alex" score = 10 ok = true condition: helper }
            "#,
            &IndexMap::new(),
        );
        let listed = rules.rules();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].is_private());
        assert!(listed[1].is_global());
        assert_eq!(listed[1].namespace(), "default");
        assert_eq!(listed[1].tags(), vec!["first", "second"]);
        assert_eq!(listed[1].metas()[0].value, crate::rules::MetaValue::String("alex".to_string()));
        assert_eq!(rules.get_imports(), vec!["tests"]);
    }

    #[test]
    fn test_errors_are_collected() {
        let mut compiler = Compiler::new().unwrap();
        let err = compiler.add_string("rule a { strings: $a = \"abc\" condition: true }", "").unwrap_err();
        match err {
            Error::Compile(CompileErrors(messages)) => {
                assert_eq!(messages.len(), 1);
                assert!(messages[0].text.contains("unreferenced string"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(compiler.errors().len(), 1);
        assert!(compiler.get_rules().is_err());
    }

    #[test]
    fn test_warnings_are_collected() {
        let mut compiler = Compiler::new().unwrap();
        compiler.add_string("rule a { strings: $a = \"x\" condition: $a }", "").unwrap();
        assert_eq!(compiler.warnings().len(), 1);
        assert!(compiler.warnings()[0].text.contains("may slow down scanning"));
        assert!(compiler.get_rules().is_ok());
    }

    #[test]
    fn test_include_callback() {
        let mut compiler = Compiler::new().unwrap();
        compiler.set_include_callback(|name, _file, namespace| {
            assert_eq!(namespace, "ns");
            (name == "base.yar").then(|| b"rule base { condition: true }".to_vec())
        });
        compiler.add_string("include \"base.yar\" rule top { condition: base }", "ns").unwrap();
        let rules = compiler.get_rules().unwrap();
        assert_eq!(rules.rules().iter().map(|r| r.identifier()).collect::<Vec<_>>(), vec!["base", "top"]);
    }

    #[test]
    fn test_missing_include_fails() {
        let mut compiler = Compiler::new().unwrap();
        compiler.set_include_callback(|_, _, _| None);
        assert!(compiler.add_string("include \"missing.yar\"", "").is_err());
    }

    #[test]
    fn test_disabled_includes() {
        let mut compiler = Compiler::new().unwrap();
        compiler.disable_includes();
        assert!(compiler.add_string("include \"other.yar\"", "").is_err());
    }

    #[test]
    fn test_add_file_reports_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yar");
        std::fs::write(&path, "rule ok { condition: true }\nrule bad { condition: nope }\n").unwrap();
        let mut compiler = Compiler::new().unwrap();
        assert!(compiler.add_file(&path, "").is_err());
        let error = &compiler.errors()[0];
        assert_eq!(error.line, 2);
        assert!(error.filename.as_deref().unwrap().ends_with("bad.yar"));
    }

    #[test]
    fn test_define_variable_twice() {
        let mut compiler = Compiler::new().unwrap();
        compiler.define_variable("x", 1i64).unwrap();
        let err = compiler.define_variable("x", true).unwrap_err();
        assert!(err.engine_code().is_some());
    }

    #[test]
    #[should_panic(expected = "rules failed to compile")]
    fn test_must_compile_panics() {
        must_compile("rule {", &IndexMap::new());
    }
}
