// Mon Feb 16 2026 - Alex

pub mod object;
pub mod rule;

pub use object::{Object, ObjectType};
pub use rule::{MatchRule, MatchString, Meta, MetaValue, Rule, RuleString};

use crate::callback::container::run_scan;
use crate::callback::ScanCallback;
use crate::config::Config;
use crate::error::{EngineError, Error, Result};
use crate::memblocks::{with_block_iterator, MemoryBlockIterator};
use crate::native::rules::YrRules;
use crate::native::{ruleset, scanner};
use crate::scanner::ScanFlags;
use crate::stream::{with_reader, with_writer};
use crate::utils::logging::scoped_timer;
use libc::c_int;
use log::debug;
use std::ffi::CString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::time::Duration;

struct RulesHandle(NonNull<YrRules>);

// The engine never mutates a ruleset once compiled.
unsafe impl Send for RulesHandle {}
unsafe impl Sync for RulesHandle {}

impl Drop for RulesHandle {
    fn drop(&mut self) {
        debug!("destroying compiled rules {:p}", self.0.as_ptr());
        unsafe { ruleset::yr_rules_destroy(self.0.as_ptr()) };
    }
}

/// A compiled ruleset. Clones share the same native rules, which are freed
/// when the last clone drops.
#[derive(Clone)]
pub struct Rules {
    inner: Arc<RulesHandle>,
}

pub(crate) fn timeout_seconds(timeout: Duration) -> c_int {
    timeout.as_secs().min(c_int::MAX as u64) as c_int
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.to_string_lossy().into_owned())
        .map_err(|_| Error::InvalidArgument(format!("path contains NUL: {}", path.display())))
}

impl Rules {
    /// Takes ownership of rules returned by the engine.
    pub(crate) fn from_raw(raw: *mut YrRules) -> Result<Self> {
        let raw = NonNull::new(raw).ok_or_else(|| Error::InvalidArgument("null rules".to_string()))?;
        Ok(Self {
            inner: Arc::new(RulesHandle(raw)),
        })
    }

    pub(crate) fn as_ptr(&self) -> *mut YrRules {
        self.inner.0.as_ptr()
    }

    pub(crate) fn raw(&self) -> &YrRules {
        unsafe { self.inner.0.as_ref() }
    }

    pub fn scan_mem(&self, buf: &[u8], flags: ScanFlags, timeout: Duration, callback: &mut dyn ScanCallback) -> Result<()> {
        let _timer = scoped_timer("rules.scan_mem");
        run_scan(self, callback, flags, |flags, func, token| unsafe {
            scanner::yr_rules_scan_mem(self.as_ptr(), buf.as_ptr(), buf.len(), flags, Some(func), token, timeout_seconds(timeout))
        })
    }

    pub fn scan_file(&self, path: &Path, flags: ScanFlags, timeout: Duration, callback: &mut dyn ScanCallback) -> Result<()> {
        let _timer = scoped_timer("rules.scan_file");
        let filename = path_to_cstring(path)?;
        run_scan(self, callback, flags, |flags, func, token| unsafe {
            scanner::yr_rules_scan_file(self.as_ptr(), filename.as_ptr(), flags, Some(func), token, timeout_seconds(timeout))
        })
    }

    #[cfg(unix)]
    pub fn scan_fd(&self, fd: std::os::unix::io::RawFd, flags: ScanFlags, timeout: Duration, callback: &mut dyn ScanCallback) -> Result<()> {
        let _timer = scoped_timer("rules.scan_fd");
        run_scan(self, callback, flags, |flags, func, token| unsafe {
            scanner::yr_rules_scan_fd(self.as_ptr(), fd, flags, Some(func), token, timeout_seconds(timeout))
        })
    }

    pub fn scan_proc(&self, pid: i32, flags: ScanFlags, timeout: Duration, callback: &mut dyn ScanCallback) -> Result<()> {
        let _timer = scoped_timer("rules.scan_proc");
        run_scan(self, callback, flags, |flags, func, token| unsafe {
            scanner::yr_rules_scan_proc(self.as_ptr(), pid, flags, Some(func), token, timeout_seconds(timeout))
        })
    }

    pub fn scan_mem_blocks(
        &self,
        iterator: &mut dyn MemoryBlockIterator,
        flags: ScanFlags,
        timeout: Duration,
        callback: &mut dyn ScanCallback,
    ) -> Result<()> {
        let _timer = scoped_timer("rules.scan_mem_blocks");
        with_block_iterator(iterator, |native| {
            run_scan(self, callback, flags, |flags, func, token| unsafe {
                scanner::yr_rules_scan_mem_blocks(self.as_ptr(), native, flags, Some(func), token, timeout_seconds(timeout))
            })
        })
    }

    /// Writes the rules to `path` through a buffered stream.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(Config::global().stream_buffer_size, file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(Config::global().stream_buffer_size, file);
        Self::read(&mut reader)
    }

    /// Saves through the engine's own file writer.
    pub fn save_native(&self, path: &Path) -> Result<()> {
        let filename = path_to_cstring(path)?;
        EngineError::check(unsafe { ruleset::yr_rules_save(self.as_ptr(), filename.as_ptr()) })
    }

    pub fn load_native(path: &Path) -> Result<Self> {
        let filename = path_to_cstring(path)?;
        let mut raw = ptr::null_mut();
        EngineError::check(unsafe { ruleset::yr_rules_load(filename.as_ptr(), &mut raw) })?;
        Self::from_raw(raw)
    }

    pub fn write(&self, writer: &mut dyn Write) -> Result<()> {
        let status = with_writer(writer, |stream| unsafe { ruleset::yr_rules_save_stream(self.as_ptr(), stream) });
        EngineError::check(status)
    }

    pub fn read(reader: &mut dyn Read) -> Result<Self> {
        let mut raw = ptr::null_mut();
        let status = with_reader(reader, |stream| unsafe { ruleset::yr_rules_load_stream(stream, &mut raw) });
        EngineError::check(status)?;
        Self::from_raw(raw)
    }

    pub fn rules(&self) -> Vec<Rule<'_>> {
        let raw = self.raw();
        raw.rules.iter().map(|rule| Rule::new(raw, rule)).collect()
    }

    pub fn get_imports(&self) -> Vec<String> {
        self.raw().imports.iter().map(|m| m.to_string_lossy().into_owned()).collect()
    }
}

impl std::fmt::Debug for Rules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rules").field("rules", &self.raw().rules.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::*;
    use crate::compiler::must_compile;
    use crate::error::CallbackError;
    use crate::memblocks::BlockList;
    use crate::utils::logging::init_from_env;
    use crate::native::error::{ERROR_CALLBACK_ERROR, ERROR_INVALID_FILE};
    use indexmap::IndexMap;
    use std::io::Cursor;

    fn rules(source: &str) -> Rules {
        init_from_env();
        must_compile(source, &IndexMap::new())
    }

    fn scan(rules: &Rules, data: &[u8]) -> Vec<MatchRule> {
        let mut collected = MatchRules::new();
        rules.scan_mem(data, ScanFlags::empty(), Duration::ZERO, &mut collected).unwrap();
        collected.into_inner()
    }

    #[derive(Default)]
    struct Recorder {
        matched: Vec<String>,
        finished: usize,
        imports: Vec<String>,
        module_data: Option<Vec<u8>>,
        logs: Vec<String>,
        too_many: Vec<(String, String)>,
        payload: Option<Vec<u8>>,
        abort_on_match: bool,
        fail_on_match: bool,
    }

    impl ScanCallback for Recorder {
        fn as_rule_matching(&mut self) -> Option<&mut dyn ScanCallbackMatch> {
            Some(self)
        }
        fn as_scan_finished(&mut self) -> Option<&mut dyn ScanCallbackFinished> {
            Some(self)
        }
        fn as_import_module(&mut self) -> Option<&mut dyn ScanCallbackModuleImport> {
            Some(self)
        }
        fn as_module_imported(&mut self) -> Option<&mut dyn ScanCallbackModuleImportFinished> {
            Some(self)
        }
        fn as_console_log(&mut self) -> Option<&mut dyn ScanCallbackConsoleLog> {
            Some(self)
        }
        fn as_too_many_matches(&mut self) -> Option<&mut dyn ScanCallbackTooManyMatches> {
            Some(self)
        }
    }

    impl ScanCallbackMatch for Recorder {
        fn rule_matching(&mut self, _ctx: &ScanContext<'_>, rule: &Rule<'_>) -> CallbackResult {
            if self.fail_on_match {
                panic!("callback blew up on {}", rule.identifier());
            }
            self.matched.push(rule.identifier().to_string());
            Ok(self.abort_on_match)
        }
    }

    impl ScanCallbackFinished for Recorder {
        fn scan_finished(&mut self, _ctx: &ScanContext<'_>) -> CallbackResult {
            self.finished += 1;
            Ok(false)
        }
    }

    impl ScanCallbackModuleImport for Recorder {
        fn import_module(&mut self, _ctx: &ScanContext<'_>, name: &str) -> ImportResult {
            self.imports.push(name.to_string());
            Ok((self.payload.clone(), false))
        }
    }

    impl ScanCallbackModuleImportFinished for Recorder {
        fn module_imported(&mut self, _ctx: &ScanContext<'_>, object: &Object<'_>) -> CallbackResult {
            self.module_data = object.lookup("module_data").and_then(|o| o.as_bytes()).map(<[u8]>::to_vec);
            Ok(false)
        }
    }

    impl ScanCallbackConsoleLog for Recorder {
        fn console_log(&mut self, _ctx: &ScanContext<'_>, message: &str) {
            self.logs.push(message.to_string());
        }
    }

    impl ScanCallbackTooManyMatches for Recorder {
        fn too_many_matches(&mut self, _ctx: &ScanContext<'_>, rule: &Rule<'_>, string: &str) -> CallbackResult {
            self.too_many.push((rule.identifier().to_string(), string.to_string()));
            Ok(false)
        }
    }

    #[test]
    fn test_empty_buffer_always_true() {
        let matches = scan(&rules("rule always_true { condition: true }"), b"");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule, "always_true");
        assert_eq!(matches[0].namespace, "default");
        assert!(matches[0].strings.is_empty());
    }

    #[test]
    fn test_fullword_offset() {
        let matches = scan(&rules(r#"rule w { strings: $a = "abc" fullword condition: $a }"#), b" abc ");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].strings[0].offset, 1);
        assert_eq!(matches[0].strings[0].data, b"abc");
    }

    #[test]
    fn test_metadata_and_display() {
        let r = rules(r#"rule tagged : red blue { meta: author = "ops" level = 3 strings: $a = "x" condition: $a }"#);
        let matches = scan(&r, b"..x");
        assert_eq!(matches[0].tags, vec!["red", "blue"]);
        assert_eq!(matches[0].metas[0].value, MetaValue::String("ops".to_string()));
        assert_eq!(matches[0].metas[1].value, MetaValue::Integer(3));
        assert_eq!(matches[0].to_string(), "default:tagged [red,blue] $a@0x2");
    }

    #[test]
    fn test_xor_key_reported() {
        let encoded: Vec<u8> = b"secret".iter().map(|b| b ^ 0x05).collect();
        let matches = scan(&rules(r#"rule x { strings: $a = "secret" xor condition: $a }"#), &encoded);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].strings[0].xor_key, 0x05);
        assert_eq!(matches[0].strings[0].data, encoded);
    }

    #[test]
    fn test_two_block_iterator() {
        let r = rules(r#"rule blocks { strings: $a = "aaaa" $b = "bbbb" condition: $a at 0 and $b at 32 }"#);
        let mut collected = MatchRules::new();
        let mut both = BlockList::new(vec![(0, vec![b'a'; 16]), (32, vec![b'b'; 16])]);
        r.scan_mem_blocks(&mut both, ScanFlags::empty(), Duration::ZERO, &mut collected).unwrap();
        assert_eq!(collected.len(), 1);
        let b = collected.iter().next().unwrap().strings.iter().find(|s| s.name == "$b").unwrap();
        assert_eq!((b.base, b.offset), (32, 0));

        let mut collected = MatchRules::new();
        let mut first_only = BlockList::new(vec![(0, vec![b'a'; 16])]);
        r.scan_mem_blocks(&mut first_only, ScanFlags::empty(), Duration::ZERO, &mut collected).unwrap();
        assert!(collected.is_empty());
    }

    #[test]
    fn test_block_filesize() {
        let r = rules("rule sized { condition: filesize == 48 }");
        let mut collected = MatchRules::new();
        let mut sized = BlockList::new(vec![(0, vec![0; 16])]).with_file_size(48);
        r.scan_mem_blocks(&mut sized, ScanFlags::empty(), Duration::ZERO, &mut collected).unwrap();
        assert_eq!(collected.len(), 1);

        let mut collected = MatchRules::new();
        let mut plain = BlockList::new(vec![(0, vec![0; 16])]);
        r.scan_mem_blocks(&mut plain, ScanFlags::empty(), Duration::ZERO, &mut collected).unwrap();
        assert!(collected.is_empty());
    }

    struct BrokenDevice;

    impl MemoryBlockIterator for BrokenDevice {
        fn first(&mut self) -> Option<crate::memblocks::MemoryBlock> {
            Some(crate::memblocks::MemoryBlock::new(0, 8, |_buf: &mut [u8]| panic!("read failed")))
        }
        fn next(&mut self) -> Option<crate::memblocks::MemoryBlock> {
            None
        }
    }

    #[test]
    fn test_fetch_panic_is_callback_error() {
        let r = rules("rule t { condition: true }");
        let mut collected = MatchRules::new();
        let err = r
            .scan_mem_blocks(&mut BrokenDevice, ScanFlags::empty(), Duration::ZERO, &mut collected)
            .unwrap_err();
        assert_eq!(err.engine_code(), Some(ERROR_CALLBACK_ERROR));
    }

    #[test]
    fn test_module_data_reaches_conditions() {
        let r = rules(r#"import "tests" rule data { condition: tests.module_data == "hello" }"#);
        assert_eq!(r.get_imports(), vec!["tests"]);

        let mut recorder = Recorder {
            payload: Some(b"hello".to_vec()),
            ..Recorder::default()
        };
        r.scan_mem(b"", ScanFlags::empty(), Duration::ZERO, &mut recorder).unwrap();
        assert_eq!(recorder.imports, vec!["tests"]);
        assert_eq!(recorder.module_data.as_deref(), Some(&b"hello"[..]));
        assert_eq!(recorder.matched, vec!["data"]);
        assert_eq!(recorder.finished, 1);

        let mut without = Recorder::default();
        r.scan_mem(b"", ScanFlags::empty(), Duration::ZERO, &mut without).unwrap();
        assert!(without.matched.is_empty());
    }

    #[test]
    fn test_console_log() {
        let r = rules(r#"import "console" rule c { condition: console.log("size ", filesize) }"#);
        let mut recorder = Recorder::default();
        r.scan_mem(b"abcd", ScanFlags::empty(), Duration::ZERO, &mut recorder).unwrap();
        assert_eq!(recorder.logs, vec!["size 4"]);
        assert_eq!(recorder.matched, vec!["c"]);
    }

    #[test]
    fn test_too_many_matches() {
        let r = rules("rule zeros { strings: $z = { 00 } condition: $z }");
        let data = vec![0u8; 1_100_000];
        let mut recorder = Recorder::default();
        r.scan_mem(&data, ScanFlags::empty(), Duration::ZERO, &mut recorder).unwrap();
        assert_eq!(recorder.too_many, vec![("zeros".to_string(), "$z".to_string())]);
        assert_eq!(recorder.matched, vec!["zeros"]);
    }

    #[test]
    fn test_abort_stops_scan() {
        let r = rules("rule a { condition: true } rule b { condition: true }");
        let mut recorder = Recorder {
            abort_on_match: true,
            ..Recorder::default()
        };
        r.scan_mem(b"", ScanFlags::empty(), Duration::ZERO, &mut recorder).unwrap();
        assert_eq!(recorder.matched, vec!["a"]);
        assert_eq!(recorder.finished, 0);
    }

    #[test]
    fn test_panicking_callback_is_callback_error() {
        let r = rules("rule a { condition: true }");
        let mut recorder = Recorder {
            fail_on_match: true,
            ..Recorder::default()
        };
        let err = r.scan_mem(b"", ScanFlags::empty(), Duration::ZERO, &mut recorder).unwrap_err();
        assert!(matches!(err, Error::Engine(ref e) if e.is_callback_error()));
    }

    struct Refuses;

    impl ScanCallback for Refuses {
        fn as_rule_matching(&mut self) -> Option<&mut dyn ScanCallbackMatch> {
            Some(self)
        }
    }

    impl ScanCallbackMatch for Refuses {
        fn rule_matching(&mut self, _ctx: &ScanContext<'_>, _rule: &Rule<'_>) -> CallbackResult {
            Err(CallbackError::new("refused"))
        }
    }

    #[test]
    fn test_callback_error_fails_scan() {
        let err = rules("rule a { condition: true }")
            .scan_mem(b"", ScanFlags::empty(), Duration::ZERO, &mut Refuses)
            .unwrap_err();
        assert_eq!(err.engine_code(), Some(ERROR_CALLBACK_ERROR));
    }

    #[derive(Default)]
    struct Misses(Vec<String>);

    impl ScanCallback for Misses {
        fn as_rule_not_matching(&mut self) -> Option<&mut dyn ScanCallbackNoMatch> {
            Some(self)
        }
    }

    impl ScanCallbackNoMatch for Misses {
        fn rule_not_matching(&mut self, _ctx: &ScanContext<'_>, rule: &Rule<'_>) -> CallbackResult {
            self.0.push(rule.identifier().to_string());
            Ok(false)
        }
    }

    #[test]
    fn test_not_matching_only() {
        let r = rules("rule yes { condition: true } rule no { condition: false }");
        let mut misses = Misses::default();
        r.scan_mem(b"", ScanFlags::empty(), Duration::ZERO, &mut misses).unwrap();
        assert_eq!(misses.0, vec!["no"]);
    }

    #[test]
    fn test_stream_round_trip_is_stable() {
        let r = rules(r#"rule s : t { meta: k = "v" strings: $a = "abc" nocase condition: $a }"#);
        let mut first = Vec::new();
        r.write(&mut first).unwrap();

        let loaded = Rules::read(&mut Cursor::new(first.clone())).unwrap();
        let mut second = Vec::new();
        loaded.write(&mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(scan(&loaded, b"xxABCxx").len(), 1);
    }

    #[test]
    fn test_read_garbage() {
        let err = Rules::read(&mut Cursor::new(b"not a ruleset at all".to_vec())).unwrap_err();
        assert_eq!(err.engine_code(), Some(ERROR_INVALID_FILE));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let r = rules(r#"rule f { strings: $a = "disk" condition: $a }"#);

        let buffered = dir.path().join("buffered.yarc");
        r.save(&buffered).unwrap();
        assert_eq!(scan(&Rules::load(&buffered).unwrap(), b"on disk").len(), 1);

        let native = dir.path().join("native.yarc");
        r.save_native(&native).unwrap();
        assert_eq!(std::fs::read(&native).unwrap(), std::fs::read(&buffered).unwrap());
        assert_eq!(scan(&Rules::load_native(&native).unwrap(), b"on disk").len(), 1);
    }

    #[test]
    fn test_concurrent_scans() {
        let r = rules(r#"rule t { strings: $a = "needle" condition: $a }"#);
        std::thread::scope(|s| {
            for i in 0..8 {
                let r = r.clone();
                s.spawn(move || {
                    let data = format!("{}needle{}", "x".repeat(i), i);
                    for _ in 0..20 {
                        let matches = scan(&r, data.as_bytes());
                        assert_eq!(matches[0].strings[0].offset, i as u64);
                    }
                });
            }
        });
    }

    #[test]
    fn test_rule_listing() {
        let r = rules(r#"private rule p { condition: true } global rule g { strings: $x = "x" private condition: $x or true }"#);
        let listed = r.rules();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].is_private());
        assert!(listed[1].is_global());
        assert!(listed[1].strings()[0].is_private());
    }

    struct SlowDevice {
        remaining: usize,
    }

    impl SlowDevice {
        fn block(&self) -> Option<crate::memblocks::MemoryBlock> {
            let base = (3 - self.remaining) as u64 * 0x1000;
            Some(crate::memblocks::MemoryBlock::new(base, 16, |buf: &mut [u8]| {
                std::thread::sleep(Duration::from_millis(700));
                buf.fill(0x41);
            }))
        }
    }

    impl MemoryBlockIterator for SlowDevice {
        fn first(&mut self) -> Option<crate::memblocks::MemoryBlock> {
            self.remaining = 3;
            self.block()
        }
        fn next(&mut self) -> Option<crate::memblocks::MemoryBlock> {
            self.remaining -= 1;
            if self.remaining == 0 {
                None
            } else {
                self.block()
            }
        }
    }

    #[test]
    fn test_scan_times_out() {
        let r = rules("rule t { condition: true }");
        let mut recorder = Recorder::default();
        let err = r
            .scan_mem_blocks(&mut SlowDevice { remaining: 0 }, ScanFlags::empty(), Duration::from_secs(1), &mut recorder)
            .unwrap_err();
        assert_eq!(err.engine_code(), Some(crate::codes::ERROR_SCAN_TIMEOUT));
        assert!(recorder.matched.is_empty());
        assert_eq!(recorder.finished, 0);
    }

    #[test]
    fn test_timeout_seconds() {
        assert_eq!(timeout_seconds(Duration::from_millis(1500)), 1);
        assert_eq!(timeout_seconds(Duration::from_secs(u64::MAX)), c_int::MAX);
    }
}
