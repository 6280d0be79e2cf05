// Mon Feb 16 2026 - Alex

use crate::native::abi::{OBJECT_TYPE_FUNCTION, OBJECT_TYPE_INTEGER, OBJECT_TYPE_STRING, OBJECT_TYPE_STRUCTURE};
use crate::native::condition::Value;
use libc::c_int;
use std::ffi::CString;

pub const MODULE_TESTS: &str = "tests";
pub const MODULE_CONSOLE: &str = "console";

#[derive(Debug, Clone)]
pub enum ObjectValue {
    Integer(i64),
    String(Vec<u8>),
    Structure(Vec<YrObject>),
    Function,
}

/// Node of a module's object tree, handed to MODULE_IMPORTED.
#[derive(Debug, Clone)]
pub struct YrObject {
    pub identifier: CString,
    pub value: ObjectValue,
}

impl YrObject {
    fn new(identifier: &str, value: ObjectValue) -> Self {
        Self {
            identifier: CString::new(identifier).unwrap_or_default(),
            value,
        }
    }

    pub fn kind(&self) -> c_int {
        match self.value {
            ObjectValue::Integer(_) => OBJECT_TYPE_INTEGER,
            ObjectValue::String(_) => OBJECT_TYPE_STRING,
            ObjectValue::Structure(_) => OBJECT_TYPE_STRUCTURE,
            ObjectValue::Function => OBJECT_TYPE_FUNCTION,
        }
    }

    pub fn member(&self, name: &str) -> Option<&YrObject> {
        match &self.value {
            ObjectValue::Structure(members) => members.iter().find(|m| m.identifier.as_bytes() == name.as_bytes()),
            _ => None,
        }
    }

    pub fn lookup(&self, path: &[String]) -> Option<&YrObject> {
        path.iter().try_fold(self, |obj, name| obj.member(name))
    }
}

/// What a dotted module path names at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    Field,
    Function,
}

pub fn is_known(name: &str) -> bool {
    matches!(name, MODULE_TESTS | MODULE_CONSOLE)
}

pub fn declaration(path: &[String]) -> Option<Declared> {
    let root = declare(path.first()?)?;
    match root.lookup(&path[1..])?.value {
        ObjectValue::Function => Some(Declared::Function),
        ObjectValue::Structure(_) => None,
        _ => Some(Declared::Field),
    }
}

fn declare(name: &str) -> Option<YrObject> {
    let object = match name {
        MODULE_TESTS => YrObject::new(
            MODULE_TESTS,
            ObjectValue::Structure(vec![
                YrObject::new(
                    "constants",
                    ObjectValue::Structure(vec![
                        YrObject::new("one", ObjectValue::Integer(1)),
                        YrObject::new("two", ObjectValue::Integer(2)),
                        YrObject::new("foo", ObjectValue::String(b"foo".to_vec())),
                        YrObject::new("empty", ObjectValue::String(Vec::new())),
                    ]),
                ),
                YrObject::new("module_data", ObjectValue::String(Vec::new())),
            ]),
        ),
        MODULE_CONSOLE => YrObject::new(MODULE_CONSOLE, ObjectValue::Structure(vec![YrObject::new("log", ObjectValue::Function)])),
        _ => return None,
    };
    Some(object)
}

/// A module instantiated for one scan. `data` points into memory owned by
/// whoever answered IMPORT_MODULE and must stay valid until the scan ends.
#[derive(Debug)]
pub struct LoadedModule {
    pub name: String,
    pub object: YrObject,
    data: *const u8,
    data_len: usize,
}

impl LoadedModule {
    pub fn load(name: &str, data: *const u8, data_len: usize) -> Option<Self> {
        let mut object = declare(name)?;
        if name == MODULE_TESTS && !data.is_null() && data_len > 0 {
            // The object tree gets a copy for MODULE_IMPORTED; conditions read
            // the caller's buffer directly.
            let copy = unsafe { std::slice::from_raw_parts(data, data_len) }.to_vec();
            if let ObjectValue::Structure(members) = &mut object.value {
                for member in members.iter_mut() {
                    if member.identifier.as_bytes() == b"module_data" {
                        member.value = ObjectValue::String(copy.clone());
                    }
                }
            }
        }
        Some(Self {
            name: name.to_string(),
            object,
            data,
            data_len,
        })
    }

    pub fn field(&self, path: &[String]) -> Value {
        if self.name == MODULE_TESTS && path == ["module_data"] {
            if self.data.is_null() || self.data_len == 0 {
                return Value::Undefined;
            }
            let bytes = unsafe { std::slice::from_raw_parts(self.data, self.data_len) };
            return Value::Text(bytes.to_vec());
        }
        match self.object.lookup(path).map(|o| &o.value) {
            Some(ObjectValue::Integer(i)) => Value::Integer(*i),
            Some(ObjectValue::String(s)) => Value::Text(s.clone()),
            _ => Value::Undefined,
        }
    }

    /// Calls a module function. `console.log` appends to `logs`.
    pub fn call(&self, path: &[String], args: Vec<Value>, logs: &mut Vec<String>) -> Value {
        if self.name == MODULE_CONSOLE && path == ["log"] {
            let mut line = String::new();
            for arg in &args {
                match arg {
                    Value::Text(t) => line.push_str(&String::from_utf8_lossy(t)),
                    Value::Integer(i) => line.push_str(&i.to_string()),
                    Value::Float(f) => line.push_str(&f.to_string()),
                    Value::Bool(b) => line.push_str(&b.to_string()),
                    Value::Undefined => return Value::Undefined,
                }
            }
            logs.push(line);
            return Value::Bool(true);
        }
        Value::Undefined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_declarations() {
        assert_eq!(declaration(&path(&["tests", "module_data"])), Some(Declared::Field));
        assert_eq!(declaration(&path(&["tests", "constants", "one"])), Some(Declared::Field));
        assert_eq!(declaration(&path(&["console", "log"])), Some(Declared::Function));
        assert_eq!(declaration(&path(&["tests", "constants"])), None);
        assert_eq!(declaration(&path(&["pe", "machine"])), None);
    }

    #[test]
    fn test_module_data_reads_buffer() {
        let data = b"payload".to_vec();
        let module = LoadedModule::load("tests", data.as_ptr(), data.len()).unwrap();
        assert_eq!(module.field(&path(&["module_data"])), Value::Text(b"payload".to_vec()));
        assert_eq!(module.field(&path(&["constants", "two"])), Value::Integer(2));
        assert_eq!(module.object.kind(), OBJECT_TYPE_STRUCTURE);
    }

    #[test]
    fn test_console_log() {
        let module = LoadedModule::load("console", std::ptr::null(), 0).unwrap();
        let mut logs = Vec::new();
        let v = module.call(&path(&["log"]), vec![Value::Text(b"n=".to_vec()), Value::Integer(3)], &mut logs);
        assert!(v.is_true());
        assert_eq!(logs, vec!["n=3".to_string()]);
    }
}
