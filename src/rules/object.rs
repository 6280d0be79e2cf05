// Mon Feb 16 2026 - Alex

use crate::native::abi::{OBJECT_TYPE_FUNCTION, OBJECT_TYPE_INTEGER, OBJECT_TYPE_STRING, OBJECT_TYPE_STRUCTURE};
use crate::native::modules::{ObjectValue, YrObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Integer,
    String,
    Structure,
    Function,
    Unknown,
}

/// Borrowed view of a module's object tree as seen in MODULE_IMPORTED.
#[derive(Clone, Copy)]
pub struct Object<'a> {
    raw: &'a YrObject,
}

impl<'a> Object<'a> {
    pub(crate) fn new(raw: &'a YrObject) -> Self {
        Self { raw }
    }

    pub fn identifier(&self) -> String {
        self.raw.identifier.to_string_lossy().into_owned()
    }

    pub fn object_type(&self) -> ObjectType {
        match self.raw.kind() {
            OBJECT_TYPE_INTEGER => ObjectType::Integer,
            OBJECT_TYPE_STRING => ObjectType::String,
            OBJECT_TYPE_STRUCTURE => ObjectType::Structure,
            OBJECT_TYPE_FUNCTION => ObjectType::Function,
            _ => ObjectType::Unknown,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.raw.value {
            ObjectValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match &self.raw.value {
            ObjectValue::String(s) => Some(s.as_slice()),
            _ => None,
        }
    }

    pub fn member(&self, name: &str) -> Option<Object<'a>> {
        self.raw.member(name).map(Object::new)
    }

    pub fn members(&self) -> Vec<Object<'a>> {
        match &self.raw.value {
            ObjectValue::Structure(members) => members.iter().map(Object::new).collect(),
            _ => Vec::new(),
        }
    }

    /// Follows a dotted path such as `constants.one`.
    pub fn lookup(&self, path: &str) -> Option<Object<'a>> {
        path.split('.').try_fold(*self, |obj, name| obj.member(name))
    }
}

impl std::fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("identifier", &self.identifier())
            .field("type", &self.object_type())
            .finish()
    }
}
