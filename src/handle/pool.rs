// Mon Feb 16 2026 - Alex

use log::{debug, error, trace};
use parking_lot::RwLock;
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::NonNull;

/// What a registered pointer refers to. Lookups check the kind so a token
/// handed to the wrong trampoline fails loudly instead of being reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    ScanCallback,
    BlockIterator,
    Reader,
    Writer,
    Compiler,
}

/// An erased borrow stored in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackEntry {
    pub kind: EntryKind,
    pub ptr: NonNull<c_void>,
}

impl CallbackEntry {
    pub fn new<T>(kind: EntryKind, value: &mut T) -> Self {
        Self {
            kind,
            ptr: NonNull::from(value).cast(),
        }
    }
}

/// Opaque token handed to native code as user data. Points at a slot of a
/// `calloc`'d array so its address is stable and never a Rust heap pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonNull<usize>);

impl Handle {
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr() as *mut c_void
    }

    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr as *mut usize).map(Handle)
    }
}

struct Slots {
    base: NonNull<usize>,
    entries: Vec<Option<CallbackEntry>>,
    free: Vec<usize>,
}

/// Bounded slot table with a free list.
pub struct CallbackPool {
    slots: RwLock<Slots>,
    capacity: usize,
}

// Entries are only dereferenced by the thread that registered them, while
// the registering borrow is alive; the table itself is behind the lock.
unsafe impl Send for CallbackPool {}
unsafe impl Sync for CallbackPool {}

impl CallbackPool {
    pub fn new(capacity: usize) -> Self {
        let raw = unsafe { libc::calloc(capacity.max(1), size_of::<usize>()) } as *mut usize;
        let base = match NonNull::new(raw) {
            Some(base) => base,
            None => {
                error!("could not allocate callback pool of {} slots", capacity);
                panic!("could not allocate callback pool");
            }
        };
        debug!("callback pool created with {} slots", capacity);
        Self {
            slots: RwLock::new(Slots {
                base,
                entries: vec![None; capacity],
                free: (0..capacity).rev().collect(),
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.read();
        self.capacity - slots.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&self, entry: CallbackEntry) -> Handle {
        let mut slots = self.slots.write();
        let idx = match slots.free.pop() {
            Some(idx) => idx,
            None => {
                error!("callback pool exhausted ({} slots in use)", self.capacity);
                panic!("callback pool storage exhausted");
            }
        };
        slots.entries[idx] = Some(entry);
        let slot = unsafe { slots.base.as_ptr().add(idx) };
        unsafe { *slot = idx + 1 };
        trace!("registered {:?} in slot {}", entry.kind, idx);
        Handle(unsafe { NonNull::new_unchecked(slot) })
    }

    fn index_of(&self, slots: &Slots, handle: Handle) -> usize {
        let offset = (handle.0.as_ptr() as usize).wrapping_sub(slots.base.as_ptr() as usize);
        let idx = offset / size_of::<usize>();
        if offset % size_of::<usize>() != 0 || idx >= self.capacity {
            error!("handle {:p} does not belong to the callback pool", handle.as_ptr());
            panic!("invalid callback handle");
        }
        idx
    }

    pub fn get(&self, handle: Handle) -> CallbackEntry {
        let slots = self.slots.read();
        let idx = self.index_of(&slots, handle);
        match slots.entries[idx] {
            Some(entry) => entry,
            None => {
                error!("lookup of unregistered handle in slot {}", idx);
                panic!("callback handle is not registered");
            }
        }
    }

    /// Looks up `handle` and checks it refers to a value of `kind`.
    pub fn get_kind(&self, handle: Handle, kind: EntryKind) -> NonNull<c_void> {
        let entry = self.get(handle);
        if entry.kind != kind {
            error!("handle registered as {:?} used as {:?}", entry.kind, kind);
            panic!("callback handle kind mismatch");
        }
        entry.ptr
    }

    pub fn remove(&self, handle: Handle) {
        let mut slots = self.slots.write();
        let idx = self.index_of(&slots, handle);
        if slots.entries[idx].take().is_none() {
            error!("unregister of unregistered handle in slot {}", idx);
            panic!("callback handle is not registered");
        }
        unsafe { *slots.base.as_ptr().add(idx) = 0 };
        slots.free.push(idx);
        trace!("released slot {}", idx);
    }
}

impl Drop for CallbackPool {
    fn drop(&mut self) {
        let slots = self.slots.get_mut();
        unsafe { libc::free(slots.base.as_ptr() as *mut libc::c_void) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(value: &mut u64) -> CallbackEntry {
        CallbackEntry::new(EntryKind::ScanCallback, value)
    }

    #[test]
    fn test_add_get_remove() {
        let pool = CallbackPool::new(4);
        let mut value = 7u64;
        let handle = pool.add(entry(&mut value));
        assert_eq!(pool.len(), 1);
        let ptr = pool.get_kind(handle, EntryKind::ScanCallback);
        assert_eq!(unsafe { *ptr.cast::<u64>().as_ref() }, 7);
        pool.remove(handle);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_slots_are_reused() {
        let pool = CallbackPool::new(1);
        let mut value = 1u64;
        let first = pool.add(entry(&mut value));
        pool.remove(first);
        let second = pool.add(entry(&mut value));
        assert_eq!(first, second);
        pool.remove(second);
    }

    #[test]
    fn test_fills_to_capacity() {
        let pool = CallbackPool::new(8);
        let mut values = [0u64; 8];
        let handles: Vec<Handle> = values.iter_mut().map(|v| pool.add(entry(v))).collect();
        assert_eq!(pool.len(), 8);
        for handle in handles {
            pool.remove(handle);
        }
    }

    #[test]
    #[should_panic(expected = "storage exhausted")]
    fn test_overflow_panics() {
        let pool = CallbackPool::new(2);
        let mut values = [0u64; 3];
        for value in values.iter_mut() {
            pool.add(entry(value));
        }
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_double_remove_panics() {
        let pool = CallbackPool::new(2);
        let mut value = 0u64;
        let handle = pool.add(entry(&mut value));
        pool.remove(handle);
        pool.remove(handle);
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn test_lookup_after_remove_panics() {
        let pool = CallbackPool::new(2);
        let mut value = 0u64;
        let handle = pool.add(entry(&mut value));
        pool.remove(handle);
        pool.get(handle);
    }

    #[test]
    #[should_panic(expected = "invalid callback handle")]
    fn test_foreign_handle_panics() {
        let pool = CallbackPool::new(2);
        let mut outside = 0usize;
        let handle = Handle::from_ptr(&mut outside as *mut usize as *mut c_void).unwrap();
        pool.remove(handle);
    }

    #[test]
    #[should_panic(expected = "kind mismatch")]
    fn test_kind_mismatch_panics() {
        let pool = CallbackPool::new(2);
        let mut value = 0u64;
        let handle = pool.add(entry(&mut value));
        pool.get_kind(handle, EntryKind::Reader);
    }

    proptest! {
        #[test]
        fn test_lookup_returns_registered_value(values in proptest::collection::vec(any::<u64>(), 1..64), seed in any::<u64>()) {
            let pool = CallbackPool::new(64);
            let mut values = values;
            let mut handles: Vec<(Handle, u64)> = values
                .iter_mut()
                .map(|v| {
                    let expected = *v;
                    (pool.add(entry(v)), expected)
                })
                .collect();

            for &(handle, expected) in &handles {
                let ptr = pool.get_kind(handle, EntryKind::ScanCallback);
                prop_assert_eq!(unsafe { *ptr.cast::<u64>().as_ref() }, expected);
            }

            let rotate = (seed as usize) % handles.len();
            handles.rotate_left(rotate);
            for (handle, _) in handles {
                pool.remove(handle);
            }
            prop_assert!(pool.is_empty());
        }
    }
}
