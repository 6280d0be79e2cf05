// Mon Feb 16 2026 - Alex

use crate::handle::pool::{CallbackEntry, CallbackPool, EntryKind, Handle};
use libc::c_void;
use log::debug;
use std::marker::PhantomData;

/// Keeps a value registered in a [`CallbackPool`] for as long as the guard
/// lives. The guard holds the value's mutable borrow, so the value cannot
/// move or drop while native code may still look it up.
pub struct HandleGuard<'a, T> {
    pool: &'a CallbackPool,
    handle: Handle,
    _value: PhantomData<&'a mut T>,
}

impl<'a, T> HandleGuard<'a, T> {
    pub fn register(pool: &'a CallbackPool, kind: EntryKind, value: &'a mut T) -> Self {
        let handle = pool.add(CallbackEntry::new(kind, value));
        debug!("registered {:?} handle {:p}", kind, handle.as_ptr());
        Self {
            pool,
            handle,
            _value: PhantomData,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The token to pass as native user data.
    pub fn token(&self) -> *mut c_void {
        self.handle.as_ptr()
    }
}

impl<T> Drop for HandleGuard<'_, T> {
    fn drop(&mut self) {
        self.pool.remove(self.handle);
        debug!("released handle {:p}", self.handle.as_ptr());
    }
}
