// Mon Feb 16 2026 - Alex

//! Registry mapping opaque native user-data tokens to managed values.

pub mod guard;
pub mod pool;

pub use guard::HandleGuard;
pub use pool::{CallbackEntry, CallbackPool, EntryKind, Handle};

use crate::config::Config;
use libc::c_void;
use once_cell::sync::OnceCell;
use std::ptr::NonNull;

static CALLBACK_DATA: OnceCell<CallbackPool> = OnceCell::new();

/// The process-wide pool, sized from [`Config::global`] on first use.
pub fn callback_data() -> &'static CallbackPool {
    CALLBACK_DATA.get_or_init(|| CallbackPool::new(Config::global().callback_pool_capacity))
}

/// Resolves a token received from native code. Panics if `token` is null,
/// not registered, or registered under another kind.
pub(crate) fn lookup(token: *mut c_void, kind: EntryKind) -> NonNull<c_void> {
    match Handle::from_ptr(token) {
        Some(handle) => callback_data().get_kind(handle, kind),
        None => {
            log::error!("null callback handle");
            panic!("callback handle is null");
        }
    }
}
