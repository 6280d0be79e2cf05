// Mon Feb 16 2026 - Alex

//! Byte buffers allocated with the C allocator, for memory that native code
//! reads after a callback has returned.

use libc::{c_char, c_void};
use log::trace;
use std::ptr::{self, NonNull};

/// A `calloc`'d copy of some bytes, freed on drop.
#[derive(Debug)]
pub struct NativeBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl NativeBuffer {
    /// Copies `data` into a fresh buffer with a trailing NUL that is not
    /// counted in `len`. Returns `None` if the allocation fails.
    pub fn copy_from(data: &[u8]) -> Option<Self> {
        let raw = unsafe { libc::calloc(data.len() + 1, 1) } as *mut u8;
        let ptr = NonNull::new(raw)?;
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len()) };
        trace!("native buffer of {} bytes at {:p}", data.len(), raw);
        Some(Self { ptr, len: data.len() })
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr() as *mut c_void
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Gives up ownership as a C string; release with [`NativeBuffer::free_raw`].
    pub fn into_c_string(self) -> *const c_char {
        let ptr = self.ptr.as_ptr() as *const c_char;
        std::mem::forget(self);
        ptr
    }

    /// # Safety
    /// `ptr` must come from [`NativeBuffer::into_c_string`] and not be freed twice.
    pub unsafe fn free_raw(ptr: *const c_char) {
        libc::free(ptr as *mut c_void);
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        unsafe { libc::free(self.ptr.as_ptr() as *mut c_void) };
    }
}

/// A `realloc`-grown buffer reused across fetches. It never shrinks.
#[derive(Debug)]
pub struct ScratchBuffer {
    ptr: *mut u8,
    capacity: usize,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self {
            ptr: ptr::null_mut(),
            capacity: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a buffer of at least `len` bytes, or `None` if growing failed.
    pub fn reserve(&mut self, len: usize) -> Option<&mut [u8]> {
        if len > self.capacity {
            let grown = unsafe { libc::realloc(self.ptr as *mut c_void, len) } as *mut u8;
            if grown.is_null() {
                return None;
            }
            trace!("scratch buffer grown {} -> {} bytes", self.capacity, len);
            // realloc leaves the grown tail uninitialised.
            unsafe { ptr::write_bytes(grown.add(self.capacity), 0, len - self.capacity) };
            self.ptr = grown;
            self.capacity = len;
        }
        if len == 0 {
            return Some(&mut []);
        }
        Some(unsafe { std::slice::from_raw_parts_mut(self.ptr, len) })
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { libc::free(self.ptr as *mut c_void) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_native_buffer_copy() {
        let buffer = NativeBuffer::copy_from(b"module data").unwrap();
        assert_eq!(buffer.len(), 11);
        assert_eq!(buffer.as_slice(), b"module data");
    }

    #[test]
    fn test_c_string_round_trip() {
        let raw = NativeBuffer::copy_from(b"rule a { condition: true }").unwrap().into_c_string();
        let text = unsafe { CStr::from_ptr(raw) }.to_str().unwrap().to_string();
        unsafe { NativeBuffer::free_raw(raw) };
        assert_eq!(text, "rule a { condition: true }");
    }

    #[test]
    fn test_scratch_never_shrinks() {
        let mut scratch = ScratchBuffer::new();
        assert_eq!(scratch.reserve(64).unwrap().len(), 64);
        assert_eq!(scratch.reserve(16).unwrap().len(), 16);
        assert_eq!(scratch.capacity(), 64);
        assert!(scratch.reserve(0).unwrap().is_empty());
    }

    #[test]
    fn test_scratch_growth_is_zeroed() {
        let mut scratch = ScratchBuffer::new();
        scratch.reserve(8).unwrap().fill(0xAA);
        let grown = scratch.reserve(32).unwrap();
        assert_eq!(&grown[..8], &[0xAA; 8]);
        assert!(grown[8..].iter().all(|&b| b == 0));
    }
}
