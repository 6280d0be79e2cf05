// Mon Feb 16 2026 - Alex

//! Lets a managed block sequence drive the engine's `YR_MEMORY_BLOCK_ITERATOR`.
//!
//! The engine calls `first`/`next` to walk blocks and `fetch_data` to pull a
//! block's bytes. Each call resolves the registry token stored in the
//! native structs' `context` field back to a
//! [`MemoryBlockIteratorContainer`].

use crate::handle::{self, callback_data, EntryKind, HandleGuard};
use crate::native::abi::{YrMemoryBlock, YrMemoryBlockIterator};
use crate::native::error::{ERROR_CALLBACK_ERROR, ERROR_INSUFFICIENT_MEMORY, ERROR_SUCCESS};
use crate::utils::cbytes::ScratchBuffer;
use libc::c_void;
use log::{trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// A contiguous region of the scanned address space. `fetch` fills the
/// buffer it is given, which is exactly `size` bytes long.
pub struct MemoryBlock {
    pub base: u64,
    pub size: u64,
    fetch: Box<dyn FnMut(&mut [u8])>,
}

impl MemoryBlock {
    pub fn new(base: u64, size: u64, fetch: impl FnMut(&mut [u8]) + 'static) -> Self {
        Self {
            base,
            size,
            fetch: Box::new(fetch),
        }
    }

    /// A block backed by an owned copy of `data`.
    pub fn from_bytes(base: u64, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::new(base, size, move |buf: &mut [u8]| buf.copy_from_slice(&data[..buf.len()]))
    }

    pub fn fetch_into(&mut self, buf: &mut [u8]) {
        (self.fetch)(buf)
    }
}

impl std::fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlock").field("base", &self.base).field("size", &self.size).finish()
    }
}

pub trait MemoryBlockIterator {
    fn first(&mut self) -> Option<MemoryBlock>;
    fn next(&mut self) -> Option<MemoryBlock>;

    /// Exposes the total size used as `filesize` in conditions. Iterators
    /// that return `None` leave `filesize` undefined.
    fn as_file_size(&mut self) -> Option<&mut dyn MemoryBlockIteratorWithFilesize> {
        None
    }
}

pub trait MemoryBlockIteratorWithFilesize {
    fn file_size(&mut self) -> u64;
}

/// Native iterator state for one scan.
pub struct MemoryBlockIteratorContainer<'a> {
    iterator: &'a mut dyn MemoryBlockIterator,
    current: Option<MemoryBlock>,
    block: YrMemoryBlock,
    scratch: ScratchBuffer,
    native: YrMemoryBlockIterator,
}

impl<'a> MemoryBlockIteratorContainer<'a> {
    pub fn new(iterator: &'a mut dyn MemoryBlockIterator) -> Self {
        let has_size = iterator.as_file_size().is_some();
        Self {
            iterator,
            current: None,
            block: YrMemoryBlock::default(),
            scratch: ScratchBuffer::new(),
            native: YrMemoryBlockIterator {
                context: ptr::null_mut(),
                first: Some(iterator_first),
                next: Some(iterator_next),
                file_size: if has_size { Some(iterator_file_size) } else { None },
                last_error: ERROR_SUCCESS,
            },
        }
    }

    fn bind(&mut self, token: *mut c_void) -> *mut YrMemoryBlockIterator {
        self.native.context = token;
        self.block.context = token;
        &mut self.native
    }

    fn advance(&mut self, first: bool) -> *mut YrMemoryBlock {
        let iterator = &mut *self.iterator;
        let produced = panic::catch_unwind(AssertUnwindSafe(|| if first { iterator.first() } else { iterator.next() }));
        self.current = match produced {
            Ok(block) => block,
            Err(_) => {
                warn!("memory block iterator panicked");
                self.native.last_error = ERROR_CALLBACK_ERROR;
                None
            }
        };
        match &self.current {
            Some(block) => {
                trace!("block base={:#x} size={}", block.base, block.size);
                self.block.base = block.base;
                self.block.size = block.size as usize;
                self.block.fetch_data = Some(if block.size == 0 { fetch_nothing } else { block_fetch });
                &mut self.block
            }
            None => ptr::null_mut(),
        }
    }

    fn fetch(&mut self) -> *const u8 {
        let size = self.block.size;
        let block = match self.current.as_mut() {
            Some(block) => block,
            None => return ptr::null(),
        };
        let buf = match self.scratch.reserve(size) {
            Some(buf) => buf,
            None => {
                self.native.last_error = ERROR_INSUFFICIENT_MEMORY;
                return ptr::null();
            }
        };
        let ptr = buf.as_ptr();
        if panic::catch_unwind(AssertUnwindSafe(|| block.fetch_into(buf))).is_err() {
            warn!("fetch of block at {:#x} panicked", block.base);
            self.native.last_error = ERROR_CALLBACK_ERROR;
            return ptr::null();
        }
        ptr
    }
}

unsafe fn container<'a>(token: *mut c_void) -> &'a mut MemoryBlockIteratorContainer<'a> {
    let entry = handle::lookup(token, EntryKind::BlockIterator);
    &mut *(entry.as_ptr() as *mut MemoryBlockIteratorContainer)
}

unsafe extern "C" fn iterator_first(iterator: *mut YrMemoryBlockIterator) -> *mut YrMemoryBlock {
    container((*iterator).context).advance(true)
}

unsafe extern "C" fn iterator_next(iterator: *mut YrMemoryBlockIterator) -> *mut YrMemoryBlock {
    container((*iterator).context).advance(false)
}

unsafe extern "C" fn iterator_file_size(iterator: *mut YrMemoryBlockIterator) -> u64 {
    let container = container((*iterator).context);
    let iterator = &mut *container.iterator;
    match panic::catch_unwind(AssertUnwindSafe(|| iterator.as_file_size().map(|s| s.file_size()))) {
        Ok(size) => size.unwrap_or(0),
        Err(_) => {
            warn!("memory block iterator file_size panicked");
            container.native.last_error = ERROR_CALLBACK_ERROR;
            0
        }
    }
}

unsafe extern "C" fn block_fetch(block: *mut YrMemoryBlock) -> *const u8 {
    container((*block).context).fetch()
}

unsafe extern "C" fn fetch_nothing(_block: *mut YrMemoryBlock) -> *const u8 {
    ptr::null()
}

/// Registers `iterator` and hands `scan` the native iterator pointer.
pub(crate) fn with_block_iterator<R>(
    iterator: &mut dyn MemoryBlockIterator,
    scan: impl FnOnce(*mut YrMemoryBlockIterator) -> R,
) -> R {
    let mut container = MemoryBlockIteratorContainer::new(iterator);
    let raw: *mut MemoryBlockIteratorContainer = &mut container;
    let guard = HandleGuard::register(callback_data(), EntryKind::BlockIterator, unsafe { &mut *raw });
    let native = unsafe { (*raw).bind(guard.token()) };
    let result = scan(native);
    drop(guard);
    result
}

/// Blocks over an in-memory list, mostly useful for tests and for callers
/// that already hold the data.
#[derive(Debug, Default)]
pub struct BlockList {
    blocks: Vec<(u64, Vec<u8>)>,
    position: usize,
    file_size: Option<u64>,
}

impl BlockList {
    pub fn new(blocks: Vec<(u64, Vec<u8>)>) -> Self {
        Self {
            blocks,
            position: 0,
            file_size: None,
        }
    }

    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    fn block_at(&self, idx: usize) -> Option<MemoryBlock> {
        self.blocks.get(idx).map(|(base, data)| MemoryBlock::from_bytes(*base, data.clone()))
    }
}

impl MemoryBlockIterator for BlockList {
    fn first(&mut self) -> Option<MemoryBlock> {
        self.position = 0;
        self.block_at(0)
    }

    fn next(&mut self) -> Option<MemoryBlock> {
        self.position += 1;
        self.block_at(self.position)
    }

    fn as_file_size(&mut self) -> Option<&mut dyn MemoryBlockIteratorWithFilesize> {
        if self.file_size.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl MemoryBlockIteratorWithFilesize for BlockList {
    fn file_size(&mut self) -> u64 {
        self.file_size.unwrap_or(0)
    }
}
