// Mon Feb 16 2026 - Alex

//! Built-in block sources used by the buffer, file and process scan entry
//! points. Each one is exposed to the scanner through the same
//! `YrMemoryBlockIterator` a caller-provided iterator would use.

use crate::native::abi::{YrMemoryBlock, YrMemoryBlockIterator};
use crate::native::error::*;
use libc::{c_int, c_void};
use log::{debug, trace};
use memmap2::Mmap;
use std::fs::File;
use std::ptr;

enum Backing {
    Memory { data: *const u8 },
    Mapped(Mmap),
    #[cfg(target_os = "linux")]
    Process(File),
}

pub struct BlockSource {
    pub iterator: YrMemoryBlockIterator,
    block: YrMemoryBlock,
    regions: Vec<(u64, usize)>,
    current: usize,
    backing: Backing,
    scratch: Vec<u8>,
    file_size: Option<u64>,
}

impl BlockSource {
    fn boxed(backing: Backing, regions: Vec<(u64, usize)>, file_size: Option<u64>) -> Box<Self> {
        let mut source = Box::new(Self {
            iterator: YrMemoryBlockIterator {
                context: ptr::null_mut(),
                first: Some(source_first),
                next: Some(source_next),
                file_size: if file_size.is_some() { Some(source_file_size) } else { None },
                last_error: ERROR_SUCCESS,
            },
            block: YrMemoryBlock::default(),
            regions,
            current: 0,
            backing,
            scratch: Vec::new(),
            file_size,
        });
        let context = &mut *source as *mut BlockSource as *mut c_void;
        source.iterator.context = context;
        source.block.context = context;
        source
    }

    /// Single block over caller-owned memory. The memory must outlive the scan.
    pub fn memory(data: *const u8, len: usize) -> Box<Self> {
        Self::boxed(Backing::Memory { data }, vec![(0, len)], Some(len as u64))
    }

    /// Maps `file` read-only. Empty files are not mapped and scan as a single
    /// empty block.
    pub fn file(file: &File) -> Result<Box<Self>, c_int> {
        let len = file.metadata().map_err(|_| ERROR_COULD_NOT_OPEN_FILE)?.len();
        if len == 0 {
            return Ok(Self::memory(ptr::null(), 0));
        }
        let mmap = unsafe { Mmap::map(file) }.map_err(|_| ERROR_COULD_NOT_MAP_FILE)?;
        let len = mmap.len();
        debug!("mapped {} bytes for scanning", len);
        Ok(Self::boxed(Backing::Mapped(mmap), vec![(0, len)], Some(len as u64)))
    }

    #[cfg(target_os = "linux")]
    pub fn process(pid: c_int) -> Result<Box<Self>, c_int> {
        let maps = std::fs::read_to_string(format!("/proc/{}/maps", pid)).map_err(|_| ERROR_COULD_NOT_ATTACH_TO_PROCESS)?;
        let mem = File::open(format!("/proc/{}/mem", pid)).map_err(|_| ERROR_COULD_NOT_ATTACH_TO_PROCESS)?;
        let regions = parse_maps(&maps);
        debug!("process {}: {} readable regions", pid, regions.len());
        Ok(Self::boxed(Backing::Process(mem), regions, None))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn process(_pid: c_int) -> Result<Box<Self>, c_int> {
        Err(ERROR_COULD_NOT_ATTACH_TO_PROCESS)
    }

    fn load(&mut self) -> *mut YrMemoryBlock {
        match self.regions.get(self.current) {
            Some(&(base, size)) => {
                self.block.base = base;
                self.block.size = size;
                self.block.fetch_data = Some(source_fetch);
                &mut self.block
            }
            None => ptr::null_mut(),
        }
    }

    fn fetch(&mut self) -> *const u8 {
        let (base, size) = (self.block.base, self.block.size);
        match &self.backing {
            Backing::Memory { data } => *data,
            Backing::Mapped(mmap) => mmap.as_ptr(),
            #[cfg(target_os = "linux")]
            Backing::Process(mem) => {
                use std::os::unix::io::AsRawFd;
                if base > i64::MAX as u64 {
                    return ptr::null();
                }
                self.scratch.resize(size, 0);
                let mut done = 0usize;
                while done < size {
                    let n = unsafe {
                        libc::pread(
                            mem.as_raw_fd(),
                            self.scratch[done..].as_mut_ptr() as *mut c_void,
                            size - done,
                            (base + done as u64) as libc::off_t,
                        )
                    };
                    if n <= 0 {
                        trace!("region {:#x} unreadable after {} bytes", base, done);
                        return ptr::null();
                    }
                    done += n as usize;
                }
                self.scratch.as_ptr()
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn parse_maps(maps: &str) -> Vec<(u64, usize)> {
    maps.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let range = fields.next()?;
            let perms = fields.next()?;
            if !perms.starts_with('r') || line.ends_with("[vvar]") {
                return None;
            }
            let (start, end) = range.split_once('-')?;
            let start = u64::from_str_radix(start, 16).ok()?;
            let end = u64::from_str_radix(end, 16).ok()?;
            if end <= start {
                return None;
            }
            Some((start, (end - start) as usize))
        })
        .collect()
}

unsafe extern "C" fn source_first(iterator: *mut YrMemoryBlockIterator) -> *mut YrMemoryBlock {
    let source = &mut *((*iterator).context as *mut BlockSource);
    source.current = 0;
    source.load()
}

unsafe extern "C" fn source_next(iterator: *mut YrMemoryBlockIterator) -> *mut YrMemoryBlock {
    let source = &mut *((*iterator).context as *mut BlockSource);
    source.current += 1;
    source.load()
}

unsafe extern "C" fn source_file_size(iterator: *mut YrMemoryBlockIterator) -> u64 {
    let source = &*((*iterator).context as *const BlockSource);
    source.file_size.unwrap_or(0)
}

unsafe extern "C" fn source_fetch(block: *mut YrMemoryBlock) -> *const u8 {
    let source = &mut *((*block).context as *mut BlockSource);
    source.fetch()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    unsafe fn collect(source: &mut BlockSource) -> Vec<(u64, Vec<u8>)> {
        let iterator = &mut source.iterator as *mut YrMemoryBlockIterator;
        let mut out = Vec::new();
        let mut block = ((*iterator).first.unwrap())(iterator);
        while !block.is_null() {
            let data = ((*block).fetch_data.unwrap())(block);
            let bytes = if data.is_null() { Vec::new() } else { std::slice::from_raw_parts(data, (*block).size).to_vec() };
            out.push(((*block).base, bytes));
            block = ((*iterator).next.unwrap())(iterator);
        }
        out
    }

    #[test]
    fn test_memory_source() {
        let data = b"hello".to_vec();
        let mut source = BlockSource::memory(data.as_ptr(), data.len());
        let blocks = unsafe { collect(&mut source) };
        assert_eq!(blocks, vec![(0, b"hello".to_vec())]);
        let size = unsafe { (source.iterator.file_size.unwrap())(&mut source.iterator) };
        assert_eq!(size, 5);
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"mapped bytes").unwrap();
        let mut source = BlockSource::file(file.as_file()).unwrap();
        let blocks = unsafe { collect(&mut source) };
        assert_eq!(blocks[0].1, b"mapped bytes".to_vec());
    }

    #[test]
    fn test_empty_file_is_not_mapped() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = BlockSource::file(file.as_file()).unwrap();
        let blocks = unsafe { collect(&mut source) };
        assert_eq!(blocks, vec![(0, Vec::new())]);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_parse_maps() {
        let maps = "00400000-00401000 r-xp 00000000 08:01 1 /bin/x\n\
                    00600000-00601000 ---p 00000000 00:00 0\n\
                    7ffd0000-7ffd2000 r--p 00000000 00:00 0 [vvar]\n";
        assert_eq!(parse_maps(maps), vec![(0x400000, 0x1000)]);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_own_process_is_readable() {
        let marker = b"process-source-marker".to_vec();
        let mut source = BlockSource::process(std::process::id() as c_int).unwrap();
        let iterator = &mut source.iterator as *mut YrMemoryBlockIterator;
        let mut found = false;
        unsafe {
            let mut block = ((*iterator).first.unwrap())(iterator);
            while !block.is_null() && !found {
                let data = ((*block).fetch_data.unwrap())(block);
                if !data.is_null() {
                    let bytes = std::slice::from_raw_parts(data, (*block).size);
                    found = bytes.windows(marker.len()).any(|w| w == marker.as_slice());
                }
                block = ((*iterator).next.unwrap())(iterator);
            }
        }
        assert!(found);
    }
}
