// Mon Feb 16 2026 - Alex

//! Drives the engine's `YR_STREAM` read/write primitives from
//! `std::io::Read` and `std::io::Write`.
//!
//! The engine moves data in records: `nmemb` records of `size` bytes each.
//! Both directions report how many whole records completed; a record that
//! was only partly transferred is not counted.
//!
//! A record is filled with as many `read` calls as it takes. A short read is
//! not end of data: only `Ok(0)` or an error other than `Interrupted` stops
//! the transfer, so readers that hand out a few bytes at a time (pipes,
//! sockets) still deliver whole records.

use crate::handle::{self, callback_data, EntryKind, HandleGuard};
use crate::native::abi::YrStream;
use libc::c_void;
use log::{trace, warn};
use std::io::{ErrorKind, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

pub enum StreamAdapter<'a> {
    Reader(&'a mut dyn Read),
    Writer(&'a mut dyn Write),
}

fn fill_record(reader: &mut dyn Read, record: &mut [u8]) -> bool {
    let mut filled = 0;
    while filled < record.len() {
        match reader.read(&mut record[filled..]) {
            Ok(0) => return false,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                trace!("stream read failed: {}", e);
                return false;
            }
        }
    }
    true
}

fn drain_record(writer: &mut dyn Write, record: &[u8]) -> bool {
    let mut written = 0;
    while written < record.len() {
        match writer.write(&record[written..]) {
            Ok(0) => return false,
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                trace!("stream write failed: {}", e);
                return false;
            }
        }
    }
    true
}

pub(crate) unsafe extern "C" fn stream_read(ptr: *mut c_void, size: usize, nmemb: usize, user_data: *mut c_void) -> usize {
    if size == 0 || nmemb == 0 {
        return nmemb;
    }
    let entry = handle::lookup(user_data, EntryKind::Reader);
    let reader = match &mut *(entry.as_ptr() as *mut StreamAdapter) {
        StreamAdapter::Reader(reader) => &mut **reader,
        StreamAdapter::Writer(_) => return 0,
    };

    let out = ptr as *mut u8;
    let transfer = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut scratch = vec![0u8; size];
        for i in 0..nmemb {
            if !fill_record(reader, &mut scratch) {
                return i;
            }
            ptr::copy_nonoverlapping(scratch.as_ptr(), out.add(i * size), size);
        }
        nmemb
    }));
    transfer.unwrap_or_else(|_| {
        warn!("stream reader panicked");
        0
    })
}

pub(crate) unsafe extern "C" fn stream_write(ptr: *const c_void, size: usize, nmemb: usize, user_data: *mut c_void) -> usize {
    if size == 0 || nmemb == 0 {
        return nmemb;
    }
    let entry = handle::lookup(user_data, EntryKind::Writer);
    let writer = match &mut *(entry.as_ptr() as *mut StreamAdapter) {
        StreamAdapter::Writer(writer) => &mut **writer,
        StreamAdapter::Reader(_) => return 0,
    };

    let input = ptr as *const u8;
    let transfer = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut scratch = vec![0u8; size];
        for i in 0..nmemb {
            ptr::copy_nonoverlapping(input.add(i * size), scratch.as_mut_ptr(), size);
            if !drain_record(writer, &scratch) {
                return i;
            }
        }
        nmemb
    }));
    transfer.unwrap_or_else(|_| {
        warn!("stream writer panicked");
        0
    })
}

/// Registers `reader` and hands `f` a read-only `YR_STREAM`.
pub(crate) fn with_reader<R>(reader: &mut dyn Read, f: impl FnOnce(&mut YrStream) -> R) -> R {
    let mut adapter = StreamAdapter::Reader(reader);
    let guard = HandleGuard::register(callback_data(), EntryKind::Reader, &mut adapter);
    let mut stream = YrStream {
        user_data: guard.token(),
        read: Some(stream_read),
        write: None,
    };
    f(&mut stream)
}

/// Registers `writer` and hands `f` a write-only `YR_STREAM`.
pub(crate) fn with_writer<R>(writer: &mut dyn Write, f: impl FnOnce(&mut YrStream) -> R) -> R {
    let mut adapter = StreamAdapter::Writer(writer);
    let guard = HandleGuard::register(callback_data(), EntryKind::Writer, &mut adapter);
    let mut stream = YrStream {
        user_data: guard.token(),
        read: None,
        write: Some(stream_write),
    };
    f(&mut stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `step` bytes per call and fails once with
    /// `Interrupted`.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
        interrupted: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct Full;

    impl Write for Full {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_whole_records() {
        let mut reader = Trickle { data: (0u8..10).collect(), pos: 0, step: 3, interrupted: false };
        let mut out = [0u8; 12];
        let count = with_reader(&mut reader, |stream| unsafe {
            (stream.read.unwrap())(out.as_mut_ptr() as *mut c_void, 4, 3, stream.user_data)
        });
        assert_eq!(count, 2);
        assert_eq!(&out[..8], &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_write_records() {
        let mut sink = Vec::new();
        let data = b"abcdef";
        let count = with_writer(&mut sink, |stream| unsafe {
            (stream.write.unwrap())(data.as_ptr() as *const c_void, 2, 3, stream.user_data)
        });
        assert_eq!(count, 3);
        assert_eq!(sink, b"abcdef");
    }

    #[test]
    fn test_zero_length_write_stops() {
        let mut sink = Full;
        let count = with_writer(&mut sink, |stream| unsafe {
            (stream.write.unwrap())(b"ab".as_ptr() as *const c_void, 1, 2, stream.user_data)
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn test_empty_request() {
        let mut reader = Cursor::new(Vec::new());
        let count = with_reader(&mut reader, |stream| unsafe {
            (stream.read.unwrap())(ptr::null_mut(), 0, 5, stream.user_data)
        });
        assert_eq!(count, 5);
    }
}
