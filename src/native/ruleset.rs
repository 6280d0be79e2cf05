// Mon Feb 16 2026 - Alex

//! Compiled ruleset lifetime and the saved-rules format.
//!
//! A saved ruleset is a 16 byte header (`YARA`, format version, body length,
//! little endian) followed by the JSON encoded rules. Both travel through a
//! `YR_STREAM` in records of at most `RECORD_SIZE` bytes, one record per
//! read/write call with `count == 1`.

use crate::native::abi::YrStream;
use crate::native::error::*;
use crate::native::rules::YrRules;
use bytes::{Buf, BufMut, BytesMut};
use libc::{c_char, c_int, c_void};
use log::debug;
use std::ffi::CStr;
use std::fs::File;
use std::io::{Read, Write};

const MAGIC: &[u8; 4] = b"YARA";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;
pub const RECORD_SIZE: usize = 4096;

pub unsafe extern "C" fn yr_rules_destroy(rules: *mut YrRules) -> c_int {
    if !rules.is_null() {
        drop(Box::from_raw(rules));
    }
    ERROR_SUCCESS
}

unsafe fn write_record(stream: &YrStream, record: &[u8]) -> Result<(), c_int> {
    let write = stream.write.ok_or(ERROR_INVALID_ARGUMENT)?;
    if write(record.as_ptr() as *const c_void, record.len(), 1, stream.user_data) != 1 {
        return Err(ERROR_WRITING_FILE);
    }
    Ok(())
}

unsafe fn read_record(stream: &YrStream, record: &mut [u8]) -> Result<(), c_int> {
    let read = stream.read.ok_or(ERROR_INVALID_ARGUMENT)?;
    if read(record.as_mut_ptr() as *mut c_void, record.len(), 1, stream.user_data) != 1 {
        return Err(ERROR_CORRUPT_FILE);
    }
    Ok(())
}

unsafe fn save(rules: &YrRules, stream: &YrStream) -> Result<(), c_int> {
    let body = serde_json::to_vec(rules).map_err(|_| ERROR_INTERNAL_FATAL_ERROR)?;

    let mut header = BytesMut::with_capacity(HEADER_SIZE);
    header.put_slice(MAGIC);
    header.put_u32_le(FORMAT_VERSION);
    header.put_u64_le(body.len() as u64);
    write_record(stream, &header)?;

    for record in body.chunks(RECORD_SIZE) {
        write_record(stream, record)?;
    }
    debug!("saved {} rules ({} bytes)", rules.rules.len(), body.len());
    Ok(())
}

unsafe fn load(stream: &YrStream) -> Result<YrRules, c_int> {
    let mut header = [0u8; HEADER_SIZE];
    read_record(stream, &mut header)?;

    let mut header = &header[..];
    if &header[..4] != MAGIC {
        return Err(ERROR_INVALID_FILE);
    }
    header.advance(4);
    if header.get_u32_le() != FORMAT_VERSION {
        return Err(ERROR_UNSUPPORTED_FILE_VERSION);
    }
    let length = usize::try_from(header.get_u64_le()).map_err(|_| ERROR_CORRUPT_FILE)?;

    let mut body = Vec::with_capacity(length.min(RECORD_SIZE * 16));
    let mut record = [0u8; RECORD_SIZE];
    while body.len() < length {
        let n = (length - body.len()).min(RECORD_SIZE);
        read_record(stream, &mut record[..n])?;
        body.extend_from_slice(&record[..n]);
    }

    let rules: YrRules = serde_json::from_slice(&body).map_err(|_| ERROR_CORRUPT_FILE)?;
    debug!("loaded {} rules ({} bytes)", rules.rules.len(), length);
    Ok(rules)
}

pub unsafe extern "C" fn yr_rules_save_stream(rules: *mut YrRules, stream: *mut YrStream) -> c_int {
    if rules.is_null() || stream.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    match save(&*rules, &*stream) {
        Ok(()) => ERROR_SUCCESS,
        Err(code) => code,
    }
}

pub unsafe extern "C" fn yr_rules_load_stream(stream: *mut YrStream, rules: *mut *mut YrRules) -> c_int {
    if rules.is_null() || stream.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    match load(&*stream) {
        Ok(loaded) => {
            *rules = Box::into_raw(Box::new(loaded));
            ERROR_SUCCESS
        }
        Err(code) => code,
    }
}

unsafe extern "C" fn file_read(ptr: *mut c_void, size: usize, count: usize, user_data: *mut c_void) -> usize {
    let file = &mut *(user_data as *mut File);
    let buf = std::slice::from_raw_parts_mut(ptr as *mut u8, size * count);
    match file.read_exact(buf) {
        Ok(()) => count,
        Err(_) => 0,
    }
}

unsafe extern "C" fn file_write(ptr: *const c_void, size: usize, count: usize, user_data: *mut c_void) -> usize {
    let file = &mut *(user_data as *mut File);
    let buf = std::slice::from_raw_parts(ptr as *const u8, size * count);
    match file.write_all(buf) {
        Ok(()) => count,
        Err(_) => 0,
    }
}

fn file_stream(file: &mut File) -> YrStream {
    YrStream {
        user_data: file as *mut File as *mut c_void,
        read: Some(file_read),
        write: Some(file_write),
    }
}

pub unsafe extern "C" fn yr_rules_save(rules: *mut YrRules, filename: *const c_char) -> c_int {
    if filename.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    let path = CStr::from_ptr(filename).to_string_lossy().into_owned();
    let mut file = match File::create(&path) {
        Ok(file) => file,
        Err(_) => return ERROR_COULD_NOT_OPEN_FILE,
    };
    let mut stream = file_stream(&mut file);
    yr_rules_save_stream(rules, &mut stream)
}

pub unsafe extern "C" fn yr_rules_load(filename: *const c_char, rules: *mut *mut YrRules) -> c_int {
    if filename.is_null() {
        return ERROR_INVALID_ARGUMENT;
    }
    let path = CStr::from_ptr(filename).to_string_lossy().into_owned();
    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(_) => return ERROR_COULD_NOT_OPEN_FILE,
    };
    let mut stream = file_stream(&mut file);
    yr_rules_load_stream(&mut stream, rules)
}
