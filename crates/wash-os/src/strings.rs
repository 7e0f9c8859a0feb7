//! NUL-terminated string marshalling between host and process memory.

use crate::error::{OsError, OsResult};
use crate::memory::MemoryView;

/// Read the NUL-terminated string at `ptr`.
///
/// The scan never leaves memory: a pointer past the end is out of bounds and
/// a string that reaches the end without a terminator is unterminated.
/// Invalid UTF-8 is replaced, not rejected.
pub fn load_str<M: AsRef<[u8]> + ?Sized>(memory: &M, ptr: u32) -> OsResult<String> {
    let bytes = memory.as_ref();
    let start = ptr as usize;
    if start >= bytes.len() {
        return Err(OsError::OutOfBounds {
            addr: ptr,
            len: 1,
            size: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
        });
    }
    let len = bytes[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(OsError::Unterminated { addr: ptr })?;
    Ok(String::from_utf8_lossy(&bytes[start..start + len]).into_owned())
}

/// Copy `s` plus a terminator into freshly allocated process memory.
pub fn write_str(memory: &mut MemoryView<'_>, s: &str) -> OsResult<u32> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);

    let len = u32::try_from(bytes.len()).map_err(|_| OsError::OutOfMemory {
        requested: u32::MAX,
        available: memory.available(),
    })?;
    let ptr = memory.alloc(len)?;
    memory.write(ptr, &bytes)?;
    Ok(ptr)
}

/// Split a buffer of contiguously packed NUL-terminated strings.
///
/// Every string, including the last, must be terminated inside the buffer.
pub fn split_packed(buf: &[u8], base: u32) -> OsResult<Vec<String>> {
    let mut strings = Vec::new();
    let mut consumed = 0;
    while consumed < buf.len() {
        let rest = &buf[consumed..];
        let len = rest.iter().position(|&b| b == 0).ok_or(OsError::Unterminated {
            addr: base.saturating_add(consumed as u32),
        })?;
        strings.push(String::from_utf8_lossy(&rest[..len]).into_owned());
        consumed += len + 1;
    }
    Ok(strings)
}

/// Pack strings as contiguous NUL-terminated byte strings.
pub fn pack(strings: &[String]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(strings.iter().map(|s| s.len() + 1).sum());
    for s in strings {
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
    }
    buf
}
