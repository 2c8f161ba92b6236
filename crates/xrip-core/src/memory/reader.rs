use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An address inside the attached process.
///
/// Remote pointers are opaque outside this module: they are never
/// dereferenced directly, only handed to a [`ReadMemory`] implementation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotePtr(pub u64);

impl RemotePtr {
    pub const NULL: RemotePtr = RemotePtr(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn offset(self, bytes: u64) -> RemotePtr {
        RemotePtr(self.0.wrapping_add(bytes))
    }

    /// Address of element `index` in an array of `stride`-byte records.
    pub fn index(self, index: u64, stride: u64) -> RemotePtr {
        RemotePtr(self.0.wrapping_add(index.wrapping_mul(stride)))
    }
}

impl fmt::Debug for RemotePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemotePtr({:#x})", self.0)
    }
}

impl fmt::Display for RemotePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Chunk size used when scanning for a string terminator.
const STRING_CHUNK: usize = 128;

/// Synchronous reads against an attached process's address space.
///
/// `read_into` is the single required primitive. All reads are blocking
/// and side-effect free. Implementations report an invalid or vanished
/// handle as [`Error::ProcessAccess`] (fatal) and an unmapped address as
/// [`Error::ReadFault`] (recoverable; callers skip the affected part).
pub trait ReadMemory: Send + Sync {
    fn read_into(&self, addr: RemotePtr, buf: &mut [u8]) -> Result<()>;

    /// Zero-wait liveness check on the target process.
    fn is_alive(&self) -> bool;

    fn read_bytes(&self, addr: RemotePtr, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(addr, &mut buf)?;
        Ok(buf)
    }

    fn read_u8(&self, addr: RemotePtr) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_into(addr, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&self, addr: RemotePtr) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_into(addr, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&self, addr: RemotePtr) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&self, addr: RemotePtr) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(addr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_f32(&self, addr: RemotePtr) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(addr)?))
    }

    fn read_ptr(&self, addr: RemotePtr) -> Result<RemotePtr> {
        Ok(RemotePtr(self.read_u64(addr)?))
    }

    /// Read a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Scans forward in small chunks so a terminator near the start does
    /// not require the whole range to be mapped. A fault after the first
    /// chunk truncates rather than fails.
    fn read_string(&self, addr: RemotePtr, max_len: usize) -> Result<String> {
        let mut out: Vec<u8> = Vec::new();
        let mut cursor = 0usize;
        while cursor < max_len {
            let want = STRING_CHUNK.min(max_len - cursor);
            let mut chunk = vec![0u8; want];
            match self.read_into(addr.offset(cursor as u64), &mut chunk) {
                Ok(()) => {}
                Err(e) if cursor == 0 => return Err(e),
                Err(Error::ReadFault { .. }) => break,
                Err(e) => return Err(e),
            }
            if let Some(pos) = memchr::memchr(0, &chunk) {
                out.extend_from_slice(&chunk[..pos]);
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            out.extend_from_slice(&chunk);
            cursor += want;
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// [`ReadMemory`] over a local byte buffer, treating addresses as
/// offsets. Decoders written against remote memory (face tables) run
/// unchanged over an already-fetched geometry blob.
pub struct SliceReader<'a>(pub &'a [u8]);

impl ReadMemory for SliceReader<'_> {
    fn read_into(&self, addr: RemotePtr, buf: &mut [u8]) -> Result<()> {
        let start = addr.0 as usize;
        let src = self
            .0
            .get(start..start + buf.len())
            .ok_or(Error::ReadFault { address: addr.0 })?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::mock::MockMemoryBuilder;

    #[test]
    fn test_remote_ptr_arithmetic() {
        let p = RemotePtr(0x1000);
        assert_eq!(p.offset(0x10).0, 0x1010);
        assert_eq!(p.index(3, 8).0, 0x1018);
        assert!(RemotePtr::NULL.is_null());
        assert_eq!(format!("{}", p), "0x1000");
    }

    #[test]
    fn test_read_scalars() {
        let mem = MockMemoryBuilder::new()
            .bytes(0x100, &0xDEADBEEFu32.to_le_bytes())
            .bytes(0x200, &1.5f32.to_le_bytes())
            .build();
        assert_eq!(mem.read_u32(RemotePtr(0x100)).unwrap(), 0xDEADBEEF);
        assert_eq!(mem.read_u16(RemotePtr(0x100)).unwrap(), 0xBEEF);
        assert_eq!(mem.read_f32(RemotePtr(0x200)).unwrap(), 1.5);
        assert!(mem.read_u64(RemotePtr(0x5000)).is_err());
    }

    #[test]
    fn test_read_string_terminated() {
        let mem = MockMemoryBuilder::new()
            .bytes(0x100, b"mdl_crate_large\0garbage")
            .build();
        let s = mem.read_string(RemotePtr(0x100), 256).unwrap();
        assert_eq!(s, "mdl_crate_large");
    }

    #[test]
    fn test_read_string_truncates_at_fault_boundary() {
        // Terminator never appears; the mapped region simply ends.
        let mut long = vec![b'a'; STRING_CHUNK];
        long.extend_from_slice(b"bbb");
        let mem = MockMemoryBuilder::new().bytes(0x100, &long).build();
        let s = mem.read_string(RemotePtr(0x100), 4096).unwrap();
        assert!(s.starts_with("aaa"));
        assert!(s.len() <= long.len());
    }

    #[test]
    fn test_read_string_unmapped_start_faults() {
        let mem = MockMemoryBuilder::new().build();
        assert!(matches!(
            mem.read_string(RemotePtr(0x100), 64),
            Err(Error::ReadFault { .. })
        ));
    }
}
