//! In-memory fake of the remote process for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, RemotePtr};

pub struct MockMemoryReader {
    regions: BTreeMap<u64, Vec<u8>>,
    alive: AtomicBool,
}

impl MockMemoryReader {
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    fn locate(&self, addr: u64, len: usize) -> Option<(&Vec<u8>, usize)> {
        let (base, region) = self.regions.range(..=addr).next_back()?;
        let start = (addr - base) as usize;
        if start + len <= region.len() {
            Some((region, start))
        } else {
            None
        }
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_into(&self, addr: RemotePtr, buf: &mut [u8]) -> Result<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::ProcessAccess("target process exited".into()));
        }
        match self.locate(addr.0, buf.len()) {
            Some((region, start)) => {
                buf.copy_from_slice(&region[start..start + buf.len()]);
                Ok(())
            }
            None => Err(Error::ReadFault { address: addr.0 }),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockMemoryBuilder {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(mut self, addr: u64, data: &[u8]) -> Self {
        self.regions.insert(addr, data.to_vec());
        self
    }

    pub fn u16(self, addr: u64, value: u16) -> Self {
        self.bytes(addr, &value.to_le_bytes())
    }

    pub fn u32(self, addr: u64, value: u32) -> Self {
        self.bytes(addr, &value.to_le_bytes())
    }

    pub fn u64(self, addr: u64, value: u64) -> Self {
        self.bytes(addr, &value.to_le_bytes())
    }

    /// NUL-terminated string region.
    pub fn str_z(self, addr: u64, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.bytes(addr, &data)
    }

    pub fn build(self) -> MockMemoryReader {
        MockMemoryReader {
            regions: self.regions,
            alive: AtomicBool::new(true),
        }
    }
}
