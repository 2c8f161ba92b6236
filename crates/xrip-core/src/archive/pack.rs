//! Local content pack resolution.
//!
//! The attached process publishes a block table mapping 64-bit content
//! keys to byte ranges inside numbered pack files on disk. Entries are
//! 32-byte records:
//!
//! ```text
//! +0  key              u64
//! +8  offset           u64
//! +16 compressed size  u32
//! +20 raw size         u32
//! +24 pack file number u16
//! +26 compression flag u8
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::{ReadMemory, RemotePtr, field};

const ENTRY_STRIDE: u64 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lz4,
    Deflate,
}

impl Compression {
    fn from_flag(flag: u8) -> Result<Compression> {
        match flag {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            2 => Ok(Compression::Deflate),
            other => Err(Error::MalformedAsset(format!(
                "unknown block compression flag {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlockEntry {
    pub offset: u64,
    pub compressed_size: u32,
    pub raw_size: u32,
    pub pack_number: u16,
    pub compression: Compression,
}

/// Key-to-block table read from the attached process at session start.
#[derive(Debug, Default)]
pub struct PackIndex {
    entries: HashMap<u64, BlockEntry>,
}

impl PackIndex {
    /// Read `count` table entries starting at `table`. Records with an
    /// unknown compression flag are skipped with a warning; the rest of
    /// the table still loads.
    pub fn read_from(reader: &dyn ReadMemory, table: RemotePtr, count: u64) -> Result<PackIndex> {
        let mut entries = HashMap::with_capacity(count as usize);
        for i in 0..count {
            let record = reader.read_bytes(table.offset(i * ENTRY_STRIDE), ENTRY_STRIDE as usize)?;
            let key = field::u64_at(&record, 0)?;
            let compression = match Compression::from_flag(field::u8_at(&record, 26)?) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping block table entry {key:#x}: {e}");
                    continue;
                }
            };
            entries.insert(
                key,
                BlockEntry {
                    offset: field::u64_at(&record, 8)?,
                    compressed_size: field::u32_at(&record, 16)?,
                    raw_size: field::u32_at(&record, 20)?,
                    pack_number: field::u16_at(&record, 24)?,
                    compression,
                },
            );
        }
        debug!("Loaded {} block table entries", entries.len());
        Ok(PackIndex { entries })
    }

    pub fn from_entries(entries: HashMap<u64, BlockEntry>) -> PackIndex {
        PackIndex { entries }
    }

    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn get(&self, key: u64) -> Option<&BlockEntry> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// On-disk pack directory plus the block index resolving into it.
pub struct PackStore {
    dir: PathBuf,
    index: PackIndex,
}

impl PackStore {
    pub fn new(dir: impl Into<PathBuf>, index: PackIndex) -> PackStore {
        PackStore {
            dir: dir.into(),
            index,
        }
    }

    pub fn contains(&self, key: u64) -> bool {
        self.index.contains(key)
    }

    fn pack_path(&self, number: u16) -> PathBuf {
        self.dir.join(format!("data_{number}.xpak"))
    }

    /// Extract and decompress the block for `key`. `expected_size`
    /// trims trailing padding when nonzero.
    pub fn extract(&self, key: u64, expected_size: u64) -> Result<Vec<u8>> {
        let entry = self
            .index
            .get(key)
            .copied()
            .ok_or(Error::ArchiveMissing { key })?;

        let raw = read_range(
            &self.pack_path(entry.pack_number),
            entry.offset,
            entry.compressed_size as usize,
        )?;
        let mut block = match entry.compression {
            Compression::None => raw,
            Compression::Lz4 => lz4_flex::block::decompress(&raw, entry.raw_size as usize)
                .map_err(|e| Error::MalformedAsset(format!("lz4 block {key:#x}: {e}")))?,
            Compression::Deflate => {
                let mut out = Vec::with_capacity(entry.raw_size as usize);
                DeflateDecoder::new(raw.as_slice()).read_to_end(&mut out)?;
                out
            }
        };
        if expected_size != 0 && (expected_size as usize) < block.len() {
            block.truncate(expected_size as usize);
        }
        Ok(block)
    }
}

fn read_range(path: &Path, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(
        offset: u64,
        compressed_size: u32,
        raw_size: u32,
        compression: Compression,
    ) -> BlockEntry {
        BlockEntry {
            offset,
            compressed_size,
            raw_size,
            pack_number: 0,
            compression,
        }
    }

    fn store_with(dir: &Path, pack: &[u8], entries: HashMap<u64, BlockEntry>) -> PackStore {
        let mut f = File::create(dir.join("data_0.xpak")).unwrap();
        f.write_all(pack).unwrap();
        PackStore::new(dir, PackIndex::from_entries(entries))
    }

    #[test]
    fn test_extracts_raw_and_lz4_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"streamed geometry payload".repeat(8);
        let compressed = lz4_flex::block::compress(&payload);

        let mut pack = vec![0xAAu8; 16]; // leading junk
        let raw_offset = pack.len() as u64;
        pack.extend_from_slice(b"plain block");
        let lz4_offset = pack.len() as u64;
        pack.extend_from_slice(&compressed);

        let mut entries = HashMap::new();
        entries.insert(1, entry(raw_offset, 11, 11, Compression::None));
        entries.insert(
            2,
            entry(lz4_offset, compressed.len() as u32, payload.len() as u32, Compression::Lz4),
        );
        let store = store_with(dir.path(), &pack, entries);

        assert_eq!(store.extract(1, 0).unwrap(), b"plain block");
        assert_eq!(store.extract(2, 0).unwrap(), payload);
    }

    #[test]
    fn test_missing_key_is_archive_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &[], HashMap::new());
        assert!(matches!(
            store.extract(0xDEAD, 0),
            Err(Error::ArchiveMissing { key: 0xDEAD })
        ));
    }

    #[test]
    fn test_expected_size_trims_padding() {
        let dir = tempfile::tempdir().unwrap();
        let mut entries = HashMap::new();
        entries.insert(7, entry(0, 16, 16, Compression::None));
        let store = store_with(dir.path(), &[0x55u8; 16], entries);
        assert_eq!(store.extract(7, 10).unwrap().len(), 10);
    }

    #[test]
    fn test_index_read_from_remote_table() {
        use crate::memory::MockMemoryBuilder;

        let mut table = Vec::new();
        for (key, flag) in [(0x10u64, 1u8), (0x20, 0), (0x30, 9)] {
            let mut rec = vec![0u8; 32];
            rec[0..8].copy_from_slice(&key.to_le_bytes());
            rec[8..16].copy_from_slice(&0x400u64.to_le_bytes());
            rec[16..20].copy_from_slice(&128u32.to_le_bytes());
            rec[20..24].copy_from_slice(&256u32.to_le_bytes());
            rec[26] = flag;
            table.extend_from_slice(&rec);
        }
        let reader = MockMemoryBuilder::new().bytes(0x5000, &table).build();
        let index = PackIndex::read_from(&reader, RemotePtr(0x5000), 3).unwrap();

        // Entry with the unknown flag is dropped, not fatal.
        assert_eq!(index.len(), 2);
        assert!(index.contains(0x10));
        assert!(!index.contains(0x30));
        assert_eq!(index.get(0x10).unwrap().compression, Compression::Lz4);
    }
}
