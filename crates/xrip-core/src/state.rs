//! Loader-stub state file.
//!
//! The injected loader stub writes a small binary sidecar next to the
//! game executable describing the build it hooked: the 64-bit build
//! tag, the address of the pool directory, the shared string table
//! address, and the game's install directory. Attaching means finding
//! the target process, then parsing this file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::RemotePtr;

/// Relative location of the state file under the process directory.
const STATE_FILE: &str = "Data/current.xst";

/// Published hook state for one attached build.
#[derive(Debug, Clone)]
pub struct LoaderState {
    pub build_id: u64,
    pub pools: RemotePtr,
    pub strings: RemotePtr,
    pub pack_table: RemotePtr,
    pub pack_count: u64,
    pub game_directory: PathBuf,
    pub flags: Vec<String>,
}

impl LoaderState {
    /// Parse the state file found under `process_dir`.
    pub fn locate(process_dir: &Path) -> Result<LoaderState> {
        let path = process_dir.join(STATE_FILE);
        let bytes = fs::read(&path).map_err(|e| {
            warn!("No loader state at {}: {e}", path.display());
            Error::ProcessAccess(format!("loader state file missing: {}", path.display()))
        })?;
        let state = LoaderState::parse(&bytes)?;
        debug!(
            "Loader state: build {:#018x}, pools {}, strings {}",
            state.build_id, state.pools, state.strings
        );
        Ok(state)
    }

    /// Wire layout: build u64, pools u64, strings u64, pack index table
    /// u64 + entry count u64, then a length-prefixed directory string
    /// and a counted list of length-prefixed flag strings. All
    /// little-endian.
    pub fn parse(bytes: &[u8]) -> Result<LoaderState> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let build_id = cursor.u64()?;
        let pools = RemotePtr(cursor.u64()?);
        let strings = RemotePtr(cursor.u64()?);
        let pack_table = RemotePtr(cursor.u64()?);
        let pack_count = cursor.u64()?;
        let game_directory = PathBuf::from(cursor.string()?);
        let flag_count = cursor.u32()?;
        // A corrupt count would otherwise ask for gigabytes of flags.
        if flag_count as usize > bytes.len() {
            return Err(Error::MalformedAsset("loader state flag count".into()));
        }
        let mut flags = Vec::with_capacity(flag_count as usize);
        for _ in 0..flag_count {
            flags.push(cursor.string()?);
        }
        Ok(LoaderState {
            build_id,
            pools,
            strings,
            pack_table,
            pack_count,
            game_directory,
            flags,
        })
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::MalformedAsset("truncated loader state".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| Error::MalformedAsset("loader state string".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::layout::BUILD_MW22;

    fn put_string(buf: &mut Vec<u8>, s: &str) {
        buf.extend((s.len() as u32).to_le_bytes());
        buf.extend(s.as_bytes());
    }

    fn sample() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(BUILD_MW22.to_le_bytes());
        buf.extend(0x7FF6_0000_1000u64.to_le_bytes());
        buf.extend(0x7FF6_0000_2000u64.to_le_bytes());
        buf.extend(0x7FF6_0000_3000u64.to_le_bytes());
        buf.extend(128u64.to_le_bytes());
        put_string(&mut buf, "C:/Games/mw22");
        buf.extend(2u32.to_le_bytes());
        put_string(&mut buf, "sp");
        put_string(&mut buf, "HighRes");
        buf
    }

    #[test]
    fn test_parse_round_trip() {
        let state = LoaderState::parse(&sample()).unwrap();
        assert_eq!(state.build_id, BUILD_MW22);
        assert_eq!(state.pools, RemotePtr(0x7FF6_0000_1000));
        assert_eq!(state.strings, RemotePtr(0x7FF6_0000_2000));
        assert_eq!(state.pack_table, RemotePtr(0x7FF6_0000_3000));
        assert_eq!(state.pack_count, 128);
        assert_eq!(state.game_directory, PathBuf::from("C:/Games/mw22"));
        assert!(state.has_flag("highres"));
        assert!(!state.has_flag("mp"));
    }

    #[test]
    fn test_truncated_state_rejected() {
        let bytes = sample();
        assert!(LoaderState::parse(&bytes[..20]).is_err());
    }

    #[test]
    fn test_locate_reads_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Data")).unwrap();
        std::fs::write(dir.path().join(STATE_FILE), sample()).unwrap();
        let state = LoaderState::locate(dir.path()).unwrap();
        assert_eq!(state.build_id, BUILD_MW22);
    }

    #[test]
    fn test_missing_sidecar_is_process_access() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoaderState::locate(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ProcessAccess(_)));
    }
}
