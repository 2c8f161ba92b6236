//! Hash-to-name resolution against a local lookup file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;

/// Local name index: one `hex,name` pair per line. Hashes without an
/// entry fall back to a typed hex name.
#[derive(Debug, Default)]
pub struct NameIndex {
    map: HashMap<u64, String>,
}

impl NameIndex {
    pub fn empty() -> NameIndex {
        NameIndex::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<NameIndex> {
        let content = fs::read_to_string(&path)?;
        let mut map = HashMap::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((hex, name)) = line.split_once(',') else {
                warn!("Name index line {} has no separator", line_no + 1);
                continue;
            };
            let hex = hex.trim().trim_start_matches("0x");
            match u64::from_str_radix(hex, 16) {
                Ok(hash) => {
                    map.insert(hash, name.trim().to_string());
                }
                Err(_) => warn!("Name index line {}: bad hash {hex:?}", line_no + 1),
            }
        }
        debug!("Loaded {} name index entries", map.len());
        Ok(NameIndex { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Resolve `hash` to its known name, or `{prefix}_{hash:x}`.
    pub fn resolve(&self, hash: u64, prefix: &str) -> String {
        match self.map.get(&hash) {
            Some(name) => name.clone(),
            None => format!("{prefix}_{hash:x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# comment").unwrap();
        writeln!(f, "0x1a2b,mdl_barrel").unwrap();
        writeln!(f, "ff00,i_rust_normal").unwrap();
        writeln!(f, "not a line").unwrap();
        writeln!(f, "zzzz,bad_hash").unwrap();

        let index = NameIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.resolve(0x1A2B, "xmodel"), "mdl_barrel");
        assert_eq!(index.resolve(0xFF00, "ximage"), "i_rust_normal");
        assert_eq!(index.resolve(0xDEAD, "xmodel"), "xmodel_dead");
    }
}
