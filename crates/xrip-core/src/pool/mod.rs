//! Linked asset-pool enumeration.
//!
//! The loader stub publishes a pool directory; each entry roots a
//! linked list of asset nodes for one type. The walker follows the
//! list in process order, names each node through the local name
//! index, and hands descriptors to a callback. The caller learns the
//! final node count from the return value, which is fixed before any
//! completion signal can be observed.

pub mod names;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::assets::{AssetDescriptor, AssetStatus, AssetType};
use crate::error::{Error, Result};
use crate::games::layout::{
    HASH_MASK, NODE_HEADER, NODE_NEXT, NODE_TEMP, POOL_ENTRY_STRIDE, PoolIds,
};
use crate::memory::{ReadMemory, RemotePtr};

pub use names::NameIndex;

#[derive(Debug, Clone, Copy)]
pub struct PoolDefinition {
    pub identifier: u32,
    pub asset_type: AssetType,
}

/// The walkable pools for one build's pool numbering.
pub fn pool_definitions(pools: &PoolIds) -> Vec<PoolDefinition> {
    vec![
        PoolDefinition {
            identifier: pools.model,
            asset_type: AssetType::Model,
        },
        PoolDefinition {
            identifier: pools.image,
            asset_type: AssetType::Image,
        },
        PoolDefinition {
            identifier: pools.material,
            asset_type: AssetType::Material,
        },
        PoolDefinition {
            identifier: pools.anim,
            asset_type: AssetType::Anim,
        },
        PoolDefinition {
            identifier: pools.sound,
            asset_type: AssetType::Sound,
        },
    ]
}

pub struct PoolWalker {
    reader: Arc<dyn ReadMemory>,
    pools_addr: RemotePtr,
    names: Arc<NameIndex>,
}

impl PoolWalker {
    pub fn new(reader: Arc<dyn ReadMemory>, pools_addr: RemotePtr, names: Arc<NameIndex>) -> Self {
        PoolWalker {
            reader,
            pools_addr,
            names,
        }
    }

    /// Walk one pool, invoking `on_asset` per discovered node. Returns
    /// the number of descriptors emitted.
    ///
    /// An unreadable node aborts the remainder of this pool with a
    /// warning; a lost process escalates. Cancellation stops between
    /// nodes without counting as a failure.
    pub fn walk<F>(
        &self,
        def: &PoolDefinition,
        cancel: &AtomicBool,
        mut on_asset: F,
    ) -> Result<u64>
    where
        F: FnMut(AssetDescriptor),
    {
        let pool_entry = self
            .pools_addr
            .index(def.identifier as u64, POOL_ENTRY_STRIDE);
        let root = self.reader.read_ptr(pool_entry)?;
        if root.is_null() {
            debug!("Pool {} ({}) is empty", def.identifier, def.asset_type);
            return Ok(0);
        }

        let mut count = 0u64;
        let mut node = root;
        while !node.is_null() {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            let (header, temp, next) = match self.read_node(node) {
                Ok(fields) => fields,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "Pool {} ({}): node at {node} unreadable, stopping: {e}",
                        def.identifier, def.asset_type
                    );
                    break;
                }
            };

            if !header.is_null() {
                match self.describe(def.asset_type, header, temp) {
                    Ok(descriptor) => {
                        count += 1;
                        on_asset(descriptor);
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("Pool {} ({}): asset at {header} skipped: {e}",
                            def.identifier, def.asset_type);
                    }
                }
            }
            node = next;
        }
        debug!(
            "Pool {} ({}): {count} assets discovered",
            def.identifier, def.asset_type
        );
        Ok(count)
    }

    fn read_node(&self, node: RemotePtr) -> Result<(RemotePtr, u64, RemotePtr)> {
        Ok((
            self.reader.read_ptr(node.offset(NODE_HEADER))?,
            self.reader.read_u64(node.offset(NODE_TEMP))?,
            self.reader.read_ptr(node.offset(NODE_NEXT))?,
        ))
    }

    fn describe(
        &self,
        asset_type: AssetType,
        header: RemotePtr,
        temp: u64,
    ) -> Result<AssetDescriptor> {
        let hash = self.reader.read_u64(header)? & HASH_MASK;
        Ok(AssetDescriptor {
            asset_type,
            name: self.names.resolve(hash, asset_type.name_prefix()),
            pointer: header,
            size: None,
            status: if temp == 1 {
                AssetStatus::Placeholder
            } else {
                AssetStatus::Loaded
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::layout::NODE_STRIDE;
    use crate::memory::MockMemoryBuilder;

    const POOLS: u64 = 0x100;
    const NODES: u64 = 0x2000;
    const HEADERS: u64 = 0x9000;

    fn node_bytes(header: u64, temp: u64, next: u64) -> Vec<u8> {
        let mut buf = vec![0u8; NODE_STRIDE as usize];
        buf[0..8].copy_from_slice(&header.to_le_bytes());
        buf[8..16].copy_from_slice(&temp.to_le_bytes());
        buf[16..24].copy_from_slice(&next.to_le_bytes());
        buf
    }

    fn walker(reader: crate::memory::MockMemoryReader) -> PoolWalker {
        PoolWalker::new(Arc::new(reader), RemotePtr(POOLS), Arc::new(NameIndex::empty()))
    }

    fn def() -> PoolDefinition {
        PoolDefinition {
            identifier: 2,
            asset_type: AssetType::Model,
        }
    }

    #[test]
    fn test_null_root_discovers_nothing() {
        let mem = MockMemoryBuilder::new()
            .u64(POOLS + 2 * POOL_ENTRY_STRIDE, 0)
            .build();
        let mut seen = 0;
        let count = walker(mem)
            .walk(&def(), &AtomicBool::new(false), |_| seen += 1)
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(seen, 0);
    }

    #[test]
    fn test_walks_list_in_order_with_statuses() {
        // Three nodes; middle one is a temp slot, last has a null
        // header and is not counted.
        let mut nodes = node_bytes(HEADERS, 0, NODES + NODE_STRIDE);
        nodes.extend(node_bytes(HEADERS + 8, 1, NODES + 2 * NODE_STRIDE));
        nodes.extend(node_bytes(0, 0, 0));

        let mem = MockMemoryBuilder::new()
            .u64(POOLS + 2 * POOL_ENTRY_STRIDE, NODES)
            .bytes(NODES, &nodes)
            .u64(HEADERS, 0xAAA)
            .u64(HEADERS + 8, 0xBBB)
            .build();

        let mut seen = Vec::new();
        let count = walker(mem)
            .walk(&def(), &AtomicBool::new(false), |d| seen.push(d))
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(seen[0].name, "xmodel_aaa");
        assert_eq!(seen[0].status, AssetStatus::Loaded);
        assert_eq!(seen[1].name, "xmodel_bbb");
        assert_eq!(seen[1].status, AssetStatus::Placeholder);
    }

    #[test]
    fn test_unreadable_node_stops_pool_without_error() {
        // First node points at an unmapped second node.
        let nodes = node_bytes(HEADERS, 0, 0x7777_0000);
        let mem = MockMemoryBuilder::new()
            .u64(POOLS + 2 * POOL_ENTRY_STRIDE, NODES)
            .bytes(NODES, &nodes)
            .u64(HEADERS, 0xAAA)
            .build();

        let count = walker(mem)
            .walk(&def(), &AtomicBool::new(false), |_| {})
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_cancellation_between_nodes() {
        let mut nodes = node_bytes(HEADERS, 0, NODES + NODE_STRIDE);
        nodes.extend(node_bytes(HEADERS, 0, 0));
        let mem = MockMemoryBuilder::new()
            .u64(POOLS + 2 * POOL_ENTRY_STRIDE, NODES)
            .bytes(NODES, &nodes)
            .u64(HEADERS, 0xAAA)
            .build();

        let cancel = AtomicBool::new(true);
        let result = walker(mem).walk(&def(), &cancel, |_| {});
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_lost_process_escalates() {
        let mem = MockMemoryBuilder::new()
            .u64(POOLS + 2 * POOL_ENTRY_STRIDE, NODES)
            .bytes(NODES, &node_bytes(HEADERS, 0, 0))
            .u64(HEADERS, 0xAAA)
            .build();
        mem.set_alive(false);
        let result = walker(mem).walk(&def(), &AtomicBool::new(false), |_| {});
        assert!(matches!(result, Err(Error::ProcessAccess(_))));
    }
}
