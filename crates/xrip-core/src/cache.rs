//! Session-scoped decode de-duplication.
//!
//! Three independently locked shards (textures, materials, models) map
//! a content pointer or hash to a weakly held decoded object. Entries
//! expire when the importer drops its strong reference and are purged
//! lazily on the next lookup. Compute happens at most once per live
//! key: the first caller installs an in-flight marker and later callers
//! wait on it instead of decoding again.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, Weak};

use crate::error::Result;
use crate::scene::{Material, Model, Texture};

enum Slot<T> {
    Ready(Weak<T>),
    InFlight,
}

struct Shard<T> {
    entries: Mutex<HashMap<u64, Slot<T>>>,
    published: Condvar,
}

impl<T> Default for Shard<T> {
    fn default() -> Self {
        Shard {
            entries: Mutex::new(HashMap::new()),
            published: Condvar::new(),
        }
    }
}

impl<T> Shard<T> {
    fn get_or_compute<F>(&self, key: u64, compute: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        let mut entries = self.entries.lock().unwrap();
        loop {
            match entries.get(&key) {
                Some(Slot::Ready(weak)) => {
                    if let Some(value) = weak.upgrade() {
                        return Ok(value);
                    }
                    // Stale entry; this caller recomputes.
                    break;
                }
                Some(Slot::InFlight) => {
                    entries = self.published.wait(entries).unwrap();
                }
                None => break,
            }
        }
        entries.insert(key, Slot::InFlight);
        drop(entries);

        let result = compute();

        let mut entries = self.entries.lock().unwrap();
        match &result {
            Ok(value) => {
                entries.insert(key, Slot::Ready(Arc::downgrade(value)));
            }
            Err(_) => {
                // Waiters retry the compute themselves.
                entries.remove(&key);
            }
        }
        drop(entries);
        self.published.notify_all();
        result
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[derive(Default)]
pub struct DedupCache {
    textures: Shard<Texture>,
    materials: Shard<Material>,
    models: Shard<Model>,
}

impl DedupCache {
    pub fn new() -> DedupCache {
        DedupCache::default()
    }

    pub fn texture<F>(&self, key: u64, compute: F) -> Result<Arc<Texture>>
    where
        F: FnOnce() -> Result<Arc<Texture>>,
    {
        self.textures.get_or_compute(key, compute)
    }

    pub fn material<F>(&self, key: u64, compute: F) -> Result<Arc<Material>>
    where
        F: FnOnce() -> Result<Arc<Material>>,
    {
        self.materials.get_or_compute(key, compute)
    }

    pub fn model<F>(&self, key: u64, compute: F) -> Result<Arc<Model>>
    where
        F: FnOnce() -> Result<Arc<Model>>,
    {
        self.models.get_or_compute(key, compute)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_compute_runs_once_and_returns_same_arc() {
        let cache = DedupCache::new();
        let calls = AtomicUsize::new(0);
        let make = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Material {
                hash: 42,
                ..Default::default()
            }))
        };
        let first = cache.material(42, make).unwrap();
        let second = cache
            .material(42, || panic!("second lookup must hit the cache"))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_stale_entry_recomputed_after_drop() {
        let cache = DedupCache::new();
        let first = cache
            .texture(7, || Ok(Arc::new(Texture::default())))
            .unwrap();
        drop(first);
        let calls = AtomicUsize::new(0);
        cache
            .texture(7, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Texture::default()))
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_compute_leaves_no_entry() {
        let cache = DedupCache::new();
        let err = cache.model(9, || Err(Error::MalformedAsset("bad header".into())));
        assert!(err.is_err());
        let ok = cache.model(9, || Ok(Arc::new(Model::default())));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_concurrent_lookups_share_one_compute() {
        let cache = Arc::new(DedupCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    cache
                        .material(1, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            Ok(Arc::new(Material::default()))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for pair in results.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
    }
}
