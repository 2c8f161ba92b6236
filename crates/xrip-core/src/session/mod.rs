//! Discovery and import orchestration.
//!
//! Discovery runs on one background thread walking every pool in
//! order, streaming descriptors over a channel; completion is the
//! channel closing, so the observed total is fixed by the time the
//! collector returns. Import fans out across a scoped worker pool
//! pulling from a shared cursor, with the scene and summary behind
//! their own locks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use serde::Serialize;
use tracing::{info, warn};

use crate::assets::{AssetDescriptor, AssetStatus, AssetType};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::games::{GameAssetHandler, SurfaceMaterial};
use crate::pool::{PoolDefinition, PoolWalker};
use crate::scene::{Anim, Material, Model, SceneRoot, Sound, Texture};

/// Observational progress boundary; no back-pressure.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, _fraction: f32, _status: &str) {}
    fn on_discovered(&self, _asset: &AssetDescriptor) {}
}

/// No-op observer for headless use.
pub struct SilentObserver;

impl ProgressObserver for SilentObserver {}

/// The external importer boundary: receives decoded intermediates and
/// becomes their owner.
pub trait AssetSink: Send + Sync {
    fn texture(&self, texture: Arc<Texture>) -> Result<()>;
    fn material(&self, material: Arc<Material>) -> Result<()>;
    fn model(&self, model: Model) -> Result<()>;
    fn sound(&self, sound: Sound) -> Result<()>;
    fn anim(&self, anim: Anim) -> Result<()>;
}

#[derive(Debug)]
pub struct DiscoveryReport {
    pub assets: Vec<AssetDescriptor>,
    /// Node count fixed by the walk itself; equals `assets.len()` on a
    /// completed (uncancelled) discovery.
    pub total: u64,
    pub cancelled: bool,
}

/// Walk every pool on a background thread and collect descriptors as
/// they stream in.
pub fn discover(
    walker: Arc<PoolWalker>,
    definitions: Vec<PoolDefinition>,
    cancel: Arc<AtomicBool>,
    observer: Arc<dyn ProgressObserver>,
) -> Result<DiscoveryReport> {
    let (tx, rx) = mpsc::channel::<AssetDescriptor>();
    let pool_count = definitions.len().max(1);

    let walk_observer = Arc::clone(&observer);
    let producer = thread::spawn(move || -> Result<(u64, bool)> {
        let mut total = 0u64;
        for (i, def) in definitions.iter().enumerate() {
            walk_observer.on_progress(
                i as f32 / pool_count as f32,
                &format!("walking {} pool", def.asset_type),
            );
            match walker.walk(def, &cancel, |descriptor| {
                // Receiver outlives the walk; a send only fails if the
                // collector is gone, in which case the count no longer
                // matters.
                let _ = tx.send(descriptor);
            }) {
                Ok(found) => total += found,
                Err(Error::Cancelled) => return Ok((total, true)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Pool {} aborted: {e}", def.asset_type),
            }
        }
        Ok((total, false))
        // tx drops here, closing the channel.
    });

    let mut assets = Vec::new();
    for descriptor in rx {
        observer.on_discovered(&descriptor);
        assets.push(descriptor);
    }

    let (total, cancelled) = match producer.join() {
        Ok(result) => result?,
        Err(_) => return Err(Error::ProcessAccess("discovery worker panicked".into())),
    };
    observer.on_progress(1.0, "discovery complete");
    info!("Discovery complete: {} assets", assets.len());
    Ok(DiscoveryReport {
        assets,
        total,
        cancelled,
    })
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ImportSummary {
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

struct ImportState {
    scene: Mutex<SceneRoot>,
    ok: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    cursor: AtomicUsize,
    fatal: Mutex<Option<Error>>,
}

pub struct ImportSession {
    handler: Arc<dyn GameAssetHandler>,
    config: Config,
    workers: usize,
}

impl ImportSession {
    pub fn new(handler: Arc<dyn GameAssetHandler>, config: Config) -> ImportSession {
        let workers = if config.workers > 0 {
            config.workers
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        };
        ImportSession {
            handler,
            config,
            workers,
        }
    }

    /// Decode a batch of assets across the worker pool and emit the
    /// results to `sink`. Only a lost process aborts the batch.
    pub fn import(
        &self,
        assets: &[AssetDescriptor],
        cancel: &AtomicBool,
        observer: &dyn ProgressObserver,
        sink: &dyn AssetSink,
    ) -> Result<(ImportSummary, SceneRoot)> {
        let state = ImportState {
            scene: Mutex::new(SceneRoot::new()),
            ok: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            cursor: AtomicUsize::new(0),
            fatal: Mutex::new(None),
        };
        let total = assets.len();

        thread::scope(|scope| {
            for _ in 0..self.workers.min(total.max(1)) {
                scope.spawn(|| self.worker(assets, cancel, observer, sink, &state, total));
            }
        });

        if let Some(fatal) = state.fatal.lock().unwrap().take() {
            return Err(fatal);
        }
        let summary = ImportSummary {
            ok: state.ok.load(Ordering::SeqCst),
            failed: state.failed.load(Ordering::SeqCst),
            skipped: state.skipped.load(Ordering::SeqCst),
        };
        info!(
            "Import finished: {} ok, {} failed, {} skipped",
            summary.ok, summary.failed, summary.skipped
        );
        Ok((summary, state.scene.into_inner().unwrap()))
    }

    fn worker(
        &self,
        assets: &[AssetDescriptor],
        cancel: &AtomicBool,
        observer: &dyn ProgressObserver,
        sink: &dyn AssetSink,
        state: &ImportState,
        total: usize,
    ) {
        loop {
            let index = state.cursor.fetch_add(1, Ordering::SeqCst);
            if index >= total {
                return;
            }
            if cancel.load(Ordering::Relaxed) || state.fatal.lock().unwrap().is_some() {
                state.skipped.fetch_add(1, Ordering::SeqCst);
                continue;
            }
            let asset = &assets[index];
            observer.on_progress(index as f32 / total as f32, &asset.name);

            match self.import_one(asset, state, sink) {
                Ok(true) => {
                    state.ok.fetch_add(1, Ordering::SeqCst);
                }
                Ok(false) => {
                    state.skipped.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) if e.is_fatal() => {
                    warn!("Aborting import batch: {e}");
                    *state.fatal.lock().unwrap() = Some(e);
                    state.skipped.fetch_add(1, Ordering::SeqCst);
                }
                Err(Error::UnsupportedBuild(build)) => {
                    warn!("{}: build {build:#x} has no decoder", asset.name);
                    state.skipped.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!("{} failed: {e}", asset.name);
                    state.failed.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    /// Returns Ok(false) when the asset was skipped rather than decoded.
    fn import_one(
        &self,
        asset: &AssetDescriptor,
        state: &ImportState,
        sink: &dyn AssetSink,
    ) -> Result<bool> {
        if asset.status == AssetStatus::Placeholder || !self.config.loads_type(asset.asset_type) {
            return Ok(false);
        }
        match asset.asset_type {
            AssetType::Model => {
                let raw = self.handler.read_model(asset)?;
                let materials = self.handler.surface_materials(&raw)?;
                // Interning is the only step under the scene lock.
                // Geometry decode can block on archive or network reads
                // and runs with the lock released.
                let interned: Vec<SurfaceMaterial> = {
                    let mut scene = state.scene.lock().unwrap();
                    materials
                        .into_iter()
                        .map(|material| match material {
                            Some(m) => {
                                let hash = m.hash;
                                SurfaceMaterial {
                                    index: Some(scene.add_material(m)),
                                    hash,
                                }
                            }
                            None => SurfaceMaterial::default(),
                        })
                        .collect()
                };
                sink.model(self.handler.translate_model(&raw, &interned)?)?;
            }
            AssetType::Image => {
                sink.texture(self.handler.read_image(asset)?)?;
            }
            AssetType::Material => {
                let material = self.handler.read_material(asset)?;
                state.scene.lock().unwrap().add_material(Arc::clone(&material));
                sink.material(material)?;
            }
            AssetType::Sound => {
                sink.sound(self.handler.read_sound(asset)?)?;
            }
            AssetType::Anim => {
                sink.anim(self.handler.read_anim(asset)?)?;
            }
        }
        Ok(true)
    }
}
