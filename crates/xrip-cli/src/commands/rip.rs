//! Rip command: discover, then decode everything that matches into an
//! output directory of intermediate dumps.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::warn;
use xrip_core::{
    Anim, AssetSink, CdnClient, Config, ContentResolver, DedupCache, ImportSession, Material,
    Model, PackIndex, PackStore, PoolWalker, RemoteFetcher, SilentObserver, Sound, Texture,
    create_handler, pool_definitions, session::discover,
};

use super::{attach, name_matches};

pub fn run(
    state_dir: &Path,
    exe: &str,
    config: Config,
    output: &Path,
    filter: Option<&str>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let attached = attach(state_dir, exe, &config)?;
    fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    let walker = Arc::new(PoolWalker::new(
        Arc::clone(&attached.reader),
        attached.state.pools,
        Arc::clone(&attached.names),
    ));
    let report = discover(
        walker,
        pool_definitions(&attached.layout.pools),
        Arc::clone(&cancel),
        Arc::new(SilentObserver),
    )?;
    let assets: Vec<_> = report
        .assets
        .into_iter()
        .filter(|a| name_matches(&a.name, filter))
        .collect();
    println!("{} assets selected", assets.len().green());

    // The loader stub publishes the pack index table; a stub without
    // one limits resolution to the CDN.
    let index = if attached.state.pack_table.is_null() {
        PackIndex::default()
    } else {
        match PackIndex::read_from(
            attached.reader.as_ref(),
            attached.state.pack_table,
            attached.state.pack_count,
        ) {
            Ok(index) => index,
            Err(e) => {
                warn!("Pack index unreadable ({e}), local packs disabled");
                PackIndex::default()
            }
        }
    };
    let pack_dir = config
        .game_directory
        .clone()
        .unwrap_or_else(|| attached.state.game_directory.clone());
    let remote: Option<Box<dyn RemoteFetcher>> = config
        .cdn_url
        .as_deref()
        .map(|url| Box::new(CdnClient::new(url)) as Box<dyn RemoteFetcher>);
    let resolver = Arc::new(ContentResolver::new(PackStore::new(pack_dir, index), remote));

    let handler = create_handler(
        attached.state.build_id,
        xrip_core::HandlerDeps {
            reader: Arc::clone(&attached.reader),
            resolver,
            cache: Arc::new(DedupCache::new()),
        },
    );

    let sink = DiskSink {
        root: output.to_path_buf(),
    };
    let session = ImportSession::new(handler, config);
    let (summary, scene) = session.import(&assets, &cancel, &SilentObserver, &sink)?;

    fs::write(
        output.join("scene.json"),
        serde_json::to_string_pretty(&scene)?,
    )?;
    let manifest = serde_json::json!({
        "build_id": format!("{:#018x}", attached.state.build_id),
        "ripped_at": chrono::Utc::now().to_rfc3339(),
        "discovered": report.total,
        "selected": assets.len(),
        "summary": summary,
    });
    fs::write(
        output.join("manifest.json"),
        serde_json::to_string_pretty(&manifest)?,
    )?;

    println!(
        "{} ok, {} failed, {} skipped",
        summary.ok.green(),
        summary.failed.red(),
        summary.skipped.yellow()
    );
    Ok(())
}

/// Writes each decoded asset under a per-type subdirectory. Textures
/// land container-ready; everything else is an intermediate JSON dump.
struct DiskSink {
    root: PathBuf,
}

impl DiskSink {
    fn path(&self, kind: &str, name: &str, ext: &str) -> xrip_core::Result<PathBuf> {
        let dir = self.root.join(kind);
        fs::create_dir_all(&dir)?;
        // Asset names can carry path separators from the game's VFS.
        let safe: String = name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        Ok(dir.join(format!("{safe}.{ext}")))
    }

    fn dump_json<T: serde::Serialize>(
        &self,
        kind: &str,
        name: &str,
        value: &T,
    ) -> xrip_core::Result<()> {
        fs::write(
            self.path(kind, name, "json")?,
            serde_json::to_string_pretty(value)?,
        )?;
        Ok(())
    }
}

impl AssetSink for DiskSink {
    fn texture(&self, texture: Arc<Texture>) -> xrip_core::Result<()> {
        fs::write(self.path("images", &texture.name, "dds")?, &texture.data)?;
        Ok(())
    }

    fn material(&self, material: Arc<Material>) -> xrip_core::Result<()> {
        self.dump_json("materials", &material.name, material.as_ref())
    }

    fn model(&self, model: Model) -> xrip_core::Result<()> {
        self.dump_json("models", &model.name, &model)
    }

    fn sound(&self, sound: Sound) -> xrip_core::Result<()> {
        fs::write(self.path("sounds", &sound.name, "snd")?, &sound.data)?;
        self.dump_json("sounds", &sound.name, &sound)
    }

    fn anim(&self, anim: Anim) -> xrip_core::Result<()> {
        self.dump_json("anims", &anim.name, &anim)
    }
}
