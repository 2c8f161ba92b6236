//! Discover command: attach, walk the pools, list what is there.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;
use owo_colors::OwoColorize;
use xrip_core::{
    AssetType, Config, PoolWalker, SilentObserver, pool_definitions, session::discover,
};

use super::{attach, name_matches};

pub fn run(
    state_dir: &Path,
    exe: &str,
    config: &Config,
    filter: Option<&str>,
    json: Option<&Path>,
    cancel: Arc<AtomicBool>,
) -> Result<()> {
    let attached = attach(state_dir, exe, config)?;
    let walker = Arc::new(PoolWalker::new(
        Arc::clone(&attached.reader),
        attached.state.pools,
        Arc::clone(&attached.names),
    ));

    let report = discover(
        walker,
        pool_definitions(&attached.layout.pools),
        cancel,
        Arc::new(SilentObserver),
    )?;

    let assets: Vec<_> = report
        .assets
        .into_iter()
        .filter(|a| name_matches(&a.name, filter))
        .collect();

    for asset_type in [
        AssetType::Model,
        AssetType::Image,
        AssetType::Material,
        AssetType::Anim,
        AssetType::Sound,
    ] {
        let count = assets.iter().filter(|a| a.asset_type == asset_type).count();
        println!("{:>8} {}", count.green(), asset_type.cyan());
    }
    println!("{:>8} total", assets.len().green().bold());
    if report.cancelled {
        println!("{}", "(discovery was cancelled, listing is partial)".yellow());
    }

    if let Some(path) = json {
        std::fs::write(path, serde_json::to_string_pretty(&assets)?)?;
        println!("Wrote {} descriptors to {}", assets.len(), path.display());
    }
    Ok(())
}
