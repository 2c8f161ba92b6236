//! CLI command implementations.

pub mod discover;
pub mod rip;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;
use xrip_core::games::layout::{self, GameLayout};
use xrip_core::{Config, LoaderState, NameIndex, ReadMemory};

/// Everything both commands need after attaching to the target.
pub struct Attached {
    pub reader: Arc<dyn ReadMemory>,
    pub state: LoaderState,
    pub layout: &'static GameLayout,
    pub names: Arc<NameIndex>,
}

pub fn attach(state_dir: &Path, exe: &str, config: &Config) -> Result<Attached> {
    let state = LoaderState::locate(state_dir)
        .with_context(|| format!("no loader state under {}", state_dir.display()))?;
    let Some(layout) = layout::layout_for(state.build_id) else {
        bail!(
            "build {:#018x} has no layout table; supported: {:#018x}, {:#018x}",
            state.build_id,
            layout::BUILD_MW22,
            layout::BUILD_MW23
        );
    };
    let reader = open_reader(exe)?;
    info!("Attached to {exe}, build {:#018x}", state.build_id);

    let names = match &config.name_index {
        Some(path) => {
            let index = NameIndex::load(path)
                .with_context(|| format!("name index {}", path.display()))?;
            info!("Name index: {} entries", index.len());
            index
        }
        None => NameIndex::empty(),
    };

    Ok(Attached {
        reader,
        state,
        layout,
        names: Arc::new(names),
    })
}

#[cfg(target_os = "windows")]
fn open_reader(exe: &str) -> Result<Arc<dyn ReadMemory>> {
    use xrip_core::{ProcessHandle, ProcessInfo};
    let info = ProcessInfo::find(&[exe])?;
    Ok(Arc::new(ProcessHandle::open(&info)?))
}

#[cfg(not(target_os = "windows"))]
fn open_reader(_exe: &str) -> Result<Arc<dyn ReadMemory>> {
    bail!("attaching to a process is only supported on Windows")
}

/// Case-insensitive substring match used by both commands.
pub fn name_matches(name: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(f) => name.to_ascii_lowercase().contains(&f.to_ascii_lowercase()),
        None => true,
    }
}
