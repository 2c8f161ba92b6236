//! Extraction configuration, persisted as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

fn default_true() -> bool {
    true
}

/// Per-type load switches plus resolver locations. CLI flags override
/// values loaded from file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub load_models: bool,
    #[serde(default = "default_true")]
    pub load_images: bool,
    #[serde(default = "default_true")]
    pub load_materials: bool,
    #[serde(default = "default_true")]
    pub load_anims: bool,
    #[serde(default = "default_true")]
    pub load_sounds: bool,
    /// Pack directory; defaults to the directory published by the
    /// attached process when absent.
    #[serde(default)]
    pub game_directory: Option<PathBuf>,
    /// `hex,name` lookup file for asset name resolution.
    #[serde(default)]
    pub name_index: Option<PathBuf>,
    /// Network fallback base URL. None disables remote resolution.
    #[serde(default)]
    pub cdn_url: Option<String>,
    /// Import worker thread count. 0 selects the available parallelism.
    #[serde(default)]
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            load_models: true,
            load_images: true,
            load_materials: true,
            load_anims: true,
            load_sounds: true,
            game_directory: None,
            name_index: None,
            cdn_url: None,
            workers: 0,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let content = fs::read_to_string(&path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn loads_type(&self, asset_type: crate::assets::AssetType) -> bool {
        use crate::assets::AssetType;
        match asset_type {
            AssetType::Model => self.load_models,
            AssetType::Image => self.load_images,
            AssetType::Material => self.load_materials,
            AssetType::Anim => self.load_anims,
            AssetType::Sound => self.load_sounds,
        }
    }
}
