//! Asset descriptors produced during pool discovery.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::memory::RemotePtr;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum AssetType {
    #[strum(serialize = "model")]
    Model,
    #[strum(serialize = "image")]
    Image,
    #[strum(serialize = "material")]
    Material,
    #[strum(serialize = "anim")]
    Anim,
    #[strum(serialize = "sound")]
    Sound,
}

impl AssetType {
    /// Fallback name prefix when the name index has no entry.
    pub fn name_prefix(&self) -> &'static str {
        match self {
            AssetType::Model => "xmodel",
            AssetType::Image => "ximage",
            AssetType::Material => "xmaterial",
            AssetType::Anim => "xanim",
            AssetType::Sound => "xsound",
        }
    }
}

/// Whether the pool node held real data or a placeholder stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    Placeholder,
    Loaded,
}

/// One discovered asset. Owned by the discovery session until handed
/// to an importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub asset_type: AssetType,
    pub name: String,
    pub pointer: RemotePtr,
    pub size: Option<u64>,
    pub status: AssetStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(AssetType::Model.to_string(), "model");
        assert_eq!("sound".parse::<AssetType>().unwrap(), AssetType::Sound);
        assert_eq!(AssetType::Image.name_prefix(), "ximage");
    }
}
