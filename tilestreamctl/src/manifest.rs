use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tilestream_model::{ImageId, ImageSize};

pub const MANIFEST_FILE: &str = "manifest.json";

/// What `slice` wrote, read back by `render`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidManifest {
    pub image_id: ImageId,
    pub size: ImageSize,
    pub min_level: u32,
    pub max_level: u32,
}

impl PyramidManifest {
    pub fn path(root: &Path, image_id: &ImageId) -> PathBuf {
        root.join(image_id.as_str()).join(MANIFEST_FILE)
    }

    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let path = Self::path(root, &self.image_id);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn read(root: &Path, image_id: &ImageId) -> Result<Self> {
        let path = Self::path(root, image_id);
        let raw = std::fs::read_to_string(&path).with_context(|| {
            format!("failed to read pyramid manifest {}", path.display())
        })?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid pyramid manifest {}", path.display()))
    }
}
