//! Local pyramid directory source.
//!
//! Layout: `<root>/<image_id>/<z>/<x>_<y>.<ext>`, with an optional
//! `<root>/<image_id>/background.<ext>` low resolution preview.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tilestream_contracts::{
    SourceError, SourceResult, TileByteSource, TileCatalogSource,
};
use tilestream_model::{ImageId, TileCoords3D, TileDescriptor};
use tokio_util::sync::CancellationToken;
use tracing::trace;

fn io_error(err: std::io::Error, path: &Path) -> SourceError {
    if err.kind() == ErrorKind::NotFound {
        SourceError::NotFound(path.display().to_string())
    } else {
        SourceError::Transport(format!("{}: {err}", path.display()))
    }
}

/// Reads tiles from a pyramid laid out on disk.
#[derive(Debug, Clone)]
pub struct FsTileSource {
    root: PathBuf,
    extension: String,
}

impl FsTileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "png".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image_dir(&self, image_id: &ImageId) -> PathBuf {
        self.root.join(image_id.as_str())
    }

    pub fn level_dir(&self, image_id: &ImageId, level: u32) -> PathBuf {
        self.image_dir(image_id).join(level.to_string())
    }

    pub fn tile_path(&self, image_id: &ImageId, tile: TileCoords3D) -> PathBuf {
        self.level_dir(image_id, tile.z)
            .join(format!("{}_{}.{}", tile.x, tile.y, self.extension))
    }

    pub fn background_path(&self, image_id: &ImageId) -> PathBuf {
        self.image_dir(image_id)
            .join(format!("background.{}", self.extension))
    }

    /// `(x, y)` from a `<x>_<y>.<ext>` file name.
    fn parse_tile_name(&self, name: &str) -> Option<(u32, u32)> {
        let stem = name.strip_suffix(&format!(".{}", self.extension))?;
        let (x, y) = stem.split_once('_')?;
        Some((x.parse().ok()?, y.parse().ok()?))
    }
}

#[async_trait::async_trait]
impl TileCatalogSource for FsTileSource {
    async fn tile_catalog(
        &self,
        image_id: &ImageId,
        level: u32,
    ) -> SourceResult<Vec<TileDescriptor>> {
        let dir = self.level_dir(image_id, level);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| io_error(e, &dir))?;

        let mut descriptors = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| io_error(e, &dir))?
        {
            let name = entry.file_name();
            let Some((x, y)) =
                name.to_str().and_then(|name| self.parse_tile_name(name))
            else {
                trace!(path = %entry.path().display(), "skipping non-tile file");
                continue;
            };
            descriptors.push(TileDescriptor::new(
                entry.path().display().to_string(),
                TileCoords3D::new(x, y, level),
            ));
        }

        descriptors.sort_by_key(|d| (d.x, d.y));
        Ok(descriptors)
    }
}

#[async_trait::async_trait]
impl TileByteSource for FsTileSource {
    async fn tile_bytes(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> SourceResult<Vec<u8>> {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SourceError::Cancelled),
            result = tokio::fs::read(path) => result.map_err(|e| io_error(e, path)),
        }
    }
}
