//! Catalog and bitmap retrieval over the injected sources.

use std::sync::Arc;

use tilestream_contracts::{TileByteSource, TileCatalogSource};
use tilestream_model::{ImageId, TileDescriptor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::bitmap::TileBitmap;
use crate::error::{Result, TileError};

/// Turns `(image, level)` into a descriptor catalog and a URL into a decoded
/// bitmap.
///
/// Shared by every streamer of a viewer through an `Arc`; it holds no
/// per-image state.
pub struct TileFetcher {
    catalog: Arc<dyn TileCatalogSource>,
    bytes: Arc<dyn TileByteSource>,
}

impl TileFetcher {
    pub fn new(
        catalog: Arc<dyn TileCatalogSource>,
        bytes: Arc<dyn TileByteSource>,
    ) -> Self {
        Self { catalog, bytes }
    }

    /// Descriptor list of one level.
    ///
    /// Every call reaches the catalog source; a failed call can simply be
    /// repeated.
    pub async fn get_catalog(
        &self,
        image_id: &ImageId,
        level: u32,
    ) -> Result<Vec<TileDescriptor>> {
        debug!(image_id = %image_id, level, "requesting tile catalog");
        let descriptors = self.catalog.tile_catalog(image_id, level).await?;
        trace!(
            image_id = %image_id,
            level,
            count = descriptors.len(),
            "tile catalog received"
        );
        Ok(descriptors)
    }

    /// Fetch and decode the bitmap behind `url`.
    ///
    /// Resolves with [`TileError::Cancelled`] if `cancel` fires before the
    /// bitmap is ready. Cancelling afterwards has no effect on the returned
    /// bitmap.
    pub async fn get_tile_bitmap(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<TileBitmap> {
        if cancel.is_cancelled() {
            return Err(TileError::Cancelled);
        }

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TileError::Cancelled),
            result = self.bytes.tile_bytes(url, cancel.clone()) => result?,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TileError::Cancelled),
            decoded = TileBitmap::decode_blocking(bytes) => decoded,
        }
    }
}

impl std::fmt::Debug for TileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFetcher").finish_non_exhaustive()
    }
}
