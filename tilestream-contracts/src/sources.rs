use std::sync::Arc;

use tilestream_model::{ImageId, TileDescriptor};
use tokio_util::sync::CancellationToken;

use crate::error::SourceResult;

/// Metadata boundary: lists the fetchable tiles of one image at one level.
#[async_trait::async_trait]
pub trait TileCatalogSource: Send + Sync {
    /// Ordered descriptor list for `(image_id, level)`.
    ///
    /// Concurrent calls for the same pair are not deduplicated here; callers
    /// that care must share the pending result themselves.
    async fn tile_catalog(
        &self,
        image_id: &ImageId,
        level: u32,
    ) -> SourceResult<Vec<TileDescriptor>>;
}

/// Transport boundary: raw encoded bytes behind a descriptor URL.
#[async_trait::async_trait]
pub trait TileByteSource: Send + Sync {
    /// Fetch the bytes for `url`.
    ///
    /// Implementations should stop work and return
    /// [`SourceError::Cancelled`](crate::SourceError::Cancelled) once `cancel`
    /// fires; callers also stop polling the returned future at that point.
    async fn tile_bytes(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> SourceResult<Vec<u8>>;
}

#[async_trait::async_trait]
impl<T: TileCatalogSource + ?Sized> TileCatalogSource for Arc<T> {
    async fn tile_catalog(
        &self,
        image_id: &ImageId,
        level: u32,
    ) -> SourceResult<Vec<TileDescriptor>> {
        (**self).tile_catalog(image_id, level).await
    }
}

#[async_trait::async_trait]
impl<T: TileByteSource + ?Sized> TileByteSource for Arc<T> {
    async fn tile_bytes(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> SourceResult<Vec<u8>> {
        (**self).tile_bytes(url, cancel).await
    }
}
