use std::sync::Arc;

use parking_lot::Mutex;
use tilestream_model::{TileCoords3D, TileId};
use tokio_util::sync::CancellationToken;
use tracing::{error, trace, warn};

use crate::bitmap::TileBitmap;
use crate::error::{Result, TileError};
use crate::fetch::TileFetcher;
use crate::render::RenderBackend;

use super::state::{CatalogFuture, StreamerState};

/// Where the URL of a requested tile comes from.
pub(crate) enum UrlSource {
    Known(String),
    Catalog(CatalogFuture),
}

/// One tile request running on the runtime.
///
/// Only the request whose ticket is still registered for its tile may touch
/// the streamer once it completes; anything else was aborted meanwhile.
pub(crate) struct TileTask<B: RenderBackend> {
    pub state: Arc<Mutex<StreamerState<B>>>,
    pub fetcher: Arc<TileFetcher>,
    pub tile: TileCoords3D,
    pub id: TileId,
    pub ticket: u64,
    pub token: CancellationToken,
    pub url: UrlSource,
}

impl<B: RenderBackend> TileTask<B> {
    pub async fn run(self) {
        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(TileError::Cancelled),
            result = self.fetch() => result,
        };
        self.complete(outcome);
    }

    async fn fetch(&self) -> Result<TileBitmap> {
        let url = match &self.url {
            UrlSource::Known(url) => url.clone(),
            UrlSource::Catalog(pending) => {
                let resolved = pending.clone().await;
                let mut state = self.state.lock();
                match resolved {
                    Ok(descriptors) => state.register_catalog(
                        self.tile.z,
                        pending,
                        &descriptors,
                        self.id,
                    )?,
                    Err(err) => {
                        state.forget_catalog(self.tile.z, pending);
                        return Err(err);
                    }
                }
            }
        };

        self.fetcher.get_tile_bitmap(&url, &self.token).await
    }

    fn complete(self, outcome: Result<TileBitmap>) {
        let mut state = self.state.lock();
        if !state.finish_request(self.id, self.ticket) {
            trace!(tile = %self.tile, "discarding superseded tile result");
            return;
        }

        match outcome {
            Ok(bitmap) => {
                if state.paint(self.tile, &bitmap) {
                    if let Err(err) = state.cache.add(self.id, bitmap) {
                        error!(
                            image_id = %state.image_id,
                            tile = %self.tile,
                            %err,
                            "tile cache rejected write"
                        );
                    }
                    state.mark_rendered(self.tile);
                }
            }
            Err(err) if err.is_cancelled() => {
                trace!(tile = %self.tile, "tile request cancelled");
            }
            Err(err) => {
                warn!(
                    image_id = %state.image_id,
                    tile = %self.tile,
                    %err,
                    "tile request failed"
                );
            }
        }
        state.publish_in_flight();
    }
}
