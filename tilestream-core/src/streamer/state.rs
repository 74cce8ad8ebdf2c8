use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tilestream_model::{
    ImageId, ImageSize, PyramidLevel, TileCoords3D, TileDescriptor, TileId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::bitmap::TileBitmap;
use crate::cache::TileCache;
use crate::config::StreamerConfig;
use crate::error::{Result, TileError};
use crate::fetch::TileFetcher;
use crate::pyramid::{
    TILE_MAX_REQUEST_LEVEL, base_image_level, has_overlap_2d,
    tile_to_pixel_coords_2d, verify_size,
};
use crate::render::{RenderBackend, TileQuad, target_size};
use crate::signal::{EventChannel, StateChannel};

use super::{StreamerSource, TextureUpdate};

/// One catalog request per level, awaited by every tile of that level.
pub(crate) type CatalogFuture =
    Shared<BoxFuture<'static, Result<Arc<[TileDescriptor]>>>>;

#[derive(Debug)]
pub(crate) struct InFlight {
    pub token: CancellationToken,
    pub ticket: u64,
}

/// Everything a streamer mutates. Lives behind one mutex shared with the
/// request tasks; no method here awaits.
pub(crate) struct StreamerState<B: RenderBackend> {
    pub image_id: ImageId,
    pub size: ImageSize,
    pub max_level: u32,
    pub min_request_level: u32,
    pub max_texture_size: Option<u32>,
    pub level: Option<PyramidLevel>,
    pub disposed: bool,

    background: Option<TileBitmap>,
    backend: B,
    target: Option<B::Target>,

    pub cache: TileCache,
    /// Every tile currently considered valid, at any level.
    pub rendered: HashMap<TileId, TileCoords3D>,
    /// Subset of `rendered` at the active level.
    pub rendered_level: HashSet<TileId>,
    pub in_flight: HashMap<TileId, InFlight>,
    pub catalogs: HashMap<u32, CatalogFuture>,
    next_ticket: u64,

    pub created: StateChannel<Option<B::Handle>>,
    pub has_texture: StateChannel<bool>,
    pub updated: EventChannel<TextureUpdate>,
    pub in_flight_count: StateChannel<usize>,
}

impl<B: RenderBackend> StreamerState<B> {
    pub fn new(source: StreamerSource<B>, config: &StreamerConfig) -> Self {
        let StreamerSource {
            image_id,
            size,
            background,
            backend,
        } = source;

        let max_level = if verify_size(size) {
            base_image_level(size)
        } else {
            0
        };
        let min_request_level =
            config.min_request_level.min(TILE_MAX_REQUEST_LEVEL);
        if min_request_level != config.min_request_level {
            warn!(
                image_id = %image_id,
                requested = config.min_request_level,
                clamped = min_request_level,
                "minimum request level out of range"
            );
        }

        Self {
            image_id,
            size,
            max_level,
            min_request_level,
            max_texture_size: config.max_texture_size,
            level: None,
            disposed: false,
            background: Some(background),
            backend,
            target: None,
            cache: TileCache::new(),
            rendered: HashMap::new(),
            rendered_level: HashSet::new(),
            in_flight: HashMap::new(),
            catalogs: HashMap::new(),
            next_ticket: 0,
            created: StateChannel::new(None),
            has_texture: StateChannel::new(false),
            updated: EventChannel::new(config.event_capacity),
            in_flight_count: StateChannel::new(0),
        }
    }

    pub fn tiling_enabled(&self) -> bool {
        verify_size(self.size)
    }

    pub fn pyramid_level(&self, z: u32) -> PyramidLevel {
        PyramidLevel::new(z, self.max_level)
    }

    /// Frame the target represents: the image, or the background alone when
    /// the image size is unusable.
    fn frame(&self) -> ImageSize {
        if self.tiling_enabled() {
            self.size
        } else {
            self.background
                .as_ref()
                .map(|bg| ImageSize::new(bg.width(), bg.height()))
                .unwrap_or(ImageSize::new(1, 1))
        }
    }

    pub fn handle(&self) -> Option<B::Handle> {
        self.target.as_ref().map(|target| self.backend.handle(target))
    }

    /// Switch the active level, dropping work for the previous one.
    ///
    /// Painted pixels stay; only bookkeeping is rebuilt from the tiles
    /// already rendered at `z`.
    pub fn change_level(&mut self, z: u32) {
        if let Some(previous) = self.level {
            debug!(
                image_id = %self.image_id,
                from = previous.z,
                to = z,
                "pyramid level changed"
            );
        }
        self.abort();
        self.rendered_level = self
            .rendered
            .iter()
            .filter(|(_, tile)| tile.z == z)
            .map(|(id, _)| *id)
            .collect();
        self.level = Some(self.pyramid_level(z));
    }

    /// Allocate the target and paint the background once.
    pub fn ensure_target(&mut self) -> bool {
        if self.target.is_some() {
            return true;
        }

        let frame = self.frame();
        let limit = self
            .max_texture_size
            .map_or(self.backend.max_texture_size(), |max| {
                max.min(self.backend.max_texture_size())
            });
        let dims = target_size(frame, limit);

        let mut target = match self.backend.create_target(dims.w, dims.h) {
            Ok(target) => target,
            Err(err) => {
                error!(
                    image_id = %self.image_id,
                    width = dims.w,
                    height = dims.h,
                    %err,
                    "failed to allocate render target"
                );
                return false;
            }
        };

        if let Some(background) = self.background.take()
            && let Err(err) = self.backend.draw_tile(
                &mut target,
                &TileQuad::full_frame(frame),
                &background,
            )
        {
            error!(image_id = %self.image_id, %err, "failed to paint background");
        }

        debug!(
            image_id = %self.image_id,
            width = dims.w,
            height = dims.h,
            "render target created"
        );
        let handle = self.backend.handle(&target);
        self.target = Some(target);
        self.created.publish(Some(handle));
        self.has_texture.publish(true);
        true
    }

    /// Draw one tile into the target.
    pub fn paint(&mut self, tile: TileCoords3D, bitmap: &TileBitmap) -> bool {
        let rect = tile_to_pixel_coords_2d(
            tile.xy(),
            self.size,
            self.pyramid_level(tile.z),
        );
        let quad = TileQuad::new(self.size, rect);
        let Some(target) = self.target.as_mut() else {
            return false;
        };
        match self.backend.draw_tile(target, &quad, bitmap) {
            Ok(()) => true,
            Err(err) => {
                error!(image_id = %self.image_id, tile = %tile, %err, "failed to paint tile");
                false
            }
        }
    }

    /// Record `tile` as valid, evicting overlapping tiles of other levels.
    pub fn mark_rendered(&mut self, tile: TileCoords3D) {
        let evicted: Vec<TileId> = self
            .rendered
            .iter()
            .filter(|(_, other)| other.z != tile.z && has_overlap_2d(**other, tile))
            .map(|(id, _)| *id)
            .collect();
        for id in evicted {
            trace!(image_id = %self.image_id, evicted = %id, by = %tile, "tile superseded");
            self.rendered.remove(&id);
            self.rendered_level.remove(&id);
        }

        let id = TileCache::invent_id(tile);
        self.rendered.insert(id, tile);
        self.rendered_level.insert(id);
        self.updated.emit(TextureUpdate { tile });
    }

    pub fn begin_request(&mut self, id: TileId) -> (CancellationToken, u64) {
        let token = CancellationToken::new();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight.insert(
            id,
            InFlight {
                token: token.clone(),
                ticket,
            },
        );
        self.publish_in_flight();
        (token, ticket)
    }

    /// Remove the request if `ticket` is still the current one for `id`.
    pub fn finish_request(&mut self, id: TileId, ticket: u64) -> bool {
        match self.in_flight.get(&id) {
            Some(request) if request.ticket == ticket => {
                self.in_flight.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub fn publish_in_flight(&mut self) {
        let count = self.in_flight.len();
        if *self.in_flight_count.get() != count {
            self.in_flight_count.publish(count);
        }
    }

    /// Shared catalog request for level `z`, started on first use.
    pub fn catalog_future(
        &mut self,
        fetcher: &Arc<TileFetcher>,
        z: u32,
    ) -> CatalogFuture {
        if let Some(pending) = self.catalogs.get(&z) {
            return pending.clone();
        }

        let fetcher = Arc::clone(fetcher);
        let image_id = self.image_id.clone();
        let pending = async move {
            fetcher
                .get_catalog(&image_id, z)
                .await
                .map(Arc::<[TileDescriptor]>::from)
        }
        .boxed()
        .shared();
        self.catalogs.insert(z, pending.clone());
        pending
    }

    /// Store a resolved catalog once and return the URL of `id`.
    ///
    /// The pending request is forgotten whatever the outcome, so a catalog
    /// the cache rejects is fetched again by the next region.
    pub fn register_catalog(
        &mut self,
        z: u32,
        pending: &CatalogFuture,
        descriptors: &[TileDescriptor],
        id: TileId,
    ) -> Result<String> {
        if self.disposed {
            return Err(TileError::Cancelled);
        }
        self.forget_catalog(z, pending);
        if !self.cache.has_url_level(z) {
            self.cache.add_urls(z, descriptors)?;
            debug!(
                image_id = %self.image_id,
                level = z,
                count = descriptors.len(),
                "tile catalog registered"
            );
        }
        self.cache
            .get_url(id)
            .map(str::to_owned)
            .ok_or(TileError::MissingDescriptor(id))
    }

    /// Forget a failed catalog request so the next request retries.
    pub fn forget_catalog(&mut self, z: u32, pending: &CatalogFuture) {
        if self
            .catalogs
            .get(&z)
            .is_some_and(|current| Shared::ptr_eq(current, pending))
        {
            self.catalogs.remove(&z);
        }
    }

    /// Cancel every pending tile and catalog request.
    pub fn abort(&mut self) {
        let count = self.in_flight.len();
        for (_, request) in self.in_flight.drain() {
            request.token.cancel();
        }
        self.catalogs.clear();
        if count > 0 {
            debug!(image_id = %self.image_id, count, "aborted tile requests");
        }
        self.publish_in_flight();
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.abort();

        if let Some(target) = self.target.take() {
            self.backend.release_target(target);
        }
        self.cache.dispose();
        self.rendered.clear();
        self.rendered_level.clear();
        self.background = None;
        self.level = None;

        self.created.publish(None);
        self.has_texture.publish(false);
        self.created.complete();
        self.has_texture.complete();
        self.updated.complete();
        self.in_flight_count.complete();
        debug!(image_id = %self.image_id, "texture streamer disposed");
    }
}
