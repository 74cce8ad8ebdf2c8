//! Per-image tile store.
//!
//! Holds decoded bitmaps and the URL catalog of every level fetched so far.
//! Pure storage; the streamer decides when to read and write.

use std::collections::{HashMap, HashSet};

use tilestream_model::{TileCoords3D, TileDescriptor, TileId};

use crate::bitmap::TileBitmap;
use crate::error::{Result, TileError};

/// Write-once-per-tile store for one image.
#[derive(Debug, Default)]
pub struct TileCache {
    bitmaps: HashMap<TileId, TileBitmap>,
    urls: HashMap<TileId, String>,
    levels: HashSet<u32>,
    disposed: bool,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity shared by cache, in-flight and rendered bookkeeping.
    pub fn invent_id(tile: TileCoords3D) -> TileId {
        TileId::from(tile)
    }

    /// Store a decoded tile. Fails if the tile is already stored.
    pub fn add(&mut self, id: TileId, bitmap: TileBitmap) -> Result<()> {
        if self.disposed {
            return Err(TileError::Disposed);
        }
        if self.bitmaps.contains_key(&id) {
            return Err(TileError::DuplicateWrite(id));
        }
        self.bitmaps.insert(id, bitmap);
        Ok(())
    }

    /// Register the descriptor catalog of `level`.
    ///
    /// The batch is validated before anything is stored: a single already
    /// known tile rejects the whole catalog.
    pub fn add_urls(
        &mut self,
        level: u32,
        descriptors: &[TileDescriptor],
    ) -> Result<()> {
        if self.disposed {
            return Err(TileError::Disposed);
        }

        let mut batch = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let id = TileId::from(descriptor);
            if self.urls.contains_key(&id)
                || batch.insert(id, descriptor.url.clone()).is_some()
            {
                return Err(TileError::DuplicateUrl(id));
            }
        }

        self.urls.extend(batch);
        self.levels.insert(level);
        Ok(())
    }

    pub fn get(&self, id: TileId) -> Option<&TileBitmap> {
        self.bitmaps.get(&id)
    }

    pub fn has(&self, id: TileId) -> bool {
        self.bitmaps.contains_key(&id)
    }

    pub fn get_url(&self, id: TileId) -> Option<&str> {
        self.urls.get(&id).map(String::as_str)
    }

    pub fn has_url(&self, id: TileId) -> bool {
        self.urls.contains_key(&id)
    }

    /// `true` once the catalog of `level` has been registered.
    pub fn has_url_level(&self, level: u32) -> bool {
        self.levels.contains(&level)
    }

    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Drop every bitmap and catalog. Terminal.
    pub fn dispose(&mut self) {
        self.bitmaps.clear();
        self.bitmaps.shrink_to_fit();
        self.urls.clear();
        self.urls.shrink_to_fit();
        self.levels.clear();
        self.disposed = true;
    }
}
