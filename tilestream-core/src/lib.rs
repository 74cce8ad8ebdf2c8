//! # Tilestream Core
//!
//! Adaptive tile-pyramid texture streaming: feeds very large source images
//! into one fixed-size render target at exactly the resolution the current
//! viewport needs.
//!
//! ## Overview
//!
//! - **Tile math** ([`pyramid`]): levels, tile indices, pixel footprints and
//!   cross-level overlap
//! - **Tile cache** ([`cache`]): per-image bitmaps and level catalogs
//! - **Tile fetcher** ([`fetch`]): cancellable catalog and bitmap retrieval
//! - **Texture streamer** ([`streamer`]): region of interest in, composited
//!   texture out
//!
//! The network and the GPU stay outside: catalogs and bytes come from the
//! traits in `tilestream-contracts`, drawing goes through a
//! [`render::RenderBackend`].
//!
//! ## Feature Flags
//!
//! - `wgpu`: GPU render target ([`render::WgpuCompositor`])
//! - `test-support`: stub sources and a recording backend in `testing`
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use tilestream_core::prelude::*;
//!
//! # async fn run(background: TileBitmap) -> anyhow::Result<()> {
//! let source = Arc::new(FsTileSource::new("/srv/tiles"));
//! let fetcher = Arc::new(TileFetcher::new(source.clone(), source));
//! let (config, _) = TileStreamConfig::load_from_env()?;
//!
//! let streamer = TextureStreamer::new(
//!     StreamerSource {
//!         image_id: ImageId::new("pano"),
//!         size: ImageSize::new(8192, 4096),
//!         background,
//!         backend: RasterCompositor::default(),
//!     },
//!     fetcher,
//!     &config.streamer,
//!     tokio::runtime::Handle::current(),
//! );
//! streamer.set_region_of_interest(&RegionOfInterest::full_view(1600.0, 800.0));
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod bitmap;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod pyramid;
pub mod render;
pub mod signal;
pub mod sources;
pub mod streamer;

/// Stub sources and a recording backend
#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-support")))]
pub mod testing;

pub use bitmap::TileBitmap;
pub use cache::TileCache;
pub use config::{
    ConfigSource, HttpSourceConfig, ResizeFilter, StreamerConfig,
    TileStreamConfig,
};
pub use error::{Result, TileError};
pub use fetch::TileFetcher;
pub use streamer::{StreamerSource, TextureStreamer, TextureUpdate};

pub mod prelude {
    pub use crate::bitmap::TileBitmap;
    pub use crate::cache::TileCache;
    pub use crate::config::{StreamerConfig, TileStreamConfig};
    pub use crate::error::{Result, TileError};
    pub use crate::fetch::TileFetcher;
    pub use crate::pyramid::{TILE_MIN_REQUEST_LEVEL, TILE_SIZE};
    pub use crate::render::{
        RasterCompositor, RasterTexture, RenderBackend, TileQuad,
    };
    pub use crate::sources::{FsTileSource, HttpTileSource};
    pub use crate::streamer::{
        StreamerSource, TextureStreamer, TextureUpdate,
    };
    pub use tilestream_contracts::prelude::*;
}
