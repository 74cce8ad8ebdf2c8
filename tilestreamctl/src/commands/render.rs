use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tilestream_core::bitmap::TileBitmap;
use tilestream_core::config::TileStreamConfig;
use tilestream_core::fetch::TileFetcher;
use tilestream_core::render::RasterCompositor;
use tilestream_core::render::raster::DEFAULT_RASTER_MAX_TEXTURE_SIZE;
use tilestream_core::sources::FsTileSource;
use tilestream_core::streamer::{StreamerSource, TextureStreamer};
use tilestream_model::{BasicBBox, ImageId, RegionOfInterest};
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::manifest::PyramidManifest;

#[derive(Debug, Clone)]
pub struct RenderArgs {
    pub root: PathBuf,
    pub image_id: String,
    pub bbox: BasicBBox,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub output: PathBuf,
    pub max_texture_size: Option<u32>,
    pub timeout_ms: u64,
}

pub async fn render(args: RenderArgs) -> Result<()> {
    let roi =
        RegionOfInterest::new(args.bbox, args.pixel_width, args.pixel_height);
    if !roi.has_valid_pixel_extent() {
        bail!("pixel width and height must be finite and positive");
    }

    let image_id = ImageId::new(args.image_id.as_str());
    let manifest = PyramidManifest::read(&args.root, &image_id)?;

    let (config, config_source) = TileStreamConfig::load_from_env()?;
    info!(source = ?config_source, "configuration loaded");
    let mut streamer_config = config.streamer;
    // Levels below the sliced range do not exist on disk.
    streamer_config.min_request_level = manifest.min_level;
    if let Some(max) = args.max_texture_size {
        streamer_config.max_texture_size = Some(max);
    }

    let source = Arc::new(FsTileSource::new(&args.root));
    let background_path = source.background_path(&image_id);
    let background_bytes =
        tokio::fs::read(&background_path).await.with_context(|| {
            format!("failed to read {}", background_path.display())
        })?;
    let background = TileBitmap::decode_blocking(background_bytes).await?;

    let backend = RasterCompositor::new(
        args.max_texture_size
            .unwrap_or(DEFAULT_RASTER_MAX_TEXTURE_SIZE)
            .max(1),
    )
    .with_filter(streamer_config.resize_filter);
    let fetcher = Arc::new(TileFetcher::new(source.clone(), source));
    let streamer = TextureStreamer::new(
        StreamerSource {
            image_id: image_id.clone(),
            size: manifest.size,
            background,
            backend,
        },
        fetcher,
        &streamer_config,
        Handle::current(),
    );

    let mut in_flight = streamer.subscribe_in_flight();
    streamer.set_region_of_interest(&roi);

    let settled = tokio::time::timeout(
        Duration::from_millis(args.timeout_ms),
        in_flight.wait_for(|count| *count == 0),
    )
    .await
    .map(|waited| waited.map(|_| ()));
    match settled {
        Ok(Ok(())) => {}
        Ok(Err(_)) => warn!(image_id = %image_id, "streamer closed early"),
        Err(_) => warn!(
            image_id = %image_id,
            pending = streamer.in_flight(),
            timeout_ms = args.timeout_ms,
            "timed out waiting for tiles, writing partial texture"
        ),
    }

    let texture = streamer
        .texture()
        .context("streamer did not create a render target")?;
    let pixels = texture.snapshot();
    pixels
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!(
        image_id = %image_id,
        level = ?streamer.level().map(|level| level.z),
        tiles = streamer.rendered_tiles().len(),
        width = pixels.width(),
        height = pixels.height(),
        output = %args.output.display(),
        "texture written"
    );
    streamer.dispose();
    Ok(())
}
