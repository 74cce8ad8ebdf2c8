use std::sync::Arc;
use std::time::Duration;

use tilestream_contracts::TileByteSource;
use tilestream_core::pyramid::TILE_MAX_REQUEST_LEVEL;
use tilestream_core::render::{RasterCompositor, RenderBackend};
use tilestream_core::testing::{
    MemoryByteSource, PendingByteSource, RecordingBackend, StubCatalog,
    solid_bitmap, stub_url,
};
use tilestream_core::{
    ResizeFilter, StreamerConfig, StreamerSource, TextureStreamer,
    TileFetcher,
};
use tilestream_model::{
    BasicBBox, ImageId, ImageSize, PyramidLevel, RegionOfInterest,
    TileCoords3D,
};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};

const IMAGE: &str = "pano";

fn image_id() -> ImageId {
    ImageId::new(IMAGE)
}

fn streamer<B: RenderBackend>(
    size: ImageSize,
    catalog: Arc<StubCatalog>,
    bytes: Arc<dyn TileByteSource>,
    backend: B,
    config: &StreamerConfig,
) -> TextureStreamer<B> {
    TextureStreamer::new(
        StreamerSource {
            image_id: image_id(),
            size,
            background: solid_bitmap(64, 32, [0, 0, 255, 255]),
            backend,
        },
        Arc::new(TileFetcher::new(catalog, bytes)),
        config,
        Handle::current(),
    )
}

async fn settle(in_flight: &mut watch::Receiver<usize>) {
    tokio::time::timeout(Duration::from_secs(5), in_flight.wait_for(|n| *n == 0))
        .await
        .expect("requests settle in time")
        .expect("in-flight channel open");
}

fn drain(updated: &mut broadcast::Receiver<tilestream_core::TextureUpdate>) -> Vec<TileCoords3D> {
    let mut tiles = Vec::new();
    while let Ok(update) = updated.try_recv() {
        tiles.push(update.tile);
    }
    tiles.sort();
    tiles
}

/// Region over `bbox` whose on-screen density implies a virtual image of
/// `virtual_w x virtual_h` pixels.
fn roi(bbox: BasicBBox, virtual_w: f64, virtual_h: f64) -> RegionOfInterest {
    RegionOfInterest::new(bbox, 1.0 / virtual_w, 1.0 / virtual_h)
}

#[tokio::test]
async fn full_detail_region_paints_native_tiles() {
    let size = ImageSize::new(2048, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    let bytes = Arc::new(MemoryByteSource::new());
    let backend = RecordingBackend::new(4096);
    let streamer = streamer(
        size,
        catalog.clone(),
        bytes.clone(),
        backend.clone(),
        &StreamerConfig::default(),
    );
    let mut updated = streamer.subscribe_updated();
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&RegionOfInterest::full_view(2048.0, 1024.0));

    assert_eq!(streamer.level(), Some(PyramidLevel::new(11, 11)));
    assert_eq!(streamer.in_flight(), 2);
    settle(&mut in_flight).await;

    assert!(*streamer.subscribe_has_texture().borrow());
    assert_eq!(
        drain(&mut updated),
        vec![TileCoords3D::new(0, 0, 11), TileCoords3D::new(1, 0, 11)]
    );
    assert_eq!(
        streamer.rendered_tiles(),
        vec![TileCoords3D::new(0, 0, 11), TileCoords3D::new(1, 0, 11)]
    );
    assert_eq!(catalog.calls_for(11), 1);
    assert_eq!(streamer.cached_tiles(), 2);
    // Background first, then one draw per tile.
    assert_eq!(backend.draw_count(), 3);
    assert_eq!(backend.created_targets(), vec![(2048, 1024)]);
}

#[tokio::test]
async fn coarse_regions_are_clamped_to_the_minimum_request_level() {
    let size = ImageSize::new(2048, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    let streamer = streamer(
        size,
        catalog.clone(),
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 300.0, 150.0));
    settle(&mut in_flight).await;

    assert_eq!(streamer.level().map(|level| level.z), Some(10));
    assert_eq!(catalog.levels_requested(), vec![10]);
    assert_eq!(streamer.rendered_tiles(), vec![TileCoords3D::new(0, 0, 10)]);
}

#[tokio::test]
async fn fractional_pixel_past_a_power_of_two_selects_the_finer_level() {
    let size = ImageSize::new(2048, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    let streamer = streamer(
        size,
        catalog.clone(),
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 1024.4, 512.2));
    settle(&mut in_flight).await;

    assert_eq!(streamer.level(), Some(PyramidLevel::new(11, 11)));
    assert_eq!(catalog.levels_requested(), vec![11]);
}

#[tokio::test]
async fn out_of_range_minimum_level_is_clamped_to_representable_tiles() {
    let size = ImageSize::new(2048, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    let config = StreamerConfig {
        min_request_level: 300,
        ..StreamerConfig::default()
    };
    let streamer = streamer(
        size,
        Arc::clone(&catalog),
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(4096),
        &config,
    );
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&roi(
        BasicBBox::new(0.0, 0.0, 0.0, 0.0),
        2048.0,
        1024.0,
    ));

    assert_eq!(
        streamer.level(),
        Some(PyramidLevel::new(TILE_MAX_REQUEST_LEVEL, 11))
    );
    assert_eq!(streamer.in_flight(), 1);
    streamer.abort();
    settle(&mut in_flight).await;
}

#[tokio::test]
async fn abandoned_level_is_requested_again_after_being_superseded() {
    let size = ImageSize::new(2048, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    let bytes = Arc::new(MemoryByteSource::new());
    let backend = RecordingBackend::new(4096);
    let streamer = streamer(
        size,
        catalog.clone(),
        bytes.clone(),
        backend.clone(),
        &StreamerConfig::default(),
    );
    let mut updated = streamer.subscribe_updated();
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 2048.0, 1024.0));
    settle(&mut in_flight).await;
    drain(&mut updated);

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 1024.0, 512.0));
    settle(&mut in_flight).await;
    assert_eq!(drain(&mut updated), vec![TileCoords3D::new(0, 0, 10)]);
    // The coarse tile covers both native tiles; their pixels stay but they
    // no longer count as rendered.
    assert_eq!(streamer.rendered_tiles(), vec![TileCoords3D::new(0, 0, 10)]);
    assert_eq!(backend.draw_count(), 4);

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 2048.0, 1024.0));
    settle(&mut in_flight).await;

    assert_eq!(
        drain(&mut updated),
        vec![TileCoords3D::new(0, 0, 11), TileCoords3D::new(1, 0, 11)]
    );
    assert_eq!(
        streamer.rendered_tiles(),
        vec![TileCoords3D::new(0, 0, 11), TileCoords3D::new(1, 0, 11)]
    );
    assert_eq!(backend.draw_count(), 6);
    // Served from the tile cache, not the network.
    let native = stub_url(&image_id(), TileCoords3D::new(0, 0, 11));
    assert_eq!(bytes.request_count(&native), 1);
    assert_eq!(catalog.calls_for(11), 1);
}

#[tokio::test]
async fn finer_tile_only_evicts_the_coarse_tile_it_overlaps() {
    let size = ImageSize::new(4096, 2048);
    let catalog = Arc::new(StubCatalog::new(size));
    let streamer = streamer(
        size,
        catalog,
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(8192),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 2048.0, 1024.0));
    settle(&mut in_flight).await;
    assert_eq!(
        streamer.rendered_tiles(),
        vec![TileCoords3D::new(0, 0, 11), TileCoords3D::new(1, 0, 11)]
    );

    let corner = BasicBBox::new(0.0, 0.0, 0.2, 0.4);
    streamer.set_region_of_interest(&roi(corner, 4096.0, 2048.0));
    settle(&mut in_flight).await;

    assert_eq!(
        streamer.rendered_tiles(),
        vec![TileCoords3D::new(1, 0, 11), TileCoords3D::new(0, 0, 12)]
    );
}

#[tokio::test]
async fn region_across_the_seam_requests_both_edges() {
    let size = ImageSize::new(4096, 2048);
    let catalog = Arc::new(StubCatalog::new(size));
    let streamer = streamer(
        size,
        catalog,
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(8192),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();

    let seam = BasicBBox::new(0.9, 0.0, 0.1, 0.4);
    streamer.set_region_of_interest(&roi(seam, 4096.0, 2048.0));
    settle(&mut in_flight).await;

    assert_eq!(
        streamer.rendered_tiles(),
        vec![TileCoords3D::new(0, 0, 12), TileCoords3D::new(3, 0, 12)]
    );
}

#[tokio::test]
async fn dispose_while_fetching_cancels_everything_and_never_paints() {
    let size = ImageSize::new(2048, 1024);
    let pending = Arc::new(PendingByteSource::new());
    let backend = RecordingBackend::new(4096);
    let streamer = streamer(
        size,
        Arc::new(StubCatalog::new(size)),
        pending.clone(),
        backend.clone(),
        &StreamerConfig::default(),
    );
    let mut updated = streamer.subscribe_updated();
    let mut created = streamer.subscribe_created();

    streamer.set_region_of_interest(&RegionOfInterest::full_view(2048.0, 1024.0));
    pending.wait_for_requests(2).await;
    assert!(pending.tokens().iter().all(|token| !token.is_cancelled()));

    streamer.dispose();

    assert!(pending.tokens().iter().all(|token| token.is_cancelled()));
    assert!(streamer.is_disposed());
    assert_eq!(streamer.in_flight(), 0);
    assert_eq!(streamer.cached_tiles(), 0);
    assert_eq!(backend.released_targets(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.draw_count(), 1, "only the background was painted");
    assert!(matches!(
        updated.recv().await,
        Err(broadcast::error::RecvError::Closed)
    ));
    assert!(created.borrow_and_update().is_none());
    assert!(created.changed().await.is_err());

    // Later calls are inert.
    streamer.set_region_of_interest(&RegionOfInterest::full_view(2048.0, 1024.0));
    streamer.dispose();
    drop(streamer);
    assert_eq!(pending.urls().len(), 2);
    assert_eq!(backend.released_targets(), 1);
}

#[tokio::test]
async fn level_change_cancels_outstanding_requests() {
    let size = ImageSize::new(2048, 1024);
    let pending = Arc::new(PendingByteSource::new());
    let streamer = streamer(
        size,
        Arc::new(StubCatalog::new(size)),
        pending.clone(),
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 2048.0, 1024.0));
    pending.wait_for_requests(2).await;

    streamer.set_region_of_interest(&roi(BasicBBox::FULL, 1024.0, 512.0));
    pending.wait_for_requests(3).await;

    let tokens = pending.tokens();
    assert!(tokens[..2].iter().all(|token| token.is_cancelled()));
    assert!(!tokens[2].is_cancelled());
    assert_eq!(
        pending.urls()[2],
        stub_url(&image_id(), TileCoords3D::new(0, 0, 10))
    );
    assert_eq!(streamer.in_flight(), 1);
}

#[tokio::test]
async fn repeated_regions_do_not_duplicate_requests() {
    let size = ImageSize::new(2048, 1024);
    let bytes = Arc::new(MemoryByteSource::new());
    let streamer = streamer(
        size,
        Arc::new(StubCatalog::new(size)),
        bytes.clone(),
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();
    let full = RegionOfInterest::full_view(2048.0, 1024.0);

    streamer.set_region_of_interest(&full);
    streamer.set_region_of_interest(&full);
    assert_eq!(streamer.in_flight(), 2);
    settle(&mut in_flight).await;
    streamer.set_region_of_interest(&full);

    assert_eq!(streamer.in_flight(), 0);
    assert_eq!(bytes.requests().len(), 2);
}

#[tokio::test]
async fn failed_catalog_is_retried_by_the_next_region() {
    let size = ImageSize::new(2048, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    catalog.fail_next(1);
    let streamer = streamer(
        size,
        catalog.clone(),
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();
    let full = RegionOfInterest::full_view(2048.0, 1024.0);

    streamer.set_region_of_interest(&full);
    settle(&mut in_flight).await;
    assert!(streamer.rendered_tiles().is_empty());
    assert!(streamer.has_texture(), "background stays visible");

    streamer.set_region_of_interest(&full);
    settle(&mut in_flight).await;
    assert_eq!(catalog.calls_for(11), 2);
    assert_eq!(streamer.rendered_tiles().len(), 2);
}

#[tokio::test]
async fn rejected_catalog_is_fetched_again_by_the_next_region() {
    let size = ImageSize::new(2048, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    catalog.duplicate_next(1);
    let streamer = streamer(
        size,
        catalog.clone(),
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();
    let full = RegionOfInterest::full_view(2048.0, 1024.0);

    streamer.set_region_of_interest(&full);
    settle(&mut in_flight).await;
    assert!(streamer.rendered_tiles().is_empty());

    streamer.set_region_of_interest(&full);
    settle(&mut in_flight).await;
    assert_eq!(catalog.calls_for(11), 2);
    assert_eq!(
        streamer.rendered_tiles(),
        vec![TileCoords3D::new(0, 0, 11), TileCoords3D::new(1, 0, 11)]
    );
}

#[tokio::test]
async fn undecodable_tile_is_left_unpainted() {
    let size = ImageSize::new(2048, 1024);
    let bytes = Arc::new(MemoryByteSource::new());
    bytes.insert(
        stub_url(&image_id(), TileCoords3D::new(0, 0, 11)),
        b"corrupt".to_vec(),
    );
    let streamer = streamer(
        size,
        Arc::new(StubCatalog::new(size)),
        bytes,
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&RegionOfInterest::full_view(2048.0, 1024.0));
    settle(&mut in_flight).await;

    assert_eq!(streamer.rendered_tiles(), vec![TileCoords3D::new(1, 0, 11)]);
}

#[tokio::test]
async fn invalid_size_degrades_to_background_only() {
    let size = ImageSize::new(0, 1024);
    let catalog = Arc::new(StubCatalog::new(size));
    let backend = RecordingBackend::new(4096);
    let streamer = streamer(
        size,
        catalog.clone(),
        Arc::new(MemoryByteSource::new()),
        backend.clone(),
        &StreamerConfig::default(),
    );

    streamer.set_region_of_interest(&RegionOfInterest::full_view(2048.0, 1024.0));

    assert!(streamer.has_texture());
    assert_eq!(streamer.level(), None);
    assert_eq!(backend.created_targets(), vec![(64, 32)]);
    assert_eq!(backend.draw_count(), 1);
    tokio::task::yield_now().await;
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn region_without_pixel_extent_is_ignored() {
    let size = ImageSize::new(2048, 1024);
    let backend = RecordingBackend::new(4096);
    let streamer = streamer(
        size,
        Arc::new(StubCatalog::new(size)),
        Arc::new(MemoryByteSource::new()),
        backend.clone(),
        &StreamerConfig::default(),
    );

    streamer.set_region_of_interest(&RegionOfInterest::new(BasicBBox::FULL, 0.0, f64::NAN));

    assert!(!streamer.has_texture());
    assert!(backend.created_targets().is_empty());
}

#[tokio::test]
async fn created_signal_replays_the_target_handle() {
    let size = ImageSize::new(2048, 1024);
    let streamer = streamer(
        size,
        Arc::new(StubCatalog::new(size)),
        Arc::new(MemoryByteSource::new()),
        RecordingBackend::new(4096),
        &StreamerConfig::default(),
    );
    assert!(streamer.subscribe_created().borrow().is_none());

    streamer.set_region_of_interest(&RegionOfInterest::full_view(2048.0, 1024.0));

    let late = streamer.subscribe_created();
    let handle = late.borrow().clone().expect("target handle");
    assert_eq!((handle.width, handle.height), (2048, 1024));
}

#[tokio::test]
async fn raster_target_is_clamped_and_composited() {
    let size = ImageSize::new(2048, 1024);
    let config = StreamerConfig {
        max_texture_size: Some(1024),
        resize_filter: ResizeFilter::Nearest,
        ..StreamerConfig::default()
    };
    let streamer = streamer(
        size,
        Arc::new(StubCatalog::new(size)),
        Arc::new(MemoryByteSource::new()),
        RasterCompositor::new(4096).with_filter(config.resize_filter),
        &config,
    );
    let mut in_flight = streamer.subscribe_in_flight();

    streamer.set_region_of_interest(&RegionOfInterest::full_view(2048.0, 1024.0));
    let texture = streamer.texture().expect("texture");
    let background = texture.snapshot();
    assert_eq!(background.dimensions(), (1024, 512));
    assert_eq!(background.get_pixel(700, 300).0, [0, 0, 255, 255]);

    settle(&mut in_flight).await;

    let painted = texture.snapshot();
    for (x, y) in [(0, 0), (511, 511), (512, 0), (1023, 511)] {
        assert_eq!(painted.get_pixel(x, y).0, [200, 100, 50, 255], "({x}, {y})");
    }
}
