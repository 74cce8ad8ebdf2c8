//! Bundled implementations of the catalog and byte boundaries.

pub mod fs;
pub mod http;

pub use fs::FsTileSource;
pub use http::HttpTileSource;
