//! Runtime configuration for the streamer and the bundled sources.

use anyhow::{Context, anyhow, ensure};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::pyramid::{TILE_MAX_REQUEST_LEVEL, TILE_MIN_REQUEST_LEVEL};

/// Source that produced the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Resampling filter used when a tile is scaled into the raster target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Texture streamer tuning.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// Coarsest pyramid level ever requested. Zoomed-out views are served
    /// from this level instead of fetching tiny tiles.
    pub min_request_level: u32,
    /// Upper bound for the render target's longer side, applied on top of
    /// the backend's own limit.
    pub max_texture_size: Option<u32>,
    /// Buffered "texture updated" events per subscriber before the slowest
    /// one starts lagging.
    pub event_capacity: usize,
    /// Filter for the CPU compositor.
    pub resize_filter: ResizeFilter,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            min_request_level: TILE_MIN_REQUEST_LEVEL,
            max_texture_size: None,
            event_capacity: 64,
            resize_filter: ResizeFilter::default(),
        }
    }
}

impl StreamerConfig {
    /// Reject levels whose tiles cannot be identified.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.min_request_level <= TILE_MAX_REQUEST_LEVEL,
            "streamer.min_request_level {} exceeds the deepest requestable level {}",
            self.min_request_level,
            TILE_MAX_REQUEST_LEVEL
        );
        Ok(())
    }
}

/// Settings for [`HttpTileSource`](crate::sources::HttpTileSource).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSourceConfig {
    /// Catalog endpoint; `{image_id}` and `{z}` are substituted per request.
    pub catalog_url_template: String,
    pub timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            catalog_url_template:
                "http://localhost:8080/images/{image_id}/tiles/{z}".to_string(),
            timeout_ms: 30_000,
            pool_max_idle_per_host: 10,
            user_agent: format!("tilestream/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TileStreamConfig {
    pub streamer: StreamerConfig,
    pub http: HttpSourceConfig,
}

impl TileStreamConfig {
    /// Load configuration using environment variables.
    /// Evaluation order:
    /// 1) `$TILESTREAM_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$TILESTREAM_CONFIG_JSON` (inline JSON),
    /// 3) the first default file found in the working directory,
    /// 4) defaults.
    pub fn load_from_env() -> anyhow::Result<(Self, ConfigSource)> {
        if let Ok(path_str) = env::var("TILESTREAM_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::EnvPath(path)));
        }

        if let Ok(raw) = env::var("TILESTREAM_CONFIG_JSON")
            && !raw.trim().is_empty()
        {
            let parsed = Self::parse_json(&raw)
                .context("failed to parse TILESTREAM_CONFIG_JSON")?;
            return Ok((parsed, ConfigSource::EnvInline));
        }

        if let Some(path) = Self::find_default_file() {
            let config = Self::load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        Ok((Self::default(), ConfigSource::Default))
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read tilestream config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid tilestream config {}", path.display())
            }),
            Some("toml") => toml::from_str::<Self>(&contents)
                .map_err(|err| {
                    anyhow!(
                        "invalid tilestream config {}: {}",
                        path.display(),
                        err
                    )
                })
                .and_then(Self::validated),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<Self> {
        toml::from_str::<Self>(contents)
            .or_else(|toml_err| {
                serde_json::from_str(contents).map_err(|json_err| {
                    anyhow!(
                        "failed to parse tilestream config {}: toml error: {}; json error: {}",
                        origin,
                        toml_err,
                        json_err
                    )
                })
            })
            .and_then(Self::validated)
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str::<Self>(raw)
            .map_err(|err| anyhow!("invalid tilestream config json: {err}"))
            .and_then(Self::validated)
    }

    fn validated(self) -> anyhow::Result<Self> {
        self.streamer.validate()?;
        Ok(self)
    }

    fn find_default_file() -> Option<PathBuf> {
        const CANDIDATES: &[&str] = &[
            "tilestream.toml",
            "tilestream.json",
            "config/tilestream.toml",
        ];

        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(|path| path.to_path_buf())
    }
}
