//! HTTP catalog and byte source.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tilestream_contracts::{
    SourceError, SourceResult, TileByteSource, TileCatalogSource,
};
use tilestream_model::{ImageId, TileDescriptor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::HttpSourceConfig;

/// Catalog bodies come either as a bare array or wrapped in `data`.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogResponse {
    List(Vec<TileDescriptor>),
    Wrapped { data: Vec<TileDescriptor> },
}

impl From<CatalogResponse> for Vec<TileDescriptor> {
    fn from(response: CatalogResponse) -> Self {
        match response {
            CatalogResponse::List(list) => list,
            CatalogResponse::Wrapped { data } => data,
        }
    }
}

/// Parse a catalog response body.
pub fn parse_catalog(body: &[u8]) -> SourceResult<Vec<TileDescriptor>> {
    serde_json::from_slice::<CatalogResponse>(body)
        .map(Into::into)
        .map_err(|e| SourceError::InvalidCatalog(e.to_string()))
}

fn transport(err: reqwest::Error) -> SourceError {
    SourceError::Transport(err.to_string())
}

fn status_error(status: StatusCode, url: &str) -> SourceError {
    if status == StatusCode::NOT_FOUND {
        SourceError::NotFound(url.to_string())
    } else {
        SourceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }
    }
}

/// Tile source over plain HTTP(S) with connection pooling.
///
/// Serves both boundaries: catalogs from a URL template, bytes from the
/// descriptor URLs the catalog returned.
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: Client,
    catalog_url_template: String,
}

impl HttpTileSource {
    pub fn new(config: &HttpSourceConfig) -> SourceResult<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(transport)?;

        Ok(Self::with_client(client, config.catalog_url_template.clone()))
    }

    pub fn with_client(
        client: Client,
        catalog_url_template: impl Into<String>,
    ) -> Self {
        Self {
            client,
            catalog_url_template: catalog_url_template.into(),
        }
    }

    pub fn catalog_url(&self, image_id: &ImageId, level: u32) -> String {
        self.catalog_url_template
            .replace("{image_id}", image_id.as_str())
            .replace("{z}", &level.to_string())
    }

    async fn get(&self, url: &str) -> SourceResult<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(transport)?;

        if !response.status().is_success() {
            return Err(status_error(response.status(), url));
        }

        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl TileCatalogSource for HttpTileSource {
    async fn tile_catalog(
        &self,
        image_id: &ImageId,
        level: u32,
    ) -> SourceResult<Vec<TileDescriptor>> {
        let url = self.catalog_url(image_id, level);
        debug!(%url, "fetching tile catalog");
        let body = self.get(&url).await?;
        parse_catalog(&body)
    }
}

#[async_trait::async_trait]
impl TileByteSource for HttpTileSource {
    async fn tile_bytes(
        &self,
        url: &str,
        cancel: CancellationToken,
    ) -> SourceResult<Vec<u8>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SourceError::Cancelled),
            result = self.get(url) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tilestream_model::TileCoords3D;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single request with `status` and `body`.
    async fn serve_once(status: &'static str, body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write");
        });
        addr
    }

    fn source(template: String) -> HttpTileSource {
        HttpTileSource::new(&HttpSourceConfig {
            catalog_url_template: template,
            ..HttpSourceConfig::default()
        })
        .expect("client builds")
    }

    #[test]
    fn template_substitutes_image_and_level() {
        let source = source("https://tiles/{image_id}/z{z}.json".into());
        assert_eq!(
            source.catalog_url(&ImageId::new("abc"), 11),
            "https://tiles/abc/z11.json"
        );
    }

    #[test]
    fn catalog_accepts_list_and_wrapped_bodies() {
        let list = parse_catalog(br#"[{"url":"u","x":1,"y":0,"z":11}]"#)
            .expect("list");
        let wrapped =
            parse_catalog(br#"{"data":[{"url":"u","x":1,"y":0,"z":11}]}"#)
                .expect("wrapped");
        assert_eq!(list, wrapped);
        assert_eq!(list[0].coords(), TileCoords3D::new(1, 0, 11));
    }

    #[test]
    fn malformed_catalog_is_rejected() {
        let err = parse_catalog(br#"{"tiles":[]}"#).unwrap_err();
        assert!(matches!(err, SourceError::InvalidCatalog(_)));
    }

    #[tokio::test]
    async fn catalog_is_fetched_over_http() {
        let addr = serve_once(
            "200 OK",
            r#"{"data":[{"url":"http://t/0_0","x":0,"y":0,"z":10}]}"#,
        )
        .await;
        let source = source(format!("http://{addr}/{{image_id}}/{{z}}"));

        let catalog = source
            .tile_catalog(&ImageId::new("img"), 10)
            .await
            .expect("catalog");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].url, "http://t/0_0");
    }

    #[tokio::test]
    async fn missing_tile_maps_to_not_found() {
        let addr = serve_once("404 Not Found", "").await;
        let url = format!("http://{addr}/tile.png");

        let err = source("unused".into())
            .tile_bytes(&url, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, SourceError::NotFound(url));
    }

    #[tokio::test]
    async fn server_errors_keep_their_status() {
        let addr = serve_once("503 Service Unavailable", "").await;
        let url = format!("http://{addr}/tile.png");

        let err = source("unused".into())
            .tile_bytes(&url, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let err = source("unused".into())
            .tile_bytes("http://127.0.0.1:9/never", token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
