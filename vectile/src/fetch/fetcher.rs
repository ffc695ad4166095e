//! Tile URL templating and per-tile downloads.

use crate::coord::TileCoord;
use crate::error::LoaderError;
use crate::fetch::http::{FetchError, HttpClient};
use std::sync::Arc;
use tracing::debug;

/// Placeholders a tile URL template must contain.
const REQUIRED_PLACEHOLDERS: [&str; 3] = ["{z}", "{x}", "{y}"];

/// Substitutes a tile coordinate into a URL template.
///
/// The `{z}`, `{x}` and `{y}` placeholders are replaced literally; the
/// rest of the template, including any query string or API key, passes
/// through untouched.
pub fn substitute_url(template: &str, coord: TileCoord) -> String {
    template
        .replace("{z}", &coord.zoom.to_string())
        .replace("{x}", &coord.x.to_string())
        .replace("{y}", &coord.y.to_string())
}

/// Downloads tiles from a remote server via a URL template.
///
/// The fetcher itself is stateless per request and performs no retries
/// and no per-coordinate deduplication; the loader's pending-entry
/// bookkeeping already guarantees at most one in-flight request per tile.
pub struct TileFetcher {
    template: String,
    client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for TileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFetcher")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl TileFetcher {
    /// Creates a fetcher for the given URL template.
    ///
    /// Returns an error if the template is missing any of the `{z}`,
    /// `{x}`, `{y}` placeholders, since such a template would fetch the
    /// same resource for every tile.
    pub fn new(
        template: impl Into<String>,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, LoaderError> {
        let template = template.into();
        for placeholder in REQUIRED_PLACEHOLDERS {
            if !template.contains(placeholder) {
                return Err(LoaderError::InvalidUrlTemplate {
                    template,
                    placeholder,
                });
            }
        }
        Ok(Self { template, client })
    }

    /// The resolved URL for one tile.
    pub fn tile_url(&self, coord: TileCoord) -> String {
        substitute_url(&self.template, coord)
    }

    /// Downloads the raw bytes for one tile.
    pub async fn fetch(&self, coord: TileCoord) -> Result<Vec<u8>, FetchError> {
        let url = self.tile_url(coord);
        let result = self.client.get(&url).await;
        match &result {
            Ok(bytes) => debug!(tile = %coord, bytes = bytes.len(), "Tile downloaded"),
            Err(err) => debug!(tile = %coord, error = %err, "Tile download failed"),
        }
        result
    }
}
