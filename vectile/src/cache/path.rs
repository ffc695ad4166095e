//! Cache path construction and filename handling.

use crate::coord::TileCoord;
use std::path::{Path, PathBuf};

/// Directory under the cache root that holds tile files.
pub(crate) const TILES_SUBDIR: &str = "tiles";

/// File extension for cached vector tiles.
const TILE_EXTENSION: &str = "mvt";

/// Returns the cache filename for a tile, e.g. `z2x1y3.mvt`.
pub fn tile_file_name(coord: TileCoord) -> String {
    format!("{}.{}", coord, TILE_EXTENSION)
}

/// Constructs the full on-disk path for a cached tile.
///
/// The layout is flat below a single `tiles` directory:
/// ```text
/// <cache_root>/tiles/z<zoom>x<x>y<y>.mvt
/// ```
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use vectile::cache::tile_cache_path;
/// use vectile::coord::TileCoord;
///
/// let coord = TileCoord { zoom: 5, x: 17, y: 11 };
/// let path = tile_cache_path(&PathBuf::from("/cache"), coord);
/// assert_eq!(path, PathBuf::from("/cache/tiles/z5x17y11.mvt"));
/// ```
pub fn tile_cache_path(cache_root: &Path, coord: TileCoord) -> PathBuf {
    cache_root.join(TILES_SUBDIR).join(tile_file_name(coord))
}
