//! Disk cache with write-through semantics.

use crate::cache::path::{tile_cache_path, TILES_SUBDIR};
use crate::coord::TileCoord;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while writing to the disk cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Persistent cache of raw tile bytes, keyed by tile coordinate.
///
/// Reads and writes are blocking syscalls and must be issued from worker
/// threads, never from the render thread. All methods take `&self`; the
/// filesystem provides what little synchronization is needed, because the
/// loader guarantees at most one writer per coordinate per session.
#[derive(Debug, Clone)]
pub struct DiskTileCache {
    cache_root: PathBuf,
    tiles_dir: PathBuf,
}

impl DiskTileCache {
    /// Creates a cache rooted at `cache_root`. Tile files live in the
    /// `tiles` subdirectory, which is created lazily on first write.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        let cache_root = cache_root.into();
        let tiles_dir = cache_root.join(TILES_SUBDIR);
        Self {
            cache_root,
            tiles_dir,
        }
    }

    /// The cache root this cache was constructed with.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Full path of the cache file for a tile, whether or not it exists.
    pub fn tile_path(&self, coord: TileCoord) -> PathBuf {
        tile_cache_path(&self.cache_root, coord)
    }

    /// Reads a cached tile, returning its raw bytes.
    ///
    /// A missing file is the expected miss case and returns `None`
    /// silently. Any other I/O error is logged and also treated as a
    /// miss, so a corrupt cache degrades to re-fetching.
    pub fn try_read(&self, coord: TileCoord) -> Option<Vec<u8>> {
        let path = self.tile_path(coord);
        match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(
                    tile = %coord,
                    path = %path.display(),
                    error = %err,
                    "Disk cache read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Writes a tile's raw bytes to the cache.
    ///
    /// The bytes land in a temp file in the tiles directory first and are
    /// atomically renamed into place, so a concurrent reader sees either
    /// no file or a complete one, never a torn write. Parent directories
    /// are created on demand.
    pub fn write(&self, coord: TileCoord, bytes: &[u8]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.tiles_dir)?;

        let mut tmp = NamedTempFile::new_in(&self.tiles_dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.tile_path(coord))
            .map_err(|err| CacheError::Io(err.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn coord(zoom: u8, x: u32, y: u32) -> TileCoord {
        TileCoord { zoom, x, y }
    }

    #[test]
    fn test_read_missing_tile_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());

        assert!(cache.try_read(coord(0, 0, 0)).is_none());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());
        let c = coord(3, 4, 5);

        cache.write(c, b"tile payload").unwrap();

        assert_eq!(cache.try_read(c).unwrap(), b"tile payload");
    }

    #[test]
    fn test_write_creates_tiles_directory() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());

        cache.write(coord(1, 0, 1), &[0xAB]).unwrap();

        assert!(dir.path().join("tiles").is_dir());
        assert!(dir.path().join("tiles/z1x0y1.mvt").is_file());
    }

    #[test]
    fn test_write_leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());

        cache.write(coord(2, 2, 2), b"data").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join("tiles"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["z2x2y2.mvt"]);
    }

    #[test]
    fn test_rewrite_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());
        let c = coord(4, 1, 2);

        cache.write(c, b"first").unwrap();
        cache.write(c, b"second").unwrap();

        assert_eq!(cache.try_read(c).unwrap(), b"second");
    }

    #[test]
    fn test_tile_path_does_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());

        let path = cache.tile_path(coord(0, 0, 0));

        assert!(path.ends_with("tiles/z0x0y0.mvt"));
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_treated_as_miss() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let cache = DiskTileCache::new(dir.path());
        let c = coord(5, 6, 7);

        cache.write(c, b"secret").unwrap();
        let path = cache.tile_path(c);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Readable for root, so only assert when the permission actually bites.
        if fs::read(&path).is_err() {
            assert!(cache.try_read(c).is_none());
        }

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    }
}
