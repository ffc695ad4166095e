//! On-disk tile cache.
//!
//! The disk tier stores the raw upstream bytes for each tile, unmodified:
//! no framing, no metadata sidecar. The filename alone encodes the tile
//! coordinate, so the cache can be inspected (and preloaded by tests)
//! with ordinary file tools.

mod disk;
mod path;

pub use disk::{CacheError, DiskTileCache};
pub use path::{tile_cache_path, tile_file_name};
