//! Snapshot of resident tiles returned by a request.

use crate::coord::TileCoord;
use std::collections::HashMap;
use std::sync::Arc;

/// The tiles that were already resident when [`request_tiles`] was
/// called.
///
/// This is the binding point between rendering and asynchronous loading:
/// the renderer draws from this snapshot while workers fill in the rest.
/// Payload handles stay valid for as long as the snapshot (or any clone
/// of a handle) is held; a tile that has reached `Ok` is never replaced
/// or evicted within the session.
///
/// [`request_tiles`]: crate::loader::TileLoader::request_tiles
pub struct RequestTilesResult<T> {
    tiles: HashMap<TileCoord, Arc<T>>,
}

impl<T> RequestTilesResult<T> {
    pub(crate) fn new(tiles: HashMap<TileCoord, Arc<T>>) -> Self {
        Self { tiles }
    }

    /// Map of every requested tile that was ready to render.
    pub fn tiles(&self) -> &HashMap<TileCoord, Arc<T>> {
        &self.tiles
    }

    /// Looks up a single tile in the snapshot.
    pub fn get(&self, coord: TileCoord) -> Option<&T> {
        self.tiles.get(&coord).map(Arc::as_ref)
    }

    /// True if the snapshot contains this coordinate.
    pub fn contains(&self, coord: TileCoord) -> bool {
        self.tiles.contains_key(&coord)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
