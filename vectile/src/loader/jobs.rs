//! Per-tile load jobs.
//!
//! One job runs per coordinate per session, guaranteed by the registry's
//! pending-entry gate. A job walks the storage tiers in order: disk
//! cache, then the remote server (when web access is enabled). Blocking
//! syscalls and CPU-bound parsing run on the blocking thread pool; only
//! the network wait stays on the async workers.

use crate::coord::TileCoord;
use crate::loader::registry::LoadedTileState;
use crate::loader::LoaderShared;
use crate::parser::TileParser;
use std::fmt;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, error, warn};

/// Which storage tier produced the raw bytes for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadSource {
    Disk,
    Web,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadSource::Disk => write!(f, "disk"),
            LoadSource::Web => write!(f, "web"),
        }
    }
}

/// Loads one tile to its terminal state.
///
/// Short of a panicking parser, every exit path leaves the coordinate
/// in a terminal registry state. The registry lock is never held across
/// any of the work done here.
pub(crate) async fn load_tile<P: TileParser>(shared: Arc<LoaderShared<P>>, coord: TileCoord) {
    // Disk tier. The read is a blocking syscall, and on a hit the parse
    // happens right there on the same blocking thread.
    let disk_shared = Arc::clone(&shared);
    let disk_outcome = task::spawn_blocking(move || {
        match disk_shared.disk.try_read(coord) {
            Some(bytes) => {
                install_tile(&disk_shared, coord, &bytes, LoadSource::Disk);
                true
            }
            None => false,
        }
    })
    .await;

    match disk_outcome {
        Ok(true) => return,
        Ok(false) => {}
        Err(err) => {
            error!(tile = %coord, error = %err, "Disk load job panicked");
            return;
        }
    }

    // Network tier.
    let Some(fetcher) = shared.fetcher.as_ref() else {
        debug!(tile = %coord, "Tile not in disk cache and web access is disabled");
        finish_without_tile(&shared, coord, LoadedTileState::UnknownError);
        return;
    };

    match fetcher.fetch(coord).await {
        Ok(bytes) => {
            let install_shared = Arc::clone(&shared);
            let outcome = task::spawn_blocking(move || {
                // Write-through before parsing: even a tile that fails to
                // parse keeps its raw bytes on disk for inspection.
                if let Err(err) = install_shared.disk.write(coord, &bytes) {
                    warn!(
                        tile = %coord,
                        error = %err,
                        "Failed to write tile to disk cache, keeping it in memory only"
                    );
                }
                install_tile(&install_shared, coord, &bytes, LoadSource::Web);
            })
            .await;
            if let Err(err) = outcome {
                error!(tile = %coord, error = %err, "Parse job panicked");
            }
        }
        Err(err) => {
            warn!(tile = %coord, error = %err, "Tile download failed");
            finish_without_tile(&shared, coord, LoadedTileState::UnknownError);
        }
    }
}

/// Parses raw bytes and installs the result, notifying waiters.
///
/// Runs on a blocking-pool thread; the parse is CPU-bound.
fn install_tile<P: TileParser>(
    shared: &LoaderShared<P>,
    coord: TileCoord,
    bytes: &[u8],
    source: LoadSource,
) {
    match shared.parser.parse(bytes) {
        Ok(tile) => {
            let waiters =
                shared
                    .registry
                    .transition(coord, LoadedTileState::Ok, Some(Arc::new(tile)));
            debug!(
                tile = %coord,
                %source,
                waiters = waiters.len(),
                "Tile loaded"
            );
            shared.announce_finished(coord);
            for waiter in waiters {
                waiter(coord);
            }
        }
        Err(err) => {
            error!(tile = %coord, %source, error = %err, "Failed to parse tile");
            finish_without_tile(shared, coord, LoadedTileState::ParsingFailed);
        }
    }
}

/// Moves a tile to a non-Ok terminal state.
///
/// Waiters are dropped without being invoked; the renderer treats the
/// tile as a hole in the map.
fn finish_without_tile<P: TileParser>(
    shared: &LoaderShared<P>,
    coord: TileCoord,
    state: LoadedTileState,
) {
    let _dropped_waiters = shared.registry.transition(coord, state, None);
    shared.announce_finished(coord);
}
