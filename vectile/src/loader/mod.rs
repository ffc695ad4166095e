//! Tile loading facade.
//!
//! [`TileLoader`] is the public entry point of the crate. It owns the
//! tile registry, the disk cache, the optional network fetcher and a
//! worker runtime, and exposes one non-blocking operation to the
//! renderer: [`TileLoader::request_tiles`].
//!
//! # Threading model
//!
//! `request_tiles` is safe to call from a paint callback: it takes the
//! registry mutex for a handful of map probes, enqueues load jobs, and
//! returns. Disk reads, downloads and parsing happen on the loader's own
//! runtime; completion callbacks run on whichever worker finishes a
//! tile, after all internal locks have been released, so a callback may
//! itself call back into the loader.

mod jobs;
mod registry;
mod result;

pub use registry::{
    InsertOutcome, LoadedTileState, LookupResult, TileLoadedCallback, TileRegistry,
};
pub use result::RequestTilesResult;

use crate::cache::DiskTileCache;
use crate::coord::TileCoord;
use crate::error::LoaderError;
use crate::fetch::{HttpClient, ReqwestClient, TileFetcher, DEFAULT_HTTP_TIMEOUT};
use crate::parser::TileParser;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;

/// Buffered tile-finished events per subscriber. A subscriber that lags
/// behind loses the oldest events, not the newest.
const FINISHED_EVENTS_CAPACITY: usize = 256;

/// Where the loader is allowed to look for tiles it does not have in
/// memory.
#[derive(Debug, Clone)]
pub enum LoaderMode {
    /// Disk cache first, then the remote server named by the URL
    /// template. The template must contain `{z}`, `{x}` and `{y}`.
    WebEnabled { url_template: String },
    /// Disk cache only. A tile missing from disk fails with
    /// `UnknownError`.
    LocalOnly,
    /// Test mode: misses are never loaded at all, from any tier.
    Dummy,
}

/// Returns the platform cache directory for this library.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vectile")
}

/// Tunables for a [`TileLoader`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Root directory of the disk cache; tiles live in a `tiles`
    /// subdirectory below it.
    pub cache_root: PathBuf,
    /// Worker threads for loading and parsing (default: hardware
    /// concurrency).
    pub worker_count: usize,
    /// Timeout for a single tile download.
    pub http_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl LoaderConfig {
    /// Set the disk cache root.
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    /// Set the number of worker threads.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the per-download timeout.
    pub fn with_http_timeout(mut self, http_timeout: Duration) -> Self {
        self.http_timeout = http_timeout;
        self
    }
}

/// State shared between the loader facade and its load jobs.
///
/// Jobs hold an `Arc` to this; the loader holds no pointers back into
/// jobs, so ownership stays acyclic.
pub(crate) struct LoaderShared<P: TileParser> {
    pub(crate) registry: TileRegistry<P::Tile>,
    pub(crate) disk: DiskTileCache,
    pub(crate) fetcher: Option<TileFetcher>,
    pub(crate) parser: P,
    finished_tx: broadcast::Sender<TileCoord>,
}

impl<P: TileParser> LoaderShared<P> {
    /// Broadcasts that a tile reached a terminal state, Ok or not. No
    /// subscribers is fine.
    pub(crate) fn announce_finished(&self, coord: TileCoord) {
        let _ = self.finished_tx.send(coord);
    }
}

/// Acquires and caches map tiles for a renderer.
///
/// See the [module documentation](self) for the threading model. All
/// methods take `&self`; wrap the loader in an `Arc` to share it with
/// completion callbacks.
pub struct TileLoader<P: TileParser> {
    shared: Arc<LoaderShared<P>>,
    runtime: Runtime,
    dispatch_enabled: bool,
}

impl<P: TileParser> TileLoader<P> {
    /// Creates a web-enabled loader downloading tiles through the given
    /// URL template, e.g. `https://tiles.example.com/{z}/{x}/{y}.pbf?key=k`.
    pub fn from_url_template(
        url_template: impl Into<String>,
        parser: P,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError> {
        let client = Arc::new(ReqwestClient::with_timeout(config.http_timeout)?);
        Self::from_url_template_with_client(url_template, client, parser, config)
    }

    /// Like [`from_url_template`], but with a caller-supplied HTTP
    /// transport. This is the seam tests use to run the full load path
    /// without a network.
    ///
    /// [`from_url_template`]: Self::from_url_template
    pub fn from_url_template_with_client(
        url_template: impl Into<String>,
        client: Arc<dyn HttpClient>,
        parser: P,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError> {
        let fetcher = TileFetcher::new(url_template, client)?;
        Self::build(Some(fetcher), parser, config, true)
    }

    /// Creates a loader that only reads the disk cache and never touches
    /// the network.
    pub fn new_local_only(parser: P, config: LoaderConfig) -> Result<Self, LoaderError> {
        Self::build(None, parser, config, true)
    }

    /// Creates a loader for tests that never dispatches any load work.
    /// Lookups, state queries and path derivation still operate on the
    /// given cache root.
    pub fn new_dummy(cache_root: impl Into<PathBuf>, parser: P) -> Result<Self, LoaderError> {
        let config = LoaderConfig::default()
            .with_cache_root(cache_root)
            .with_worker_count(1);
        Self::build(None, parser, config, false)
    }

    /// Creates a loader from a [`LoaderMode`] value.
    pub fn with_mode(mode: LoaderMode, parser: P, config: LoaderConfig) -> Result<Self, LoaderError> {
        match mode {
            LoaderMode::WebEnabled { url_template } => {
                Self::from_url_template(url_template, parser, config)
            }
            LoaderMode::LocalOnly => Self::new_local_only(parser, config),
            LoaderMode::Dummy => Self::new_dummy(config.cache_root, parser),
        }
    }

    fn build(
        fetcher: Option<TileFetcher>,
        parser: P,
        config: LoaderConfig,
        dispatch_enabled: bool,
    ) -> Result<Self, LoaderError> {
        let worker_count = config.worker_count.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_count)
            .max_blocking_threads(worker_count)
            .thread_name("vectile-worker")
            .enable_all()
            .build()?;

        let (finished_tx, _) = broadcast::channel(FINISHED_EVENTS_CAPACITY);

        Ok(Self {
            shared: Arc::new(LoaderShared {
                registry: TileRegistry::new(),
                disk: DiskTileCache::new(config.cache_root),
                fetcher,
                parser,
                finished_tx,
            }),
            runtime,
            dispatch_enabled,
        })
    }

    /// Grabs loaded tiles and enqueues loading of the missing ones.
    ///
    /// Returns the subset of `wanted` that is resident right now, as one
    /// consistent snapshot. The call never blocks on I/O and never waits
    /// for a tile: missing tiles are loaded in the background, and
    /// `on_loaded` fires once per tile that later loads successfully
    /// (and never for tiles that fail). To pick up newly loaded tiles,
    /// call `request_tiles` again, typically from the repaint the
    /// callback triggered.
    ///
    /// Loading only happens when `load_missing` is true *and* a callback
    /// is supplied; otherwise this is a pure lookup.
    pub fn request_tiles(
        &self,
        wanted: &BTreeSet<TileCoord>,
        on_loaded: Option<TileLoadedCallback>,
        load_missing: bool,
    ) -> RequestTilesResult<P::Tile> {
        let lookup = self.shared.registry.lookup(wanted.iter().copied());
        let result = RequestTilesResult::new(lookup.hits);

        let listener = match on_loaded {
            Some(listener) if load_missing && self.dispatch_enabled => listener,
            _ => return result,
        };

        let mut dispatch = Vec::new();
        let mut already_loaded = Vec::new();
        for &coord in wanted {
            if result.contains(coord) {
                continue;
            }
            match self
                .shared
                .registry
                .insert_pending(coord, Arc::clone(&listener))
            {
                InsertOutcome::Created => dispatch.push(coord),
                InsertOutcome::Joined => {}
                InsertOutcome::AlreadyTerminal(LoadedTileState::Ok) => already_loaded.push(coord),
                InsertOutcome::AlreadyTerminal(_) => {}
            }
        }

        // Tiles that finished between the snapshot scan and the pending
        // insert would otherwise never reach this caller. Notify here,
        // outside the registry lock.
        for coord in already_loaded {
            listener(coord);
        }

        for coord in dispatch {
            let shared = Arc::clone(&self.shared);
            self.runtime.spawn(jobs::load_tile(shared, coord));
        }

        result
    }

    /// Lookup-only shorthand: no callback, nothing is loaded.
    pub fn loaded_tiles(&self, wanted: &BTreeSet<TileCoord>) -> RequestTilesResult<P::Tile> {
        self.request_tiles(wanted, None, false)
    }

    /// Shorthand that loads whatever is missing and reports completions
    /// through `on_loaded`.
    pub fn request_tiles_with(
        &self,
        wanted: &BTreeSet<TileCoord>,
        on_loaded: TileLoadedCallback,
    ) -> RequestTilesResult<P::Tile> {
        self.request_tiles(wanted, Some(on_loaded), true)
    }

    /// Load state of a tile, if it has been requested this session.
    /// Mostly used by tests to check that tiles reached the right state.
    pub fn state_of(&self, coord: TileCoord) -> Option<LoadedTileState> {
        self.shared.registry.state_of(coord)
    }

    /// Full file path of a tile in the disk cache, whether or not the
    /// file exists.
    pub fn tile_disk_path(&self, coord: TileCoord) -> PathBuf {
        self.shared.disk.tile_path(coord)
    }

    /// Subscribes to tile-finished events. One event fires per tile that
    /// reaches a terminal state, whether it loaded or failed; the host
    /// typically uses this to schedule a repaint.
    pub fn subscribe_tile_finished(&self) -> broadcast::Receiver<TileCoord> {
        self.shared.finished_tx.subscribe()
    }

    /// Requests cancellation of in-flight loads.
    ///
    /// Currently a no-op: once dispatched, a tile always runs to a
    /// terminal state. The hook exists so a session-shutdown path can
    /// be added without changing callers.
    pub fn cancel_pending_loads(&self) {}
}
