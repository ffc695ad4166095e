//! In-memory tile registry, the single source of truth for tile state.
//!
//! Every tile coordinate the session has ever requested has exactly one
//! entry here. An entry is mutated twice in its lifetime: inserted as
//! `Pending` by the first request that misses, and moved once to a
//! terminal state by whichever worker finishes the load. Terminal states
//! are sticky; nothing is ever removed.
//!
//! All operations take one mutex over the whole map and hold it only for
//! map probes. No I/O, parsing or callback invocation happens under the
//! lock; [`TileRegistry::transition`] *returns* the drained waiter list so
//! the caller can invoke listeners after releasing it. A listener is
//! therefore free to re-enter the loader without deadlocking.

use crate::coord::TileCoord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Callback invoked on a worker thread when a requested tile finishes
/// loading successfully.
pub type TileLoadedCallback = Arc<dyn Fn(TileCoord) + Send + Sync>;

/// Load state of a tile known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadedTileState {
    /// An asynchronous load job owns this coordinate.
    Pending,
    /// Parsed and resident in memory, ready to render.
    Ok,
    /// The bytes were acquired but could not be parsed.
    ParsingFailed,
    /// The load was cancelled. Currently never entered; reserved for a
    /// session-shutdown path.
    Cancelled,
    /// The bytes could not be acquired (network failure, or a miss in
    /// local-only mode).
    UnknownError,
}

impl LoadedTileState {
    /// True for every state except `Pending`. A terminal state is sticky
    /// for the lifetime of the process.
    pub fn is_terminal(self) -> bool {
        !matches!(self, LoadedTileState::Pending)
    }
}

/// Outcome of [`TileRegistry::insert_pending`].
pub enum InsertOutcome {
    /// A new pending entry was installed; the caller must dispatch a
    /// load job for this coordinate.
    Created,
    /// An in-flight entry absorbed the listener; no new work is needed.
    Joined,
    /// The tile already reached a terminal state. If that state is `Ok`
    /// the caller should invoke the listener immediately (the tile
    /// finished between the caller's lookup and this call); otherwise
    /// the listener is dropped.
    AlreadyTerminal(LoadedTileState),
}

struct StoredTile<T> {
    state: LoadedTileState,
    /// Populated exactly when `state == Ok`.
    tile: Option<Arc<T>>,
    /// Callbacks to invoke when the tile loads. Non-empty only while
    /// `state == Pending`; drained at the terminal transition.
    waiters: Vec<TileLoadedCallback>,
}

impl<T> StoredTile<T> {
    fn new_pending(listener: TileLoadedCallback) -> Self {
        Self {
            state: LoadedTileState::Pending,
            tile: None,
            waiters: vec![listener],
        }
    }

    fn is_ready_to_render(&self) -> bool {
        self.state == LoadedTileState::Ok
    }
}

/// Result of a [`TileRegistry::lookup`] scan.
pub struct LookupResult<T> {
    /// Tiles that are resident and renderable right now.
    pub hits: HashMap<TileCoord, Arc<T>>,
    /// State of every requested coordinate the registry knows about.
    /// Coordinates never requested before are absent.
    pub states: HashMap<TileCoord, LoadedTileState>,
}

/// Mutex-guarded map from tile coordinate to load state and payload.
pub struct TileRegistry<T> {
    tiles: Mutex<HashMap<TileCoord, StoredTile<T>>>,
}

impl<T> TileRegistry<T> {
    pub fn new() -> Self {
        Self {
            tiles: Mutex::new(HashMap::new()),
        }
    }

    /// Scans the requested coordinates in a single lock acquisition.
    ///
    /// The returned hits are a consistent snapshot: every payload handle
    /// was `Ok` at one common instant. The sticky-terminal rule keeps the
    /// handles valid indefinitely afterwards.
    pub fn lookup<I>(&self, wanted: I) -> LookupResult<T>
    where
        I: IntoIterator<Item = TileCoord>,
    {
        let tiles = self.tiles.lock().unwrap();
        let mut hits = HashMap::new();
        let mut states = HashMap::new();
        for coord in wanted {
            if let Some(stored) = tiles.get(&coord) {
                states.insert(coord, stored.state);
                if stored.is_ready_to_render() {
                    if let Some(tile) = &stored.tile {
                        hits.insert(coord, Arc::clone(tile));
                    }
                }
            }
        }
        LookupResult { hits, states }
    }

    /// Registers interest in a coordinate, creating a pending entry if
    /// none exists.
    ///
    /// This is the single-flight gate: for any coordinate, exactly one
    /// caller across all threads observes [`InsertOutcome::Created`] per
    /// session, and only that caller dispatches a load job.
    pub fn insert_pending(
        &self,
        coord: TileCoord,
        listener: TileLoadedCallback,
    ) -> InsertOutcome {
        let mut tiles = self.tiles.lock().unwrap();
        // Entry API so the check and the insert are one atomic probe.
        match tiles.entry(coord) {
            Entry::Vacant(entry) => {
                entry.insert(StoredTile::new_pending(listener));
                InsertOutcome::Created
            }
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                if stored.state == LoadedTileState::Pending {
                    stored.waiters.push(listener);
                    InsertOutcome::Joined
                } else {
                    InsertOutcome::AlreadyTerminal(stored.state)
                }
            }
        }
    }

    /// Moves a pending tile to a terminal state, attaching the payload
    /// when the state is `Ok`.
    ///
    /// Returns the drained waiter list. The caller must invoke those
    /// callbacks (only for an `Ok` transition) *after* this method
    /// returns, never while holding other registry-dependent locks.
    ///
    /// A transition for a coordinate that is absent or already terminal
    /// is a bug in the dispatch bookkeeping; it is logged and ignored so
    /// the sticky-terminal rule holds regardless.
    pub fn transition(
        &self,
        coord: TileCoord,
        new_state: LoadedTileState,
        tile: Option<Arc<T>>,
    ) -> Vec<TileLoadedCallback> {
        debug_assert!(new_state.is_terminal());
        debug_assert_eq!(new_state == LoadedTileState::Ok, tile.is_some());

        let mut tiles = self.tiles.lock().unwrap();
        let Some(stored) = tiles.get_mut(&coord) else {
            warn!(tile = %coord, "Transition for a tile that was never requested");
            return Vec::new();
        };
        if stored.state != LoadedTileState::Pending {
            warn!(
                tile = %coord,
                state = ?stored.state,
                "Transition for a tile that is no longer pending"
            );
            return Vec::new();
        }

        stored.state = new_state;
        stored.tile = if new_state == LoadedTileState::Ok {
            tile
        } else {
            None
        };
        std::mem::take(&mut stored.waiters)
    }

    /// Load state of a coordinate, if it has been requested this session.
    pub fn state_of(&self, coord: TileCoord) -> Option<LoadedTileState> {
        let tiles = self.tiles.lock().unwrap();
        tiles.get(&coord).map(|stored| stored.state)
    }

    /// Number of coordinates the registry has seen this session.
    pub fn entry_count(&self) -> usize {
        self.tiles.lock().unwrap().len()
    }
}

impl<T> Default for TileRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coord(zoom: u8, x: u32, y: u32) -> TileCoord {
        TileCoord { zoom, x, y }
    }

    fn counting_listener(counter: &Arc<AtomicUsize>) -> TileLoadedCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn noop_listener() -> TileLoadedCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry: TileRegistry<String> = TileRegistry::new();
        assert_eq!(registry.entry_count(), 0);
        assert!(registry.state_of(coord(0, 0, 0)).is_none());
    }

    #[test]
    fn test_first_insert_creates_pending() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let c = coord(1, 0, 1);

        let outcome = registry.insert_pending(c, noop_listener());

        assert!(matches!(outcome, InsertOutcome::Created));
        assert_eq!(registry.state_of(c), Some(LoadedTileState::Pending));
    }

    #[test]
    fn test_second_insert_joins_pending() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let c = coord(1, 0, 1);

        assert!(matches!(
            registry.insert_pending(c, noop_listener()),
            InsertOutcome::Created
        ));
        assert!(matches!(
            registry.insert_pending(c, noop_listener()),
            InsertOutcome::Joined
        ));
        assert_eq!(registry.entry_count(), 1);
    }

    #[test]
    fn test_transition_ok_drains_all_waiters() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let c = coord(2, 1, 1);
        let counter = Arc::new(AtomicUsize::new(0));

        registry.insert_pending(c, counting_listener(&counter));
        registry.insert_pending(c, counting_listener(&counter));
        registry.insert_pending(c, counting_listener(&counter));

        let waiters = registry.transition(
            c,
            LoadedTileState::Ok,
            Some(Arc::new("payload".to_string())),
        );
        assert_eq!(waiters.len(), 3);

        for waiter in waiters {
            waiter(c);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(registry.state_of(c), Some(LoadedTileState::Ok));
    }

    #[test]
    fn test_lookup_returns_only_ok_tiles() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let ok = coord(3, 1, 1);
        let pending = coord(3, 2, 2);
        let failed = coord(3, 3, 3);
        let unknown = coord(3, 4, 4);

        registry.insert_pending(ok, noop_listener());
        registry.insert_pending(pending, noop_listener());
        registry.insert_pending(failed, noop_listener());
        registry.transition(ok, LoadedTileState::Ok, Some(Arc::new("t".to_string())));
        registry.transition(failed, LoadedTileState::ParsingFailed, None);

        let result = registry.lookup([ok, pending, failed, unknown]);

        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[&ok].as_str(), "t");
        assert_eq!(result.states[&ok], LoadedTileState::Ok);
        assert_eq!(result.states[&pending], LoadedTileState::Pending);
        assert_eq!(result.states[&failed], LoadedTileState::ParsingFailed);
        assert!(!result.states.contains_key(&unknown));
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let c = coord(4, 0, 0);

        registry.insert_pending(c, noop_listener());
        registry.transition(c, LoadedTileState::UnknownError, None);

        // A late worker trying to overwrite the terminal state is ignored.
        let waiters = registry.transition(
            c,
            LoadedTileState::Ok,
            Some(Arc::new("late".to_string())),
        );
        assert!(waiters.is_empty());
        assert_eq!(registry.state_of(c), Some(LoadedTileState::UnknownError));
        assert!(registry.lookup([c]).hits.is_empty());
    }

    #[test]
    fn test_insert_after_terminal_reports_state() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let c = coord(5, 5, 5);

        registry.insert_pending(c, noop_listener());
        registry.transition(c, LoadedTileState::ParsingFailed, None);

        match registry.insert_pending(c, noop_listener()) {
            InsertOutcome::AlreadyTerminal(state) => {
                assert_eq!(state, LoadedTileState::ParsingFailed);
            }
            _ => panic!("expected AlreadyTerminal"),
        }
    }

    #[test]
    fn test_waiters_are_cleared_at_transition() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let c = coord(6, 1, 2);

        registry.insert_pending(c, noop_listener());
        let first = registry.transition(
            c,
            LoadedTileState::Ok,
            Some(Arc::new("x".to_string())),
        );
        assert_eq!(first.len(), 1);

        // Invariant: waiters drain exactly once.
        let second = registry.transition(
            c,
            LoadedTileState::Ok,
            Some(Arc::new("y".to_string())),
        );
        assert!(second.is_empty());
    }

    #[test]
    fn test_transition_unknown_coord_is_ignored() {
        let registry: TileRegistry<String> = TileRegistry::new();

        let waiters = registry.transition(coord(7, 7, 7), LoadedTileState::UnknownError, None);

        assert!(waiters.is_empty());
        assert!(registry.state_of(coord(7, 7, 7)).is_none());
    }

    #[test]
    fn test_non_ok_transition_stores_no_payload() {
        let registry: TileRegistry<String> = TileRegistry::new();
        let c = coord(8, 0, 1);

        registry.insert_pending(c, noop_listener());
        registry.transition(c, LoadedTileState::UnknownError, None);

        let result = registry.lookup([c]);
        assert!(result.hits.is_empty());
        assert_eq!(result.states[&c], LoadedTileState::UnknownError);
    }

    #[test]
    fn test_is_terminal() {
        assert!(!LoadedTileState::Pending.is_terminal());
        assert!(LoadedTileState::Ok.is_terminal());
        assert!(LoadedTileState::ParsingFailed.is_terminal());
        assert!(LoadedTileState::Cancelled.is_terminal());
        assert!(LoadedTileState::UnknownError.is_terminal());
    }

    #[test]
    fn test_concurrent_inserts_create_exactly_once() {
        let registry: Arc<TileRegistry<String>> = Arc::new(TileRegistry::new());
        let c = coord(9, 3, 3);
        let created = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let created = Arc::clone(&created);
                std::thread::spawn(move || {
                    if matches!(
                        registry.insert_pending(c, Arc::new(|_| {})),
                        InsertOutcome::Created
                    ) {
                        created.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.entry_count(), 1);
    }
}
