//! vectile - Tile acquisition and caching core for a vector-map renderer
//!
//! This library answers one question for a renderer: "here are the tile
//! coordinates I want to draw this frame - which do you already have, and
//! can you go get the rest?" Resident tiles are returned immediately and
//! without blocking; missing tiles are loaded in the background from a
//! local disk cache or a remote tile server, parsed off-thread, and
//! announced through per-request callbacks as they become available.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use vectile::coord::TileCoord;
//! use vectile::loader::{LoaderConfig, TileLoader};
//!
//! let loader = TileLoader::from_url_template(
//!     "https://tiles.example.com/{z}/{x}/{y}.pbf?key=abc",
//!     MvtParser::new(),
//!     LoaderConfig::default(),
//! )?;
//!
//! let wanted: BTreeSet<TileCoord> = viewport_tiles();
//! let result = loader.request_tiles_with(
//!     &wanted,
//!     Arc::new(|coord| schedule_repaint(coord)),
//! );
//! // result.tiles() holds everything that was already resident.
//! ```

pub mod cache;
pub mod coord;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod parser;

/// Version of the vectile library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
