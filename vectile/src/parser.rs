//! Parser seam between raw tile bytes and the renderer's tile model.
//!
//! The binary vector-tile format is not interpreted by this crate. The
//! application supplies a [`TileParser`] implementation wrapping its real
//! decoder; tests supply counting or failing parsers to drive the loader
//! through its failure paths.

use thiserror::Error;

/// Decodes raw tile bytes into the application's parsed tile model.
///
/// Implementations must be pure with respect to the byte input: the same
/// bytes always produce the same outcome. Parsing runs on worker threads,
/// possibly for many tiles at once.
pub trait TileParser: Send + Sync + 'static {
    /// The parsed tile representation. Opaque to the loader; stored
    /// behind an `Arc` and handed out read-only.
    type Tile: Send + Sync + 'static;

    /// Parses one tile. Failure marks the tile as permanently failed for
    /// the session, so implementations should not fail on recoverable
    /// conditions.
    fn parse(&self, bytes: &[u8]) -> Result<Self::Tile, ParseError>;
}

/// Error produced when tile bytes cannot be decoded.
#[derive(Debug, Clone, Error)]
#[error("malformed tile data: {reason}")]
pub struct ParseError {
    reason: String,
}

impl ParseError {
    /// Creates a parse error with a human-readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
