//! Construction-time errors for the tile loader.

use std::io;
use thiserror::Error;

use crate::fetch::FetchError;

/// Errors that can occur while building a [`TileLoader`].
///
/// Runtime failures (network, disk, parse) never surface here; they are
/// absorbed per tile and reflected in the tile's terminal state.
///
/// [`TileLoader`]: crate::loader::TileLoader
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The tile URL template is missing one of the required `{z}`, `{x}`,
    /// `{y}` placeholders.
    #[error("URL template is missing the {placeholder} placeholder: {template:?}")]
    InvalidUrlTemplate {
        template: String,
        placeholder: &'static str,
    },

    /// The worker runtime could not be started.
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[from] io::Error),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] FetchError),
}
