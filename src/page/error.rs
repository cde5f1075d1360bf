//! Errors raised while rendering a single document.
//!
//! Every variant is fatal for the file being rendered only; the tree walk
//! carries on with the remaining files.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("{kind} `{name}` not found at `{}`", path.display())]
    NotFound {
        kind: &'static str,
        name: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("layout cycle detected: {}", chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RenderError {
    pub(crate) fn not_found(kind: &'static str, name: &str, path: PathBuf, source: io::Error) -> Self {
        Self::NotFound {
            kind,
            name: name.to_owned(),
            path,
            source,
        }
    }
}
