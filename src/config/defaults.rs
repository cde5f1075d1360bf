//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

use std::path::PathBuf;

pub fn r#true() -> bool {
    true
}

pub fn root() -> Option<PathBuf> {
    None
}

pub fn source() -> PathBuf {
    ".".into()
}

pub fn destination() -> PathBuf {
    "_site".into()
}

pub fn layouts() -> PathBuf {
    "_layouts".into()
}

pub fn includes() -> PathBuf {
    "_includes".into()
}

/// Extensions rendered as templates rather than copied.
pub fn templates() -> Vec<String> {
    vec!["html".into(), "md".into()]
}

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        4000
    }
}
