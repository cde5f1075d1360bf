//! Utility modules for the static site generator.

pub mod exclude;
pub mod log;
pub mod path;
