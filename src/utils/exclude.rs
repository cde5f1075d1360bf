//! Exclusion rules for the source tree walk.
//!
//! A path is excluded when its basename is listed explicitly, or when the
//! basename or any ancestor directory starts with the reserved prefix
//! (an underscore). The config file and the output, layouts and includes
//! directories are excluded by their location relative to the source root,
//! so a nested `blog/public/` stays part of the site. The same policy drives
//! the full build, the single-file rebuild and the watcher subscriptions.

use super::path::{basename, segments};
use crate::config::SiteConfig;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};

/// Names excluded regardless of configuration.
const RESERVED_NAMES: &[&str] = &[".git", "node_modules"];

/// Prefix marking private files and directories.
pub const PRIVATE_PREFIX: char = '_';

#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    names: FxHashSet<String>,
    /// Source-relative paths hidden together with everything below them.
    reserved_paths: Vec<PathBuf>,
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl ExclusionPolicy {
    /// Policy with the given explicit names plus the reserved ones.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = RESERVED_NAMES
            .iter()
            .map(|name| (*name).to_owned())
            .chain(names.into_iter().map(Into::into))
            .collect();

        Self {
            names,
            reserved_paths: Vec::new(),
        }
    }

    /// Build the policy for a loaded site configuration.
    ///
    /// Besides `exclude`, this hides the config file and the output,
    /// layouts and includes directories from the walk, whatever their names.
    /// Those living outside the source directory need no hiding.
    pub fn from_config(config: &SiteConfig) -> Self {
        let reserved_paths = [
            &config.config_path,
            &config.destination,
            &config.layouts,
            &config.includes,
        ]
        .into_iter()
        .filter_map(|path| path.strip_prefix(&config.source).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect();

        Self {
            reserved_paths,
            ..Self::new(config.exclude.iter().cloned())
        }
    }

    /// Whether a name or relative path is excluded.
    pub fn is_excluded(&self, name_or_path: &str) -> bool {
        let name = basename(name_or_path);

        self.names.contains(name)
            || self.names.contains(name_or_path)
            || name.starts_with(PRIVATE_PREFIX)
            || segments(name_or_path)
                .iter()
                .any(|dir| dir.starts_with(PRIVATE_PREFIX) || self.names.contains(*dir))
            || self.is_reserved(name_or_path)
    }

    fn is_reserved(&self, rel: &str) -> bool {
        let rel = Path::new(rel.trim_start_matches(['/', '\\']));
        self.reserved_paths.iter().any(|reserved| rel.starts_with(reserved))
    }

    /// [`is_excluded`](Self::is_excluded) for a path relative to the source root.
    pub fn is_excluded_path(&self, rel: &Path) -> bool {
        self.is_excluded(&rel.to_string_lossy())
    }
}
