//! Site configuration management for `_config.toml`.
//!
//! # Example
//!
//! ```toml
//! source = "."
//! destination = "_site"
//! exclude = ["README.md", "Makefile"]
//! templates = ["html", "md"]
//!
//! [serve]
//! port = 4000
//! ```
//!
//! All paths are normalized to absolute form after loading: `source` and
//! `destination` against the project root, `layouts` and `includes` against
//! the source directory. The loaded value is passed explicitly to the
//! builder, watcher and server.

pub mod defaults;
mod error;
mod serve;

pub use error::ConfigError;
use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing `_config.toml`
#[derive(Debug, Clone, Educe, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Project root, set from the CLI after loading
    #[serde(skip)]
    #[educe(Default = defaults::root())]
    pub root: Option<PathBuf>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory holding the source documents.
    #[serde(default = "defaults::source")]
    #[educe(Default = defaults::source())]
    pub source: PathBuf,

    /// Directory receiving the rendered site.
    #[serde(default = "defaults::destination")]
    #[educe(Default = defaults::destination())]
    pub destination: PathBuf,

    /// Extra file or directory names left out of the build.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Layout documents, looked up as `<layouts>/<name>.html`.
    #[serde(default = "defaults::layouts")]
    #[educe(Default = defaults::layouts())]
    pub layouts: PathBuf,

    /// Files available to `{% include name %}`.
    #[serde(default = "defaults::includes")]
    #[educe(Default = defaults::includes())]
    pub includes: PathBuf,

    /// Extensions rendered as templates; everything else is copied.
    #[serde(default = "defaults::templates")]
    #[educe(Default = defaults::templates())]
    pub templates: Vec<String>,

    /// Copy template files without a front matter block instead of rendering them.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub require_front_matter: bool,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load the config named by the CLI, falling back to defaults when the
    /// file does not exist, then apply CLI overrides and validate.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        config.validate()?;

        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.source, cli.source.as_ref());
        Self::update_option(&mut self.destination, cli.destination.as_ref());
        self.update_path_with_root(&root, &cli.config);

        if let Commands::Serve {
            interface,
            port,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve every configured path to absolute form.
    fn update_path_with_root(&mut self, root: &Path, config_name: &Path) {
        let root = Self::normalize_path(root);

        self.config_path = Self::normalize_path(&root.join(config_name));
        self.source = Self::normalize_path(&root.join(&self.source));
        self.destination = Self::normalize_path(&root.join(&self.destination));
        self.layouts = Self::normalize_path(&self.source.join(&self.layouts));
        self.includes = Self::normalize_path(&self.source.join(&self.includes));

        self.root = Some(root);
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[source] `{}` is not a directory",
                self.source.display()
            )));
        }

        // `clean` removes the destination tree
        if self.source.starts_with(&self.destination) {
            bail!(ConfigError::Validation(
                "[destination] must not be or contain [source]".into()
            ));
        }

        if let Some(ext) = self
            .templates
            .iter()
            .find(|ext| ext.is_empty() || ext.contains('.'))
        {
            bail!(ConfigError::Validation(format!(
                "[templates] entry `{ext}` must be a bare extension such as `html`"
            )));
        }

        Ok(())
    }
}
