//! Application configuration management for `mpa.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                        |
//! |--------------|------------------------------------------------|
//! | `[build]`    | Output dir, default template, minify, manifest |
//! | `[serve]`    | Dev/preview server (port, base, rewrites)      |
//! | `[watch]`    | Watch filters (include/exclude/events)         |
//! | `[scan]`     | Directory scan for convention-based pages      |
//! | `[[pages]]`  | Declared virtual pages                         |
//!
//! # Example
//!
//! ```toml
//! [build]
//! template = "index.html"
//!
//! [serve]
//! port = 5173
//!
//! [[pages]]
//! name = "home"
//! filename = "index.html"
//! entry = "/src/main.js"
//! ```

mod build;
pub mod defaults;
mod error;
mod pages;
mod serve;
mod watch;

pub use pages::{PageConfig, ScanConfig};
pub use serve::{RewriteRuleConfig, RewritesConfig, ServeConfig};
pub use watch::{WatchConfig, WatchEventKind};

use build::BuildConfig;
use error::ConfigError;

use crate::cli::{Cli, Commands};
use crate::utils::normalize_base;
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing mpa.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory (the config file's parent)
    #[serde(skip)]
    pub root: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Watch filters
    #[serde(default)]
    pub watch: WatchConfig,

    /// Directory scan settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Declared virtual pages
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

impl AppConfig {
    /// Load configuration from a toml file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let mut config: Self = toml::from_str(&content)?;

        config.config_path = path
            .canonicalize()
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config)
    }

    /// Merge CLI arguments over the file configuration.
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        if let Some(verbose) = cli.verbose {
            self.serve.verbose = verbose;
        }

        match &cli.command {
            Commands::Build { build_args } => {
                if let Some(minify) = build_args.minify {
                    self.build.minify = minify;
                }
            }
            Commands::Serve {
                build_args,
                interface,
                port,
                watch,
            } => {
                if let Some(minify) = build_args.minify {
                    self.build.minify = minify;
                }
                if let Some(interface) = interface {
                    self.serve.interface = interface.clone();
                }
                if let Some(port) = port {
                    self.serve.port = *port;
                }
                if let Some(watch) = watch {
                    self.serve.watch = *watch;
                }
            }
            Commands::Preview { interface, port } => {
                if let Some(interface) = interface {
                    self.serve.interface = interface.clone();
                }
                if let Some(port) = port {
                    self.serve.port = *port;
                }
            }
        }
    }

    /// Validate configuration consistency after CLI merge.
    pub fn validate(&self) -> Result<()> {
        if self.serve.interface.parse::<std::net::IpAddr>().is_err() {
            bail!(
                "Invalid serve.interface '{}', expected an IP address",
                self.serve.interface
            );
        }
        if self.serve.base.contains('\\') {
            bail!("serve.base must use '/' separators, got '{}'", self.serve.base);
        }
        if self.build.template.as_os_str().is_empty() {
            bail!("build.template must not be empty");
        }
        Ok(())
    }

    /// Project root directory.
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Canonical base path in `/…/` form.
    pub fn base(&self) -> String {
        normalize_base(&self.serve.base)
    }
}
