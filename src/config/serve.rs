//! `[serve]` section configuration.
//!
//! Development and preview server settings, including rewrite rules.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[serve]` section in mpa.toml - dev/preview server settings.
///
/// # Example
/// ```toml
/// [serve]
/// interface = "0.0.0.0"   # Listen on all interfaces
/// port = 5173
/// base = "/"
/// watch = true            # Watch files, reload page list on change
/// verbose = true          # Log request rewrites and file events
///
/// [[serve.rewrites]]
/// from = "^/app(/.*)?$"
/// to = "/index.html"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    #[serde(default = "defaults::serve::interface")]
    #[educe(Default = defaults::serve::interface())]
    pub interface: String,

    /// HTTP port number (default: 5173).
    #[serde(default = "defaults::serve::port")]
    #[educe(Default = defaults::serve::port())]
    pub port: u16,

    /// Public base path the site is served under.
    #[serde(default = "defaults::serve::base")]
    #[educe(Default = defaults::serve::base())]
    pub base: String,

    /// Enable the file watcher and reload push.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub watch: bool,

    /// Log rewrites and watch events.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub verbose: bool,

    /// Dev server rewrite rules. Set to `false` to disable rewriting
    /// entirely; omit for the built-in rules only.
    #[serde(default)]
    pub rewrites: RewritesConfig,

    /// Preview server rewrite rules, independent of the dev rules.
    #[serde(default)]
    pub preview_rewrites: RewritesConfig,
}

/// Rewrite rule list, or the literal `false` to disable rewriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RewritesConfig {
    /// `rewrites = false` turns off all rewriting, including the
    /// built-in rules.
    Toggle(bool),
    /// Consumer rules, evaluated before the built-in rules.
    Rules(Vec<RewriteRuleConfig>),
}

impl Default for RewritesConfig {
    fn default() -> Self {
        Self::Rules(Vec::new())
    }
}

impl RewritesConfig {
    /// Whether rewriting is disabled entirely.
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Toggle(false))
    }

    /// Consumer-declared rules (empty when disabled or toggled on).
    pub fn rules(&self) -> &[RewriteRuleConfig] {
        match self {
            Self::Rules(rules) => rules,
            Self::Toggle(_) => &[],
        }
    }
}

/// One consumer rewrite rule: a regex pattern and a replacement target.
///
/// The target may reference capture groups (`$1`, `${name}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewriteRuleConfig {
    pub from: String,
    pub to: String,
}
