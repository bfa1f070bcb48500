//! `[[pages]]` and `[scan]` section configuration.
//!
//! Declared pages are listed directly in `mpa.toml`; scanned pages are
//! derived from directories that share a conventional layout. Declared
//! pages take precedence over scanned ones on name collision.

use super::defaults;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

/// One declared virtual page.
///
/// # Example
/// ```toml
/// [[pages]]
/// name = "about"
/// filename = "about.html"        # defaults to "{name}.html"
/// template = "templates/about.html"
/// entry = "/src/about/main.js"   # root-absolute
///
/// [pages.data]
/// title = "About us"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageConfig {
    /// Unique page name. Used by the default rewrite rule, must not
    /// contain '/'.
    pub name: String,

    /// Output-relative file name, must end with `.html` and must not
    /// start with '/'. Defaults to `{name}.html`.
    #[serde(default)]
    pub filename: Option<String>,

    /// Higher-priority template file, overrides the default template.
    #[serde(default)]
    pub template: Option<String>,

    /// Entry script appended to the template body. Must be a
    /// root-absolute path ('/src/...').
    #[serde(default)]
    pub entry: Option<String>,

    /// Data injected into template rendering.
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
}

/// `[scan]` section - derive pages from similarly-structured directories.
///
/// Every immediate subdirectory of each scan root becomes a page named
/// after the subdirectory.
///
/// # Example
/// ```toml
/// [scan]
/// dirs = ["src/pages"]
/// entry_file = "main.js"         # page entry, only if the file exists
/// template_file = "index.html"   # page template, only if the file exists
/// filename = "{name}.html"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    /// Directories whose subdirectories become pages.
    #[serde(default)]
    pub dirs: Vec<PathBuf>,

    /// Conventional entry file name inside each subdirectory.
    #[serde(default)]
    pub entry_file: Option<String>,

    /// Conventional template file name inside each subdirectory.
    #[serde(default)]
    pub template_file: Option<String>,

    /// Virtual file name pattern; `{name}` expands to the subdirectory
    /// name.
    #[serde(default = "defaults::scan::filename")]
    pub filename: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            entry_file: None,
            template_file: None,
            filename: defaults::scan::filename(),
        }
    }
}
