//! Page registry: validates and compiles the page list into the lookup
//! tables used by the build entry map and the dev request pipeline.
//!
//! Compilation iterates declared pages first, then directory-scanned
//! pages. The first page to claim a name wins; later duplicates are
//! silently dropped, which gives declared pages priority over scanned
//! ones.

mod scan;
mod snapshot;

pub use scan::scan_pages;
pub use snapshot::{RegistryHandle, Snapshot};

use crate::config::{AppConfig, PageConfig};
use crate::utils::collapse_slashes;
use anyhow::Result;
use std::collections::BTreeMap;
use thiserror::Error;

/// One virtual HTML entry.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Unique identifier, used by the default rewrite rule.
    pub name: String,
    /// Output-relative file name; `None` defaults to `{name}.html`.
    pub filename: Option<String>,
    /// Override template path (root-relative); `None` falls back to the
    /// default template.
    pub template: Option<String>,
    /// Entry script, root-absolute when present.
    pub entry: Option<String>,
    /// Data injected into template rendering.
    pub data: BTreeMap<String, serde_json::Value>,
}

impl Page {
    pub fn from_config(config: &PageConfig) -> Self {
        Self {
            name: config.name.clone(),
            filename: config.filename.clone(),
            template: config.template.clone(),
            entry: config.entry.clone(),
            data: config.data.clone(),
        }
    }
}

/// Fatal page validation errors, raised at configuration time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("page name must not be empty")]
    EmptyName,

    #[error("'\\' is not allowed in {field} of page '{page}', use '/' instead (got '{value}')")]
    Backslash {
        page: String,
        field: &'static str,
        value: String,
    },

    #[error("page name must not contain '/', got '{0}'")]
    NameWithSlash(String),

    #[error("filename of page '{page}' must be a relative path, got '{filename}'")]
    AbsoluteFilename { page: String, filename: String },

    #[error("filename of page '{page}' must end with '.html', got '{filename}'")]
    FilenameNotHtml { page: String, filename: String },

    #[error(
        "entry of page '{page}' must be an absolute path relative to the project root, got '{entry}'"
    )]
    EntryNotAbsolute { page: String, entry: String },

    #[error("pages '{first}' and '{second}' both resolve to '{filename}'")]
    FilenameCollision {
        first: String,
        second: String,
        filename: String,
    },
}

/// Compile declared plus scanned pages into a snapshot.
///
/// Declared pages come first and win name collisions. Any validation
/// violation aborts compilation with an error naming the offending page
/// and field.
pub fn compile(
    declared: &[Page],
    scanned: &[Page],
    default_template: &str,
) -> Result<Snapshot, RegistryError> {
    let mut snapshot = Snapshot::default();
    snapshot
        .template_set
        .insert(collapse_slashes(default_template));

    for page in declared.iter().chain(scanned) {
        validate(page)?;

        let filename = page
            .filename
            .clone()
            .unwrap_or_else(|| format!("{}.html", page.name));

        if filename.starts_with('/') {
            return Err(RegistryError::AbsoluteFilename {
                page: page.name.clone(),
                filename,
            });
        }
        if !filename.ends_with(".html") {
            return Err(RegistryError::FilenameNotHtml {
                page: page.name.clone(),
                filename,
            });
        }

        // First-registered name wins; later duplicates are dropped.
        if snapshot.input_map.contains_key(&page.name) {
            continue;
        }

        let filename = collapse_slashes(&filename);
        if let Some(existing) = snapshot.virtual_page_map.get(&filename) {
            return Err(RegistryError::FilenameCollision {
                first: existing.name.clone(),
                second: page.name.clone(),
                filename,
            });
        }

        snapshot.input_map.insert(page.name.clone(), filename.clone());
        if let Some(template) = &page.template {
            snapshot.template_set.insert(collapse_slashes(template));
        }
        snapshot.virtual_page_map.insert(filename, page.clone());
    }

    Ok(snapshot)
}

/// Compile the full page list for a configuration: declared pages plus
/// the directory scan.
pub fn compile_from_config(config: &AppConfig) -> Result<Snapshot> {
    let declared: Vec<Page> = config.pages.iter().map(Page::from_config).collect();
    let scanned = scan_pages(&config.scan, config.get_root())?;
    let template = config.build.template.to_string_lossy();

    Ok(compile(&declared, &scanned, &template)?)
}

fn validate(page: &Page) -> Result<(), RegistryError> {
    if page.name.is_empty() {
        return Err(RegistryError::EmptyName);
    }

    let path_fields: [(&'static str, Option<&str>); 4] = [
        ("name", Some(page.name.as_str())),
        ("filename", page.filename.as_deref()),
        ("template", page.template.as_deref()),
        ("entry", page.entry.as_deref()),
    ];
    for (field, value) in path_fields {
        if let Some(value) = value
            && value.contains('\\')
        {
            return Err(RegistryError::Backslash {
                page: page.name.clone(),
                field,
                value: value.to_string(),
            });
        }
    }

    if page.name.contains('/') {
        return Err(RegistryError::NameWithSlash(page.name.clone()));
    }

    if let Some(entry) = &page.entry
        && !entry.starts_with('/')
    {
        return Err(RegistryError::EntryNotAbsolute {
            page: page.name.clone(),
            entry: entry.clone(),
        });
    }

    Ok(())
}
