//! Directory scan: derive pages from similarly-structured directories.
//!
//! Every immediate subdirectory of a scan root becomes a page named
//! after the subdirectory. The page's entry and template are set only
//! when the conventional files actually exist under it.

use super::Page;
use crate::config::ScanConfig;
use crate::utils::path_to_slash;
use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs, path::Path};

/// Scan the configured roots and produce the derived page list, sorted
/// by name for deterministic output.
pub fn scan_pages(scan: &ScanConfig, root: &Path) -> Result<Vec<Page>> {
    let mut pages = Vec::new();

    for dir in &scan.dirs {
        let abs_dir = root.join(dir);
        let entries = fs::read_dir(&abs_dir)
            .with_context(|| format!("Failed to scan directory {}", abs_dir.display()))?;

        for entry in entries.filter_map(Result::ok) {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let sub_dir = entry.path();
            let rel_dir = path_to_slash(&dir.join(&name));

            // Entry must be root-absolute; template stays root-relative.
            let page_entry = scan
                .entry_file
                .as_ref()
                .filter(|file| sub_dir.join(file.as_str()).is_file())
                .map(|file| format!("/{rel_dir}/{file}"));
            let template = scan
                .template_file
                .as_ref()
                .filter(|file| sub_dir.join(file.as_str()).is_file())
                .map(|file| format!("{rel_dir}/{file}"));

            pages.push(Page {
                filename: Some(scan.filename.replace("{name}", &name)),
                name,
                template,
                entry: page_entry,
                data: BTreeMap::new(),
            });
        }
    }

    pages.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(pages)
}
