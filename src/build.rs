//! Build: render every virtual page to the output directory and emit
//! the entry manifest for the host bundler.

use crate::config::AppConfig;
use crate::log;
use crate::minify;
use crate::registry::{self, Page, Snapshot};
use crate::render;
use anyhow::{Context, Result};
use colored::Colorize;
use rayon::prelude::*;
use std::fs;

/// Compile the registry, render all pages in parallel, write the entry
/// manifest.
pub fn build_pages(config: &AppConfig) -> Result<()> {
    let snapshot = registry::compile_from_config(config)?;
    let root = config.get_root();
    let out_dir = root.join(&config.build.output);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    if config.serve.verbose {
        log_virtual_files(config, &snapshot);
    }

    let pages: Vec<(&String, &Page)> = snapshot.virtual_page_map.iter().collect();
    pages
        .par_iter()
        .try_for_each(|&(filename, page)| write_page(config, filename, page))?;

    let manifest = serde_json::to_string_pretty(&snapshot.input_map)?;
    let manifest_path = out_dir.join(&config.build.manifest);
    fs::write(&manifest_path, manifest)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    log!("build"; "{} pages written to {}", pages.len(), config.build.output.display());
    Ok(())
}

/// Log the virtual files the registry produced, one per line.
pub fn log_virtual_files(config: &AppConfig, snapshot: &Snapshot) {
    let out_dir = format!("<{}>/", config.build.output.display()).blue();
    let files = snapshot
        .input_map
        .values()
        .map(|filename| format!("{}{}", out_dir, filename.as_str().green()))
        .collect::<Vec<_>>()
        .join("\n");
    log!("build"; "Generated virtual files:\n{files}");
}

fn write_page(config: &AppConfig, filename: &str, page: &Page) -> Result<()> {
    let root = config.get_root();
    let template = render::load_template(page, &config.build.template, root)?;
    let html = render::render(&template, Some(page));
    let bytes = minify::post_process(html.as_bytes(), config.build.minify);

    let dest = root.join(&config.build.output).join(filename);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&dest, bytes.as_ref())
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageConfig;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn test_config(root: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.root = root.path().to_path_buf();
        config.serve.verbose = false;
        config
    }

    #[test]
    fn test_build_writes_pages_and_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.html"),
            "<html><body><h1>{{title}}</h1></body></html>",
        )
        .unwrap();

        let mut config = test_config(&dir);
        let mut data = BTreeMap::new();
        data.insert("title".to_string(), serde_json::json!("Home"));
        config.pages.push(PageConfig {
            name: "home".into(),
            filename: Some("index.html".into()),
            entry: Some("/src/main.js".into()),
            data,
            ..PageConfig::default()
        });
        config.pages.push(PageConfig {
            name: "about".into(),
            ..PageConfig::default()
        });

        build_pages(&config).unwrap();

        let out = dir.path().join("dist");
        let home = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(home.contains("<h1>Home</h1>"));
        assert!(home.contains("<script type=\"module\" src=\"/src/main.js\"></script>"));

        assert!(out.join("about.html").is_file());

        let manifest: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(out.join("entries.json")).unwrap()).unwrap();
        assert_eq!(manifest["home"], "index.html");
        assert_eq!(manifest["about"], "about.html");
    }

    #[test]
    fn test_build_creates_nested_output_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let mut config = test_config(&dir);
        config.pages.push(PageConfig {
            name: "admin".into(),
            filename: Some("nested/admin.html".into()),
            ..PageConfig::default()
        });

        build_pages(&config).unwrap();
        assert!(dir.path().join("dist/nested/admin.html").is_file());
    }

    #[test]
    fn test_build_fails_on_missing_template() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.pages.push(PageConfig {
            name: "home".into(),
            ..PageConfig::default()
        });

        assert!(build_pages(&config).is_err());
    }
}
