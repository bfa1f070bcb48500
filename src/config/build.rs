//! `[build]` section configuration.
//!
//! Output paths, the default template, and the HTML post-processing
//! toggle.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in mpa.toml.
///
/// # Example
/// ```toml
/// [build]
/// output = "dist"
/// template = "index.html"   # default template for pages without one
/// minify = true
/// manifest = "entries.json" # entry-name -> output-path map for bundlers
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Output directory, relative to the project root.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Default template file, relative to the project root.
    #[serde(default = "defaults::build::template")]
    #[educe(Default = defaults::build::template())]
    pub template: PathBuf,

    /// Minify rendered HTML.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub minify: bool,

    /// Entry manifest file name, written into the output directory.
    #[serde(default = "defaults::build::manifest")]
    #[educe(Default = defaults::build::manifest())]
    pub manifest: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::super::AppConfig;
    use std::path::Path;

    #[test]
    fn test_build_config_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.output, Path::new("dist"));
        assert_eq!(config.build.template, Path::new("index.html"));
        assert!(!config.build.minify);
        assert_eq!(config.build.manifest, Path::new("entries.json"));
    }

    #[test]
    fn test_build_config_override() {
        let config = r#"
            [build]
            output = "public"
            template = "templates/base.html"
            minify = true
        "#;
        let config: AppConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.output, Path::new("public"));
        assert_eq!(config.build.template, Path::new("templates/base.html"));
        assert!(config.build.minify);
    }
}
