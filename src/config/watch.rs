//! `[watch]` section configuration.
//!
//! Controls which filesystem events reach the page-reload handler. The
//! template-change full reload is independent of these filters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `[watch]` section in mpa.toml.
///
/// # Example
/// ```toml
/// [watch]
/// include = ["src/pages/**"]
/// exclude = ["**/node_modules/**"]
/// events = ["add", "unlink", "addDir", "unlinkDir"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Glob patterns of files to include. Empty means everything.
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns of files to exclude.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Event subset to react to. Omit for all events.
    #[serde(default)]
    pub events: Option<Vec<WatchEventKind>>,
}

/// Filesystem event kinds surfaced to the watch handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Unlink => "unlink",
            Self::AddDir => "addDir",
            Self::UnlinkDir => "unlinkDir",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::super::AppConfig;
    use super::*;

    #[test]
    fn test_watch_config() {
        let config = r#"
            [watch]
            include = ["src/pages/**"]
            exclude = ["**/ignored/**"]
            events = ["add", "unlinkDir"]
        "#;
        let config: AppConfig = toml::from_str(config).unwrap();

        assert_eq!(config.watch.include, vec!["src/pages/**"]);
        assert_eq!(config.watch.exclude, vec!["**/ignored/**"]);
        assert_eq!(
            config.watch.events,
            Some(vec![WatchEventKind::Add, WatchEventKind::UnlinkDir])
        );
    }

    #[test]
    fn test_watch_config_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.watch.include.is_empty());
        assert!(config.watch.exclude.is_empty());
        assert!(config.watch.events.is_none());
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(WatchEventKind::Add.to_string(), "add");
        assert_eq!(WatchEventKind::UnlinkDir.to_string(), "unlinkDir");
    }
}
