//! Request rewriting: resolve an incoming path to a virtual file name.
//!
//! Rules are ordered and the first match wins. Consumer-declared rules
//! run before the built-in ones:
//!
//! 1. consumer rules (regex → literal-with-captures or computed target)
//! 2. the default page rule: base path followed by a registered page
//!    name rewrites to that page's virtual file
//! 3. the trailing-slash rule: `/dir/` → `/dir/index.html`, but only
//!    when that file actually exists on disk
//!
//! The existence check goes through [`FileOracle`] so tests can stub it
//! without disk I/O.

use crate::config::RewritesConfig;
use crate::registry::Snapshot;
use crate::utils::collapse_slashes;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::PathBuf;

/// File-existence oracle used by the trailing-slash rule.
pub trait FileOracle: Send + Sync {
    /// Whether `rel` (base-stripped, '/'-separated) exists as a file.
    fn exists(&self, rel: &str) -> bool;
}

/// Checks existence under a fixed root directory.
pub struct DiskOracle {
    root: PathBuf,
}

impl DiskOracle {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl FileOracle for DiskOracle {
    fn exists(&self, rel: &str) -> bool {
        self.root.join(rel.trim_start_matches('/')).is_file()
    }
}

/// Context handed to a computed rewrite target.
pub struct MatchContext<'a> {
    /// The request path being rewritten (query already stripped).
    pub path: &'a str,
    /// Capture groups from the matched pattern; index 0 is the whole
    /// match.
    pub captures: Vec<String>,
}

/// Target of a rewrite rule.
pub enum RewriteTarget {
    /// Replacement string; `$1`/`${name}` expand to capture groups.
    Literal(String),
    /// Computed from the match context; the return value is used
    /// verbatim as the rewritten path.
    Computed(Box<dyn Fn(&MatchContext<'_>) -> String + Send + Sync>),
}

/// One ordered rewrite rule.
pub struct RewriteRule {
    pub from: Regex,
    pub to: RewriteTarget,
}

impl RewriteRule {
    pub fn literal(from: &str, to: &str) -> Result<Self> {
        let from = Regex::new(from).with_context(|| format!("Invalid rewrite pattern '{from}'"))?;
        Ok(Self {
            from,
            to: RewriteTarget::Literal(to.to_string()),
        })
    }

    fn apply(&self, path: &str) -> Option<String> {
        let caps = self.from.captures(path)?;
        match &self.to {
            RewriteTarget::Literal(replacement) => {
                let mut out = String::new();
                caps.expand(replacement, &mut out);
                Some(out)
            }
            RewriteTarget::Computed(compute) => {
                let captures = caps
                    .iter()
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                Some(compute(&MatchContext { path, captures }))
            }
        }
    }
}

/// Resolve `path` against the ordered rule set. `None` means no rule
/// matched and the request passes through unchanged.
pub fn resolve(
    path: &str,
    consumer_rules: &[RewriteRule],
    snapshot: &Snapshot,
    base: &str,
    oracle: &dyn FileOracle,
) -> Option<String> {
    for rule in consumer_rules {
        if let Some(target) = rule.apply(path) {
            return Some(target);
        }
    }

    // Default rule: base path followed by any registered page name,
    // rewritten by looking the name up in the current input map.
    if let Some(rule) = default_page_rule(snapshot, base)
        && let Some(target) = rule.apply(path)
    {
        return Some(target);
    }

    // Trailing-slash rule: /dir/ → /dir/index.html when present on disk.
    resolve_trailing_slash(path, base, oracle)
}

/// Build the default rule for the current snapshot: matches
/// `{base}{name}` (exact or with a trailing subpath) for every
/// registered name.
fn default_page_rule(snapshot: &Snapshot, base: &str) -> Option<RewriteRule> {
    if snapshot.input_map.is_empty() {
        return None;
    }

    let names = snapshot
        .input_map
        .keys()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    let from = Regex::new(&format!("^{}({})(/|$)", regex::escape(base), names)).ok()?;

    let input_map = snapshot.input_map.clone();
    let base = base.to_string();
    Some(RewriteRule {
        from,
        to: RewriteTarget::Computed(Box::new(move |ctx| {
            match input_map.get(&ctx.captures[1]) {
                Some(filename) => collapse_slashes(&format!("{base}{filename}")),
                None => ctx.path.to_string(),
            }
        })),
    })
}

fn resolve_trailing_slash(path: &str, base: &str, oracle: &dyn FileOracle) -> Option<String> {
    if path.ends_with('/') {
        let decoded = urlencoding::decode(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());
        let rewritten = format!("{decoded}index.html");
        let rel = rewritten.strip_prefix(base).unwrap_or(&rewritten);
        if oracle.exists(rel) {
            return Some(rewritten);
        }
    }

    None
}

/// Configured rewrite engine for one server. `None` from
/// [`RewriteEngine::from_config`] means rewriting is disabled entirely.
pub struct RewriteEngine {
    rules: Vec<RewriteRule>,
    base: String,
    oracle: Box<dyn FileOracle>,
}

impl RewriteEngine {
    pub fn from_config(
        config: &RewritesConfig,
        base: &str,
        oracle: Box<dyn FileOracle>,
    ) -> Result<Option<Self>> {
        if config.is_disabled() {
            return Ok(None);
        }
        let rules = config
            .rules()
            .iter()
            .map(|rule| RewriteRule::literal(&rule.from, &rule.to))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Self {
            rules,
            base: base.to_string(),
            oracle,
        }))
    }

    pub fn resolve(&self, path: &str, snapshot: &Snapshot) -> Option<String> {
        resolve(path, &self.rules, snapshot, &self.base, self.oracle.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Page, compile};

    struct StubOracle(bool);

    impl FileOracle for StubOracle {
        fn exists(&self, _rel: &str) -> bool {
            self.0
        }
    }

    fn snapshot() -> Snapshot {
        let pages = [
            Page {
                name: "home".into(),
                filename: Some("index.html".into()),
                ..Page::default()
            },
            Page {
                name: "about".into(),
                ..Page::default()
            },
        ];
        compile(&pages, &[], "index.html").unwrap()
    }

    #[test]
    fn test_default_rule_rewrites_page_names() {
        let snapshot = snapshot();
        let oracle = StubOracle(false);

        assert_eq!(
            resolve("/about", &[], &snapshot, "/", &oracle),
            Some("/about.html".into())
        );
        assert_eq!(
            resolve("/home", &[], &snapshot, "/", &oracle),
            Some("/index.html".into())
        );
        // client-side routed subpaths fall back to the page file
        assert_eq!(
            resolve("/about/team", &[], &snapshot, "/", &oracle),
            Some("/about.html".into())
        );
    }

    #[test]
    fn test_unknown_path_passes_through() {
        let snapshot = snapshot();
        let oracle = StubOracle(false);

        assert_eq!(resolve("/unknown", &[], &snapshot, "/", &oracle), None);
        // prefix of a name must not match
        assert_eq!(resolve("/aboutus", &[], &snapshot, "/", &oracle), None);
    }

    #[test]
    fn test_default_rule_honors_base_path() {
        let snapshot = snapshot();
        let oracle = StubOracle(false);

        assert_eq!(
            resolve("/app/about", &[], &snapshot, "/app/", &oracle),
            Some("/app/about.html".into())
        );
        assert_eq!(resolve("/about", &[], &snapshot, "/app/", &oracle), None);
    }

    #[test]
    fn test_consumer_rules_run_first() {
        let snapshot = snapshot();
        let oracle = StubOracle(false);
        let rules = [RewriteRule::literal("^/about$", "/custom.html").unwrap()];

        assert_eq!(
            resolve("/about", &rules, &snapshot, "/", &oracle),
            Some("/custom.html".into())
        );
    }

    #[test]
    fn test_literal_target_expands_captures() {
        let snapshot = Snapshot::default();
        let oracle = StubOracle(false);
        let rules = [RewriteRule::literal("^/legacy/(.*)$", "/$1").unwrap()];

        assert_eq!(
            resolve("/legacy/about.html", &rules, &snapshot, "/", &oracle),
            Some("/about.html".into())
        );
    }

    #[test]
    fn test_computed_target() {
        let snapshot = Snapshot::default();
        let oracle = StubOracle(false);
        let rules = [RewriteRule {
            from: Regex::new("^/v(\\d+)/(.+)$").unwrap(),
            to: RewriteTarget::Computed(Box::new(|ctx: &MatchContext<'_>| {
                format!("/{}-{}", ctx.captures[1], ctx.captures[2])
            })),
        }];

        assert_eq!(
            resolve("/v2/index.html", &rules, &snapshot, "/", &oracle),
            Some("/2-index.html".into())
        );
    }

    #[test]
    fn test_trailing_slash_requires_existing_file() {
        let snapshot = Snapshot::default();

        assert_eq!(
            resolve("/docs/", &[], &snapshot, "/", &StubOracle(true)),
            Some("/docs/index.html".into())
        );
        assert_eq!(resolve("/docs/", &[], &snapshot, "/", &StubOracle(false)), None);
    }

    #[test]
    fn test_engine_disabled_by_toggle() {
        let config: RewritesConfig = serde_json::from_str("false").unwrap();
        let engine =
            RewriteEngine::from_config(&config, "/", Box::new(StubOracle(false))).unwrap();
        assert!(engine.is_none());
    }

    #[test]
    fn test_engine_rejects_invalid_pattern() {
        let config: RewritesConfig =
            serde_json::from_str(r#"[{"from": "(", "to": "/x"}]"#).unwrap();
        let result = RewriteEngine::from_config(&config, "/", Box::new(StubOracle(false)));
        assert!(result.is_err());
    }

    #[test]
    fn test_disk_oracle() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "<html></html>").unwrap();

        let oracle = DiskOracle::new(dir.path().to_path_buf());
        assert!(oracle.exists("docs/index.html"));
        assert!(oracle.exists("/docs/index.html"));
        assert!(!oracle.exists("missing/index.html"));
    }
}
