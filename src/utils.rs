//! Small URL/path string helpers shared across the request pipeline.

use std::path::Path;

/// Collapse repeated '/' into a single one.
///
/// `//pages///about.html` → `/pages/about.html`
pub fn collapse_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Strip query string and fragment from a URL.
///
/// `/about.html?t=1#top` → `/about.html`
pub fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Normalize a configured base path to the canonical `/…/` form.
///
/// `""` and `"/"` → `/`, `"app"` and `"/app/"` → `/app/`.
pub fn normalize_base(base: &str) -> String {
    let trimmed = base.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        collapse_slashes(&format!("/{trimmed}/"))
    }
}

/// Render a path with forward slashes regardless of platform.
pub fn path_to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
