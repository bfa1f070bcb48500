//! Request middleware pipeline.
//!
//! Each request walks an ordered stage list; the first stage to produce
//! a response ends the chain, everything else passes through to the
//! next stage:
//!
//! 1. rewrite  - map the URL through the rewrite rule engine
//! 2. virtual  - serve registered virtual pages from memory
//! 3. static   - serve real files from the root directory
//! 4. 404      - always responds
//!
//! A stage error is fatal for that request only: the runner answers 500
//! and the server keeps going.

use crate::log;
use crate::minify;
use crate::registry::RegistryHandle;
use crate::render;
use crate::rewrite::RewriteEngine;
use crate::utils::strip_query;
use anyhow::{Context, Result};
use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response};

pub type HtmlResponse = Response<Cursor<Vec<u8>>>;

/// Mutable per-request state threaded through the stages.
pub struct ReqState {
    /// URL as received, for logging.
    pub original_url: String,
    /// Current URL, possibly rewritten by an earlier stage.
    pub url: String,
    /// Whether the client accepts an HTML response.
    pub accept_html: bool,
}

impl ReqState {
    pub fn new(url: &str, accept: Option<&str>) -> Self {
        let accept_html = accept
            .map(|value| value.contains("text/html") || value.contains("application/xhtml+xml"))
            .unwrap_or(false);
        Self {
            original_url: url.to_string(),
            url: url.to_string(),
            accept_html,
        }
    }
}

pub enum Outcome {
    Respond(HtmlResponse),
    Next,
}

pub trait Middleware: Send + Sync {
    fn handle(&self, state: &mut ReqState) -> Result<Outcome>;
}

/// Ordered middleware stack for one server.
pub struct Pipeline {
    stages: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Run one request through the stages and send the response.
    pub fn handle(&self, request: Request) -> Result<()> {
        let accept = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Accept"))
            .map(|header| header.value.as_str().to_string());
        let mut state = ReqState::new(request.url(), accept.as_deref());

        for stage in &self.stages {
            match stage.handle(&mut state) {
                Ok(Outcome::Respond(response)) => return Ok(request.respond(response)?),
                Ok(Outcome::Next) => {}
                Err(err) => {
                    // Fatal for this request only.
                    log!("error"; "{}: {err:#}", state.original_url);
                    let response = Response::from_string(format!("Internal error: {err}"))
                        .with_status_code(500);
                    return Ok(request.respond(response)?);
                }
            }
        }

        Ok(request.respond(Response::from_string("404 Not Found").with_status_code(404))?)
    }
}

// ============================================================================
// Rewrite Stage
// ============================================================================

/// Applies the rewrite rule engine to HTML navigations. Never responds.
pub struct RewriteStage {
    pub engine: Option<RewriteEngine>,
    pub registry: Arc<RegistryHandle>,
    pub verbose: bool,
}

impl Middleware for RewriteStage {
    fn handle(&self, state: &mut ReqState) -> Result<Outcome> {
        let Some(engine) = &self.engine else {
            return Ok(Outcome::Next);
        };
        if !state.accept_html {
            return Ok(Outcome::Next);
        }

        let path = strip_query(&state.url).to_string();
        if let Some(rewritten) = engine.resolve(&path, &self.registry.load())
            && rewritten != state.url
        {
            if self.verbose {
                log!("serve"; "Rewriting {} to {}", state.original_url, rewritten);
            }
            state.url = rewritten;
        }

        Ok(Outcome::Next)
    }
}

// ============================================================================
// Virtual Page Stage
// ============================================================================

/// Serves registered virtual pages from memory.
pub struct VirtualPageStage {
    pub registry: Arc<RegistryHandle>,
    /// Canonical base path in `/…/` form.
    pub base: String,
    pub default_template: PathBuf,
    pub root: PathBuf,
    pub minify: bool,
    /// Reload client snippet injected into every rendered page.
    pub inject: Option<String>,
}

impl VirtualPageStage {
    /// Render the virtual page for a URL, or `None` when the URL is not
    /// ours (non-HTML or unregistered - the next stage takes over).
    fn render_page(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let path = strip_query(url);
        let file_name = path.strip_prefix(self.base.as_str()).unwrap_or(path);
        if !file_name.ends_with(".html") {
            return Ok(None);
        }

        let snapshot = self.registry.load();
        let Some(page) = snapshot.page(file_name) else {
            return Ok(None);
        };

        let template = render::load_template(page, &self.default_template, &self.root)?;
        let mut html = render::render(&template, Some(page));
        if let Some(snippet) = &self.inject {
            html = inject_before_body(html, snippet);
        }

        Ok(Some(
            minify::post_process(html.as_bytes(), self.minify).into_owned(),
        ))
    }
}

impl Middleware for VirtualPageStage {
    fn handle(&self, state: &mut ReqState) -> Result<Outcome> {
        match self.render_page(&state.url)? {
            // Explicit status and content type; some HTTP clients hang
            // on an implicit status when navigating across entry pages.
            Some(body) => Ok(Outcome::Respond(
                Response::from_data(body)
                    .with_status_code(200)
                    .with_header(
                        Header::from_bytes("Content-Type", "text/html; charset=utf-8").unwrap(),
                    ),
            )),
            None => Ok(Outcome::Next),
        }
    }
}

/// Insert `snippet` before the first `</body>`, or append when the tag
/// is absent.
fn inject_before_body(html: String, snippet: &str) -> String {
    match html.find("</body>") {
        Some(pos) => format!("{}{}\n{}", &html[..pos], snippet, &html[pos..]),
        None => html + snippet,
    }
}

// ============================================================================
// Static File Stage
// ============================================================================

/// Serves real files under a root directory, with `index.html`
/// resolution for directories.
pub struct StaticStage {
    pub root: PathBuf,
}

impl StaticStage {
    fn lookup(&self, url: &str) -> Option<PathBuf> {
        // Decode URL-encoded characters (e.g., %20 → space)
        let decoded = urlencoding::decode(url)
            .map(Cow::into_owned)
            .unwrap_or_default();
        let request_path = strip_query(&decoded).trim_matches('/');

        if request_path.split('/').any(|segment| segment == "..") {
            return None;
        }

        let local_path = self.root.join(request_path);
        if local_path.is_file() {
            return Some(local_path);
        }
        if local_path.is_dir() {
            let index_path = local_path.join("index.html");
            if index_path.is_file() {
                return Some(index_path);
            }
        }
        None
    }
}

impl Middleware for StaticStage {
    fn handle(&self, state: &mut ReqState) -> Result<Outcome> {
        let Some(path) = self.lookup(&state.url) else {
            return Ok(Outcome::Next);
        };

        let content =
            fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let content_type = guess_content_type(&path);

        Ok(Outcome::Respond(
            Response::from_data(content)
                .with_header(Header::from_bytes("Content-Type", content_type).unwrap()),
        ))
    }
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",

        // Documents
        Some("txt") => "text/plain; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Not Found Stage
// ============================================================================

/// Terminal stage: always responds 404.
pub struct NotFoundStage;

impl Middleware for NotFoundStage {
    fn handle(&self, state: &mut ReqState) -> Result<Outcome> {
        let path = strip_query(&state.url);
        let response = if path.ends_with(".html") {
            Response::from_string(format!("Missing corresponding file '{path}'"))
                .with_status_code(404)
        } else {
            Response::from_string("404 Not Found").with_status_code(404)
        };
        Ok(Outcome::Respond(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Page, RegistryHandle, compile};
    use tempfile::TempDir;

    fn registry_with_home() -> Arc<RegistryHandle> {
        let pages = [Page {
            name: "home".into(),
            filename: Some("index.html".into()),
            entry: Some("/src/main.js".into()),
            ..Page::default()
        }];
        Arc::new(RegistryHandle::new(
            compile(&pages, &[], "index.html").unwrap(),
        ))
    }

    fn virtual_stage(root: &TempDir) -> VirtualPageStage {
        VirtualPageStage {
            registry: registry_with_home(),
            base: "/".into(),
            default_template: "index.html".into(),
            root: root.path().to_path_buf(),
            minify: false,
            inject: None,
        }
    }

    #[test]
    fn test_accept_header_detection() {
        assert!(ReqState::new("/", Some("text/html,application/xml")).accept_html);
        assert!(ReqState::new("/", Some("application/xhtml+xml")).accept_html);
        assert!(!ReqState::new("/", Some("*/*")).accept_html);
        assert!(!ReqState::new("/", None).accept_html);
    }

    #[test]
    fn test_virtual_stage_renders_registered_page() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.html"),
            "<html><body></body></html>",
        )
        .unwrap();

        let stage = virtual_stage(&dir);
        let body = stage.render_page("/index.html?t=1").unwrap().unwrap();
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("src=\"/src/main.js\""));
    }

    #[test]
    fn test_virtual_stage_ignores_non_html_and_unregistered() {
        let dir = TempDir::new().unwrap();
        let stage = virtual_stage(&dir);

        assert!(stage.render_page("/main.js").unwrap().is_none());
        assert!(stage.render_page("/other.html").unwrap().is_none());
        assert!(stage.render_page("/").unwrap().is_none());
    }

    #[test]
    fn test_virtual_stage_missing_template_is_request_error() {
        let dir = TempDir::new().unwrap();
        let stage = virtual_stage(&dir);
        assert!(stage.render_page("/index.html").is_err());
    }

    #[test]
    fn test_virtual_stage_strips_base() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let mut stage = virtual_stage(&dir);
        stage.base = "/app/".into();

        assert!(stage.render_page("/app/index.html").unwrap().is_some());
        assert!(stage.render_page("/index.html").unwrap().is_none());
    }

    #[test]
    fn test_virtual_stage_injects_reload_snippet() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("index.html"),
            "<html><body></body></html>",
        )
        .unwrap();

        let mut stage = virtual_stage(&dir);
        stage.inject = Some("<script>reload()</script>".into());

        let body = stage.render_page("/index.html").unwrap().unwrap();
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("<script>reload()</script>\n</body>"));
    }

    #[test]
    fn test_inject_before_body_appends_without_tag() {
        assert_eq!(inject_before_body("<div></div>".into(), "<s>"), "<div></div><s>");
    }

    #[test]
    fn test_static_lookup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.css"), "body{}").unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "<html></html>").unwrap();

        let stage = StaticStage {
            root: dir.path().to_path_buf(),
        };

        assert_eq!(
            stage.lookup("/app.css?v=2"),
            Some(dir.path().join("app.css"))
        );
        assert_eq!(
            stage.lookup("/docs"),
            Some(dir.path().join("docs/index.html"))
        );
        assert_eq!(stage.lookup("/missing.css"), None);
        // traversal is refused
        assert_eq!(stage.lookup("/../secret"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(
            guess_content_type(Path::new("a.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("a.woff2")), "font/woff2");
        assert_eq!(
            guess_content_type(Path::new("a.bin")),
            "application/octet-stream"
        );
    }
}
