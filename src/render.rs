//! Template rendering: entry-script injection plus data templating.
//!
//! Rendering deliberately fails soft. Templates get edited constantly
//! during development, so a malformed expression returns the pre-render
//! content instead of failing the request.

use crate::log;
use crate::registry::Page;
use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde_json::{Map, Value};
use std::{
    borrow::Cow,
    env, fs,
    path::Path,
    sync::LazyLock,
};

const BODY_CLOSE: &str = "</body>";

static TEMPLATES: LazyLock<Handlebars<'static>> = LazyLock::new(Handlebars::new);

/// Read the raw template for a page: its override template when set,
/// the default template otherwise. Both are resolved against the
/// project root.
pub fn load_template(page: &Page, default_template: &Path, root: &Path) -> Result<String> {
    let path = match &page.template {
        Some(template) => root.join(template),
        None => root.join(default_template),
    };
    fs::read_to_string(&path)
        .with_context(|| format!("Failed to read template {}", path.display()))
}

/// Insert the module script tag for `entry` immediately before the
/// first `</body>`. Best-effort: without a closing body tag the content
/// passes through unmodified.
pub fn inject_entry<'a>(content: &'a str, entry: Option<&str>) -> Cow<'a, str> {
    let Some(entry) = entry else {
        return Cow::Borrowed(content);
    };
    match content.find(BODY_CLOSE) {
        Some(pos) => Cow::Owned(format!(
            "{}<script type=\"module\" src=\"{}\"></script>\n{}",
            &content[..pos],
            entry,
            &content[pos..]
        )),
        None => Cow::Borrowed(content),
    }
}

/// Render final HTML for a page: inject its entry script, then run the
/// templating pass over the union of process environment variables and
/// the page's data (page data wins on key collision).
///
/// Never fails: a template error logs and yields the injected,
/// unrendered content.
pub fn render(template_content: &str, page: Option<&Page>) -> String {
    let injected = inject_entry(template_content, page.and_then(|p| p.entry.as_deref()));
    let context = build_context(page);

    match TEMPLATES.render_template(&injected, &context) {
        Ok(html) => html,
        Err(err) => {
            log!("render"; "template render failed: {err}");
            injected.into_owned()
        }
    }
}

fn build_context(page: Option<&Page>) -> Map<String, Value> {
    let mut context: Map<String, Value> = env::vars()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    if let Some(page) = page {
        for (key, value) in &page.data {
            context.insert(key.clone(), value.clone());
        }
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn page_with_entry(entry: &str) -> Page {
        Page {
            name: "home".into(),
            entry: Some(entry.into()),
            ..Page::default()
        }
    }

    #[test]
    fn test_inject_entry_before_first_body_close() {
        let html = "<html><body><p>hi</p></body><template></body></template></html>";
        let out = inject_entry(html, Some("/src/main.js"));
        assert_eq!(
            out,
            "<html><body><p>hi</p>\
             <script type=\"module\" src=\"/src/main.js\"></script>\n\
             </body><template></body></template></html>"
        );
        // exactly one injection
        assert_eq!(out.matches("script type=\"module\"").count(), 1);
    }

    #[test]
    fn test_inject_entry_without_body_tag_is_noop() {
        let html = "<div>fragment</div>";
        assert_eq!(inject_entry(html, Some("/src/main.js")), html);
    }

    #[test]
    fn test_inject_entry_without_entry_is_noop() {
        let html = "<html><body></body></html>";
        assert!(matches!(inject_entry(html, None), Cow::Borrowed(_)));
    }

    #[test]
    fn test_render_substitutes_page_data() {
        let mut data = BTreeMap::new();
        data.insert("title".to_string(), serde_json::json!("Hello"));
        let page = Page {
            name: "home".into(),
            data,
            ..Page::default()
        };

        let out = render("<title>{{title}}</title>", Some(&page));
        assert_eq!(out, "<title>Hello</title>");
    }

    #[test]
    fn test_render_page_data_wins_over_environment() {
        // PATH is always present in the process environment.
        let mut data = BTreeMap::new();
        data.insert("PATH".to_string(), serde_json::json!("overridden"));
        let page = Page {
            name: "home".into(),
            data,
            ..Page::default()
        };

        assert_eq!(render("{{PATH}}", Some(&page)), "overridden");
    }

    #[test]
    fn test_render_is_idempotent_without_entry() {
        let template = "<html><body><h1>static</h1></body></html>";
        let first = render(template, None);
        let second = render(&first, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_injects_entry_and_data_together() {
        let page = page_with_entry("/src/main.js");
        let out = render("<body></body>", Some(&page));
        assert!(out.contains("<script type=\"module\" src=\"/src/main.js\"></script>"));
    }

    #[test]
    fn test_render_soft_fails_on_malformed_template() {
        let page = page_with_entry("/src/main.js");
        let broken = "<body>{{#if}}</body>";

        let out = render(broken, Some(&page));
        // Falls back to the injected-but-unrendered content.
        assert!(out.contains("{{#if}}"));
        assert!(out.contains("/src/main.js"));
    }
}
