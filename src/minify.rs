//! HTML post-processing hook.
//!
//! Final HTML, whether served by the dev pipeline or written at build
//! time, runs through this pass. Minification is disabled by default.

use std::borrow::Cow;

/// Post-process rendered HTML.
///
/// Returns `Cow::Borrowed` when minification is disabled, `Cow::Owned`
/// when minified.
pub fn post_process(html: &[u8], minify: bool) -> Cow<'_, [u8]> {
    if minify {
        Cow::Owned(minify_html_inner(html))
    } else {
        Cow::Borrowed(html)
    }
}

/// Minify HTML content using `minify_html` crate.
fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}
