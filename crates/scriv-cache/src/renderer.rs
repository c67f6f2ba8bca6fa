//! Markdown to HTML conversion.

use pulldown_cmark::{Options, Parser, html};

/// Converts Markdown to HTML.
///
/// Must be a pure function of its input: the render cache assumes equal
/// Markdown always yields equal HTML.
pub trait Renderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// `CommonMark` renderer with the usual GitHub extensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct CmarkRenderer;

impl CmarkRenderer {
    fn options() -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_TASKLISTS
    }
}

impl Renderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

impl<F> Renderer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn render(&self, markdown: &str) -> String {
        self(markdown)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_heading_and_paragraph() {
        let html = CmarkRenderer.render("# Title\n\nHello *world*");
        assert_eq!(html, "<h1>Title</h1>\n<p>Hello <em>world</em></p>\n");
    }

    #[test]
    fn test_gfm_extensions_enabled() {
        let html = CmarkRenderer.render("~~gone~~\n\n- [x] done\n");
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("type=\"checkbox\""));
    }

    #[test]
    fn test_table() {
        let html = CmarkRenderer.render("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_closure_is_renderer() {
        let upper = |md: &str| md.to_uppercase();
        assert_eq!(upper.render("abc"), "ABC");
    }
}
