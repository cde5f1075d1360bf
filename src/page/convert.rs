//! Markup conversions applied to a rendered document body.

use pulldown_cmark::{Options, Parser, html as md_html};

/// Conversion applied after tag substitution, before layouts wrap the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// CommonMark (with tables, footnotes and strikethrough) to HTML.
    Markdown,
}

impl Conversion {
    /// Extension of the converted output.
    pub const fn output_extension(self) -> &'static str {
        match self {
            Self::Markdown => "html",
        }
    }

    pub fn apply(self, text: &str) -> String {
        match self {
            Self::Markdown => {
                let options =
                    Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;
                let parser = Parser::new_ext(text, options);
                let mut html = String::with_capacity(text.len() * 3 / 2);
                md_html::push_html(&mut html, parser);
                html
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_to_html() {
        let html = Conversion::Markdown.apply("# Title\n\nSome *text*.\n");
        assert_eq!(html, "<h1>Title</h1>\n<p>Some <em>text</em>.</p>\n");
    }

    #[test]
    fn test_markdown_keeps_inline_html() {
        let html = Conversion::Markdown.apply("<hr>\n");
        assert_eq!(html, "<hr>\n");
    }

    #[test]
    fn test_output_extension() {
        assert_eq!(Conversion::Markdown.output_extension(), "html");
    }
}
