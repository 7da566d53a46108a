//! Rich-text rendering for branch messages.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use watch_core::model::{RichText, TextFormat};

use crate::error::RenderError;

/// Turns author text into an HTML fragment safe to inject.
#[async_trait]
pub trait RichTextRenderer: Send + Sync {
    /// # Errors
    ///
    /// Returns `RenderError` if the text cannot be rendered.
    async fn render(&self, text: &RichText) -> Result<String, RenderError>;
}

/// Local renderer: markdown via `pulldown-cmark`, HTML cleaned with `ammonia`.
#[derive(Debug, Clone)]
pub struct SanitizingRenderer {
    sanitize: bool,
}

impl Default for SanitizingRenderer {
    fn default() -> Self {
        Self { sanitize: true }
    }
}

impl SanitizingRenderer {
    #[must_use]
    pub fn new(sanitize: bool) -> Self {
        Self { sanitize }
    }

    #[must_use]
    pub fn render_now(&self, text: &RichText) -> String {
        let html = match text.format {
            TextFormat::Html => text.text.clone(),
            TextFormat::Moodle => preserve_line_breaks(&text.text),
            TextFormat::Plain => plain_to_html(&text.text),
            TextFormat::Markdown => markdown_to_html(&text.text),
        };
        if self.sanitize {
            sanitize_html(&html)
        } else {
            html
        }
    }
}

#[async_trait]
impl RichTextRenderer for SanitizingRenderer {
    async fn render(&self, text: &RichText) -> Result<String, RenderError> {
        Ok(self.render_now(text))
    }
}

#[must_use]
pub fn markdown_to_html(input: &str) -> String {
    let mut options = pulldown_cmark::Options::empty();
    options.insert(pulldown_cmark::Options::ENABLE_STRIKETHROUGH);
    options.insert(pulldown_cmark::Options::ENABLE_TABLES);

    let parser = pulldown_cmark::Parser::new_ext(input, options);
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, parser);
    html
}

#[must_use]
pub fn sanitize_html(html: &str) -> String {
    let tags: HashSet<&str> = [
        "p", "div", "span", "br", "em", "strong", "b", "i", "u", "code", "pre", "blockquote",
        "ul", "ol", "li", "a", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "del", "table", "thead",
        "tbody", "tr", "th", "td",
    ]
    .into_iter()
    .collect();

    let mut attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    attributes.insert("a", ["href", "title"].into_iter().collect());

    ammonia::Builder::new()
        .tags(tags)
        .tag_attributes(attributes)
        .clean(html)
        .to_string()
}

/// Escape every line of plain text, joining them with `<br>`.
fn plain_to_html(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .split('\n')
        .map(ammonia::clean_text)
        .collect::<Vec<_>>()
        .join("<br>")
}

fn preserve_line_breaks(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\n', "<br>")
}
