//! Markdown to HTML rendering
//!
//! Rendering runs in three stages: embed tokens are expanded into HTML
//! blocks, the Markdown is rendered with raw HTML passed through, and image
//! metadata comments are folded back into `<img>` attributes.

use lazy_static::lazy_static;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use std::collections::HashMap;

use super::dom::{escape_attr, escape_text};
use super::embed;

lazy_static! {
    static ref PARSER_OPTIONS: Options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_GFM;
    static ref IMAGE_WITH_METADATA: Regex =
        Regex::new(r"<img([^>]*?)\s*/?>(\s*<!--([^>]*?)-->)").unwrap();
    static ref METADATA_ATTR: Regex = Regex::new(r#"(\w+)="([^"]*)""#).unwrap();
    static ref STYLE_ATTR: Regex = Regex::new(r#"style="([^"]*)""#).unwrap();
}

/// Inline style applied for an image position
pub fn position_style(position: &str) -> &'static str {
    match position {
        "left" => "float: left; margin-right: 1rem; margin-bottom: 0.5rem;",
        "right" => "float: right; margin-left: 1rem; margin-bottom: 0.5rem;",
        _ => "display: block; margin-left: auto; margin-right: auto;",
    }
}

/// Markdown renderer for editor content
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render Markdown (with embed tokens and image metadata) to HTML
    pub fn render(&self, markdown: &str) -> String {
        if markdown.trim().is_empty() {
            return String::new();
        }

        let expanded = embed::expand_tokens(markdown);
        let html = self.render_commonmark(&expanded);
        apply_image_metadata(&html)
    }

    /// Plain CommonMark rendering; raw HTML passes through untouched
    fn render_commonmark(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, *PARSER_OPTIONS);

        let mut events: Vec<Event> = Vec::new();
        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let block = code_block_html(code_block_lang.take(), &code_block_content);
                    events.push(Event::Html(CowStr::from(block)));
                }
                Event::Text(text) if in_code_block => {
                    code_block_content.push_str(&text);
                }
                _ => events.push(event),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }
}

/// Code block markup carrying the language as both `data-language` and class
fn code_block_html(lang: Option<String>, code: &str) -> String {
    match lang {
        Some(lang) => {
            let lang = escape_attr(&lang);
            format!(
                "<pre data-language=\"{lang}\"><code class=\"language-{lang}\">{}</code></pre>\n",
                escape_text(code)
            )
        }
        None => format!("<pre><code>{}</code></pre>\n", escape_text(code)),
    }
}

/// Fold `<img ...> <!-- width="W" height="H" position="P" -->` into the tag
pub fn apply_image_metadata(html: &str) -> String {
    IMAGE_WITH_METADATA
        .replace_all(html, |caps: &Captures| {
            let img_attrs = &caps[1];
            let metadata: HashMap<&str, &str> = METADATA_ATTR
                .captures_iter(caps.get(3).map_or("", |m| m.as_str()))
                .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
                .collect();

            let mut tag = format!("<img{}", img_attrs);
            if let Some(width) = metadata.get("width") {
                tag.push_str(&format!(r#" width="{}""#, width));
            }
            if let Some(height) = metadata.get("height") {
                tag.push_str(&format!(r#" height="{}""#, height));
            }
            if let Some(position) = metadata.get("position") {
                let style = position_style(position);
                if STYLE_ATTR.is_match(&tag) {
                    tag = STYLE_ATTR
                        .replace(&tag, |c: &Captures| {
                            format!(r#"style="{}; {}""#, &c[1], style)
                        })
                        .into_owned();
                } else {
                    tag.push_str(&format!(r#" style="{}""#, style));
                }
            }
            tag.push('>');
            tag
        })
        .into_owned()
}
