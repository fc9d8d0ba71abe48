//! Structured document tree
//!
//! The tree uses the same JSON shape as the editor's ProseMirror documents:
//! every node carries a camelCase `type` tag, optional `attrs`, and either
//! `content` children or `text` with `marks`.

use chrono::Utc;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dom::{self, escape_attr, escape_text};
use super::embed::{self, EmbedKind, EMBED_CLASS};
use super::stats;
use crate::error::FormatError;

lazy_static! {
    static ref LANGUAGE_CLASS: Regex = Regex::new(r"language-(\S+)").unwrap();
}

/// Version tag written into the metadata block
pub const FORMAT_VERSION: &str = "1.0";

/// A node of the structured document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    Doc {
        #[serde(default)]
        content: Vec<Node>,
    },
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    Heading {
        attrs: HeadingAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    BulletList {
        #[serde(default)]
        content: Vec<Node>,
    },
    OrderedList {
        #[serde(default)]
        attrs: OrderedListAttrs,
        #[serde(default)]
        content: Vec<Node>,
    },
    ListItem {
        #[serde(default)]
        content: Vec<Node>,
    },
    Blockquote {
        #[serde(default)]
        content: Vec<Node>,
    },
    CodeBlock {
        #[serde(default)]
        attrs: CodeBlockAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Node>,
    },
    HorizontalRule,
    HardBreak,
    Image {
        attrs: ImageAttrs,
    },
    MediaEmbed {
        attrs: EmbedAttrs,
    },
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderedListAttrs {
    pub start: u32,
}

impl Default for OrderedListAttrs {
    fn default() -> Self {
        Self { start: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeBlockAttrs {
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageAttrs {
    pub src: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedAttrs {
    pub provider: EmbedKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAttrs {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Inline formatting applied to a text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
    Strike,
    Underline,
    Code,
    Link { attrs: LinkAttrs },
}

/// Metadata block stored next to the tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocMeta {
    pub version: String,
    pub timestamp: String,
    pub word_count: usize,
    pub reading_time: usize,
}

/// A document tree wrapped with its metadata block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDoc {
    pub doc: Node,
    pub meta: DocMeta,
}

impl StructuredDoc {
    /// Parse HTML into a wrapped document, computing word count and reading time
    pub fn from_html(html: &str, words_per_minute: usize) -> Self {
        let doc = if html.trim().is_empty() {
            Node::empty_doc()
        } else {
            parse_html(html)
        };

        Self {
            doc,
            meta: DocMeta {
                version: FORMAT_VERSION.to_string(),
                timestamp: Utc::now().to_rfc3339(),
                word_count: stats::word_count(html),
                reading_time: stats::reading_time(html, words_per_minute),
            },
        }
    }

    /// Serialize to the stored JSON shape
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize structured document: {}", e);
            Value::Object(Default::default())
        })
    }
}

/// Extract the document tree from either a raw tree or a wrapped document
pub fn tree_from_value(value: &Value) -> Result<Node, FormatError> {
    if value.as_object().is_some_and(|o| o.is_empty()) || value.is_null() {
        return Ok(Node::empty_doc());
    }

    let tree = if value.get("type").is_some() {
        value
    } else {
        value.get("doc").unwrap_or(value)
    };

    serde_json::from_value(tree.clone()).map_err(|e| FormatError::Malformed {
        format: "json",
        message: e.to_string(),
    })
}

impl Node {
    pub fn empty_doc() -> Self {
        Node::Doc {
            content: Vec::new(),
        }
    }

    fn text(text: String, marks: &[Mark]) -> Self {
        Node::Text {
            text,
            marks: marks.to_vec(),
        }
    }

    /// Render the tree back to HTML
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        render_node(self, &mut out);
        out
    }
}

// ============================================================================
// HTML -> tree
// ============================================================================

/// Parse an HTML fragment into a `doc` node
pub fn parse_html(html: &str) -> Node {
    let fragment = dom::parse(html);
    let root = fragment.root();
    Node::Doc {
        content: parse_blocks(&dom::children(&root)),
    }
}

fn is_block_element(node: &Handle) -> bool {
    matches!(
        dom::tag(node),
        Some(
            "p" | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "ul"
                | "ol"
                | "li"
                | "blockquote"
                | "pre"
                | "hr"
                | "img"
                | "div"
                | "section"
                | "article"
                | "figure"
                | "header"
                | "footer"
                | "main"
        )
    )
}

fn parse_blocks(nodes: &[Handle]) -> Vec<Node> {
    let mut blocks = Vec::new();
    let mut loose_inline: Vec<Handle> = Vec::new();

    for node in nodes {
        if is_block_element(node) {
            flush_loose_inline(&mut loose_inline, &mut blocks);
            blocks.extend(parse_block(node));
        } else {
            loose_inline.push(node.clone());
        }
    }
    flush_loose_inline(&mut loose_inline, &mut blocks);

    blocks
}

/// Wrap stray inline content in a paragraph unless it is only whitespace
fn flush_loose_inline(pending: &mut Vec<Handle>, blocks: &mut Vec<Node>) {
    if pending.is_empty() {
        return;
    }
    let content = parse_inline(pending, &[]);
    pending.clear();

    let blank = content.iter().all(|n| match n {
        Node::Text { text, .. } => text.trim().is_empty(),
        _ => false,
    });
    if !blank {
        blocks.push(Node::Paragraph { content });
    }
}

fn parse_block(node: &Handle) -> Vec<Node> {
    let children = dom::children(node);
    let tag = dom::tag(node).unwrap_or_default();

    let block = match tag {
        "p" => Node::Paragraph {
            content: parse_inline(&children, &[]),
        },
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Node::Heading {
            attrs: HeadingAttrs {
                level: tag[1..].parse().unwrap_or(1),
            },
            content: parse_inline(&children, &[]),
        },
        "ul" => Node::BulletList {
            content: parse_list_items(&children),
        },
        "ol" => Node::OrderedList {
            attrs: OrderedListAttrs {
                start: dom::attr(node, "start")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(1),
            },
            content: parse_list_items(&children),
        },
        "li" => return parse_blocks(&children),
        "blockquote" => Node::Blockquote {
            content: parse_blocks(&children),
        },
        "pre" => parse_code_block(node),
        "hr" => Node::HorizontalRule,
        "img" => parse_image(node),
        "div" if dom::has_class(node, EMBED_CLASS) => match parse_embed(node) {
            Some(embed) => embed,
            None => return parse_blocks(&children),
        },
        _ => return parse_blocks(&children),
    };

    vec![block]
}

fn parse_list_items(children: &[Handle]) -> Vec<Node> {
    children
        .iter()
        .filter(|c| dom::is_tag(c, "li"))
        .map(|li| {
            let mut content = parse_blocks(&dom::children(li));
            if content.is_empty() {
                content.push(Node::Paragraph {
                    content: Vec::new(),
                });
            }
            Node::ListItem { content }
        })
        .collect()
}

/// Language of a code block: `data-language` on `<pre>`, else a `language-xxx` class
pub(crate) fn code_language(pre: &Handle, code: Option<&Handle>) -> Option<String> {
    dom::non_empty_attr(pre, "data-language").or_else(|| {
        let class = dom::attr(code?, "class")?;
        LANGUAGE_CLASS
            .captures(&class)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn parse_code_block(pre: &Handle) -> Node {
    let code = dom::children(pre)
        .into_iter()
        .find(|c| dom::is_tag(c, "code"));
    let language = code_language(pre, code.as_ref());
    let text = dom::text_content(code.as_ref().unwrap_or(pre));

    Node::CodeBlock {
        attrs: CodeBlockAttrs { language },
        content: if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(text, &[])]
        },
    }
}

fn parse_image(node: &Handle) -> Node {
    Node::Image {
        attrs: ImageAttrs {
            src: dom::attr(node, "src").unwrap_or_default(),
            alt: dom::attr(node, "alt"),
            title: dom::attr(node, "title"),
            width: dom::non_empty_attr(node, "width"),
            height: dom::non_empty_attr(node, "height"),
            style: dom::non_empty_attr(node, "style"),
        },
    }
}

fn parse_embed(node: &Handle) -> Option<Node> {
    let provider = EmbedKind::of_element(node);
    let url = embed::source_url(node)?;
    // Only keep embeds that render back to a block
    embed::render(provider, &url)?;
    Some(Node::MediaEmbed {
        attrs: EmbedAttrs { provider, url },
    })
}

fn parse_inline(nodes: &[Handle], marks: &[Mark]) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        parse_inline_node(node, marks, &mut out);
    }
    out
}

fn parse_inline_node(node: &Handle, marks: &[Mark], out: &mut Vec<Node>) {
    match &node.data {
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if text.is_empty() {
                return;
            }
            // Merge with the previous text node when formatting is identical
            if let Some(Node::Text {
                text: prev,
                marks: prev_marks,
            }) = out.last_mut()
            {
                if prev_marks.as_slice() == marks {
                    prev.push_str(&text);
                    return;
                }
            }
            out.push(Node::text(text, marks));
        }
        NodeData::Element { .. } => {
            let children = dom::children(node);
            let mark = match dom::tag(node).unwrap_or_default() {
                "br" => {
                    out.push(Node::HardBreak);
                    return;
                }
                "img" => {
                    out.push(parse_image(node));
                    return;
                }
                "script" | "style" => return,
                "strong" | "b" => Some(Mark::Bold),
                "em" | "i" => Some(Mark::Italic),
                "s" | "del" | "strike" => Some(Mark::Strike),
                "u" => Some(Mark::Underline),
                "code" => Some(Mark::Code),
                "a" => dom::non_empty_attr(node, "href").map(|href| Mark::Link {
                    attrs: LinkAttrs {
                        href,
                        title: dom::non_empty_attr(node, "title"),
                    },
                }),
                _ => None,
            };

            match mark {
                Some(mark) => {
                    let mut nested = marks.to_vec();
                    nested.push(mark);
                    for child in &children {
                        parse_inline_node(child, &nested, out);
                    }
                }
                None => {
                    for child in &children {
                        parse_inline_node(child, marks, out);
                    }
                }
            }
        }
        _ => {}
    }
}

// ============================================================================
// tree -> HTML
// ============================================================================

fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Doc { content } => render_blocks(content, out),
        Node::Paragraph { content } => {
            out.push_str("<p>");
            render_inline(content, out);
            out.push_str("</p>");
        }
        Node::Heading { attrs, content } => {
            let level = attrs.level.clamp(1, 6);
            out.push_str(&format!("<h{}>", level));
            render_inline(content, out);
            out.push_str(&format!("</h{}>", level));
        }
        Node::BulletList { content } => {
            out.push_str("<ul>");
            render_blocks(content, out);
            out.push_str("</ul>");
        }
        Node::OrderedList { attrs, content } => {
            if attrs.start == 1 {
                out.push_str("<ol>");
            } else {
                out.push_str(&format!(r#"<ol start="{}">"#, attrs.start));
            }
            render_blocks(content, out);
            out.push_str("</ol>");
        }
        Node::ListItem { content } => {
            out.push_str("<li>");
            render_blocks(content, out);
            out.push_str("</li>");
        }
        Node::Blockquote { content } => {
            out.push_str("<blockquote>");
            render_blocks(content, out);
            out.push_str("</blockquote>");
        }
        Node::CodeBlock { attrs, content } => {
            match &attrs.language {
                Some(lang) => {
                    let lang = escape_attr(lang);
                    out.push_str(&format!(
                        r#"<pre data-language="{lang}"><code class="language-{lang}">"#
                    ));
                }
                None => out.push_str("<pre><code>"),
            }
            for child in content {
                if let Node::Text { text, .. } = child {
                    out.push_str(&escape_text(text));
                }
            }
            out.push_str("</code></pre>");
        }
        Node::HorizontalRule => out.push_str("<hr>"),
        Node::HardBreak => out.push_str("<br>"),
        Node::Image { attrs } => render_image(attrs, out),
        Node::MediaEmbed { attrs } => {
            if let Some(html) = embed::render(attrs.provider, &attrs.url) {
                out.push_str(&html);
            }
        }
        Node::Text { text, .. } => out.push_str(&escape_text(text)),
    }
}

fn render_blocks(nodes: &[Node], out: &mut String) {
    for node in nodes {
        render_node(node, out);
    }
}

fn render_image(attrs: &ImageAttrs, out: &mut String) {
    out.push_str(&format!(r#"<img src="{}""#, escape_attr(&attrs.src)));
    let optional = [
        ("alt", &attrs.alt),
        ("title", &attrs.title),
        ("width", &attrs.width),
        ("height", &attrs.height),
        ("style", &attrs.style),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            out.push_str(&format!(r#" {}="{}""#, name, escape_attr(value)));
        }
    }
    out.push('>');
}

/// Render inline content, keeping marks shared by neighbouring text nodes open
fn render_inline(nodes: &[Node], out: &mut String) {
    let mut open: Vec<&Mark> = Vec::new();

    for node in nodes {
        let marks: &[Mark] = match node {
            Node::Text { marks, .. } => marks,
            _ => &[],
        };

        let shared = open
            .iter()
            .zip(marks)
            .take_while(|(a, b)| **a == *b)
            .count();
        while open.len() > shared {
            if let Some(mark) = open.pop() {
                close_mark(mark, out);
            }
        }
        for mark in &marks[shared..] {
            open_mark(mark, out);
            open.push(mark);
        }

        render_node(node, out);
    }

    while let Some(mark) = open.pop() {
        close_mark(mark, out);
    }
}

fn open_mark(mark: &Mark, out: &mut String) {
    match mark {
        Mark::Bold => out.push_str("<strong>"),
        Mark::Italic => out.push_str("<em>"),
        Mark::Strike => out.push_str("<s>"),
        Mark::Underline => out.push_str("<u>"),
        Mark::Code => out.push_str("<code>"),
        Mark::Link { attrs } => {
            out.push_str(&format!(r#"<a href="{}""#, escape_attr(&attrs.href)));
            if let Some(title) = &attrs.title {
                out.push_str(&format!(r#" title="{}""#, escape_attr(title)));
            }
            out.push('>');
        }
    }
}

fn close_mark(mark: &Mark, out: &mut String) {
    out.push_str(match mark {
        Mark::Bold => "</strong>",
        Mark::Italic => "</em>",
        Mark::Strike => "</s>",
        Mark::Underline => "</u>",
        Mark::Code => "</code>",
        Mark::Link { .. } => "</a>",
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip(html: &str) -> String {
        parse_html(html).to_html()
    }

    #[test]
    fn test_round_trip_blocks() {
        let html = concat!(
            "<h2>Title</h2>",
            "<p>Hello <strong>bold <em>both</em></strong> and <a href=\"https://example.com\" title=\"Ex\">link</a></p>",
            "<ul><li><p>one</p></li><li><p>two</p></li></ul>",
            "<ol start=\"3\"><li><p>three</p></li></ol>",
            "<blockquote><p>quoted<br>line</p></blockquote>",
            "<pre data-language=\"rust\"><code class=\"language-rust\">fn main() {\n    println!(\"&lt;hi&gt;\");\n}</code></pre>",
            "<hr>",
            "<img src=\"/a.png\" alt=\"A\" width=\"300\" height=\"200\" style=\"float: left; margin-right: 1rem; margin-bottom: 0.5rem;\">",
        );
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn test_round_trip_embeds() {
        for (kind, url) in [
            (EmbedKind::Youtube, "https://www.youtube.com/embed/abc123"),
            (EmbedKind::Vimeo, "https://player.vimeo.com/video/42"),
            (EmbedKind::Twitter, "https://twitter.com/u/status/1"),
            (EmbedKind::Instagram, "https://www.instagram.com/p/xyz"),
            (EmbedKind::Generic, "https://example.com/widget"),
        ] {
            let html = embed::render(kind, url).unwrap();
            assert_eq!(round_trip(&html), html, "{} embed", kind);
        }
    }

    #[test]
    fn test_parse_embed_node() {
        let html = embed::render(EmbedKind::Youtube, "https://youtu.be/abc123").unwrap();
        let doc = parse_html(&html);
        let Node::Doc { content } = doc else {
            panic!("expected doc");
        };
        assert_eq!(
            content,
            vec![Node::MediaEmbed {
                attrs: EmbedAttrs {
                    provider: EmbedKind::Youtube,
                    url: "https://www.youtube.com/embed/abc123".to_string(),
                }
            }]
        );
    }

    #[test]
    fn test_loose_text_wrapped_in_paragraph() {
        assert_eq!(round_trip("plain <em>text</em>"), "<p>plain <em>text</em></p>");
        assert_eq!(round_trip("<p>a</p>\n\n<p>b</p>"), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_serialized_shape() {
        let doc = parse_html("<p><strong>hi</strong></p>");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "doc",
                "content": [{
                    "type": "paragraph",
                    "content": [{"type": "text", "text": "hi", "marks": [{"type": "bold"}]}]
                }]
            })
        );
    }

    #[test]
    fn test_tree_from_wrapped_and_raw() {
        let wrapped = StructuredDoc::from_html("<p>two words</p>", 200);
        assert_eq!(wrapped.meta.word_count, 2);
        assert_eq!(wrapped.meta.reading_time, 1);
        assert_eq!(wrapped.meta.version, FORMAT_VERSION);

        let value = wrapped.to_value();
        assert!(value.get("meta").unwrap().get("wordCount").is_some());
        let from_wrapped = tree_from_value(&value).unwrap();
        let from_raw = tree_from_value(&serde_json::to_value(&wrapped.doc).unwrap()).unwrap();
        assert_eq!(from_wrapped, from_raw);
        assert_eq!(from_raw.to_html(), "<p>two words</p>");
    }

    #[test]
    fn test_malformed_tree() {
        let err = tree_from_value(&json!({"type": "nonsense"})).unwrap_err();
        assert!(matches!(err, FormatError::Malformed { .. }));
        assert_eq!(tree_from_value(&json!({})).unwrap(), Node::empty_doc());
    }
}
