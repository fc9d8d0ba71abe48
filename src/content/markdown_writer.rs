//! HTML to Markdown rendering
//!
//! Elements are matched against an ordered rule list; the first rule whose
//! filter accepts the element produces its Markdown. The editor-specific
//! rules (code fences, image metadata, titled links, media embeds) come first
//! and the standard Markdown rules follow.

use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData};
use regex::Regex;

use super::dom;
use super::embed::{self, EmbedKind, EMBED_CLASS};
use super::structured::code_language;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref BLOCK_MARKER: Regex = Regex::new(r"^(\s*)([-+](?:\s|$)|#{1,6}(?:\s|$)|[>=])").unwrap();
    static ref ORDERED_MARKER: Regex = Regex::new(r"^(\s*\d+)([.)](?:\s|$))").unwrap();
    static ref CONTAINER_PREFIX: Regex = Regex::new(r"^(?:\s*(?:>|[-+*]|\d+[.)])(?:\s+|$))*\s*").unwrap();
}

/// A single conversion rule
struct Rule {
    name: &'static str,
    filter: fn(&Handle) -> bool,
    replacement: fn(&MarkdownWriter, &Handle) -> String,
}

/// Rules in priority order
const RULES: &[Rule] = &[
    Rule {
        name: "codeBlocks",
        filter: is_code_block,
        replacement: code_block,
    },
    Rule {
        name: "images",
        filter: |n| dom::is_tag(n, "img"),
        replacement: image,
    },
    Rule {
        name: "links",
        filter: |n| dom::is_tag(n, "a") && dom::non_empty_attr(n, "href").is_some(),
        replacement: link,
    },
    Rule {
        name: "mediaEmbeds",
        filter: |n| dom::has_class(n, EMBED_CLASS),
        replacement: media_embed,
    },
    Rule {
        name: "heading",
        filter: |n| heading_level(n).is_some(),
        replacement: heading,
    },
    Rule {
        name: "paragraph",
        filter: |n| dom::is_tag(n, "p"),
        replacement: |w, n| block(&w.children(n)),
    },
    Rule {
        name: "blockquote",
        filter: |n| dom::is_tag(n, "blockquote"),
        replacement: blockquote,
    },
    Rule {
        name: "list",
        filter: |n| dom::is_tag(n, "ul") || dom::is_tag(n, "ol"),
        replacement: list,
    },
    Rule {
        name: "horizontalRule",
        filter: |n| dom::is_tag(n, "hr"),
        replacement: |_, _| block("---"),
    },
    Rule {
        name: "lineBreak",
        filter: |n| dom::is_tag(n, "br"),
        replacement: |_, _| "  \n".to_string(),
    },
    Rule {
        name: "strong",
        filter: |n| dom::is_tag(n, "strong") || dom::is_tag(n, "b"),
        replacement: |w, n| delimit(&w.children(n), "**"),
    },
    Rule {
        name: "emphasis",
        filter: |n| dom::is_tag(n, "em") || dom::is_tag(n, "i"),
        replacement: |w, n| delimit(&w.children(n), "*"),
    },
    Rule {
        name: "strikethrough",
        filter: |n| matches!(dom::tag(n), Some("s" | "del" | "strike")),
        replacement: |w, n| delimit(&w.children(n), "~~"),
    },
    Rule {
        name: "inlineCode",
        filter: |n| dom::is_tag(n, "code"),
        replacement: inline_code,
    },
    Rule {
        name: "preformatted",
        filter: |n| dom::is_tag(n, "pre"),
        replacement: |_, n| fence(None, &dom::text_content(n)),
    },
    Rule {
        name: "ignored",
        filter: |n| matches!(dom::tag(n), Some("script" | "style" | "iframe")),
        replacement: |_, _| String::new(),
    },
    Rule {
        name: "container",
        filter: |n| {
            matches!(
                dom::tag(n),
                Some("div" | "section" | "article" | "figure" | "header" | "footer" | "main")
            )
        },
        replacement: |w, n| block(&w.children(n)),
    },
];

/// Renders an HTML DOM to Markdown
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownWriter;

impl MarkdownWriter {
    pub fn new() -> Self {
        Self
    }

    /// Convert an HTML fragment to Markdown
    pub fn write(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }
        let fragment = dom::parse(html);
        let root = fragment.root();
        tidy(&self.children(&root))
    }

    /// Markdown of all children of a node
    fn children(&self, node: &Handle) -> String {
        let kids = dom::children(node);
        let mut out = String::new();

        for (i, child) in kids.iter().enumerate() {
            if let Some(text) = dom::text(child) {
                if text.trim().is_empty() {
                    // Whitespace between blocks carries no meaning
                    let prev_block = i == 0 || is_block(&kids[i - 1]);
                    let next_block = i + 1 == kids.len() || is_block(&kids[i + 1]);
                    if prev_block || next_block {
                        continue;
                    }
                }
                out.push_str(&escape(&WHITESPACE.replace_all(&text, " ")));
            } else {
                out.push_str(&self.node(child));
            }
        }

        out
    }

    fn node(&self, node: &Handle) -> String {
        if !matches!(node.data, NodeData::Element { .. }) {
            return String::new();
        }
        match RULES.iter().find(|rule| (rule.filter)(node)) {
            Some(rule) => {
                tracing::trace!(
                    "Markdown rule {} matched <{}>",
                    rule.name,
                    dom::tag(node).unwrap_or_default()
                );
                (rule.replacement)(self, node)
            }
            None => self.children(node),
        }
    }
}

fn is_block(node: &Handle) -> bool {
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
                | "div"
                | "section"
                | "article"
                | "figure"
                | "header"
                | "footer"
                | "main"
                | "script"
                | "style"
        )
    )
}

/// Collapse runs of blank lines between blocks and trim surrounding newlines.
/// Fenced code is copied through untouched.
fn tidy(markdown: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut open_fence: Option<&str> = None;
    let mut blank = false;

    for line in markdown.split('\n') {
        // Fences may sit behind list markers or quote markers
        let trimmed = &line[CONTAINER_PREFIX.find(line).map_or(0, |m| m.end())..];
        if let Some(fence) = open_fence {
            if trimmed.trim_end() == fence {
                open_fence = None;
            }
            lines.push(line);
            blank = false;
            continue;
        }
        if trimmed.starts_with("```") {
            let run = trimmed.len() - trimmed.trim_start_matches('`').len();
            open_fence = Some(&trimmed[..run]);
        }
        if line.is_empty() {
            if blank {
                continue;
            }
            blank = true;
        } else {
            blank = false;
        }
        lines.push(line);
    }

    lines.join("\n").trim_matches('\n').to_string()
}

fn block(content: &str) -> String {
    format!("\n\n{}\n\n", content.trim())
}

fn delimit(content: &str, delimiter: &str) -> String {
    if content.trim().is_empty() {
        content.to_string()
    } else {
        format!("{}{}{}", delimiter, content, delimiter)
    }
}

/// Escape text that would otherwise be read as Markdown syntax or raw HTML
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '\\' | '*' | '_' | '`' | '[' | ']' | '~' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    // Block markers only matter where the text may begin a line
    let out = BLOCK_MARKER.replace(&out, "$1\\$2");
    ORDERED_MARKER.replace(&out, "$1\\$2").into_owned()
}

fn is_code_block(node: &Handle) -> bool {
    if !dom::is_tag(node, "pre") {
        return false;
    }
    dom::children(node)
        .iter()
        .find(|c| dom::text(c).map_or(true, |t| !t.trim().is_empty()))
        .is_some_and(|first| dom::is_tag(first, "code"))
}

fn code_block(_: &MarkdownWriter, node: &Handle) -> String {
    let code = dom::children(node)
        .into_iter()
        .find(|c| dom::is_tag(c, "code"));
    let language = code_language(node, code.as_ref()).filter(|lang| lang != "plaintext");
    let text = dom::text_content(code.as_ref().unwrap_or(node));
    fence(language.as_deref(), &text)
}

fn fence(language: Option<&str>, code: &str) -> String {
    let code = code.strip_suffix('\n').unwrap_or(code);

    // The fence must be longer than any backtick run inside the code
    let longest_run = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest_run.max(2) + 1);

    format!(
        "\n\n{fence}{}\n{code}\n{fence}\n\n",
        language.unwrap_or_default()
    )
}

/// Position of an image from its inline style
fn image_position(style: &str) -> Option<&'static str> {
    let style: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if style.contains("float:left") {
        Some("left")
    } else if style.contains("float:right") {
        Some("right")
    } else if style.contains("margin-left:auto") && style.contains("margin-right:auto") {
        Some("center")
    } else {
        None
    }
}

fn image(_: &MarkdownWriter, node: &Handle) -> String {
    let alt = dom::attr(node, "alt").unwrap_or_default();
    let src = dom::attr(node, "src").unwrap_or_default();
    let mut markdown = format!("![{}]({})", alt, src);

    let mut attributes = Vec::new();
    if let Some(width) = dom::non_empty_attr(node, "width") {
        attributes.push(format!(r#"width="{}""#, width));
    }
    if let Some(height) = dom::non_empty_attr(node, "height") {
        attributes.push(format!(r#"height="{}""#, height));
    }
    if let Some(position) = dom::attr(node, "style").as_deref().and_then(image_position) {
        attributes.push(format!(r#"position="{}""#, position));
    }

    if !attributes.is_empty() {
        markdown.push_str(&format!(" <!-- {} -->", attributes.join(" ")));
    }
    markdown
}

fn link(w: &MarkdownWriter, node: &Handle) -> String {
    let content = w.children(node);
    let href = dom::attr(node, "href").unwrap_or_default();
    match dom::non_empty_attr(node, "title") {
        Some(title) => format!(
            r#"[{}]({} "{}")"#,
            content,
            href,
            title.replace('"', "\\\"")
        ),
        None => format!("[{}]({})", content, href),
    }
}

fn media_embed(_: &MarkdownWriter, node: &Handle) -> String {
    match embed::source_url(node) {
        Some(url) => block(&embed::token(EmbedKind::of_element(node), &url)),
        None => block(&format!(
            r#"<div class="{}">{}</div>"#,
            EMBED_CLASS,
            dom::inner_html(node)
        )),
    }
}

fn heading_level(node: &Handle) -> Option<usize> {
    match dom::tag(node)? {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn heading(w: &MarkdownWriter, node: &Handle) -> String {
    let level = heading_level(node).unwrap_or(1);
    block(&format!("{} {}", "#".repeat(level), w.children(node).trim()))
}

fn blockquote(w: &MarkdownWriter, node: &Handle) -> String {
    let content = tidy(&w.children(node));
    let quoted = content
        .lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    block(&quoted)
}

fn list(w: &MarkdownWriter, node: &Handle) -> String {
    let ordered = dom::is_tag(node, "ol");
    let start: usize = dom::attr(node, "start")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(1);

    let items: Vec<String> = dom::children(node)
        .iter()
        .filter(|c| dom::is_tag(c, "li"))
        .enumerate()
        .map(|(i, li)| {
            let prefix = if ordered {
                format!("{}. ", start + i)
            } else {
                "- ".to_string()
            };
            let indent = " ".repeat(prefix.len());
            let content = tidy(&w.children(li));
            let body = content
                .trim()
                .lines()
                .enumerate()
                .map(|(n, line)| {
                    if n == 0 || line.is_empty() {
                        line.to_string()
                    } else {
                        format!("{}{}", indent, line)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!("{}{}", prefix, body)
        })
        .collect();

    block(&items.join("\n"))
}

fn inline_code(_: &MarkdownWriter, node: &Handle) -> String {
    let code = dom::text_content(node);
    if code.contains('`') {
        format!("`` {} ``", code)
    } else {
        format!("`{}`", code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(html: &str) -> String {
        MarkdownWriter::new().write(html)
    }

    #[test]
    fn test_headings_and_paragraphs() {
        assert_eq!(
            md("<h1>Title</h1><p>Some <strong>bold</strong> and <em>soft</em> text.</p>"),
            "# Title\n\nSome **bold** and *soft* text."
        );
    }

    #[test]
    fn test_code_block_language_from_data_attribute() {
        let html = r#"<pre data-language="python"><code class="language-rust">print(1)</code></pre>"#;
        assert_eq!(md(html), "```python\nprint(1)\n```");
    }

    #[test]
    fn test_code_block_language_from_class() {
        let html = "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>";
        assert_eq!(md(html), "```rust\nfn main() {}\n```");
    }

    #[test]
    fn test_plaintext_language_suppressed() {
        let html = r#"<pre data-language="plaintext"><code>hello</code></pre>"#;
        assert_eq!(md(html), "```\nhello\n```");
    }

    #[test]
    fn test_code_with_fence_inside() {
        let html = "<pre><code>```\ninner\n```</code></pre>";
        assert_eq!(md(html), "````\n```\ninner\n```\n````");
    }

    #[test]
    fn test_image_metadata_comment() {
        let html = r#"<p><img src="/a.png" alt="A" width="300" height="200" style="display: block; margin-left: auto; margin-right: auto;"></p>"#;
        assert_eq!(
            md(html),
            r#"![A](/a.png) <!-- width="300" height="200" position="center" -->"#
        );
        assert_eq!(md(r#"<img src="/b.png" alt="">"#), "![](/b.png)");
        assert_eq!(
            md(r#"<img src="/c.png" alt="c" style="FLOAT:RIGHT">"#),
            r#"![c](/c.png) <!-- position="right" -->"#
        );
    }

    #[test]
    fn test_links() {
        assert_eq!(
            md(r#"<p><a href="https://example.com">site</a></p>"#),
            "[site](https://example.com)"
        );
        assert_eq!(
            md(r#"<p><a href="https://example.com" title="Example">site</a></p>"#),
            r#"[site](https://example.com "Example")"#
        );
        // Anchors without href fall back to their text
        assert_eq!(md("<p><a>bare</a></p>"), "bare");
    }

    #[test]
    fn test_media_embed_to_token() {
        let html = r#"<div class="media-embed youtube-embed"><iframe src="https://www.youtube.com/embed/abc123"></iframe></div>"#;
        assert_eq!(md(html), "@[youtube](https://www.youtube.com/embed/abc123)");

        let html = r#"<div class="media-embed twitter-embed"><blockquote class="twitter-tweet"><a href="https://twitter.com/u/status/1"></a></blockquote></div>"#;
        assert_eq!(md(html), "@[twitter](https://twitter.com/u/status/1)");

        let html = r#"<div class="media-embed"><iframe src="https://example.com/w"></iframe></div>"#;
        assert_eq!(md(html), "@[generic](https://example.com/w)");
    }

    #[test]
    fn test_media_embed_without_url_kept_as_html() {
        let html = r#"<div class="media-embed vimeo-embed"><span>nothing here</span></div>"#;
        assert_eq!(
            md(html),
            r#"<div class="media-embed"><span>nothing here</span></div>"#
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            md("<ul><li><p>one</p></li><li><p>two</p></li></ul>"),
            "- one\n- two"
        );
        assert_eq!(
            md(r#"<ol start="3"><li>three</li><li>four</li></ol>"#),
            "3. three\n4. four"
        );
        assert_eq!(
            md("<ul><li>outer<ul><li>inner</li></ul></li></ul>"),
            "- outer\n\n  - inner"
        );
    }

    #[test]
    fn test_blockquote_and_rule() {
        assert_eq!(
            md("<blockquote><p>first</p><p>second</p></blockquote><hr>"),
            "> first\n>\n> second\n\n---"
        );
    }

    #[test]
    fn test_blank_lines_inside_code_kept() {
        assert_eq!(
            md("<pre><code>a\n\n\n\nb</code></pre>"),
            "```\na\n\n\n\nb\n```"
        );
        assert_eq!(
            md("<blockquote><pre><code>x\n\n\ny</code></pre></blockquote>"),
            "> ```\n> x\n>\n>\n> y\n> ```"
        );
        assert_eq!(
            md("<ul><li><pre><code>x\n\n\ny</code></pre></li></ul>"),
            "- ```\n  x\n\n\n  y\n  ```"
        );
    }

    #[test]
    fn test_line_start_markers_escaped() {
        assert_eq!(md("<p># not a heading</p>"), r"\# not a heading");
        assert_eq!(md("<p>1. not a list</p>"), r"1\. not a list");
        assert_eq!(md("<p>- not a bullet</p>"), r"\- not a bullet");
        assert_eq!(md("<p>&gt; not a quote</p>"), r"\> not a quote");
        assert_eq!(md("<p>C# and 3.5 stay</p>"), "C# and 3.5 stay");
    }

    #[test]
    fn test_html_in_text_encoded() {
        assert_eq!(
            md("<p>Use &lt;em&gt;x&lt;/em&gt; tags &amp; more</p>"),
            "Use &lt;em>x&lt;/em> tags &amp; more"
        );
        assert_eq!(md("<p>~~not struck~~</p>"), r"\~\~not struck\~\~");
    }

    #[test]
    fn test_escapes_markdown_characters() {
        assert_eq!(md("<p>2 * 3 = snake_case</p>"), r"2 \* 3 = snake\_case");
        assert_eq!(md("<p>use <code>a*b</code></p>"), "use `a*b`");
    }
}
