//! Conversion between the three content representations

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::{from_markdown, to_html, to_markdown, to_structured};
use crate::error::FormatError;

/// Content representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Html,
    Json,
    Markdown,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Json => "json",
            Format::Markdown => "markdown",
        }
    }

    /// File extension used when exporting
    pub fn extension(self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Json => "json",
            Format::Markdown => "md",
        }
    }

    /// Guess a format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" | "htm" => Ok(Format::Html),
            "json" => Ok(Format::Json),
            "markdown" | "md" => Ok(Format::Markdown),
            other => Err(FormatError::Unsupported(other.to_string())),
        }
    }
}

/// Content in one of the supported representations
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Html(String),
    Json(Value),
    Markdown(String),
}

impl Content {
    pub fn format(&self) -> Format {
        match self {
            Content::Html(_) => Format::Html,
            Content::Json(_) => Format::Json,
            Content::Markdown(_) => Format::Markdown,
        }
    }

    /// The empty value of a format
    pub fn empty(format: Format) -> Self {
        match format {
            Format::Html => Content::Html(String::new()),
            Format::Json => Content::Json(Value::Object(Default::default())),
            Format::Markdown => Content::Markdown(String::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Html(s) | Content::Markdown(s) => s.trim().is_empty(),
            Content::Json(v) => v.is_null() || v.as_object().is_some_and(|o| o.is_empty()),
        }
    }

    /// Read content of a format from text (JSON is parsed)
    pub fn from_text(format: Format, text: &str) -> Result<Self, FormatError> {
        Ok(match format {
            Format::Html => Content::Html(text.to_string()),
            Format::Markdown => Content::Markdown(text.to_string()),
            Format::Json if text.trim().is_empty() => Content::empty(Format::Json),
            Format::Json => {
                Content::Json(
                    serde_json::from_str(text).map_err(|e| FormatError::Malformed {
                        format: "json",
                        message: e.to_string(),
                    })?,
                )
            }
        })
    }

    /// Text form of the content; JSON is pretty-printed
    pub fn into_text(self) -> String {
        match self {
            Content::Html(s) | Content::Markdown(s) => s,
            Content::Json(v) => serde_json::to_string_pretty(&v).unwrap_or_default(),
        }
    }
}

/// Convert content between formats, going through HTML
pub fn convert(content: Content, from: Format, to: Format) -> Result<Content, FormatError> {
    if content.format() != from {
        return Err(FormatError::Mismatch {
            expected: from.as_str(),
            actual: content.format().as_str(),
        });
    }
    if from == to {
        return Ok(content);
    }
    if content.is_empty() {
        return Ok(Content::empty(to));
    }

    let html = match content {
        Content::Html(html) => html,
        Content::Json(value) => to_html(&value),
        Content::Markdown(markdown) => from_markdown(&markdown),
    };

    tracing::debug!("Converting {} -> {} via {} bytes of HTML", from, to, html.len());

    Ok(match to {
        Format::Html => Content::Html(html),
        Format::Json => Content::Json(to_structured(&html).to_value()),
        Format::Markdown => Content::Markdown(to_markdown(&html)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::embed::{self, EmbedKind};
    use serde_json::json;

    #[test]
    fn test_format_parsing() {
        assert_eq!("HTML".parse::<Format>().unwrap(), Format::Html);
        assert_eq!("md".parse::<Format>().unwrap(), Format::Markdown);
        assert_eq!(Format::from_path("post.json").unwrap(), Format::Json);
        assert_eq!(
            "docx".parse::<Format>().unwrap_err(),
            FormatError::Unsupported("docx".to_string())
        );
    }

    #[test]
    fn test_identity_conversion() {
        let samples = [
            Content::Html("<p>hi</p>".to_string()),
            Content::Json(json!({"type": "doc", "content": []})),
            Content::Markdown("# hi".to_string()),
        ];
        for content in samples {
            let format = content.format();
            assert_eq!(convert(content.clone(), format, format).unwrap(), content);
        }
    }

    #[test]
    fn test_mismatched_source_format() {
        let err = convert(Content::Html("<p>x</p>".into()), Format::Markdown, Format::Html)
            .unwrap_err();
        assert!(matches!(err, FormatError::Mismatch { .. }));
    }

    #[test]
    fn test_empty_content_converts_to_empty_target() {
        assert_eq!(
            convert(Content::Markdown(String::new()), Format::Markdown, Format::Json).unwrap(),
            Content::empty(Format::Json)
        );
    }

    #[test]
    fn test_markdown_round_trip_preserves_metadata() {
        let html = concat!(
            "<h2>Notes</h2>",
            "<p>See <a href=\"https://example.com/docs\" title=\"Docs\">the docs</a>.</p>",
            "<pre data-language=\"rust\"><code class=\"language-rust\">let x = 1;</code></pre>",
            "<p><img src=\"/a.png\" alt=\"A\" width=\"300\" height=\"200\" style=\"float: left; margin-right: 1rem; margin-bottom: 0.5rem;\"></p>",
        );

        let markdown = to_markdown(html);
        assert!(markdown.contains("```rust\nlet x = 1;\n```"));
        assert!(markdown.contains(r#"[the docs](https://example.com/docs "Docs")"#));
        assert!(markdown.contains(r#"![A](/a.png) <!-- width="300" height="200" position="left" -->"#));

        let back = from_markdown(&markdown);
        assert!(back.contains(r#"data-language="rust""#));
        assert!(back.contains(r#"href="https://example.com/docs""#));
        assert!(back.contains(r#"width="300""#));
        assert!(back.contains(r#"height="200""#));
        assert!(back.contains("float: left"));

        // A second cycle does not drift
        assert_eq!(to_markdown(&back), markdown);
    }

    #[test]
    fn test_literal_text_survives_markdown_cycle() {
        let cases = [
            "<p># not a heading</p>",
            "<p>1. not a list</p>",
            "<p>- not a bullet</p>",
            "<p>&gt; not a quote</p>",
            "<p>Use &lt;em&gt;x&lt;/em&gt; tags &amp; more</p>",
        ];
        for html in cases {
            let back = from_markdown(&to_markdown(html));
            assert_eq!(back.trim(), html, "{} came back as {}", html, back);
        }
    }

    #[test]
    fn test_code_blank_lines_survive_markdown_cycle() {
        let html = "<pre><code>a\n\n\n\nb</code></pre>";
        let back = from_markdown(&to_markdown(html));
        assert!(back.contains("a\n\n\n\nb"), "got {}", back);
    }

    #[test]
    fn test_all_embeds_survive_markdown_cycle() {
        let urls = [
            (EmbedKind::Youtube, "https://youtu.be/abc123"),
            (EmbedKind::Vimeo, "https://vimeo.com/76979871"),
            (EmbedKind::Twitter, "https://twitter.com/u/status/1"),
            (EmbedKind::Instagram, "https://www.instagram.com/p/xyz"),
            (EmbedKind::Generic, "https://example.com/widget"),
        ];
        for (kind, url) in urls {
            let html = from_markdown(&embed::token(kind, url));
            let markdown = to_markdown(&html);
            assert!(
                markdown.starts_with(&format!("@[{}](", kind)),
                "{} became {}",
                kind,
                markdown
            );
            // The token expands to the same block again
            assert_eq!(from_markdown(&markdown).trim(), html.trim());
        }
    }

    #[test]
    fn test_youtube_scenario() {
        let html = convert(
            Content::Markdown("@[youtube](https://youtu.be/abc123)".to_string()),
            Format::Markdown,
            Format::Html,
        )
        .unwrap()
        .into_text();
        assert!(html.contains(r#"src="https://www.youtube.com/embed/abc123""#));

        let markdown = convert(Content::Html(html), Format::Html, Format::Markdown)
            .unwrap()
            .into_text();
        assert_eq!(markdown, "@[youtube](https://www.youtube.com/embed/abc123)");
        assert_eq!(
            embed::youtube_video_id("https://www.youtube.com/embed/abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_json_round_trip_through_markdown() {
        let json = convert(
            Content::Markdown("# Title\n\n- one\n- two\n".to_string()),
            Format::Markdown,
            Format::Json,
        )
        .unwrap();
        let Content::Json(value) = &json else {
            panic!("expected json");
        };
        assert_eq!(value["doc"]["content"][0]["type"], "heading");
        assert_eq!(value["meta"]["wordCount"], 3);

        let markdown = convert(json, Format::Json, Format::Markdown).unwrap();
        assert_eq!(markdown, Content::Markdown("# Title\n\n- one\n- two".to_string()));
    }
}
