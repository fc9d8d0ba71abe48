//! Media embeds: the `@[type](url)` Markdown syntax and its HTML blocks

use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use super::dom::{self, escape_attr};
use crate::error::FormatError;

lazy_static! {
    static ref EMBED_TOKEN: Regex =
        Regex::new(r"@\[(youtube|vimeo|twitter|instagram|generic)\]\(([^)\s]+)\)").unwrap();
    static ref YOUTUBE_ID: Regex = Regex::new(r"(?:v=|youtu\.be/|/embed/)([^&?/#]+)").unwrap();
}

/// CSS class carried by every embed block
pub const EMBED_CLASS: &str = "media-embed";

/// Third-party provider of an embed block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedKind {
    Youtube,
    Vimeo,
    Twitter,
    Instagram,
    Generic,
}

impl EmbedKind {
    pub const ALL: [EmbedKind; 5] = [
        EmbedKind::Youtube,
        EmbedKind::Vimeo,
        EmbedKind::Twitter,
        EmbedKind::Instagram,
        EmbedKind::Generic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EmbedKind::Youtube => "youtube",
            EmbedKind::Vimeo => "vimeo",
            EmbedKind::Twitter => "twitter",
            EmbedKind::Instagram => "instagram",
            EmbedKind::Generic => "generic",
        }
    }

    /// Secondary class name identifying the provider, e.g. `youtube-embed`
    pub fn class_name(self) -> String {
        format!("{}-embed", self.as_str())
    }

    /// Provider of an embed element, from its secondary class
    pub fn of_element(node: &Handle) -> EmbedKind {
        [
            EmbedKind::Youtube,
            EmbedKind::Vimeo,
            EmbedKind::Twitter,
            EmbedKind::Instagram,
        ]
        .into_iter()
        .find(|kind| dom::has_class(node, &kind.class_name()))
        .unwrap_or(EmbedKind::Generic)
    }
}

impl fmt::Display for EmbedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbedKind {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EmbedKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FormatError::Unsupported(format!("embed type {}", s)))
    }
}

/// Source URL of an embed element: nested `<iframe src>` first, then `<a href>`
pub fn source_url(node: &Handle) -> Option<String> {
    dom::find_descendant(node, "iframe")
        .and_then(|iframe| dom::non_empty_attr(&iframe, "src"))
        .or_else(|| dom::find_descendant(node, "a").and_then(|a| dom::non_empty_attr(&a, "href")))
}

/// Resolve a YouTube video id from a watch, short or embed URL
pub fn youtube_video_id(raw: &str) -> Option<String> {
    let id = match Url::parse(raw) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default().to_string();
            if host.contains("youtube.com") {
                parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())
                    .or_else(|| {
                        let mut segments = parsed.path_segments()?;
                        match segments.next() {
                            Some("embed") => segments.next().map(str::to_string),
                            _ => None,
                        }
                    })
            } else if host.contains("youtu.be") {
                parsed
                    .path_segments()
                    .and_then(|mut s| s.next().map(str::to_string))
            } else {
                None
            }
        }
        Err(_) => YOUTUBE_ID
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    };
    id.filter(|id| !id.is_empty())
}

/// Vimeo video id: the last path segment
pub fn vimeo_video_id(raw: &str) -> Option<String> {
    let path = raw.split(['?', '#']).next().unwrap_or(raw);
    path.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// HTML block for an embed, or `None` when the URL cannot be resolved
pub fn render(kind: EmbedKind, url: &str) -> Option<String> {
    let html = match kind {
        EmbedKind::Youtube => {
            let id = youtube_video_id(url)?;
            format!(
                r#"<div class="media-embed youtube-embed"><iframe src="https://www.youtube.com/embed/{}" frameborder="0" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture" allowfullscreen></iframe></div>"#,
                escape_attr(&id)
            )
        }
        EmbedKind::Vimeo => {
            let id = vimeo_video_id(url)?;
            format!(
                r#"<div class="media-embed vimeo-embed"><iframe src="https://player.vimeo.com/video/{}" frameborder="0" allow="autoplay; fullscreen; picture-in-picture" allowfullscreen></iframe></div>"#,
                escape_attr(&id)
            )
        }
        EmbedKind::Twitter => format!(
            r#"<div class="media-embed twitter-embed"><blockquote class="twitter-tweet"><a href="{}"></a></blockquote><script async src="https://platform.twitter.com/widgets.js" charset="utf-8"></script></div>"#,
            escape_attr(url)
        ),
        EmbedKind::Instagram => {
            let url = escape_attr(url);
            format!(
                r#"<div class="media-embed instagram-embed"><blockquote class="instagram-media" data-instgrm-permalink="{url}"><a href="{url}"></a></blockquote><script async src="//www.instagram.com/embed.js"></script></div>"#
            )
        }
        EmbedKind::Generic => format!(
            r#"<div class="media-embed generic-embed"><iframe src="{}" frameborder="0" allowfullscreen></iframe></div>"#,
            escape_attr(url)
        ),
    };
    Some(html)
}

/// Markdown token for an embed
pub fn token(kind: EmbedKind, url: &str) -> String {
    format!("@[{}]({})", kind, url)
}

/// Replace every resolvable `@[type](url)` token with its HTML block.
/// Unresolvable tokens, and tokens inside fenced or inline code, stay in the text verbatim.
pub fn expand_tokens(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut open_fence: Option<(char, usize)> = None;

    for line in markdown.split_inclusive('\n') {
        if let Some((fence, run)) = open_fence {
            out.push_str(line);
            let closes = fence_marker(line).is_some_and(|(c, len)| {
                c == fence && len >= run && line.trim().trim_matches(c).is_empty()
            });
            if closes {
                open_fence = None;
            }
            continue;
        }
        if let Some(marker) = fence_marker(line) {
            open_fence = Some(marker);
            out.push_str(line);
            continue;
        }
        out.push_str(&expand_outside_code_spans(line));
    }
    out
}

/// Fence character and length when the line opens or closes a code fence
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    let c = trimmed.chars().next().filter(|&c| c == '`' || c == '~')?;
    let run = trimmed.len() - trimmed.trim_start_matches(c).len();
    (run >= 3).then_some((c, run))
}

fn expand_outside_code_spans(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find('`') {
        let run = backtick_run(&rest[start..]);
        let after = &rest[start + run..];
        out.push_str(&expand_text(&rest[..start]));
        match closing_run(after, run) {
            Some(end) => {
                let span_end = start + run + end + run;
                out.push_str(&rest[start..span_end]);
                rest = &rest[span_end..];
            }
            None => {
                // An unmatched run is literal text
                out.push_str(&rest[start..start + run]);
                rest = after;
            }
        }
    }
    out.push_str(&expand_text(rest));
    out
}

fn backtick_run(text: &str) -> usize {
    text.len() - text.trim_start_matches('`').len()
}

/// Offset of the first backtick run of exactly `run` characters
fn closing_run(text: &str, run: usize) -> Option<usize> {
    let mut offset = 0;
    while let Some(start) = text[offset..].find('`') {
        let at = offset + start;
        let len = backtick_run(&text[at..]);
        if len == run {
            return Some(at);
        }
        offset = at + len;
    }
    None
}

fn expand_text(text: &str) -> String {
    EMBED_TOKEN
        .replace_all(text, |caps: &Captures| {
            let whole = caps[0].to_string();
            let Ok(kind) = caps[1].parse::<EmbedKind>() else {
                return whole;
            };
            render(kind, &caps[2]).unwrap_or_else(|| {
                tracing::debug!("Leaving unresolvable {} embed as-is: {}", kind, &caps[2]);
                whole
            })
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_ids() {
        assert_eq!(
            youtube_video_id("https://youtu.be/abc123"),
            Some("abc123".to_string())
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=xyz&t=10"),
            Some("xyz".to_string())
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/embed/abc123"),
            Some("abc123".to_string())
        );
        assert_eq!(youtube_video_id("https://www.youtube.com/feed"), None);
        assert_eq!(youtube_video_id("youtu.be/raw42"), Some("raw42".to_string()));
    }

    #[test]
    fn test_vimeo_id() {
        assert_eq!(
            vimeo_video_id("https://vimeo.com/76979871"),
            Some("76979871".to_string())
        );
        assert_eq!(vimeo_video_id("https://vimeo.com/"), None);
    }

    #[test]
    fn test_expand_youtube_token() {
        let html = expand_tokens("@[youtube](https://youtu.be/abc123)");
        assert!(html.contains(r#"class="media-embed youtube-embed""#));
        assert!(html.contains(r#"src="https://www.youtube.com/embed/abc123""#));
    }

    #[test]
    fn test_expand_social_tokens() {
        let html = expand_tokens("@[twitter](https://twitter.com/u/status/1)");
        assert!(html.contains(r#"<blockquote class="twitter-tweet"><a href="https://twitter.com/u/status/1"></a>"#));
        assert!(html.contains("platform.twitter.com/widgets.js"));

        let html = expand_tokens("@[instagram](https://instagram.com/p/xyz)");
        assert!(html.contains(r#"data-instgrm-permalink="https://instagram.com/p/xyz""#));
    }

    #[test]
    fn test_unresolvable_token_left_verbatim() {
        let md = "before @[youtube](https://example.com/video) after";
        assert_eq!(expand_tokens(md), md);
    }

    #[test]
    fn test_unknown_type_is_not_a_token() {
        let md = "@[dailymotion](https://example.com/x)";
        assert_eq!(expand_tokens(md), md);
        assert!("dailymotion".parse::<EmbedKind>().is_err());
    }

    #[test]
    fn test_tokens_in_fenced_code_left_alone() {
        let md = "```\n@[youtube](https://youtu.be/abc123)\n```\n";
        assert_eq!(expand_tokens(md), md);

        let md = "~~~~\n~~~\n@[youtube](https://youtu.be/abc123)\n~~~~\n";
        assert_eq!(expand_tokens(md), md);

        let after = expand_tokens("```\ncode\n```\n@[youtube](https://youtu.be/abc123)\n");
        assert!(after.starts_with("```\ncode\n```\n"));
        assert!(after.contains(r#"src="https://www.youtube.com/embed/abc123""#));
    }

    #[test]
    fn test_tokens_in_inline_code_left_alone() {
        let md = "Write `@[youtube](https://youtu.be/abc123)` to embed";
        assert_eq!(expand_tokens(md), md);

        let md = "Or ``a ` @[youtube](https://youtu.be/abc123)`` too";
        assert_eq!(expand_tokens(md), md);

        let mixed = expand_tokens("`code` then @[youtube](https://youtu.be/abc123)");
        assert!(mixed.starts_with("`code` then <"));
        assert!(mixed.contains(r#"src="https://www.youtube.com/embed/abc123""#));
    }
}
