//! Content module - conversion between HTML, structured trees and Markdown
//!
//! The free functions here are the soft entry points used by the editor:
//! they never fail, logging and returning an empty value instead.

pub mod convert;
pub mod dom;
pub mod embed;
mod markdown;
mod markdown_writer;
pub mod stats;
pub mod structured;

use serde_json::Value;

pub use convert::{convert, Content, Format};
pub use embed::EmbedKind;
pub use markdown::MarkdownRenderer;
pub use markdown_writer::MarkdownWriter;
pub use stats::{reading_time, word_count, DEFAULT_WORDS_PER_MINUTE};
pub use structured::{DocMeta, Mark, Node, StructuredDoc};

/// Parse HTML into a structured document with its metadata block
pub fn to_structured(html: &str) -> StructuredDoc {
    StructuredDoc::from_html(html, DEFAULT_WORDS_PER_MINUTE)
}

/// Render a structured document (raw tree or wrapped with metadata) to HTML
pub fn to_html(structured: &Value) -> String {
    match structured::tree_from_value(structured) {
        Ok(tree) => tree.to_html(),
        Err(e) => {
            tracing::warn!("Error converting structured content to HTML: {}", e);
            String::new()
        }
    }
}

/// Render HTML to Markdown
pub fn to_markdown(html: &str) -> String {
    MarkdownWriter::new().write(html)
}

/// Render Markdown, including embed tokens and image metadata, to HTML
pub fn from_markdown(markdown: &str) -> String {
    MarkdownRenderer::new().render(markdown)
}
