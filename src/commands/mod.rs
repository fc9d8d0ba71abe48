//! Command implementations

pub mod convert;
pub mod db;
pub mod drafts;
pub mod stats;
pub mod watch;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::content::{convert::convert as convert_content, Content, Format};

/// Read a content file and render it as HTML
pub(crate) fn read_as_html(path: &Path, format: Option<Format>) -> Result<String> {
    let format = match format {
        Some(format) => format,
        None => Format::from_path(path)?,
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let content = Content::from_text(format, &text)?;
    Ok(convert_content(content, format, Format::Html)?.into_text())
}
