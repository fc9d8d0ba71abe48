//! Convert a content file between formats

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::content::{convert, Content, Format};

/// Convert `input` to `to`, writing to `output` or stdout
pub fn run(input: &Path, from: Option<Format>, to: Format, output: Option<&Path>) -> Result<()> {
    let from = match from {
        Some(format) => format,
        None => Format::from_path(input)
            .with_context(|| format!("cannot infer format of {}", input.display()))?,
    };

    let text = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let converted = convert(Content::from_text(from, &text)?, from, to)?.into_text();

    match output {
        Some(path) => {
            fs::write(path, &converted).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("Converted {} ({}) to {} ({})", input.display(), from, path.display(), to);
        }
        None => println!("{}", converted),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_markdown_file_to_html() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("post.md");
        let output = dir.path().join("post.html");
        fs::write(&input, "# Title\n\nSome *text*.\n").unwrap();

        run(&input, None, Format::Html, Some(&output)).unwrap();
        let html = fs::read_to_string(&output).unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn test_unknown_extension_needs_explicit_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("post.txt");
        fs::write(&input, "plain").unwrap();

        assert!(run(&input, None, Format::Html, None).is_err());
        let output = dir.path().join("out.md");
        run(&input, Some(Format::Markdown), Format::Markdown, Some(&output)).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "plain");
    }
}
