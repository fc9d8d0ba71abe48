//! Word count and reading time of a content file

use anyhow::Result;
use std::path::Path;

use crate::content::{reading_time, word_count, Format};
use crate::Draftsmith;

pub fn run(app: &Draftsmith, input: &Path, format: Option<Format>) -> Result<()> {
    let html = super::read_as_html(input, format)?;
    let words = word_count(&html);
    let minutes = reading_time(&html, app.config.reading.words_per_minute);

    println!("{}", input.display());
    println!("  Words:        {}", words);
    println!("  Reading time: {} min", minutes);
    Ok(())
}
