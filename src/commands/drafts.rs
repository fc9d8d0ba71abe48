//! Draft snapshot management

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::drafts::{Document, DraftSnapshot, Origin, SaveTier};
use crate::Draftsmith;

const PREVIEW_CHARS: usize = 60;

/// List version history for a post, or for unsaved new posts
pub async fn list(
    app: &Draftsmith,
    user: Option<&str>,
    post_id: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let db = app.open_database()?;
    let writer = app.writer(app.draft_service(&db, user));
    let limit = limit.unwrap_or(app.config.versions.list_limit);

    let versions = writer.list(post_id, limit).await;
    db.shutdown();

    println!(
        "Drafts for {} ({}):",
        post_id.unwrap_or("new post"),
        versions.len()
    );
    for snapshot in versions.iter() {
        println!("  {}", summary(snapshot));
    }
    Ok(())
}

/// Print one snapshot in full
pub async fn show(app: &Draftsmith, user: Option<&str>, draft_id: &str) -> Result<()> {
    let db = app.open_database()?;
    let service = app.draft_service(&db, user);
    let result = service.get(draft_id).await;
    db.shutdown();

    let snapshot = result.with_context(|| format!("loading draft {}", draft_id))?;
    println!("{}", summary(&snapshot));
    if !snapshot.title.is_empty() {
        println!("Title: {}", snapshot.title);
    }
    if !snapshot.tags.is_empty() {
        println!("Tags: {}", snapshot.tags);
    }
    println!();
    println!("{}", snapshot.content);
    Ok(())
}

/// Save a file's content as a new snapshot
pub async fn save(
    app: &Draftsmith,
    user: Option<&str>,
    file: &Path,
    post_id: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let html = super::read_as_html(file, None)
        .or_else(|_| fs::read_to_string(file))
        .with_context(|| format!("reading {}", file.display()))?;
    let document = Document {
        title: title.unwrap_or_default(),
        ..Document::new(post_id, html)
    };

    let db = app.open_database()?;
    let writer = app.writer(app.draft_service(&db, user));
    let result = writer.save(&document).await;
    db.shutdown();

    let saved = result?;
    match saved.tier {
        SaveTier::Primary => println!("Saved draft {}", saved.snapshot.id),
        SaveTier::Fallback => println!(
            "Server save failed; saved local draft {} in {}",
            saved.snapshot.id,
            app.local_dir.display()
        ),
    }
    Ok(())
}

pub async fn delete(app: &Draftsmith, user: Option<&str>, draft_id: &str) -> Result<()> {
    let db = app.open_database()?;
    let service = app.draft_service(&db, user);
    let result = service.delete(draft_id).await;
    db.shutdown();

    result.with_context(|| format!("deleting draft {}", draft_id))?;
    println!("Deleted draft {}", draft_id);
    Ok(())
}

fn summary(snapshot: &DraftSnapshot) -> String {
    let origin = match snapshot.origin {
        Origin::Server => "server",
        Origin::Local => "local",
    };
    format!(
        "{} - {} [{}] {}",
        snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
        snapshot.id,
        origin,
        snapshot.preview(PREVIEW_CHARS).replace('\n', " ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_in(dir: &Path) -> Draftsmith {
        fs::write(dir.join("_config.yml"), "user: alice\n").unwrap();
        Draftsmith::new(dir).unwrap()
    }

    #[tokio::test]
    async fn test_save_then_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path());
        let file = dir.path().join("post.html");
        fs::write(&file, "<p>Draft body</p>").unwrap();

        save(&app, None, &file, Some("p1".into()), Some("Hello".into()))
            .await
            .unwrap();

        let db = app.open_database().unwrap();
        let service = app.draft_service(&db, None);
        let versions = service.list(Some("p1"), 10).await.unwrap();
        assert_eq!(versions.len(), 1);
        let snapshot = versions.latest().unwrap().clone();
        assert_eq!(snapshot.title, "Hello");
        assert_eq!(snapshot.content, "<p>Draft body</p>");
        db.shutdown();

        list(&app, None, Some("p1"), None).await.unwrap();
        show(&app, None, &snapshot.id).await.unwrap();
        assert!(show(&app, Some("bob"), &snapshot.id).await.is_err());

        delete(&app, None, &snapshot.id).await.unwrap();
        assert!(delete(&app, None, &snapshot.id).await.is_err());
    }

    #[test]
    fn test_summary_flattens_preview() {
        let mut snapshot = crate::drafts::test_support::snapshot("d1", 0, Origin::Local);
        snapshot.content = "line one\nline two".to_string();
        let line = summary(&snapshot);
        assert!(line.contains("d1 [local] line one line two"));
    }
}
