//! Auto-save a file while it is edited externally

use anyhow::{Context, Result};
use notify::Watcher;
use std::ffi::OsString;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::autosave::{AutoSaveController, AutoSaveOptions, ExitPrompt};
use crate::drafts::Document;
use crate::Draftsmith;

/// Watch `file` and feed every change to an auto-save session until Ctrl+C
pub async fn run(
    app: &Draftsmith,
    user: Option<&str>,
    file: &Path,
    post_id: Option<String>,
) -> Result<()> {
    let file = file
        .canonicalize()
        .with_context(|| format!("cannot watch {}", file.display()))?;
    let dir = file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = file.file_name().map(OsString::from);

    let db = app.open_database()?;
    let writer = app.writer(app.draft_service(&db, user));
    let controller = AutoSaveController::builder(writer)
        .options(AutoSaveOptions::from_config(&app.config))
        .spawn(Document::new(post_id, load(&file)?));

    let (tx, mut rx) = mpsc::unbounded_channel();
    // Watch the directory: editors often replace the file instead of writing it
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            let relevant = (event.kind.is_modify() || event.kind.is_create())
                && event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(OsString::from) == name);
            if relevant {
                let _ = tx.send(());
            }
        }
    })?;
    watcher.watch(&dir, notify::RecursiveMode::NonRecursive)?;

    tracing::info!("Watching {:?} for edits. Press Ctrl+C to stop.", file);
    follow(&controller, &file, &mut rx, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        }
    })
    .await;

    if let ExitPrompt::Confirm(message) = controller.before_unload().await {
        tracing::warn!("{}", message);
    }
    controller.shutdown();
    drop(watcher);
    db.shutdown();

    if let Some(saved_at) = controller.last_saved_at() {
        println!("Last saved at {}", saved_at.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

/// Feed file change events to the session until `shutdown` resolves
async fn follow<F>(
    controller: &AutoSaveController,
    file: &Path,
    events: &mut mpsc::UnboundedReceiver<()>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut states = controller.subscribe();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(()) = events.recv() => match load(file) {
                Ok(content) if content != controller.content() => controller.change(content),
                Ok(_) => {}
                Err(e) => tracing::warn!("Error reading {:?}: {:#}", file, e),
            },
            Ok(()) = states.changed() => {
                let state = *states.borrow_and_update();
                tracing::debug!("Auto-save: {}", state);
            }
            () = &mut shutdown => break,
        }
    }
}

/// File content as HTML; files of unknown type are taken as-is
fn load(file: &Path) -> Result<String> {
    match super::read_as_html(file, None) {
        Ok(html) => Ok(html),
        Err(_) => fs::read_to_string(file).with_context(|| format!("reading {}", file.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::test_support::FlakyTier;
    use crate::drafts::TwoTierWriter;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn controller(content: &str) -> AutoSaveController {
        let writer = TwoTierWriter::new(
            Arc::new(FlakyTier::default()),
            Arc::new(FlakyTier::default()),
        );
        AutoSaveController::builder(writer)
            .options(AutoSaveOptions {
                debounce: Duration::from_secs(600),
                interval: Duration::from_secs(600),
                show_indicator: false,
                list_limit: 10,
            })
            .spawn(Document::new(None, content))
    }

    #[tokio::test]
    async fn test_follow_feeds_edits_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("post.txt");
        fs::write(&file, "first").unwrap();
        let controller = controller("first");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (stop, stopped) = oneshot::channel::<()>();

        let driver = async {
            // Unchanged content is not an edit
            tx.send(()).unwrap();
            for round in 0..20 {
                fs::write(&file, format!("edit {}", round)).unwrap();
                tx.send(()).unwrap();
                while controller.content() != format!("edit {}", round) {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
            stop.send(()).unwrap();
        };
        let shutdown = async {
            let _ = stopped.await;
        };

        tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(follow(&controller, &file, &mut rx, shutdown), driver);
        })
        .await
        .unwrap();

        assert_eq!(controller.content(), "edit 19");
        assert!(controller.has_unsaved_changes());
        controller.shutdown();
    }

    #[test]
    fn test_load_falls_back_to_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "plain *text*").unwrap();
        assert_eq!(load(&file).unwrap(), "plain *text*");
    }
}
