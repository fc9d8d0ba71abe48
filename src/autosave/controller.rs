//! The auto-save task and the handle editors talk to

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{
    AutoSaveOptions, ExitPrompt, LogNotifier, Notice, Notifier, SaveHook, SaveState, Trigger,
    EXIT_PROMPT,
};
use crate::drafts::{Document, DraftSnapshot, SaveTier, SavedDraft, TwoTierWriter, VersionList};
use crate::error::DraftError;

/// Editing session state shared between the handle, the timer task and saves
#[derive(Debug, Default)]
struct Session {
    document: Document,
    /// The document as it was last persisted
    last_saved: Document,
    last_saved_at: Option<DateTime<Utc>>,
    has_unsaved_changes: bool,
    versions: VersionList,
}

struct Shared {
    session: Mutex<Session>,
    /// Serializes saves; the holder reads the freshest content
    save_lock: tokio::sync::Mutex<()>,
    mounted: AtomicBool,
    state: watch::Sender<SaveState>,
    writer: TwoTierWriter,
    hook: Option<Arc<dyn SaveHook>>,
    notifier: Arc<dyn Notifier>,
    options: AutoSaveOptions,
}

/// Configures and starts an [`AutoSaveController`]
pub struct AutoSaveBuilder {
    writer: TwoTierWriter,
    options: AutoSaveOptions,
    hook: Option<Arc<dyn SaveHook>>,
    notifier: Arc<dyn Notifier>,
}

impl AutoSaveBuilder {
    pub fn new(writer: TwoTierWriter) -> Self {
        Self {
            writer,
            options: AutoSaveOptions::default(),
            hook: None,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn options(mut self, options: AutoSaveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn hook(mut self, hook: Arc<dyn SaveHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Start the timer task for a document. Must be called inside a Tokio runtime.
    pub fn spawn(self, document: Document) -> AutoSaveController {
        let (state, _) = watch::channel(SaveState::Idle);
        let session = Session {
            last_saved: document.clone(),
            document,
            ..Default::default()
        };
        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            save_lock: tokio::sync::Mutex::new(()),
            mounted: AtomicBool::new(true),
            state,
            writer: self.writer,
            hook: self.hook,
            notifier: self.notifier,
            options: self.options,
        });

        let (edits, edit_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(Arc::clone(&shared), edit_rx));

        AutoSaveController {
            shared,
            edits,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

/// Handle to a running auto-save session
#[derive(Clone)]
pub struct AutoSaveController {
    shared: Arc<Shared>,
    edits: mpsc::UnboundedSender<Instant>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AutoSaveController {
    pub fn builder(writer: TwoTierWriter) -> AutoSaveBuilder {
        AutoSaveBuilder::new(writer)
    }

    /// Replace the document content after an edit
    pub fn change(&self, content: impl Into<String>) {
        self.update(|document| document.content = content.into());
    }

    /// Apply an edit to the document and restart the debounce window
    pub fn update(&self, edit: impl FnOnce(&mut Document)) {
        if !self.shared.is_mounted() {
            tracing::debug!("Ignoring edit after shutdown");
            return;
        }
        {
            let mut session = self.shared.session();
            edit(&mut session.document);
            session.has_unsaved_changes = true;
        }
        self.shared.set_state(SaveState::Editing);
        // The task is gone only after shutdown
        let _ = self.edits.send(Instant::now());
    }

    /// Save immediately. `Ok(None)` when there was nothing to save.
    pub async fn save_now(&self) -> Result<Option<SavedDraft>, DraftError> {
        self.shared.save(Trigger::Manual).await
    }

    /// Page exit: save pending changes and ask for confirmation
    pub async fn before_unload(&self) -> ExitPrompt {
        if !self.has_unsaved_changes() {
            return ExitPrompt::Allow;
        }
        if let Err(e) = self.shared.save(Trigger::Exit).await {
            tracing::warn!("Exit save failed: {}", e);
        }
        ExitPrompt::Confirm(EXIT_PROMPT)
    }

    /// Restore the content of a snapshot from the version list
    pub fn recover(&self, draft_id: &str) -> Result<DraftSnapshot, DraftError> {
        let snapshot = self.shared.session().versions.find(draft_id).cloned();
        match snapshot {
            Some(snapshot) => Ok(self.restore(snapshot)),
            None => {
                tracing::warn!("Draft version {} is not in the history", draft_id);
                self.shared.notifier.notify(Notice::RecoverFailed);
                Err(DraftError::NotFound(draft_id.to_string()))
            }
        }
    }

    /// Restore the newest snapshot in the version list
    pub fn recover_latest(&self) -> Result<DraftSnapshot, DraftError> {
        let snapshot = self.shared.session().versions.latest().cloned();
        match snapshot {
            Some(snapshot) => Ok(self.restore(snapshot)),
            None => {
                self.shared.notifier.notify(Notice::RecoverFailed);
                Err(DraftError::NotFound("latest draft version".to_string()))
            }
        }
    }

    // History is untouched and the document is not marked dirty
    fn restore(&self, snapshot: DraftSnapshot) -> DraftSnapshot {
        self.shared.session().document.content = snapshot.content.clone();
        tracing::debug!("Recovered draft version {}", snapshot.id);
        self.shared.notifier.notify(Notice::Recovered);
        snapshot
    }

    pub async fn refresh_versions(&self) {
        self.shared.refresh_versions().await;
    }

    /// Stop both timers; saves finishing afterwards leave no trace
    pub fn shutdown(&self) {
        if !self.shared.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        tracing::debug!("Auto-save stopped");
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.is_mounted()
    }

    pub fn document(&self) -> Document {
        self.shared.session().document.clone()
    }

    pub fn content(&self) -> String {
        self.shared.session().document.content.clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.shared.session().has_unsaved_changes
    }

    pub fn last_saved_content(&self) -> String {
        self.shared.session().last_saved.content.clone()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.shared.session().last_saved_at
    }

    pub fn versions(&self) -> VersionList {
        self.shared.session().versions.clone()
    }

    pub fn state(&self) -> SaveState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.shared.state.subscribe()
    }
}

/// Timer loop: debounce after each edit, forced save on every interval tick
async fn run(shared: Arc<Shared>, mut edits: mpsc::UnboundedReceiver<Instant>) {
    shared.refresh_versions().await;

    let period = shared.options.interval;
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let debounce = tokio::time::sleep(shared.options.debounce);
    tokio::pin!(debounce);
    let mut armed = false;

    loop {
        tokio::select! {
            edit = edits.recv() => match edit {
                Some(at) => {
                    debounce.as_mut().reset(at + shared.options.debounce);
                    armed = true;
                    shared.set_state(SaveState::PendingSave);
                }
                None => break,
            },
            () = &mut debounce, if armed => {
                armed = false;
                shared.spawn_save(Trigger::Debounce);
            }
            _ = interval.tick() => {
                let dirty = shared.session().has_unsaved_changes;
                if dirty {
                    shared.spawn_save(Trigger::Interval);
                }
            }
        }
    }
    tracing::debug!("Auto-save task finished");
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: SaveState) {
        if self.is_mounted() {
            self.state.send_replace(state);
        }
    }

    fn spawn_save(self: &Arc<Self>, trigger: Trigger) {
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = shared.save(trigger).await {
                tracing::debug!("{} save failed: {}", trigger, e);
            }
        });
    }

    async fn save(&self, trigger: Trigger) -> Result<Option<SavedDraft>, DraftError> {
        let _guard = self.save_lock.lock().await;

        // Timers only save edits; explicit saves also cover recovered documents
        let automatic = matches!(trigger, Trigger::Debounce | Trigger::Interval);
        let document = {
            let session = self.session();
            if !session.has_unsaved_changes
                && (automatic || session.document == session.last_saved)
            {
                tracing::debug!("Skipping {} save, nothing changed", trigger);
                return Ok(None);
            }
            session.document.clone()
        };

        self.set_state(SaveState::Saving);
        tracing::debug!(
            "Saving draft ({} trigger, {} bytes)",
            trigger,
            document.content.len()
        );

        if let Some(hook) = &self.hook {
            if let Err(e) = hook.on_save(&document.content).await {
                tracing::warn!("Save hook failed: {:#}", e);
            }
        }

        let saved = match self.writer.save(&document).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!("Error saving draft: {}", e);
                self.set_state(SaveState::SaveFailed);
                if self.is_mounted() {
                    self.notifier.notify(Notice::SaveFailed);
                }
                self.set_state(SaveState::Idle);
                return Err(e);
            }
        };

        let post_id = document.post_id.as_deref();
        let versions = match saved.tier {
            SaveTier::Primary => self.writer.list(post_id, self.options.list_limit).await,
            SaveTier::Fallback => {
                self.set_state(SaveState::SaveFailed);
                let current = self.session().versions.clone();
                let local = self.writer.list_fallback(post_id).await;
                VersionList::merge(current, local, self.writer.display_limit())
            }
        };

        if !self.is_mounted() {
            tracing::debug!("Discarding result of {} save after shutdown", trigger);
            return Ok(Some(saved));
        }

        let still_dirty = {
            let mut session = self.session();
            session.last_saved = document.clone();
            session.last_saved_at = Some(saved.snapshot.created_at);
            // An edit to any field that arrived mid-save stays pending
            if session.document == document {
                session.has_unsaved_changes = false;
            }
            session.versions = versions;
            session.has_unsaved_changes
        };

        if self.options.show_indicator {
            self.notifier.notify(Notice::Saved);
        }
        self.set_state(if still_dirty {
            SaveState::PendingSave
        } else {
            SaveState::Idle
        });
        Ok(Some(saved))
    }

    async fn refresh_versions(&self) {
        let post_id = self.session().document.post_id.clone();
        let versions = self
            .writer
            .list(post_id.as_deref(), self.options.list_limit)
            .await;
        if self.is_mounted() {
            self.session().versions = versions;
        }
    }
}
