//! Auto-save module
//!
//! Drives periodic and debounced saves of the document being edited, keeps
//! the version history current and restores earlier snapshots on request.
//! Saves go to the server tier first and to the local store when the server
//! is unavailable.

mod controller;
mod notify;

pub use controller::{AutoSaveBuilder, AutoSaveController};
pub use notify::{LogNotifier, Notice, Notifier};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::config::DraftsmithConfig;

/// Message returned when leaving with unsaved changes
pub const EXIT_PROMPT: &str = "You have unsaved changes. Are you sure you want to leave?";

/// Observable state of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Editing,
    PendingSave,
    Saving,
    SaveFailed,
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SaveState::Idle => "idle",
            SaveState::Editing => "editing",
            SaveState::PendingSave => "pending",
            SaveState::Saving => "saving",
            SaveState::SaveFailed => "save failed",
        };
        f.write_str(label)
    }
}

/// What caused a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Debounce,
    Interval,
    Manual,
    Exit,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trigger::Debounce => "debounce",
            Trigger::Interval => "interval",
            Trigger::Manual => "manual",
            Trigger::Exit => "exit",
        };
        f.write_str(label)
    }
}

/// Answer to a page-exit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPrompt {
    /// Nothing unsaved; leave without asking
    Allow,
    /// Ask the user to confirm with this message
    Confirm(&'static str),
}

/// Caller-supplied work run before every save
#[async_trait]
pub trait SaveHook: Send + Sync {
    async fn on_save(&self, content: &str) -> anyhow::Result<()>;
}

/// Timing and display options for the controller
#[derive(Debug, Clone)]
pub struct AutoSaveOptions {
    /// Quiet period after the last edit before saving
    pub debounce: Duration,
    /// Period of the forced save while changes are pending
    pub interval: Duration,
    pub show_indicator: bool,
    /// Server snapshots fetched when refreshing versions
    pub list_limit: usize,
}

impl Default for AutoSaveOptions {
    fn default() -> Self {
        Self::from_config(&DraftsmithConfig::default())
    }
}

impl AutoSaveOptions {
    pub fn from_config(config: &DraftsmithConfig) -> Self {
        Self {
            debounce: config.autosave.debounce(),
            interval: config.autosave.interval(),
            show_indicator: config.autosave.show_indicator,
            list_limit: config.versions.list_limit,
        }
    }
}
