//! User-facing save notifications

use std::fmt;

/// A transient notification raised by the auto-save controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Saved,
    SaveFailed,
    Recovered,
    RecoverFailed,
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::Saved => "Draft saved",
            Notice::SaveFailed => "Failed to save draft",
            Notice::Recovered => "Draft version recovered",
            Notice::RecoverFailed => "Failed to recover draft version",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::SaveFailed | Notice::RecoverFailed)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Receives notifications; implementations must not block
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        if notice.is_error() {
            tracing::warn!("{}", notice);
        } else {
            tracing::info!("{}", notice);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(Notice::Saved.to_string(), "Draft saved");
        assert_eq!(Notice::SaveFailed.message(), "Failed to save draft");
        assert_eq!(Notice::Recovered.message(), "Draft version recovered");
        assert_eq!(
            Notice::RecoverFailed.message(),
            "Failed to recover draft version"
        );
        assert!(Notice::RecoverFailed.is_error());
        assert!(!Notice::Saved.is_error());
    }
}
