pub mod auth;
pub mod capture;
pub mod controller;
pub mod countdown;
pub mod gateway;
pub mod narration;
pub mod summary;
pub mod transcription;

#[cfg(test)]
mod testing;

pub use interview_types as types;

use crate::summary::InterviewSummary;
use interview_types::{Analysis, Question};

/// Effects the controller asks the presentation layer to perform.
///
/// The controller never renders anything itself; every user-visible outcome
/// (toasts, the current question, feedback, the final summary) is sent through
/// this enum so any frontend (terminal, desktop, web) can present it.
#[derive(Debug, Clone)]
pub enum Command {
    /// Show a transient notification.
    Notify(Notification),
    /// No bearer credential is available; send the user to sign in.
    RedirectToLogin,
    /// A new question became current. `index` is its zero-based turn number.
    QuestionReady { index: usize, question: Question },
    /// Feedback for the answer to turn `index` arrived.
    AnalysisReady { index: usize, analysis: Analysis },
    /// Countdown and elapsed-time update, emitted once per tick.
    Progress { percent: f64, elapsed_secs: u64 },
    /// The interview reached a terminal state.
    Finished(InterviewSummary),
}

/// User actions fed to the controller's runtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Start,
    Answer,
    Next,
    Retry,
    Pause,
    Resume,
    ToggleMute,
    ToggleVideo,
    Complete,
    Cancel,
    /// The page/terminal is going away; cancel any live session and release devices.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A short title plus a descriptive message, shown as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Error,
        }
    }
}
