//! Result visibility gate.

use crate::db::{ResultDisplay, VotingSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultVisibility {
    Visible,
    /// Tallies withheld; only session metadata may be returned
    Hidden,
}

impl ResultVisibility {
    /// Hidden exactly when results wait for the close and the session is
    /// still open. Reopening a closed after-closes session hides them again.
    pub fn evaluate(display: ResultDisplay, is_active: bool) -> Self {
        match (display, is_active) {
            (ResultDisplay::AfterCloses, true) => Self::Hidden,
            _ => Self::Visible,
        }
    }

    pub fn for_session(session: &VotingSession) -> Self {
        Self::evaluate(session.result_display_enum(), session.is_active)
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible)
    }
}
