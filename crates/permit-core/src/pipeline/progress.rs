//! Answer progress: `not_started -> in_progress -> completed`.
//!
//! Progress is a cursor. Answering a field moves the cursor to the step
//! after that field, whatever was answered before it. Once a filled
//! document has been exported the session stays completed.

use serde::Serialize;

use crate::types::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current_step: u32,
    pub status: SessionStatus,
}

/// Progress after answering the field at `answered_step`.
pub fn advance(answered_step: u32, total_steps: u32, exported: bool) -> Progress {
    let current_step = answered_step.saturating_add(1);
    let status = if exported || current_step > total_steps {
        SessionStatus::Completed
    } else {
        SessionStatus::InProgress
    };
    Progress {
        current_step,
        status,
    }
}
