//! Immutable job snapshots

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-unit errors kept on a job; later failures are only counted.
pub const MAX_RECORDED_ERRORS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Cancelling,
    Cancelled,
    Completed,
    Error,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Error)
    }
}

/// The state of one job at one instant. Never mutated once published;
/// every update produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub kind: JobKind,
    pub state: JobState,
    pub progress: u8,
    pub processed_count: u64,
    /// `None` until the units of work have been enumerated.
    pub total_units: Option<u64>,
    /// Messages encountered across all units.
    pub items_seen: u64,
    pub errors: Vec<String>,
    pub suppressed_errors: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    pub(crate) fn new(job_id: String, kind: JobKind) -> Self {
        Self {
            job_id,
            kind,
            state: JobState::Running,
            progress: 0,
            processed_count: 0,
            total_units: None,
            items_seen: 0,
            errors: Vec::new(),
            suppressed_errors: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub(crate) fn record_error(&mut self, message: String) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(message);
        } else {
            self.suppressed_errors += 1;
        }
    }

    /// Recompute progress from the counters. Only [`JobState::Completed`]
    /// reports 100; running jobs never go backwards.
    pub(crate) fn refresh_progress(&mut self) {
        let computed = match self.total_units {
            Some(0) | None => 0,
            Some(total) => percent(self.processed_count, total),
        };
        let capped = if self.state == JobState::Completed {
            100
        } else {
            computed.min(99)
        };
        self.progress = self.progress.max(capped);
    }

    pub(crate) fn finish(&mut self, state: JobState) {
        self.state = state;
        if state == JobState::Completed {
            self.progress = 100;
        }
        self.ended_at = Some(Utc::now());
    }
}

/// `round(done / total * 100)`, clamped to 0..=100.
fn percent(done: u64, total: u64) -> u8 {
    let done = done.min(total);
    let rounded = (done * 100 + total / 2) / total;
    u8::try_from(rounded).unwrap_or(100)
}
