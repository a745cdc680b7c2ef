//! Open/close windows for timed assessments and status labels for activities.
//!
//! Nothing here reads a clock or a database: `now` and the attempt count are
//! passed in by the caller.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentWindow {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    /// Zero means unlimited.
    pub attempts_allowed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allowed;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denied {
    #[error("not yet open, opens at {opens_at}")]
    NotYetOpen { opens_at: DateTime<Utc> },
    #[error("closed")]
    Closed { closes_at: DateTime<Utc> },
    #[error("attempts exhausted")]
    AttemptsExhausted { allowed: u32, used: u32 },
}

/// Decides whether another attempt may start at `now`. Both window bounds
/// are inclusive; the first failing check is reported.
pub fn check_availability(
    window: &AssessmentWindow,
    attempts_used: u32,
    now: DateTime<Utc>,
) -> Result<Allowed, Denied> {
    if now < window.opens_at {
        return Err(Denied::NotYetOpen {
            opens_at: window.opens_at,
        });
    }
    if now > window.closes_at {
        return Err(Denied::Closed {
            closes_at: window.closes_at,
        });
    }
    if window.attempts_allowed > 0 && attempts_used >= window.attempts_allowed {
        return Err(Denied::AttemptsExhausted {
            allowed: window.attempts_allowed,
            used: attempts_used,
        });
    }
    Ok(Allowed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivitySchedule {
    pub allow_from: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub cutoff_date: Option<DateTime<Utc>>,
}

impl ActivitySchedule {
    /// Informational only: late submissions are labelled, not refused.
    pub fn is_past_cutoff(&self, now: DateTime<Utc>) -> bool {
        self.cutoff_date.is_some_and(|cutoff| now > cutoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityStatus {
    NotStarted,
    Overdue,
    DueToday,
    Active,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::NotStarted => "not-started",
            ActivityStatus::Overdue => "overdue",
            ActivityStatus::DueToday => "due-today",
            ActivityStatus::Active => "active",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display label for an ungraded activity. The due date is compared by UTC
/// calendar day.
pub fn activity_status(schedule: &ActivitySchedule, now: DateTime<Utc>) -> ActivityStatus {
    if schedule.allow_from.is_some_and(|allow_from| now < allow_from) {
        return ActivityStatus::NotStarted;
    }

    let today = now.date_naive();
    match schedule.due_date {
        Some(due) if today > due => ActivityStatus::Overdue,
        Some(due) if today == due => ActivityStatus::DueToday,
        _ => ActivityStatus::Active,
    }
}
