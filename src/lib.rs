//! Decision rules for a school LMS: who may do what, how a period grade is
//! computed, and when an assessment is open.
//!
//! [`access`], [`grading`] and [`availability`] are pure and hold no state, so
//! they are safe to call from any thread. Callers persisting their results
//! must serialize writes per student and assessment; [`db`] does so with row
//! locks inside a transaction.

pub mod access;
pub mod availability;
pub mod config;
pub mod db;
pub mod grading;
pub mod models;
pub mod report;

pub use access::{can, can_named, AccessDenied, Capability, Role};
pub use availability::{
    activity_status, check_availability, ActivitySchedule, ActivityStatus, Allowed,
    AssessmentWindow, Denied,
};
pub use grading::{compute_period_grade, GradeStatus, PeriodGrade, PeriodScoreSet};
pub use models::Actor;
