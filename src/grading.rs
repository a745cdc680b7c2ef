use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ACTIVITY_WEIGHT: Decimal = Decimal::from_parts(40, 0, 0, false, 2);
pub const QUIZ_WEIGHT: Decimal = Decimal::from_parts(30, 0, 0, false, 2);
pub const EXAM_WEIGHT: Decimal = Decimal::from_parts(30, 0, 0, false, 2);
pub const PASSING_GRADE: Decimal = Decimal::from_parts(75, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeStatus {
    Pending,
    Passed,
    Failed,
}

impl GradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeStatus::Pending => "pending",
            GradeStatus::Passed => "passed",
            GradeStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown grade status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for GradeStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GradeStatus::Pending),
            "passed" => Ok(GradeStatus::Passed),
            "failed" => Ok(GradeStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Component scores for one student, subject and grading period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodScoreSet {
    pub activity: f64,
    pub quiz: f64,
    pub exam: f64,
}

impl PeriodScoreSet {
    pub fn grade(&self) -> PeriodGrade {
        compute_period_grade(self.activity, self.quiz, self.exam)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodGrade {
    pub value: f64,
    pub status: GradeStatus,
}

/// Weighted period grade: 40% activities, 30% quizzes, 30% exam.
///
/// Inputs are expected in `[0, 100]` but are not clamped; range checks belong
/// to whoever collects the scores. A set of three zeros means nothing has been
/// graded yet and is reported as pending rather than failed.
///
/// Weighting and rounding happen in decimal, so a score such as 74.995 is a
/// real midpoint and rounds up to 75.00.
pub fn compute_period_grade(activity: f64, quiz: f64, exam: f64) -> PeriodGrade {
    let (value, passed) = match decimal_grade(activity, quiz, exam) {
        Some(value) => (to_f64(value), value >= PASSING_GRADE),
        // non-finite or beyond decimal range
        None => {
            let value = ((0.40 * activity + 0.30 * quiz + 0.30 * exam) * 100.0).round() / 100.0;
            (value, value >= 75.0)
        }
    };

    let status = if activity == 0.0 && quiz == 0.0 && exam == 0.0 {
        GradeStatus::Pending
    } else if passed {
        GradeStatus::Passed
    } else {
        GradeStatus::Failed
    };

    PeriodGrade { value, status }
}

fn decimal_grade(activity: f64, quiz: f64, exam: f64) -> Option<Decimal> {
    let weighted = to_decimal(activity)?
        .checked_mul(ACTIVITY_WEIGHT)?
        .checked_add(to_decimal(quiz)?.checked_mul(QUIZ_WEIGHT)?)?
        .checked_add(to_decimal(exam)?.checked_mul(EXAM_WEIGHT)?)?;
    Some(weighted.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Reads a score as the decimal it was written as (`37.51`, not the nearest
/// binary fraction).
fn to_decimal(x: f64) -> Option<Decimal> {
    if !x.is_finite() {
        return None;
    }
    Decimal::from_str(&x.to_string()).ok()
}

/// Nearest double to `d`.
fn to_f64(d: Decimal) -> f64 {
    d.to_string().parse().unwrap_or(f64::NAN)
}

/// Half-away-from-zero rounding to two decimals.
pub fn round_2_decimals(x: f64) -> f64 {
    match to_decimal(x) {
        Some(d) => to_f64(d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)),
        None => (x * 100.0).round() / 100.0,
    }
}
