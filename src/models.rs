use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{self, AccessDenied, Capability, Role};
use crate::availability::{ActivitySchedule, AssessmentWindow};
use crate::grading::{PeriodGrade, PeriodScoreSet};

/// The already-authenticated user behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn can(&self, capability: Capability) -> bool {
        access::can(self.role, capability)
    }

    pub fn require(&self, capability: Capability) -> Result<(), AccessDenied> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AccessDenied {
                role: self.role,
                capability,
            })
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_teacher(&self) -> bool {
        self.role.is_teacher()
    }

    pub fn is_student(&self) -> bool {
        self.role.is_student()
    }

    pub fn is_admin_or_teacher(&self) -> bool {
        self.role.is_admin_or_teacher()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Exam,
    Quiz,
    Activity,
}

impl AssessmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentKind::Exam => "exam",
            AssessmentKind::Quiz => "quiz",
            AssessmentKind::Activity => "activity",
        }
    }

    /// What a student needs to start an attempt. Exams are taken through the
    /// quiz flow.
    pub fn attempt_capability(&self) -> Capability {
        match self {
            AssessmentKind::Exam | AssessmentKind::Quiz => Capability::TakeQuizzes,
            AssessmentKind::Activity => Capability::SubmitActivities,
        }
    }

    pub fn is_timed(&self) -> bool {
        !matches!(self, AssessmentKind::Activity)
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exam" => Ok(AssessmentKind::Exam),
            "quiz" => Ok(AssessmentKind::Quiz),
            "activity" => Ok(AssessmentKind::Activity),
            other => anyhow::bail!("unknown assessment kind '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub id: Uuid,
    pub subject_code: String,
    pub kind: AssessmentKind,
    pub title: String,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub attempts_allowed: u32,
    /// Stored with the activity but never applied to a grade.
    pub deduction_percent: Option<f64>,
}

impl Assessment {
    pub fn window(&self) -> AssessmentWindow {
        AssessmentWindow {
            opens_at: self.opens_at,
            closes_at: self.closes_at,
            attempts_allowed: self.attempts_allowed,
        }
    }

    pub fn schedule(&self) -> ActivitySchedule {
        ActivitySchedule {
            allow_from: Some(self.opens_at),
            due_date: self.due_date,
            cutoff_date: Some(self.closes_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub assessment_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One stored period grade joined with the names it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct GradeRecord {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_email: String,
    pub subject_code: String,
    pub period_name: String,
    pub scores: PeriodScoreSet,
    pub grade: PeriodGrade,
    pub updated_at: DateTime<Utc>,
}
