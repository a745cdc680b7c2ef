//! Role to capability table.
//!
//! Every authorization gate in the LMS reduces to a lookup in [`can`]. The
//! table is closed: any pair not listed below is denied.
//!
//! | Resource | admin | teacher | student |
//! |---|---|---|---|
//! | Users: manage/add/edit/delete | ✓ | ✗ | ✗ |
//! | Students: manage/add/edit | ✓ | ✓ | ✗ |
//! | Students: delete | ✓ | ✗ | ✗ |
//! | Activities, Quizzes, Lessons, Interventions, Announcements, GradingPeriods: manage/add/edit | ✓ | ✓ | ✗ |
//! | (same resources): delete | ✓ | ✗ | ✗ |
//! | Activities: view-own/submit | ✗ | ✗ | ✓ |
//! | Quizzes: view-own/take | ✗ | ✗ | ✓ |
//! | Lessons: view | ✓ | ✓ | ✓ |
//! | Grades: manage | ✓ | ✓ | ✗ |
//! | Grades: view-own | ✗ | ✗ | ✓ |
//! | Semesters, Settings: manage/add/edit/delete | ✓ | ✗ | ✗ |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }

    pub fn is_teacher(&self) -> bool {
        *self == Role::Teacher
    }

    pub fn is_student(&self) -> bool {
        *self == Role::Student
    }

    pub fn is_admin_or_teacher(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

macro_rules! capabilities {
    ($($variant:ident => $name:literal,)+) => {
        /// A named permission, one per resource-action pair.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum Capability {
            $($variant,)+
        }

        impl Capability {
            pub const ALL: &'static [Capability] = &[$(Capability::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Capability::$variant => $name,)+
                }
            }
        }

        impl FromStr for Capability {
            type Err = ParseCapabilityError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($name => Ok(Capability::$variant),)+
                    _ => Err(ParseCapabilityError(s.to_string())),
                }
            }
        }
    };
}

capabilities! {
    ManageUsers => "manage-users",
    AddUsers => "add-users",
    EditUsers => "edit-users",
    DeleteUsers => "delete-users",

    ManageStudents => "manage-students",
    AddStudents => "add-students",
    EditStudents => "edit-students",
    DeleteStudents => "delete-students",

    ManageActivities => "manage-activities",
    AddActivities => "add-activities",
    EditActivities => "edit-activities",
    DeleteActivities => "delete-activities",
    ViewOwnActivities => "view-own-activities",
    SubmitActivities => "submit-activities",

    ManageQuizzes => "manage-quizzes",
    AddQuizzes => "add-quizzes",
    EditQuizzes => "edit-quizzes",
    DeleteQuizzes => "delete-quizzes",
    ViewOwnQuizzes => "view-own-quizzes",
    TakeQuizzes => "take-quizzes",

    ManageLessons => "manage-lessons",
    AddLessons => "add-lessons",
    EditLessons => "edit-lessons",
    DeleteLessons => "delete-lessons",
    ViewLessons => "view-lessons",

    ManageInterventions => "manage-interventions",
    AddInterventions => "add-interventions",
    EditInterventions => "edit-interventions",
    DeleteInterventions => "delete-interventions",

    ManageAnnouncements => "manage-announcements",
    AddAnnouncements => "add-announcements",
    EditAnnouncements => "edit-announcements",
    DeleteAnnouncements => "delete-announcements",

    ManageGradingPeriods => "manage-grading-periods",
    AddGradingPeriods => "add-grading-periods",
    EditGradingPeriods => "edit-grading-periods",
    DeleteGradingPeriods => "delete-grading-periods",

    ManageGrades => "manage-grades",
    ViewOwnGrades => "view-own-grades",

    ManageSemesters => "manage-semesters",
    AddSemesters => "add-semesters",
    EditSemesters => "edit-semesters",
    DeleteSemesters => "delete-semesters",

    ManageSettings => "manage-settings",
    AddSettings => "add-settings",
    EditSettings => "edit-settings",
    DeleteSettings => "delete-settings",
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown capability '{0}'")]
pub struct ParseCapabilityError(pub String);

/// Returns whether `role` holds `capability`.
pub fn can(role: Role, capability: Capability) -> bool {
    use Capability::*;

    match role {
        Role::Admin => matches!(
            capability,
            ManageUsers
                | AddUsers
                | EditUsers
                | DeleteUsers
                | ManageStudents
                | AddStudents
                | EditStudents
                | DeleteStudents
                | ManageActivities
                | AddActivities
                | EditActivities
                | DeleteActivities
                | ManageQuizzes
                | AddQuizzes
                | EditQuizzes
                | DeleteQuizzes
                | ManageLessons
                | AddLessons
                | EditLessons
                | DeleteLessons
                | ViewLessons
                | ManageInterventions
                | AddInterventions
                | EditInterventions
                | DeleteInterventions
                | ManageAnnouncements
                | AddAnnouncements
                | EditAnnouncements
                | DeleteAnnouncements
                | ManageGradingPeriods
                | AddGradingPeriods
                | EditGradingPeriods
                | DeleteGradingPeriods
                | ManageGrades
                | ManageSemesters
                | AddSemesters
                | EditSemesters
                | DeleteSemesters
                | ManageSettings
                | AddSettings
                | EditSettings
                | DeleteSettings
        ),
        Role::Teacher => matches!(
            capability,
            ManageStudents
                | AddStudents
                | EditStudents
                | ManageActivities
                | AddActivities
                | EditActivities
                | ManageQuizzes
                | AddQuizzes
                | EditQuizzes
                | ManageLessons
                | AddLessons
                | EditLessons
                | ViewLessons
                | ManageInterventions
                | AddInterventions
                | EditInterventions
                | ManageAnnouncements
                | AddAnnouncements
                | EditAnnouncements
                | ManageGradingPeriods
                | AddGradingPeriods
                | EditGradingPeriods
                | ManageGrades
        ),
        Role::Student => matches!(
            capability,
            ViewOwnActivities
                | SubmitActivities
                | ViewOwnQuizzes
                | TakeQuizzes
                | ViewLessons
                | ViewOwnGrades
        ),
    }
}

/// Text-keyed variant of [`can`] for values read from a session or request.
/// Unknown roles and misspelled capabilities are denied.
pub fn can_named(role: &str, capability: &str) -> bool {
    match (role.parse::<Role>(), capability.parse::<Capability>()) {
        (Ok(role), Ok(capability)) => can(role, capability),
        _ => false,
    }
}

/// Capabilities held by `role`, in table order.
pub fn capabilities_of(role: Role) -> Vec<Capability> {
    Capability::ALL
        .iter()
        .copied()
        .filter(|capability| can(role, *capability))
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("role '{role}' lacks capability '{capability}'")]
pub struct AccessDenied {
    pub role: Role,
    pub capability: Capability,
}

#[cfg(test)]
mod tests {
    use super::*;
    use Capability::*;

    const DELETES: [Capability; 10] = [
        DeleteUsers,
        DeleteStudents,
        DeleteActivities,
        DeleteQuizzes,
        DeleteLessons,
        DeleteInterventions,
        DeleteAnnouncements,
        DeleteGradingPeriods,
        DeleteSemesters,
        DeleteSettings,
    ];

    #[test]
    fn only_admin_deletes() {
        for capability in DELETES {
            assert!(can(Role::Admin, capability), "{capability}");
            assert!(!can(Role::Teacher, capability), "{capability}");
            assert!(!can(Role::Student, capability), "{capability}");
        }
    }

    #[test]
    fn users_semesters_and_settings_are_admin_only() {
        for capability in [
            ManageUsers,
            AddUsers,
            EditUsers,
            ManageSemesters,
            AddSemesters,
            EditSemesters,
            ManageSettings,
            AddSettings,
            EditSettings,
        ] {
            assert!(can(Role::Admin, capability));
            assert!(!can(Role::Teacher, capability));
            assert!(!can(Role::Student, capability));
        }
    }

    #[test]
    fn teachers_manage_course_content_but_students_do_not() {
        for capability in [
            ManageStudents,
            AddStudents,
            EditStudents,
            ManageActivities,
            AddQuizzes,
            EditLessons,
            ManageInterventions,
            AddAnnouncements,
            EditGradingPeriods,
            ManageGrades,
        ] {
            assert!(can(Role::Admin, capability));
            assert!(can(Role::Teacher, capability));
            assert!(!can(Role::Student, capability));
        }
    }

    #[test]
    fn student_self_service_is_student_only() {
        for capability in [
            ViewOwnActivities,
            SubmitActivities,
            ViewOwnQuizzes,
            TakeQuizzes,
            ViewOwnGrades,
        ] {
            assert!(!can(Role::Admin, capability));
            assert!(!can(Role::Teacher, capability));
            assert!(can(Role::Student, capability));
        }
    }

    #[test]
    fn everyone_views_lessons() {
        for role in Role::ALL {
            assert!(can(role, ViewLessons));
        }
    }

    #[test]
    fn named_lookup_denies_unknown_input() {
        assert!(can_named("admin", "delete-users"));
        assert!(can_named(" Teacher ", "manage-grades"));
        assert!(!can_named("principal", "view-lessons"));
        assert!(!can_named("", "view-lessons"));
        assert!(!can_named("admin", "delete-user"));
        assert!(!can_named("student", "ManageGrades"));
    }

    #[test]
    fn capability_names_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(capability.as_str().parse::<Capability>(), Ok(*capability));
        }
    }

    #[test]
    fn derived_predicates() {
        assert!(Role::Admin.is_admin());
        assert!(Role::Admin.is_admin_or_teacher());
        assert!(Role::Teacher.is_teacher());
        assert!(Role::Teacher.is_admin_or_teacher());
        assert!(Role::Student.is_student());
        assert!(!Role::Student.is_admin_or_teacher());
    }

    #[test]
    fn capabilities_of_student() {
        assert_eq!(
            capabilities_of(Role::Student),
            vec![
                ViewOwnActivities,
                SubmitActivities,
                ViewOwnQuizzes,
                TakeQuizzes,
                ViewLessons,
                ViewOwnGrades,
            ]
        );
    }

    #[test]
    fn capabilities_of_admin() {
        assert_eq!(
            capabilities_of(Role::Admin),
            vec![
                ManageUsers,
                AddUsers,
                EditUsers,
                DeleteUsers,
                ManageStudents,
                AddStudents,
                EditStudents,
                DeleteStudents,
                ManageActivities,
                AddActivities,
                EditActivities,
                DeleteActivities,
                ManageQuizzes,
                AddQuizzes,
                EditQuizzes,
                DeleteQuizzes,
                ManageLessons,
                AddLessons,
                EditLessons,
                DeleteLessons,
                ViewLessons,
                ManageInterventions,
                AddInterventions,
                EditInterventions,
                DeleteInterventions,
                ManageAnnouncements,
                AddAnnouncements,
                EditAnnouncements,
                DeleteAnnouncements,
                ManageGradingPeriods,
                AddGradingPeriods,
                EditGradingPeriods,
                DeleteGradingPeriods,
                ManageGrades,
                ManageSemesters,
                AddSemesters,
                EditSemesters,
                DeleteSemesters,
                ManageSettings,
                AddSettings,
                EditSettings,
                DeleteSettings,
            ]
        );
    }

    #[test]
    fn capabilities_serialize_by_name() {
        for capability in Capability::ALL {
            let json = serde_json::to_string(capability).unwrap();
            assert_eq!(json, format!("\"{}\"", capability.as_str()));
            assert_eq!(serde_json::from_str::<Capability>(&json).unwrap(), *capability);
        }
        assert_eq!(
            serde_json::to_string(&ManageGradingPeriods).unwrap(),
            "\"manage-grading-periods\""
        );
    }
}
