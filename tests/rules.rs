use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use school_lms::{
    can, can_named, check_availability, compute_period_grade, AssessmentWindow, Capability,
    Denied, GradeStatus, Role,
};

fn capability() -> impl Strategy<Value = Capability> {
    proptest::sample::select(Capability::ALL.to_vec())
}

fn role() -> impl Strategy<Value = Role> {
    proptest::sample::select(Role::ALL.to_vec())
}

fn score() -> impl Strategy<Value = f64> {
    (0u32..=10_000).prop_map(|x| f64::from(x) / 100.0)
}

proptest! {
    #[test]
    fn unknown_roles_hold_nothing(name in "[a-zA-Z ]{0,12}", capability in capability()) {
        let known = matches!(
            name.trim().to_ascii_lowercase().as_str(),
            "admin" | "teacher" | "student"
        );
        prop_assume!(!known);
        prop_assert!(!can_named(&name, capability.as_str()));
    }

    #[test]
    fn named_lookup_agrees_with_typed(role in role(), capability in capability()) {
        prop_assert_eq!(can_named(role.as_str(), capability.as_str()), can(role, capability));
    }

    #[test]
    fn delete_capabilities_are_admin_only(role in role(), capability in capability()) {
        if capability.as_str().starts_with("delete-") && can(role, capability) {
            prop_assert_eq!(role, Role::Admin);
        }
    }

    #[test]
    fn grading_is_deterministic(activity in score(), quiz in score(), exam in score()) {
        let first = compute_period_grade(activity, quiz, exam);
        let second = compute_period_grade(activity, quiz, exam);
        prop_assert_eq!(first.value.to_bits(), second.value.to_bits());
        prop_assert_eq!(first.status, second.status);
    }

    #[test]
    fn grade_matches_exact_hundredths(
        activity in 0i64..=10_000,
        quiz in 0i64..=10_000,
        exam in 0i64..=10_000,
    ) {
        // scores in hundredths; the weighted sum is then in ten-thousandths
        let weighted = 40 * activity + 30 * quiz + 30 * exam;
        let expected_hundredths = (weighted + 50) / 100;
        let expected_status = if activity == 0 && quiz == 0 && exam == 0 {
            GradeStatus::Pending
        } else if expected_hundredths >= 7_500 {
            GradeStatus::Passed
        } else {
            GradeStatus::Failed
        };

        let grade = compute_period_grade(
            activity as f64 / 100.0,
            quiz as f64 / 100.0,
            exam as f64 / 100.0,
        );
        prop_assert_eq!((grade.value * 100.0).round() as i64, expected_hundredths);
        prop_assert_eq!(grade.status, expected_status);
    }

    #[test]
    fn unlimited_attempts_never_exhaust(used in any::<u32>(), offset in 0i64..=7_200) {
        let opens_at = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let window = AssessmentWindow {
            opens_at,
            closes_at: opens_at + Duration::hours(2),
            attempts_allowed: 0,
        };
        let now = opens_at + Duration::seconds(offset);
        prop_assert!(check_availability(&window, used, now).is_ok());
    }

    #[test]
    fn limited_attempts_deny_at_limit(allowed in 1u32..10, used in 0u32..20) {
        let opens_at = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let window = AssessmentWindow {
            opens_at,
            closes_at: opens_at + Duration::hours(2),
            attempts_allowed: allowed,
        };
        let result = check_availability(&window, used, opens_at);
        if used >= allowed {
            prop_assert_eq!(result, Err(Denied::AttemptsExhausted { allowed, used }));
        } else {
            prop_assert!(result.is_ok());
        }
    }
}

#[test]
fn admin_denied_student_self_service() {
    assert!(!can(Role::Admin, Capability::TakeQuizzes));
    assert!(!can(Role::Admin, Capability::ViewOwnGrades));
    assert!(can(Role::Admin, Capability::DeleteGradingPeriods));
}
