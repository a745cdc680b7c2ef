use std::fmt::Write;

use chrono::NaiveDate;

use crate::grading::{round_2_decimals, GradeStatus};
use crate::models::GradeRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSummary {
    pub status: GradeStatus,
    pub count: usize,
}

pub fn summarize_by_status(records: &[GradeRecord]) -> Vec<StatusSummary> {
    [GradeStatus::Passed, GradeStatus::Failed, GradeStatus::Pending]
        .into_iter()
        .map(|status| StatusSummary {
            status,
            count: records.iter().filter(|r| r.grade.status == status).count(),
        })
        .collect()
}

/// Mean of graded rows; pending rows carry no grade yet and are skipped.
pub fn average_grade(records: &[GradeRecord]) -> Option<f64> {
    let graded: Vec<f64> = records
        .iter()
        .filter(|r| r.grade.status != GradeStatus::Pending)
        .map(|r| r.grade.value)
        .collect();

    if graded.is_empty() {
        None
    } else {
        Some(round_2_decimals(graded.iter().sum::<f64>() / graded.len() as f64))
    }
}

pub fn lowest_grades(records: &[GradeRecord], limit: usize) -> Vec<&GradeRecord> {
    let mut graded: Vec<&GradeRecord> = records
        .iter()
        .filter(|r| r.grade.status != GradeStatus::Pending)
        .collect();
    graded.sort_by(|a, b| {
        a.grade
            .value
            .partial_cmp(&b.grade.value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    graded.truncate(limit);
    graded
}

pub fn build_report(
    subject: &str,
    period: &str,
    generated_on: NaiveDate,
    records: &[GradeRecord],
) -> String {
    let summaries = summarize_by_status(records);
    let mut output = String::new();

    let _ = writeln!(output, "# Period Grade Report");
    let _ = writeln!(
        output,
        "{} / {} (generated {})",
        subject, period, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if records.is_empty() {
        let _ = writeln!(output, "No grades recorded for this period.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(output, "- {}: {}", summary.status, summary.count);
        }
        match average_grade(records) {
            Some(average) => {
                let _ = writeln!(output, "- class average: {:.2}", average);
            }
            None => {
                let _ = writeln!(output, "- class average: n/a");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Lowest Grades");

    let lowest = lowest_grades(records, 10);
    if lowest.is_empty() {
        let _ = writeln!(output, "No graded students in this period.");
    } else {
        for record in lowest {
            let _ = writeln!(
                output,
                "- {} ({}) {:.2} {} [activity {:.2}, quiz {:.2}, exam {:.2}]",
                record.student_name,
                record.student_email,
                record.grade.value,
                record.grade.status,
                record.scores.activity,
                record.scores.quiz,
                record.scores.exam
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Pending");

    let pending: Vec<&GradeRecord> = records
        .iter()
        .filter(|r| r.grade.status == GradeStatus::Pending)
        .collect();
    if pending.is_empty() {
        let _ = writeln!(output, "Every student has at least one score.");
    } else {
        for record in pending {
            let _ = writeln!(output, "- {} ({})", record.student_name, record.student_email);
        }
    }

    output
}
