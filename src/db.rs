use anyhow::Context;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::access::AccessDenied;
use crate::availability::{self, Denied};
use crate::grading::{GradeStatus, PeriodGrade, PeriodScoreSet};
use crate::models::{Actor, Assessment, AttemptRecord, GradeRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("schema migrations applied");
    Ok(())
}

/// A grading action: components left as `None` keep their stored value, or
/// zero when nothing is stored yet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreUpdate {
    pub activity: Option<f64>,
    pub quiz: Option<f64>,
    pub exam: Option<f64>,
}

impl ScoreUpdate {
    pub fn full(scores: PeriodScoreSet) -> Self {
        Self {
            activity: Some(scores.activity),
            quiz: Some(scores.quiz),
            exam: Some(scores.exam),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (label, value) in [
            ("activity", self.activity),
            ("quiz", self.quiz),
            ("exam", self.exam),
        ] {
            if let Some(score) = value {
                anyhow::ensure!(
                    score.is_finite() && (0.0..=100.0).contains(&score),
                    "{label} score must be between 0 and 100, got {score}"
                );
            }
        }
        Ok(())
    }

    pub fn apply(&self, existing: Option<PeriodScoreSet>) -> PeriodScoreSet {
        let base = existing.unwrap_or(PeriodScoreSet {
            activity: 0.0,
            quiz: 0.0,
            exam: 0.0,
        });
        PeriodScoreSet {
            activity: self.activity.unwrap_or(base.activity),
            quiz: self.quiz.unwrap_or(base.quiz),
            exam: self.exam.unwrap_or(base.exam),
        }
    }
}

/// Identifies one period grade by its natural keys.
#[derive(Debug, Clone)]
pub struct GradeKey {
    pub student_email: String,
    pub subject_code: String,
    pub period_name: String,
}

async fn fetch_id(
    conn: &mut PgConnection,
    sql: &'static str,
    value: &str,
    what: &str,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(sql)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await?
        .with_context(|| format!("unknown {what} '{value}'"))?;
    Ok(row.try_get("id")?)
}

async fn resolve_key(conn: &mut PgConnection, key: &GradeKey) -> anyhow::Result<(Uuid, Uuid, Uuid)> {
    let student_id = fetch_id(
        conn,
        "SELECT id FROM lms.people WHERE email = $1 AND role = 'student'",
        &key.student_email,
        "student",
    )
    .await?;
    let subject_id = fetch_id(
        conn,
        "SELECT id FROM lms.subjects WHERE code = $1",
        &key.subject_code,
        "subject",
    )
    .await?;
    let period_id = fetch_id(
        conn,
        "SELECT id FROM lms.grading_periods WHERE name = $1",
        &key.period_name,
        "grading period",
    )
    .await?;
    Ok((student_id, subject_id, period_id))
}

/// Zero scores are exactly the pending grade, so the placeholder row is
/// consistent even if it is briefly visible.
const INSERT_PLACEHOLDER_SQL: &str = r#"
    INSERT INTO lms.period_scores
    (student_id, subject_id, period_id, activity_score, quiz_score, exam_score,
     grade_value, grade_status, updated_at)
    VALUES ($1, $2, $3, 0, 0, 0, 0, 'pending', NOW())
    ON CONFLICT (student_id, subject_id, period_id) DO NOTHING
    "#;

const LOCK_SCORES_SQL: &str = r#"
    SELECT activity_score, quiz_score, exam_score
    FROM lms.period_scores
    WHERE student_id = $1 AND subject_id = $2 AND period_id = $3
    FOR UPDATE
    "#;

const UPDATE_SCORES_SQL: &str = r#"
    UPDATE lms.period_scores
    SET activity_score = $4,
        quiz_score = $5,
        exam_score = $6,
        grade_value = $7,
        grade_status = $8,
        updated_at = NOW()
    WHERE student_id = $1 AND subject_id = $2 AND period_id = $3
    "#;

/// Applies `update` to one period's scores and stores the recomputed grade.
///
/// A placeholder row is inserted first when none exists, so the `FOR UPDATE`
/// always has a row to lock: concurrent grading actions on the same student,
/// subject and period serialize, including the first two for a new key.
async fn write_scores(
    conn: &mut PgConnection,
    student_id: Uuid,
    subject_id: Uuid,
    period_id: Uuid,
    update: &ScoreUpdate,
) -> anyhow::Result<PeriodGrade> {
    sqlx::query(INSERT_PLACEHOLDER_SQL)
        .bind(student_id)
        .bind(subject_id)
        .bind(period_id)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query(LOCK_SCORES_SQL)
        .bind(student_id)
        .bind(subject_id)
        .bind(period_id)
        .fetch_one(&mut *conn)
        .await?;
    let existing = PeriodScoreSet {
        activity: row.try_get("activity_score")?,
        quiz: row.try_get("quiz_score")?,
        exam: row.try_get("exam_score")?,
    };

    let scores = update.apply(Some(existing));
    let grade = scores.grade();

    sqlx::query(UPDATE_SCORES_SQL)
        .bind(student_id)
        .bind(subject_id)
        .bind(period_id)
        .bind(scores.activity)
        .bind(scores.quiz)
        .bind(scores.exam)
        .bind(grade.value)
        .bind(grade.status.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(grade)
}

pub async fn set_scores(
    pool: &PgPool,
    key: &GradeKey,
    update: &ScoreUpdate,
) -> anyhow::Result<PeriodGrade> {
    update.validate()?;

    let mut tx = pool.begin().await?;
    let (student_id, subject_id, period_id) = resolve_key(&mut tx, key).await?;
    let grade = write_scores(&mut tx, student_id, subject_id, period_id, update).await?;
    tx.commit().await?;

    info!(
        student = %key.student_email,
        subject = %key.subject_code,
        period = %key.period_name,
        value = grade.value,
        status = %grade.status,
        "period grade stored"
    );
    Ok(grade)
}

/// Imports score sets from CSV in a single transaction; a bad row aborts the
/// whole file.
pub async fn import_scores_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_email: String,
        subject_code: String,
        period_name: String,
        activity_score: f64,
        quiz_score: f64,
        exam_score: f64,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("malformed CSV row at line {line}"))?;
        let key = GradeKey {
            student_email: row.student_email,
            subject_code: row.subject_code,
            period_name: row.period_name,
        };
        let update = ScoreUpdate::full(PeriodScoreSet {
            activity: row.activity_score,
            quiz: row.quiz_score,
            exam: row.exam_score,
        });
        update
            .validate()
            .with_context(|| format!("invalid scores at line {line}"))?;

        let (student_id, subject_id, period_id) = resolve_key(&mut tx, &key)
            .await
            .with_context(|| format!("line {line}"))?;
        write_scores(&mut tx, student_id, subject_id, period_id, &update).await?;
        written += 1;
    }

    tx.commit().await?;
    info!(rows = written, path = %csv_path.display(), "score import committed");
    Ok(written)
}

/// Recomputes every stored grade from its component scores and rewrites the
/// rows whose value or status disagree. Returns the number of rows changed.
pub async fn recompute_grades(pool: &PgPool) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let rows = sqlx::query(
        r#"
        SELECT student_id, subject_id, period_id, activity_score, quiz_score, exam_score,
               grade_value, grade_status
        FROM lms.period_scores
        FOR UPDATE
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let mut changed = 0usize;
    for row in rows {
        let scores = PeriodScoreSet {
            activity: row.try_get("activity_score")?,
            quiz: row.try_get("quiz_score")?,
            exam: row.try_get("exam_score")?,
        };
        let stored = PeriodGrade {
            value: row.try_get("grade_value")?,
            status: row.try_get::<String, _>("grade_status")?.parse()?,
        };
        let fresh = scores.grade();
        if fresh == stored {
            continue;
        }

        sqlx::query(
            r#"
            UPDATE lms.period_scores
            SET grade_value = $4, grade_status = $5, updated_at = NOW()
            WHERE student_id = $1 AND subject_id = $2 AND period_id = $3
            "#,
        )
        .bind(row.try_get::<Uuid, _>("student_id")?)
        .bind(row.try_get::<Uuid, _>("subject_id")?)
        .bind(row.try_get::<Uuid, _>("period_id")?)
        .bind(fresh.value)
        .bind(fresh.status.as_str())
        .execute(&mut *tx)
        .await?;
        changed += 1;
    }

    tx.commit().await?;
    info!(changed, "grades recomputed");
    Ok(changed)
}

/// Columns a grade listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GradeSort {
    #[default]
    Student,
    Email,
    Subject,
    Period,
    Grade,
    Status,
    Updated,
}

impl GradeSort {
    fn column(&self) -> &'static str {
        match self {
            GradeSort::Student => "p.full_name",
            GradeSort::Email => "p.email",
            GradeSort::Subject => "s.code",
            GradeSort::Period => "g.position",
            GradeSort::Grade => "ps.grade_value",
            GradeSort::Status => "ps.grade_status",
            GradeSort::Updated => "ps.updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 1-based.
    pub number: u32,
    pub per_page: u32,
}

impl Page {
    pub fn offset(&self) -> i64 {
        i64::from(self.number.max(1) - 1) * i64::from(self.per_page)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradeQuery {
    pub subject_code: Option<String>,
    pub period_name: Option<String>,
    /// Restricts the listing to one student's own rows.
    pub student_id: Option<Uuid>,
    pub search: Option<String>,
    pub sort: GradeSort,
    pub descending: bool,
    pub page: Option<Page>,
}

/// Escapes LIKE wildcards so search text matches literally.
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn build_grade_query(query: &GradeQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT p.id AS student_id, p.full_name, p.email, s.code AS subject_code, \
         g.name AS period_name, ps.activity_score, ps.quiz_score, ps.exam_score, \
         ps.grade_value, ps.grade_status, ps.updated_at \
         FROM lms.period_scores ps \
         JOIN lms.people p ON p.id = ps.student_id \
         JOIN lms.subjects s ON s.id = ps.subject_id \
         JOIN lms.grading_periods g ON g.id = ps.period_id \
         WHERE TRUE",
    );

    if let Some(subject) = &query.subject_code {
        builder.push(" AND s.code = ").push_bind(subject.clone());
    }
    if let Some(period) = &query.period_name {
        builder.push(" AND g.name = ").push_bind(period.clone());
    }
    if let Some(student_id) = query.student_id {
        builder.push(" AND p.id = ").push_bind(student_id);
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search.trim());
        builder
            .push(" AND (p.full_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    builder
        .push(" ORDER BY ")
        .push(query.sort.column())
        .push(if query.descending { " DESC" } else { " ASC" })
        .push(", p.full_name ASC, g.position ASC");

    if let Some(page) = query.page {
        builder
            .push(" LIMIT ")
            .push_bind(i64::from(page.per_page))
            .push(" OFFSET ")
            .push_bind(page.offset());
    }

    builder
}

fn grade_record(row: &PgRow) -> anyhow::Result<GradeRecord> {
    Ok(GradeRecord {
        student_id: row.try_get("student_id")?,
        student_name: row.try_get("full_name")?,
        student_email: row.try_get("email")?,
        subject_code: row.try_get("subject_code")?,
        period_name: row.try_get("period_name")?,
        scores: PeriodScoreSet {
            activity: row.try_get("activity_score")?,
            quiz: row.try_get("quiz_score")?,
            exam: row.try_get("exam_score")?,
        },
        grade: PeriodGrade {
            value: row.try_get("grade_value")?,
            status: row.try_get::<String, _>("grade_status")?.parse::<GradeStatus>()?,
        },
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn list_grades(pool: &PgPool, query: &GradeQuery) -> anyhow::Result<Vec<GradeRecord>> {
    let mut builder = build_grade_query(query);
    debug!(sql = builder.sql(), "listing grades");

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(grade_record).collect()
}

fn assessment(row: &PgRow) -> anyhow::Result<Assessment> {
    let attempts_allowed: i32 = row.try_get("attempts_allowed")?;
    Ok(Assessment {
        id: row.try_get("id")?,
        subject_code: row.try_get("subject_code")?,
        kind: row.try_get::<String, _>("kind")?.parse()?,
        title: row.try_get("title")?,
        opens_at: row.try_get("opens_at")?,
        closes_at: row.try_get("closes_at")?,
        due_date: row.try_get("due_date")?,
        attempts_allowed: u32::try_from(attempts_allowed)
            .context("attempts_allowed must not be negative")?,
        deduction_percent: row.try_get("deduction_percent")?,
    })
}

const ASSESSMENT_COLUMNS: &str = "a.id, s.code AS subject_code, a.kind, a.title, a.opens_at, \
     a.closes_at, a.due_date, a.attempts_allowed, a.deduction_percent";

pub async fn fetch_assessment(pool: &PgPool, id: Uuid) -> anyhow::Result<Assessment> {
    let sql = format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM lms.assessments a \
         JOIN lms.subjects s ON s.id = a.subject_id WHERE a.id = $1"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("unknown assessment {id}"))?;
    assessment(&row)
}

pub async fn count_attempts(
    conn: &mut PgConnection,
    actor_id: Uuid,
    assessment_id: Uuid,
) -> anyhow::Result<u32> {
    let count: i64 = sqlx::query(
        "SELECT COUNT(*) AS used FROM lms.attempts WHERE actor_id = $1 AND assessment_id = $2",
    )
    .bind(actor_id)
    .bind(assessment_id)
    .fetch_one(&mut *conn)
    .await?
    .try_get("used")?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Decides whether `actor` may start an attempt on `assessment` having used
/// `used` attempts already.
///
/// A missing capability is an error; an unavailable assessment is a normal
/// outcome. Activities are not timed: they are always accepted and only
/// labelled.
pub fn admit_attempt(
    actor: &Actor,
    assessment: &Assessment,
    used: u32,
    now: DateTime<Utc>,
) -> Result<Result<(), Denied>, AccessDenied> {
    actor.require(assessment.kind.attempt_capability())?;
    if !assessment.kind.is_timed() {
        return Ok(Ok(()));
    }
    Ok(availability::check_availability(&assessment.window(), used, now).map(|_| ()))
}

/// Reports whether `actor` may start an attempt now, without recording one.
pub async fn check_attempt(
    pool: &PgPool,
    actor: &Actor,
    assessment: &Assessment,
    now: DateTime<Utc>,
) -> anyhow::Result<Result<u32, Denied>> {
    actor.require(assessment.kind.attempt_capability())?;
    let mut conn = pool.acquire().await?;
    let used = count_attempts(&mut conn, actor.id, assessment.id).await?;
    Ok(admit_attempt(actor, assessment, used, now)?.map(|_| used))
}

/// Records a new attempt when the assessment is available to `actor` at `now`.
///
/// The assessment row is locked for the duration of the check so that two
/// concurrent starts by the same student cannot both pass the attempt limit.
/// The capability is checked against that same locked row.
pub async fn start_attempt(
    pool: &PgPool,
    actor: &Actor,
    assessment_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<Result<AttemptRecord, Denied>> {
    let mut tx = pool.begin().await?;

    let sql = format!(
        "SELECT {ASSESSMENT_COLUMNS} FROM lms.assessments a \
         JOIN lms.subjects s ON s.id = a.subject_id WHERE a.id = $1 FOR UPDATE OF a"
    );
    let row = sqlx::query(&sql)
        .bind(assessment_id)
        .fetch_optional(&mut *tx)
        .await?
        .with_context(|| format!("unknown assessment {assessment_id}"))?;
    let assessment = assessment(&row)?;

    if let Err(err) = actor.require(assessment.kind.attempt_capability()) {
        tx.rollback().await?;
        return Err(err.into());
    }

    let used = count_attempts(&mut tx, actor.id, assessment.id).await?;
    if let Err(denied) = admit_attempt(actor, &assessment, used, now)? {
        tx.rollback().await?;
        info!(actor = %actor.id, assessment = %assessment.id, reason = %denied, "attempt denied");
        return Ok(Err(denied));
    }

    let record = AttemptRecord {
        id: Uuid::new_v4(),
        actor_id: actor.id,
        assessment_id: assessment.id,
        started_at: now,
        completed_at: None,
    };
    sqlx::query(
        r#"
        INSERT INTO lms.attempts (id, actor_id, assessment_id, started_at, completed_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(record.id)
    .bind(record.actor_id)
    .bind(record.assessment_id)
    .bind(record.started_at)
    .bind(record.completed_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(
        actor = %actor.id,
        assessment = %assessment.id,
        attempt = used + 1,
        "attempt started"
    );
    Ok(Ok(record))
}

fn seed_time(y: i32, m: u32, d: u32, h: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .context("invalid seed timestamp")
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let people = vec![
        (
            Uuid::parse_str("6f1c2a4e-8d3b-4c1a-9e2f-1a2b3c4d5e60")?,
            "Marisol Reyes",
            "marisol.reyes@school.example",
            "admin",
        ),
        (
            Uuid::parse_str("2b8e7d6c-5a4f-4e3d-8c2b-0a9f8e7d6c51")?,
            "Daniel Okafor",
            "daniel.okafor@school.example",
            "teacher",
        ),
        (
            Uuid::parse_str("9a7b6c5d-4e3f-4a2b-9c1d-0e9f8a7b6c52")?,
            "Lia Santos",
            "lia.santos@school.example",
            "student",
        ),
        (
            Uuid::parse_str("1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e53")?,
            "Noah Villanueva",
            "noah.villanueva@school.example",
            "student",
        ),
        (
            Uuid::parse_str("8e7f6a5b-4c3d-4e2f-8a1b-9c0d1e2f3a54")?,
            "Amara Cruz",
            "amara.cruz@school.example",
            "student",
        ),
    ];

    for (id, name, email, role) in people {
        sqlx::query(
            r#"
            INSERT INTO lms.people (id, full_name, email, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, role = EXCLUDED.role
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(role)
        .execute(pool)
        .await?;
    }

    let math = Uuid::parse_str("4d5e6f70-8192-4a3b-8c4d-5e6f70819201")?;
    let science = Uuid::parse_str("4d5e6f70-8192-4a3b-8c4d-5e6f70819202")?;
    for (id, code, title) in [
        (math, "MATH7", "Mathematics 7"),
        (science, "SCI7", "Science 7"),
    ] {
        sqlx::query(
            r#"
            INSERT INTO lms.subjects (id, code, title)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET title = EXCLUDED.title
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(title)
        .execute(pool)
        .await?;
    }

    for (index, name) in ["Prelim", "Midterm", "Finals"].into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO lms.grading_periods (id, name, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET position = EXCLUDED.position
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(index as i32 + 1)
        .execute(pool)
        .await?;
    }

    let scores = vec![
        ("lia.santos@school.example", "MATH7", "Prelim", 88.0, 92.0, 85.0),
        ("lia.santos@school.example", "SCI7", "Prelim", 79.0, 74.0, 81.0),
        ("noah.villanueva@school.example", "MATH7", "Prelim", 80.0, 70.0, 70.0),
        ("noah.villanueva@school.example", "SCI7", "Prelim", 65.0, 72.0, 60.0),
        ("amara.cruz@school.example", "MATH7", "Prelim", 0.0, 0.0, 0.0),
    ];

    let mut tx = pool.begin().await?;
    for (email, subject, period, activity, quiz, exam) in scores {
        let key = GradeKey {
            student_email: email.to_string(),
            subject_code: subject.to_string(),
            period_name: period.to_string(),
        };
        let (student_id, subject_id, period_id) = resolve_key(&mut tx, &key).await?;
        let update = ScoreUpdate::full(PeriodScoreSet {
            activity,
            quiz,
            exam,
        });
        write_scores(&mut tx, student_id, subject_id, period_id, &update).await?;
    }
    tx.commit().await?;

    let assessments = vec![
        (
            Uuid::parse_str("a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c01")?,
            math,
            "quiz",
            "Integers quiz",
            seed_time(2026, 9, 7, 8)?,
            seed_time(2026, 9, 7, 17)?,
            None,
            2,
            None,
        ),
        (
            Uuid::parse_str("a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c02")?,
            math,
            "exam",
            "Prelim examination",
            seed_time(2026, 9, 21, 8)?,
            seed_time(2026, 9, 21, 11)?,
            None,
            1,
            None,
        ),
        (
            Uuid::parse_str("a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c03")?,
            science,
            "activity",
            "Plant cell model",
            seed_time(2026, 9, 1, 0)?,
            seed_time(2026, 9, 15, 23)?,
            NaiveDate::from_ymd_opt(2026, 9, 12),
            0,
            Some(10.0),
        ),
    ];

    for (id, subject_id, kind, title, opens_at, closes_at, due_date, attempts, deduction) in
        assessments
    {
        sqlx::query(
            r#"
            INSERT INTO lms.assessments
            (id, subject_id, kind, title, opens_at, closes_at, due_date, attempts_allowed,
             deduction_percent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(subject_id)
        .bind(kind)
        .bind(title)
        .bind(opens_at)
        .bind(closes_at)
        .bind(due_date)
        .bind(attempts)
        .bind(deduction)
        .execute(pool)
        .await?;
    }

    info!("seed data inserted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Capability, Role};
    use crate::models::AssessmentKind;

    #[test]
    fn partial_update_keeps_stored_components() {
        let stored = PeriodScoreSet {
            activity: 80.0,
            quiz: 70.0,
            exam: 65.0,
        };
        let update = ScoreUpdate {
            exam: Some(90.0),
            ..ScoreUpdate::default()
        };
        assert_eq!(
            update.apply(Some(stored)),
            PeriodScoreSet {
                activity: 80.0,
                quiz: 70.0,
                exam: 90.0,
            }
        );
    }

    #[test]
    fn partial_update_without_row_starts_at_zero() {
        let update = ScoreUpdate {
            quiz: Some(50.0),
            ..ScoreUpdate::default()
        };
        assert_eq!(
            update.apply(None),
            PeriodScoreSet {
                activity: 0.0,
                quiz: 50.0,
                exam: 0.0,
            }
        );
    }

    #[test]
    fn validation_rejects_out_of_range_scores() {
        assert!(ScoreUpdate::default().validate().is_ok());
        assert!(ScoreUpdate {
            activity: Some(100.0),
            quiz: Some(0.0),
            exam: None,
        }
        .validate()
        .is_ok());

        let err = ScoreUpdate {
            quiz: Some(101.0),
            ..ScoreUpdate::default()
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("quiz score"));
        assert!(ScoreUpdate {
            exam: Some(f64::NAN),
            ..ScoreUpdate::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn partial_updates_on_new_key_keep_both_components() {
        let placeholder = PeriodScoreSet {
            activity: 0.0,
            quiz: 0.0,
            exam: 0.0,
        };
        assert_eq!(placeholder.grade().status, GradeStatus::Pending);
        assert_eq!(placeholder.grade().value, 0.0);

        let quiz = ScoreUpdate {
            quiz: Some(80.0),
            ..ScoreUpdate::default()
        };
        let exam = ScoreUpdate {
            exam: Some(90.0),
            ..ScoreUpdate::default()
        };
        // the second writer waits on the row lock and merges onto the first
        let after_quiz = quiz.apply(Some(placeholder));
        let after_exam = exam.apply(Some(after_quiz));
        assert_eq!(
            after_exam,
            PeriodScoreSet {
                activity: 0.0,
                quiz: 80.0,
                exam: 90.0,
            }
        );
    }

    #[test]
    fn score_row_exists_before_it_is_locked() {
        assert!(INSERT_PLACEHOLDER_SQL
            .contains("ON CONFLICT (student_id, subject_id, period_id) DO NOTHING"));
        assert!(INSERT_PLACEHOLDER_SQL.contains("'pending'"));
        assert!(LOCK_SCORES_SQL.trim_end().ends_with("FOR UPDATE"));
        assert!(!UPDATE_SCORES_SQL.contains("INSERT"));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("lia"), "%lia%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }

    #[test]
    fn page_offset_is_one_based() {
        assert_eq!(Page { number: 1, per_page: 25 }.offset(), 0);
        assert_eq!(Page { number: 3, per_page: 25 }.offset(), 50);
        assert_eq!(Page { number: 0, per_page: 25 }.offset(), 0);
    }

    #[test]
    fn grade_query_binds_user_text() {
        let query = GradeQuery {
            subject_code: Some("MATH7".to_string()),
            search: Some("'; DROP TABLE lms.people; --".to_string()),
            sort: GradeSort::Grade,
            descending: true,
            page: Some(Page {
                number: 2,
                per_page: 10,
            }),
            ..GradeQuery::default()
        };
        let builder = build_grade_query(&query);
        let sql = builder.sql();

        assert!(!sql.contains("DROP TABLE"));
        assert!(sql.contains("s.code = $1"));
        assert!(sql.contains("p.full_name ILIKE $2 OR p.email ILIKE $3"));
        assert!(sql.contains("ORDER BY ps.grade_value DESC"));
        assert!(sql.ends_with("LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn own_grades_filter_by_student() {
        let query = GradeQuery {
            student_id: Some(Uuid::new_v4()),
            ..GradeQuery::default()
        };
        let sql = build_grade_query(&query).sql().to_string();
        assert!(sql.contains("p.id = $1"));
        assert!(sql.contains("ORDER BY p.full_name ASC"));
        assert!(!sql.contains("LIMIT"));
    }
    fn open_assessment(kind: AssessmentKind, attempts_allowed: u32) -> Assessment {
        Assessment {
            id: Uuid::new_v4(),
            subject_code: "SCI8".to_string(),
            kind,
            title: "Cell structure".to_string(),
            opens_at: Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
            closes_at: Utc.with_ymd_and_hms(2026, 9, 5, 17, 0, 0).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 9, 4),
            attempts_allowed,
            deduction_percent: None,
        }
    }

    #[test]
    fn student_admitted_to_open_quiz() {
        let student = Actor::new(Uuid::new_v4(), Role::Student);
        let quiz = open_assessment(AssessmentKind::Quiz, 2);
        let now = Utc.with_ymd_and_hms(2026, 9, 2, 9, 0, 0).unwrap();

        assert_eq!(admit_attempt(&student, &quiz, 1, now), Ok(Ok(())));
        assert_eq!(
            admit_attempt(&student, &quiz, 2, now),
            Ok(Err(Denied::AttemptsExhausted { allowed: 2, used: 2 }))
        );
    }

    #[test]
    fn teacher_cannot_take_quiz_on_locked_row() {
        let teacher = Actor::new(Uuid::new_v4(), Role::Teacher);
        let quiz = open_assessment(AssessmentKind::Exam, 0);
        let now = Utc.with_ymd_and_hms(2026, 9, 2, 9, 0, 0).unwrap();

        let err = admit_attempt(&teacher, &quiz, 0, now).unwrap_err();
        assert_eq!(err.capability, Capability::TakeQuizzes);
        assert_eq!(err.role, Role::Teacher);
    }

    #[test]
    fn activity_accepted_after_close() {
        let student = Actor::new(Uuid::new_v4(), Role::Student);
        let activity = open_assessment(AssessmentKind::Activity, 1);
        let late = Utc.with_ymd_and_hms(2026, 9, 9, 9, 0, 0).unwrap();

        assert_eq!(admit_attempt(&student, &activity, 3, late), Ok(Ok(())));

        let admin = Actor::new(Uuid::new_v4(), Role::Admin);
        assert!(admit_attempt(&admin, &activity, 0, late).is_err());
    }
}

