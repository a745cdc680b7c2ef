use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use school_lms::access::{self, Capability, Role};
use school_lms::availability::activity_status;
use school_lms::config::Settings;
use school_lms::db::{self, GradeKey, GradeQuery, GradeSort, Page, ScoreUpdate};
use school_lms::models::{Actor, AssessmentKind};
use school_lms::report;

#[derive(Parser)]
#[command(name = "lms")]
#[command(about = "Grades, assessments and permissions for the school LMS", long_about = None)]
struct Cli {
    /// Id of the signed-in user.
    #[arg(long, global = true, env = "LMS_ACTOR")]
    actor: Option<Uuid>,
    /// Role of the signed-in user (admin, teacher or student).
    #[arg(long, global = true, env = "LMS_ROLE")]
    role: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn actor(&self) -> anyhow::Result<Actor> {
        let id = self.actor.context("--actor (or LMS_ACTOR) is required")?;
        let role: Role = self
            .role
            .as_deref()
            .context("--role (or LMS_ROLE) is required")?
            .parse()?;
        Ok(Actor::new(id, role))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Print the role capability table
    Policy {
        /// Print only this role
        #[arg(long)]
        only: Option<Role>,
    },
    /// Record, import and list period grades
    #[command(subcommand)]
    Grade(GradeCommand),
    /// Check or start an attempt on an assessment
    #[command(subcommand)]
    Attempt(AttemptCommand),
    /// Show activity status labels
    #[command(subcommand)]
    Activity(ActivityCommand),
    /// Generate a markdown grade report for one subject and period
    Report {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        period: String,
        #[arg(long, default_value = "grades.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum GradeCommand {
    /// Set component scores and store the recomputed grade
    Set {
        #[arg(long)]
        student: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        period: String,
        #[arg(long)]
        activity: Option<f64>,
        #[arg(long)]
        quiz: Option<f64>,
        #[arg(long)]
        exam: Option<f64>,
    },
    /// Import score sets from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List stored grades
    List {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = GradeSort::Student)]
        sort: GradeSort,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
        #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u32).range(1..))]
        per_page: u32,
        #[arg(long)]
        json: bool,
    },
    /// Recompute every stored grade from its scores
    Recompute,
}

#[derive(Subcommand)]
enum AttemptCommand {
    /// Report whether an attempt may start now
    Check {
        #[arg(long)]
        assessment: Uuid,
    },
    /// Start an attempt if the assessment is available
    Start {
        #[arg(long)]
        assessment: Uuid,
    },
}

#[derive(Subcommand)]
enum ActivityCommand {
    /// Label an activity as not-started, active, due-today or overdue
    Status {
        #[arg(long)]
        assessment: Uuid,
    },
}

fn print_policy(role: Option<Role>) {
    let roles: Vec<Role> = match role {
        Some(role) => vec![role],
        None => Role::ALL.to_vec(),
    };

    for role in roles {
        println!("{role}:");
        for capability in access::capabilities_of(role) {
            println!("  - {capability}");
        }
    }
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Policy { only } = &cli.command {
        print_policy(*only);
        return Ok(());
    }

    let settings = Settings::from_env()?;
    let pool = connect(&settings).await?;

    match &cli.command {
        // printed above without a database
        Commands::Policy { .. } => {}
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Grade(command) => run_grade(&pool, cli.actor()?, command).await?,
        Commands::Attempt(command) => run_attempt(&pool, cli.actor()?, command).await?,
        Commands::Activity(ActivityCommand::Status { assessment }) => {
            let actor = cli.actor()?;
            if !actor.can(Capability::ManageActivities) {
                actor.require(Capability::ViewOwnActivities)?;
            }
            let assessment = db::fetch_assessment(&pool, *assessment).await?;
            let now = Utc::now();
            let schedule = assessment.schedule();
            let status = activity_status(&schedule, now);
            if schedule.is_past_cutoff(now) {
                println!("{}: {} (past cutoff)", assessment.title, status);
            } else {
                println!("{}: {}", assessment.title, status);
            }
        }
        Commands::Report {
            subject,
            period,
            out,
        } => {
            cli.actor()?.require(Capability::ManageGrades)?;
            let records = db::list_grades(
                &pool,
                &GradeQuery {
                    subject_code: Some(subject.clone()),
                    period_name: Some(period.clone()),
                    ..GradeQuery::default()
                },
            )
            .await?;
            let report = report::build_report(subject, period, Utc::now().date_naive(), &records);
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn run_grade(pool: &PgPool, actor: Actor, command: &GradeCommand) -> anyhow::Result<()> {
    match command {
        GradeCommand::Set {
            student,
            subject,
            period,
            activity,
            quiz,
            exam,
        } => {
            actor.require(Capability::ManageGrades)?;
            let key = GradeKey {
                student_email: student.clone(),
                subject_code: subject.clone(),
                period_name: period.clone(),
            };
            let update = ScoreUpdate {
                activity: *activity,
                quiz: *quiz,
                exam: *exam,
            };
            let grade = db::set_scores(pool, &key, &update).await?;
            println!(
                "{} {} {}: {:.2} ({})",
                student, subject, period, grade.value, grade.status
            );
        }
        GradeCommand::Import { csv } => {
            actor.require(Capability::ManageGrades)?;
            let written = db::import_scores_csv(pool, csv).await?;
            println!("Stored {written} score sets from {}.", csv.display());
        }
        GradeCommand::List {
            subject,
            period,
            search,
            sort,
            desc,
            page,
            per_page,
            json,
        } => {
            let student_id = if actor.can(Capability::ManageGrades) {
                None
            } else {
                actor.require(Capability::ViewOwnGrades)?;
                Some(actor.id)
            };
            let query = GradeQuery {
                subject_code: subject.clone(),
                period_name: period.clone(),
                student_id,
                search: search.clone(),
                sort: *sort,
                descending: *desc,
                page: Some(Page {
                    number: *page,
                    per_page: *per_page,
                }),
            };
            let records = db::list_grades(pool, &query).await?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No grades match.");
            } else {
                for record in records.iter() {
                    println!(
                        "- {} ({}) {} {}: {:.2} {}",
                        record.student_name,
                        record.student_email,
                        record.subject_code,
                        record.period_name,
                        record.grade.value,
                        record.grade.status
                    );
                }
            }
        }
        GradeCommand::Recompute => {
            actor.require(Capability::ManageGrades)?;
            let changed = db::recompute_grades(pool).await?;
            println!("Recomputed grades, {changed} rows changed.");
        }
    }
    Ok(())
}

async fn run_attempt(pool: &PgPool, actor: Actor, command: &AttemptCommand) -> anyhow::Result<()> {
    match command {
        AttemptCommand::Check { assessment } => {
            let assessment = db::fetch_assessment(pool, *assessment).await?;
            match db::check_attempt(pool, &actor, &assessment, Utc::now()).await? {
                Ok(used) if assessment.kind == AssessmentKind::Activity => {
                    let status = activity_status(&assessment.schedule(), Utc::now());
                    println!(
                        "{}: submissions accepted ({status}, {used} so far)",
                        assessment.title
                    );
                }
                Ok(used) => println!("{}: allowed ({used} attempts used)", assessment.title),
                Err(denied) => println!("{}: denied, {denied}", assessment.title),
            }
        }
        AttemptCommand::Start { assessment } => {
            match db::start_attempt(pool, &actor, *assessment, Utc::now()).await? {
                Ok(record) => println!("Attempt {} started at {}.", record.id, record.started_at),
                Err(denied) => anyhow::bail!("attempt refused: {denied}"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn grade_list_rejects_empty_pages() {
        assert!(Cli::try_parse_from(["lms", "grade", "list", "--per-page", "0"]).is_err());
        assert!(Cli::try_parse_from(["lms", "grade", "list", "--page", "0"]).is_err());

        let cli = Cli::try_parse_from(["lms", "grade", "list", "--per-page", "10"]).unwrap();
        match cli.command {
            Commands::Grade(GradeCommand::List { page, per_page, .. }) => {
                assert_eq!(page, 1);
                assert_eq!(per_page, 10);
            }
            _ => panic!("expected grade list"),
        }
    }
}
