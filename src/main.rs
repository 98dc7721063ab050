use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod db;
mod eligibility;
mod error;
mod grades;
mod models;
mod notify;
mod recovery;
mod report;

use error::DomainError;
use models::{Course, Role, Student};
use notify::LogNotifier;

#[derive(Parser)]
#[command(name = "academic-recovery")]
#[command(about = "Academic standing and course recovery plan tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import students from a CSV file
    ImportStudents {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import courses from a CSV file
    ImportCourses {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Register a single student
    AddStudent {
        #[arg(long)]
        id: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        major: String,
        #[arg(long)]
        year: String,
    },
    /// Register a single course
    AddCourse {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        credits: i32,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        instructor: String,
        #[arg(long, default_value_t = 60)]
        exam_weight: i32,
        #[arg(long, default_value_t = 40)]
        assignment_weight: i32,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Update a student's details
    UpdateStudent {
        #[arg(long)]
        id: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        major: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Update a course in place
    UpdateCourse {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        credits: Option<i32>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        instructor: Option<String>,
        #[arg(long)]
        exam_weight: Option<i32>,
        #[arg(long)]
        assignment_weight: Option<i32>,
        #[arg(long, default_value = "admin")]
        role: String,
    },
    /// Delete a course
    DeleteCourse {
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "admin")]
        role: String,
    },
    /// Enroll a student in a course for a (semester, year)
    Enroll {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        year: i32,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Confirm a student's enrolment
    ConfirmEnrolment {
        #[arg(long)]
        student: String,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Record a grade and component scores on the latest attempt
    AssignGrade {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        grade: String,
        #[arg(long, default_value_t = 0.0)]
        exam_score: f64,
        #[arg(long, default_value_t = 0.0)]
        assignment_score: f64,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// List registered students
    Students,
    /// List the course catalogue
    Courses,
    /// List a student's course attempts with status
    StudentCourses {
        #[arg(long)]
        student: String,
    },
    /// Show a student's CGPA, failed-course count and eligibility
    Standing {
        #[arg(long)]
        student: String,
        #[arg(long)]
        json: bool,
    },
    /// Per-semester academic performance report
    AcademicReport {
        #[arg(long)]
        student: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Full transcript grouped by semester
    Transcript {
        #[arg(long)]
        student: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Roster of students not eligible to progress
    Eligibility {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Re-evaluate a student's standing and notify them of the outcome
    ConfirmEligibility {
        #[arg(long)]
        student: String,
    },
    /// Create a recovery plan for a failed course
    PlanCreate {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        recommendation: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        created_by: String,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Append a milestone to a recovery plan
    PlanAddMilestone {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        week: String,
        #[arg(long)]
        task: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Remove a milestone from a recovery plan
    PlanRemoveMilestone {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        milestone: String,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Grade a milestone; the plan completes when every milestone is done
    PlanGradeMilestone {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        milestone: String,
        #[arg(long)]
        grade: f64,
        #[arg(long, default_value = "")]
        feedback: String,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Force a plan to Completed regardless of milestone state
    PlanComplete {
        #[arg(long)]
        plan: String,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Cancel a plan
    PlanCancel {
        #[arg(long)]
        plan: String,
        #[arg(long, default_value = "officer")]
        role: String,
    },
    /// Delete a plan outright
    PlanDelete {
        #[arg(long)]
        plan: String,
        #[arg(long, default_value = "admin")]
        role: String,
    },
    /// List recovery plans with their progress
    Plans {
        #[arg(long)]
        student: Option<String>,
    },
    /// Render a recovery plan report
    PlanReport {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn require(role: &str, permission: &str) -> anyhow::Result<Role> {
    let role: Role = role.parse()?;
    if !role.can(permission) {
        anyhow::bail!("role '{role}' lacks the {permission} permission");
    }
    Ok(role)
}

async fn get_student(pool: &PgPool, id: &str) -> anyhow::Result<Student> {
    db::find_student(pool, id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("student {id}")).into())
}

async fn get_course(pool: &PgPool, id: &str) -> anyhow::Result<Course> {
    db::find_course(pool, id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("course {id}")).into())
}

async fn get_plan(pool: &PgPool, id: &str) -> anyhow::Result<models::RecoveryPlan> {
    db::find_plan(pool, id)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("plan {id}")).into())
}

fn emit(text: &str, out: Option<&PathBuf>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let notifier = LogNotifier;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportStudents { csv } => {
            let inserted = db::import_students_csv(&pool, &csv).await?;
            println!("Inserted {inserted} students from {}.", csv.display());
        }
        Commands::ImportCourses { csv } => {
            let inserted = db::import_courses_csv(&pool, &csv).await?;
            println!("Inserted {inserted} courses from {}.", csv.display());
        }
        Commands::AddStudent {
            id,
            first_name,
            last_name,
            email,
            major,
            year,
        } => {
            let student = Student::new(&id, &first_name, &last_name, &email, &major, &year);
            db::insert_student(&pool, &student).await?;
            println!("Added student {} ({}).", student.full_name(), student.id);
        }
        Commands::AddCourse {
            id,
            name,
            credits,
            semester,
            instructor,
            exam_weight,
            assignment_weight,
            description,
        } => {
            let course = Course {
                id,
                name,
                credits,
                semester,
                instructor,
                exam_weight,
                assignment_weight,
                description,
            };
            db::insert_course(&pool, &course).await?;
            println!("Added course {} ({}).", course.name, course.id);
        }
        Commands::UpdateStudent {
            id,
            first_name,
            last_name,
            email,
            major,
            year,
            role,
        } => {
            require(&role, "MANAGE_ENROLMENT")?;
            let mut student = get_student(&pool, &id).await?;
            if let Some(first_name) = first_name {
                student.first_name = first_name;
            }
            if let Some(last_name) = last_name {
                student.last_name = last_name;
            }
            if let Some(email) = email {
                student.email = email;
            }
            if let Some(major) = major {
                student.major = major;
                student.program = format!("Bachelor of {}", student.major);
            }
            if let Some(year) = year {
                student.year = year;
            }
            db::update_student(&pool, &student).await?;
            println!("Updated student {}.", student.id);
        }
        Commands::UpdateCourse {
            id,
            name,
            credits,
            semester,
            instructor,
            exam_weight,
            assignment_weight,
            role,
        } => {
            require(&role, "UPDATE_COURSES")?;
            let mut course = get_course(&pool, &id).await?;
            if let Some(name) = name {
                course.name = name;
            }
            if let Some(credits) = credits {
                course.credits = credits;
            }
            if let Some(semester) = semester {
                course.semester = semester;
            }
            if let Some(instructor) = instructor {
                course.instructor = instructor;
            }
            if let Some(exam_weight) = exam_weight {
                course.exam_weight = exam_weight;
            }
            if let Some(assignment_weight) = assignment_weight {
                course.assignment_weight = assignment_weight;
            }
            db::update_course(&pool, &course).await?;
            println!("Updated course {}.", course.id);
        }
        Commands::DeleteCourse { id, role } => {
            require(&role, "UPDATE_COURSES")?;
            if db::delete_course(&pool, &id).await? {
                println!("Deleted course {id}.");
            } else {
                anyhow::bail!(DomainError::NotFound(format!("course {id}")));
            }
        }
        Commands::Enroll {
            student,
            course,
            semester,
            year,
            role,
        } => {
            require(&role, "MANAGE_ENROLMENT")?;
            get_student(&pool, &student).await?;
            get_course(&pool, &course).await?;
            let attempt = db::enroll(&pool, &student, &course, &semester, year).await?;
            println!("Enrolled {student} in {course} ({semester} {year}), attempt {attempt}.");
        }
        Commands::ConfirmEnrolment { student, role } => {
            require(&role, "MANAGE_ENROLMENT")?;
            if db::confirm_enrolment(&pool, &student).await? {
                println!("Enrolment confirmed for {student}.");
            } else {
                anyhow::bail!(DomainError::NotFound(format!("student {student}")));
            }
        }
        Commands::AssignGrade {
            student,
            course,
            grade,
            exam_score,
            assignment_score,
            role,
        } => {
            require(&role, "ENTER_GRADES")?;
            let updated =
                db::assign_grade(&pool, &student, &course, &grade, exam_score, assignment_score)
                    .await?;
            if !updated {
                anyhow::bail!(DomainError::NotFound(format!(
                    "attempt of {student} at {course}"
                )));
            }
            println!("Recorded grade {grade} for {student} in {course}.");
        }
        Commands::Students => {
            for student in db::fetch_students(&pool).await? {
                println!(
                    "- {} {} ({}) {} year {}{}",
                    student.id,
                    student.full_name(),
                    student.major,
                    student.program,
                    student.year,
                    if student.enrolled { "" } else { " [not enrolled]" }
                );
            }
        }
        Commands::Courses => {
            for course in db::fetch_courses(&pool).await? {
                println!(
                    "- {} {} ({} credits, {}, {}; exam {}% / assignment {}%)",
                    course.id,
                    course.name,
                    course.credits,
                    course.semester,
                    course.instructor,
                    course.exam_weight,
                    course.assignment_weight
                );
            }
        }
        Commands::StudentCourses { student } => {
            get_student(&pool, &student).await?;
            let attempts = db::fetch_attempts(&pool, &student).await?;
            if attempts.is_empty() {
                println!("No course attempts for {student}.");
            }
            for attempt in &attempts {
                let mut line = format!(
                    "- {} {} ({} {}, attempt {}): {} [{}]",
                    attempt.course_id,
                    attempt.course_name,
                    attempt.semester,
                    attempt.year,
                    attempt.attempt_number,
                    attempt.graded().unwrap_or("N/A"),
                    attempt.status()
                );
                if attempt.is_failed() {
                    line.push_str(&format!(" failed component: {}", attempt.failed_component()));
                }
                println!("{line}");
            }
            let passed = attempts.iter().filter(|a| a.is_passed()).count();
            let failed = attempts.iter().filter(|a| a.is_failed()).count();
            println!(
                "{} attempt(s): {} passed, {} failed, {} in progress",
                attempts.len(),
                passed,
                failed,
                attempts.len() - passed - failed
            );
        }
        Commands::Standing { student, json } => {
            get_student(&pool, &student).await?;
            let attempts = db::fetch_attempts(&pool, &student).await?;
            let standing = eligibility::evaluate(&attempts);
            if json {
                println!("{}", serde_json::to_string_pretty(&standing)?);
            } else {
                println!(
                    "{student}: CGPA {:.2}, {} failed course(s), {}",
                    standing.cgpa,
                    standing.failed_courses,
                    standing.label()
                );
            }
        }
        Commands::AcademicReport {
            student,
            semester,
            year,
            out,
        } => {
            let student = get_student(&pool, &student).await?;
            let attempts = db::fetch_attempts(&pool, &student.id).await?;
            let text = report::academic_report(&student, &attempts, &semester, year);
            emit(&text, out.as_ref())?;
        }
        Commands::Transcript { student, out } => {
            let student = get_student(&pool, &student).await?;
            let attempts = db::fetch_attempts(&pool, &student.id).await?;
            let standing = eligibility::evaluate(&attempts);
            let text = report::transcript(&student, &attempts, &standing);
            emit(&text, out.as_ref())?;
        }
        Commands::Eligibility { json, out } => {
            let mut rows = Vec::new();
            for student in db::fetch_students(&pool).await? {
                let attempts = db::fetch_attempts(&pool, &student.id).await?;
                let standing = eligibility::evaluate(&attempts);
                if !standing.eligible {
                    rows.push(report::RosterRow {
                        student_id: student.id.clone(),
                        name: student.full_name(),
                        major: student.major.clone(),
                        cgpa: standing.cgpa,
                        failed_courses: standing.failed_courses,
                        reason: standing.reason(),
                    });
                }
            }
            let text = if json {
                serde_json::to_string_pretty(&rows)?
            } else {
                report::eligibility_roster(&rows)
            };
            emit(&text, out.as_ref())?;
        }
        Commands::ConfirmEligibility { student } => {
            let student = get_student(&pool, &student).await?;
            let attempts = db::fetch_attempts(&pool, &student.id).await?;
            let standing = eligibility::evaluate(&attempts);
            let (subject, body) = notify::eligibility_notice(&student, &standing);
            notify::dispatch(&notifier, &student.email, &subject, &body);
            println!(
                "{}: CGPA {:.2}, {}; notification sent to {}.",
                student.id,
                standing.cgpa,
                standing.label(),
                student.email
            );
        }
        Commands::PlanCreate {
            student,
            course,
            recommendation,
            start,
            end,
            created_by,
            role,
        } => {
            require(&role, "CREATE_RECOVERY_PLAN")?;
            let student = get_student(&pool, &student).await?;
            let course = get_course(&pool, &course).await?;

            let attempts = db::fetch_attempts(&pool, &student.id).await?;
            if !attempts
                .iter()
                .any(|a| a.course_id == course.id && a.is_failed())
            {
                warn!(
                    student_id = %student.id,
                    course_id = %course.id,
                    "recovery plan created without a failed attempt on record"
                );
            }

            let plan =
                recovery::new_plan(&student.id, &course.id, &recommendation, start, end, &created_by);
            db::save_plan(&pool, &plan).await?;

            let (subject, body) = notify::recovery_plan_created(&student, &plan, &course);
            notify::dispatch(&notifier, &student.email, &subject, &body);
            println!("Created plan {} for {} in {}.", plan.id, student.id, course.id);
        }
        Commands::PlanAddMilestone {
            plan,
            week,
            task,
            description,
            due,
            role,
        } => {
            require(&role, "UPDATE_RECOVERY_PLAN")?;
            let mut plan = get_plan(&pool, &plan).await?;
            let milestone_id = recovery::add_milestone(&mut plan, &week, &task, &description, due);
            db::save_plan(&pool, &plan).await?;
            println!("Added milestone {milestone_id} to plan {}.", plan.id);
        }
        Commands::PlanRemoveMilestone {
            plan,
            milestone,
            role,
        } => {
            require(&role, "UPDATE_RECOVERY_PLAN")?;
            let mut plan = get_plan(&pool, &plan).await?;
            recovery::remove_milestone(&mut plan, &milestone);
            db::save_plan(&pool, &plan).await?;
            println!("Removed milestone {milestone} from plan {}.", plan.id);
        }
        Commands::PlanGradeMilestone {
            plan,
            milestone,
            grade,
            feedback,
            role,
        } => {
            require(&role, "UPDATE_RECOVERY_PLAN")?;
            let mut plan = get_plan(&pool, &plan).await?;
            recovery::grade_milestone(&mut plan, &milestone, grade, &feedback)?;
            db::save_plan(&pool, &plan).await?;
            println!(
                "Milestone {milestone} graded; plan {} at {:.1}%, status {}.",
                plan.id,
                recovery::progress_percentage(&plan),
                plan.status
            );
        }
        Commands::PlanComplete { plan, role } => {
            require(&role, "UPDATE_RECOVERY_PLAN")?;
            let mut plan = get_plan(&pool, &plan).await?;
            recovery::complete(&mut plan);
            db::save_plan(&pool, &plan).await?;
            println!("Plan {} marked Completed.", plan.id);
        }
        Commands::PlanCancel { plan, role } => {
            require(&role, "UPDATE_RECOVERY_PLAN")?;
            let mut plan = get_plan(&pool, &plan).await?;
            recovery::cancel(&mut plan);
            db::save_plan(&pool, &plan).await?;
            println!("Plan {} cancelled.", plan.id);
        }
        Commands::PlanDelete { plan, role } => {
            require(&role, "DELETE_RECOVERY_PLAN")?;
            if db::delete_plan(&pool, &plan).await? {
                println!("Plan {plan} deleted.");
            } else {
                anyhow::bail!(DomainError::NotFound(format!("plan {plan}")));
            }
        }
        Commands::Plans { student } => {
            let plans = db::fetch_plans(&pool, student.as_deref()).await?;
            if plans.is_empty() {
                println!("No recovery plans found.");
            }
            for plan in &plans {
                let overdue = plan.milestones.iter().filter(|m| m.is_overdue()).count();
                println!(
                    "- {} student {} course {} status {} progress {:.1}%{}",
                    plan.id,
                    plan.student_id,
                    plan.course_id,
                    plan.status,
                    recovery::progress_percentage(plan),
                    if overdue > 0 {
                        format!(" ({overdue} milestone(s) overdue)")
                    } else {
                        String::new()
                    }
                );
            }
        }
        Commands::PlanReport { plan, out } => {
            let plan = get_plan(&pool, &plan).await?;
            let student = db::find_student(&pool, &plan.student_id).await?;
            let course = db::find_course(&pool, &plan.course_id).await?;
            if student.is_none() || course.is_none() {
                warn!(plan_id = %plan.id, "plan references missing student or course");
            }
            let text = report::plan_report(&plan, student.as_ref(), course.as_ref());
            emit(&text, out.as_ref())?;
        }
    }

    Ok(())
}
