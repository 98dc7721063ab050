use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{Course, CourseAttempt, Milestone, RecoveryPlan, Student};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        major: row.get("major"),
        year: row.get("year"),
        program: row.get("program"),
        enrolled: row.get("enrolled"),
    }
}

pub async fn fetch_students(pool: &PgPool) -> anyhow::Result<Vec<Student>> {
    let rows = sqlx::query(
        "SELECT id, first_name, last_name, email, major, year, program, enrolled \
         FROM academic_recovery.students ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

pub async fn find_student(pool: &PgPool, id: &str) -> anyhow::Result<Option<Student>> {
    let row = sqlx::query(
        "SELECT id, first_name, last_name, email, major, year, program, enrolled \
         FROM academic_recovery.students WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(student_from_row))
}

pub async fn insert_student(pool: &PgPool, student: &Student) -> anyhow::Result<()> {
    let existing = sqlx::query("SELECT 1 FROM academic_recovery.students WHERE id = $1")
        .bind(&student.id)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Err(DomainError::DuplicateId(format!("student {}", student.id)).into());
    }

    sqlx::query(
        "INSERT INTO academic_recovery.students \
         (id, first_name, last_name, email, major, year, program, enrolled) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&student.id)
    .bind(&student.first_name)
    .bind(&student.last_name)
    .bind(&student.email)
    .bind(&student.major)
    .bind(&student.year)
    .bind(&student.program)
    .bind(student.enrolled)
    .execute(pool)
    .await?;

    info!(student_id = %student.id, "student added");
    Ok(())
}

pub async fn update_student(pool: &PgPool, student: &Student) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE academic_recovery.students \
         SET first_name = $2, last_name = $3, email = $4, major = $5, year = $6, \
             program = $7, enrolled = $8 \
         WHERE id = $1",
    )
    .bind(&student.id)
    .bind(&student.first_name)
    .bind(&student.last_name)
    .bind(&student.email)
    .bind(&student.major)
    .bind(&student.year)
    .bind(&student.program)
    .bind(student.enrolled)
    .execute(pool)
    .await?;

    info!(student_id = %student.id, "student updated");
    Ok(())
}

pub async fn confirm_enrolment(pool: &PgPool, student_id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE academic_recovery.students SET enrolled = TRUE WHERE id = $1")
        .bind(student_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn course_from_row(row: &PgRow) -> Course {
    Course {
        id: row.get("id"),
        name: row.get("name"),
        credits: row.get("credits"),
        semester: row.get("semester"),
        instructor: row.get("instructor"),
        exam_weight: row.get("exam_weight"),
        assignment_weight: row.get("assignment_weight"),
        description: row.get("description"),
    }
}

pub async fn fetch_courses(pool: &PgPool) -> anyhow::Result<Vec<Course>> {
    let rows = sqlx::query(
        "SELECT id, name, credits, semester, instructor, exam_weight, assignment_weight, description \
         FROM academic_recovery.courses ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(course_from_row).collect())
}

pub async fn find_course(pool: &PgPool, id: &str) -> anyhow::Result<Option<Course>> {
    let row = sqlx::query(
        "SELECT id, name, credits, semester, instructor, exam_weight, assignment_weight, description \
         FROM academic_recovery.courses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(course_from_row))
}

pub async fn insert_course(pool: &PgPool, course: &Course) -> anyhow::Result<()> {
    if !(1..=6).contains(&course.credits) {
        return Err(DomainError::InvalidArgument(format!(
            "credits {} outside 1-6",
            course.credits
        ))
        .into());
    }

    let existing = sqlx::query("SELECT 1 FROM academic_recovery.courses WHERE id = $1")
        .bind(&course.id)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Err(DomainError::DuplicateId(format!("course {}", course.id)).into());
    }

    sqlx::query(
        "INSERT INTO academic_recovery.courses \
         (id, name, credits, semester, instructor, exam_weight, assignment_weight, description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&course.id)
    .bind(&course.name)
    .bind(course.credits)
    .bind(&course.semester)
    .bind(&course.instructor)
    .bind(course.exam_weight)
    .bind(course.assignment_weight)
    .bind(&course.description)
    .execute(pool)
    .await?;

    info!(course_id = %course.id, "course added");
    Ok(())
}

pub async fn update_course(pool: &PgPool, course: &Course) -> anyhow::Result<()> {
    if !(1..=6).contains(&course.credits) {
        return Err(DomainError::InvalidArgument(format!(
            "credits {} outside 1-6",
            course.credits
        ))
        .into());
    }

    sqlx::query(
        "UPDATE academic_recovery.courses \
         SET name = $2, credits = $3, semester = $4, instructor = $5, \
             exam_weight = $6, assignment_weight = $7, description = $8 \
         WHERE id = $1",
    )
    .bind(&course.id)
    .bind(&course.name)
    .bind(course.credits)
    .bind(&course.semester)
    .bind(&course.instructor)
    .bind(course.exam_weight)
    .bind(course.assignment_weight)
    .bind(&course.description)
    .execute(pool)
    .await?;

    info!(course_id = %course.id, "course updated");
    Ok(())
}

pub async fn delete_course(pool: &PgPool, id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM academic_recovery.courses WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn attempt_from_row(row: &PgRow) -> CourseAttempt {
    CourseAttempt {
        id: row.get("id"),
        student_id: row.get("student_id"),
        course_id: row.get("course_id"),
        course_name: row.get("course_name"),
        credits: row.get("credits"),
        semester: row.get("semester"),
        year: row.get("year"),
        attempt_number: row.get("attempt_number"),
        grade: row.get("grade"),
        exam_score: row.get("exam_score"),
        assignment_score: row.get("assignment_score"),
    }
}

/// The derived per-student view over the flat attempt collection, in
/// enrolment order. Every CGPA/eligibility/report computation starts here;
/// nothing caches the result.
pub async fn fetch_attempts(pool: &PgPool, student_id: &str) -> anyhow::Result<Vec<CourseAttempt>> {
    let rows = sqlx::query(
        "SELECT ca.id, ca.student_id, ca.course_id, c.name AS course_name, c.credits, \
         ca.semester, ca.year, ca.attempt_number, ca.grade, ca.exam_score, ca.assignment_score \
         FROM academic_recovery.course_attempts ca \
         JOIN academic_recovery.courses c ON c.id = ca.course_id \
         WHERE ca.student_id = $1 \
         ORDER BY ca.seq",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(attempt_from_row).collect())
}

/// Insert a new attempt; the attempt number continues from the student's
/// previous attempts at the same course.
pub async fn enroll(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
    semester: &str,
    year: i32,
) -> anyhow::Result<i32> {
    let attempt_number: i32 = sqlx::query(
        "SELECT COALESCE(MAX(attempt_number), 0) + 1 AS next \
         FROM academic_recovery.course_attempts \
         WHERE student_id = $1 AND course_id = $2",
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?
    .get("next");

    sqlx::query(
        "INSERT INTO academic_recovery.course_attempts \
         (id, student_id, course_id, semester, year, attempt_number) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(course_id)
    .bind(semester)
    .bind(year)
    .bind(attempt_number)
    .execute(pool)
    .await?;

    info!(%student_id, %course_id, attempt_number, "student enrolled");
    Ok(attempt_number)
}

/// Record a grade and component scores on the student's latest attempt at
/// the course. Returns false when no attempt exists.
pub async fn assign_grade(
    pool: &PgPool,
    student_id: &str,
    course_id: &str,
    grade: &str,
    exam_score: f64,
    assignment_score: f64,
) -> anyhow::Result<bool> {
    for (label, score) in [("exam", exam_score), ("assignment", assignment_score)] {
        if !(0.0..=100.0).contains(&score) {
            return Err(DomainError::InvalidArgument(format!(
                "{label} score {score} is outside 0-100"
            ))
            .into());
        }
    }

    let result = sqlx::query(
        "UPDATE academic_recovery.course_attempts \
         SET grade = $3, exam_score = $4, assignment_score = $5 \
         WHERE id = ( \
             SELECT id FROM academic_recovery.course_attempts \
             WHERE student_id = $1 AND course_id = $2 \
             ORDER BY attempt_number DESC \
             LIMIT 1 \
         )",
    )
    .bind(student_id)
    .bind(course_id)
    .bind(grade)
    .bind(exam_score)
    .bind(assignment_score)
    .execute(pool)
    .await?;

    let updated = result.rows_affected() > 0;
    if updated {
        info!(%student_id, %course_id, %grade, "grade assigned");
    }
    Ok(updated)
}

fn plan_from_row(row: &PgRow) -> anyhow::Result<RecoveryPlan> {
    let status: String = row.get("status");
    Ok(RecoveryPlan {
        id: row.get("id"),
        student_id: row.get("student_id"),
        course_id: row.get("course_id"),
        recommendation: row.get("recommendation"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        status: status.parse()?,
        milestones: Vec::new(),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    })
}

fn milestone_from_row(row: &PgRow) -> anyhow::Result<Milestone> {
    let status: String = row.get("status");
    Ok(Milestone {
        id: row.get("id"),
        plan_id: row.get("plan_id"),
        study_week: row.get("study_week"),
        task: row.get("task"),
        description: row.get("description"),
        due_date: row.get("due_date"),
        status: status.parse()?,
        grade: row.get("grade"),
        feedback: row.get("feedback"),
        completed_date: row.get("completed_date"),
    })
}

async fn load_milestones(pool: &PgPool, plan_id: &str) -> anyhow::Result<Vec<Milestone>> {
    let rows = sqlx::query(
        "SELECT id, plan_id, study_week, task, description, due_date, status, grade, \
         feedback, completed_date \
         FROM academic_recovery.milestones WHERE plan_id = $1 ORDER BY position",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(milestone_from_row).collect()
}

pub async fn find_plan(pool: &PgPool, id: &str) -> anyhow::Result<Option<RecoveryPlan>> {
    let row = sqlx::query(
        "SELECT id, student_id, course_id, recommendation, start_date, end_date, status, \
         created_by, created_at \
         FROM academic_recovery.recovery_plans WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let mut plan = plan_from_row(&row)?;
            plan.milestones = load_milestones(pool, &plan.id).await?;
            Ok(Some(plan))
        }
        None => Ok(None),
    }
}

pub async fn fetch_plans(
    pool: &PgPool,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<RecoveryPlan>> {
    let mut query = String::from(
        "SELECT id, student_id, course_id, recommendation, start_date, end_date, status, \
         created_by, created_at \
         FROM academic_recovery.recovery_plans",
    );
    if student_id.is_some() {
        query.push_str(" WHERE student_id = $1");
    }
    query.push_str(" ORDER BY created_at, id");

    let mut rows = sqlx::query(&query);
    if let Some(value) = student_id {
        rows = rows.bind(value);
    }

    let mut plans = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let mut plan = plan_from_row(&row)?;
        plan.milestones = load_milestones(pool, &plan.id).await?;
        plans.push(plan);
    }

    Ok(plans)
}

/// Persist a plan and its milestone list as one unit. Covers both the
/// initial insert and every later mutation of the same plan.
pub async fn save_plan(pool: &PgPool, plan: &RecoveryPlan) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO academic_recovery.recovery_plans \
         (id, student_id, course_id, recommendation, start_date, end_date, status, created_by, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (id) DO UPDATE \
         SET recommendation = EXCLUDED.recommendation, \
             start_date = EXCLUDED.start_date, \
             end_date = EXCLUDED.end_date, \
             status = EXCLUDED.status",
    )
    .bind(&plan.id)
    .bind(&plan.student_id)
    .bind(&plan.course_id)
    .bind(&plan.recommendation)
    .bind(plan.start_date)
    .bind(plan.end_date)
    .bind(plan.status.as_str())
    .bind(&plan.created_by)
    .bind(plan.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM academic_recovery.milestones WHERE plan_id = $1")
        .bind(&plan.id)
        .execute(&mut *tx)
        .await?;

    for (position, milestone) in plan.milestones.iter().enumerate() {
        sqlx::query(
            "INSERT INTO academic_recovery.milestones \
             (id, plan_id, position, study_week, task, description, due_date, status, grade, \
              feedback, completed_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&milestone.id)
        .bind(&milestone.plan_id)
        .bind(position as i32)
        .bind(&milestone.study_week)
        .bind(&milestone.task)
        .bind(&milestone.description)
        .bind(milestone.due_date)
        .bind(milestone.status.as_str())
        .bind(milestone.grade)
        .bind(&milestone.feedback)
        .bind(milestone.completed_date)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(plan_id = %plan.id, status = %plan.status, "plan saved");
    Ok(())
}

pub async fn delete_plan(pool: &PgPool, id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM academic_recovery.recovery_plans WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(serde::Deserialize)]
struct StudentCsvRow {
    student_id: String,
    first_name: String,
    last_name: String,
    major: String,
    year: String,
    email: String,
}

fn parse_students<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<Student>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut students = Vec::new();

    for result in reader.deserialize::<StudentCsvRow>() {
        let row = result?;
        students.push(Student::new(
            &row.student_id,
            &row.first_name,
            &row.last_name,
            &row.email,
            &row.major,
            &row.year,
        ));
    }

    Ok(students)
}

pub async fn import_students_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let students = parse_students(file)?;

    let mut inserted = 0usize;
    for student in &students {
        let result = sqlx::query(
            "INSERT INTO academic_recovery.students \
             (id, first_name, last_name, email, major, year, program, enrolled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&student.id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.major)
        .bind(&student.year)
        .bind(&student.program)
        .bind(student.enrolled)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(total = students.len(), inserted, "students imported");
    Ok(inserted)
}

#[derive(serde::Deserialize)]
struct CourseCsvRow {
    course_id: String,
    name: String,
    credits: i32,
    semester: String,
    instructor: String,
    exam_weight: i32,
    assignment_weight: i32,
}

fn parse_courses<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<Course>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut courses = Vec::new();

    for result in reader.deserialize::<CourseCsvRow>() {
        let row = result?;
        courses.push(Course {
            id: row.course_id,
            name: row.name,
            credits: row.credits,
            semester: row.semester,
            instructor: row.instructor,
            exam_weight: row.exam_weight,
            assignment_weight: row.assignment_weight,
            description: String::new(),
        });
    }

    Ok(courses)
}

pub async fn import_courses_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let courses = parse_courses(file)?;

    let mut inserted = 0usize;
    for course in &courses {
        let result = sqlx::query(
            "INSERT INTO academic_recovery.courses \
             (id, name, credits, semester, instructor, exam_weight, assignment_weight, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&course.id)
        .bind(&course.name)
        .bind(course.credits)
        .bind(&course.semester)
        .bind(&course.instructor)
        .bind(course.exam_weight)
        .bind(course.assignment_weight)
        .bind(&course.description)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    info!(total = courses.len(), inserted, "courses imported");
    Ok(inserted)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("S001", "Avery", "Lee", "avery.lee@uni.edu", "Data Science", "2"),
        ("S002", "Jules", "Moreno", "jules.moreno@uni.edu", "Software Engineering", "3"),
        ("S003", "Kiara", "Patel", "kiara.patel@uni.edu", "Information Systems", "2"),
    ];

    for (id, first, last, email, major, year) in students {
        let student = Student::new(id, first, last, email, major, year);
        sqlx::query(
            "INSERT INTO academic_recovery.students \
             (id, first_name, last_name, email, major, year, program, enrolled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE \
             SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name, \
                 email = EXCLUDED.email, major = EXCLUDED.major, year = EXCLUDED.year, \
                 program = EXCLUDED.program",
        )
        .bind(&student.id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.major)
        .bind(&student.year)
        .bind(&student.program)
        .bind(student.enrolled)
        .execute(pool)
        .await?;
    }

    let courses = vec![
        ("CS101", "Intro to Programming", 3, "Semester 1", "Dr. Chen", 60, 40),
        ("CS102", "Discrete Mathematics", 4, "Semester 1", "Dr. Okafor", 70, 30),
        ("CS201", "Data Structures and Algorithms", 3, "Semester 2", "Dr. Haddad", 60, 40),
    ];

    for (id, name, credits, semester, instructor, exam_weight, assignment_weight) in courses {
        sqlx::query(
            "INSERT INTO academic_recovery.courses \
             (id, name, credits, semester, instructor, exam_weight, assignment_weight, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, '') \
             ON CONFLICT (id) DO UPDATE \
             SET name = EXCLUDED.name, credits = EXCLUDED.credits, \
                 semester = EXCLUDED.semester, instructor = EXCLUDED.instructor, \
                 exam_weight = EXCLUDED.exam_weight, assignment_weight = EXCLUDED.assignment_weight",
        )
        .bind(id)
        .bind(name)
        .bind(credits)
        .bind(semester)
        .bind(instructor)
        .bind(exam_weight)
        .bind(assignment_weight)
        .execute(pool)
        .await?;
    }

    let attempts = vec![
        ("S001", "CS101", "Semester 1", 2026, 1, Some("B+"), 72.0, 81.0),
        ("S001", "CS102", "Semester 1", 2026, 1, Some("A-"), 85.0, 88.0),
        ("S002", "CS101", "Semester 1", 2026, 1, Some("F"), 38.0, 55.0),
        ("S002", "CS102", "Semester 1", 2026, 1, Some("D"), 52.0, 49.0),
        ("S003", "CS101", "Semester 1", 2026, 1, None, 0.0, 0.0),
    ];

    for (student_id, course_id, semester, year, attempt_number, grade, exam, assignment) in attempts
    {
        sqlx::query(
            "INSERT INTO academic_recovery.course_attempts \
             (id, student_id, course_id, semester, year, attempt_number, grade, exam_score, assignment_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (student_id, course_id, semester, year, attempt_number) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .bind(semester)
        .bind(year)
        .bind(attempt_number)
        .bind(grade)
        .bind(exam)
        .bind(assignment)
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_csv_rows_become_students_with_derived_program() {
        let csv = "student_id,first_name,last_name,major,year,email\n\
                   S001,Avery,Lee,Data Science,2,avery.lee@uni.edu\n\
                   S002,Jules,Moreno,Software Engineering,3,jules.moreno@uni.edu\n";
        let students = parse_students(csv.as_bytes()).unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].id, "S001");
        assert_eq!(students[0].email, "avery.lee@uni.edu");
        assert_eq!(students[0].program, "Bachelor of Data Science");
        assert_eq!(students[1].full_name(), "Jules Moreno");
    }

    #[test]
    fn course_csv_rows_parse_weights_and_credits() {
        let csv = "course_id,name,credits,semester,instructor,exam_weight,assignment_weight\n\
                   CS101,Intro to Programming,3,Semester 1,Dr. Chen,60,40\n";
        let courses = parse_courses(csv.as_bytes()).unwrap();

        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id, "CS101");
        assert_eq!(courses[0].credits, 3);
        assert_eq!(courses[0].exam_weight, 60);
        assert_eq!(courses[0].assignment_weight, 40);
    }

    #[test]
    fn malformed_course_csv_is_an_error() {
        let csv = "course_id,name,credits,semester,instructor,exam_weight,assignment_weight\n\
                   CS101,Intro to Programming,three,Semester 1,Dr. Chen,60,40\n";
        assert!(parse_courses(csv.as_bytes()).is_err());
    }
}
