use std::fmt::Write;

use chrono::Utc;
use serde::Serialize;

use crate::eligibility::Standing;
use crate::grades;
use crate::models::{Course, CourseAttempt, MilestoneStatus, RecoveryPlan, Student};
use crate::recovery;

/// Cut text to `max` characters, the last two being "..", so table columns
/// stay aligned. Text at or under the width passes through unchanged.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(2)).collect();
        format!("{head}..")
    } else {
        text.to_string()
    }
}

fn generated_line(out: &mut String) {
    let _ = writeln!(
        out,
        "Generated: {}",
        Utc::now().date_naive().format("%d %B %Y")
    );
}

fn course_table_header(out: &mut String) {
    let _ = writeln!(out, "{}", "-".repeat(60));
    let _ = writeln!(
        out,
        "{:<10} {:<25} {:<8} {:<6} {:<8}",
        "Code", "Course Title", "Credits", "Grade", "Points"
    );
    let _ = writeln!(out, "{}", "-".repeat(60));
}

fn course_row(out: &mut String, attempt: &CourseAttempt) {
    let grade = attempt.graded().unwrap_or("N/A");
    let points = attempt.graded().map(grades::grade_point).unwrap_or(0.0);
    let _ = writeln!(
        out,
        "{:<10} {:<25} {:<8} {:<6} {:<8.1}",
        attempt.course_id,
        truncate(&attempt.course_name, 25),
        attempt.credits,
        grade,
        points
    );
}

/// Per-semester academic report: one course table plus semester GPA and
/// CGPA, both computed from the attempt slice handed in.
pub fn academic_report(
    student: &Student,
    attempts: &[CourseAttempt],
    semester: &str,
    year: i32,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "           ACADEMIC PERFORMANCE REPORT");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out);
    let _ = writeln!(out, "Student Name: {}", student.full_name());
    let _ = writeln!(out, "Student ID: {}", student.id);
    let _ = writeln!(out, "Program: {}", student.program);
    let _ = writeln!(out, "Semester: {semester} {year}");
    generated_line(&mut out);
    let _ = writeln!(out);

    course_table_header(&mut out);
    for attempt in attempts
        .iter()
        .filter(|a| a.semester == semester && a.year == year)
    {
        course_row(&mut out, attempt);
    }
    let _ = writeln!(out, "{}", "-".repeat(60));

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Semester GPA: {:.2}",
        grades::semester_gpa(attempts, semester, year)
    );
    let _ = writeln!(out, "Cumulative GPA (CGPA): {:.2}", grades::cgpa(attempts));
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(60));

    out
}

/// Full transcript: attempts grouped by "semester year" in first-seen
/// order, per-group GPA, then the overall standing.
pub fn transcript(student: &Student, attempts: &[CourseAttempt], standing: &Standing) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "        COMPLETE ACADEMIC PERFORMANCE REPORT");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out);
    let _ = writeln!(out, "Student Name: {}", student.full_name());
    let _ = writeln!(out, "Student ID: {}", student.id);
    let _ = writeln!(out, "Program: {}", student.program);
    let _ = writeln!(out, "Major: {}", student.major);
    let _ = writeln!(out, "Year: {}", student.year);
    let _ = writeln!(out, "Email: {}", student.email);
    generated_line(&mut out);
    let _ = writeln!(out);

    // First-seen grouping, not sorted: a transcript reads in enrolment order.
    let mut groups: Vec<(String, Vec<&CourseAttempt>)> = Vec::new();
    for attempt in attempts {
        let key = format!("{} {}", attempt.semester, attempt.year);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(attempt),
            None => groups.push((key, vec![attempt])),
        }
    }

    for (label, members) in &groups {
        let _ = writeln!(out);
        let _ = writeln!(out, "{label}");
        course_table_header(&mut out);

        let mut points = 0.0;
        let mut credits = 0;
        for attempt in members {
            course_row(&mut out, attempt);
            if let Some(grade) = attempt.graded() {
                points += grades::grade_point(grade) * attempt.credits as f64;
                credits += attempt.credits;
            }
        }
        let gpa = if credits > 0 {
            points / credits as f64
        } else {
            0.0
        };
        let _ = writeln!(out, "Semester GPA: {gpa:.2}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "CUMULATIVE GPA (CGPA): {:.2}", standing.cgpa);
    let _ = writeln!(out, "Failed Courses: {}", standing.failed_courses);
    let _ = writeln!(out, "Eligibility Status: {}", standing.label());
    let _ = writeln!(out, "{}", "=".repeat(60));

    out
}

/// One roster line per ineligible student.
#[derive(Debug, Clone, Serialize)]
pub struct RosterRow {
    pub student_id: String,
    pub name: String,
    pub major: String,
    pub cgpa: f64,
    pub failed_courses: usize,
    pub reason: String,
}

pub fn eligibility_roster(rows: &[RosterRow]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(70));
    let _ = writeln!(out, "              ELIGIBILITY STATUS REPORT");
    let _ = writeln!(out, "{}", "=".repeat(70));
    generated_line(&mut out);
    let _ = writeln!(out);

    let _ = writeln!(out, "Students NOT Eligible to Progress:");
    let _ = writeln!(out, "{}", "-".repeat(70));
    let _ = writeln!(
        out,
        "{:<10} {:<20} {:<15} {:<8} {:<8} {:<10}",
        "ID", "Name", "Major", "CGPA", "Failed", "Reason"
    );
    let _ = writeln!(out, "{}", "-".repeat(70));

    for row in rows {
        let _ = writeln!(
            out,
            "{:<10} {:<20} {:<15} {:<8.2} {:<8} {:<10}",
            row.student_id,
            truncate(&row.name, 20),
            truncate(&row.major, 15),
            row.cgpa,
            row.failed_courses,
            row.reason
        );
    }

    let _ = writeln!(out, "{}", "-".repeat(70));
    let _ = writeln!(out, "Total Ineligible Students: {}", rows.len());
    let _ = writeln!(out, "{}", "=".repeat(70));

    out
}

/// Recovery plan report. Missing student or course records render as N/A
/// rather than failing the report.
pub fn plan_report(
    plan: &RecoveryPlan,
    student: Option<&Student>,
    course: Option<&Course>,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "           COURSE RECOVERY PLAN REPORT");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out);
    let _ = writeln!(out, "Plan ID: {}", plan.id);
    let _ = writeln!(out, "Status: {}", plan.status);
    let _ = writeln!(
        out,
        "Progress: {:.1}%",
        recovery::progress_percentage(plan)
    );
    let _ = writeln!(out);

    match student {
        Some(student) => {
            let _ = writeln!(out, "Student: {} ({})", student.full_name(), student.id);
            let _ = writeln!(out, "Email: {}", student.email);
        }
        None => {
            let _ = writeln!(out, "Student: N/A ({})", plan.student_id);
        }
    }

    match course {
        Some(course) => {
            let _ = writeln!(out, "Course: {} ({})", course.name, course.id);
            let _ = writeln!(out, "Instructor: {}", course.instructor);
        }
        None => {
            let _ = writeln!(out, "Course: N/A ({})", plan.course_id);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Duration: {} to {}", plan.start_date, plan.end_date);
    let _ = writeln!(out, "Recommendation: {}", plan.recommendation);
    let _ = writeln!(out);

    let _ = writeln!(out, "Milestones:");
    let _ = writeln!(out, "{}", "-".repeat(60));
    let _ = writeln!(
        out,
        "{:<12} {:<25} {:<10} {:<8}",
        "Week", "Task", "Status", "Grade"
    );
    let _ = writeln!(out, "{}", "-".repeat(60));

    for milestone in &plan.milestones {
        let grade = if milestone.status == MilestoneStatus::Completed {
            format!("{:.1}", milestone.grade)
        } else {
            "-".to_string()
        };
        let _ = writeln!(
            out,
            "{:<12} {:<25} {:<10} {:<8}",
            milestone.study_week,
            truncate(&milestone.task, 25),
            milestone.status,
            grade
        );
    }

    let _ = writeln!(out, "{}", "-".repeat(60));
    let _ = writeln!(out, "Created by: {}", plan.created_by);
    let _ = writeln!(out, "Created on: {}", plan.created_at);
    let _ = writeln!(out, "{}", "=".repeat(60));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility;
    use crate::recovery::{add_milestone, grade_milestone, new_plan};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn student() -> Student {
        Student::new("S001", "Avery", "Lee", "avery.lee@uni.edu", "Data Science", "2")
    }

    fn attempt(course_id: &str, name: &str, credits: i32, grade: Option<&str>) -> CourseAttempt {
        CourseAttempt {
            id: Uuid::new_v4(),
            student_id: "S001".to_string(),
            course_id: course_id.to_string(),
            course_name: name.to_string(),
            credits,
            semester: "Semester 1".to_string(),
            year: 2026,
            attempt_number: 1,
            grade: grade.map(str::to_string),
            exam_score: 0.0,
            assignment_score: 0.0,
        }
    }

    #[test]
    fn truncate_reproduces_two_dot_ellipsis() {
        // 27 chars into a 25-wide column: first 23 chars + "..".
        let title = "Foundations of Computation!";
        assert_eq!(title.chars().count(), 27);
        let cut = truncate(title, 25);
        assert_eq!(cut.len(), 25);
        assert_eq!(cut, "Foundations of Computat..");
    }

    #[test]
    fn truncate_leaves_exact_width_alone() {
        let exact = "a".repeat(25);
        assert_eq!(truncate(&exact, 25), exact);
        assert_eq!(truncate("short", 25), "short");
    }

    #[test]
    fn academic_report_shows_table_and_both_gpas() {
        let attempts = vec![
            attempt("CS101", "Intro to Programming", 3, Some("B")),
            attempt("CS102", "Discrete Mathematics", 4, None),
        ];
        let report = academic_report(&student(), &attempts, "Semester 1", 2026);

        assert!(report.contains("ACADEMIC PERFORMANCE REPORT"));
        assert!(report.contains("Student Name: Avery Lee"));
        assert!(report.contains("CS101"));
        // Ungraded attempt renders N/A but is excluded from the mean.
        assert!(report.contains("N/A"));
        assert!(report.contains("Semester GPA: 3.00"));
        assert!(report.contains("Cumulative GPA (CGPA): 3.00"));
    }

    #[test]
    fn transcript_groups_semesters_in_first_seen_order() {
        let mut autumn = attempt("CS201", "Algorithms", 3, Some("A"));
        autumn.semester = "Semester 2".to_string();
        let attempts = vec![
            attempt("CS101", "Intro to Programming", 3, Some("B")),
            autumn,
            attempt("CS102", "Discrete Mathematics", 3, Some("F")),
        ];
        let standing = eligibility::evaluate(&attempts);
        let report = transcript(&student(), &attempts, &standing);

        let first = report.find("Semester 1 2026").unwrap();
        let second = report.find("Semester 2 2026").unwrap();
        assert!(first < second);
        assert!(report.contains("Failed Courses: 1"));
        assert!(report.contains("Eligibility Status: ELIGIBLE"));
    }

    #[test]
    fn roster_concatenates_reasons_and_counts_rows() {
        let rows = vec![
            RosterRow {
                student_id: "S001".to_string(),
                name: "Avery Lee".to_string(),
                major: "Data Science".to_string(),
                cgpa: 1.42,
                failed_courses: 4,
                reason: "Low CGPA, >3 Failed".to_string(),
            },
            RosterRow {
                student_id: "S002".to_string(),
                name: "Jules Moreno".to_string(),
                major: "Software Engineering and Architecture".to_string(),
                cgpa: 1.95,
                failed_courses: 1,
                reason: "Low CGPA".to_string(),
            },
        ];
        let report = eligibility_roster(&rows);

        assert!(report.contains("Low CGPA, >3 Failed"));
        assert!(report.contains("1.42"));
        assert!(report.contains("Total Ineligible Students: 2"));
        // Long major truncated to the 15-wide column.
        assert!(report.contains("Software Engi.."));
    }

    #[test]
    fn plan_report_round_trip_shows_full_progress() {
        let mut plan = new_plan(
            "S001",
            "CS101",
            "Structured revision",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 25).unwrap(),
            "officer1",
        );
        let ids: Vec<String> = (1..=3)
            .map(|week| add_milestone(&mut plan, &format!("Week {week}"), "Task", "", None))
            .collect();
        for id in &ids {
            grade_milestone(&mut plan, id, 75.0, "ok").unwrap();
        }

        let course = Course {
            id: "CS101".to_string(),
            name: "Intro to Programming".to_string(),
            credits: 3,
            semester: "Semester 1".to_string(),
            instructor: "Dr. Chen".to_string(),
            exam_weight: 60,
            assignment_weight: 40,
            description: String::new(),
        };
        let report = plan_report(&plan, Some(&student()), Some(&course));

        assert!(report.contains("Progress: 100.0%"));
        assert!(report.contains("Status: Completed"));
        assert!(report.contains("75.0"));
        assert!(report.contains("Instructor: Dr. Chen"));
    }

    #[test]
    fn pending_milestones_show_a_dash_for_grade() {
        let mut plan = new_plan(
            "S001",
            "CS101",
            "Structured revision",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 25).unwrap(),
            "officer1",
        );
        let first = add_milestone(&mut plan, "Week 1", "Revise lectures", "", None);
        add_milestone(&mut plan, "Week 2", "Practice problems", "", None);
        grade_milestone(&mut plan, &first, 66.0, "").unwrap();

        let report = plan_report(&plan, None, None);
        assert!(report.contains("Student: N/A (S001)"));
        assert!(report.contains("Course: N/A (CS101)"));
        assert!(report.contains("66.0"));

        let pending_line = report
            .lines()
            .find(|l| l.starts_with("Week 2"))
            .unwrap();
        assert!(pending_line.contains("Pending"));
        assert!(pending_line.trim_end().ends_with('-'));
    }
}
