use crate::models::CourseAttempt;

/// Grade-point value for a letter grade, case-insensitive. Unrecognised
/// input maps to 0.0; callers that need to distinguish "not yet graded"
/// check `CourseAttempt::graded` before accumulating.
pub fn grade_point(grade: &str) -> f64 {
    match grade.to_uppercase().as_str() {
        "A" | "A+" => 4.0,
        "A-" => 3.7,
        "B+" => 3.3,
        "B" => 3.0,
        "B-" => 2.7,
        "C+" => 2.3,
        "C" => 2.0,
        "C-" => 1.7,
        "D+" => 1.3,
        "D" => 1.0,
        "F" => 0.0,
        _ => 0.0,
    }
}

fn credit_weighted_mean<'a>(attempts: impl Iterator<Item = &'a CourseAttempt>) -> f64 {
    let mut points = 0.0;
    let mut credits = 0;

    for attempt in attempts {
        if let Some(grade) = attempt.graded() {
            points += grade_point(grade) * attempt.credits as f64;
            credits += attempt.credits;
        }
    }

    if credits > 0 {
        points / credits as f64
    } else {
        0.0
    }
}

/// Cumulative GPA over every graded attempt. Ungraded attempts contribute
/// nothing to either side of the division.
pub fn cgpa(attempts: &[CourseAttempt]) -> f64 {
    credit_weighted_mean(attempts.iter())
}

/// Same computation restricted to one (semester, year).
pub fn semester_gpa(attempts: &[CourseAttempt], semester: &str, year: i32) -> f64 {
    credit_weighted_mean(
        attempts
            .iter()
            .filter(|a| a.semester == semester && a.year == year),
    )
}

pub fn failed_count(attempts: &[CourseAttempt]) -> usize {
    attempts.iter().filter(|a| a.is_failed()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn attempt(course_id: &str, credits: i32, grade: Option<&str>) -> CourseAttempt {
        CourseAttempt {
            id: Uuid::new_v4(),
            student_id: "S001".to_string(),
            course_id: course_id.to_string(),
            course_name: format!("{course_id} title"),
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
    fn grade_table_matches_published_scale() {
        assert_eq!(grade_point("A+"), 4.0);
        assert_eq!(grade_point("A"), 4.0);
        assert_eq!(grade_point("A-"), 3.7);
        assert_eq!(grade_point("B+"), 3.3);
        assert_eq!(grade_point("B"), 3.0);
        assert_eq!(grade_point("B-"), 2.7);
        assert_eq!(grade_point("C+"), 2.3);
        assert_eq!(grade_point("C"), 2.0);
        assert_eq!(grade_point("C-"), 1.7);
        assert_eq!(grade_point("D+"), 1.3);
        assert_eq!(grade_point("D"), 1.0);
        assert_eq!(grade_point("F"), 0.0);
    }

    #[test]
    fn grade_lookup_is_case_insensitive() {
        assert_eq!(grade_point("b+"), 3.3);
        assert_eq!(grade_point("a-"), 3.7);
        assert_eq!(grade_point("f"), 0.0);
    }

    #[test]
    fn unrecognised_grades_map_to_zero() {
        assert_eq!(grade_point(""), 0.0);
        assert_eq!(grade_point("E"), 0.0);
        assert_eq!(grade_point("pass"), 0.0);
    }

    #[test]
    fn cgpa_excludes_ungraded_attempts_entirely() {
        // One graded B over 3 credits plus one ungraded 4-credit attempt:
        // the ungraded credits must not dilute the mean.
        let attempts = vec![
            attempt("CS101", 3, Some("B")),
            attempt("CS102", 4, None),
        ];
        assert!((cgpa(&attempts) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn cgpa_is_zero_with_no_graded_attempts() {
        assert_eq!(cgpa(&[]), 0.0);
        let attempts = vec![attempt("CS101", 3, None), attempt("CS102", 4, Some(""))];
        assert_eq!(cgpa(&attempts), 0.0);
    }

    #[test]
    fn cgpa_weights_by_credits() {
        let attempts = vec![
            attempt("CS101", 3, Some("A")),  // 4.0 * 3
            attempt("CS102", 1, Some("C")),  // 2.0 * 1
        ];
        let expected = (4.0 * 3.0 + 2.0) / 4.0;
        assert!((cgpa(&attempts) - expected).abs() < 1e-9);
    }

    #[test]
    fn failed_attempt_contributes_zero_points_but_full_credits() {
        let attempts = vec![
            attempt("CS101", 3, Some("F")),
            attempt("CS102", 3, Some("A")),
        ];
        assert!((cgpa(&attempts) - 2.0).abs() < 1e-9);
        assert_eq!(failed_count(&attempts), 1);
    }

    #[test]
    fn semester_gpa_only_sees_matching_attempts() {
        let mut other = attempt("CS201", 3, Some("A"));
        other.semester = "Semester 2".to_string();
        let attempts = vec![attempt("CS101", 3, Some("B")), other];

        assert!((semester_gpa(&attempts, "Semester 1", 2026) - 3.0).abs() < 1e-9);
        assert!((semester_gpa(&attempts, "Semester 2", 2026) - 4.0).abs() < 1e-9);
        assert_eq!(semester_gpa(&attempts, "Semester 1", 2025), 0.0);
    }

    #[test]
    fn failed_count_is_case_insensitive_and_exact() {
        let attempts = vec![
            attempt("CS101", 3, Some("f")),
            attempt("CS102", 3, Some("F")),
            attempt("CS103", 3, Some("D")),
            attempt("CS104", 3, None),
        ];
        assert_eq!(failed_count(&attempts), 2);
    }
}
