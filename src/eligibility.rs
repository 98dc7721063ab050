use serde::Serialize;

use crate::grades;
use crate::models::CourseAttempt;

/// Progression thresholds. Fixed institution-wide today; kept as named
/// constants so a future config layer has one place to hook into.
pub const MIN_CGPA: f64 = 2.0;
pub const MAX_FAILED_COURSES: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    pub cgpa: f64,
    pub failed_courses: usize,
    pub eligible: bool,
}

/// Classify a student from a freshly fetched attempt slice. Always
/// recomputed; no eligibility flag is cached anywhere.
pub fn evaluate(attempts: &[CourseAttempt]) -> Standing {
    let cgpa = grades::cgpa(attempts);
    let failed_courses = grades::failed_count(attempts);
    Standing {
        cgpa,
        failed_courses,
        eligible: cgpa >= MIN_CGPA && failed_courses <= MAX_FAILED_COURSES,
    }
}

impl Standing {
    pub fn label(&self) -> &'static str {
        if self.eligible {
            "ELIGIBLE"
        } else {
            "NOT ELIGIBLE"
        }
    }

    /// Reason string for roster rows: "Low CGPA" and/or ">3 Failed",
    /// comma-joined, empty for an eligible student.
    pub fn reason(&self) -> String {
        let mut reason = String::new();
        if self.cgpa < MIN_CGPA {
            reason.push_str("Low CGPA");
        }
        if self.failed_courses > MAX_FAILED_COURSES {
            if !reason.is_empty() {
                reason.push_str(", ");
            }
            reason.push_str(">3 Failed");
        }
        reason
    }
}
