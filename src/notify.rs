use std::fmt::Write;

use tracing::{info, warn};

use crate::eligibility::{Standing, MIN_CGPA};
use crate::models::{Course, RecoveryPlan, Student};

/// Outbound notification sink. Fire-and-forget: a failed send is logged and
/// never rolls back the domain mutation that triggered it.
pub trait Notifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> bool;
}

/// Default sink: records the send in the structured log instead of talking
/// to an SMTP server.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        info!(
            recipient = %to,
            subject = %subject,
            bytes = body.len(),
            "email sent"
        );
        true
    }
}

pub fn dispatch(notifier: &dyn Notifier, to: &str, subject: &str, body: &str) {
    if !notifier.send(to, subject, body) {
        warn!(recipient = %to, subject = %subject, "notification send failed");
    }
}

pub fn recovery_plan_created(
    student: &Student,
    plan: &RecoveryPlan,
    course: &Course,
) -> (String, String) {
    let subject = format!("Course Recovery Plan Created - {}", course.name);

    let mut body = String::new();
    let _ = writeln!(body, "Dear {},", student.full_name());
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "A recovery plan has been created for you for the following course:"
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Course: {} ({})", course.name, course.id);
    let _ = writeln!(body, "Start Date: {}", plan.start_date);
    let _ = writeln!(body, "End Date: {}", plan.end_date);
    let _ = writeln!(body);
    let _ = writeln!(body, "Recommendation:");
    let _ = writeln!(body, "{}", plan.recommendation);
    let _ = writeln!(body);

    if !plan.milestones.is_empty() {
        let _ = writeln!(body, "Milestones:");
        let _ = writeln!(body, "{}", "-".repeat(40));
        for milestone in &plan.milestones {
            let _ = writeln!(body, "{}: {}", milestone.study_week, milestone.task);
        }
        let _ = writeln!(body, "{}", "-".repeat(40));
        let _ = writeln!(body);
    }

    let _ = writeln!(
        body,
        "Please contact your academic advisor if you have any questions."
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Best regards,");
    let _ = write!(body, "Course Recovery System");

    (subject, body)
}

pub fn eligibility_notice(student: &Student, standing: &Standing) -> (String, String) {
    let subject = "Academic Eligibility Status Update".to_string();

    let mut body = String::new();
    let _ = writeln!(body, "Dear {},", student.full_name());
    let _ = writeln!(body);

    if standing.eligible {
        let _ = writeln!(
            body,
            "Congratulations! You are eligible to progress to the next level of study."
        );
    } else {
        let _ = writeln!(
            body,
            "We regret to inform you that you are currently not eligible to progress."
        );
        let _ = writeln!(body);
        let _ = writeln!(body, "Your current CGPA: {:.2}", standing.cgpa);
        let _ = writeln!(body, "Minimum required CGPA: {MIN_CGPA:.1}");
        let _ = writeln!(body);
        let _ = writeln!(
            body,
            "Please contact the Academic Office to discuss your options."
        );
    }

    let _ = writeln!(body);
    let _ = writeln!(body, "Best regards,");
    let _ = write!(body, "Course Recovery System");

    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::{add_milestone, new_plan};
    use chrono::NaiveDate;
    use std::cell::RefCell;

    struct RecordingNotifier {
        sent: RefCell<Vec<(String, String)>>,
        outcome: bool,
    }

    impl Notifier for RecordingNotifier {
        fn send(&self, to: &str, subject: &str, _body: &str) -> bool {
            self.sent
                .borrow_mut()
                .push((to.to_string(), subject.to_string()));
            self.outcome
        }
    }

    fn student() -> Student {
        Student::new("S001", "Avery", "Lee", "avery.lee@uni.edu", "Data Science", "2")
    }

    fn course() -> Course {
        Course {
            id: "CS101".to_string(),
            name: "Intro to Programming".to_string(),
            credits: 3,
            semester: "Semester 1".to_string(),
            instructor: "Dr. Chen".to_string(),
            exam_weight: 60,
            assignment_weight: 40,
            description: String::new(),
        }
    }

    #[test]
    fn plan_email_lists_course_and_milestones() {
        let mut plan = new_plan(
            "S001",
            "CS101",
            "Weekly revision",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 25).unwrap(),
            "officer1",
        );
        add_milestone(&mut plan, "Week 1", "Revise lectures 1-3", "", None);

        let (subject, body) = recovery_plan_created(&student(), &plan, &course());
        assert_eq!(subject, "Course Recovery Plan Created - Intro to Programming");
        assert!(body.contains("Dear Avery Lee,"));
        assert!(body.contains("Course: Intro to Programming (CS101)"));
        assert!(body.contains("Week 1: Revise lectures 1-3"));
    }

    #[test]
    fn eligibility_notice_mentions_cgpa_only_when_ineligible() {
        let eligible = Standing {
            cgpa: 3.1,
            failed_courses: 0,
            eligible: true,
        };
        let (_, body) = eligibility_notice(&student(), &eligible);
        assert!(body.contains("Congratulations"));
        assert!(!body.contains("Minimum required"));

        let ineligible = Standing {
            cgpa: 1.5,
            failed_courses: 4,
            eligible: false,
        };
        let (_, body) = eligibility_notice(&student(), &ineligible);
        assert!(body.contains("not eligible"));
        assert!(body.contains("Your current CGPA: 1.50"));
        assert!(body.contains("Minimum required CGPA: 2.0"));
    }

    #[test]
    fn dispatch_swallows_a_failed_send() {
        let notifier = RecordingNotifier {
            sent: RefCell::new(Vec::new()),
            outcome: false,
        };
        dispatch(&notifier, "avery.lee@uni.edu", "subject", "body");
        assert_eq!(notifier.sent.borrow().len(), 1);
        assert_eq!(notifier.sent.borrow()[0].0, "avery.lee@uni.edu");
    }
}
