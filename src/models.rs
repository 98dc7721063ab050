use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub major: String,
    pub year: String,
    pub program: String,
    pub enrolled: bool,
}

impl Student {
    pub fn new(
        id: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        major: &str,
        year: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            major: major.to_string(),
            year: year.to_string(),
            program: format!("Bachelor of {major}"),
            enrolled: true,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub credits: i32,
    pub semester: String,
    pub instructor: String,
    pub exam_weight: i32,
    pub assignment_weight: i32,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    InProgress,
    Passed,
    Failed,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::InProgress => write!(f, "In Progress"),
            AttemptStatus::Passed => write!(f, "Passed"),
            AttemptStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// One enrolment of a student in a course for a (semester, year). Rows live
/// in the flat attempt collection; course name and credits are joined in at
/// fetch time for display and credit weighting, never stored twice.
#[derive(Debug, Clone)]
pub struct CourseAttempt {
    pub id: Uuid,
    pub student_id: String,
    pub course_id: String,
    pub course_name: String,
    pub credits: i32,
    pub semester: String,
    pub year: i32,
    pub attempt_number: i32,
    pub grade: Option<String>,
    pub exam_score: f64,
    pub assignment_score: f64,
}

impl CourseAttempt {
    /// The assigned grade, or `None` while the attempt is still ungraded.
    /// An empty string counts as ungraded.
    pub fn graded(&self) -> Option<&str> {
        self.grade.as_deref().filter(|g| !g.is_empty())
    }

    pub fn is_failed(&self) -> bool {
        self.graded().is_some_and(|g| g.eq_ignore_ascii_case("F"))
    }

    pub fn is_passed(&self) -> bool {
        self.graded().is_some_and(|g| !g.eq_ignore_ascii_case("F"))
    }

    pub fn status(&self) -> AttemptStatus {
        match self.graded() {
            None => AttemptStatus::InProgress,
            Some(g) if g.eq_ignore_ascii_case("F") => AttemptStatus::Failed,
            Some(_) => AttemptStatus::Passed,
        }
    }

    pub fn exam_failed(&self) -> bool {
        self.exam_score < 50.0
    }

    pub fn assignment_failed(&self) -> bool {
        self.assignment_score < 50.0
    }

    pub fn failed_component(&self) -> &'static str {
        match (self.exam_failed(), self.assignment_failed()) {
            (true, true) => "Exam & Assignment",
            (true, false) => "Exam",
            (false, true) => "Assignment",
            (false, false) => "None",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Active,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Active => "Active",
            PlanStatus::Completed => "Completed",
            PlanStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(PlanStatus::Active),
            "Completed" => Ok(PlanStatus::Completed),
            "Cancelled" => Ok(PlanStatus::Cancelled),
            other => Err(DomainError::InvalidArgument(format!(
                "unknown plan status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneStatus {
    Pending,
    Completed,
}

impl MilestoneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "Pending",
            MilestoneStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MilestoneStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(MilestoneStatus::Pending),
            "Completed" => Ok(MilestoneStatus::Completed),
            other => Err(DomainError::InvalidArgument(format!(
                "unknown milestone status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Milestone {
    pub id: String,
    pub plan_id: String,
    pub study_week: String,
    pub task: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub status: MilestoneStatus,
    pub grade: f64,
    pub feedback: String,
    pub completed_date: Option<NaiveDate>,
}

impl Milestone {
    pub fn is_overdue(&self) -> bool {
        self.due_date.is_some_and(|due| {
            Utc::now().date_naive() > due && self.status != MilestoneStatus::Completed
        })
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryPlan {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub recommendation: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PlanStatus,
    pub milestones: Vec<Milestone>,
    pub created_by: String,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    AcademicOfficer,
    CourseAdministrator,
}

impl Role {
    /// Capability set per role, checked by plain membership.
    pub fn permissions(self) -> &'static [&'static str] {
        match self {
            Role::AcademicOfficer => &[
                "VIEW_STUDENTS",
                "VIEW_COURSES",
                "VIEW_GRADES",
                "VIEW_ELIGIBILITY",
                "MANAGE_ENROLMENT",
                "VIEW_RECOVERY_PLANS",
                "CREATE_RECOVERY_PLAN",
                "UPDATE_RECOVERY_PLAN",
                "MONITOR_PROGRESS",
                "ENTER_GRADES",
                "GENERATE_REPORTS",
                "SEND_NOTIFICATIONS",
            ],
            Role::CourseAdministrator => &[
                "VIEW_STUDENTS",
                "VIEW_COURSES",
                "UPDATE_COURSES",
                "VIEW_GRADES",
                "UPDATE_GRADES",
                "VIEW_ELIGIBILITY",
                "VIEW_RECOVERY_PLANS",
                "CREATE_RECOVERY_PLAN",
                "UPDATE_RECOVERY_PLAN",
                "DELETE_RECOVERY_PLAN",
                "MONITOR_PROGRESS",
                "ENTER_GRADES",
                "GENERATE_REPORTS",
                "SEND_NOTIFICATIONS",
            ],
        }
    }

    pub fn can(self, permission: &str) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::AcademicOfficer => write!(f, "Academic Officer"),
            Role::CourseAdministrator => write!(f, "Course Administrator"),
        }
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "officer" | "academic-officer" => Ok(Role::AcademicOfficer),
            "admin" | "course-administrator" => Ok(Role::CourseAdministrator),
            other => Err(DomainError::InvalidArgument(format!(
                "unknown role '{other}', expected 'officer' or 'admin'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(grade: Option<&str>) -> CourseAttempt {
        CourseAttempt {
            id: Uuid::new_v4(),
            student_id: "S001".to_string(),
            course_id: "CS101".to_string(),
            course_name: "Intro to Programming".to_string(),
            credits: 3,
            semester: "Semester 1".to_string(),
            year: 2026,
            attempt_number: 1,
            grade: grade.map(str::to_string),
            exam_score: 0.0,
            assignment_score: 0.0,
        }
    }

    #[test]
    fn status_derives_from_grade() {
        assert_eq!(attempt(None).status(), AttemptStatus::InProgress);
        assert_eq!(attempt(Some("")).status(), AttemptStatus::InProgress);
        assert_eq!(attempt(Some("B+")).status(), AttemptStatus::Passed);
        assert_eq!(attempt(Some("F")).status(), AttemptStatus::Failed);
        assert_eq!(attempt(Some("f")).status(), AttemptStatus::Failed);
    }

    #[test]
    fn failed_and_passed_require_a_grade() {
        let ungraded = attempt(None);
        assert!(!ungraded.is_failed());
        assert!(!ungraded.is_passed());

        let failed = attempt(Some("f"));
        assert!(failed.is_failed());
        assert!(!failed.is_passed());
    }

    #[test]
    fn failed_component_names_the_weak_part() {
        let mut a = attempt(Some("F"));
        a.exam_score = 40.0;
        a.assignment_score = 65.0;
        assert_eq!(a.failed_component(), "Exam");

        a.assignment_score = 30.0;
        assert_eq!(a.failed_component(), "Exam & Assignment");

        a.exam_score = 80.0;
        assert_eq!(a.failed_component(), "Assignment");

        a.assignment_score = 50.0;
        assert_eq!(a.failed_component(), "None");
    }

    #[test]
    fn program_is_derived_from_major() {
        let student = Student::new("S001", "Avery", "Lee", "avery@uni.edu", "Data Science", "2");
        assert_eq!(student.program, "Bachelor of Data Science");
        assert_eq!(student.full_name(), "Avery Lee");
        assert!(student.enrolled);
    }

    #[test]
    fn plan_status_round_trips_through_text() {
        for status in [
            PlanStatus::Active,
            PlanStatus::Completed,
            PlanStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<PlanStatus>().unwrap(), status);
        }
        assert!("Paused".parse::<PlanStatus>().is_err());
    }

    #[test]
    fn roles_are_plain_permission_sets() {
        let officer = Role::AcademicOfficer;
        assert!(officer.can("MANAGE_ENROLMENT"));
        assert!(officer.can("CREATE_RECOVERY_PLAN"));
        assert!(!officer.can("DELETE_RECOVERY_PLAN"));

        let admin = Role::CourseAdministrator;
        assert!(admin.can("DELETE_RECOVERY_PLAN"));
        assert!(!admin.can("MANAGE_ENROLMENT"));
    }
}
