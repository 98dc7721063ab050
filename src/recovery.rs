use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::{Milestone, MilestoneStatus, PlanStatus, RecoveryPlan};

fn short_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", uuid[..8].to_uppercase())
}

pub fn new_plan(
    student_id: &str,
    course_id: &str,
    recommendation: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_by: &str,
) -> RecoveryPlan {
    RecoveryPlan {
        id: short_id("RP"),
        student_id: student_id.to_string(),
        course_id: course_id.to_string(),
        recommendation: recommendation.to_string(),
        start_date,
        end_date,
        status: PlanStatus::Active,
        milestones: Vec::new(),
        created_by: created_by.to_string(),
        created_at: Utc::now().date_naive(),
    }
}

/// Append a Pending milestone and return its generated id.
pub fn add_milestone(
    plan: &mut RecoveryPlan,
    study_week: &str,
    task: &str,
    description: &str,
    due_date: Option<NaiveDate>,
) -> String {
    let milestone = Milestone {
        id: short_id("MS"),
        plan_id: plan.id.clone(),
        study_week: study_week.to_string(),
        task: task.to_string(),
        description: description.to_string(),
        due_date,
        status: MilestoneStatus::Pending,
        grade: 0.0,
        feedback: String::new(),
        completed_date: None,
    };
    let id = milestone.id.clone();
    plan.milestones.push(milestone);
    id
}

pub fn remove_milestone(plan: &mut RecoveryPlan, milestone_id: &str) {
    plan.milestones.retain(|m| m.id != milestone_id);
}

/// Mark a milestone Completed with its grade and feedback. When this was the
/// last Pending milestone of an Active plan, the plan transitions to
/// Completed in the same call. Returns whether every milestone is now done.
pub fn grade_milestone(
    plan: &mut RecoveryPlan,
    milestone_id: &str,
    grade: f64,
    feedback: &str,
) -> Result<bool, DomainError> {
    if !(0.0..=100.0).contains(&grade) {
        return Err(DomainError::InvalidArgument(format!(
            "milestone grade {grade} is outside 0-100"
        )));
    }

    let milestone = plan
        .milestones
        .iter_mut()
        .find(|m| m.id == milestone_id)
        .ok_or_else(|| {
            DomainError::NotFound(format!("milestone {milestone_id} in plan {}", plan.id))
        })?;

    milestone.status = MilestoneStatus::Completed;
    milestone.grade = grade;
    milestone.feedback = feedback.to_string();
    milestone.completed_date = Some(Utc::now().date_naive());

    let finished = is_complete(plan);
    if finished && plan.status == PlanStatus::Active {
        plan.status = PlanStatus::Completed;
    }
    Ok(finished)
}

pub fn progress_percentage(plan: &RecoveryPlan) -> f64 {
    if plan.milestones.is_empty() {
        return 0.0;
    }
    let completed = plan
        .milestones
        .iter()
        .filter(|m| m.status == MilestoneStatus::Completed)
        .count();
    completed as f64 * 100.0 / plan.milestones.len() as f64
}

/// All milestones Completed; vacuously true for a plan with none.
pub fn is_complete(plan: &RecoveryPlan) -> bool {
    plan.milestones
        .iter()
        .all(|m| m.status == MilestoneStatus::Completed)
}

/// Manual override: force the plan Completed regardless of milestone state.
pub fn complete(plan: &mut RecoveryPlan) {
    plan.status = PlanStatus::Completed;
}

/// Manual override: cancel the plan regardless of milestone state.
pub fn cancel(plan: &mut RecoveryPlan) {
    plan.status = PlanStatus::Cancelled;
}
