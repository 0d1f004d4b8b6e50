use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

use crate::crd::{JobSet, JobSetStatus};

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

pub const REASON_ALL_JOBS_COMPLETED: &str = "AllJobsCompleted";
pub const REASON_FAILED_JOBS: &str = "FailedJobs";
pub const REASON_SUSPENDED_JOBS: &str = "SuspendedJobs";
pub const REASON_RESUME_JOBS: &str = "ResumeJobs";
pub const REASON_STARTUP_IN_PROGRESS: &str = "InOrderStartupPolicyInProgress";
pub const REASON_STARTUP_COMPLETED: &str = "InOrderStartupPolicyCompleted";
pub const REASON_TEMPLATE_ERROR: &str = "InvalidJobTemplate";
pub const REASON_TEMPLATE_VALID: &str = "ValidJobTemplate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSetConditionType {
    Completed,
    Failed,
    Suspended,
    StartupPolicyInProgress,
    StartupPolicyCompleted,
    TemplateError,
}

impl JobSetConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Suspended => "Suspended",
            Self::StartupPolicyInProgress => "StartupPolicyInProgress",
            Self::StartupPolicyCompleted => "StartupPolicyCompleted",
            Self::TemplateError => "TemplateError",
        }
    }

    /// The terminal condition that may not be true at the same time as this one.
    fn opposite_terminal(type_: &str) -> Option<Self> {
        match type_ {
            "Completed" => Some(Self::Failed),
            "Failed" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for JobSetConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies `condition` to the JobSet's condition list and reports whether it changed.
///
/// Conditions that are not `True` are only written when `force` is set. An entry
/// with identical status, reason and message is never rewritten, so the
/// transition timestamp of an unchanged condition is preserved. Completed and
/// Failed are mutually exclusive.
pub fn update_condition(jobset: &mut JobSet, condition: Condition, force: bool) -> bool {
    if condition.type_.is_empty() {
        return false;
    }
    if condition.status != STATUS_TRUE && !force {
        return false;
    }

    let status = jobset.status.get_or_insert_with(JobSetStatus::default);

    if condition.status == STATUS_TRUE {
        if let Some(other) = JobSetConditionType::opposite_terminal(&condition.type_) {
            if is_true(&status.conditions, other) {
                return false;
            }
        }
    }

    match status
        .conditions
        .iter_mut()
        .find(|c| c.type_ == condition.type_)
    {
        Some(existing)
            if existing.status == condition.status
                && existing.reason == condition.reason
                && existing.message == condition.message =>
        {
            false
        }
        Some(existing) => {
            *existing = condition;
            true
        }
        None => {
            status.conditions.push(condition);
            true
        }
    }
}

fn is_true(conditions: &[Condition], type_: JobSetConditionType) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == type_.as_str() && c.status == STATUS_TRUE)
}

pub fn condition_is_true(jobset: &JobSet, type_: JobSetConditionType) -> bool {
    is_true(jobset.conditions(), type_)
}

/// Terminal condition currently set on the JobSet, if any.
pub fn finished(jobset: &JobSet) -> Option<JobSetConditionType> {
    [JobSetConditionType::Completed, JobSetConditionType::Failed]
        .into_iter()
        .find(|t| condition_is_true(jobset, *t))
}

fn condition(
    type_: JobSetConditionType,
    status: &str,
    reason: &str,
    message: impl Into<String>,
    now: DateTime<Utc>,
) -> Condition {
    Condition {
        type_: type_.as_str().to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.into(),
        last_transition_time: Time(now),
        observed_generation: None,
    }
}

pub fn completed(now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::Completed,
        STATUS_TRUE,
        REASON_ALL_JOBS_COMPLETED,
        "jobset completed successfully",
        now,
    )
}

pub fn failed(message: impl Into<String>, now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::Failed,
        STATUS_TRUE,
        REASON_FAILED_JOBS,
        message,
        now,
    )
}

pub fn suspended(now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::Suspended,
        STATUS_TRUE,
        REASON_SUSPENDED_JOBS,
        "jobset is suspended",
        now,
    )
}

pub fn resumed(now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::Suspended,
        STATUS_FALSE,
        REASON_RESUME_JOBS,
        "jobset is resumed",
        now,
    )
}

pub fn startup_in_progress(now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::StartupPolicyInProgress,
        STATUS_TRUE,
        REASON_STARTUP_IN_PROGRESS,
        "in order startup policy is in progress",
        now,
    )
}

pub fn startup_no_longer_in_progress(now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::StartupPolicyInProgress,
        STATUS_FALSE,
        REASON_STARTUP_COMPLETED,
        "in order startup policy has completed",
        now,
    )
}

pub fn startup_completed(now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::StartupPolicyCompleted,
        STATUS_TRUE,
        REASON_STARTUP_COMPLETED,
        "in order startup policy has completed",
        now,
    )
}

pub fn template_error(message: impl Into<String>, now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::TemplateError,
        STATUS_TRUE,
        REASON_TEMPLATE_ERROR,
        message,
        now,
    )
}

pub fn template_valid(now: DateTime<Utc>) -> Condition {
    condition(
        JobSetConditionType::TemplateError,
        STATUS_FALSE,
        REASON_TEMPLATE_VALID,
        "",
        now,
    )
}
