use crate::crd::{JobSet, JobSetStatus, ReplicatedJob, SuccessOperator};
use crate::jobset::children::{find_first_failed_job, indices_in, ChildJobs};

/// What to do about failed children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction {
    /// Tear down every child and recreate them under the next restart attempt.
    Restart { attempt: i32 },
    /// Restarts are exhausted; the JobSet fails.
    Fail { message: String },
}

pub fn max_restarts(jobset: &JobSet) -> i32 {
    jobset
        .spec
        .failure_policy
        .as_ref()
        .map(|p| p.max_restarts)
        .unwrap_or(0)
}

/// Decides how to react to failed children, or `None` when nothing failed.
pub fn failure_action(jobset: &JobSet, children: &ChildJobs) -> Option<FailureAction> {
    if children.failed.is_empty() {
        return None;
    }

    let restarts = jobset.restarts();
    if restarts < max_restarts(jobset) {
        return Some(FailureAction::Restart {
            attempt: restarts + 1,
        });
    }

    let message = match find_first_failed_job(&children.failed)
        .and_then(|job| job.metadata.name.as_deref())
    {
        Some(name) => format!("job {} failed", name),
        None => "child jobs failed".to_string(),
    };
    Some(FailureAction::Fail { message })
}

/// Moves the JobSet to the given restart attempt.
pub fn record_restart(jobset: &mut JobSet, attempt: i32) {
    jobset
        .status
        .get_or_insert_with(JobSetStatus::default)
        .restarts = attempt;
}

fn target_groups(jobset: &JobSet) -> Vec<&ReplicatedJob> {
    let targets = jobset
        .spec
        .success_policy
        .as_ref()
        .map(|p| p.target_replicated_jobs.as_slice())
        .unwrap_or_default();
    jobset
        .spec
        .replicated_jobs
        .iter()
        .filter(|rjob| targets.is_empty() || targets.contains(&rjob.name))
        .collect()
}

/// Number of distinct in-range indices of `rjob` whose Job succeeded.
fn successful_in(rjob: &ReplicatedJob, children: &ChildJobs) -> usize {
    indices_in(rjob, &children.successful).len()
}

/// Whether the success policy considers the JobSet completed.
pub fn success_satisfied(jobset: &JobSet, children: &ChildJobs) -> bool {
    let groups = target_groups(jobset);
    if groups.is_empty() {
        return false;
    }
    let operator = jobset
        .spec
        .success_policy
        .as_ref()
        .map(|p| p.operator)
        .unwrap_or_default();

    match operator {
        SuccessOperator::All => groups
            .iter()
            .all(|rjob| successful_in(rjob, children) as i64 >= i64::from(rjob.replicas)),
        SuccessOperator::Any => groups.iter().any(|rjob| successful_in(rjob, children) > 0),
    }
}
