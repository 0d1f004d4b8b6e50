use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;

use crate::crd::{JobSet, ReplicatedJob};
use crate::jobset::children::{indices_in, ChildJobs};
use crate::jobset::conditions::{self, condition_is_true, update_condition, JobSetConditionType};

/// An active Job is started once it is running pods and not held suspended.
fn job_started(job: &Job) -> bool {
    let suspended = job
        .spec
        .as_ref()
        .and_then(|s| s.suspend)
        .unwrap_or(false);
    let status = job.status.as_ref();
    let active = status.and_then(|s| s.active).unwrap_or(0);
    let ready = status.and_then(|s| s.ready).unwrap_or(0);
    !suspended && (active > 0 || ready > 0)
}

/// Whether every index of the group holds a successful or started Job.
pub fn group_started(rjob: &ReplicatedJob, children: &ChildJobs) -> bool {
    let mut started = indices_in(rjob, &children.successful);
    started.extend(indices_in(
        rjob,
        children.active.iter().filter(|job| job_started(job)),
    ));
    started.len() as i64 >= i64::from(rjob.replicas)
}

pub fn all_started(jobset: &JobSet, children: &ChildJobs) -> bool {
    jobset
        .spec
        .replicated_jobs
        .iter()
        .all(|rjob| group_started(rjob, children))
}

/// Groups whose Jobs may be created in this pass.
///
/// Under in-order startup a group is admitted only after every earlier group has
/// started; the first group that has not started is admitted and closes the list.
/// Once startup has completed every group is admitted.
pub fn admitted_replicated_jobs<'a>(
    jobset: &'a JobSet,
    children: &ChildJobs,
) -> Vec<&'a ReplicatedJob> {
    let groups = &jobset.spec.replicated_jobs;
    if !jobset.in_order_startup()
        || condition_is_true(jobset, JobSetConditionType::StartupPolicyCompleted)
    {
        return groups.iter().collect();
    }

    let mut admitted = Vec::new();
    for rjob in groups {
        admitted.push(rjob);
        if !group_started(rjob, children) {
            break;
        }
    }
    admitted
}

/// Records startup progress conditions. Returns whether any condition changed.
pub fn update_startup_conditions(
    jobset: &mut JobSet,
    children: &ChildJobs,
    now: DateTime<Utc>,
) -> bool {
    if !jobset.in_order_startup()
        || condition_is_true(jobset, JobSetConditionType::StartupPolicyCompleted)
    {
        return false;
    }

    if all_started(jobset, children) {
        let completed = update_condition(jobset, conditions::startup_completed(now), true);
        let cleared = update_condition(
            jobset,
            conditions::startup_no_longer_in_progress(now),
            true,
        );
        return completed || cleared;
    }

    update_condition(jobset, conditions::startup_in_progress(now), false)
}
