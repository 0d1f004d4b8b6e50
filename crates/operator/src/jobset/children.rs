use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;
use tracing::debug;

use crate::crd::{keys, JobSet, ReplicatedJob};

/// Terminal state of a child Job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFinish {
    Complete,
    Failed,
}

/// Returns the terminal condition of a Job, if it has one.
///
/// Only `Complete` and `Failed` with status `True` are terminal; `Suspended` and
/// `FailureTarget` are not.
pub fn job_finished(job: &Job) -> Option<JobFinish> {
    job.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .filter(|c| c.status == "True")
        .find_map(|c| match c.type_.as_str() {
            "Complete" => Some(JobFinish::Complete),
            "Failed" => Some(JobFinish::Failed),
            _ => None,
        })
}

/// Children of one JobSet, split by lifecycle state. Rebuilt on every pass.
#[derive(Debug, Clone, Default)]
pub struct ChildJobs {
    pub active: Vec<Job>,
    pub successful: Vec<Job>,
    pub failed: Vec<Job>,
    pub delete: Vec<Job>,
}

impl ChildJobs {
    pub fn classify(jobset: &JobSet, jobs: Vec<Job>) -> Self {
        let restarts = jobset.restarts();
        let mut children = ChildJobs::default();

        for job in jobs {
            if job.metadata.deletion_timestamp.is_some() {
                children.delete.push(job);
                continue;
            }
            // Leftovers from an earlier restart attempt are torn down.
            if keys::restart_attempt_of(&job) < restarts {
                debug!(
                    "Job {} belongs to an earlier restart attempt",
                    job.metadata.name.as_deref().unwrap_or_default()
                );
                children.delete.push(job);
                continue;
            }
            // Lowering replicas leaves Jobs behind whose index no longer exists.
            if out_of_range(jobset, &job) {
                debug!(
                    "Job {} is beyond the replicas of its group",
                    job.metadata.name.as_deref().unwrap_or_default()
                );
                children.delete.push(job);
                continue;
            }
            match job_finished(&job) {
                Some(JobFinish::Complete) => children.successful.push(job),
                Some(JobFinish::Failed) => children.failed.push(job),
                None => children.active.push(job),
            }
        }

        children
    }

    /// Every child regardless of bucket.
    pub fn all(&self) -> impl Iterator<Item = &Job> {
        self.active
            .iter()
            .chain(&self.successful)
            .chain(&self.failed)
            .chain(&self.delete)
    }
}

fn out_of_range(jobset: &JobSet, job: &Job) -> bool {
    let Some(rjob) = keys::replicated_job_of(job).and_then(|name| jobset.replicated_job(name))
    else {
        return false;
    };
    matches!(keys::job_index_of(job), Some(index) if index < 0 || index >= rjob.replicas)
}

/// Distinct indices in `[0, replicas)` of `rjob` held by the given Jobs.
pub fn indices_in<'a>(
    rjob: &ReplicatedJob,
    jobs: impl IntoIterator<Item = &'a Job>,
) -> BTreeSet<i32> {
    jobs.into_iter()
        .filter(|job| keys::replicated_job_of(job) == Some(rjob.name.as_str()))
        .filter_map(keys::job_index_of)
        .filter(|index| (0..rjob.replicas).contains(index))
        .collect()
}

fn failure_time(job: &Job) -> Option<DateTime<Utc>> {
    job.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == "Failed" && c.status == "True")
        .and_then(|c| c.last_transition_time.as_ref())
        .map(|t| t.0)
}

/// The failed Job with the earliest failure timestamp. Ties keep input order.
pub fn find_first_failed_job(failed: &[Job]) -> Option<&Job> {
    let mut first: Option<(&Job, DateTime<Utc>)> = None;
    for job in failed {
        let Some(at) = failure_time(job) else {
            continue;
        };
        match first {
            Some((_, earliest)) if at >= earliest => {}
            _ => first = Some((job, at)),
        }
    }
    first.map(|(job, _)| job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobset::testing::*;
    use chrono::Duration;

    #[test]
    fn finished_only_for_true_terminal_conditions() {
        assert_eq!(
            job_finished(&job("a").condition("Complete", "True").build()),
            Some(JobFinish::Complete)
        );
        assert_eq!(
            job_finished(&job("a").condition("Failed", "True").build()),
            Some(JobFinish::Failed)
        );
        assert_eq!(job_finished(&job("a").condition("", "True").build()), None);
        assert_eq!(
            job_finished(&job("a").condition("Suspended", "True").build()),
            None
        );
        assert_eq!(
            job_finished(&job("a").condition("FailureTarget", "True").build()),
            None
        );
        assert_eq!(
            job_finished(&job("a").condition("Complete", "False").build()),
            None
        );
    }

    #[test]
    fn classify_places_each_job_in_one_bucket() {
        let js = jobset("js").build();
        let jobs = vec![
            job("active").build(),
            job("done").condition("Complete", "True").build(),
            job("broken").condition("Failed", "True").build(),
            job("going")
                .condition("Complete", "True")
                .deleting()
                .build(),
        ];

        let children = ChildJobs::classify(&js, jobs);
        assert_eq!(names(&children.active), vec!["active"]);
        assert_eq!(names(&children.successful), vec!["done"]);
        assert_eq!(names(&children.failed), vec!["broken"]);
        assert_eq!(names(&children.delete), vec!["going"]);
        assert_eq!(children.all().count(), 4);
    }

    #[test]
    fn stale_restart_attempts_are_deleted() {
        let js = jobset("js").restarts(1).build();
        let jobs = vec![
            job("old").restart_attempt(0).build(),
            job("new").restart_attempt(1).build(),
        ];

        let children = ChildJobs::classify(&js, jobs);
        assert_eq!(names(&children.delete), vec!["old"]);
        assert_eq!(names(&children.active), vec!["new"]);
    }

    #[test]
    fn jobs_beyond_lowered_replicas_are_deleted() {
        let js = jobset("js").replicated_job(rjob("workers", 1).build()).build();
        let jobs = vec![
            job("js-workers-0").group("js", "workers").build(),
            job("js-workers-1")
                .group("js", "workers")
                .condition("Complete", "True")
                .build(),
        ];

        let children = ChildJobs::classify(&js, jobs);
        assert_eq!(names(&children.active), vec!["js-workers-0"]);
        assert!(children.successful.is_empty());
        assert_eq!(names(&children.delete), vec!["js-workers-1"]);
    }

    #[test]
    fn indices_are_distinct_and_in_range() {
        let workers = rjob("workers", 2).build();
        let jobs = vec![
            job("js-workers-0").group("js", "workers").build(),
            job("js-workers-1").group("js", "workers").build(),
            job("js-workers-5").group("js", "workers").build(),
            job("js-driver-0").group("js", "driver").build(),
            job("unlabelled").build(),
        ];
        assert_eq!(
            indices_in(&workers, &jobs).into_iter().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn first_failed_job_is_the_earliest() {
        let now = Utc::now();
        assert!(find_first_failed_job(&[]).is_none());

        let single = vec![job("job1").failed_at(now - Duration::hours(1)).build()];
        assert_eq!(name(find_first_failed_job(&single)), Some("job1"));

        let many = vec![
            job("job1").failed_at(now - Duration::hours(3)).build(),
            job("job2").failed_at(now - Duration::hours(5)).build(),
        ];
        assert_eq!(name(find_first_failed_job(&many)), Some("job2"));

        let tied = vec![
            job("job1").failed_at(now).build(),
            job("job2").failed_at(now).build(),
        ];
        assert_eq!(name(find_first_failed_job(&tied)), Some("job1"));

        let unconditioned = vec![job("job1").build(), job("job2").build()];
        assert!(find_first_failed_job(&unconditioned).is_none());
    }

    fn name(job: Option<&Job>) -> Option<&str> {
        job.and_then(|j| j.metadata.name.as_deref())
    }
}
