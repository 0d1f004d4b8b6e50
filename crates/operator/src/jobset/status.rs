use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::Job;

use crate::crd::{keys, JobSet, ReplicatedJobStatus};
use crate::jobset::children::ChildJobs;

/// Per-group counters, one entry for every ReplicatedJob, sorted by name.
pub fn calculate_replicated_job_statuses(
    jobset: &JobSet,
    children: &ChildJobs,
) -> Vec<ReplicatedJobStatus> {
    let mut statuses: BTreeMap<&str, ReplicatedJobStatus> = jobset
        .spec
        .replicated_jobs
        .iter()
        .map(|rjob| (rjob.name.as_str(), ReplicatedJobStatus::empty(&rjob.name)))
        .collect();

    for job in &children.active {
        if let Some(status) = group_status(&mut statuses, job) {
            add_active(status, job);
        }
    }
    for job in &children.successful {
        if let Some(status) = group_status(&mut statuses, job) {
            status.succeeded += 1;
        }
    }
    for job in &children.failed {
        if let Some(status) = group_status(&mut statuses, job) {
            status.failed += 1;
        }
    }

    statuses.into_values().collect()
}

fn group_status<'a>(
    statuses: &'a mut BTreeMap<&str, ReplicatedJobStatus>,
    job: &Job,
) -> Option<&'a mut ReplicatedJobStatus> {
    statuses.get_mut(keys::replicated_job_of(job)?)
}

fn add_active(status: &mut ReplicatedJobStatus, job: &Job) {
    let spec = job.spec.as_ref();
    let job_status = job.status.as_ref();

    status.ready += job_status.and_then(|s| s.ready).unwrap_or(0);

    // An active Job counts as succeeded only once it reached its declared completions.
    if let Some(completions) = spec.and_then(|s| s.completions) {
        let succeeded = job_status.and_then(|s| s.succeeded).unwrap_or(0);
        if succeeded >= completions {
            status.succeeded += succeeded;
        }
    }

    if spec.and_then(|s| s.suspend).unwrap_or(false) {
        status.suspended += 1;
    } else {
        status.active += job_status.and_then(|s| s.active).unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobset::testing::*;

    #[test]
    fn groups_without_children_get_zeroed_entries() {
        let js = jobset("js")
            .replicated_job(rjob("workers", 2).build())
            .replicated_job(rjob("driver", 1).build())
            .build();

        let statuses = calculate_replicated_job_statuses(&js, &ChildJobs::default());
        assert_eq!(
            statuses,
            vec![
                ReplicatedJobStatus::empty("driver"),
                ReplicatedJobStatus::empty("workers"),
            ]
        );
    }

    #[test]
    fn ready_sums_and_succeeded_needs_completions() {
        let js = jobset("js").replicated_job(rjob("rjob", 4).build()).build();
        let active = vec![
            job("js-rjob-0")
                .group("js", "rjob")
                .parallelism(5)
                .ready(2)
                .succeeded(3)
                .build(),
            job("js-rjob-1")
                .group("js", "rjob")
                .parallelism(3)
                .completions(2)
                .ready(1)
                .succeeded(1)
                .build(),
            job("js-rjob-2")
                .group("js", "rjob")
                .parallelism(2)
                .completions(3)
                .ready(2)
                .succeeded(1)
                .build(),
            job("js-rjob-3")
                .group("js", "rjob")
                .parallelism(4)
                .completions(5)
                .ready(2)
                .succeeded(1)
                .build(),
        ];
        let children = ChildJobs {
            active,
            ..Default::default()
        };

        let statuses = calculate_replicated_job_statuses(&js, &children);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].ready, 7);
        assert_eq!(statuses[0].succeeded, 0);
    }

    #[test]
    fn active_jobs_reaching_completions_count_as_succeeded() {
        let js = jobset("js").replicated_job(rjob("rjob", 1).build()).build();
        let children = ChildJobs {
            active: vec![job("js-rjob-0")
                .group("js", "rjob")
                .completions(2)
                .succeeded(2)
                .build()],
            ..Default::default()
        };

        let statuses = calculate_replicated_job_statuses(&js, &children);
        assert_eq!(statuses[0].succeeded, 2);
    }

    #[test]
    fn buckets_feed_their_counters() {
        let js = jobset("js")
            .replicated_job(rjob("a", 3).build())
            .replicated_job(rjob("b", 2).build())
            .build();
        let children = ChildJobs {
            active: vec![
                job("js-a-0").group("js", "a").active(2).build(),
                job("js-b-0").group("js", "b").suspend(true).active(1).build(),
            ],
            successful: vec![job("js-a-1").group("js", "a").build()],
            failed: vec![
                job("js-a-2").group("js", "a").build(),
                job("js-b-1").group("js", "b").build(),
            ],
            delete: vec![job("js-b-2").group("js", "b").active(1).build()],
        };

        let statuses = calculate_replicated_job_statuses(&js, &children);
        assert_eq!(
            statuses,
            vec![
                ReplicatedJobStatus {
                    name: "a".into(),
                    ready: 0,
                    succeeded: 1,
                    failed: 1,
                    active: 2,
                    suspended: 0,
                },
                ReplicatedJobStatus {
                    name: "b".into(),
                    ready: 0,
                    succeeded: 0,
                    failed: 1,
                    active: 0,
                    suspended: 1,
                },
            ]
        );
    }

    #[test]
    fn unknown_groups_are_ignored() {
        let js = jobset("js").replicated_job(rjob("a", 1).build()).build();
        let children = ChildJobs {
            failed: vec![
                job("js-gone-0").group("js", "gone").build(),
                job("unlabelled").build(),
            ],
            ..Default::default()
        };

        let statuses = calculate_replicated_job_statuses(&js, &children);
        assert_eq!(statuses, vec![ReplicatedJobStatus::empty("a")]);
    }
}
