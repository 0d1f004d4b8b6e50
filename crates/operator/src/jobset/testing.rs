//! Builders for JobSets and Jobs used by the unit tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobSpec, JobStatus, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector, ObjectMeta, Time};

use crate::crd::{
    keys, FailurePolicy, JobSet, JobSetSpec, JobSetStatus, Network, ReplicatedJob, StartupPolicy,
    StartupPolicyOrder, SuccessOperator, SuccessPolicy,
};

pub struct JobSetBuilder {
    js: JobSet,
}

pub fn jobset(name: &str) -> JobSetBuilder {
    let mut js = JobSet::new(name, JobSetSpec::default());
    js.metadata.namespace = Some("default".to_string());
    JobSetBuilder { js }
}

impl JobSetBuilder {
    pub fn replicated_job(mut self, rjob: ReplicatedJob) -> Self {
        self.js.spec.replicated_jobs.push(rjob);
        self
    }

    pub fn suspend(mut self, suspend: bool) -> Self {
        self.js.spec.suspend = Some(suspend);
        self
    }

    pub fn uid(mut self, uid: &str) -> Self {
        self.js.metadata.uid = Some(uid.to_string());
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.js
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn ttl(mut self, seconds: i32) -> Self {
        self.js.spec.ttl_seconds_after_finished = Some(seconds);
        self
    }

    pub fn in_order(mut self) -> Self {
        self.js.spec.startup_policy = Some(StartupPolicy {
            startup_policy_order: StartupPolicyOrder::InOrder,
        });
        self
    }

    pub fn dns_hostnames(mut self, subdomain: &str) -> Self {
        self.js.spec.network = Some(Network {
            enable_dns_hostnames: Some(true),
            subdomain: Some(subdomain.to_string()),
        });
        self
    }

    pub fn max_restarts(mut self, max_restarts: i32) -> Self {
        self.js.spec.failure_policy = Some(FailurePolicy { max_restarts });
        self
    }

    pub fn success_policy(mut self, operator: SuccessOperator, targets: &[&str]) -> Self {
        self.js.spec.success_policy = Some(SuccessPolicy {
            operator,
            target_replicated_jobs: targets.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn restarts(mut self, restarts: i32) -> Self {
        self.status().restarts = restarts;
        self
    }

    pub fn condition(mut self, type_: &str, status: &str, reason: &str, at: DateTime<Utc>) -> Self {
        self.status().conditions.push(Condition {
            type_: type_.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
            message: String::new(),
            last_transition_time: Time(at),
            observed_generation: None,
        });
        self
    }

    fn status(&mut self) -> &mut JobSetStatus {
        self.js.status.get_or_insert_with(JobSetStatus::default)
    }

    pub fn build(self) -> JobSet {
        self.js
    }
}

pub struct ReplicatedJobBuilder {
    rjob: ReplicatedJob,
}

pub fn rjob(name: &str, replicas: i32) -> ReplicatedJobBuilder {
    ReplicatedJobBuilder {
        rjob: ReplicatedJob {
            name: name.to_string(),
            replicas,
            template: JobTemplateSpec {
                metadata: None,
                spec: Some(JobSpec {
                    template: PodTemplateSpec {
                        metadata: None,
                        spec: Some(PodSpec {
                            containers: vec![Container {
                                name: "main".to_string(),
                                image: Some("busybox".to_string()),
                                ..Default::default()
                            }],
                            ..Default::default()
                        }),
                    },
                    ..Default::default()
                }),
            },
        },
    }
}

impl ReplicatedJobBuilder {
    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.rjob
            .template
            .metadata
            .get_or_insert_with(ObjectMeta::default)
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn pod_label(mut self, key: &str, value: &str) -> Self {
        self.job_spec()
            .template
            .metadata
            .get_or_insert_with(ObjectMeta::default)
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn selector(mut self, selector: LabelSelector) -> Self {
        self.job_spec().selector = Some(selector);
        self
    }

    fn job_spec(&mut self) -> &mut JobSpec {
        self.rjob.template.spec.get_or_insert_with(JobSpec::default)
    }

    pub fn build(self) -> ReplicatedJob {
        self.rjob
    }
}

pub struct JobBuilder {
    job: Job,
}

pub fn job(name: &str) -> JobBuilder {
    JobBuilder {
        job: Job {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(JobSpec::default()),
            status: Some(JobStatus::default()),
        },
    }
}

impl JobBuilder {
    fn label(mut self, key: &str, value: String) -> Self {
        self.job
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value);
        self
    }

    /// Labels the Job as a child of `group`, taking its index from a numeric name suffix.
    pub fn group(self, jobset: &str, group: &str) -> Self {
        let index = self
            .job
            .metadata
            .name
            .as_deref()
            .and_then(|name| name.rsplit('-').next())
            .filter(|suffix| suffix.parse::<i32>().is_ok())
            .map(str::to_string);
        let builder = self
            .label(keys::JOBSET_NAME_KEY, jobset.to_string())
            .label(keys::REPLICATED_JOB_NAME_KEY, group.to_string());
        match index {
            Some(index) => builder.label(keys::JOB_INDEX_KEY, index),
            None => builder,
        }
    }

    pub fn restart_attempt(self, attempt: i32) -> Self {
        self.label(keys::RESTART_ATTEMPT_KEY, attempt.to_string())
    }

    pub fn condition(mut self, type_: &str, status: &str) -> Self {
        self.job_status()
            .conditions
            .get_or_insert_with(Vec::new)
            .push(JobCondition {
                type_: type_.to_string(),
                status: status.to_string(),
                ..Default::default()
            });
        self
    }

    pub fn failed_at(mut self, at: DateTime<Utc>) -> Self {
        self.job_status()
            .conditions
            .get_or_insert_with(Vec::new)
            .push(JobCondition {
                type_: "Failed".to_string(),
                status: "True".to_string(),
                last_transition_time: Some(Time(at)),
                ..Default::default()
            });
        self
    }

    pub fn deleting(mut self) -> Self {
        self.job.metadata.deletion_timestamp = Some(Time(Utc::now()));
        self
    }

    pub fn parallelism(mut self, parallelism: i32) -> Self {
        self.job_spec().parallelism = Some(parallelism);
        self
    }

    pub fn completions(mut self, completions: i32) -> Self {
        self.job_spec().completions = Some(completions);
        self
    }

    pub fn suspend(mut self, suspend: bool) -> Self {
        self.job_spec().suspend = Some(suspend);
        self
    }

    pub fn ready(mut self, ready: i32) -> Self {
        self.job_status().ready = Some(ready);
        self
    }

    pub fn succeeded(mut self, succeeded: i32) -> Self {
        self.job_status().succeeded = Some(succeeded);
        self
    }

    pub fn active(mut self, active: i32) -> Self {
        self.job_status().active = Some(active);
        self
    }

    fn job_spec(&mut self) -> &mut JobSpec {
        self.job.spec.get_or_insert_with(JobSpec::default)
    }

    fn job_status(&mut self) -> &mut JobStatus {
        self.job.status.get_or_insert_with(JobStatus::default)
    }

    pub fn build(self) -> Job {
        self.job
    }
}

pub fn names(jobs: &[Job]) -> Vec<&str> {
    jobs.iter()
        .filter_map(|j| j.metadata.name.as_deref())
        .collect()
}
