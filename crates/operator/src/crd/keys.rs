use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::Job;
use sha2::{Digest, Sha256};

pub const JOBSET_NAME_KEY: &str = "jobset.sigs.k8s.io/jobset-name";
pub const REPLICATED_JOB_NAME_KEY: &str = "jobset.sigs.k8s.io/replicatedjob-name";
pub const REPLICATED_JOB_REPLICAS_KEY: &str = "jobset.sigs.k8s.io/replicatedjob-replicas";
pub const JOB_INDEX_KEY: &str = "jobset.sigs.k8s.io/job-index";
pub const RESTART_ATTEMPT_KEY: &str = "jobset.sigs.k8s.io/restart-attempt";
pub const JOB_KEY: &str = "jobset.sigs.k8s.io/job-key";

pub const EXCLUSIVE_TOPOLOGY_KEY: &str = "alpha.jobset.sigs.k8s.io/exclusive-topology";
pub const NODE_SELECTOR_STRATEGY_KEY: &str = "alpha.jobset.sigs.k8s.io/node-selector";
pub const NAMESPACED_JOB_KEY: &str = "alpha.jobset.sigs.k8s.io/namespaced-job";
pub const NO_SCHEDULE_TAINT_KEY: &str = "alpha.jobset.sigs.k8s.io/no-schedule";

/// Hex digest of `namespace/name`, short enough to be a label value.
pub fn job_hash_key(namespace: &str, job_name: &str) -> String {
    let digest = Sha256::digest(format!("{}/{}", namespace, job_name).as_bytes());
    digest[..20].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Identity labels stamped on every child Job and its pods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub jobset_name: String,
    pub replicated_job_name: String,
    pub replicas: i32,
    pub job_index: i32,
    pub restart_attempt: i32,
    pub job_key: String,
}

impl JobIdentity {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (JOBSET_NAME_KEY.to_string(), self.jobset_name.clone()),
            (
                REPLICATED_JOB_NAME_KEY.to_string(),
                self.replicated_job_name.clone(),
            ),
            (
                REPLICATED_JOB_REPLICAS_KEY.to_string(),
                self.replicas.to_string(),
            ),
            (JOB_INDEX_KEY.to_string(), self.job_index.to_string()),
            (
                RESTART_ATTEMPT_KEY.to_string(),
                self.restart_attempt.to_string(),
            ),
            (JOB_KEY.to_string(), self.job_key.clone()),
        ])
    }
}

fn job_label<'a>(job: &'a Job, key: &str) -> Option<&'a str> {
    job.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
}

/// ReplicatedJob a child belongs to, read from its labels.
pub fn replicated_job_of(job: &Job) -> Option<&str> {
    job_label(job, REPLICATED_JOB_NAME_KEY)
}

/// Index of a child within its ReplicatedJob, if the label is present and numeric.
pub fn job_index_of(job: &Job) -> Option<i32> {
    job_label(job, JOB_INDEX_KEY).and_then(|v| v.parse().ok())
}

/// Restart attempt a child was created under. Unlabelled children count as attempt 0.
pub fn restart_attempt_of(job: &Job) -> i32 {
    job_label(job, RESTART_ATTEMPT_KEY)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Exclusive placement settings carried as annotations on a JobSet or a Job template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementAnnotations {
    pub topology_key: Option<String>,
    pub node_selector_strategy: Option<bool>,
}

impl PlacementAnnotations {
    pub fn from_map(map: Option<&BTreeMap<String, String>>) -> Self {
        let Some(map) = map else {
            return Self::default();
        };
        Self {
            topology_key: map
                .get(EXCLUSIVE_TOPOLOGY_KEY)
                .filter(|v| !v.is_empty())
                .cloned(),
            node_selector_strategy: map
                .get(NODE_SELECTOR_STRATEGY_KEY)
                .map(|v| v.eq_ignore_ascii_case("true")),
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(topology) = &self.topology_key {
            map.insert(EXCLUSIVE_TOPOLOGY_KEY.to_string(), topology.clone());
            if self.node_selector_strategy == Some(true) {
                map.insert(NODE_SELECTOR_STRATEGY_KEY.to_string(), "true".to_string());
            }
        }
        map
    }
}
