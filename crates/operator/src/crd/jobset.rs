use k8s_openapi::api::batch::v1::JobTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[kube(
    group = "jobset.x-k8s.io",
    version = "v1alpha2",
    kind = "JobSet",
    plural = "jobsets",
    shortname = "js",
    namespaced,
    status = "JobSetStatus",
    printcolumn = r#"{"name":"Restarts","type":"integer","jsonPath":".status.restarts"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct JobSetSpec {
    /// Groups of identical Jobs, created in this order
    #[serde(default)]
    pub replicated_jobs: Vec<ReplicatedJob>,

    /// Pod network naming options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,

    /// When the JobSet counts as completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_policy: Option<SuccessPolicy>,

    /// How many times the whole JobSet may be restarted after a child failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,

    /// Order in which ReplicatedJobs are started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_policy: Option<StartupPolicy>,

    /// Suspend all child Jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,

    /// Seconds to keep a finished JobSet before it is deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_finished: Option<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedJob {
    /// Group name, unique within the JobSet
    pub name: String,

    /// Template for every Job of the group
    pub template: JobTemplateSpec,

    /// Number of Jobs to run from the template
    #[serde(default = "default_replicas")]
    pub replicas: i32,
}

fn default_replicas() -> i32 {
    1
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
pub struct Network {
    /// Give pods stable hostnames under a shared subdomain
    #[serde(rename = "enableDNSHostnames", skip_serializing_if = "Option::is_none")]
    pub enable_dns_hostnames: Option<bool>,

    /// Subdomain for pod hostnames; defaults to the JobSet name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, JsonSchema, PartialEq, Eq)]
pub enum SuccessOperator {
    /// Every Job of the target groups must succeed
    #[default]
    All,
    /// One Job of the target groups must succeed
    Any,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuccessPolicy {
    #[serde(default)]
    pub operator: SuccessOperator,

    /// Groups the operator applies to; empty means all groups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_replicated_jobs: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FailurePolicy {
    /// Restarts allowed before the JobSet is marked failed
    #[serde(default)]
    pub max_restarts: i32,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, JsonSchema, PartialEq, Eq)]
pub enum StartupPolicyOrder {
    #[default]
    AnyOrder,
    InOrder,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartupPolicy {
    pub startup_policy_order: StartupPolicyOrder,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Restart attempt the current child Jobs belong to
    #[serde(default)]
    pub restarts: i32,

    #[serde(default)]
    pub replicated_jobs_status: Vec<ReplicatedJobStatus>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicatedJobStatus {
    pub name: String,
    pub ready: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub active: i32,
    pub suspended: i32,
}

impl ReplicatedJobStatus {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl JobSet {
    pub fn namespace_or_default(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }

    pub fn is_suspended(&self) -> bool {
        self.spec.suspend.unwrap_or(false)
    }

    pub fn restarts(&self) -> i32 {
        self.status.as_ref().map(|s| s.restarts).unwrap_or(0)
    }

    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    pub fn dns_hostnames_enabled(&self) -> bool {
        self.spec
            .network
            .as_ref()
            .and_then(|n| n.enable_dns_hostnames)
            .unwrap_or(false)
    }

    /// Subdomain shared by all pods when DNS hostnames are enabled.
    pub fn subdomain(&self) -> Option<String> {
        if !self.dns_hostnames_enabled() {
            return None;
        }
        let network = self.spec.network.as_ref()?;
        Some(
            network
                .subdomain
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| self.name_any()),
        )
    }

    pub fn in_order_startup(&self) -> bool {
        matches!(
            self.spec.startup_policy.as_ref().map(|p| p.startup_policy_order),
            Some(StartupPolicyOrder::InOrder)
        )
    }

    pub fn replicated_job(&self, name: &str) -> Option<&ReplicatedJob> {
        self.spec.replicated_jobs.iter().find(|r| r.name == name)
    }
}
