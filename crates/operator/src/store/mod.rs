mod kube_store;

pub use kube_store::KubeStore;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
#[cfg(test)]
use mockall::automock;

use crate::crd::JobSet;
use crate::Result;

/// Result of asking the API server to create a child Job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A Job with the same name already exists; the watch cache was behind.
    AlreadyExists,
}

/// Reads and writes the objects a JobSet reconcile pass touches.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait JobSetStore: Send + Sync {
    /// Fresh copy of the JobSet, or `None` when it is gone.
    async fn get_jobset(&self, namespace: &str, name: &str) -> Result<Option<JobSet>>;

    /// Jobs controlled by the JobSet.
    async fn list_child_jobs(&self, jobset: &JobSet) -> Result<Vec<Job>>;

    async fn create_job(&self, job: &Job) -> Result<CreateOutcome>;

    /// Deletes a child Job. A Job that is already gone is not an error.
    async fn delete_job(&self, job: &Job) -> Result<()>;

    async fn set_job_suspend(&self, job: &Job, suspend: bool) -> Result<()>;

    /// Writes the JobSet status, guarded by the resource version it was read at.
    async fn update_status(&self, jobset: &JobSet) -> Result<()>;

    /// Deletes the JobSet with foreground propagation.
    async fn delete_jobset(&self, jobset: &JobSet) -> Result<()>;
}

/// Provides stable network names for the pods of a JobSet.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkIdentity: Send + Sync {
    /// Makes sure the headless Service backing the JobSet subdomain exists.
    async fn ensure_network_identity(&self, jobset: &JobSet) -> Result<()>;
}
