use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Client, Resource, ResourceExt,
};
use serde_json::json;
use tracing::{debug, info};

use super::{CreateOutcome, JobSetStore, NetworkIdentity};
use crate::crd::{keys::JOBSET_NAME_KEY, JobSet};
use crate::{Error, Result};

/// Store backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn jobsets(&self, namespace: &str) -> Api<JobSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn job_namespace(job: &Job) -> String {
    job.namespace().unwrap_or_else(|| "default".to_string())
}

fn is_controlled_by(job: &Job, uid: &str) -> bool {
    job.owner_references()
        .iter()
        .any(|owner| owner.uid == uid && owner.controller == Some(true))
}

#[async_trait]
impl JobSetStore for KubeStore {
    async fn get_jobset(&self, namespace: &str, name: &str) -> Result<Option<JobSet>> {
        self.jobsets(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))
    }

    async fn list_child_jobs(&self, jobset: &JobSet) -> Result<Vec<Job>> {
        let namespace = jobset.namespace_or_default();
        let params = ListParams::default()
            .labels(&format!("{}={}", JOBSET_NAME_KEY, jobset.name_any()));
        let jobs = self
            .jobs(&namespace)
            .list(&params)
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;

        // The label alone could match Jobs of an older JobSet with the same name.
        let children = match jobset.uid() {
            Some(uid) => jobs
                .items
                .into_iter()
                .filter(|job| is_controlled_by(job, &uid))
                .collect(),
            None => jobs.items,
        };
        Ok(children)
    }

    async fn create_job(&self, job: &Job) -> Result<CreateOutcome> {
        let name = job.name_any();
        let namespace = job_namespace(job);
        match self.jobs(&namespace).create(&PostParams::default(), job).await {
            Ok(_) => {
                debug!("Created Job {}/{}", namespace, name);
                Ok(CreateOutcome::Created)
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                debug!("Job {}/{} already exists", namespace, name);
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(Error::Kubernetes(e.to_string())),
        }
    }

    async fn delete_job(&self, job: &Job) -> Result<()> {
        let name = job.name_any();
        let namespace = job_namespace(job);
        match self
            .jobs(&namespace)
            .delete(&name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(Error::Kubernetes(e.to_string())),
        }
    }

    async fn set_job_suspend(&self, job: &Job, suspend: bool) -> Result<()> {
        let patch = json!({ "spec": { "suspend": suspend } });
        self.jobs(&job_namespace(job))
            .patch(&job.name_any(), &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| Error::Kubernetes(e.to_string()))?;
        Ok(())
    }

    async fn update_status(&self, jobset: &JobSet) -> Result<()> {
        let name = jobset.name_any();
        let namespace = jobset.namespace_or_default();
        let mut patch = json!({ "status": jobset.status });
        // A stale resourceVersion makes the API server answer 409.
        if let Some(version) = jobset.resource_version() {
            patch["metadata"] = json!({ "resourceVersion": version });
        }

        match self
            .jobsets(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(Error::Conflict(format!(
                "JobSet {}/{} changed since it was read",
                namespace, name
            ))),
            Err(e) => Err(Error::Kubernetes(e.to_string())),
        }
    }

    async fn delete_jobset(&self, jobset: &JobSet) -> Result<()> {
        let name = jobset.name_any();
        let namespace = jobset.namespace_or_default();
        match self
            .jobsets(&namespace)
            .delete(&name, &DeleteParams::foreground())
            .await
        {
            Ok(_) => {
                info!("Deleted JobSet {}/{}", namespace, name);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(Error::Kubernetes(e.to_string())),
        }
    }
}

#[async_trait]
impl NetworkIdentity for KubeStore {
    async fn ensure_network_identity(&self, jobset: &JobSet) -> Result<()> {
        let Some(subdomain) = jobset.subdomain() else {
            return Ok(());
        };
        let namespace = jobset.namespace_or_default();

        let service = Service {
            metadata: ObjectMeta {
                name: Some(subdomain.clone()),
                namespace: Some(namespace.clone()),
                owner_references: jobset.controller_owner_ref(&()).map(|owner| vec![owner]),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("None".to_string()),
                selector: Some(BTreeMap::from([(
                    JOBSET_NAME_KEY.to_string(),
                    jobset.name_any(),
                )])),
                publish_not_ready_addresses: Some(true),
                ..Default::default()
            }),
            status: None,
        };

        let services: Api<Service> = Api::namespaced(self.client.clone(), &namespace);
        match services.create(&PostParams::default(), &service).await {
            Ok(_) => {
                info!("Created headless Service {}/{}", namespace, subdomain);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
            Err(e) => Err(Error::Kubernetes(e.to_string())),
        }
    }
}
