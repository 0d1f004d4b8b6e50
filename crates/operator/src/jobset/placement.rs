use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Affinity, PodAffinity, PodAffinityTerm, PodAntiAffinity, PodSpec, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

use crate::crd::keys::{
    JobIdentity, PlacementAnnotations, JOBSET_NAME_KEY, JOB_KEY, NAMESPACED_JOB_KEY,
    NO_SCHEDULE_TAINT_KEY, REPLICATED_JOB_NAME_KEY,
};
use crate::crd::{JobSet, ReplicatedJob};

/// Which Jobs must not share a topology domain with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementScope {
    /// Jobs of the same ReplicatedJob.
    ReplicatedJob,
    /// Every Job of the JobSet.
    JobSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStrategy {
    AntiAffinity,
    /// Pin pods to nodes pre-labelled with the Job's namespaced name.
    NodeSelector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusivePlacement {
    pub topology_key: String,
    pub scope: PlacementScope,
    pub strategy: PlacementStrategy,
}

impl ExclusivePlacement {
    /// Resolves the placement request for one group. Group annotations win over
    /// JobSet annotations; without a topology key there is nothing to place.
    pub fn resolve(jobset: &JobSet, rjob: &ReplicatedJob) -> Option<Self> {
        let group = PlacementAnnotations::from_map(
            rjob.template
                .metadata
                .as_ref()
                .and_then(|m| m.annotations.as_ref()),
        );
        let global = PlacementAnnotations::from_map(jobset.metadata.annotations.as_ref());

        let (topology_key, scope) = match (group.topology_key, global.topology_key) {
            (Some(key), _) => (key, PlacementScope::ReplicatedJob),
            (None, Some(key)) => (key, PlacementScope::JobSet),
            (None, None) => return None,
        };
        let node_selector = group
            .node_selector_strategy
            .or(global.node_selector_strategy)
            .unwrap_or(false);

        Some(Self {
            topology_key,
            scope,
            strategy: if node_selector {
                PlacementStrategy::NodeSelector
            } else {
                PlacementStrategy::AntiAffinity
            },
        })
    }

    /// Annotations recording the resolved request on the Job.
    pub fn annotations(&self) -> BTreeMap<String, String> {
        PlacementAnnotations {
            topology_key: Some(self.topology_key.clone()),
            node_selector_strategy: Some(self.strategy == PlacementStrategy::NodeSelector),
        }
        .to_map()
    }

    pub fn apply(&self, job: &mut Job, identity: &JobIdentity, namespace: &str) {
        let job_name = job.metadata.name.clone().unwrap_or_default();
        let pod_spec = job
            .spec
            .get_or_insert_with(Default::default)
            .template
            .spec
            .get_or_insert_with(PodSpec::default);

        match self.strategy {
            PlacementStrategy::AntiAffinity => self.apply_affinity(pod_spec, identity),
            PlacementStrategy::NodeSelector => {
                pod_spec
                    .node_selector
                    .get_or_insert_with(BTreeMap::new)
                    .insert(
                        NAMESPACED_JOB_KEY.to_string(),
                        namespaced_job_name(namespace, &job_name),
                    );
                pod_spec
                    .tolerations
                    .get_or_insert_with(Vec::new)
                    .push(Toleration {
                        key: Some(NO_SCHEDULE_TAINT_KEY.to_string()),
                        operator: Some("Exists".to_string()),
                        effect: Some("NoSchedule".to_string()),
                        ..Default::default()
                    });
            }
        }
    }

    fn apply_affinity(&self, pod_spec: &mut PodSpec, identity: &JobIdentity) {
        let affinity = pod_spec.affinity.get_or_insert_with(Affinity::default);

        // Keep all pods of this Job in one domain.
        affinity
            .pod_affinity
            .get_or_insert_with(PodAffinity::default)
            .required_during_scheduling_ignored_during_execution
            .get_or_insert_with(Vec::new)
            .push(self.term(vec![requirement(
                JOB_KEY,
                "In",
                Some(&identity.job_key),
            )]));

        let mut exclude = vec![
            requirement(JOB_KEY, "Exists", None),
            requirement(JOB_KEY, "NotIn", Some(&identity.job_key)),
            requirement(JOBSET_NAME_KEY, "In", Some(&identity.jobset_name)),
        ];
        if self.scope == PlacementScope::ReplicatedJob {
            exclude.push(requirement(
                REPLICATED_JOB_NAME_KEY,
                "In",
                Some(&identity.replicated_job_name),
            ));
        }
        affinity
            .pod_anti_affinity
            .get_or_insert_with(PodAntiAffinity::default)
            .required_during_scheduling_ignored_during_execution
            .get_or_insert_with(Vec::new)
            .push(self.term(exclude));
    }

    fn term(&self, expressions: Vec<LabelSelectorRequirement>) -> PodAffinityTerm {
        PodAffinityTerm {
            label_selector: Some(LabelSelector {
                match_expressions: Some(expressions),
                match_labels: None,
            }),
            topology_key: self.topology_key.clone(),
            ..Default::default()
        }
    }
}

fn requirement(key: &str, operator: &str, value: Option<&str>) -> LabelSelectorRequirement {
    LabelSelectorRequirement {
        key: key.to_string(),
        operator: operator.to_string(),
        values: value.map(|v| vec![v.to_string()]),
    }
}

/// Node label value a Job is pinned to under the node-selector strategy.
pub fn namespaced_job_name(namespace: &str, job_name: &str) -> String {
    format!("{}/{}", namespace, job_name)
}
