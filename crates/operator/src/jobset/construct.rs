use std::collections::{BTreeMap, HashSet};

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use lazy_static::lazy_static;
use regex::Regex;

use crate::crd::keys::{job_hash_key, JobIdentity};
use crate::crd::{JobSet, ReplicatedJob};
use crate::jobset::children::ChildJobs;
use crate::jobset::placement::ExclusivePlacement;
use crate::{Error, Result};

const MAX_NAME_LENGTH: usize = 63;
const SELECTOR_OPERATORS: [&str; 4] = ["In", "NotIn", "Exists", "DoesNotExist"];

lazy_static! {
    static ref DNS1123_LABEL: Regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap();
}

/// Deterministic name of the Job at `index` of a ReplicatedJob.
pub fn job_name(jobset_name: &str, replicated_job: &str, index: i32) -> String {
    format!("{}-{}-{}", jobset_name, replicated_job, index)
}

/// Builds a Job for every index of `rjob` that has no child yet.
///
/// A child in any bucket, including ones pending deletion, occupies its index,
/// so repeated calls with the returned Jobs included in `children` yield nothing.
pub fn construct_jobs_from_template(
    jobset: &JobSet,
    rjob: &ReplicatedJob,
    children: &ChildJobs,
) -> Result<Vec<Job>> {
    if rjob.replicas < 0 {
        return Err(Error::Templating(format!(
            "replicated job {} has negative replicas {}",
            rjob.name, rjob.replicas
        )));
    }

    let existing: HashSet<&str> = children
        .all()
        .filter_map(|job| job.metadata.name.as_deref())
        .collect();
    let placement = ExclusivePlacement::resolve(jobset, rjob);
    let jobset_name = jobset.name_any();

    let mut jobs = Vec::new();
    for index in 0..rjob.replicas {
        let name = job_name(&jobset_name, &rjob.name, index);
        if existing.contains(name.as_str()) {
            continue;
        }
        jobs.push(construct_job(jobset, rjob, index, name, placement.as_ref())?);
    }
    Ok(jobs)
}

fn construct_job(
    jobset: &JobSet,
    rjob: &ReplicatedJob,
    index: i32,
    name: String,
    placement: Option<&ExclusivePlacement>,
) -> Result<Job> {
    validate_job_name(&name)?;

    let namespace = jobset.namespace_or_default();
    let identity = JobIdentity {
        jobset_name: jobset.name_any(),
        replicated_job_name: rjob.name.clone(),
        replicas: rjob.replicas,
        job_index: index,
        restart_attempt: jobset.restarts(),
        job_key: job_hash_key(&namespace, &name),
    };
    let identity_map = identity.to_map();
    let mut annotation_map = identity_map.clone();
    if let Some(placement) = placement {
        annotation_map.extend(placement.annotations());
    }

    let template_meta = rjob.template.metadata.clone().unwrap_or_default();
    let mut labels = template_meta.labels.unwrap_or_default();
    labels.extend(identity_map.clone());
    let mut annotations = template_meta.annotations.unwrap_or_default();
    annotations.extend(annotation_map.clone());

    let mut spec = rjob.template.spec.clone().unwrap_or_default();
    spec.suspend = Some(jobset.is_suspended());
    let pod_meta = spec.template.metadata.get_or_insert_with(ObjectMeta::default);
    pod_meta
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(identity_map);
    pod_meta
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .extend(annotation_map);
    if let Some(subdomain) = jobset.subdomain() {
        spec.template.spec.get_or_insert_with(PodSpec::default).subdomain = Some(subdomain);
    }

    let mut job = Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.clone()),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: jobset.controller_owner_ref(&()).map(|owner| vec![owner]),
            ..Default::default()
        },
        spec: Some(spec),
        status: None,
    };

    if let Some(placement) = placement {
        placement.apply(&mut job, &identity, &namespace);
    }
    validate_selector(&job)?;

    Ok(job)
}

fn validate_job_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::Templating(format!(
            "job name {} is longer than {} characters",
            name, MAX_NAME_LENGTH
        )));
    }
    if !DNS1123_LABEL.is_match(name) {
        return Err(Error::Templating(format!(
            "job name {} is not a valid DNS-1123 label",
            name
        )));
    }
    Ok(())
}

fn validate_selector(job: &Job) -> Result<()> {
    let Some(spec) = job.spec.as_ref() else {
        return Ok(());
    };
    let Some(selector) = spec.selector.as_ref() else {
        return Ok(());
    };
    let name = job.metadata.name.as_deref().unwrap_or_default();

    let empty = BTreeMap::new();
    let pod_labels = spec
        .template
        .metadata
        .as_ref()
        .and_then(|m| m.labels.as_ref())
        .unwrap_or(&empty);
    for (key, value) in selector.match_labels.iter().flatten() {
        if pod_labels.get(key) != Some(value) {
            return Err(Error::Templating(format!(
                "selector of job {} requires {}={} which the pod template does not carry",
                name, key, value
            )));
        }
    }

    for requirement in selector.match_expressions.iter().flatten() {
        if !SELECTOR_OPERATORS.contains(&requirement.operator.as_str()) {
            return Err(Error::Templating(format!(
                "selector of job {} uses unknown operator {}",
                name, requirement.operator
            )));
        }
    }

    Ok(())
}
