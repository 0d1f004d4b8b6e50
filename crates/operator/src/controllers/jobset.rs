use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{
    api::Api,
    runtime::{controller::{Action, Controller}, watcher::Config},
    Client, ResourceExt,
};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    config::ControllerConfig,
    crd::{keys::JOBSET_NAME_KEY, JobSet, JobSetStatus, ReplicatedJob},
    jobset::{
        admitted_replicated_jobs, calculate_replicated_job_statuses, conditions,
        construct_jobs_from_template, failure_action, policy, success_satisfied, ttl,
        update_condition, update_startup_conditions, ChildJobs, FailureAction,
        JobSetConditionType,
    },
    metrics::{
        JOBSETS_FINISHED_TOTAL, JOBSETS_TTL_DELETED_TOTAL, JOBS_CREATED_TOTAL,
        JOBS_DELETED_TOTAL, RECONCILIATIONS_TOTAL,
    },
    store::{CreateOutcome, JobSetStore, NetworkIdentity},
    Error, Result,
};

pub struct JobSetController {
    store: Arc<dyn JobSetStore>,
    network: Arc<dyn NetworkIdentity>,
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
}

impl JobSetController {
    pub fn new(
        store: Arc<dyn JobSetStore>,
        network: Arc<dyn NetworkIdentity>,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            network,
            clock,
            config,
        }
    }

    pub async fn run(self: Arc<Self>, client: Client) {
        info!("Starting JobSet controller");

        let (jobsets, jobs): (Api<JobSet>, Api<Job>) = match &self.config.watch_namespace {
            Some(namespace) => {
                info!("Watching namespace {}", namespace);
                (
                    Api::namespaced(client.clone(), namespace),
                    Api::namespaced(client, namespace),
                )
            }
            None => (Api::all(client.clone()), Api::all(client)),
        };

        Controller::new(jobsets, Config::default())
            .owns(jobs, Config::default().labels(JOBSET_NAME_KEY))
            .shutdown_on_signal()
            .run(Self::reconcile, Self::error_policy, self)
            .for_each(|res| async move {
                match res {
                    Ok((object, _action)) => debug!("Reconciled JobSet {}", object.name),
                    Err(e) => warn!("Reconciliation error: {}", e),
                }
            })
            .await;

        info!("JobSet controller stopped");
    }

    async fn reconcile(jobset: Arc<JobSet>, ctx: Arc<Self>) -> Result<Action> {
        let result = ctx.reconcile_jobset(&jobset).await;
        let label = if result.is_ok() { "success" } else { "error" };
        RECONCILIATIONS_TOTAL.with_label_values(&[label]).inc();
        result
    }

    fn error_policy(jobset: Arc<JobSet>, error: &Error, ctx: Arc<Self>) -> Action {
        error!(
            "JobSet {}/{} reconciliation error: {}",
            jobset.namespace_or_default(),
            jobset.name_any(),
            error
        );
        Action::requeue(ctx.config.error_requeue())
    }

    /// One reconcile pass for a single JobSet.
    pub async fn reconcile_jobset(&self, observed: &JobSet) -> Result<Action> {
        let name = observed.name_any();
        let namespace = observed.namespace_or_default();

        let Some(mut jobset) = self.store.get_jobset(&namespace, &name).await? else {
            debug!("JobSet {}/{} is gone", namespace, name);
            return Ok(Action::await_change());
        };
        if jobset.metadata.deletion_timestamp.is_some() {
            debug!("JobSet {}/{} is being deleted", namespace, name);
            return Ok(Action::await_change());
        }
        if conditions::finished(&jobset).is_some() {
            return self.reconcile_finished(&jobset).await;
        }

        debug!("Reconciling JobSet {}/{}", namespace, name);
        let reported = jobset.status.clone();
        let children = ChildJobs::classify(&jobset, self.store.list_child_jobs(&jobset).await?);

        let statuses = calculate_replicated_job_statuses(&jobset, &children);
        jobset
            .status
            .get_or_insert_with(JobSetStatus::default)
            .replicated_jobs_status = statuses;

        self.delete_jobs(children.delete.iter()).await?;

        match failure_action(&jobset, &children) {
            Some(FailureAction::Restart { attempt }) => {
                info!(
                    "Restarting JobSet {}/{} (attempt {})",
                    namespace, name, attempt
                );
                // Children of the previous attempt are torn down once the new attempt is stored.
                policy::record_restart(&mut jobset, attempt);
                self.persist(&jobset, &reported).await?;
                return Ok(Action::requeue(self.config.resync_interval()));
            }
            Some(FailureAction::Fail { message }) => {
                info!("JobSet {}/{} failed: {}", namespace, name, message);
                let now = self.clock.now();
                return self
                    .finish(jobset, &reported, conditions::failed(message, now))
                    .await;
            }
            None => {}
        }

        if success_satisfied(&jobset, &children) {
            info!("JobSet {}/{} completed", namespace, name);
            let now = self.clock.now();
            return self
                .finish(jobset, &reported, conditions::completed(now))
                .await;
        }

        self.reconcile_suspend(&mut jobset, &children).await?;

        if jobset.dns_hostnames_enabled() {
            self.network.ensure_network_identity(&jobset).await?;
        }

        update_startup_conditions(&mut jobset, &children, self.clock.now());
        let admitted: Vec<ReplicatedJob> = admitted_replicated_jobs(&jobset, &children)
            .into_iter()
            .cloned()
            .collect();

        match self.create_jobs(&jobset, &admitted, &children).await {
            Ok(()) => {
                if conditions::condition_is_true(&jobset, JobSetConditionType::TemplateError) {
                    update_condition(&mut jobset, conditions::template_valid(self.clock.now()), true);
                }
            }
            Err(e) if e.is_templating() => {
                warn!(
                    "JobSet {}/{} has an invalid Job template: {}",
                    namespace, name, e
                );
                update_condition(
                    &mut jobset,
                    conditions::template_error(e.to_string(), self.clock.now()),
                    false,
                );
                self.persist(&jobset, &reported).await?;
                return Ok(Action::await_change());
            }
            Err(e) => return Err(e),
        }

        self.persist(&jobset, &reported).await?;
        Ok(Action::requeue(self.config.resync_interval()))
    }

    /// Records a terminal condition and schedules TTL cleanup.
    async fn finish(
        &self,
        mut jobset: JobSet,
        reported: &Option<JobSetStatus>,
        condition: Condition,
    ) -> Result<Action> {
        let kind = condition.type_.clone();
        if update_condition(&mut jobset, condition, false) {
            JOBSETS_FINISHED_TOTAL.with_label_values(&[kind.as_str()]).inc();
        }
        self.persist(&jobset, reported).await?;
        self.reconcile_finished(&jobset).await
    }

    async fn reconcile_finished(&self, jobset: &JobSet) -> Result<Action> {
        let left = match ttl::time_left(jobset, self.clock.now()) {
            Ok(left) => left,
            Err(e) => {
                error!(
                    "Cannot compute TTL of JobSet {}/{}: {}",
                    jobset.namespace_or_default(),
                    jobset.name_any(),
                    e
                );
                return Err(e);
            }
        };

        match left {
            None => Ok(Action::await_change()),
            Some(left) if left.is_zero() => {
                info!(
                    "TTL of JobSet {}/{} expired, deleting it",
                    jobset.namespace_or_default(),
                    jobset.name_any()
                );
                self.store.delete_jobset(jobset).await?;
                JOBSETS_TTL_DELETED_TOTAL.inc();
                Ok(Action::await_change())
            }
            Some(left) => {
                debug!(
                    "JobSet {}/{} will be deleted in {:?}",
                    jobset.namespace_or_default(),
                    jobset.name_any(),
                    left
                );
                Ok(Action::requeue(left))
            }
        }
    }

    async fn reconcile_suspend(&self, jobset: &mut JobSet, children: &ChildJobs) -> Result<()> {
        let now = self.clock.now();
        if jobset.is_suspended() {
            for job in children.active.iter().filter(|job| !job_suspended(job)) {
                debug!("Suspending Job {}", job.name_any());
                self.store.set_job_suspend(job, true).await?;
            }
            update_condition(jobset, conditions::suspended(now), false);
        } else if conditions::condition_is_true(jobset, JobSetConditionType::Suspended) {
            for job in children.active.iter().filter(|job| job_suspended(job)) {
                debug!("Resuming Job {}", job.name_any());
                self.store.set_job_suspend(job, false).await?;
            }
            update_condition(jobset, conditions::resumed(now), true);
        }
        Ok(())
    }

    async fn create_jobs(
        &self,
        jobset: &JobSet,
        admitted: &[ReplicatedJob],
        children: &ChildJobs,
    ) -> Result<()> {
        for rjob in admitted {
            for job in construct_jobs_from_template(jobset, rjob, children)? {
                match self.store.create_job(&job).await? {
                    CreateOutcome::Created => {
                        info!(
                            "Created Job {}/{}",
                            jobset.namespace_or_default(),
                            job.name_any()
                        );
                        JOBS_CREATED_TOTAL.inc();
                    }
                    CreateOutcome::AlreadyExists => {
                        debug!("Job {} already exists", job.name_any());
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete_jobs<'a>(&self, jobs: impl Iterator<Item = &'a Job> + Send) -> Result<()> {
        for job in jobs {
            if job.metadata.deletion_timestamp.is_some() {
                continue;
            }
            debug!("Deleting Job {}", job.name_any());
            self.store.delete_job(job).await?;
            JOBS_DELETED_TOTAL.inc();
        }
        Ok(())
    }

    async fn persist(&self, jobset: &JobSet, reported: &Option<JobSetStatus>) -> Result<()> {
        if jobset.status == *reported {
            return Ok(());
        }
        self.store.update_status(jobset).await
    }
}

fn job_suspended(job: &Job) -> bool {
    job.spec
        .as_ref()
        .and_then(|s| s.suspend)
        .unwrap_or(false)
}
