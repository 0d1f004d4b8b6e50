//! Reconciliation core for JobSets.
//!
//! Everything here is synchronous and works on owned snapshots of the JobSet
//! and its child Jobs; the controller feeds it and persists the results.

pub mod children;
pub mod conditions;
pub mod construct;
pub mod placement;
pub mod policy;
pub mod startup;
pub mod status;
pub mod ttl;

#[cfg(test)]
pub(crate) mod testing;

pub use children::{find_first_failed_job, job_finished, ChildJobs, JobFinish};
pub use conditions::{update_condition, JobSetConditionType};
pub use construct::{construct_jobs_from_template, job_name};
pub use placement::{ExclusivePlacement, PlacementScope, PlacementStrategy};
pub use policy::{failure_action, success_satisfied, FailureAction};
pub use startup::{admitted_replicated_jobs, update_startup_conditions};
pub use status::calculate_replicated_job_statuses;
pub use ttl::time_left;
