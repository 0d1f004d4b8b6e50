pub mod jobset;
pub mod keys;

pub use jobset::{
    FailurePolicy, JobSet, JobSetSpec, JobSetStatus, Network, ReplicatedJob,
    ReplicatedJobStatus, StartupPolicy, StartupPolicyOrder, SuccessOperator, SuccessPolicy,
};
pub use keys::{JobIdentity, PlacementAnnotations};
