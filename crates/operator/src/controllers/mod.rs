pub mod jobset;

pub use jobset::JobSetController;
