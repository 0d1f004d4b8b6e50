use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::{Error, Result};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref RECONCILIATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "jobset_reconciliations_total",
            "Total number of JobSet reconcile passes by result."
        ),
        &["result"]
    )
    .unwrap();
    pub static ref JOBS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "jobset_jobs_created_total",
        "Total number of child Jobs created."
    )
    .unwrap();
    pub static ref JOBS_DELETED_TOTAL: IntCounter = IntCounter::new(
        "jobset_jobs_deleted_total",
        "Total number of child Jobs deleted."
    )
    .unwrap();
    pub static ref JOBSETS_FINISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "jobset_finished_total",
            "Total number of JobSets that reached a terminal condition."
        ),
        &["condition"]
    )
    .unwrap();
    pub static ref JOBSETS_TTL_DELETED_TOTAL: IntCounter = IntCounter::new(
        "jobset_ttl_deleted_total",
        "Total number of finished JobSets deleted after their TTL expired."
    )
    .unwrap();
}

/// Registers every collector with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(JOBS_CREATED_TOTAL.clone()),
        Box::new(JOBS_DELETED_TOTAL.clone()),
        Box::new(JOBSETS_FINISHED_TOTAL.clone()),
        Box::new(JOBSETS_TTL_DELETED_TOTAL.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(Error::Internal(format!("registering metrics: {}", e))),
        }
    }
    Ok(())
}

/// Renders the registry in the Prometheus text format.
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| Error::Internal(format!("encoding metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
}
