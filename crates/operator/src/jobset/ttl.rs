use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::crd::JobSet;
use crate::jobset::conditions::{JobSetConditionType, STATUS_TRUE};
use crate::{Error, Result};

/// Time at which the JobSet reached its single terminal condition.
fn finish_time(jobset: &JobSet) -> Result<DateTime<Utc>> {
    let mut terminal = jobset.conditions().iter().filter(|c| {
        c.status == STATUS_TRUE
            && (c.type_ == JobSetConditionType::Completed.as_str()
                || c.type_ == JobSetConditionType::Failed.as_str())
    });

    match (terminal.next(), terminal.next()) {
        (Some(condition), None) => Ok(condition.last_transition_time.0),
        (None, _) => Err(Error::Precondition(format!(
            "jobset {} has not finished",
            jobset.metadata.name.as_deref().unwrap_or_default()
        ))),
        (Some(_), Some(_)) => Err(Error::Precondition(format!(
            "jobset {} is both completed and failed",
            jobset.metadata.name.as_deref().unwrap_or_default()
        ))),
    }
}

/// Remaining time before a finished JobSet may be deleted, measured from `reference`.
///
/// Returns `None` when no TTL is configured. An expired TTL yields zero.
pub fn time_left(jobset: &JobSet, reference: DateTime<Utc>) -> Result<Option<Duration>> {
    let finished_at = finish_time(jobset)?;
    let Some(ttl) = jobset.spec.ttl_seconds_after_finished else {
        return Ok(None);
    };

    let expires_at = finished_at + chrono::Duration::seconds(i64::from(ttl.max(0)));
    Ok(Some(
        (expires_at - reference)
            .to_std()
            .unwrap_or(Duration::ZERO),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobset::testing::*;

    fn finished_at(type_: &str, at: DateTime<Utc>, ttl: i32) -> JobSet {
        jobset("foobar").condition(type_, "True", "", at).ttl(ttl).build()
    }

    #[test]
    fn completed_and_failed_count_down_alike() {
        let now = Utc::now();
        for type_ in ["Completed", "Failed"] {
            assert_eq!(
                time_left(&finished_at(type_, now, 0), now).unwrap(),
                Some(Duration::ZERO)
            );
            assert_eq!(
                time_left(&finished_at(type_, now, 10), now).unwrap(),
                Some(Duration::from_secs(10))
            );
            assert_eq!(
                time_left(
                    &finished_at(type_, now - chrono::Duration::seconds(10), 15),
                    now
                )
                .unwrap(),
                Some(Duration::from_secs(5))
            );
        }
    }

    #[test]
    fn expired_ttl_is_zero() {
        let now = Utc::now();
        let js = finished_at("Completed", now - chrono::Duration::seconds(30), 10);
        assert_eq!(time_left(&js, now).unwrap(), Some(Duration::ZERO));
    }

    #[test]
    fn negative_ttl_counts_as_zero() {
        let now = Utc::now();
        let js = finished_at("Completed", now, -5);
        assert_eq!(time_left(&js, now).unwrap(), Some(Duration::ZERO));
    }

    #[test]
    fn missing_ttl_means_no_deadline() {
        let js = jobset("foobar")
            .condition("Completed", "True", "", Utc::now())
            .build();
        assert_eq!(time_left(&js, Utc::now()).unwrap(), None);
    }

    #[test]
    fn time_left_shrinks_as_reference_advances() {
        let now = Utc::now();
        let js = finished_at("Failed", now, 60);
        let early = time_left(&js, now).unwrap().unwrap();
        let later = time_left(&js, now + chrono::Duration::seconds(20))
            .unwrap()
            .unwrap();
        assert!(later < early);
        assert_eq!(early - later, Duration::from_secs(20));
    }

    #[test]
    fn needs_exactly_one_terminal_condition() {
        let now = Utc::now();
        let unfinished = jobset("foobar").ttl(10).build();
        assert!(matches!(
            time_left(&unfinished, now),
            Err(Error::Precondition(_))
        ));

        let both = jobset("foobar")
            .condition("Completed", "True", "", now)
            .condition("Failed", "True", "", now)
            .ttl(10)
            .build();
        assert!(matches!(time_left(&both, now), Err(Error::Precondition(_))));
    }
}
