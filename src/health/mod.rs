use time::OffsetDateTime;

use crate::core::{DeviceRecord, HealthVerdict, is_known};
use crate::drivers::parse_driver_date;

pub const DEFAULT_STALE_AFTER_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub stale_after_days: i64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
        }
    }
}

/// Every matching rule contributes an issue; the device is healthy only when none match.
pub fn classify(record: &DeviceRecord, now: OffsetDateTime, policy: &HealthPolicy) -> HealthVerdict {
    let mut issues = Vec::new();

    if record.has_problem {
        issues.push(format!("problem code: {}", record.problem_description));
    }
    if !record.status_ok() {
        issues.push(format!("status is not normal: {}", record.status));
    }
    if let Some(age_days) = stale_driver_age(record, now, policy) {
        issues.push(format!("driver may be outdated ({age_days} days old)"));
    }
    if record.driver_fetch_failed() {
        issues.push("driver info could not be retrieved".to_string());
    }

    HealthVerdict {
        healthy: issues.is_empty(),
        issues,
    }
}

/// Narrower than "has issues": a stale driver alone is not a problem.
pub fn is_problem(record: &DeviceRecord) -> bool {
    record.has_problem || !record.status_ok() || record.driver_fetch_failed()
}

pub fn is_stale_driver(record: &DeviceRecord, now: OffsetDateTime, policy: &HealthPolicy) -> bool {
    stale_driver_age(record, now, policy).is_some()
}

/// Driver age in whole days (rounded) when it exceeds the policy threshold.
pub fn stale_driver_age(
    record: &DeviceRecord,
    now: OffsetDateTime,
    policy: &HealthPolicy,
) -> Option<i64> {
    if !is_known(&record.driver_date) {
        return None;
    }
    let driver_date = parse_driver_date(&record.driver_date)?;
    let age_days = (now - driver_date).as_seconds_f64() / 86_400.0;
    if age_days > policy.stale_after_days as f64 {
        Some(age_days.round() as i64)
    } else {
        None
    }
}
