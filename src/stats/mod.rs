use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::core::{DeviceRecord, DeviceStatistics, normalize};
use crate::health::{HealthPolicy, is_problem, is_stale_driver};

pub fn aggregate(records: &[DeviceRecord]) -> DeviceStatistics {
    let mut stats = DeviceStatistics::default();
    for record in records {
        tally(&mut stats.class_count, &record.device_class);
        tally(&mut stats.status_count, &record.status);
        tally(&mut stats.manufacturer_count, &record.manufacturer);
    }
    stats
}

fn tally(counts: &mut BTreeMap<String, usize>, key: &str) {
    *counts.entry(normalize(key).to_string()).or_insert(0) += 1;
}

pub fn problem_devices(records: &[DeviceRecord]) -> Vec<&DeviceRecord> {
    records.iter().filter(|r| is_problem(r)).collect()
}

pub fn stale_driver_devices<'a>(
    records: &'a [DeviceRecord],
    now: OffsetDateTime,
    policy: &HealthPolicy,
) -> Vec<&'a DeviceRecord> {
    records
        .iter()
        .filter(|r| is_stale_driver(r, now, policy))
        .collect()
}
