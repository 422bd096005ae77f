use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::{DeviceRecord, ProblemCodeTable, UNKNOWN, UNREADABLE};
use crate::directory::{
    ATTR_CLASS, ATTR_DESCRIPTION, ATTR_DEVICE_ID, ATTR_HARDWARE_ID, ATTR_MANUFACTURER, ATTR_NAME,
    ATTR_PROBLEM_CODE, ATTR_SERVICE, ATTR_STATUS, DeviceDirectory, DeviceFilter, RawEntry,
};

pub const DEFAULT_DEVICE_CLASSES: &[&str] = &["Media", "AudioEndpoint", "SoftwareDevice"];
pub const DEFAULT_NAME_KEYWORDS: &[&str] = &["audio", "sound"];

/// Builds one filter per device class, all sharing the same name keywords.
pub fn filters(classes: &[String], name_keywords: &[String]) -> Vec<DeviceFilter> {
    classes
        .iter()
        .map(|class| DeviceFilter {
            class: class.clone(),
            name_keywords: name_keywords.to_vec(),
        })
        .collect()
}

/// Queries every filter and returns the unique devices in first-seen order.
pub fn enumerate(
    directory: &dyn DeviceDirectory,
    filters: &[DeviceFilter],
) -> Result<Vec<DeviceRecord>> {
    let mut records = Vec::new();
    for filter in filters {
        let entries = directory
            .find_devices(filter)
            .with_context(|| format!("device query failed for class {}", filter.class))?;
        debug!(class = %filter.class, entries = entries.len(), "device query");
        records.extend(entries.iter().map(record_from_entry));
    }
    Ok(dedup_by_device_id(records))
}

pub fn record_from_entry(entry: &RawEntry) -> DeviceRecord {
    let mut record = DeviceRecord {
        name: read_or_sentinel(entry, ATTR_NAME),
        device_id: read_or_sentinel(entry, ATTR_DEVICE_ID),
        description: read_or_sentinel(entry, ATTR_DESCRIPTION),
        manufacturer: read_or_sentinel(entry, ATTR_MANUFACTURER),
        status: read_or_sentinel(entry, ATTR_STATUS),
        device_class: read_or_sentinel(entry, ATTR_CLASS),
        service_name: read_or_sentinel(entry, ATTR_SERVICE),
        hardware_id: read_or_sentinel(entry, ATTR_HARDWARE_ID),
        ..DeviceRecord::default()
    };

    match entry.read_code(ATTR_PROBLEM_CODE) {
        Ok(Some(code)) => {
            record.problem_code = Some(code);
            record.has_problem = code != 0;
            record.problem_description = ProblemCodeTable::get().describe(code);
        }
        Ok(None) => {}
        Err(err) => warn!(device = %record.name, "ignoring problem code: {err}"),
    }

    record
}

fn read_or_sentinel(entry: &RawEntry, name: &str) -> String {
    match entry.read(name) {
        Ok(Some(value)) => value,
        Ok(None) => UNKNOWN.to_string(),
        Err(err) => {
            debug!("{err}");
            UNREADABLE.to_string()
        }
    }
}

pub fn dedup_by_device_id(records: Vec<DeviceRecord>) -> Vec<DeviceRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.device_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{SignedDriver, SystemDriver};
    use serde_json::{Value, json};

    fn entry(value: Value) -> RawEntry {
        match value {
            Value::Object(map) => RawEntry::new(map),
            _ => panic!("expected object"),
        }
    }

    struct FakeDirectory {
        entries: Vec<RawEntry>,
    }

    impl DeviceDirectory for FakeDirectory {
        fn find_devices(&self, filter: &DeviceFilter) -> Result<Vec<RawEntry>> {
            Ok(self
                .entries
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect())
        }

        fn signed_driver(&self, _device_id: &str) -> Result<Option<SignedDriver>> {
            Ok(None)
        }

        fn system_driver(&self, _service_name: &str) -> Result<Option<SystemDriver>> {
            Ok(None)
        }
    }

    fn default_filters() -> Vec<DeviceFilter> {
        let classes: Vec<String> = DEFAULT_DEVICE_CLASSES.iter().map(|s| s.to_string()).collect();
        let keywords: Vec<String> = DEFAULT_NAME_KEYWORDS.iter().map(|s| s.to_string()).collect();
        filters(&classes, &keywords)
    }

    #[test]
    fn missing_attributes_become_unknown() {
        let record = record_from_entry(&entry(json!({"Name": "Speakers", "Manufacturer": null})));
        assert_eq!(record.name, "Speakers");
        assert_eq!(record.manufacturer, "unknown");
        assert_eq!(record.device_id, "unknown");
        assert!(!record.has_problem);
        assert_eq!(record.problem_description, "normal");
    }

    #[test]
    fn unreadable_attribute_degrades_only_that_field() {
        let record = record_from_entry(&entry(json!({
            "Name": "Speakers",
            "Description": {"broken": 1},
            "Status": "OK"
        })));
        assert_eq!(record.description, "unreadable");
        assert_eq!(record.name, "Speakers");
        assert_eq!(record.status, "OK");
    }

    #[test]
    fn problem_code_sets_flag_and_description() {
        let record = record_from_entry(&entry(json!({"ConfigManagerErrorCode": 28})));
        assert!(record.has_problem);
        assert_eq!(record.problem_code, Some(28));
        assert_eq!(
            record.problem_description,
            "drivers for this device are not installed"
        );

        let record = record_from_entry(&entry(json!({"ConfigManagerErrorCode": 0})));
        assert!(!record.has_problem);
        assert_eq!(record.problem_description, "normal");
    }

    #[test]
    fn enumerate_dedups_devices_matching_several_filters() {
        let directory = FakeDirectory {
            entries: vec![
                entry(json!({"DeviceID": "A", "Name": "Realtek Audio", "PNPClass": "Media"})),
                entry(json!({"DeviceID": "B", "Name": "Speakers", "PNPClass": "AudioEndpoint"})),
                entry(json!({"DeviceID": "C", "Name": "Sound Mapper", "PNPClass": "SoftwareDevice"})),
                entry(json!({"DeviceID": "D", "Name": "Keyboard", "PNPClass": "Keyboard"})),
            ],
        };

        let records = enumerate(&directory, &default_filters()).expect("enumerate");
        let ids: Vec<&str> = records.iter().map(|r| r.device_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C", "B"]);
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let make = |id: &str, name: &str| DeviceRecord {
            device_id: id.to_string(),
            name: name.to_string(),
            ..DeviceRecord::default()
        };
        let records = vec![
            make("1", "first"),
            make("2", "second"),
            make("1", "dup"),
            make("3", "third"),
            make("2", "dup"),
        ];
        let out = dedup_by_device_id(records);
        let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn enumerate_propagates_directory_failure() {
        struct Broken;
        impl DeviceDirectory for Broken {
            fn find_devices(&self, _filter: &DeviceFilter) -> Result<Vec<RawEntry>> {
                Err(anyhow::anyhow!("access denied"))
            }
            fn signed_driver(&self, _device_id: &str) -> Result<Option<SignedDriver>> {
                Ok(None)
            }
            fn system_driver(&self, _service_name: &str) -> Result<Option<SystemDriver>> {
                Ok(None)
            }
        }

        let err = enumerate(&Broken, &default_filters()).expect_err("should fail");
        assert!(format!("{err:#}").contains("access denied"));
    }
}
