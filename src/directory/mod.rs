//! The device and driver directories the pipeline reads from.
//!
//! `DeviceDirectory` is the single seam between the pipeline and the host.
//! `CimDirectory` answers it with WQL queries against the CIM repository;
//! tests answer it from memory.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::platform::cim;

pub const ATTR_NAME: &str = "Name";
pub const ATTR_DEVICE_ID: &str = "DeviceID";
pub const ATTR_DESCRIPTION: &str = "Description";
pub const ATTR_MANUFACTURER: &str = "Manufacturer";
pub const ATTR_STATUS: &str = "Status";
pub const ATTR_CLASS: &str = "PNPClass";
pub const ATTR_SERVICE: &str = "Service";
pub const ATTR_HARDWARE_ID: &str = "HardwareID";
pub const ATTR_PROBLEM_CODE: &str = "ConfigManagerErrorCode";

const DEVICE_ATTRIBUTES: &[&str] = &[
    ATTR_NAME,
    ATTR_DEVICE_ID,
    ATTR_DESCRIPTION,
    ATTR_MANUFACTURER,
    ATTR_STATUS,
    ATTR_CLASS,
    ATTR_SERVICE,
    ATTR_HARDWARE_ID,
    ATTR_PROBLEM_CODE,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("attribute {name} holds a structured value")]
    Structured { name: String },
    #[error("attribute {name} is not a valid problem code: {value}")]
    InvalidCode { name: String, value: String },
}

/// One entry returned by a device query: named attributes, any of which may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    attributes: BTreeMap<String, Value>,
}

impl RawEntry {
    pub fn new(attributes: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            attributes: attributes.into_iter().collect(),
        }
    }

    /// `Ok(None)` when the attribute is absent or null.
    pub fn read(&self, name: &str) -> Result<Option<String>, AttributeError> {
        let Some(value) = self.attributes.get(name) else {
            return Ok(None);
        };
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Null => {}
                        Value::String(s) => parts.push(s.clone()),
                        Value::Bool(_) | Value::Number(_) => parts.push(item.to_string()),
                        _ => {
                            return Err(AttributeError::Structured {
                                name: name.to_string(),
                            });
                        }
                    }
                }
                if parts.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(parts.join(", ")))
                }
            }
            Value::Object(_) => Err(AttributeError::Structured {
                name: name.to_string(),
            }),
        }
    }

    pub fn read_code(&self, name: &str) -> Result<Option<u32>, AttributeError> {
        let Some(raw) = self.read(name)? else {
            return Ok(None);
        };
        raw.trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| AttributeError::InvalidCode {
                name: name.to_string(),
                value: raw,
            })
    }
}

/// Matches entries in `class`, or whose display name contains any keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub class: String,
    pub name_keywords: Vec<String>,
}

impl DeviceFilter {
    pub fn to_wql(&self) -> String {
        let mut wql = format!(
            "SELECT {} FROM Win32_PnPEntity WHERE PNPClass = '{}'",
            DEVICE_ATTRIBUTES.join(", "),
            escape_filter_string(&self.class)
        );
        for keyword in &self.name_keywords {
            wql.push_str(&format!(" OR Name LIKE '%{}%'", like_literal(keyword)));
        }
        wql
    }

    pub fn matches(&self, entry: &RawEntry) -> bool {
        if let Ok(Some(class)) = entry.read(ATTR_CLASS) {
            if class.eq_ignore_ascii_case(&self.class) {
                return true;
            }
        }
        let Ok(Some(name)) = entry.read(ATTR_NAME) else {
            return false;
        };
        let name = name.to_lowercase();
        self.name_keywords
            .iter()
            .any(|k| name.contains(&k.to_lowercase()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedDriver {
    pub version: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemDriver {
    pub version: Option<String>,
    pub install_date: Option<String>,
}

pub trait DeviceDirectory {
    fn find_devices(&self, filter: &DeviceFilter) -> Result<Vec<RawEntry>>;

    /// First signed driver whose device id equals `device_id`.
    fn signed_driver(&self, device_id: &str) -> Result<Option<SignedDriver>>;

    /// First system driver whose name equals `service_name`.
    fn system_driver(&self, service_name: &str) -> Result<Option<SystemDriver>>;
}

/// Escapes a value before it is interpolated into a quoted filter literal.
pub fn escape_filter_string(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('\'', "''")
        .replace('"', "\\\"")
        .replace('%', "[%]")
        .replace('_', "[_]")
        .replace('&', "^&")
}

/// Escapes a value for use inside a `LIKE` pattern. `[` opens a character
/// class there, so it is bracketed before the filter-string escapes run.
pub fn like_literal(input: &str) -> String {
    escape_filter_string(&input.replace('[', "[[]"))
}

/// LIKE keeps the bracket escapes for `%` and `_` literal.
pub fn signed_driver_wql(device_id: &str) -> String {
    format!(
        "SELECT DriverVersion, DriverDate FROM Win32_PnPSignedDriver WHERE DeviceID LIKE '{}'",
        like_literal(device_id)
    )
}

pub fn system_driver_wql(service_name: &str) -> String {
    format!(
        "SELECT Version, InstallDate FROM Win32_SystemDriver WHERE Name LIKE '{}'",
        like_literal(service_name)
    )
}

fn read_driver_field(row: &RawEntry, name: &str) -> Option<String> {
    match row.read(name) {
        Ok(value) => value,
        Err(err) => {
            debug!("{err}");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CimDirectory {
    powershell: String,
    timeout: Duration,
}

impl CimDirectory {
    pub fn new(powershell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            powershell: powershell.into(),
            timeout,
        }
    }

    fn query(&self, wql: &str) -> Result<Vec<cim::CimObject>> {
        debug!(wql, "running CIM query");
        let rows = cim::query(&self.powershell, wql, self.timeout)?;
        debug!(rows = rows.len(), "CIM query finished");
        Ok(rows)
    }
}

impl DeviceDirectory for CimDirectory {
    fn find_devices(&self, filter: &DeviceFilter) -> Result<Vec<RawEntry>> {
        let rows = self.query(&filter.to_wql())?;
        Ok(rows.into_iter().map(RawEntry::new).collect())
    }

    fn signed_driver(&self, device_id: &str) -> Result<Option<SignedDriver>> {
        let Some(row) = self.query(&signed_driver_wql(device_id))?.into_iter().next() else {
            return Ok(None);
        };
        let row = RawEntry::new(row);
        Ok(Some(SignedDriver {
            version: read_driver_field(&row, "DriverVersion"),
            date: read_driver_field(&row, "DriverDate"),
        }))
    }

    fn system_driver(&self, service_name: &str) -> Result<Option<SystemDriver>> {
        let Some(row) = self.query(&system_driver_wql(service_name))?.into_iter().next() else {
            return Ok(None);
        };
        let row = RawEntry::new(row);
        Ok(Some(SystemDriver {
            version: read_driver_field(&row, "Version"),
            install_date: read_driver_field(&row, "InstallDate"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: Value) -> RawEntry {
        match value {
            Value::Object(map) => RawEntry::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn escape_filter_string_applies_every_rule() {
        assert_eq!(
            escape_filter_string("O'Brien_100%\\"),
            "O''Brien[_]100[%]\\\\"
        );
        assert_eq!(escape_filter_string("a\"b&c"), "a\\\"b^&c");
    }

    #[test]
    fn escape_filter_string_backslash_first() {
        // A quote escape must not be re-escaped by the backslash rule.
        assert_eq!(escape_filter_string("\""), "\\\"");
        assert_eq!(escape_filter_string("\\'"), "\\\\''");
    }

    #[test]
    fn escape_filter_string_empty_is_empty() {
        assert_eq!(escape_filter_string(""), "");
    }

    #[test]
    fn read_distinguishes_absent_and_structured() {
        let e = entry(json!({
            "Name": "Speakers",
            "Status": null,
            "HardwareID": ["HDAUDIO\\FUNC_01", "HDAUDIO\\FUNC_01&VEN_10EC"],
            "Weird": {"nested": true},
            "ConfigManagerErrorCode": 22
        }));
        assert_eq!(e.read("Name"), Ok(Some("Speakers".to_string())));
        assert_eq!(e.read("Status"), Ok(None));
        assert_eq!(e.read("Missing"), Ok(None));
        assert_eq!(
            e.read("HardwareID"),
            Ok(Some("HDAUDIO\\FUNC_01, HDAUDIO\\FUNC_01&VEN_10EC".to_string()))
        );
        assert!(matches!(
            e.read("Weird"),
            Err(AttributeError::Structured { .. })
        ));
        assert_eq!(e.read_code("ConfigManagerErrorCode"), Ok(Some(22)));
    }

    #[test]
    fn read_code_rejects_non_numeric() {
        let e = entry(json!({"ConfigManagerErrorCode": "bad"}));
        assert!(matches!(
            e.read_code("ConfigManagerErrorCode"),
            Err(AttributeError::InvalidCode { .. })
        ));
    }

    #[test]
    fn filter_matches_class_or_keyword() {
        let filter = DeviceFilter {
            class: "Media".to_string(),
            name_keywords: vec!["audio".to_string(), "sound".to_string()],
        };
        assert!(filter.matches(&entry(json!({"PNPClass": "Media", "Name": "X"}))));
        assert!(filter.matches(&entry(json!({"PNPClass": "USB", "Name": "USB Audio Device"}))));
        assert!(filter.matches(&entry(json!({"Name": "SOUND BLASTER"}))));
        assert!(!filter.matches(&entry(json!({"PNPClass": "USB", "Name": "Keyboard"}))));
    }

    #[test]
    fn filter_wql_escapes_values() {
        let filter = DeviceFilter {
            class: "Me'dia".to_string(),
            name_keywords: vec!["audio".to_string()],
        };
        let wql = filter.to_wql();
        assert!(wql.contains("FROM Win32_PnPEntity"), "wql={wql}");
        assert!(wql.contains("PNPClass = 'Me''dia'"), "wql={wql}");
        assert!(wql.ends_with("OR Name LIKE '%audio%'"), "wql={wql}");
    }

    #[test]
    fn filter_class_comparison_ignores_case() {
        let filter = DeviceFilter {
            class: "AudioEndpoint".to_string(),
            name_keywords: Vec::new(),
        };
        assert!(filter.matches(&entry(json!({"PNPClass": "audioendpoint", "Name": "Speakers"}))));
        assert!(!filter.matches(&entry(json!({"PNPClass": "Media", "Name": "Speakers"}))));
    }

    #[test]
    fn driver_lookups_bracket_literal_open_brackets() {
        assert_eq!(
            signed_driver_wql(r"SWD\MMDEVAPI\{0.0.0}[1]_x"),
            r"SELECT DriverVersion, DriverDate FROM Win32_PnPSignedDriver WHERE DeviceID LIKE 'SWD\\MMDEVAPI\\{0.0.0}[[]1][_]x'"
        );
        assert_eq!(
            system_driver_wql("svc[a-z]%"),
            "SELECT Version, InstallDate FROM Win32_SystemDriver WHERE Name LIKE 'svc[[]a-z][%]'"
        );
    }

    #[test]
    fn keyword_patterns_bracket_literal_open_brackets() {
        let filter = DeviceFilter {
            class: "Media".to_string(),
            name_keywords: vec!["[pro]".to_string()],
        };
        assert!(filter.to_wql().ends_with("OR Name LIKE '%[[]pro]%'"));
    }

    #[test]
    fn unreadable_driver_field_is_treated_as_absent() {
        let row = entry(json!({"DriverVersion": {"Major": 6}, "DriverDate": "20200101000000.000000+000"}));
        assert_eq!(read_driver_field(&row, "DriverVersion"), None);
        assert_eq!(
            read_driver_field(&row, "DriverDate").as_deref(),
            Some("20200101000000.000000+000")
        );
        assert_eq!(read_driver_field(&row, "Missing"), None);
    }
}
