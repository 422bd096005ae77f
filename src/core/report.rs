use crate::core::{DeviceRecord, DeviceStatistics, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthVerdict {
    pub healthy: bool,
    pub issues: Vec<String>,
}

impl HealthVerdict {
    pub fn severity(&self) -> Severity {
        if self.healthy {
            Severity::Ok
        } else {
            Severity::Warning
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAnalysis {
    pub device: DeviceRecord,
    pub verdict: HealthVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemEntry {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub severity: Severity,
    pub title: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub tool_version: String,
    pub os: OsInfo,
    pub generated_at: String,
    pub devices: Vec<DeviceAnalysis>,
    pub problems: Vec<ProblemEntry>,
    pub stale_driver_count: usize,
    pub statistics: Option<DeviceStatistics>,
    pub recommendations: Vec<Recommendation>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
