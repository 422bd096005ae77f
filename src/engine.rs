use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::core::{
    DeviceAnalysis, DeviceRecord, FETCH_ERROR_DESCRIPTION, OsInfo, ProblemEntry, Recommendation,
    Report, Severity,
};
use crate::directory::DeviceDirectory;
use crate::health::{self, HealthPolicy};
use crate::{drivers, enumerate, platform, stats};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
    pub show_progress: bool,
    pub device_classes: Vec<String>,
    pub name_keywords: Vec<String>,
    pub policy: HealthPolicy,
}

pub struct Engine {
    opts: EngineOptions,
    directory: Box<dyn DeviceDirectory>,
}

impl Engine {
    pub fn new(opts: EngineOptions, directory: Box<dyn DeviceDirectory>) -> Self {
        Self { opts, directory }
    }

    pub fn diagnose(&self) -> Result<Report> {
        self.diagnose_at(OffsetDateTime::now_utc())
    }

    pub fn diagnose_at(&self, now: OffsetDateTime) -> Result<Report> {
        use std::io::IsTerminal;
        let progress_enabled = self.opts.show_progress && std::io::stderr().is_terminal();
        let pb = if progress_enabled {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb.set_message("Enumerating audio devices...");
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let filters = enumerate::filters(&self.opts.device_classes, &self.opts.name_keywords);
        let enumerated = enumerate::enumerate(self.directory.as_ref(), &filters);
        let mut devices = match enumerated {
            Ok(devices) => devices,
            Err(err) => {
                if let Some(pb) = pb {
                    pb.finish_and_clear();
                }
                return Err(err);
            }
        };
        info!(devices = devices.len(), "enumerated audio devices");

        if let Some(pb) = &pb {
            pb.set_message("Reading driver information...");
        }
        drivers::resolve_drivers(self.directory.as_ref(), &mut devices);

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let os = platform::os_info(std::cmp::min(self.opts.timeout, Duration::from_secs(2)));
        Ok(build_report(devices, now, &self.opts.policy, os))
    }
}

/// Classifies and aggregates finalized device records into report data.
pub fn build_report(
    devices: Vec<DeviceRecord>,
    now: OffsetDateTime,
    policy: &HealthPolicy,
    os: OsInfo,
) -> Report {
    let generated_at = now
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    if devices.is_empty() {
        return Report {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            os,
            generated_at,
            devices: Vec::new(),
            problems: Vec::new(),
            stale_driver_count: 0,
            statistics: None,
            recommendations: Vec::new(),
        };
    }

    let problems: Vec<ProblemEntry> = stats::problem_devices(&devices)
        .into_iter()
        .map(|d| ProblemEntry {
            name: d.name.clone(),
            reason: problem_reason(d),
        })
        .collect();
    let stale_driver_count = stats::stale_driver_devices(&devices, now, policy).len();
    let statistics = stats::aggregate(&devices);
    let recommendations = recommendations(problems.len(), stale_driver_count);

    let devices = devices
        .into_iter()
        .map(|device| {
            let verdict = health::classify(&device, now, policy);
            DeviceAnalysis { device, verdict }
        })
        .collect();

    Report {
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        os,
        generated_at,
        devices,
        problems,
        stale_driver_count,
        statistics: Some(statistics),
        recommendations,
    }
}

fn problem_reason(device: &DeviceRecord) -> String {
    if device.driver_fetch_failed() {
        FETCH_ERROR_DESCRIPTION.to_string()
    } else if device.has_problem {
        device.problem_description.clone()
    } else {
        format!("status: {}", device.status)
    }
}

pub fn recommendations(problem_count: usize, stale_count: usize) -> Vec<Recommendation> {
    if problem_count == 0 && stale_count == 0 {
        return vec![Recommendation {
            severity: Severity::Ok,
            title: "No issues requiring action were found.".to_string(),
            steps: vec![],
        }];
    }

    let mut out = Vec::new();
    if problem_count > 0 {
        out.push(Recommendation {
            severity: Severity::Critical,
            title: format!("Action required: {problem_count} device(s) have problems"),
            steps: vec![
                "Open Device Manager".to_string(),
                "Right-click the device with the problem".to_string(),
                "Select \"Update driver\"".to_string(),
                "If \"Search automatically for drivers\" does not help, choose \"Browse my computer for drivers\""
                    .to_string(),
                "Enter C:\\Windows as the search location and select \"Next\"".to_string(),
            ],
        });
    }
    if stale_count > 0 {
        out.push(Recommendation {
            severity: Severity::Warning,
            title: format!("Update recommended: {stale_count} device(s) have outdated drivers"),
            steps: vec![
                "Run Windows Update".to_string(),
                "Download the latest driver from the manufacturer's website".to_string(),
                "Update the driver from Device Manager".to_string(),
            ],
        });
    }
    out.push(Recommendation {
        severity: Severity::Info,
        title: "General tips".to_string(),
        steps: vec![
            "Device Manager: Windows key + X, then Device Manager".to_string(),
            "Windows Update: Settings, Windows Update, Check for updates".to_string(),
            "Manufacturer sites: the official support page for each device".to_string(),
        ],
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-10-19 0:00 UTC);

    fn os() -> OsInfo {
        OsInfo {
            name: "Windows".to_string(),
            version: "10.0".to_string(),
        }
    }

    #[test]
    fn empty_device_list_skips_sections() {
        let report = build_report(Vec::new(), NOW, &HealthPolicy::default(), os());
        assert!(report.is_empty());
        assert!(report.statistics.is_none());
        assert!(report.recommendations.is_empty());
        assert_eq!(report.generated_at, "2026-10-19T00:00:00Z");
    }

    #[test]
    fn problem_reasons_prefer_fetch_error_then_code_then_status() {
        let mut fetch = DeviceRecord {
            name: "fetch".to_string(),
            status: "OK".to_string(),
            ..DeviceRecord::default()
        };
        fetch.mark_driver_fetch_error("timeout");
        let coded = DeviceRecord {
            name: "coded".to_string(),
            status: "Error".to_string(),
            has_problem: true,
            problem_description: "device is disabled".to_string(),
            ..DeviceRecord::default()
        };
        let degraded = DeviceRecord {
            name: "degraded".to_string(),
            status: "Degraded".to_string(),
            ..DeviceRecord::default()
        };

        let report = build_report(
            vec![fetch, coded, degraded],
            NOW,
            &HealthPolicy::default(),
            os(),
        );
        let reasons: Vec<(&str, &str)> = report
            .problems
            .iter()
            .map(|p| (p.name.as_str(), p.reason.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("fetch", "driver info fetch error"),
                ("coded", "device is disabled"),
                ("degraded", "status: Degraded"),
            ]
        );
    }

    #[test]
    fn recommendations_all_clear() {
        let recs = recommendations(0, 0);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].severity, Severity::Ok);
    }

    #[test]
    fn recommendations_for_problems_and_stale_drivers() {
        let recs = recommendations(2, 1);
        let severities: Vec<Severity> = recs.iter().map(|r| r.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Warning, Severity::Info]
        );
        assert!(recs[0].title.contains("2 device(s)"));
        assert!(recs[1].title.contains("1 device(s)"));
    }

    #[test]
    fn stale_only_device_is_not_a_problem() {
        let device = DeviceRecord {
            name: "old".to_string(),
            status: "OK".to_string(),
            driver_version: "1.0".to_string(),
            driver_date: "2020/01/01".to_string(),
            ..DeviceRecord::default()
        };
        let report = build_report(vec![device], NOW, &HealthPolicy::default(), os());
        assert!(report.problems.is_empty());
        assert_eq!(report.stale_driver_count, 1);
        assert!(!report.devices[0].verdict.healthy);
        assert_eq!(report.recommendations[0].severity, Severity::Warning);
    }
}
