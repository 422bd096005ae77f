use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::enumerate::{DEFAULT_DEVICE_CLASSES, DEFAULT_NAME_KEYWORDS};
use crate::health::DEFAULT_STALE_AFTER_DAYS;

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub scan: ScanConfig,
    pub drivers: DriversConfig,
    pub source: SourceConfig,
    pub config_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub pause_on_exit: bool,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub device_classes: Vec<String>,
    pub name_keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DriversConfig {
    pub stale_after_days: i64,
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub powershell: String,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                color: true,
                pause_on_exit: true,
            },
            scan: ScanConfig {
                device_classes: DEFAULT_DEVICE_CLASSES.iter().map(|s| s.to_string()).collect(),
                name_keywords: DEFAULT_NAME_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            },
            drivers: DriversConfig {
                stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            },
            source: SourceConfig {
                powershell: "powershell".to_string(),
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    scan: Option<RawScanConfig>,
    drivers: Option<RawDriversConfig>,
    source: Option<RawSourceConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawUiConfig {
    color: Option<bool>,
    pause_on_exit: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScanConfig {
    device_classes: Option<Vec<String>>,
    name_keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDriversConfig {
    stale_after_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSourceConfig {
    powershell: Option<String>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/audiodiag/config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: Option<&Path>) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .or_else(|| home_dir.map(default_config_path));

    if let Some(path) = path.filter(|p| p.exists()) {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s)
            .with_context(|| format!("failed to parse config file (TOML): {}", path.display()))?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(pause_on_exit) = ui.pause_on_exit {
            cfg.ui.pause_on_exit = pause_on_exit;
        }
    }

    if let Some(scan) = raw.scan {
        if let Some(device_classes) = scan.device_classes {
            cfg.scan.device_classes = device_classes;
        }
        if let Some(name_keywords) = scan.name_keywords {
            cfg.scan.name_keywords = name_keywords;
        }
    }

    if let Some(drivers) = raw.drivers {
        if let Some(stale_after_days) = drivers.stale_after_days {
            cfg.drivers.stale_after_days = stale_after_days;
        }
    }

    if let Some(source) = raw.source {
        if let Some(powershell) = source.powershell {
            cfg.source.powershell = powershell;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("AUDIODIAG_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "AUDIODIAG_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("AUDIODIAG_UI_PAUSE_ON_EXIT") {
        cfg.ui.pause_on_exit = parse_bool(&v).with_context(|| "AUDIODIAG_UI_PAUSE_ON_EXIT")?;
    }
    if let Ok(v) = std::env::var("AUDIODIAG_SCAN_DEVICE_CLASSES") {
        let parts = parse_list(&v);
        if !parts.is_empty() {
            cfg.scan.device_classes = parts;
        }
    }
    if let Ok(v) = std::env::var("AUDIODIAG_SCAN_NAME_KEYWORDS") {
        let parts = parse_list(&v);
        if !parts.is_empty() {
            cfg.scan.name_keywords = parts;
        }
    }
    if let Ok(v) = std::env::var("AUDIODIAG_DRIVERS_STALE_AFTER_DAYS") {
        cfg.drivers.stale_after_days = v
            .trim()
            .parse::<i64>()
            .with_context(|| "AUDIODIAG_DRIVERS_STALE_AFTER_DAYS")?;
    }
    if let Ok(v) = std::env::var("AUDIODIAG_SOURCE_POWERSHELL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.source.powershell = v.to_string();
        }
    }

    Ok(())
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    if cfg.scan.device_classes.is_empty() {
        anyhow::bail!("scan.device_classes must list at least one device class");
    }
    if cfg.drivers.stale_after_days < 0 {
        anyhow::bail!(
            "drivers.stale_after_days must not be negative: {}",
            cfg.drivers.stale_after_days
        );
    }
    if cfg.source.powershell.trim().is_empty() {
        anyhow::bail!("source.powershell must not be empty");
    }
    Ok(())
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
