use anyhow::Result;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use tracing::{debug, warn};

use crate::core::{DeviceRecord, UNKNOWN, is_known};
use crate::directory::DeviceDirectory;

/// Fills `driver_version` and `driver_date`, falling back to the service's
/// system driver when no signed driver version is known.
///
/// Lookup failures are recorded on the device instead of being returned.
pub fn resolve_driver(directory: &dyn DeviceDirectory, record: &mut DeviceRecord) {
    if let Err(err) = try_resolve_driver(directory, record) {
        warn!(device = %record.name, "driver lookup failed: {err:#}");
        record.mark_driver_fetch_error(&err.to_string());
    }
}

pub fn resolve_drivers(directory: &dyn DeviceDirectory, records: &mut [DeviceRecord]) {
    for record in records.iter_mut() {
        resolve_driver(directory, record);
    }
}

fn try_resolve_driver(directory: &dyn DeviceDirectory, record: &mut DeviceRecord) -> Result<()> {
    if is_known(&record.device_id) {
        if let Some(driver) = directory.signed_driver(&record.device_id)? {
            record.driver_version = known_or_unknown(driver.version);
            record.driver_date = driver
                .date
                .filter(|d| is_known(d))
                .map(|d| display_date(&d))
                .unwrap_or_else(|| UNKNOWN.to_string());
        }
    }

    if is_known(&record.driver_version) || !is_known(&record.service_name) {
        return Ok(());
    }

    debug!(service = %record.service_name, "falling back to system driver");
    if let Some(driver) = directory.system_driver(&record.service_name)? {
        record.driver_version = known_or_unknown(driver.version);
        if let Some(install_date) = driver.install_date.filter(|d| is_known(d)) {
            record.driver_date = display_date(&install_date);
        }
    }
    Ok(())
}

fn known_or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| is_known(v))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// `yyyy/MM/dd` when the value parses as a date, otherwise the raw value.
pub fn display_date(raw: &str) -> String {
    match parse_driver_date(raw) {
        Some(dt) => format_date(dt.date()).unwrap_or_else(|| raw.to_string()),
        None => raw.to_string(),
    }
}

pub fn format_date(date: Date) -> Option<String> {
    date.format(format_description!("[year]/[month]/[day]")).ok()
}

/// Accepts `yyyy/MM/dd`, `yyyy-MM-dd` and DMTF timestamps
/// (`yyyyMMddHHmmss.ffffff+UUU`, offset in minutes).
pub fn parse_driver_date(raw: &str) -> Option<OffsetDateTime> {
    let s = raw.trim();
    if let Some(date) = parse_separated_date(s) {
        return Some(PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc());
    }
    parse_dmtf(s)
}

fn parse_separated_date(s: &str) -> Option<Date> {
    let sep = if s.contains('/') { '/' } else { '-' };
    let mut parts = s.split(sep);
    let year = parts.next()?;
    let month = parts.next()?;
    let day = parts.next()?;
    if parts.next().is_some() || year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    if day.is_empty() || day.len() > 2 {
        return None;
    }
    calendar_date(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_dmtf(s: &str) -> Option<OffsetDateTime> {
    let digits = s.get(..14)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let num = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();
    let date = calendar_date(num(0..4)? as i32, num(4..6)? as u8, num(6..8)? as u8)?;
    let time = Time::from_hms(num(8..10)? as u8, num(10..12)? as u8, num(12..14)? as u8).ok()?;

    let offset = match s.get(21..25) {
        Some(tail) => {
            if let Some(minutes) = tail.strip_prefix('+') {
                minutes.parse::<i32>().ok()?
            } else if let Some(minutes) = tail.strip_prefix('-') {
                -minutes.parse::<i32>().ok()?
            } else {
                return None;
            }
        }
        None => 0,
    };
    let offset = UtcOffset::from_whole_seconds(offset * 60).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

fn calendar_date(year: i32, month: u8, day: u8) -> Option<Date> {
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}
