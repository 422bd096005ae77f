pub const UNKNOWN: &str = "unknown";
pub const UNREADABLE: &str = "unreadable";
pub const NO_PROBLEM: &str = "normal";
pub const STATUS_OK: &str = "OK";
pub const FETCH_ERROR_PREFIX: &str = "fetch error:";
pub const FETCH_ERROR_DESCRIPTION: &str = "driver info fetch error";

/// One discovered audio device, filled in over three phases: raw attributes,
/// driver info, health flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub name: String,
    pub device_id: String,
    pub description: String,
    pub manufacturer: String,
    pub status: String,
    pub device_class: String,
    pub service_name: String,
    pub hardware_id: String,
    pub problem_code: Option<u32>,
    pub driver_version: String,
    pub driver_date: String,
    pub has_problem: bool,
    pub problem_description: String,
}

impl Default for DeviceRecord {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            device_id: UNKNOWN.to_string(),
            description: UNKNOWN.to_string(),
            manufacturer: UNKNOWN.to_string(),
            status: UNKNOWN.to_string(),
            device_class: UNKNOWN.to_string(),
            service_name: UNKNOWN.to_string(),
            hardware_id: UNKNOWN.to_string(),
            problem_code: None,
            driver_version: UNKNOWN.to_string(),
            driver_date: UNKNOWN.to_string(),
            has_problem: false,
            problem_description: NO_PROBLEM.to_string(),
        }
    }
}

impl DeviceRecord {
    pub fn status_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn driver_fetch_failed(&self) -> bool {
        self.driver_version.starts_with(FETCH_ERROR_PREFIX)
    }

    /// Records a failed driver lookup on this device.
    pub fn mark_driver_fetch_error(&mut self, message: &str) {
        self.driver_version = format!("{FETCH_ERROR_PREFIX} {message}");
        self.has_problem = true;
        self.problem_description = FETCH_ERROR_DESCRIPTION.to_string();
    }
}

/// True when `value` carries real data rather than a sentinel.
pub fn is_known(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != UNKNOWN && value != UNREADABLE
}

/// Empty values collapse into the `unknown` sentinel.
pub fn normalize(value: &str) -> &str {
    if value.trim().is_empty() {
        UNKNOWN
    } else {
        value
    }
}
