use std::collections::BTreeMap;
use std::sync::OnceLock;

const PROBLEM_CODES: &[(u32, &str)] = &[
    (0, "normal"),
    (1, "device is not configured correctly"),
    (3, "driver may be corrupted"),
    (10, "device cannot start"),
    (12, "not enough free resources for this device"),
    (18, "drivers for this device must be reinstalled"),
    (22, "device is disabled"),
    (28, "drivers for this device are not installed"),
    (31, "device is not working properly"),
    (37, "Windows cannot load the driver for this device"),
    (39, "driver is corrupted or missing"),
    (43, "device was stopped after reporting problems"),
    (45, "device is not currently connected to the computer"),
];

/// Maps Configuration Manager problem codes to descriptions.
#[derive(Debug)]
pub struct ProblemCodeTable {
    codes: BTreeMap<u32, &'static str>,
}

impl ProblemCodeTable {
    pub fn get() -> &'static ProblemCodeTable {
        static TABLE: OnceLock<ProblemCodeTable> = OnceLock::new();
        TABLE.get_or_init(|| ProblemCodeTable {
            codes: PROBLEM_CODES.iter().copied().collect(),
        })
    }

    pub fn describe(&self, code: u32) -> String {
        match self.codes.get(&code) {
            Some(description) => (*description).to_string(),
            None => format!("unknown error ({code})"),
        }
    }
}
