use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatistics {
    pub class_count: BTreeMap<String, usize>,
    pub status_count: BTreeMap<String, usize>,
    pub manufacturer_count: BTreeMap<String, usize>,
}
