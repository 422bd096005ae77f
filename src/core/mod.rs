mod device;
mod problem_code;
mod report;
mod severity;
mod statistics;

pub use device::{
    DeviceRecord, FETCH_ERROR_DESCRIPTION, FETCH_ERROR_PREFIX, NO_PROBLEM, STATUS_OK, UNKNOWN,
    UNREADABLE, is_known, normalize,
};
pub use problem_code::ProblemCodeTable;
pub use report::{DeviceAnalysis, HealthVerdict, OsInfo, ProblemEntry, Recommendation, Report};
pub use severity::Severity;
pub use statistics::DeviceStatistics;
