use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DEFAULT_START: NaiveDate = match NaiveDate::from_ymd_opt(2025, 1, 1) {
    Some(date) => date,
    None => NaiveDate::MIN,
};
const DEFAULT_END: NaiveDate = match NaiveDate::from_ymd_opt(2025, 12, 31) {
    Some(date) => date,
    None => NaiveDate::MAX,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleMetadata {
    pub project_name: String,
    pub project_description: String,
    /// First day of the planning horizon. The default calendar covers the
    /// years from here to `project_end_date`.
    pub project_start_date: NaiveDate,
    pub project_end_date: NaiveDate,
}

impl Default for ScheduleMetadata {
    fn default() -> Self {
        Self {
            project_name: "New Project".to_string(),
            project_description: "No description".to_string(),
            project_start_date: DEFAULT_START,
            project_end_date: DEFAULT_END,
        }
    }
}
