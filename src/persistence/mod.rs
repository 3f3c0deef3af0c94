use crate::calendar::CalendarError;
use crate::error::ScheduleError;
use crate::work_item::WorkItem;
use crate::Schedule;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("invalid calendar: {0}")]
    Calendar(#[from] CalendarError),
    #[error("no schedule stored")]
    NotFound,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

pub trait ScheduleStore {
    fn save_schedule(&self, schedule: &Schedule) -> PersistenceResult<()>;
    fn load_schedule(&self) -> PersistenceResult<Option<Schedule>>;
}

/// A [`ScheduleStore`] backed by one JSON snapshot file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ScheduleStore for JsonFileStore {
    fn save_schedule(&self, schedule: &Schedule) -> PersistenceResult<()> {
        file::save_schedule_to_json(schedule, &self.path)
    }

    fn load_schedule(&self) -> PersistenceResult<Option<Schedule>> {
        match file::load_schedule_from_json(&self.path) {
            Ok(schedule) => Ok(Some(schedule)),
            Err(PersistenceError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Checks stored items before they are trusted without rescheduling.
pub fn validate_items(items: &[WorkItem]) -> PersistenceResult<()> {
    let mut seen_ids = HashSet::with_capacity(items.len());
    for item in items {
        if !seen_ids.insert(item.id) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate work item id {}",
                item.id
            )));
        }
        if let Some(duration) = item.duration.filter(|duration| *duration <= 0) {
            return Err(PersistenceError::InvalidData(format!(
                "work item {} has non-positive duration {}",
                item.id, duration
            )));
        }
        if let (Some(start), Some(due)) = (item.start_date, item.due_date) {
            if start > due {
                return Err(PersistenceError::InvalidData(format!(
                    "work item {} starts on {start}, after its due date {due}",
                    item.id
                )));
            }
        }
        if item.is_milestone && item.start_date != item.due_date {
            return Err(PersistenceError::InvalidData(format!(
                "milestone {} must start and finish on the same day",
                item.id
            )));
        }
    }
    Ok(())
}

pub mod file;

pub use file::{
    export_changes_to_csv, load_calendar_config, load_schedule_from_csv, load_schedule_from_json,
    save_calendar_config, save_schedule_to_csv, save_schedule_to_json,
};
