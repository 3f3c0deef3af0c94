use crate::calendar::CalendarError;
use crate::validation::ValidationErrors;
use crate::work_item::ItemId;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("work item {0} does not exist")]
    UnknownItem(ItemId),
    #[error("work item {0} already exists")]
    DuplicateItem(ItemId),
    #[error("work item {0} cannot be its own parent")]
    SelfParent(ItemId),
    #[error("work item {0} cannot follow itself")]
    SelfRelation(ItemId),
    #[error("project start date {start} must be on or before project end date {end}")]
    InvalidHorizon { start: NaiveDate, end: NaiveDate },
    #[error("schedule rejected: {0}")]
    Rejected(ValidationErrors),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
