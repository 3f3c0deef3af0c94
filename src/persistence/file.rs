use super::{PersistenceError, PersistenceResult};
use crate::calendar::{WorkCalendar, WorkCalendarConfig};
use crate::changes::ScheduleChanges;
use crate::metadata::ScheduleMetadata;
use crate::network::WorkItemNetwork;
use crate::work_item::{FollowsRelation, ItemId, SchedulingMode, WorkItem};
use crate::Schedule;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::debug;

#[derive(Serialize, Deserialize)]
struct ScheduleSnapshot {
    metadata: ScheduleMetadata,
    calendar: WorkCalendarConfig,
    #[serde(default)]
    calendar_is_custom: bool,
    items: Vec<WorkItem>,
    #[serde(default)]
    relations: Vec<FollowsRelation>,
}

impl ScheduleSnapshot {
    fn from_schedule(schedule: &Schedule) -> PersistenceResult<Self> {
        let items: Vec<WorkItem> = schedule.items().cloned().collect();
        super::validate_items(&items)?;
        Ok(Self {
            metadata: schedule.metadata().clone(),
            calendar: schedule.calendar_config(),
            calendar_is_custom: schedule.calendar_is_custom(),
            items,
            relations: schedule.relations().to_vec(),
        })
    }

    fn into_schedule(self) -> PersistenceResult<Schedule> {
        super::validate_items(&self.items)?;
        if self.metadata.project_start_date > self.metadata.project_end_date {
            return Err(PersistenceError::InvalidData(format!(
                "project start date {} is after project end date {}",
                self.metadata.project_start_date, self.metadata.project_end_date
            )));
        }
        let calendar = WorkCalendar::from_config(&self.calendar)?;
        let network = WorkItemNetwork::from_parts(self.items, self.relations)?;
        Ok(Schedule::from_parts(
            self.metadata,
            calendar,
            self.calendar_is_custom,
            network,
        ))
    }
}

pub fn save_schedule_to_json<P: AsRef<Path>>(
    schedule: &Schedule,
    path: P,
) -> PersistenceResult<()> {
    let snapshot = ScheduleSnapshot::from_schedule(schedule)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_schedule_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Schedule> {
    let file = File::open(path)?;
    let snapshot: ScheduleSnapshot = serde_json::from_reader(file)?;
    debug!(items = snapshot.items.len(), "loaded schedule snapshot");
    snapshot.into_schedule()
}

pub fn save_calendar_config<P: AsRef<Path>>(
    config: &WorkCalendarConfig,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;
    Ok(())
}

pub fn load_calendar_config<P: AsRef<Path>>(path: P) -> PersistenceResult<WorkCalendarConfig> {
    let file = File::open(path)?;
    let config: WorkCalendarConfig = serde_json::from_reader(file)?;
    // Reject an empty working week before it reaches a schedule.
    WorkCalendar::from_config(&config)?;
    Ok(config)
}

#[derive(Serialize, Deserialize)]
struct WorkItemCsvRecord {
    id: u64,
    subject: String,
    start_date: String,
    due_date: String,
    duration: String,
    ignore_non_working_days: bool,
    scheduling_mode: String,
    is_milestone: bool,
    parent_id: String,
    /// Predecessor ids, `id` or `id+lag`, comma separated.
    predecessors: String,
}

impl WorkItemCsvRecord {
    fn from_item(item: &WorkItem, network: &WorkItemNetwork) -> Self {
        let predecessors = network
            .predecessors(item.id)
            .map(|relation| match relation.lag {
                0 => relation.predecessor.0.to_string(),
                lag => format!("{}+{}", relation.predecessor.0, lag),
            })
            .collect::<Vec<_>>()
            .join(",");
        Self {
            id: item.id.0,
            subject: item.subject.clone(),
            start_date: format_date(item.start_date),
            due_date: format_date(item.due_date),
            duration: format_option_i64(item.duration),
            ignore_non_working_days: item.ignore_non_working_days,
            scheduling_mode: item.scheduling_mode.as_str().to_string(),
            is_milestone: item.is_milestone,
            parent_id: item.parent.map(|parent| parent.0.to_string()).unwrap_or_default(),
            predecessors,
        }
    }

    fn into_parts(self) -> PersistenceResult<(WorkItem, Vec<FollowsRelation>)> {
        let id = ItemId(self.id);
        let mut item = WorkItem::new(id, self.subject);
        item.start_date = parse_date(&self.start_date)?;
        item.due_date = parse_date(&self.due_date)?;
        item.duration = parse_i64(&self.duration)?;
        item.ignore_non_working_days = self.ignore_non_working_days;
        item.is_milestone = self.is_milestone;
        item.parent = parse_optional_id(&self.parent_id)?;
        item.scheduling_mode = SchedulingMode::parse(&self.scheduling_mode).ok_or_else(|| {
            PersistenceError::InvalidData(format!(
                "invalid scheduling_mode '{}'",
                self.scheduling_mode
            ))
        })?;
        let relations = split_predecessors(&self.predecessors)?
            .into_iter()
            .map(|(predecessor, lag)| FollowsRelation::new(predecessor, id, lag))
            .collect();
        Ok((item, relations))
    }
}

pub fn save_schedule_to_csv<P: AsRef<Path>>(
    schedule: &Schedule,
    path: P,
) -> PersistenceResult<()> {
    let items: Vec<WorkItem> = schedule.items().cloned().collect();
    super::validate_items(&items)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for item in &items {
        writer.serialize(WorkItemCsvRecord::from_item(item, schedule.network()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Load items and follows relations from CSV. The stored dates are kept as
/// they are; no item is rescheduled.
pub fn load_schedule_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Schedule> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut items = Vec::new();
    let mut relations = Vec::new();
    for record in reader.deserialize::<WorkItemCsvRecord>() {
        let (item, item_relations) = record?.into_parts()?;
        items.push(item);
        relations.extend(item_relations);
    }

    if items.is_empty() {
        return Err(PersistenceError::InvalidData(
            "CSV file contained no work items".into(),
        ));
    }

    super::validate_items(&items)?;

    // CSV carries no metadata or calendar, so the defaults are used.
    let network = WorkItemNetwork::from_parts(items, relations)?;
    let metadata = ScheduleMetadata::default();
    let calendar = WorkCalendar::with_year_range(
        metadata.project_start_date.year(),
        metadata.project_end_date.year(),
    );
    Ok(Schedule::from_parts(metadata, calendar, false, network))
}

#[derive(Serialize)]
struct ChangeCsvRecord {
    id: u64,
    start_date: String,
    due_date: String,
    duration: String,
    ignore_non_working_days: bool,
    cause: &'static str,
    cause_item: String,
}

/// Write one row per changed item, in id order.
pub fn export_changes_to_csv<P: AsRef<Path>>(
    changes: &ScheduleChanges,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for (id, dates) in changes.iter() {
        writer.serialize(ChangeCsvRecord {
            id: id.0,
            start_date: format_date(dates.start_date),
            due_date: format_date(dates.due_date),
            duration: format_option_i64(dates.duration),
            ignore_non_working_days: dates.ignore_non_working_days,
            cause: dates.cause.kind(),
            cause_item: dates.cause.item().map(|item| item.0.to_string()).unwrap_or_default(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_date(input: &str) -> PersistenceResult<Option<NaiveDate>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn format_option_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_i64(input: &str) -> PersistenceResult<Option<i64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid integer '{input}': {e}")))
}

fn parse_optional_id(input: &str) -> PersistenceResult<Option<ItemId>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<u64>()
        .map(|id| Some(ItemId(id)))
        .map_err(|e| PersistenceError::InvalidData(format!("invalid work item id '{input}': {e}")))
}

fn split_predecessors(input: &str) -> PersistenceResult<Vec<(ItemId, u32)>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            let (id, lag) = part.split_once('+').unwrap_or((part, "0"));
            let id = id
                .trim()
                .parse::<u64>()
                .map_err(|e| PersistenceError::InvalidData(format!("invalid predecessor '{part}': {e}")))?;
            let lag = lag
                .trim()
                .parse::<u32>()
                .map_err(|e| PersistenceError::InvalidData(format!("invalid lag in '{part}': {e}")))?;
            Ok((ItemId(id), lag))
        })
        .collect()
}
