use crate::calculations::propagation::{MovedItem, SchedulePropagator};
use crate::calendar::{WorkCalendar, WorkCalendarConfig};
use crate::changes::{ChangeCause, ScheduleChanges};
use crate::edit::WorkItemEdit;
use crate::error::{ScheduleError, ScheduleResult};
use crate::metadata::ScheduleMetadata;
use crate::network::WorkItemNetwork;
use crate::validation::{ContractValidator, ScheduleValidator};
use crate::work_item::{Attribute, FollowsRelation, ItemId, TouchedAttributes, WorkItem};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct RescheduleSummary {
    pub moved: ItemId,
    pub changed_count: usize,
    pub predecessor_count: usize,
    pub children_count: usize,
    pub inherited_count: usize,
    pub earliest_start: Option<NaiveDate>,
    pub latest_due: Option<NaiveDate>,
    pub changes: ScheduleChanges,
}

impl RescheduleSummary {
    fn from_changes(moved: ItemId, changes: ScheduleChanges) -> Self {
        let mut predecessor_count = 0usize;
        let mut children_count = 0usize;
        let mut inherited_count = 0usize;
        for (_, dates) in changes.iter() {
            match dates.cause {
                ChangeCause::Predecessor(_) => predecessor_count += 1,
                ChangeCause::Children => children_count += 1,
                ChangeCause::ParentInheritance(_) => inherited_count += 1,
                ChangeCause::Edited | ChangeCause::Derived => {}
            }
        }
        let earliest_start = changes.iter().filter_map(|(_, dates)| dates.start_date).min();
        let latest_due = changes.iter().filter_map(|(_, dates)| dates.due_date).max();

        Self {
            moved,
            changed_count: changes.len(),
            predecessor_count,
            children_count,
            inherited_count,
            earliest_start,
            latest_due,
            changes,
        }
    }

    pub fn to_cli_summary(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!("moved={}", self.moved));
        parts.push(format!("changed={}", self.changed_count));
        if let Some(date) = self.earliest_start {
            parts.push(format!("start={}", date));
        }
        if let Some(date) = self.latest_due {
            parts.push(format!("due={}", date));
        }
        if self.predecessor_count > 0 {
            parts.push(format!("by_predecessor={}", self.predecessor_count));
        }
        if self.children_count > 0 {
            parts.push(format!("by_children={}", self.children_count));
        }
        if self.inherited_count > 0 {
            parts.push(format!("inherited={}", self.inherited_count));
        }
        parts.join(", ")
    }
}

/// Work items, their relations and the calendar they are scheduled on.
///
/// Every mutation is staged on a copy of the network, propagated and
/// validated, and committed only when the whole batch is accepted.
pub struct Schedule {
    network: WorkItemNetwork,
    metadata: ScheduleMetadata,
    calendar: WorkCalendar,
    calendar_is_custom: bool,
    validator: Box<dyn ScheduleValidator>,
    last_changes: ScheduleChanges,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Schedule {
    pub fn new() -> Self {
        Self::new_with_metadata(ScheduleMetadata::default())
    }

    pub fn new_with_metadata(metadata: ScheduleMetadata) -> Self {
        let calendar = Self::calendar_for_metadata(&metadata);
        Self::from_parts(metadata, calendar, false, WorkItemNetwork::new())
    }

    pub fn new_with_metadata_and_calendar(metadata: ScheduleMetadata, calendar: WorkCalendar) -> Self {
        Self::from_parts(metadata, calendar, true, WorkItemNetwork::new())
    }

    pub(crate) fn from_parts(
        metadata: ScheduleMetadata,
        calendar: WorkCalendar,
        calendar_is_custom: bool,
        network: WorkItemNetwork,
    ) -> Self {
        Self {
            network,
            metadata,
            calendar,
            calendar_is_custom,
            validator: Box::new(ContractValidator::default()),
            last_changes: ScheduleChanges::new(),
        }
    }

    pub fn with_validator(mut self, validator: impl ScheduleValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn network(&self) -> &WorkItemNetwork {
        &self.network
    }

    pub fn item(&self, id: ItemId) -> Option<&WorkItem> {
        self.network.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &WorkItem> {
        self.network.items()
    }

    pub fn relations(&self) -> &[FollowsRelation] {
        self.network.relations()
    }

    pub fn next_id(&self) -> ItemId {
        self.network.next_id()
    }

    pub fn metadata(&self) -> &ScheduleMetadata {
        &self.metadata
    }

    pub fn calendar(&self) -> &WorkCalendar {
        &self.calendar
    }

    pub fn calendar_is_custom(&self) -> bool {
        self.calendar_is_custom
    }

    pub fn calendar_config(&self) -> WorkCalendarConfig {
        self.calendar.to_config()
    }

    /// Changes committed by the most recent successful operation.
    pub fn last_changes(&self) -> &ScheduleChanges {
        &self.last_changes
    }

    pub fn set_metadata(&mut self, metadata: ScheduleMetadata) -> ScheduleResult<()> {
        if metadata.project_start_date > metadata.project_end_date {
            return Err(ScheduleError::InvalidHorizon {
                start: metadata.project_start_date,
                end: metadata.project_end_date,
            });
        }
        if !self.calendar_is_custom {
            self.calendar = Self::calendar_for_metadata(&metadata);
        }
        self.metadata = metadata;
        Ok(())
    }

    pub fn set_project_name(&mut self, name: impl Into<String>) {
        self.metadata.project_name = name.into();
    }

    pub fn set_project_description(&mut self, description: impl Into<String>) {
        self.metadata.project_description = description.into();
    }

    /// Replace the calendar. Stored dates are kept until items are
    /// rescheduled.
    pub fn set_calendar(&mut self, calendar: WorkCalendar) {
        self.calendar = calendar;
        self.calendar_is_custom = true;
    }

    pub fn set_calendar_from_config(&mut self, config: &WorkCalendarConfig) -> ScheduleResult<()> {
        let calendar = WorkCalendar::from_config(config)?;
        self.set_calendar(calendar);
        Ok(())
    }

    pub fn reset_calendar_to_default(&mut self) {
        self.calendar = Self::calendar_for_metadata(&self.metadata);
        self.calendar_is_custom = false;
    }

    fn calendar_for_metadata(metadata: &ScheduleMetadata) -> WorkCalendar {
        WorkCalendar::with_year_range(
            metadata.project_start_date.year(),
            metadata.project_end_date.year(),
        )
    }

    /// Insert a new item and schedule it. Every value it carries counts as
    /// supplied by the caller.
    pub fn add_item(&mut self, item: WorkItem) -> ScheduleResult<RescheduleSummary> {
        let touched = Self::supplied_attributes(&item);
        let id = item.id;
        let mut staged = self.network.clone();
        staged.insert(item)?;
        self.commit(staged, MovedItem::new(id).with_touched(touched))
    }

    fn supplied_attributes(item: &WorkItem) -> TouchedAttributes {
        let mut touched = TouchedAttributes::new();
        if item.start_date.is_some() {
            touched.insert(Attribute::StartDate);
        }
        if item.due_date.is_some() {
            touched.insert(Attribute::DueDate);
        }
        if item.duration.is_some() {
            touched.insert(Attribute::Duration);
        }
        if item.is_milestone {
            touched.insert(Attribute::Milestone);
        }
        if item.parent.is_some() {
            touched.insert(Attribute::Parent);
        }
        touched
    }

    pub fn apply_edit(&mut self, edit: WorkItemEdit) -> ScheduleResult<RescheduleSummary> {
        let current = self
            .network
            .get(edit.id())
            .ok_or(ScheduleError::UnknownItem(edit.id()))?;
        let updated = edit.apply(current);
        let former_parent = if current.parent != updated.parent {
            current.parent
        } else {
            None
        };

        let mut staged = self.network.clone();
        staged.update(updated)?;
        let moved = MovedItem::new(edit.id())
            .with_touched(edit.touched())
            .with_former_parent(former_parent);
        self.commit(staged, moved)
    }

    /// Recompute an item and everything that depends on it without editing
    /// it.
    pub fn reschedule(&mut self, id: ItemId) -> ScheduleResult<RescheduleSummary> {
        if !self.network.contains(id) {
            return Err(ScheduleError::UnknownItem(id));
        }
        let staged = self.network.clone();
        self.commit(staged, MovedItem::new(id))
    }

    /// Remove an item. Its children become top-level items and its former
    /// parent is rescheduled.
    pub fn remove_item(&mut self, id: ItemId) -> ScheduleResult<WorkItem> {
        let mut staged = self.network.clone();
        let removed = staged.remove(id)?;
        match removed.parent {
            Some(parent) => {
                self.commit(staged, MovedItem::new(parent))?;
            }
            None => {
                self.network = staged;
                self.last_changes = ScheduleChanges::new();
            }
        }
        info!(item = %id, "work item removed");
        Ok(removed)
    }

    /// Make `successor` follow `predecessor` and reschedule the successor.
    pub fn add_relation(
        &mut self,
        predecessor: ItemId,
        successor: ItemId,
        lag: u32,
    ) -> ScheduleResult<RescheduleSummary> {
        let mut staged = self.network.clone();
        staged.add_relation(FollowsRelation::new(predecessor, successor, lag))?;
        self.commit(staged, MovedItem::new(successor))
    }

    /// Drop a follows relation. The successor keeps its dates.
    pub fn remove_relation(&mut self, predecessor: ItemId, successor: ItemId) -> bool {
        let removed = self.network.remove_relation(predecessor, successor);
        if removed {
            debug!(%predecessor, %successor, "follows relation removed");
        }
        removed
    }

    /// Groups of items on a follows or parent cycle.
    pub fn cycles(&self) -> Vec<Vec<ItemId>> {
        self.network.cycles()
    }

    fn commit(&mut self, mut staged: WorkItemNetwork, moved: MovedItem) -> ScheduleResult<RescheduleSummary> {
        let changes = SchedulePropagator::new(&staged, &self.calendar)
            .propagate_and_validate(&moved, self.validator.as_ref())?;

        for (id, _) in changes.iter() {
            if let Some(item) = staged.get(id) {
                let updated = changes.apply_to(item);
                staged.update(updated)?;
            }
        }
        self.network = staged;
        self.last_changes = changes.clone();

        let summary = RescheduleSummary::from_changes(moved.id, changes);
        info!(summary = %summary.to_cli_summary(), "schedule updated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_must_be_ordered() {
        let mut schedule = Schedule::new();
        let mut metadata = ScheduleMetadata::default();
        metadata.project_start_date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        metadata.project_end_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(matches!(
            schedule.set_metadata(metadata),
            Err(ScheduleError::InvalidHorizon { .. })
        ));
    }

    #[test]
    fn summary_lists_causes() {
        let mut schedule = Schedule::new_with_metadata_and_calendar(
            ScheduleMetadata::default(),
            WorkCalendar::weekdays_only(),
        );
        let start = NaiveDate::from_ymd_opt(2024, 1, 8);
        schedule
            .add_item(WorkItem::new(ItemId(1), "design").with_dates(start, None).with_duration(3))
            .unwrap();
        schedule
            .add_item(WorkItem::new(ItemId(2), "build").with_dates(start, None).with_duration(2))
            .unwrap();
        let summary = schedule.add_relation(ItemId(1), ItemId(2), 0).unwrap();
        assert_eq!(
            summary.to_cli_summary(),
            "moved=#2, changed=1, start=2024-01-11, due=2024-01-12"
        );
    }
}
