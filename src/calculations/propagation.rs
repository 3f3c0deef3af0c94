//! Schedule propagation.
//!
//! One pass takes a moved item, collects every item whose dates may follow
//! from it, and recomputes them in dependency order. Nothing is written to
//! the network: the pass returns a [`ScheduleChanges`] the caller commits.

use super::derivation::{AttributeDeriver, Provenance};
use crate::calendar::Calendar;
use crate::changes::{ChangeCause, ScheduleChanges, ScheduledDates};
use crate::error::{ScheduleError, ScheduleResult};
use crate::graph::{Dependency, DependencyGraph, ScheduleDependency};
use crate::network::WorkItemNetwork;
use crate::validation::ScheduleValidator;
use crate::work_item::{Attribute, ItemId, TemporalValues, TouchedAttributes, WorkItem};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// The item a pass starts from, already carrying the caller's new values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedItem {
    pub id: ItemId,
    pub touched: TouchedAttributes,
    /// Parent the item had before this operation, when it was reparented.
    pub former_parent: Option<ItemId>,
}

impl MovedItem {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            touched: TouchedAttributes::new(),
            former_parent: None,
        }
    }

    pub fn with_touched(mut self, touched: TouchedAttributes) -> Self {
        self.touched = touched;
        self
    }

    pub fn with_former_parent(mut self, former_parent: Option<ItemId>) -> Self {
        self.former_parent = former_parent;
        self
    }
}

/// Values computed so far in one pass, layered over the stored network.
struct Overlay<'a> {
    network: &'a WorkItemNetwork,
    values: HashMap<ItemId, TemporalValues>,
    causes: HashMap<ItemId, ChangeCause>,
}

impl<'a> Overlay<'a> {
    fn new(network: &'a WorkItemNetwork) -> Self {
        Self {
            network,
            values: HashMap::new(),
            causes: HashMap::new(),
        }
    }

    fn get(&self, id: ItemId) -> Option<TemporalValues> {
        self.values
            .get(&id)
            .copied()
            .or_else(|| self.network.get(id).map(WorkItem::temporal))
    }

    fn set(&mut self, id: ItemId, values: TemporalValues, cause: ChangeCause) {
        if self.get(id) != Some(values) {
            self.values.insert(id, values);
            self.causes.insert(id, cause);
        }
    }

    fn into_changes(self, moved: ItemId) -> ScheduleChanges {
        let mut changes = ScheduleChanges::new();
        for (id, values) in &self.values {
            let stored = self.network.get(*id).map(WorkItem::temporal);
            if stored != Some(*values) || *id == moved {
                let cause = self.causes.get(id).copied().unwrap_or(ChangeCause::Derived);
                changes.insert(*id, ScheduledDates::new(*values, cause));
            }
        }
        if let Some(moved_values) = self.get(moved) {
            changes.insert(moved, ScheduledDates::new(moved_values, ChangeCause::Edited));
        }
        changes
    }
}

pub struct SchedulePropagator<'a, C: Calendar> {
    network: &'a WorkItemNetwork,
    calendar: &'a C,
}

impl<'a, C: Calendar> SchedulePropagator<'a, C> {
    pub fn new(network: &'a WorkItemNetwork, calendar: &'a C) -> Self {
        Self { network, calendar }
    }

    /// Recompute every item affected by `moved`. The moved item is always
    /// part of the result.
    #[instrument(skip(self, moved), fields(item = %moved.id))]
    pub fn propagate(&self, moved: &MovedItem) -> ScheduleResult<ScheduleChanges> {
        let item = self
            .network
            .get(moved.id)
            .ok_or(ScheduleError::UnknownItem(moved.id))?;

        let model = ScheduleDependency::build(self.network, moved.id, moved.former_parent);
        let graph = DependencyGraph::new(&model);
        let cycles = graph.cycles();
        if !cycles.is_empty() {
            debug!(?cycles, "propagating through cyclic dependencies");
        }

        let mut overlay = Overlay::new(self.network);
        let deriver = AttributeDeriver::new(self.calendar);
        let initial = item.temporal();
        let derived = deriver.derive(
            initial,
            &Provenance::from_touched(&initial, &moved.touched),
            item.is_milestone,
        );
        overlay.set(moved.id, derived.values, ChangeCause::Edited);

        let untouched = TouchedAttributes::new();
        for id in graph.schedule_order() {
            let (Some(item), Some(dependency)) = (self.network.get(id), model.get(id)) else {
                continue;
            };
            let touched = if id == moved.id { &moved.touched } else { &untouched };
            if let Some((values, cause)) = self.reschedule(item, dependency, touched, &overlay) {
                let cause = if id == moved.id { ChangeCause::Edited } else { cause };
                debug!(item = %id, %cause, ?values, "rescheduled");
                overlay.set(id, values, cause);
            }
        }

        let changes = overlay.into_changes(moved.id);
        debug!(changed = changes.len(), "propagation finished");
        Ok(changes)
    }

    /// Propagate, then submit the whole batch to `validator`.
    pub fn propagate_and_validate(
        &self,
        moved: &MovedItem,
        validator: &dyn ScheduleValidator,
    ) -> ScheduleResult<ScheduleChanges> {
        let changes = self.propagate(moved)?;
        if let Err(errors) = validator.validate(self.network, self.calendar, &changes) {
            warn!(item = %moved.id, %errors, "propagation rejected");
            return Err(ScheduleError::Rejected(errors));
        }
        Ok(changes)
    }

    fn reschedule(
        &self,
        item: &WorkItem,
        dependency: &Dependency,
        touched: &TouchedAttributes,
        overlay: &Overlay<'_>,
    ) -> Option<(TemporalValues, ChangeCause)> {
        let current = overlay.get(item.id)?;
        if item.is_manual() {
            return self.inherit_parent_start(item, dependency, current, touched, overlay);
        }
        if item.is_milestone && dependency.has_children() {
            debug!(item = %item.id, "milestone with children left for validation");
            return Some((
                AttributeDeriver::<C>::normalize_milestone(current),
                ChangeCause::Derived,
            ));
        }
        if dependency.has_children() {
            return self.reschedule_parent(item, current, overlay);
        }
        Some(self.reschedule_leaf(item, dependency, current, touched, overlay))
    }

    /// Manual items keep their dates unless they have no start and the
    /// parent offers one.
    fn inherit_parent_start(
        &self,
        item: &WorkItem,
        dependency: &Dependency,
        current: TemporalValues,
        touched: &TouchedAttributes,
        overlay: &Overlay<'_>,
    ) -> Option<(TemporalValues, ChangeCause)> {
        if current.start_date.is_some() {
            return None;
        }
        let parent = item.parent?;
        let counting = current.day_counting();
        let (soonest, _) =
            dependency.parent_soonest_start_date(|id| overlay.get(id), self.calendar, counting)?;

        let mut values = current;
        values.start_date = Some(self.calendar.soonest_working_day(soonest, counting));
        let mut touched = touched.clone();
        touched.insert(Attribute::StartDate);
        let derived = AttributeDeriver::new(self.calendar).derive(
            values,
            &Provenance::from_touched(&values, &touched),
            item.is_milestone,
        );
        Some((derived.values, ChangeCause::ParentInheritance(parent)))
    }

    /// Span of an automatic parent: the envelope of its children.
    fn reschedule_parent(
        &self,
        item: &WorkItem,
        current: TemporalValues,
        overlay: &Overlay<'_>,
    ) -> Option<(TemporalValues, ChangeCause)> {
        let children: Vec<TemporalValues> = self
            .network
            .children(item.id)
            .filter_map(|child| overlay.get(child.id))
            .collect();

        let start = children.iter().filter_map(TemporalValues::span_start).min();
        let due = children.iter().filter_map(TemporalValues::span_end).max();
        if start.is_none() && due.is_none() {
            return None;
        }

        let mut values = TemporalValues {
            start_date: start,
            due_date: due,
            duration: current.duration,
            ignore_non_working_days: children.iter().any(|child| child.ignore_non_working_days),
        };
        if let (Some(start), Some(due)) = (start, due) {
            values.duration = Some(self.calendar.duration(start, due, values.day_counting()));
        }
        Some((values, ChangeCause::Children))
    }

    fn reschedule_leaf(
        &self,
        item: &WorkItem,
        dependency: &Dependency,
        current: TemporalValues,
        touched: &TouchedAttributes,
        overlay: &Overlay<'_>,
    ) -> (TemporalValues, ChangeCause) {
        let counting = current.day_counting();
        let constraint = dependency.soonest_start_date(|id| overlay.get(id), self.calendar, counting);

        let start = match constraint {
            Some((soonest, _)) => Some(self.calendar.soonest_working_day(soonest, counting)),
            None => current.start_date,
        };
        let due = match (start, current.due_date, current.usable_duration()) {
            (_, Some(due), _) if touched.contains(Attribute::DueDate) => Some(due),
            (Some(start), Some(due), None) if due >= start => Some(due),
            (Some(start), _, Some(duration)) => self.calendar.due_date(start, duration, counting).or(current.due_date),
            (_, due, _) => due,
        };

        let mut values = TemporalValues {
            start_date: start,
            due_date: due,
            ..current
        };
        // A touched duration survives only while the dates it was derived with stay put.
        let dates_moved = start != current.start_date || due != current.due_date;
        if let (Some(start), Some(due)) = (start, due) {
            let duration = self.calendar.duration(start, due, counting);
            if duration > 0 && (dates_moved || !touched.contains(Attribute::Duration)) {
                values.duration = Some(duration);
            }
        }

        let deriver = AttributeDeriver::new(self.calendar);
        if item.is_milestone {
            values = AttributeDeriver::<C>::normalize_milestone(values);
        }
        values = deriver.snap(values, item.is_milestone);

        let cause = match constraint {
            Some((_, predecessor)) => ChangeCause::Predecessor(predecessor),
            None => ChangeCause::Derived,
        };
        (values, cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WorkCalendar;
    use crate::work_item::FollowsRelation;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn moved_item_is_always_reported() {
        let network = WorkItemNetwork::from_parts(
            vec![WorkItem::new(ItemId(1), "task").with_dates(Some(d(2024, 1, 8)), Some(d(2024, 1, 10)))],
            Vec::new(),
        )
        .unwrap();
        let calendar = WorkCalendar::weekdays_only();
        let changes = SchedulePropagator::new(&network, &calendar)
            .propagate(&MovedItem::new(ItemId(1)))
            .unwrap();
        let dates = changes.get(ItemId(1)).unwrap();
        assert_eq!(dates.cause, ChangeCause::Edited);
        assert_eq!(dates.duration, Some(3));
    }

    #[test]
    fn unknown_moved_item_is_an_error() {
        let network = WorkItemNetwork::new();
        let calendar = WorkCalendar::weekdays_only();
        let result = SchedulePropagator::new(&network, &calendar).propagate(&MovedItem::new(ItemId(7)));
        assert_eq!(result, Err(ScheduleError::UnknownItem(ItemId(7))));
    }

    #[test]
    fn mutual_predecessors_terminate() {
        let items = vec![
            WorkItem::new(ItemId(1), "a").with_dates(Some(d(2024, 1, 8)), None).with_duration(2),
            WorkItem::new(ItemId(2), "b").with_dates(Some(d(2024, 1, 8)), None).with_duration(2),
        ];
        let network = WorkItemNetwork::from_parts(
            items,
            vec![
                FollowsRelation::new(ItemId(1), ItemId(2), 0),
                FollowsRelation::new(ItemId(2), ItemId(1), 0),
            ],
        )
        .unwrap();
        let calendar = WorkCalendar::weekdays_only();
        let changes = SchedulePropagator::new(&network, &calendar)
            .propagate(&MovedItem::new(ItemId(1)))
            .unwrap();
        assert!(changes.contains(ItemId(1)));
        assert!(changes.contains(ItemId(2)));
    }
}
