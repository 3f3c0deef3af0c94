use crate::work_item::{ItemId, TemporalValues, WorkItem};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why the engine assigned new values to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "item")]
pub enum ChangeCause {
    /// The item was edited directly by the caller.
    Edited,
    /// A predecessor of the item (or of one of its ancestors) moved.
    Predecessor(ItemId),
    /// The span of the item's children changed.
    Children,
    /// A start date was inherited from the parent.
    ParentInheritance(ItemId),
    /// Re-derived from the item's own values, for example after snapping.
    Derived,
}

impl ChangeCause {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeCause::Edited => "edited",
            ChangeCause::Predecessor(_) => "predecessor",
            ChangeCause::Children => "children",
            ChangeCause::ParentInheritance(_) => "parent_inheritance",
            ChangeCause::Derived => "derived",
        }
    }

    /// The other item behind the change, if any.
    pub fn item(&self) -> Option<ItemId> {
        match self {
            ChangeCause::Predecessor(id) | ChangeCause::ParentInheritance(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeCause::Edited => write!(f, "edited"),
            ChangeCause::Predecessor(id) => write!(f, "predecessor {id}"),
            ChangeCause::Children => write!(f, "children"),
            ChangeCause::ParentInheritance(id) => write!(f, "inherited from {id}"),
            ChangeCause::Derived => write!(f, "derived"),
        }
    }
}

/// New values the caller should persist for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDates {
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub ignore_non_working_days: bool,
    pub cause: ChangeCause,
}

impl ScheduledDates {
    pub fn new(values: TemporalValues, cause: ChangeCause) -> Self {
        Self {
            start_date: values.start_date,
            due_date: values.due_date,
            duration: values.duration,
            ignore_non_working_days: values.ignore_non_working_days,
            cause,
        }
    }

    pub fn values(&self) -> TemporalValues {
        TemporalValues {
            start_date: self.start_date,
            due_date: self.due_date,
            duration: self.duration,
            ignore_non_working_days: self.ignore_non_working_days,
        }
    }
}

/// Result of one propagation pass. Items without an entry are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleChanges(BTreeMap<ItemId, ScheduledDates>);

impl ScheduleChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ItemId, dates: ScheduledDates) {
        self.0.insert(id, dates);
    }

    pub fn get(&self, id: ItemId) -> Option<&ScheduledDates> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &ScheduledDates)> {
        self.0.iter().map(|(id, dates)| (*id, dates))
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.0.keys().copied()
    }

    /// `item` with the scheduled values applied, if it has an entry.
    pub fn apply_to(&self, item: &WorkItem) -> WorkItem {
        let mut updated = item.clone();
        if let Some(dates) = self.get(item.id) {
            updated.set_temporal(dates.values());
        }
        updated
    }
}
