use crate::calendar::DayCounting;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// Dates are owned by the caller.
    Manual,
    /// Dates follow from predecessors and children.
    #[default]
    Automatic,
}

impl SchedulingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingMode::Manual => "manual",
            SchedulingMode::Automatic => "automatic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "manual" => Some(SchedulingMode::Manual),
            "automatic" | "auto" => Some(SchedulingMode::Automatic),
            _ => None,
        }
    }
}

/// Attributes a caller can explicitly supply in one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    StartDate,
    DueDate,
    Duration,
    IgnoreNonWorkingDays,
    SchedulingMode,
    Milestone,
    Parent,
}

/// The set of attributes touched by the caller in the current operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouchedAttributes(BTreeSet<Attribute>);

impl TouchedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: Attribute) {
        self.0.insert(attribute);
    }

    pub fn contains(&self, attribute: Attribute) -> bool {
        self.0.contains(&attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.0.iter().copied()
    }

    /// Whether any of start, due or duration was supplied.
    pub fn touches_dates(&self) -> bool {
        [Attribute::StartDate, Attribute::DueDate, Attribute::Duration]
            .into_iter()
            .any(|attribute| self.contains(attribute))
    }
}

impl FromIterator<Attribute> for TouchedAttributes {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Provenance of one temporal field in the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Touched,
    UntouchedPresent,
    Absent,
}

impl FieldState {
    pub fn of(present: bool, touched: bool) -> Self {
        match (touched, present) {
            (true, _) => FieldState::Touched,
            (false, true) => FieldState::UntouchedPresent,
            (false, false) => FieldState::Absent,
        }
    }

    pub fn is_touched(self) -> bool {
        self == FieldState::Touched
    }
}

/// The three derivable fields, in the order derivation considers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalField {
    Duration,
    DueDate,
    StartDate,
}

impl TemporalField {
    pub const SCAN_ORDER: [TemporalField; 3] = [
        TemporalField::Duration,
        TemporalField::DueDate,
        TemporalField::StartDate,
    ];

    pub fn attribute(self) -> Attribute {
        match self {
            TemporalField::Duration => Attribute::Duration,
            TemporalField::DueDate => Attribute::DueDate,
            TemporalField::StartDate => Attribute::StartDate,
        }
    }

    /// The two fields this one is computed from.
    pub fn others(self) -> [TemporalField; 2] {
        match self {
            TemporalField::Duration => [TemporalField::DueDate, TemporalField::StartDate],
            TemporalField::DueDate => [TemporalField::Duration, TemporalField::StartDate],
            TemporalField::StartDate => [TemporalField::Duration, TemporalField::DueDate],
        }
    }
}

/// The values the engine computes for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemporalValues {
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub ignore_non_working_days: bool,
}

impl TemporalValues {
    pub fn is_present(&self, field: TemporalField) -> bool {
        match field {
            TemporalField::Duration => self.duration.is_some(),
            TemporalField::DueDate => self.due_date.is_some(),
            TemporalField::StartDate => self.start_date.is_some(),
        }
    }

    pub fn day_counting(&self) -> DayCounting {
        DayCounting::for_item(self.ignore_non_working_days)
    }

    /// Duration usable for date arithmetic: present and positive.
    pub fn usable_duration(&self) -> Option<i64> {
        self.duration.filter(|duration| *duration > 0)
    }

    /// Earliest known date of the span (start, or due when start is unset).
    pub fn span_start(&self) -> Option<NaiveDate> {
        self.start_date.or(self.due_date)
    }

    /// Latest known date of the span (due, or start when due is unset).
    pub fn span_end(&self) -> Option<NaiveDate> {
        self.due_date.or(self.start_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub ignore_non_working_days: bool,
    #[serde(default)]
    pub scheduling_mode: SchedulingMode,
    #[serde(default)]
    pub is_milestone: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ItemId>,
}

impl WorkItem {
    pub fn new(id: ItemId, subject: impl Into<String>) -> Self {
        Self {
            id,
            subject: subject.into(),
            start_date: None,
            due_date: None,
            duration: None,
            ignore_non_working_days: false,
            scheduling_mode: SchedulingMode::Automatic,
            is_milestone: false,
            parent: None,
        }
    }

    pub fn with_dates(mut self, start: Option<NaiveDate>, due: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.due_date = due;
        self
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn manual(mut self) -> Self {
        self.scheduling_mode = SchedulingMode::Manual;
        self
    }

    pub fn milestone(mut self) -> Self {
        self.is_milestone = true;
        self
    }

    pub fn ignoring_non_working_days(mut self) -> Self {
        self.ignore_non_working_days = true;
        self
    }

    pub fn is_manual(&self) -> bool {
        self.scheduling_mode == SchedulingMode::Manual
    }

    pub fn temporal(&self) -> TemporalValues {
        TemporalValues {
            start_date: self.start_date,
            due_date: self.due_date,
            duration: self.duration,
            ignore_non_working_days: self.ignore_non_working_days,
        }
    }

    pub fn set_temporal(&mut self, values: TemporalValues) {
        self.start_date = values.start_date;
        self.due_date = values.due_date;
        self.duration = values.duration;
        self.ignore_non_working_days = values.ignore_non_working_days;
    }
}

/// A follows relation: `successor` may start only after `predecessor` is due,
/// plus `lag` working days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowsRelation {
    pub predecessor: ItemId,
    pub successor: ItemId,
    #[serde(default)]
    pub lag: u32,
}

impl FollowsRelation {
    pub fn new(predecessor: ItemId, successor: ItemId, lag: u32) -> Self {
        Self {
            predecessor,
            successor,
            lag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_state_prefers_touched_over_presence() {
        assert_eq!(FieldState::of(true, true), FieldState::Touched);
        assert_eq!(FieldState::of(false, true), FieldState::Touched);
        assert_eq!(FieldState::of(true, false), FieldState::UntouchedPresent);
        assert_eq!(FieldState::of(false, false), FieldState::Absent);
    }

    #[test]
    fn usable_duration_rejects_non_positive() {
        let mut values = TemporalValues::default();
        values.duration = Some(0);
        assert_eq!(values.usable_duration(), None);
        values.duration = Some(3);
        assert_eq!(values.usable_duration(), Some(3));
    }

    #[test]
    fn touched_attributes_detect_date_edits() {
        let touched: TouchedAttributes = [Attribute::Parent].into_iter().collect();
        assert!(!touched.touches_dates());
        let touched: TouchedAttributes = [Attribute::Duration].into_iter().collect();
        assert!(touched.touches_dates());
    }
}
