use crate::work_item::{Attribute, ItemId, SchedulingMode, TouchedAttributes, WorkItem};
use chrono::NaiveDate;

/// A set of attribute changes to one work item. Every setter called marks
/// its attribute as touched, including setters that clear a value.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemEdit {
    id: ItemId,
    subject: Option<String>,
    start_date: Option<Option<NaiveDate>>,
    due_date: Option<Option<NaiveDate>>,
    duration: Option<Option<i64>>,
    ignore_non_working_days: Option<bool>,
    scheduling_mode: Option<SchedulingMode>,
    is_milestone: Option<bool>,
    parent: Option<Option<ItemId>>,
}

impl WorkItemEdit {
    pub fn new(id: ItemId) -> Self {
        Self {
            id,
            subject: None,
            start_date: None,
            due_date: None,
            duration: None,
            ignore_non_working_days: None,
            scheduling_mode: None,
            is_milestone: None,
            parent: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn start_date(mut self, date: Option<NaiveDate>) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn due_date(mut self, date: Option<NaiveDate>) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn duration(mut self, duration: Option<i64>) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn ignore_non_working_days(mut self, ignore: bool) -> Self {
        self.ignore_non_working_days = Some(ignore);
        self
    }

    pub fn scheduling_mode(mut self, mode: SchedulingMode) -> Self {
        self.scheduling_mode = Some(mode);
        self
    }

    pub fn milestone(mut self, is_milestone: bool) -> Self {
        self.is_milestone = Some(is_milestone);
        self
    }

    pub fn parent(mut self, parent: Option<ItemId>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.touched().is_empty()
    }

    pub fn touched(&self) -> TouchedAttributes {
        let flags = [
            (self.start_date.is_some(), Attribute::StartDate),
            (self.due_date.is_some(), Attribute::DueDate),
            (self.duration.is_some(), Attribute::Duration),
            (self.ignore_non_working_days.is_some(), Attribute::IgnoreNonWorkingDays),
            (self.scheduling_mode.is_some(), Attribute::SchedulingMode),
            (self.is_milestone.is_some(), Attribute::Milestone),
            (self.parent.is_some(), Attribute::Parent),
        ];
        flags
            .into_iter()
            .filter_map(|(set, attribute)| set.then_some(attribute))
            .collect()
    }

    /// `item` with this edit applied.
    pub fn apply(&self, item: &WorkItem) -> WorkItem {
        let mut updated = item.clone();
        if let Some(subject) = &self.subject {
            updated.subject = subject.clone();
        }
        if let Some(start) = self.start_date {
            updated.start_date = start;
        }
        if let Some(due) = self.due_date {
            updated.due_date = due;
        }
        if let Some(duration) = self.duration {
            updated.duration = duration;
        }
        if let Some(ignore) = self.ignore_non_working_days {
            updated.ignore_non_working_days = ignore;
        }
        if let Some(mode) = self.scheduling_mode {
            updated.scheduling_mode = mode;
        }
        if let Some(is_milestone) = self.is_milestone {
            updated.is_milestone = is_milestone;
        }
        if let Some(parent) = self.parent {
            updated.parent = parent;
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearing_a_value_still_touches_it() {
        let edit = WorkItemEdit::new(ItemId(1)).due_date(None).milestone(true);
        let touched = edit.touched();
        assert!(touched.contains(Attribute::DueDate));
        assert!(touched.contains(Attribute::Milestone));
        assert!(!touched.contains(Attribute::StartDate));

        let item = WorkItem::new(ItemId(1), "task").with_dates(None, NaiveDate::from_ymd_opt(2024, 1, 9));
        let updated = edit.apply(&item);
        assert_eq!(updated.due_date, None);
        assert!(updated.is_milestone);
    }

    #[test]
    fn subject_only_edit_touches_nothing() {
        let edit = WorkItemEdit::new(ItemId(1)).subject("renamed");
        assert!(edit.touched().is_empty());
        assert!(!edit.is_empty());
    }
}
