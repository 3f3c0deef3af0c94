use crate::calendar::Calendar;
use crate::changes::ScheduleChanges;
use crate::network::WorkItemNetwork;
use crate::work_item::{ItemId, WorkItem};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("milestone {0} cannot have children")]
    MilestoneWithChildren(ItemId),
    #[error("work item {item} has non-positive duration {duration}")]
    NonPositiveDuration { item: ItemId, duration: i64 },
    #[error("work item {item} has duration {duration} above the limit of {limit}")]
    DurationTooLong {
        item: ItemId,
        duration: i64,
        limit: i64,
    },
    #[error("work item {item} starts on {start}, after its due date {due}")]
    StartAfterDue {
        item: ItemId,
        start: NaiveDate,
        due: NaiveDate,
    },
    #[error("milestone {item} must start and finish on the same day")]
    MilestoneSpan { item: ItemId },
    #[error("work item {item} has duration {duration} but its dates span {expected} days")]
    DurationMismatch {
        item: ItemId,
        duration: i64,
        expected: i64,
    },
}

impl ValidationError {
    pub fn item(&self) -> ItemId {
        match self {
            ValidationError::MilestoneWithChildren(item) => *item,
            ValidationError::NonPositiveDuration { item, .. }
            | ValidationError::DurationTooLong { item, .. }
            | ValidationError::StartAfterDue { item, .. }
            | ValidationError::DurationMismatch { item, .. }
            | ValidationError::MilestoneSpan { item } => *item,
        }
    }
}

/// All violations found in one batch, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Errors attached to one item.
    pub fn for_item(&self, item: ItemId) -> impl Iterator<Item = &ValidationError> {
        self.0.iter().filter(move |error| error.item() == item)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Accepts or rejects a whole batch of scheduled values.
pub trait ScheduleValidator {
    fn validate(
        &self,
        network: &WorkItemNetwork,
        calendar: &dyn Calendar,
        changes: &ScheduleChanges,
    ) -> Result<(), ValidationErrors>;
}

/// The default contract for scheduled work items.
#[derive(Debug, Clone, Default)]
pub struct ContractValidator {
    /// Longest duration accepted, in working days. Unlimited when `None`.
    pub max_duration: Option<i64>,
}

impl ContractValidator {
    pub fn with_max_duration(max_duration: i64) -> Self {
        Self {
            max_duration: Some(max_duration),
        }
    }

    fn validate_item(&self, network: &WorkItemNetwork, item: &WorkItem, errors: &mut ValidationErrors) {
        if item.is_milestone {
            if network.has_children(item.id) {
                errors.push(ValidationError::MilestoneWithChildren(item.id));
            }
            if item.start_date != item.due_date {
                errors.push(ValidationError::MilestoneSpan { item: item.id });
            }
        }

        if let Some(duration) = item.duration {
            if duration <= 0 {
                errors.push(ValidationError::NonPositiveDuration {
                    item: item.id,
                    duration,
                });
            } else if let Some(limit) = self.max_duration.filter(|limit| duration > *limit) {
                errors.push(ValidationError::DurationTooLong {
                    item: item.id,
                    duration,
                    limit,
                });
            }
        }

        if let (Some(start), Some(due)) = (item.start_date, item.due_date) {
            if start > due {
                errors.push(ValidationError::StartAfterDue {
                    item: item.id,
                    start,
                    due,
                });
            }
        }
    }

    /// Scheduled values must agree with each other: the stored duration is
    /// the one the dates span on `calendar`.
    fn validate_consistency(&self, calendar: &dyn Calendar, item: &WorkItem, errors: &mut ValidationErrors) {
        if item.is_milestone {
            return;
        }
        let (Some(start), Some(due), Some(duration)) = (item.start_date, item.due_date, item.duration) else {
            return;
        };
        if duration <= 0 || start > due {
            return;
        }
        let expected = calendar.duration(start, due, item.temporal().day_counting());
        if expected != duration {
            errors.push(ValidationError::DurationMismatch {
                item: item.id,
                duration,
                expected,
            });
        }
    }
}

impl ScheduleValidator for ContractValidator {
    fn validate(
        &self,
        network: &WorkItemNetwork,
        calendar: &dyn Calendar,
        changes: &ScheduleChanges,
    ) -> Result<(), ValidationErrors> {
        // Parents are checked too: a milestone gaining a child is not itself
        // changed.
        let ids: BTreeSet<ItemId> = changes
            .ids()
            .flat_map(|id| [Some(id), network.get(id).and_then(|item| item.parent)])
            .flatten()
            .collect();

        let mut errors = ValidationErrors::new();
        for id in ids {
            if let Some(item) = network.get(id) {
                let scheduled = changes.apply_to(item);
                self.validate_item(network, &scheduled, &mut errors);
                if changes.contains(id) {
                    self.validate_consistency(calendar, &scheduled, &mut errors);
                }
            }
        }
        errors.into_result()
    }
}
