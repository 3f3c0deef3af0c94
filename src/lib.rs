pub mod calculations;
pub mod calendar;
pub mod changes;
pub mod edit;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod network;
pub mod persistence;
pub mod schedule;
pub mod validation;
pub mod work_item;

pub use calculations::derivation::{AttributeDeriver, Derivation, Provenance};
pub use calculations::propagation::{MovedItem, SchedulePropagator};
pub use calendar::{Calendar, CalendarError, DayCounting, WorkCalendar, WorkCalendarConfig};
pub use changes::{ChangeCause, ScheduleChanges, ScheduledDates};
pub use edit::WorkItemEdit;
pub use error::{ScheduleError, ScheduleResult};
pub use graph::{Dependency, DependencyGraph, ScheduleDependency};
pub use metadata::ScheduleMetadata;
pub use network::WorkItemNetwork;
pub use schedule::{RescheduleSummary, Schedule};
pub use validation::{ContractValidator, ScheduleValidator, ValidationError, ValidationErrors};
pub use work_item::{
    Attribute, FieldState, FollowsRelation, ItemId, SchedulingMode, TemporalField, TemporalValues,
    TouchedAttributes, WorkItem,
};
