use crate::calendar::{Calendar, DayCounting};
use crate::work_item::{FieldState, TemporalField, TemporalValues, TouchedAttributes};
use tracing::debug;

/// Provenance of start, due and duration for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    pub start_date: FieldState,
    pub due_date: FieldState,
    pub duration: FieldState,
}

impl Provenance {
    pub fn from_touched(values: &TemporalValues, touched: &TouchedAttributes) -> Self {
        let state = |field: TemporalField| {
            FieldState::of(values.is_present(field), touched.contains(field.attribute()))
        };
        Self {
            start_date: state(TemporalField::StartDate),
            due_date: state(TemporalField::DueDate),
            duration: state(TemporalField::Duration),
        }
    }

    /// Nothing touched: every present value counts as untouched.
    pub fn untouched(values: &TemporalValues) -> Self {
        Self::from_touched(values, &TouchedAttributes::new())
    }

    pub fn state(&self, field: TemporalField) -> FieldState {
        match field {
            TemporalField::StartDate => self.start_date,
            TemporalField::DueDate => self.due_date,
            TemporalField::Duration => self.duration,
        }
    }
}

/// Outcome of one derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivation {
    pub values: TemporalValues,
    /// The field selected for derivation, whether or not it was written.
    pub derived: Option<TemporalField>,
}

/// Picks the one field of (start, due, duration) that follows from the other
/// two and computes it.
pub struct AttributeDeriver<'a, C: Calendar + ?Sized> {
    calendar: &'a C,
}

impl<'a, C: Calendar + ?Sized> AttributeDeriver<'a, C> {
    pub fn new(calendar: &'a C) -> Self {
        Self { calendar }
    }

    /// The field to derive, scanning duration, then due date, then start date.
    ///
    /// A field whose two siblings are both present wins over one with only a
    /// single present sibling. Touched fields are never selected.
    pub fn derivable_field(values: &TemporalValues, provenance: &Provenance) -> Option<TemporalField> {
        let present_siblings = |field: TemporalField| {
            field
                .others()
                .into_iter()
                .filter(|other| values.is_present(*other))
                .count()
        };
        let untouched = |field: &TemporalField| !provenance.state(*field).is_touched();

        TemporalField::SCAN_ORDER
            .into_iter()
            .filter(untouched)
            .find(|field| present_siblings(*field) == 2)
            .or_else(|| {
                TemporalField::SCAN_ORDER
                    .into_iter()
                    .filter(untouched)
                    .find(|field| present_siblings(*field) == 1)
            })
    }

    pub fn derive(
        &self,
        values: TemporalValues,
        provenance: &Provenance,
        is_milestone: bool,
    ) -> Derivation {
        let derived = Self::derivable_field(&values, provenance);
        let mut result = match derived {
            Some(field) => self.compute(values, field, is_milestone),
            None => values,
        };
        if is_milestone {
            result = Self::normalize_milestone(result);
        }
        Derivation {
            values: self.snap(result, is_milestone),
            derived,
        }
    }

    fn compute(&self, values: TemporalValues, field: TemporalField, is_milestone: bool) -> TemporalValues {
        let counting = values.day_counting();
        let mut result = values;
        match field {
            TemporalField::Duration => {
                result.duration = if is_milestone {
                    Some(1)
                } else {
                    match (values.start_date, values.due_date) {
                        (Some(start), Some(due)) => {
                            let duration = self.calendar.duration(start, due, counting);
                            if duration <= 0 {
                                debug!(%start, %due, duration, "skipping non-positive duration");
                                values.duration
                            } else {
                                Some(duration)
                            }
                        }
                        _ => None,
                    }
                };
            }
            TemporalField::DueDate => match (values.start_date, values.usable_duration()) {
                (Some(start), Some(duration)) => match self.calendar.due_date(start, duration, counting) {
                    Some(due) => result.due_date = Some(due),
                    None => debug!(%start, duration, "due date out of range"),
                },
                _ => debug!(duration = ?values.duration, "due date not derivable"),
            },
            TemporalField::StartDate => match (values.due_date, values.usable_duration()) {
                (Some(due), Some(duration)) => match self.calendar.start_date(due, duration, counting) {
                    Some(start) => result.start_date = Some(start),
                    None => debug!(%due, duration, "start date out of range"),
                },
                _ => debug!(duration = ?values.duration, "start date not derivable"),
            },
        }
        result
    }

    /// Milestones span a single day: start and due collapse onto
    /// `due || start` and duration becomes 1.
    pub fn normalize_milestone(values: TemporalValues) -> TemporalValues {
        let date = values.due_date.or(values.start_date);
        TemporalValues {
            start_date: date,
            due_date: date,
            duration: Some(1),
            ..values
        }
    }

    /// Move both dates forward onto working days. Duration follows the
    /// snapped dates when either of them moved.
    pub fn snap(&self, values: TemporalValues, is_milestone: bool) -> TemporalValues {
        if values.ignore_non_working_days {
            return values;
        }
        let snap = |date| self.calendar.soonest_working_day(date, DayCounting::WorkingDays);
        let mut result = values;
        result.start_date = values.start_date.map(snap);
        result.due_date = values.due_date.map(snap);

        let moved = result.start_date != values.start_date || result.due_date != values.due_date;
        if moved && !is_milestone {
            if let (Some(start), Some(due)) = (result.start_date, result.due_date) {
                let duration = self.calendar.duration(start, due, DayCounting::WorkingDays);
                if duration > 0 {
                    result.duration = Some(duration);
                }
            }
        }
        result
    }
}
