use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// How a work item counts days when its dates are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayCounting {
    /// Weekends and holidays are skipped.
    WorkingDays,
    /// Every calendar day counts (`ignore_non_working_days` is set).
    AllDays,
}

impl DayCounting {
    pub fn for_item(ignore_non_working_days: bool) -> Self {
        if ignore_non_working_days {
            DayCounting::AllDays
        } else {
            DayCounting::WorkingDays
        }
    }
}

/// Working-day arithmetic consumed by the scheduling engine.
///
/// Implementations must keep the four date operations consistent with each
/// other: for any working `start <= due`,
/// `due_date(start, duration(start, due)) == Some(due)` and
/// `start_date(due, duration(start, due)) == Some(start)` under the same policy.
///
/// Date results are `None` when they would fall outside the range
/// `NaiveDate` can represent.
pub trait Calendar {
    fn is_working_day(&self, date: NaiveDate, counting: DayCounting) -> bool;

    /// `date` itself when it is a working day, otherwise the next one.
    /// Stops at `NaiveDate::MAX`.
    fn soonest_working_day(&self, date: NaiveDate, counting: DayCounting) -> NaiveDate {
        let mut current = date;
        while !self.is_working_day(current, counting) {
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// `date` itself when it is a working day, otherwise the previous one.
    /// Stops at `NaiveDate::MIN`.
    fn latest_working_day(&self, date: NaiveDate, counting: DayCounting) -> NaiveDate {
        let mut current = date;
        while !self.is_working_day(current, counting) {
            match current.pred_opt() {
                Some(prev) => current = prev,
                None => break,
            }
        }
        current
    }

    /// Working days spanned by `[start, due]`, both ends inclusive.
    ///
    /// Negative when `due` precedes `start`: the count of `[due, start]` with
    /// its sign flipped. Zero or negative values are never valid durations.
    fn duration(&self, start: NaiveDate, due: NaiveDate, counting: DayCounting) -> i64 {
        if due < start {
            return -count_working_days(self, due, start, counting);
        }
        count_working_days(self, start, due, counting)
    }

    /// The day reached by advancing `duration - 1` working days from the
    /// soonest working day at or after `start`.
    fn due_date(&self, start: NaiveDate, duration: i64, counting: DayCounting) -> Option<NaiveDate> {
        let first = self.soonest_working_day(start, counting);
        step_working_days(self, first, duration.saturating_sub(1), Step::Forward, counting)
    }

    /// The day reached by stepping back `duration - 1` working days from the
    /// latest working day at or before `due`.
    fn start_date(&self, due: NaiveDate, duration: i64, counting: DayCounting) -> Option<NaiveDate> {
        let last = self.latest_working_day(due, counting);
        step_working_days(self, last, duration.saturating_sub(1), Step::Backward, counting)
    }

    /// The soonest start a successor may take: the day after `predecessor_due`,
    /// snapped to a working day, then `lag` more working days.
    fn successor_soonest_start(
        &self,
        predecessor_due: NaiveDate,
        lag: u32,
        counting: DayCounting,
    ) -> Option<NaiveDate> {
        self.due_date(predecessor_due.succ_opt()?, i64::from(lag) + 1, counting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Forward,
    Backward,
}

impl Step {
    fn shift(self, date: NaiveDate, days: Days) -> Option<NaiveDate> {
        match self {
            Step::Forward => date.checked_add_days(days),
            Step::Backward => date.checked_sub_days(days),
        }
    }
}

/// Walks `steps` working days away from `from`, one calendar day at a time.
fn step_working_days<C: Calendar + ?Sized>(
    calendar: &C,
    from: NaiveDate,
    steps: i64,
    step: Step,
    counting: DayCounting,
) -> Option<NaiveDate> {
    if steps <= 0 {
        return Some(from);
    }
    // Every working day costs at least one calendar day.
    step.shift(from, Days::new(u64::try_from(steps).ok()?))?;

    let mut current = from;
    let mut remaining = steps;
    while remaining > 0 {
        current = step.shift(current, Days::new(1))?;
        if calendar.is_working_day(current, counting) {
            remaining -= 1;
        }
    }
    Some(current)
}

fn count_working_days<C: Calendar + ?Sized>(
    calendar: &C,
    start: NaiveDate,
    end: NaiveDate,
    counting: DayCounting,
) -> i64 {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| calendar.is_working_day(*day, counting))
        .count() as i64
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("a work calendar requires at least one working weekday")]
    NoWorkingDays,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCalendar {
    holidays: HashSet<NaiveDate>,
    non_working_days: HashSet<Weekday>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCalendarConfig {
    working_days: Vec<Weekday>,
    holidays: Vec<NaiveDate>,
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::with_year_range(2025, 2025)
    }
}

impl WorkCalendar {
    const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Mon-Fri work week with US federal holidays for the inclusive year range.
    pub fn with_year_range(start_year: i32, end_year: i32) -> Self {
        let (start, end) = if start_year <= end_year {
            (start_year, end_year)
        } else {
            (end_year, start_year)
        };

        let mut calendar = Self::weekdays_only();
        for year in start..=end {
            calendar.add_us_holidays(year);
        }
        calendar
    }

    /// Mon-Fri work week without any holidays.
    pub fn weekdays_only() -> Self {
        Self {
            holidays: HashSet::new(),
            non_working_days: HashSet::from([Weekday::Sat, Weekday::Sun]),
        }
    }

    pub fn custom<I, J>(working_days: I, holidays: J) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let config = WorkCalendarConfig::new(working_days, holidays)?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &WorkCalendarConfig) -> Result<Self, CalendarError> {
        let working_set: HashSet<Weekday> = config.working_days.iter().copied().collect();
        if working_set.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        let non_working_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !working_set.contains(day))
            .collect();

        Ok(Self {
            holidays: config.holidays.iter().copied().collect(),
            non_working_days,
        })
    }

    pub fn to_config(&self) -> WorkCalendarConfig {
        WorkCalendarConfig::from(self)
    }

    /// Add standard US federal holidays for a given year
    fn add_us_holidays(&mut self, year: i32) {
        let fixed = [(1, 1), (7, 4), (11, 11), (12, 25)];
        self.holidays.extend(
            fixed
                .into_iter()
                .filter_map(|(month, day)| NaiveDate::from_ymd_opt(year, month, day)),
        );

        // MLK Day, Presidents' Day, Labor Day, Columbus Day, Thanksgiving
        let floating = [
            (1, Weekday::Mon, 3),
            (2, Weekday::Mon, 3),
            (9, Weekday::Mon, 1),
            (10, Weekday::Mon, 2),
            (11, Weekday::Thu, 4),
        ];
        self.holidays.extend(
            floating
                .into_iter()
                .filter_map(|(month, weekday, n)| NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)),
        );

        // Memorial Day (last Monday in May)
        if let Some(date) = Self::last_weekday(year, 5, Weekday::Mon) {
            self.holidays.insert(date);
        }
    }

    fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
        (1..=5)
            .rev()
            .find_map(|n| NaiveDate::from_weekday_of_month_opt(year, month, weekday, n))
    }

    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    pub fn add_holidays(&mut self, dates: &[NaiveDate]) {
        self.holidays.extend(dates);
    }

    /// Add the same custom holiday for multiple years
    /// Example: Add Dec 24 (Christmas Eve) for 2025-2030
    pub fn add_recurring_holiday(&mut self, month: u32, day: u32, start_year: i32, end_year: i32) {
        for year in start_year..=end_year {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                self.holidays.insert(date);
            }
        }
    }

    /// Set custom working days (e.g., Mon-Sat for 6-day weeks)
    pub fn set_working_days(&mut self, days: &[Weekday]) -> Result<(), CalendarError> {
        if days.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        self.non_working_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !days.contains(day))
            .collect();
        Ok(())
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Check if a date is available for scheduling
    pub fn is_available(&self, date: NaiveDate) -> bool {
        !self.holidays.contains(&date) && !self.non_working_days.contains(&date.weekday())
    }

    /// Get all available days in a date range
    pub fn available_days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| self.is_available(*day))
            .collect()
    }

    fn working_weekdays(&self, counting: DayCounting) -> i64 {
        match counting {
            DayCounting::AllDays => 7,
            DayCounting::WorkingDays => 7 - self.non_working_days.len() as i64,
        }
    }

    /// Holidays inside `[low, high]` that fall on a working weekday.
    fn holidays_on_working_weekdays(&self, low: NaiveDate, high: NaiveDate, counting: DayCounting) -> i64 {
        if counting == DayCounting::AllDays {
            return 0;
        }
        self.holidays
            .iter()
            .filter(|day| (low..=high).contains(*day) && !self.non_working_days.contains(&day.weekday()))
            .count() as i64
    }

    fn count_available_days(&self, start: NaiveDate, end: NaiveDate, counting: DayCounting) -> i64 {
        let days = (end - start).num_days() + 1;
        let full_weeks = days / 7;
        let tail = (0..days % 7)
            .filter_map(|back| end.checked_sub_days(Days::new(back as u64)))
            .filter(|day| counting == DayCounting::AllDays || !self.non_working_days.contains(&day.weekday()))
            .count() as i64;
        full_weeks * self.working_weekdays(counting) + tail - self.holidays_on_working_weekdays(start, end, counting)
    }

    /// Moves `steps` working days away from `from`, jumping whole weeks
    /// before walking the remainder day by day.
    fn jump_working_days(
        &self,
        from: NaiveDate,
        steps: i64,
        step: Step,
        counting: DayCounting,
    ) -> Option<NaiveDate> {
        let per_week = self.working_weekdays(counting);
        if per_week <= 0 {
            return None;
        }
        let mut current = from;
        let mut remaining = steps;
        while remaining > per_week {
            let weeks = (remaining - 1) / per_week;
            let span = u64::try_from(weeks).ok()?.checked_mul(7)?;
            let target = step.shift(current, Days::new(span))?;
            let skipped = match step {
                Step::Forward => self.holidays_on_working_weekdays(current.succ_opt()?, target, counting),
                Step::Backward => self.holidays_on_working_weekdays(target, current.pred_opt()?, counting),
            };
            remaining -= weeks * per_week - skipped;
            current = target;
        }
        step_working_days(self, current, remaining, step, counting)
    }
}

impl Calendar for WorkCalendar {
    fn is_working_day(&self, date: NaiveDate, counting: DayCounting) -> bool {
        match counting {
            DayCounting::AllDays => true,
            DayCounting::WorkingDays => self.is_available(date),
        }
    }

    fn duration(&self, start: NaiveDate, due: NaiveDate, counting: DayCounting) -> i64 {
        if due < start {
            return -self.count_available_days(due, start, counting);
        }
        self.count_available_days(start, due, counting)
    }

    fn due_date(&self, start: NaiveDate, duration: i64, counting: DayCounting) -> Option<NaiveDate> {
        let first = self.soonest_working_day(start, counting);
        self.jump_working_days(first, duration.saturating_sub(1), Step::Forward, counting)
    }

    fn start_date(&self, due: NaiveDate, duration: i64, counting: DayCounting) -> Option<NaiveDate> {
        let last = self.latest_working_day(due, counting);
        self.jump_working_days(last, duration.saturating_sub(1), Step::Backward, counting)
    }
}

impl WorkCalendarConfig {
    pub fn new<I, J>(working_days: I, holidays: J) -> Result<Self, CalendarError>
    where
        I: IntoIterator<Item = Weekday>,
        J: IntoIterator<Item = NaiveDate>,
    {
        let mut working: Vec<Weekday> = working_days.into_iter().collect();
        if working.is_empty() {
            return Err(CalendarError::NoWorkingDays);
        }
        working.sort_by_key(|wd| wd.num_days_from_monday());
        working.dedup();

        let mut holidays: Vec<NaiveDate> = holidays.into_iter().collect();
        holidays.sort();
        holidays.dedup();

        Ok(Self {
            working_days: working,
            holidays,
        })
    }

    pub fn working_days(&self) -> &[Weekday] {
        &self.working_days
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }
}

impl Default for WorkCalendarConfig {
    fn default() -> Self {
        WorkCalendarConfig::from(&WorkCalendar::default())
    }
}

impl From<&WorkCalendar> for WorkCalendarConfig {
    fn from(calendar: &WorkCalendar) -> Self {
        let working = WorkCalendar::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !calendar.non_working_days.contains(day))
            .collect();

        let mut holidays: Vec<NaiveDate> = calendar.holidays.iter().copied().collect();
        holidays.sort();

        Self {
            working_days: working,
            holidays,
        }
    }
}
