use chrono::NaiveDate;
use schedule_engine::{
    Attribute, ChangeCause, ContractValidator, FollowsRelation, ItemId, MovedItem, Schedule,
    ScheduleChanges, ScheduleError, ScheduleMetadata, SchedulePropagator, TouchedAttributes,
    ValidationError, WorkCalendar, WorkItem, WorkItemEdit, WorkItemNetwork,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn item(id: u64, start: Option<NaiveDate>, due: Option<NaiveDate>, duration: i64) -> WorkItem {
    WorkItem::new(ItemId(id), format!("item {id}"))
        .with_dates(start, due)
        .with_duration(duration)
}

fn commit(network: &mut WorkItemNetwork, changes: &ScheduleChanges) {
    for (id, _) in changes.iter() {
        let updated = changes.apply_to(network.get(id).unwrap());
        network.update(updated).unwrap();
    }
}

fn weekday_schedule() -> Schedule {
    Schedule::new_with_metadata_and_calendar(ScheduleMetadata::default(), WorkCalendar::weekdays_only())
}

/// #1 runs Mon 2024-01-08 for five days, #2 follows it with a two day lag.
fn lagged_pair() -> WorkItemNetwork {
    WorkItemNetwork::from_parts(
        vec![
            item(1, Some(d(2024, 1, 8)), Some(d(2024, 1, 10)), 5),
            item(2, Some(d(2024, 1, 8)), Some(d(2024, 1, 9)), 2),
        ],
        vec![FollowsRelation::new(ItemId(1), ItemId(2), 2)],
    )
    .unwrap()
}

fn duration_edit() -> MovedItem {
    MovedItem::new(ItemId(1)).with_touched([Attribute::Duration].into_iter().collect::<TouchedAttributes>())
}

#[test]
fn successor_moves_after_predecessor_and_lag() {
    let network = lagged_pair();
    let cal = WorkCalendar::weekdays_only();
    let changes = SchedulePropagator::new(&network, &cal)
        .propagate(&duration_edit())
        .unwrap();

    let moved = changes.get(ItemId(1)).unwrap();
    assert_eq!(moved.due_date, Some(d(2024, 1, 12)));
    assert_eq!(moved.cause, ChangeCause::Edited);

    let successor = changes.get(ItemId(2)).unwrap();
    assert_eq!(successor.start_date, Some(d(2024, 1, 17)));
    assert_eq!(successor.due_date, Some(d(2024, 1, 18)));
    assert_eq!(successor.duration, Some(2));
    assert_eq!(successor.cause, ChangeCause::Predecessor(ItemId(1)));
}

#[test]
fn second_pass_changes_nothing() {
    let mut network = lagged_pair();
    let cal = WorkCalendar::weekdays_only();
    let first = SchedulePropagator::new(&network, &cal)
        .propagate(&duration_edit())
        .unwrap();
    commit(&mut network, &first);

    let second = SchedulePropagator::new(&network, &cal)
        .propagate(&MovedItem::new(ItemId(1)))
        .unwrap();
    assert_eq!(second.len(), 1);
    for (id, dates) in second.iter() {
        assert_eq!(dates.values(), network.get(id).unwrap().temporal());
    }
}

#[test]
fn milestone_takes_its_due_date() {
    let network = WorkItemNetwork::from_parts(
        vec![WorkItem::new(ItemId(1), "launch")
            .milestone()
            .with_dates(None, Some(d(2025, 3, 10)))],
        Vec::new(),
    )
    .unwrap();
    let cal = WorkCalendar::weekdays_only();
    let changes = SchedulePropagator::new(&network, &cal)
        .propagate(&MovedItem::new(ItemId(1)))
        .unwrap();
    let dates = changes.get(ItemId(1)).unwrap();
    assert_eq!(dates.start_date, Some(d(2025, 3, 10)));
    assert_eq!(dates.due_date, Some(d(2025, 3, 10)));
    assert_eq!(dates.duration, Some(1));
}

#[test]
fn successor_skips_holiday_after_weekend() {
    let mut cal = WorkCalendar::weekdays_only();
    cal.add_holiday(d(2024, 1, 15));
    let network = WorkItemNetwork::from_parts(
        vec![
            item(1, Some(d(2024, 1, 8)), Some(d(2024, 1, 12)), 5),
            WorkItem::new(ItemId(2), "b").with_duration(3),
        ],
        vec![FollowsRelation::new(ItemId(1), ItemId(2), 0)],
    )
    .unwrap();
    let changes = SchedulePropagator::new(&network, &cal)
        .propagate(&MovedItem::new(ItemId(1)))
        .unwrap();
    let successor = changes.get(ItemId(2)).unwrap();
    assert_eq!(successor.start_date, Some(d(2024, 1, 16)));
    assert_eq!(successor.due_date, Some(d(2024, 1, 18)));
    assert_eq!(successor.duration, Some(3));
}

#[test]
fn parent_spans_its_children() {
    let network = WorkItemNetwork::from_parts(
        vec![
            WorkItem::new(ItemId(10), "parent"),
            item(11, Some(d(2024, 1, 23)), Some(d(2024, 1, 26)), 4).with_parent(ItemId(10)),
            WorkItem::new(ItemId(12), "early")
                .with_dates(Some(d(2024, 1, 20)), Some(d(2024, 1, 24)))
                .with_parent(ItemId(10)),
        ],
        Vec::new(),
    )
    .unwrap();
    let cal = WorkCalendar::weekdays_only();
    let changes = SchedulePropagator::new(&network, &cal)
        .propagate(&MovedItem::new(ItemId(11)))
        .unwrap();
    let parent = changes.get(ItemId(10)).unwrap();
    assert_eq!(parent.start_date, Some(d(2024, 1, 20)));
    assert_eq!(parent.due_date, Some(d(2024, 1, 26)));
    assert_eq!(parent.duration, Some(5));
    assert_eq!(parent.cause, ChangeCause::Children);
    assert!(!changes.contains(ItemId(12)));
}

#[test]
fn manual_child_inherits_parent_soonest_start() {
    let mut schedule = weekday_schedule();
    schedule
        .add_item(item(1, Some(d(2024, 1, 29)), Some(d(2024, 1, 31)), 3))
        .unwrap();
    schedule.add_item(WorkItem::new(ItemId(2), "phase")).unwrap();
    schedule.add_relation(ItemId(1), ItemId(2), 0).unwrap();

    schedule
        .add_item(
            WorkItem::new(ItemId(3), "manual")
                .manual()
                .with_duration(2)
                .with_parent(ItemId(2)),
        )
        .unwrap();

    let child = schedule.item(ItemId(3)).unwrap();
    assert_eq!(child.start_date, Some(d(2024, 2, 1)));
    assert_eq!(child.due_date, Some(d(2024, 2, 2)));
    let parent = schedule.item(ItemId(2)).unwrap();
    assert_eq!(parent.start_date, Some(d(2024, 2, 1)));
    assert_eq!(parent.due_date, Some(d(2024, 2, 2)));
}

#[test]
fn manual_item_with_dates_ignores_predecessors() {
    let mut schedule = weekday_schedule();
    schedule
        .add_item(item(1, Some(d(2024, 1, 8)), None, 5))
        .unwrap();
    schedule
        .add_item(item(2, Some(d(2024, 1, 8)), None, 2).manual())
        .unwrap();
    schedule.add_relation(ItemId(1), ItemId(2), 0).unwrap();

    let summary = schedule
        .apply_edit(WorkItemEdit::new(ItemId(1)).duration(Some(10)))
        .unwrap();
    assert!(!summary.changes.contains(ItemId(2)));
    assert_eq!(schedule.item(ItemId(2)).unwrap().start_date, Some(d(2024, 1, 8)));
}

#[test]
fn weekend_start_edit_snaps_forward() {
    let mut schedule = weekday_schedule();
    schedule
        .add_item(item(1, Some(d(2024, 1, 1)), None, 2))
        .unwrap();
    schedule
        .apply_edit(WorkItemEdit::new(ItemId(1)).start_date(Some(d(2024, 1, 6))))
        .unwrap();
    let stored = schedule.item(ItemId(1)).unwrap();
    assert_eq!(stored.start_date, Some(d(2024, 1, 8)));
    assert_eq!(stored.due_date, Some(d(2024, 1, 9)));
    assert_eq!(stored.duration, Some(2));
}

#[test]
fn mutual_predecessors_are_reported_as_a_cycle() {
    let mut schedule = weekday_schedule();
    schedule.add_item(item(1, Some(d(2024, 1, 8)), None, 2)).unwrap();
    schedule.add_item(item(2, Some(d(2024, 1, 8)), None, 2)).unwrap();
    schedule.add_relation(ItemId(1), ItemId(2), 0).unwrap();
    schedule.add_relation(ItemId(2), ItemId(1), 0).unwrap();

    assert_eq!(schedule.cycles(), vec![vec![ItemId(1), ItemId(2)]]);
    assert!(schedule.reschedule(ItemId(1)).is_ok());
}

#[test]
fn rejected_batch_leaves_schedule_untouched() {
    let mut schedule = weekday_schedule().with_validator(ContractValidator::with_max_duration(10));
    schedule.add_item(item(1, Some(d(2024, 1, 8)), None, 5)).unwrap();
    schedule.add_item(item(2, None, None, 8)).unwrap();
    schedule.add_relation(ItemId(1), ItemId(2), 0).unwrap();
    let before: Vec<WorkItem> = schedule.items().cloned().collect();

    let result = schedule.apply_edit(WorkItemEdit::new(ItemId(2)).duration(Some(20)));
    match result {
        Err(ScheduleError::Rejected(errors)) => {
            assert!(matches!(
                errors.iter().next(),
                Some(ValidationError::DurationTooLong { duration: 20, limit: 10, .. })
            ));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    let after: Vec<WorkItem> = schedule.items().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn milestone_cannot_gain_children() {
    let mut schedule = weekday_schedule();
    schedule
        .add_item(
            WorkItem::new(ItemId(1), "gate")
                .milestone()
                .with_dates(None, Some(d(2024, 1, 8))),
        )
        .unwrap();
    schedule.add_item(item(2, None, None, 2)).unwrap();

    let result = schedule.apply_edit(WorkItemEdit::new(ItemId(2)).parent(Some(ItemId(1))));
    match result {
        Err(ScheduleError::Rejected(errors)) => {
            assert_eq!(errors.for_item(ItemId(1)).count(), 1);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(schedule.item(ItemId(2)).unwrap().parent, None);
}

#[test]
fn zero_duration_edit_is_rejected() {
    let mut schedule = weekday_schedule();
    schedule.add_item(item(1, Some(d(2024, 1, 8)), None, 3)).unwrap();
    let result = schedule.apply_edit(WorkItemEdit::new(ItemId(1)).duration(Some(0)));
    assert!(matches!(result, Err(ScheduleError::Rejected(_))));
    assert_eq!(schedule.item(ItemId(1)).unwrap().duration, Some(3));
}

#[test]
fn constrained_start_rederives_a_touched_duration() {
    let mut schedule = weekday_schedule();
    schedule.add_item(item(1, Some(d(2024, 1, 8)), None, 3)).unwrap();
    schedule.add_item(item(2, None, None, 2)).unwrap();
    schedule.add_relation(ItemId(1), ItemId(2), 0).unwrap();

    schedule
        .apply_edit(
            WorkItemEdit::new(ItemId(2))
                .due_date(Some(d(2024, 1, 12)))
                .duration(Some(5)),
        )
        .unwrap();
    let stored = schedule.item(ItemId(2)).unwrap().clone();
    assert_eq!(stored.start_date, Some(d(2024, 1, 11)));
    assert_eq!(stored.due_date, Some(d(2024, 1, 12)));
    assert_eq!(stored.duration, Some(2));

    let summary = schedule.reschedule(ItemId(2)).unwrap();
    assert_eq!(summary.changes.len(), 1);
    assert_eq!(summary.changes.get(ItemId(2)).unwrap().values(), stored.temporal());
}

#[test]
fn inconsistent_new_item_is_rejected() {
    let mut schedule = weekday_schedule();
    let result = schedule.add_item(item(1, Some(d(2024, 1, 8)), Some(d(2024, 1, 12)), 2));
    match result {
        Err(ScheduleError::Rejected(errors)) => {
            assert!(errors.iter().any(|error| matches!(
                error,
                ValidationError::DurationMismatch { duration: 2, expected: 5, .. }
            )));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(schedule.item(ItemId(1)).is_none());
}

#[test]
fn unrepresentable_duration_is_rejected() {
    let mut schedule = weekday_schedule();
    schedule.add_item(item(1, Some(d(2024, 1, 8)), None, 3)).unwrap();
    let result = schedule.apply_edit(WorkItemEdit::new(ItemId(1)).duration(Some(i64::MAX)));
    assert!(matches!(result, Err(ScheduleError::Rejected(_))));
    let stored = schedule.item(ItemId(1)).unwrap();
    assert_eq!(stored.due_date, Some(d(2024, 1, 10)));
    assert_eq!(stored.duration, Some(3));
}

/// #1 leads, #2 is a phase holding #3 and #4, #4 follows #1 and #5 follows
/// #4 with a one day lag.
fn phased_chain() -> Schedule {
    let mut schedule = weekday_schedule();
    schedule.add_item(item(1, Some(d(2024, 1, 8)), None, 3)).unwrap();
    schedule.add_item(WorkItem::new(ItemId(2), "phase")).unwrap();
    schedule
        .add_item(item(3, Some(d(2024, 1, 8)), None, 2).with_parent(ItemId(2)))
        .unwrap();
    schedule
        .add_item(item(4, None, None, 2).with_parent(ItemId(2)))
        .unwrap();
    schedule.add_relation(ItemId(1), ItemId(4), 0).unwrap();
    schedule.add_item(item(5, None, None, 1)).unwrap();
    schedule.add_relation(ItemId(4), ItemId(5), 1).unwrap();
    schedule
}

#[test]
fn rescheduling_after_any_edit_changes_nothing() {
    let edits = [
        ("no edit", None),
        ("weekend start", Some(WorkItemEdit::new(ItemId(1)).start_date(Some(d(2024, 1, 13))))),
        ("later due", Some(WorkItemEdit::new(ItemId(1)).due_date(Some(d(2024, 1, 17))))),
        ("child duration", Some(WorkItemEdit::new(ItemId(3)).duration(Some(4)))),
        (
            "constrained due and duration",
            Some(
                WorkItemEdit::new(ItemId(4))
                    .due_date(Some(d(2024, 1, 26)))
                    .duration(Some(5)),
            ),
        ),
        ("start before predecessor", Some(WorkItemEdit::new(ItemId(5)).start_date(Some(d(2024, 1, 10))))),
        ("reparent", Some(WorkItemEdit::new(ItemId(5)).parent(Some(ItemId(2))))),
    ];

    for (label, edit) in edits {
        let mut schedule = phased_chain();
        if let Some(edit) = edit {
            schedule
                .apply_edit(edit)
                .unwrap_or_else(|error| panic!("{label}: {error}"));
        }
        for id in 1..=5 {
            let before: Vec<WorkItem> = schedule.items().cloned().collect();
            let summary = schedule.reschedule(ItemId(id)).unwrap();
            assert_eq!(summary.changes.len(), 1, "{label}: reschedule #{id}");
            let after: Vec<WorkItem> = schedule.items().cloned().collect();
            assert_eq!(before, after, "{label}: reschedule #{id}");
        }
    }
}
