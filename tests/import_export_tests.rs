use chrono::{NaiveDate, Weekday};
use schedule_engine::calendar::{CalendarError, WorkCalendarConfig};
use schedule_engine::persistence::{
    JsonFileStore, PersistenceError, ScheduleStore, export_changes_to_csv, load_calendar_config,
    load_schedule_from_csv, load_schedule_from_json, save_calendar_config, save_schedule_to_csv,
    save_schedule_to_json,
};
use schedule_engine::{ItemId, Schedule, ScheduleMetadata, WorkCalendar, WorkItem, WorkItemEdit};
use std::fs;
use tempfile::{NamedTempFile, tempdir};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn sample_schedule() -> Schedule {
    let metadata = ScheduleMetadata {
        project_name: "Warehouse".to_string(),
        project_description: "Racking and fit-out".to_string(),
        project_start_date: d(2024, 1, 1),
        project_end_date: d(2024, 12, 31),
    };
    let mut schedule = Schedule::new_with_metadata_and_calendar(metadata, WorkCalendar::weekdays_only());
    schedule.add_item(WorkItem::new(ItemId(1), "Phase")).unwrap();
    schedule
        .add_item(
            WorkItem::new(ItemId(2), "Survey")
                .with_dates(Some(d(2024, 1, 8)), None)
                .with_duration(3)
                .with_parent(ItemId(1)),
        )
        .unwrap();
    schedule
        .add_item(WorkItem::new(ItemId(3), "Install").with_duration(4).manual())
        .unwrap();
    schedule.add_relation(ItemId(2), ItemId(3), 1).unwrap();
    schedule
        .add_item(
            WorkItem::new(ItemId(4), "Handover")
                .milestone()
                .with_dates(None, Some(d(2024, 2, 1))),
        )
        .unwrap();
    schedule
}

#[test]
fn json_round_trip_preserves_schedule() {
    let schedule = sample_schedule();
    let tmp = NamedTempFile::new().unwrap();
    save_schedule_to_json(&schedule, tmp.path()).unwrap();

    let loaded = load_schedule_from_json(tmp.path()).unwrap();
    assert_eq!(loaded.metadata(), schedule.metadata());
    assert_eq!(loaded.calendar_config(), schedule.calendar_config());
    assert!(loaded.calendar_is_custom());
    assert_eq!(
        loaded.items().cloned().collect::<Vec<_>>(),
        schedule.items().cloned().collect::<Vec<_>>()
    );
    assert_eq!(loaded.relations(), schedule.relations());
}

#[test]
fn csv_round_trip_preserves_items_and_relations() {
    let schedule = sample_schedule();
    let tmp = NamedTempFile::new().unwrap();
    save_schedule_to_csv(&schedule, tmp.path()).unwrap();

    let loaded = load_schedule_from_csv(tmp.path()).unwrap();
    assert_eq!(
        loaded.items().cloned().collect::<Vec<_>>(),
        schedule.items().cloned().collect::<Vec<_>>()
    );
    assert_eq!(loaded.relations(), schedule.relations());
    assert_eq!(loaded.relations()[0].lag, 1);
    assert_eq!(loaded.metadata(), &ScheduleMetadata::default());
    assert!(!loaded.calendar_is_custom());
}

#[test]
fn csv_with_inverted_dates_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "id,subject,start_date,due_date,duration,ignore_non_working_days,scheduling_mode,is_milestone,parent_id,predecessors\n\
         1,Broken,2024-01-10,2024-01-08,,false,automatic,false,,\n",
    )
    .unwrap();
    assert!(matches!(
        load_schedule_from_csv(tmp.path()),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[test]
fn csv_without_rows_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "id,subject,start_date,due_date,duration,ignore_non_working_days,scheduling_mode,is_milestone,parent_id,predecessors\n",
    )
    .unwrap();
    assert!(matches!(
        load_schedule_from_csv(tmp.path()),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[test]
fn calendar_config_round_trip() {
    let config = WorkCalendarConfig::new(
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu],
        [d(2024, 12, 24), d(2024, 12, 31)],
    )
    .unwrap();
    let tmp = NamedTempFile::new().unwrap();
    save_calendar_config(&config, tmp.path()).unwrap();
    assert_eq!(load_calendar_config(tmp.path()).unwrap(), config);
}

#[test]
fn calendar_config_without_working_days_is_rejected() {
    let tmp = NamedTempFile::new().unwrap();
    fs::write(tmp.path(), r#"{"working_days":[],"holidays":[]}"#).unwrap();
    assert!(matches!(
        load_calendar_config(tmp.path()),
        Err(PersistenceError::Calendar(CalendarError::NoWorkingDays))
    ));
}

#[test]
fn changes_export_lists_causes() {
    let mut schedule = sample_schedule();
    schedule
        .apply_edit(WorkItemEdit::new(ItemId(2)).duration(Some(5)))
        .unwrap();
    let tmp = NamedTempFile::new().unwrap();
    export_changes_to_csv(schedule.last_changes(), tmp.path()).unwrap();

    let text = fs::read_to_string(tmp.path()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,start_date,due_date,duration,ignore_non_working_days,cause,cause_item")
    );
    assert!(text.contains("2,2024-01-08,2024-01-12,5,false,edited,"));
    assert!(text.contains("1,2024-01-08,2024-01-12,5,false,children,"));
}

#[test]
fn json_store_reports_missing_file_as_empty() {
    let dir = tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("schedule.json"));
    assert!(store.load_schedule().unwrap().is_none());

    store.save_schedule(&sample_schedule()).unwrap();
    let loaded = store.load_schedule().unwrap().unwrap();
    assert_eq!(loaded.metadata().project_name, "Warehouse");
    assert_eq!(loaded.network().len(), 4);
}
