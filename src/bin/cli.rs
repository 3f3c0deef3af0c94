use chrono::NaiveDate;
use schedule_engine::persistence::{
    export_changes_to_csv, load_calendar_config, load_schedule_from_csv, load_schedule_from_json,
    save_calendar_config, save_schedule_to_csv, save_schedule_to_json,
};
use schedule_engine::{
    ItemId, RescheduleSummary, Schedule, ScheduleError, ScheduleMetadata, SchedulingMode, WorkItem,
    WorkItemEdit,
};
use std::env;
use std::io::{self, Write};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SCHEDULE_ENGINE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("schedule_engine=warn"));

    let format = env::var("SCHEDULE_ENGINE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if cell.len() > widths[ci] {
                widths[ci] = cell.len();
            }
        }
    }

    let mut sep = String::new();
    sep.push('+');
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&widths, headers.iter().copied()));
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(&widths, row.iter().map(String::as_str)));
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn render_row<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.enumerate() {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(widths[ci].saturating_sub(cell.len())));
        line.push_str(" |");
    }
    line.push('\n');
    line
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}

fn render_schedule(schedule: &Schedule) -> String {
    let headers = [
        "id", "subject", "mode", "start", "due", "duration", "nwd", "milestone", "parent",
        "predecessors",
    ];
    let mut items: Vec<&WorkItem> = schedule.items().collect();
    items.sort_by_key(|item| item.id);
    let rows: Vec<Vec<String>> = items
        .into_iter()
        .map(|item| {
            let predecessors = schedule
                .network()
                .predecessors(item.id)
                .map(|relation| match relation.lag {
                    0 => relation.predecessor.0.to_string(),
                    lag => format!("{}+{}", relation.predecessor.0, lag),
                })
                .collect::<Vec<_>>()
                .join(",");
            vec![
                item.id.0.to_string(),
                item.subject.clone(),
                item.scheduling_mode.as_str().to_string(),
                format_date(item.start_date),
                format_date(item.due_date),
                item.duration.map(|d| d.to_string()).unwrap_or_default(),
                if item.ignore_non_working_days { "ignore" } else { "" }.to_string(),
                if item.is_milestone { "yes" } else { "" }.to_string(),
                item.parent.map(|p| p.0.to_string()).unwrap_or_default(),
                predecessors,
            ]
        })
        .collect();
    render_text_table(&headers, &rows)
}

fn render_changes(summary: &RescheduleSummary) -> String {
    let headers = ["id", "start", "due", "duration", "cause"];
    let rows: Vec<Vec<String>> = summary
        .changes
        .iter()
        .map(|(id, dates)| {
            vec![
                id.0.to_string(),
                format_date(dates.start_date),
                format_date(dates.due_date),
                dates.duration.map(|d| d.to_string()).unwrap_or_default(),
                dates.cause.to_string(),
            ]
        })
        .collect();
    render_text_table(&headers, &rows)
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  show                               Show all work items\n  new                                Add an empty work item with the next id\n  add <id> <subject> [duration] [start]\n                                     Add a work item (start as YYYY-MM-DD)\n  delete <id>                        Delete a work item and its relations\n  start    <id> <YYYY-MM-DD|->       Set or clear the start date\n  due      <id> <YYYY-MM-DD|->       Set or clear the due date\n  dur      <id> <days|->             Set or clear the duration\n  mode     <id> <manual|automatic>   Set the scheduling mode\n  milestone <id> <true|false>        Mark or unmark as milestone\n  nwd      <id> <true|false>         Ignore non-working days\n  parent   <id> <parent_id|->        Set or clear the parent\n  follow   <pred> <succ> [lag]       Add a follows relation\n  unfollow <pred> <succ>             Remove a follows relation\n  reschedule <id>                    Recompute an item and its dependents\n  changes                            Show the last committed changes\n  export <csv_path>                  Export the last changes as CSV\n  cycles                             List items on dependency cycles\n  meta show                          Show project metadata\n  meta name <text...>                Update project name\n  meta desc <text...>                Update project description\n  meta dates <start> <end>           Update project start/end dates (YYYY-MM-DD)\n  calendar show                      Display calendar configuration summary\n  calendar default                   Reset to default calendar for metadata span\n  calendar set <json_path>           Load calendar config from JSON file\n  calendar save <json_path>          Save current calendar config to JSON file\n  save <json|csv> <path>             Persist schedule to disk\n  load <json|csv> <path>             Load schedule from disk\n  quit|exit                          Exit"
    );
}

fn print_metadata(schedule: &Schedule) {
    let metadata = schedule.metadata();
    println!("Project name       : {}", metadata.project_name);
    println!("Project description: {}", metadata.project_description);
    println!("Project start date : {}", metadata.project_start_date);
    println!("Project end date   : {}", metadata.project_end_date);
}

fn print_calendar_info(schedule: &Schedule) {
    let config = schedule.calendar_config();
    let working_days = config
        .working_days()
        .iter()
        .map(|wd| wd.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "Calendar ({}): working days [{}], {} holidays",
        if schedule.calendar_is_custom() { "custom" } else { "default" },
        working_days,
        config.holidays().len()
    );
}

fn parse_id(input: Option<&str>) -> Option<ItemId> {
    input.and_then(|s| s.parse::<u64>().ok()).map(ItemId)
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

/// `-` clears a value.
fn parse_clearable<T>(input: &str, parse: impl Fn(&str) -> Option<T>) -> Option<Option<T>> {
    if input == "-" {
        Some(None)
    } else {
        parse(input).map(Some)
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn report(result: Result<RescheduleSummary, ScheduleError>) {
    match result {
        Ok(summary) => {
            println!("Rescheduled ({})", summary.to_cli_summary());
            println!("{}", render_changes(&summary));
        }
        Err(ScheduleError::Rejected(errors)) => {
            println!("Rejected:");
            for error in errors.iter() {
                println!("  {}", error);
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn edit_command(cmd: &str, id: ItemId, value: &str) -> Option<WorkItemEdit> {
    let edit = WorkItemEdit::new(id);
    match cmd {
        "start" => parse_clearable(value, parse_date).map(|date| edit.start_date(date)),
        "due" => parse_clearable(value, parse_date).map(|date| edit.due_date(date)),
        "dur" => parse_clearable(value, |s| s.parse::<i64>().ok()).map(|d| edit.duration(d)),
        "mode" => SchedulingMode::parse(value).map(|mode| edit.scheduling_mode(mode)),
        "milestone" => parse_bool(value).map(|flag| edit.milestone(flag)),
        "nwd" => parse_bool(value).map(|flag| edit.ignore_non_working_days(flag)),
        _ => parse_clearable(value, |s| parse_id(Some(s))).map(|parent| edit.parent(parent)),
    }
}

fn main() {
    init_tracing();

    let mut schedule = Schedule::new();

    println!("Schedule Engine (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => println!("{}", render_schedule(&schedule)),
            "new" => {
                let id = schedule.next_id();
                match schedule.add_item(WorkItem::new(id, "")) {
                    Ok(_) => println!("Added empty work item {}.", id),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "add" => {
                let id = parse_id(parts.next());
                let subject = parts.next();
                let duration = parts.next();
                let start = parts.next();
                match (id, subject) {
                    (Some(id), Some(subject)) => {
                        let mut item = WorkItem::new(id, subject);
                        if let Some(duration_s) = duration {
                            match duration_s.parse::<i64>() {
                                Ok(v) => item = item.with_duration(v),
                                Err(_) => {
                                    println!("Invalid duration");
                                    continue;
                                }
                            }
                        }
                        if let Some(start_s) = start {
                            match parse_date(start_s) {
                                Some(date) => item = item.with_dates(Some(date), None),
                                None => {
                                    println!("Invalid date (YYYY-MM-DD)");
                                    continue;
                                }
                            }
                        }
                        report(schedule.add_item(item));
                    }
                    _ => println!("Usage: add <id> <subject> [duration] [start]"),
                }
            }
            "delete" => match parse_id(parts.next()) {
                Some(id) => match schedule.remove_item(id) {
                    Ok(_) => println!("Deleted work item {}.", id),
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("Usage: delete <id>"),
            },
            "start" | "due" | "dur" | "mode" | "milestone" | "nwd" | "parent" => {
                let id = parse_id(parts.next());
                let value = parts.next();
                match (id, value) {
                    (Some(id), Some(value)) => match edit_command(cmd, id, value) {
                        Some(edit) => report(schedule.apply_edit(edit)),
                        None => println!("Invalid value '{}' for {}", value, cmd),
                    },
                    _ => println!("Usage: {} <id> <value>", cmd),
                }
            }
            "follow" => {
                let predecessor = parse_id(parts.next());
                let successor = parse_id(parts.next());
                let lag = match parts.next().map(|s| s.parse::<u32>()) {
                    None => 0,
                    Some(Ok(lag)) => lag,
                    Some(Err(_)) => {
                        println!("Invalid lag");
                        continue;
                    }
                };
                match (predecessor, successor) {
                    (Some(predecessor), Some(successor)) => {
                        report(schedule.add_relation(predecessor, successor, lag))
                    }
                    _ => println!("Usage: follow <pred> <succ> [lag]"),
                }
            }
            "unfollow" => match (parse_id(parts.next()), parse_id(parts.next())) {
                (Some(predecessor), Some(successor)) => {
                    if schedule.remove_relation(predecessor, successor) {
                        println!("Relation removed.");
                    } else {
                        println!("No such relation.");
                    }
                }
                _ => println!("Usage: unfollow <pred> <succ>"),
            },
            "reschedule" => match parse_id(parts.next()) {
                Some(id) => report(schedule.reschedule(id)),
                None => println!("Usage: reschedule <id>"),
            },
            "changes" => {
                for (id, dates) in schedule.last_changes().iter() {
                    println!(
                        "{} start={} due={} cause={}",
                        id,
                        format_date(dates.start_date),
                        format_date(dates.due_date),
                        dates.cause
                    );
                }
            }
            "export" => match parts.next() {
                Some(path) => match export_changes_to_csv(schedule.last_changes(), path) {
                    Ok(_) => println!("Changes exported to {}.", path),
                    Err(e) => println!("Export error: {}", e),
                },
                None => println!("Usage: export <csv_path>"),
            },
            "cycles" => {
                let cycles = schedule.cycles();
                if cycles.is_empty() {
                    println!("No cycles.");
                }
                for cycle in cycles {
                    let ids = cycle.iter().map(ToString::to_string).collect::<Vec<_>>();
                    println!("Cycle: {}", ids.join(" -> "));
                }
            }
            "meta" => match parts.next() {
                Some("show") => print_metadata(&schedule),
                Some("name") => {
                    let text = parts.collect::<Vec<_>>().join(" ");
                    schedule.set_project_name(text);
                    println!("Project name updated.");
                }
                Some("desc") => {
                    let text = parts.collect::<Vec<_>>().join(" ");
                    schedule.set_project_description(text);
                    println!("Project description updated.");
                }
                Some("dates") => {
                    let start = parts.next().and_then(parse_date);
                    let end = parts.next().and_then(parse_date);
                    match (start, end) {
                        (Some(start), Some(end)) => {
                            let metadata = ScheduleMetadata {
                                project_start_date: start,
                                project_end_date: end,
                                ..schedule.metadata().clone()
                            };
                            match schedule.set_metadata(metadata) {
                                Ok(_) => println!("Project dates updated."),
                                Err(e) => println!("Error: {}", e),
                            }
                        }
                        _ => println!("Usage: meta dates <start> <end>"),
                    }
                }
                _ => println!("Usage: meta <show|name|desc|dates>"),
            },
            "calendar" => match (parts.next(), parts.next()) {
                (Some("show"), _) => print_calendar_info(&schedule),
                (Some("default"), _) => {
                    schedule.reset_calendar_to_default();
                    println!("Calendar reset to default.");
                }
                (Some("set"), Some(path)) => match load_calendar_config(path) {
                    Ok(config) => match schedule.set_calendar_from_config(&config) {
                        Ok(_) => println!("Calendar loaded from {}.", path),
                        Err(e) => println!("Error: {}", e),
                    },
                    Err(e) => println!("Calendar load error: {}", e),
                },
                (Some("save"), Some(path)) => {
                    match save_calendar_config(&schedule.calendar_config(), path) {
                        Ok(_) => println!("Calendar saved to {}.", path),
                        Err(e) => println!("Calendar save error: {}", e),
                    }
                }
                _ => println!("Usage: calendar <show|default|set <path>|save <path>>"),
            },
            "save" => match (parts.next(), parts.next()) {
                (Some(format), Some(path)) => {
                    let result = match format {
                        "json" => save_schedule_to_json(&schedule, path),
                        "csv" => save_schedule_to_csv(&schedule, path),
                        _ => {
                            println!("Unknown format '{}'", format);
                            continue;
                        }
                    };
                    match result {
                        Ok(_) => println!("Schedule saved to {}.", path),
                        Err(e) => println!("Save error: {}", e),
                    }
                }
                _ => println!("Usage: save <json|csv> <path>"),
            },
            "load" => match (parts.next(), parts.next()) {
                (Some(format), Some(path)) => {
                    let result = match format {
                        "json" => load_schedule_from_json(path),
                        "csv" => load_schedule_from_csv(path),
                        _ => {
                            println!("Unknown format '{}'", format);
                            continue;
                        }
                    };
                    match result {
                        Ok(loaded) => {
                            schedule = loaded;
                            println!("Schedule loaded from {}.", path);
                            println!("{}", render_schedule(&schedule));
                        }
                        Err(e) => println!("Load error: {}", e),
                    }
                }
                _ => println!("Usage: load <json|csv> <path>"),
            },
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
