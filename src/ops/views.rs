use std::ops::Range;

use chrono::{Days, Local, NaiveDate};
use regex::Regex;

use crate::model::task::Task;
use crate::ops::column_ops::ColumnStore;
use crate::ops::task_ops::TaskStore;

/// Calendar date of a task date field (`YYYY-MM-DD`, optionally with a
/// `T...` time suffix). Anything else is treated as no date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let day = value.split_once('T').map_or(value, |(day, _)| day);
    NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d").ok()
}

/// Today's date in the local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn start_date(task: &Task) -> Option<NaiveDate> {
    task.start_date.as_deref().and_then(parse_date)
}

fn due_date(task: &Task) -> Option<NaiveDate> {
    task.due_date.as_deref().and_then(parse_date)
}

/// Top-level tasks that are neither completed nor trashed.
fn open_top_level(tasks: &TaskStore) -> impl Iterator<Item = &Task> {
    tasks
        .iter()
        .filter(|t| t.is_top_level() && !t.completed && !t.trashed())
}

fn by_date_then_order(mut out: Vec<&Task>, key: impl Fn(&Task) -> Option<NaiveDate>) -> Vec<&Task> {
    out.sort_by_key(|t| (key(t), t.order));
    out
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Open tasks sitting in a progressing column, in column order.
pub fn progressing<'a>(tasks: &'a TaskStore, columns: &ColumnStore) -> Vec<&'a Task> {
    let mut out = Vec::new();
    for column in columns.ordered() {
        if !columns.is_progressing(&column.id) {
            continue;
        }
        out.extend(
            tasks
                .by_column(&column.id, None)
                .into_iter()
                .filter(|t| !t.completed && !t.trashed()),
        );
    }
    out
}

/// Open tasks whose start date is `today`.
pub fn today_tasks(tasks: &TaskStore, today: NaiveDate) -> Vec<&Task> {
    let out = open_top_level(tasks)
        .filter(|t| start_date(t) == Some(today))
        .collect();
    by_date_then_order(out, start_date)
}

/// Open tasks starting after `today` and no later than `today + days`.
pub fn upcoming(tasks: &TaskStore, today: NaiveDate, days: u32) -> Vec<&Task> {
    let end = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    let out = open_top_level(tasks)
        .filter(|t| start_date(t).is_some_and(|d| d > today && d <= end))
        .collect();
    by_date_then_order(out, start_date)
}

/// Completed top-level tasks that are not in the trash.
pub fn completed(tasks: &TaskStore) -> Vec<&Task> {
    let mut out: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.is_top_level() && t.completed && !t.trashed())
        .collect();
    out.sort_by_key(|t| t.order);
    out
}

/// Every trashed record, subtasks included.
pub fn trashed(tasks: &TaskStore) -> Vec<&Task> {
    tasks.iter().filter(|t| t.trashed()).collect()
}

/// Calendar/timeline source: top-level, non-trashed tasks whose start or
/// due date falls in `from..=to`.
pub fn scheduled_between(tasks: &TaskStore, from: NaiveDate, to: NaiveDate) -> Vec<&Task> {
    let in_range = |d: Option<NaiveDate>| d.is_some_and(|d| d >= from && d <= to);
    let out = tasks
        .iter()
        .filter(|t| t.is_top_level() && !t.trashed())
        .filter(|t| in_range(start_date(t)) || in_range(due_date(t)))
        .collect();
    by_date_then_order(out, |t| start_date(t).or_else(|| due_date(t)))
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Which field of a task matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Description,
}

/// A search hit for one field of a task.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub task_id: String,
    pub field: MatchField,
    pub spans: Vec<Range<usize>>,
}

fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search titles and descriptions of all non-trashed tasks, subtasks included.
pub fn search(tasks: &TaskStore, re: &Regex) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for task in tasks.iter().filter(|t| !t.trashed()) {
        let spans = find_matches(re, &task.title);
        if !spans.is_empty() {
            hits.push(SearchHit {
                task_id: task.id.clone(),
                field: MatchField::Title,
                spans,
            });
        }
        if let Some(description) = &task.description {
            let spans = find_matches(re, description);
            if !spans.is_empty() {
                hits.push(SearchHit {
                    task_id: task.id.clone(),
                    field: MatchField::Description,
                    spans,
                });
            }
        }
    }
    hits
}
