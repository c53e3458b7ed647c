//! Translation of list filters into SQL predicates with bound parameters.

use chrono::{Duration, NaiveDateTime};
use rusqlite::types::Value;

use crate::date::{format_timestamp, ResolvedDate, DATE_FORMAT};
use crate::model::{Priority, Status};

/// An unfiltered list only shows tasks created within this many days.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due: Option<ResolvedDate>,
    pub created: Option<ResolvedDate>,
    pub tag: Option<String>,
    pub find: Option<String>,
}

impl ListFilter {
    /// True when no filter narrows the result, so the default window applies.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.due.is_none()
            && self.created.is_none()
            && non_empty(&self.tag).is_none()
            && non_empty(&self.find).is_none()
    }
}

/// The moment `column` stands for when compared against a point in time. A
/// date-only value means the end of that day, the same as a date-only filter.
pub fn due_moment(column: &str) -> String {
    format!("(CASE WHEN length({column}) = 10 THEN {column} || ' 23:59:59' ELSE {column} END)")
}

/// Clauses are joined with AND; `params` bind to the `?` placeholders in order.
#[derive(Debug, Default, PartialEq)]
pub struct Predicates {
    pub clauses: Vec<String>,
    pub params: Vec<Value>,
}

impl Predicates {
    fn push(&mut self, clause: impl Into<String>, param: impl Into<Value>) {
        self.clauses.push(clause.into());
        self.params.push(param.into());
    }

    /// ` WHERE a AND b`, or an empty string when there are no clauses.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// How a point date compares against its column.
#[derive(Debug, Clone, Copy)]
enum PointMatch {
    /// Column value at or before the moment; a bare date means end of that day.
    AtOrBefore,
    /// Column falls on the same day (date) or minute (datetime).
    Same,
}

pub fn build_predicates(filter: &ListFilter, now: NaiveDateTime) -> Predicates {
    let mut preds = Predicates::default();

    if let Some(status) = filter.status {
        preds.push("status = ?", status.code());
    }
    if let Some(priority) = filter.priority {
        preds.push("priority = ?", priority.code());
    }
    if let Some(due) = &filter.due {
        push_date(&mut preds, "due", due, PointMatch::AtOrBefore);
    }
    if let Some(tag) = non_empty(&filter.tag) {
        preds.push("instr(tag, ?) > 0", tag.to_string());
    }
    if let Some(find) = non_empty(&filter.find) {
        preds.push("instr(lower(text), lower(?)) > 0", find.to_string());
    }
    if let Some(created) = &filter.created {
        push_date(&mut preds, "created_at", created, PointMatch::Same);
    }

    if filter.is_empty() {
        let since = now - Duration::days(DEFAULT_WINDOW_DAYS);
        preds.push("created_at >= ?", format_timestamp(since));
    }

    preds
}

fn push_date(preds: &mut Predicates, column: &str, date: &ResolvedDate, point: PointMatch) {
    match (date, point) {
        (ResolvedDate::Date(d), PointMatch::AtOrBefore) => {
            preds.push(
                format!("{} <= ?", due_moment(column)),
                format!("{} 23:59:59", d.format(DATE_FORMAT)),
            );
        }
        (ResolvedDate::DateTime(dt), PointMatch::AtOrBefore) => {
            preds.push(format!("{} <= ?", due_moment(column)), format_timestamp(*dt));
        }
        (ResolvedDate::Date(d), PointMatch::Same) => {
            preds.push(format!("date({column}) = ?"), d.format(DATE_FORMAT).to_string());
        }
        (ResolvedDate::DateTime(dt), PointMatch::Same) => {
            preds.push(
                format!("strftime('%Y-%m-%d %H:%M', {column}) = ?"),
                dt.format("%Y-%m-%d %H:%M").to_string(),
            );
        }
        (ResolvedDate::Month { year, month }, _) => {
            preds.push(format!("strftime('%Y', {column}) = ?"), format!("{year:04}"));
            preds.push(format!("strftime('%m', {column}) = ?"), format!("{month:02}"));
        }
        (ResolvedDate::Year(year), _) => {
            preds.push(format!("strftime('%Y', {column}) = ?"), format!("{year:04}"));
        }
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}
