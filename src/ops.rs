use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use crate::date::{format_timestamp, ResolvedDate};
use crate::filter::{build_predicates, due_moment, ListFilter};
use crate::model::{Priority, Status, Task};
use crate::validate::validate_text;

const TASK_COLUMNS: &str = "id, text, status, priority, due, tag, created_at, updated_at";

const NOW_LOCAL: &str = "datetime('now', 'localtime')";

fn read_task_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        text: row.get(1)?,
        status: row.get(2)?,
        priority: row.get(3)?,
        due: row.get(4)?,
        tag: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn query_tasks(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), read_task_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

fn id_placeholders(ids: &[i64]) -> String {
    ids.iter().map(|_| "?").collect::<Vec<_>>().join(",")
}

/// The stored form of a due date. Month and year anchors are filters only.
fn due_value(due: &ResolvedDate) -> Result<String> {
    match due.point_value() {
        Some(v) => Ok(v),
        None => bail!("due date '{due}' must name a day, not a whole month or year"),
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub text: String,
    pub status: Status,
    pub priority: Priority,
    pub due: Option<ResolvedDate>,
    pub tag: Option<String>,
}

/// Only the `Some` fields are written. An empty tag clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub text: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due: Option<ResolvedDate>,
    pub tag: Option<String>,
}

/// Insert a task and return its id.
pub fn add_task(conn: &Connection, task: &NewTask) -> Result<i64> {
    validate_text(&task.text)?;
    let due = task.due.as_ref().map(due_value).transpose()?;
    conn.execute(
        "INSERT INTO todos (text, status, priority, due, tag) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![task.text, task.status, task.priority, due, task.tag],
    )?;
    let id = conn.last_insert_rowid();
    debug!("inserted task {id}");
    Ok(id)
}

pub fn get_task(conn: &Connection, id: i64) -> Result<Task> {
    let query = format!("SELECT {TASK_COLUMNS} FROM todos WHERE id = ?1");
    match conn.query_row(&query, [id], read_task_row) {
        Ok(task) => Ok(task),
        Err(rusqlite::Error::QueryReturnedNoRows) => bail!("task {id} not found"),
        Err(e) => Err(e.into()),
    }
}

/// List tasks matching `filter`, highest priority first, then by id.
pub fn list_tasks(conn: &Connection, filter: &ListFilter, now: NaiveDateTime) -> Result<Vec<Task>> {
    let preds = build_predicates(filter, now);
    let query = format!(
        "SELECT {TASK_COLUMNS} FROM todos{} ORDER BY priority DESC, id ASC",
        preds.where_clause()
    );
    debug!("list query: {query}");
    query_tasks(conn, &query, &preds.params)
}

/// Apply `update` to every task in `ids`. `updated_at` always refreshes.
/// Returns the number of tasks changed; unknown ids are skipped.
pub fn update_tasks(conn: &Connection, ids: &[i64], update: &TaskUpdate) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut sets = vec![format!("updated_at = {NOW_LOCAL}")];
    let mut params: Vec<Value> = Vec::new();

    if let Some(text) = &update.text {
        validate_text(text)?;
        sets.push("text = ?".into());
        params.push(text.clone().into());
    }
    if let Some(status) = update.status {
        sets.push("status = ?".into());
        params.push(status.code().into());
    }
    if let Some(priority) = update.priority {
        sets.push("priority = ?".into());
        params.push(priority.code().into());
    }
    if let Some(due) = &update.due {
        sets.push("due = ?".into());
        params.push(due_value(due)?.into());
    }
    if let Some(tag) = &update.tag {
        sets.push("tag = ?".into());
        params.push(if tag.is_empty() {
            Value::Null
        } else {
            tag.clone().into()
        });
    }
    params.extend(ids.iter().map(|&id| Value::Integer(id)));

    let query = format!(
        "UPDATE todos SET {} WHERE id IN ({})",
        sets.join(", "),
        id_placeholders(ids)
    );
    let changed = conn.execute(&query, params_from_iter(&params))?;
    debug!("updated {changed} of {} requested tasks", ids.len());
    Ok(changed)
}

/// Delete every task in `ids`. Ids that do not exist are ignored.
pub fn delete_tasks(conn: &Connection, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let query = format!("DELETE FROM todos WHERE id IN ({})", id_placeholders(ids));
    let removed = conn.execute(&query, params_from_iter(ids))?;
    debug!("deleted {removed} of {} requested tasks", ids.len());
    Ok(removed)
}

/// Unfinished tasks due at or before `now`. A date-only due is reached at the
/// end of its day.
pub fn overdue_tasks(conn: &Connection, now: NaiveDateTime) -> Result<Vec<Task>> {
    let moment = due_moment("due");
    let query = format!(
        "SELECT {TASK_COLUMNS} FROM todos WHERE {moment} <= ?1 AND status != ?2 ORDER BY {moment}, id"
    );
    query_tasks(
        conn,
        &query,
        &[format_timestamp(now).into(), Status::Done.code().into()],
    )
}

/// Unfinished tasks with a due time in `[from, to)`.
pub fn tasks_due_between(conn: &Connection, from: NaiveDateTime, to: NaiveDateTime) -> Result<Vec<Task>> {
    let moment = due_moment("due");
    let query = format!(
        "SELECT {TASK_COLUMNS} FROM todos \
         WHERE {moment} >= ?1 AND {moment} < ?2 AND status != ?3 ORDER BY {moment}, id"
    );
    query_tasks(
        conn,
        &query,
        &[
            format_timestamp(from).into(),
            format_timestamp(to).into(),
            Status::Done.code().into(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::{Local, NaiveDate};

    fn local_now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> ResolvedDate {
        ResolvedDate::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn new_task(text: &str) -> NewTask {
        NewTask {
            text: text.to_string(),
            status: Status::default(),
            priority: Priority::default(),
            due: None,
            tag: None,
        }
    }

    fn add(conn: &Connection, text: &str) -> i64 {
        add_task(conn, &new_task(text)).unwrap()
    }

    fn add_due(conn: &Connection, text: &str, due: ResolvedDate) -> i64 {
        add_task(
            conn,
            &NewTask {
                due: Some(due),
                ..new_task(text)
            },
        )
        .unwrap()
    }

    fn backdate(conn: &Connection, id: i64, created_at: &str) {
        conn.execute(
            "UPDATE todos SET created_at = ?1 WHERE id = ?2",
            rusqlite::params![created_at, id],
        )
        .unwrap();
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn add_and_get_task() {
        let conn = db::open_memory().unwrap();
        let id = add_task(
            &conn,
            &NewTask {
                text: "buy milk".into(),
                status: Status::Processing,
                priority: Priority::High,
                due: Some(day(2025, 8, 20)),
                tag: Some("home,errand".into()),
            },
        )
        .unwrap();
        let task = get_task(&conn, id).unwrap();
        assert_eq!(task.text, "buy milk");
        assert_eq!(task.status, Status::Processing);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due.as_deref(), Some("2025-08-20"));
        assert_eq!(task.tag.as_deref(), Some("home,errand"));
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn ids_are_monotonic() {
        let conn = db::open_memory().unwrap();
        let a = add(&conn, "a");
        let b = add(&conn, "b");
        delete_tasks(&conn, &[b]).unwrap();
        let c = add(&conn, "c");
        assert!(a < b && b < c);
    }

    #[test]
    fn add_rejects_empty_text() {
        let conn = db::open_memory().unwrap();
        assert!(add_task(&conn, &new_task("  ")).is_err());
    }

    #[test]
    fn add_rejects_range_due() {
        let conn = db::open_memory().unwrap();
        let task = NewTask {
            due: Some(ResolvedDate::Month { year: 2025, month: 8 }),
            ..new_task("t")
        };
        assert!(add_task(&conn, &task).is_err());
    }

    #[test]
    fn get_missing_task_fails() {
        let conn = db::open_memory().unwrap();
        assert!(get_task(&conn, 42).is_err());
    }

    #[test]
    fn unfiltered_list_only_shows_last_week() {
        let conn = db::open_memory().unwrap();
        let recent = add(&conn, "recent");
        let old = add(&conn, "old");
        backdate(&conn, old, "2000-01-01 00:00:00");

        let tasks = list_tasks(&conn, &ListFilter::default(), local_now()).unwrap();
        assert_eq!(ids(&tasks), vec![recent]);

        let filter = ListFilter {
            priority: Some(Priority::Medium),
            ..Default::default()
        };
        let tasks = list_tasks(&conn, &filter, local_now()).unwrap();
        assert_eq!(ids(&tasks), vec![recent, old]);
    }

    #[test]
    fn list_orders_by_priority_then_id() {
        let conn = db::open_memory().unwrap();
        let low = add_task(
            &conn,
            &NewTask {
                priority: Priority::Low,
                ..new_task("low")
            },
        )
        .unwrap();
        let high1 = add_task(
            &conn,
            &NewTask {
                priority: Priority::High,
                ..new_task("high1")
            },
        )
        .unwrap();
        let medium = add(&conn, "medium");
        let high2 = add_task(
            &conn,
            &NewTask {
                priority: Priority::High,
                ..new_task("high2")
            },
        )
        .unwrap();
        let tasks = list_tasks(&conn, &ListFilter::default(), local_now()).unwrap();
        assert_eq!(ids(&tasks), vec![high1, high2, medium, low]);
    }

    #[test]
    fn due_filter_is_at_or_before() {
        let conn = db::open_memory().unwrap();
        let early = add_due(&conn, "early", day(2025, 8, 19));
        let same_day_late = add_due(
            &conn,
            "evening",
            ResolvedDate::DateTime(at(2025, 8, 20, 21, 0)),
        );
        let later = add_due(&conn, "later", day(2025, 8, 21));
        let _no_due = add(&conn, "no due");

        let filter = ListFilter {
            due: Some(day(2025, 8, 20)),
            ..Default::default()
        };
        let tasks = list_tasks(&conn, &filter, local_now()).unwrap();
        assert_eq!(ids(&tasks), vec![early, same_day_late]);

        let filter = ListFilter {
            due: Some(ResolvedDate::DateTime(at(2025, 8, 20, 12, 0))),
            ..Default::default()
        };
        let tasks = list_tasks(&conn, &filter, local_now()).unwrap();
        assert_eq!(ids(&tasks), vec![early]);
        assert!(!ids(&tasks).contains(&later));
    }

    #[test]
    fn month_filter_matches_whole_month() {
        let conn = db::open_memory().unwrap();
        let first = add_due(&conn, "first", day(2025, 8, 1));
        let last = add_due(&conn, "last", ResolvedDate::DateTime(at(2025, 8, 31, 23, 0)));
        add_due(&conn, "july", ResolvedDate::DateTime(at(2025, 7, 31, 23, 59)));
        add_due(&conn, "september", day(2025, 9, 1));
        add_due(&conn, "last year", day(2024, 8, 15));

        let filter = ListFilter {
            due: Some(ResolvedDate::Month { year: 2025, month: 8 }),
            ..Default::default()
        };
        let tasks = list_tasks(&conn, &filter, local_now()).unwrap();
        assert_eq!(ids(&tasks), vec![first, last]);
    }

    #[test]
    fn december_and_january_are_distinct_months() {
        let conn = db::open_memory().unwrap();
        let dec = add_due(&conn, "dec", day(2024, 12, 31));
        let jan = add_due(&conn, "jan", day(2025, 1, 1));

        let filter = |year, month| ListFilter {
            due: Some(ResolvedDate::Month { year, month }),
            ..Default::default()
        };
        assert_eq!(ids(&list_tasks(&conn, &filter(2024, 12), local_now()).unwrap()), vec![dec]);
        assert_eq!(ids(&list_tasks(&conn, &filter(2025, 1), local_now()).unwrap()), vec![jan]);

        let year = ListFilter {
            due: Some(ResolvedDate::Year(2025)),
            ..Default::default()
        };
        assert_eq!(ids(&list_tasks(&conn, &year, local_now()).unwrap()), vec![jan]);
    }

    #[test]
    fn created_filter_is_exact_day() {
        let conn = db::open_memory().unwrap();
        let monday = add(&conn, "monday");
        let tuesday = add(&conn, "tuesday");
        backdate(&conn, monday, "2025-08-18 09:15:00");
        backdate(&conn, tuesday, "2025-08-19 09:15:00");

        let filter = ListFilter {
            created: Some(day(2025, 8, 18)),
            ..Default::default()
        };
        assert_eq!(ids(&list_tasks(&conn, &filter, local_now()).unwrap()), vec![monday]);

        let filter = ListFilter {
            created: Some(ResolvedDate::DateTime(at(2025, 8, 19, 9, 15))),
            ..Default::default()
        };
        assert_eq!(ids(&list_tasks(&conn, &filter, local_now()).unwrap()), vec![tuesday]);
    }

    #[test]
    fn tag_match_is_case_sensitive_substring() {
        let conn = db::open_memory().unwrap();
        let tagged = add_task(
            &conn,
            &NewTask {
                tag: Some("project1,ui".into()),
                ..new_task("tagged")
            },
        )
        .unwrap();
        add_task(
            &conn,
            &NewTask {
                tag: Some("UI".into()),
                ..new_task("upper")
            },
        )
        .unwrap();
        add(&conn, "untagged");

        let filter = ListFilter {
            tag: Some("ui".into()),
            ..Default::default()
        };
        assert_eq!(ids(&list_tasks(&conn, &filter, local_now()).unwrap()), vec![tagged]);
    }

    #[test]
    fn find_searches_text() {
        let conn = db::open_memory().unwrap();
        let milk = add(&conn, "Buy milk");
        add(&conn, "walk dog");
        let filter = ListFilter {
            find: Some("MILK".into()),
            ..Default::default()
        };
        assert_eq!(ids(&list_tasks(&conn, &filter, local_now()).unwrap()), vec![milk]);
    }

    #[test]
    fn update_changes_only_given_fields() {
        let conn = db::open_memory().unwrap();
        let id = add_task(
            &conn,
            &NewTask {
                priority: Priority::High,
                due: Some(day(2025, 8, 20)),
                tag: Some("home".into()),
                ..new_task("buy milk")
            },
        )
        .unwrap();
        conn.execute(
            "UPDATE todos SET updated_at = '2000-01-01 00:00:00' WHERE id = ?1",
            [id],
        )
        .unwrap();
        let before = get_task(&conn, id).unwrap();

        let update = TaskUpdate {
            status: Some(Status::Done),
            ..Default::default()
        };
        assert_eq!(update_tasks(&conn, &[id], &update).unwrap(), 1);

        let after = get_task(&conn, id).unwrap();
        assert_eq!(after.status, Status::Done);
        assert_ne!(after.updated_at, before.updated_at);
        assert_eq!(after.text, before.text);
        assert_eq!(after.priority, before.priority);
        assert_eq!(after.due, before.due);
        assert_eq!(after.tag, before.tag);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn update_many_and_clear_tag() {
        let conn = db::open_memory().unwrap();
        let a = add_task(
            &conn,
            &NewTask {
                tag: Some("x".into()),
                ..new_task("a")
            },
        )
        .unwrap();
        let b = add(&conn, "b");
        let c = add(&conn, "c");

        let update = TaskUpdate {
            text: Some("renamed".into()),
            priority: Some(Priority::Low),
            due: Some(ResolvedDate::DateTime(at(2025, 9, 1, 18, 0))),
            tag: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update_tasks(&conn, &[a, b, 999], &update).unwrap(), 2);

        for id in [a, b] {
            let task = get_task(&conn, id).unwrap();
            assert_eq!(task.text, "renamed");
            assert_eq!(task.priority, Priority::Low);
            assert_eq!(task.due.as_deref(), Some("2025-09-01 18:00:00"));
            assert!(task.tag.is_none());
        }
        assert_eq!(get_task(&conn, c).unwrap().text, "c");
    }

    #[test]
    fn update_rejects_empty_text() {
        let conn = db::open_memory().unwrap();
        let id = add(&conn, "a");
        let update = TaskUpdate {
            text: Some(" ".into()),
            ..Default::default()
        };
        assert!(update_tasks(&conn, &[id], &update).is_err());
        assert_eq!(get_task(&conn, id).unwrap().text, "a");
    }

    #[test]
    fn delete_ignores_missing_ids() {
        let conn = db::open_memory().unwrap();
        let a = add(&conn, "a");
        let b = add(&conn, "b");
        let c = add(&conn, "c");
        assert_eq!(delete_tasks(&conn, &[a, 999]).unwrap(), 1);
        assert!(get_task(&conn, a).is_err());
        assert!(get_task(&conn, b).is_ok());
        assert!(get_task(&conn, c).is_ok());
        assert_eq!(delete_tasks(&conn, &[]).unwrap(), 0);
    }

    #[test]
    fn overdue_skips_done_and_future() {
        let conn = db::open_memory().unwrap();
        let overdue = add_due(&conn, "overdue", ResolvedDate::DateTime(at(2025, 8, 20, 8, 0)));
        let today = add_due(&conn, "today", day(2025, 8, 20));
        let yesterday = add_due(&conn, "yesterday", day(2025, 8, 19));
        let done = add_due(&conn, "done", day(2025, 8, 19));
        update_tasks(
            &conn,
            &[done],
            &TaskUpdate {
                status: Some(Status::Done),
                ..Default::default()
            },
        )
        .unwrap();
        add_due(&conn, "future", ResolvedDate::DateTime(at(2025, 8, 20, 18, 0)));
        add(&conn, "no due");

        let tasks = overdue_tasks(&conn, at(2025, 8, 20, 9, 0)).unwrap();
        assert_eq!(ids(&tasks), vec![yesterday, overdue]);

        let end_of_day = NaiveDate::from_ymd_opt(2025, 8, 20)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let tasks = overdue_tasks(&conn, end_of_day).unwrap();
        assert!(ids(&tasks).contains(&today));
    }

    #[test]
    fn date_only_due_is_end_of_day_for_every_comparison() {
        let conn = db::open_memory().unwrap();
        let task = add_due(&conn, "date only", day(2025, 8, 20));

        for morning in [at(2025, 8, 20, 0, 0), at(2025, 8, 20, 8, 0)] {
            let filter = ListFilter {
                due: Some(ResolvedDate::DateTime(morning)),
                ..Default::default()
            };
            assert!(list_tasks(&conn, &filter, local_now()).unwrap().is_empty());
        }

        let filter = ListFilter {
            due: Some(day(2025, 8, 20)),
            ..Default::default()
        };
        assert_eq!(ids(&list_tasks(&conn, &filter, local_now()).unwrap()), vec![task]);

        let last_tick = tasks_due_between(&conn, at(2025, 8, 20, 23, 55), at(2025, 8, 21, 0, 0)).unwrap();
        assert_eq!(ids(&last_tick), vec![task]);
        assert!(tasks_due_between(&conn, at(2025, 8, 20, 8, 0), at(2025, 8, 20, 8, 5))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn due_between_is_half_open() {
        let conn = db::open_memory().unwrap();
        let start = add_due(&conn, "start", ResolvedDate::DateTime(at(2025, 8, 20, 10, 0)));
        let inside = add_due(&conn, "inside", ResolvedDate::DateTime(at(2025, 8, 20, 10, 4)));
        add_due(&conn, "end", ResolvedDate::DateTime(at(2025, 8, 20, 10, 5)));
        add_due(&conn, "before", ResolvedDate::DateTime(at(2025, 8, 20, 9, 59)));

        let tasks =
            tasks_due_between(&conn, at(2025, 8, 20, 10, 0), at(2025, 8, 20, 10, 5)).unwrap();
        assert_eq!(ids(&tasks), vec![start, inside]);
    }
}
