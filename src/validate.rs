use anyhow::{bail, Result};
use chrono::NaiveDateTime;

use crate::date::{self, Direction, ResolvedDate};
use crate::error::TodoError;
use crate::filter::ListFilter;
use crate::model::{Priority, Status};
use crate::ops::{NewTask, TaskUpdate};

/// Flag values as typed on the command line. `add`, `list` and `update`
/// share this shape and differ only in which fields they populate.
#[derive(Debug, Clone, Default)]
pub struct RawFields {
    /// Task text for add, or replacement text for update.
    pub text: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub tag: Option<String>,
    pub created: Option<String>,
}

/// Whether the fields will be written to a task or used to filter a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Write,
    Filter,
}

#[derive(Debug, Clone, Default)]
pub struct Fields {
    pub text: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub due: Option<ResolvedDate>,
    pub created: Option<ResolvedDate>,
    pub tag: Option<String>,
}

impl RawFields {
    /// Check every field and resolve date tokens against `now`.
    /// All problems are reported together in one `TodoError::Validation`.
    pub fn validate(&self, now: NaiveDateTime, purpose: Purpose) -> Result<Fields, TodoError> {
        let mut errors = Vec::new();
        let mut fields = Fields {
            tag: self.tag.clone(),
            ..Default::default()
        };

        // Unlike the flags, blank text is an error rather than absent.
        if let Some(text) = &self.text {
            match validate_text(text) {
                Ok(()) => fields.text = Some(text.clone()),
                Err(e) => errors.push(e.to_string()),
            }
        }
        if let Some(s) = given(&self.status) {
            match Status::parse(s) {
                Ok(status) => fields.status = Some(status),
                Err(e) => errors.push(e.to_string()),
            }
        }
        if let Some(p) = given(&self.priority) {
            match Priority::parse(p) {
                Ok(priority) => fields.priority = Some(priority),
                Err(e) => errors.push(e.to_string()),
            }
        }
        if let Some(d) = given(&self.due) {
            match date::resolve(d, now, Direction::Forward) {
                Ok(due) if purpose == Purpose::Write && !due.is_point() => errors.push(format!(
                    "invalid due date '{d}': a due date must name a day, not a whole month or year"
                )),
                Ok(due) => fields.due = Some(due),
                Err(_) => errors.push(format!("invalid due date '{d}'")),
            }
        }
        if let Some(c) = given(&self.created) {
            if purpose == Purpose::Write {
                errors.push("the creation date cannot be set".to_string());
            } else {
                match date::resolve(c, now, Direction::Backward) {
                    Ok(created) => fields.created = Some(created),
                    Err(_) => errors.push(format!("invalid created date '{c}'")),
                }
            }
        }

        if errors.is_empty() {
            Ok(fields)
        } else {
            Err(TodoError::Validation(errors))
        }
    }
}

impl Fields {
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            text: self.text.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            due: self.due,
            tag: self.tag.filter(|t| !t.is_empty()),
        }
    }

    pub fn into_update(self) -> TaskUpdate {
        TaskUpdate {
            text: self.text,
            status: self.status,
            priority: self.priority,
            due: self.due,
            tag: self.tag,
        }
    }

    pub fn into_filter(self, find: Option<String>) -> ListFilter {
        ListFilter {
            status: self.status,
            priority: self.priority,
            due: self.due,
            created: self.created,
            tag: self.tag,
            find,
        }
    }
}

/// Validate task text: must contain something other than whitespace.
pub fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        bail!("task text must not be empty");
    }
    Ok(())
}

fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
