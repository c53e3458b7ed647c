use clap::{Args, Parser, Subcommand};

use todo::error::TodoError;
use todo::validate::RawFields;

#[derive(Parser)]
#[command(name = "todo", about = "Personal todo tracker with desktop reminders")]
pub struct Cli {
    /// Path to the SQLite database [default: ~/.todo/todos.db]
    #[arg(long, env = "TODO_DB", global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by add, list and update.
#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    /// Status: pending, processing, done (or 1, 2, 3)
    #[arg(short, long)]
    pub status: Option<String>,
    /// Priority: low, medium, high (or 1, 2, 3)
    #[arg(short, long)]
    pub priority: Option<String>,
    /// Due date: YYYY-MM-DD, YYYY-MM-DD HH:MM, HH:MM, a weekday, YYYY-MM or YYYY
    #[arg(short, long)]
    pub due: Option<String>,
    /// Free-form tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

impl FieldArgs {
    pub fn into_raw(self, created: Option<String>) -> RawFields {
        RawFields {
            text: None,
            status: self.status,
            priority: self.priority,
            due: self.due,
            tag: self.tag,
            created,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Add a task
    Add {
        /// Task text
        text: String,
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// List tasks (the last week's when no filter is given)
    #[command(visible_alias = "ls")]
    List {
        #[command(flatten)]
        fields: FieldArgs,
        /// Creation date filter, same forms as --due
        #[arg(short, long)]
        created: Option<String>,
        /// Case-insensitive substring of the task text
        #[arg(short, long)]
        find: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update one or more tasks: `update <id>... [text]`
    Update {
        /// Task ids, optionally followed by new text
        #[arg(required = true)]
        args: Vec<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Delete tasks by id
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Manage the reminder daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Run the daemon in the foreground
    Start {
        /// Minutes between reminder checks (overrides config)
        #[arg(long)]
        interval: Option<u32>,
    },
    /// Signal the running daemon to exit
    Stop,
    /// Report whether the daemon is running
    Status,
}

/// Split `update` positionals into leading ids and an optional trailing text.
pub fn split_update_args(args: &[String]) -> Result<(Vec<i64>, Option<String>), TodoError> {
    let mut ids = Vec::new();
    let mut text = None;
    for arg in args {
        match arg.parse::<i64>() {
            Ok(id) if text.is_none() => ids.push(id),
            _ if text.is_none() => text = Some(arg.clone()),
            _ => {
                return Err(TodoError::usage(format!(
                    "unexpected argument '{arg}': text must come last and only once"
                )))
            }
        }
    }
    if ids.is_empty() {
        return Err(TodoError::usage("update needs at least one task id"));
    }
    Ok((ids, text))
}
