mod cli;

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use rusqlite::Connection;

use cli::{split_update_args, Cli, Command, DaemonAction};
use todo::config::{Config, DaemonConfig};
use todo::daemon::Daemon;
use todo::error::TodoError;
use todo::notify::CommandNotifier;
use todo::validate::{Purpose, RawFields};
use todo::{db, ops, output, paths};

fn resolve_db_path(cli_db: Option<String>, data_dir: &Path) -> Result<String> {
    match cli_db {
        Some(p) => Ok(p),
        None => Ok(paths::default_db_path(data_dir)
            .to_str()
            .context("default DB path is not valid UTF-8")?
            .to_string()),
    }
}

fn open_db(db_path: &str) -> Result<Connection> {
    paths::ensure_parent(Path::new(db_path))?;
    let conn = db::open(db_path)?;
    db::init(&conn)?;
    Ok(conn)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn setup_cli_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

fn setup_daemon_logging(log_path: &Path) -> Result<()> {
    paths::ensure_parent(log_path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    env_logger::Builder::new()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        match e.downcast_ref::<TodoError>() {
            Some(TodoError::Usage(msg)) => {
                eprintln!("error: {msg}");
                eprintln!("Run 'todo --help' for usage.");
                std::process::exit(2);
            }
            Some(TodoError::Validation(errors)) => {
                eprintln!("Errors:");
                for msg in errors {
                    eprintln!("  {msg}");
                }
                std::process::exit(1);
            }
            _ => {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let data_dir = paths::data_dir()?;
    if matches!(
        cli.command,
        Command::Daemon {
            action: DaemonAction::Start { .. }
        }
    ) {
        setup_daemon_logging(&paths::daemon_log(&data_dir))?;
    } else {
        setup_cli_logging();
    }
    let db_path = resolve_db_path(cli.db, &data_dir)?;

    match cli.command {
        Command::Add { text, fields } => {
            let task = RawFields {
                text: Some(text),
                ..fields.into_raw(None)
            }
            .validate(now(), Purpose::Write)?
            .into_new_task();
            let conn = open_db(&db_path)?;
            let id = ops::add_task(&conn, &task)?;
            println!("Added task {id}");
        }

        Command::List {
            fields,
            created,
            find,
            json,
        } => {
            let now = now();
            let filter = fields
                .into_raw(created)
                .validate(now, Purpose::Filter)?
                .into_filter(find);
            let conn = open_db(&db_path)?;
            let tasks = ops::list_tasks(&conn, &filter, now)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                print!("{}", output::format_task_list(&tasks));
            }
        }

        Command::Update { args, fields } => {
            let (ids, text) = split_update_args(&args)?;
            let update = RawFields {
                text,
                ..fields.into_raw(None)
            }
            .validate(now(), Purpose::Write)?
            .into_update();
            let conn = open_db(&db_path)?;
            let n = ops::update_tasks(&conn, &ids, &update)?;
            println!("Updated {n} task(s)");
        }

        Command::Delete { ids } => {
            let conn = open_db(&db_path)?;
            let n = ops::delete_tasks(&conn, &ids)?;
            println!("Deleted {n} task(s)");
        }

        Command::Daemon { action } => {
            let pid_file = paths::pid_file(&data_dir);
            match action {
                DaemonAction::Start { interval } => {
                    let mut config = Config::load_from(&paths::config_file(&data_dir))?.daemon;
                    if let Some(minutes) = interval {
                        config.interval_minutes = minutes;
                        config.validate().context("--interval")?;
                    }
                    let notifier = CommandNotifier::new(config.notifier);
                    Daemon::new(pid_file, db_path, config).start(Box::new(notifier))?;
                }
                // Stop and status read only the pid file, never the config.
                DaemonAction::Stop => {
                    let daemon = Daemon::new(pid_file, db_path, DaemonConfig::default());
                    if daemon.stop()? {
                        println!("Daemon stopped");
                    } else {
                        println!("Daemon is not running");
                    }
                }
                DaemonAction::Status => {
                    match Daemon::new(pid_file, db_path, DaemonConfig::default()).status() {
                        Some(pid) => println!("Daemon is running (pid {pid})"),
                        None => println!("Daemon is not running"),
                    }
                }
            }
        }
    }

    Ok(())
}
