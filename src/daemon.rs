//! Background reminder daemon.
//!
//! `Daemon` owns everything a daemon process needs: where its pid file and
//! database live, the reminder schedule, and the shared running flag. A
//! single scheduler thread wakes on wall-clock boundaries (every
//! `interval_minutes`, counted from midnight) and sends at most one
//! notification per tick.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use log::{error, info, warn};
use rusqlite::Connection;

use crate::config::DaemonConfig;
use crate::notify::Notifier;
use crate::{db, ops, output, paths};

/// Upper bound on how long the scheduler sleeps before rechecking the running flag.
const POLL: StdDuration = StdDuration::from_secs(1);

/// Read a pid from `path`. Missing, empty or garbled files yield `None`.
pub fn read_pid(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path)
        .ok()?
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
}

/// Probe `pid` with signal 0. EPERM still means the process exists.
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Holds the pid file for the lifetime of the daemon and removes it on drop.
struct PidGuard {
    path: PathBuf,
}

impl PidGuard {
    fn acquire(path: &Path) -> Result<Self> {
        paths::ensure_parent(path)?;
        std::fs::write(path, std::process::id().to_string())
            .with_context(|| format!("failed to write pid file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        if read_pid(&self.path) == Some(std::process::id() as i32) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// What a tick should report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reminder {
    /// Everything overdue and unfinished, under a greeting.
    Summary { title: &'static str },
    /// Tasks due before `until`.
    Upcoming { until: NaiveDateTime },
}

impl Reminder {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Summary { title } => title,
            Self::Upcoming { .. } => "Reminder!",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReminderSchedule {
    pub interval_minutes: u32,
    pub morning: NaiveTime,
    pub evening: NaiveTime,
}

impl ReminderSchedule {
    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            interval_minutes: config.interval_minutes,
            morning: config.morning_time()?,
            evening: config.evening_time()?,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    /// The first tick boundary strictly after `now`.
    pub fn next_tick(&self, now: NaiveDateTime) -> NaiveDateTime {
        let midnight = now.date().and_time(NaiveTime::default());
        let elapsed = (now - midnight).num_minutes();
        let step = i64::from(self.interval_minutes);
        midnight + Duration::minutes((elapsed / step + 1) * step)
    }

    pub fn plan(&self, at: NaiveDateTime) -> Reminder {
        let same_minute = |t: NaiveTime| at.hour() == t.hour() && at.minute() == t.minute();
        if same_minute(self.morning) {
            Reminder::Summary {
                title: "Good Morning!",
            }
        } else if same_minute(self.evening) {
            Reminder::Summary {
                title: "Good Evening!",
            }
        } else {
            Reminder::Upcoming {
                until: at + self.interval(),
            }
        }
    }
}

/// Run one tick at `at`: query what is due and notify if anything is.
/// Returns how many tasks were reported. Notification failures are logged,
/// store failures are returned.
pub fn run_tick(
    conn: &Connection,
    schedule: &ReminderSchedule,
    notifier: &dyn Notifier,
    at: NaiveDateTime,
) -> Result<usize> {
    let reminder = schedule.plan(at);
    let tasks = match &reminder {
        Reminder::Summary { .. } => ops::overdue_tasks(conn, at)?,
        Reminder::Upcoming { until } => ops::tasks_due_between(conn, at, *until)?,
    };
    if tasks.is_empty() {
        return Ok(0);
    }

    let title = reminder.title();
    info!("{title} {} task(s)", tasks.len());
    if let Err(e) = notifier.notify(title, &output::format_reminder(&tasks)) {
        warn!("{e}");
    }
    Ok(tasks.len())
}

struct Scheduler {
    conn: Connection,
    schedule: ReminderSchedule,
    notifier: Box<dyn Notifier>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    fn run(self) {
        let mut next = self.schedule.next_tick(local_now());
        info!("First tick at {next}");

        while self.running.load(Ordering::SeqCst) {
            let now = local_now();
            if now < next {
                let wait = (next - now).to_std().unwrap_or(POLL).min(POLL);
                std::thread::sleep(wait);
                continue;
            }

            if let Err(e) = run_tick(&self.conn, &self.schedule, self.notifier.as_ref(), next) {
                error!("Tick at {next} failed: {e:#}");
            }
            next = self.schedule.next_tick(now.max(next));
        }
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct Daemon {
    pid_file: PathBuf,
    db_path: String,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
}

impl Daemon {
    pub fn new(pid_file: PathBuf, db_path: String, config: DaemonConfig) -> Self {
        Self {
            pid_file,
            db_path,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Pid of the running daemon, if there is one.
    pub fn status(&self) -> Option<i32> {
        read_pid(&self.pid_file).filter(|&pid| process_alive(pid))
    }

    /// Run the daemon in the foreground until SIGINT/SIGTERM.
    pub fn start(&self, notifier: Box<dyn Notifier>) -> Result<()> {
        if let Some(pid) = self.status() {
            bail!("daemon is already running (pid {pid})");
        }
        let schedule = ReminderSchedule::from_config(&self.config)?;
        paths::ensure_parent(Path::new(&self.db_path))?;
        let conn = db::open(&self.db_path)?;
        db::init(&conn)?;

        let _pid = PidGuard::acquire(&self.pid_file)?;
        info!(
            "Starting (pid={}, interval={}m, db={})",
            std::process::id(),
            schedule.interval_minutes,
            self.db_path
        );

        let running = self.running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .context("failed to set signal handler")?;

        let scheduler = Scheduler {
            conn,
            schedule,
            notifier,
            running: self.running.clone(),
        };
        let handle = std::thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || scheduler.run())
            .context("failed to spawn scheduler thread")?;
        handle
            .join()
            .map_err(|_| anyhow!("scheduler thread panicked"))?;

        info!("Stopped");
        Ok(())
    }

    /// Send SIGTERM to the recorded daemon. Returns false when none is running;
    /// a stale pid file is removed in that case.
    pub fn stop(&self) -> Result<bool> {
        let Some(pid) = self.status() else {
            if self.pid_file.exists() {
                std::fs::remove_file(&self.pid_file).with_context(|| {
                    format!("failed to remove stale pid file {}", self.pid_file.display())
                })?;
            }
            return Ok(false);
        };
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("failed to signal daemon (pid {pid})"));
        }
        Ok(true)
    }
}
