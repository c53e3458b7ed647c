use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{NaiveTime, Timelike};
use serde::Deserialize;

use crate::notify::NotifierKind;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DaemonConfig {
    /// Minutes between reminder ticks. Must divide an hour.
    pub interval_minutes: u32,
    /// Time of the morning summary, `HH:MM`.
    pub morning: String,
    /// Time of the evening summary, `HH:MM`.
    pub evening: String,
    pub notifier: NotifierKind,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            morning: "09:00".into(),
            evening: "17:00".into(),
            notifier: NotifierKind::default(),
        }
    }
}

impl DaemonConfig {
    pub fn morning_time(&self) -> Result<NaiveTime> {
        parse_clock(&self.morning)
    }

    pub fn evening_time(&self) -> Result<NaiveTime> {
        parse_clock(&self.evening)
    }

    /// Check the interval and that both summary times land on a tick.
    pub fn validate(&self) -> Result<()> {
        validate_interval(self.interval_minutes).context("daemon.interval_minutes")?;
        for (field, time) in [("morning", self.morning_time()), ("evening", self.evening_time())] {
            let time = time.with_context(|| format!("daemon.{field}"))?;
            if time.minute() % self.interval_minutes != 0 {
                bail!(
                    "daemon.{field}: {} does not fall on a {}-minute boundary",
                    time.format("%H:%M"),
                    self.interval_minutes
                );
            }
        }
        Ok(())
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").with_context(|| format!("invalid time '{s}': expected HH:MM"))
}

/// Ensure a tick interval lines up with the top of every hour.
pub fn validate_interval(minutes: u32) -> Result<()> {
    if minutes == 0 || minutes > 60 || 60 % minutes != 0 {
        bail!("interval of {minutes} minutes must divide 60");
    }
    Ok(())
}

impl Config {
    /// Load config from `path`. Returns default config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        self.daemon
            .validate()
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}
