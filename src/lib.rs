//! Nagios/Sensu compatible checks for OpenStack clouds.
//!
//! Every binary in `src/bin` is one check: it parses its flags, talks to one
//! OpenStack service (or the local machine), and prints a single line
//! `<SEVERITY>: <message>[|<perfdata> ...]` before exiting with the matching
//! Nagios exit code. The interesting probe logic lives in library functions
//! that return a [`Report`] instead of exiting, so it can be tested without
//! spawning a process.
//!
//! See the [`scripts`] module for a description of each check.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::str::FromStr;

pub mod args;
pub mod auth;
pub mod lifecycle;
pub mod pacemaker;
pub mod procfs;
pub mod scripts;
pub mod services;

/// A Nagios service status.
///
/// Statuses are ordered by severity so that several partial results can be
/// merged with `max()`: `Unknown < Ok < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// The exit code nagios expects for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    /// Exit the process with the matching exit code.
    pub fn exit(self) -> ! {
        process::exit(self.exit_code())
    }

    /// The values accepted by [`Status::from_str`], for CLI help text.
    pub fn str_values() -> [&'static str; 4] {
        ["ok", "warning", "critical", "unknown"]
    }

    fn severity(self) -> u8 {
        match self {
            Status::Unknown => 0,
            Status::Ok => 1,
            Status::Warning => 2,
            Status::Critical => 3,
        }
    }
}

impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Status) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Status) -> std::cmp::Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Status, String> {
        match s {
            "ok" => Ok(Status::Ok),
            "warn" | "warning" => Ok(Status::Warning),
            "critical" => Ok(Status::Critical),
            "unknown" => Ok(Status::Unknown),
            _ => Err(format!("unexpected status: {}", s)),
        }
    }
}

/// One `label=value[;warn;crit;min;max]` performance datum.
#[derive(Debug, Clone, PartialEq)]
pub struct PerfData {
    label: String,
    value: String,
    warn: Option<String>,
    crit: Option<String>,
    min: Option<String>,
    max: Option<String>,
}

impl PerfData {
    pub fn new(label: impl Into<String>, value: impl fmt::Display) -> PerfData {
        PerfData {
            label: label.into(),
            value: value.to_string(),
            warn: None,
            crit: None,
            min: None,
            max: None,
        }
    }

    pub fn warn(mut self, warn: impl fmt::Display) -> PerfData {
        self.warn = Some(warn.to_string());
        self
    }

    pub fn crit(mut self, crit: impl fmt::Display) -> PerfData {
        self.crit = Some(crit.to_string());
        self
    }

    pub fn min(mut self, min: impl fmt::Display) -> PerfData {
        self.min = Some(min.to_string());
        self
    }

    pub fn max(mut self, max: impl fmt::Display) -> PerfData {
        self.max = Some(max.to_string());
        self
    }
}

impl fmt::Display for PerfData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.label, self.value)?;
        let tail = [&self.warn, &self.crit, &self.min, &self.max];
        if let Some(last) = tail.iter().rposition(|part| part.is_some()) {
            for part in &tail[..=last] {
                write!(f, ";{}", part.as_deref().unwrap_or(""))?;
            }
        }
        Ok(())
    }
}

/// The outcome of one probe: a status, a message and optional perfdata.
///
/// Probes return this up the call stack instead of exiting; the `main` of
/// each check turns it into the one-line stdout contract via
/// [`Report::print_and_exit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    status: Status,
    message: String,
    perfdata: Vec<PerfData>,
}

impl Report {
    pub fn new(status: Status, message: impl Into<String>) -> Report {
        Report {
            status,
            message: message.into(),
            perfdata: Vec::new(),
        }
    }

    pub fn ok(message: impl Into<String>) -> Report {
        Report::new(Status::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> Report {
        Report::new(Status::Warning, message)
    }

    pub fn critical(message: impl Into<String>) -> Report {
        Report::new(Status::Critical, message)
    }

    pub fn unknown(message: impl Into<String>) -> Report {
        Report::new(Status::Unknown, message)
    }

    pub fn with_perf(mut self, datum: PerfData) -> Report {
        self.perfdata.push(datum);
        self
    }

    pub fn extend_perf(mut self, data: impl IntoIterator<Item = PerfData>) -> Report {
        self.perfdata.extend(data);
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Render the single stdout line for this report.
    pub fn to_line(&self) -> String {
        let mut line = format!("{}: {}", self.status, self.message);
        if !self.perfdata.is_empty() {
            line.push('|');
            let rendered: Vec<String> = self.perfdata.iter().map(|d| d.to_string()).collect();
            line.push_str(&rendered.join(" "));
        }
        line
    }

    pub fn print_and_exit(&self) -> ! {
        println!("{}", self.to_line());
        self.status.exit()
    }
}

/// Run a probe to completion, no matter what.
///
/// Errors returned by the probe and panics raised anywhere below it both
/// become a CRITICAL report, so a check process always exits with one of the
/// four Nagios codes.
pub fn safe_run<F, E>(probe: F) -> !
where
    F: FnOnce() -> Result<Report, E>,
    E: fmt::Display,
{
    let report = match panic::catch_unwind(AssertUnwindSafe(probe)) {
        Ok(Ok(report)) => report,
        Ok(Err(err)) => Report::critical(err.to_string()),
        Err(payload) => Report::critical(format!("check panicked: {}", panic_text(&*payload))),
    };
    report.print_and_exit()
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Turn a measured API call latency into a report.
///
/// `action` is the short description used in the too-slow messages ("Get
/// flavors"), `ok_message` is printed verbatim when both thresholds hold.
/// All three outcomes carry `response_time` perfdata.
pub fn evaluate_latency(
    elapsed: u64,
    warning: u64,
    critical: u64,
    action: &str,
    ok_message: String,
) -> Report {
    let perf = PerfData::new("response_time", elapsed);
    if elapsed > critical {
        Report::critical(format!(
            "{} took more than {} seconds, it's too long.",
            action, critical
        ))
        .with_perf(perf)
    } else if elapsed > warning {
        Report::warning(format!(
            "{} took more than {} seconds, it's too long.",
            action, warning
        ))
        .with_perf(perf)
    } else {
        Report::ok(ok_message).with_perf(perf)
    }
}
