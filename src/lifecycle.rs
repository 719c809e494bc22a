//! The create/poll/delete driver shared by the volume, instance and
//! floating-ip checks.
//!
//! One run walks a disposable resource through
//! `check existing -> create -> wait ready -> delete -> wait gone -> report`.
//! Failures never abort the process: each step appends to an error list and
//! later steps guard themselves on it, so a run always ends in a single
//! report. Any accumulated error makes the report CRITICAL with all messages
//! joined; otherwise the report is OK with the elapsed wall-clock time.

use std::fmt;
use std::thread::sleep;
use std::time::Duration;

use chrono::Utc;
use itertools::Itertools;

use crate::services::ApiError;
use crate::{PerfData, Report};

/// Failure of one lifecycle step, already worded for the final report.
#[derive(Debug, Clone, PartialEq)]
pub struct StepError(pub String);

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ApiError> for StepError {
    fn from(err: ApiError) -> StepError {
        StepError(err.to_string())
    }
}

/// A pre-existing resource that matched the check's name or pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Existing {
    pub id: String,
    pub label: String,
}

/// What purging one pre-existing resource produced. Both lists end up in
/// the final report.
#[derive(Debug, Default)]
pub struct PurgeResult {
    pub errors: Vec<String>,
    pub perfdata: Vec<PerfData>,
}

/// The capabilities a resource kind must provide to be driven through the
/// lifecycle.
///
/// `create`, `list_existing` and `purge_existing` word their own error
/// messages (they know the resource attributes involved); the driver adds
/// the step context for `status` and `delete` failures.
pub trait Disposable {
    /// Human name used in messages, e.g. "volume".
    fn kind(&self) -> &'static str;

    /// Key for the `<key>_creation_time` notification, e.g. "volume".
    fn stamp_key(&self) -> &'static str;

    /// The status value meaning "fully provisioned", or `None` for kinds
    /// that are usable immediately and skip both wait phases.
    fn ready_sentinel(&self) -> Option<&'static str>;

    fn list_existing(&mut self) -> Result<Vec<Existing>, StepError>;

    /// Fire-and-forget removal of one pre-existing match.
    fn purge_existing(&mut self, item: &Existing) -> PurgeResult;

    /// Create the test resource, returning its provider-assigned id.
    fn create(&mut self) -> Result<String, StepError>;

    /// Current status of the resource, `Ok(None)` once it is gone.
    fn status(&mut self, handle: &str) -> Result<Option<String>, StepError>;

    fn delete(&mut self, handle: &str) -> Result<(), StepError>;

    /// An extra notification to record right after a successful create.
    fn created_note(&self, _handle: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Delete matching pre-existing resources instead of aborting.
    pub force_delete: bool,
    /// Upper bound, in whole seconds, for each wait phase.
    pub timeout: u64,
    /// Pause between two polls. One second in production; tests use zero.
    pub poll_interval: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> LifecycleOptions {
        LifecycleOptions {
            force_delete: false,
            timeout: 120,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Drive `target` through the whole lifecycle and produce the final report.
pub fn run(target: &mut dyn Disposable, opts: &LifecycleOptions) -> Report {
    let mut state = RunState::start(target.stamp_key());
    state.check_existing(target, opts);
    state.create(target);
    state.wait_ready(target, opts);
    state.delete(target);
    state.wait_gone(target, opts);
    state.report(target.kind())
}

struct RunState {
    msgs: Vec<String>,
    notifications: Vec<String>,
    perfdata: Vec<PerfData>,
    start: i64,
    handle: Option<String>,
}

impl RunState {
    fn start(stamp_key: &str) -> RunState {
        let start = Utc::now().timestamp();
        RunState {
            msgs: Vec::new(),
            notifications: vec![format!("{}_creation_time={}", stamp_key, start)],
            perfdata: Vec::new(),
            start,
            handle: None,
        }
    }

    fn check_existing(&mut self, target: &mut dyn Disposable, opts: &LifecycleOptions) {
        let found = match target.list_existing() {
            Ok(found) => found,
            Err(err) => {
                self.msgs.push(err.0);
                return;
            }
        };
        if found.is_empty() {
            return;
        }
        let labels = found.iter().map(|item| item.label.as_str()).join(", ");
        if opts.force_delete {
            for item in &found {
                let purged = target.purge_existing(item);
                self.msgs.extend(purged.errors);
                self.perfdata.extend(purged.perfdata);
            }
            self.notifications.push(format!(
                "Found {} existing {}(s): {}",
                found.len(),
                target.kind(),
                labels
            ));
        } else {
            self.msgs.push(format!(
                "Found {} existing {}(s): {}. Won't create a test {}. Please check and delete.",
                found.len(),
                target.kind(),
                labels,
                target.kind()
            ));
        }
    }

    fn create(&mut self, target: &mut dyn Disposable) {
        if !self.msgs.is_empty() {
            return;
        }
        match target.create() {
            Ok(handle) => {
                if let Some(note) = target.created_note(&handle) {
                    self.notifications.push(note);
                }
                self.handle = Some(handle);
            }
            Err(err) => self.msgs.push(err.0),
        }
    }

    fn wait_ready(&mut self, target: &mut dyn Disposable, opts: &LifecycleOptions) {
        if !self.msgs.is_empty() {
            return;
        }
        let sentinel = match target.ready_sentinel() {
            Some(sentinel) => sentinel,
            None => return,
        };
        let handle = match self.handle.clone() {
            Some(handle) => handle,
            None => return,
        };
        let mut timer = 0;
        loop {
            match target.status(&handle) {
                Ok(Some(ref status)) if status == sentinel => return,
                Ok(Some(_)) => {}
                Ok(None) => {
                    // vanished while we were waiting for it to come up
                    self.msgs.push(format!(
                        "Problem getting the status of the {}: not found",
                        target.kind()
                    ));
                    return;
                }
                Err(err) => {
                    self.msgs.push(format!(
                        "Problem getting the status of the {}: {}",
                        target.kind(),
                        err
                    ));
                    return;
                }
            }
            if timer >= opts.timeout {
                self.msgs.push(format!(
                    "The {} did not become {} within {} seconds",
                    target.kind(),
                    sentinel,
                    opts.timeout
                ));
                return;
            }
            sleep(opts.poll_interval);
            timer += 1;
        }
    }

    fn delete(&mut self, target: &mut dyn Disposable) {
        // Deletion is still attempted when the ready-wait failed, as long
        // as something was actually created.
        if !(self.msgs.is_empty() || self.handle.is_some()) {
            return;
        }
        // Nothing to delete when create never succeeded.
        let handle = match self.handle.clone() {
            Some(handle) => handle,
            None => return,
        };
        if let Err(err) = target.delete(&handle) {
            self.msgs
                .push(format!("Problem deleting the {}: {}", target.kind(), err));
        }
    }

    fn wait_gone(&mut self, target: &mut dyn Disposable, opts: &LifecycleOptions) {
        if !self.msgs.is_empty() {
            return;
        }
        if target.ready_sentinel().is_none() {
            return;
        }
        let handle = match self.handle.clone() {
            Some(handle) => handle,
            None => return,
        };
        let mut timer = 0;
        loop {
            if timer >= opts.timeout {
                self.msgs.push(format!(
                    "Could not delete the {} within {} seconds",
                    target.kind(),
                    timer
                ));
                return;
            }
            sleep(opts.poll_interval);
            timer += 1;
            match target.status(&handle) {
                Ok(None) => return,
                Ok(Some(_)) => {}
                Err(err) => {
                    self.msgs
                        .push(format!("Cannot delete the {} ({})", target.kind(), err));
                    return;
                }
            }
        }
    }

    fn report(self, kind: &str) -> Report {
        if !self.msgs.is_empty() {
            return Report::critical(self.msgs.iter().join(", "))
                .extend_perf(self.perfdata);
        }
        let duration = Utc::now().timestamp() - self.start;
        let mut message = format!(
            "{} created and deleted in {} seconds",
            capitalize(kind),
            duration
        );
        if !self.notifications.is_empty() {
            message.push_str(&format!(" ({})", self.notifications.iter().join(", ")));
        }
        Report::ok(message)
            .with_perf(PerfData::new("time", duration))
            .extend_perf(self.perfdata)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
