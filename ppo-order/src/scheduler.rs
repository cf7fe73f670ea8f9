//! Daily triggers for the reminder and auto-charge jobs.
//!
//! Each job runs in its own task, sleeps until its next UTC fire time and runs under a
//! deadline. A run that overruns is dropped, which cancels its in-flight gateway calls.

use chrono::{DateTime, Days, NaiveTime, Utc};
use ppo_core::CoreResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collection::CollectionService;

#[derive(Debug, thiserror::Error)]
#[error("invalid trigger time {0:?}, expected HH:MM")]
pub struct InvalidTriggerTime(pub String);

/// A wall-clock time of day in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger(NaiveTime);

impl DailyTrigger {
    pub fn at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn parse(s: &str) -> Result<Self, InvalidTriggerTime> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| InvalidTriggerTime(s.to_string()))
    }

    /// Later today if the time has not been reached yet, otherwise tomorrow.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.0).and_utc();
        if today > now {
            today
        } else {
            today.checked_add_days(Days::new(1)).unwrap_or(today)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JobSchedule {
    pub trigger: DailyTrigger,
    pub deadline: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Reminders,
    AutoCharge,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Job::Reminders => "installment_reminders",
            Job::AutoCharge => "overdue_auto_charge",
        }
    }
}

pub struct Scheduler {
    collection: Arc<CollectionService>,
    reminders: JobSchedule,
    auto_charge: JobSchedule,
}

impl Scheduler {
    pub fn new(collection: Arc<CollectionService>, reminders: JobSchedule, auto_charge: JobSchedule) -> Self {
        Self {
            collection,
            reminders,
            auto_charge,
        }
    }

    /// Start both job loops. They exit once `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let this = Arc::new(self);
        [
            (Job::Reminders, this.reminders),
            (Job::AutoCharge, this.auto_charge),
        ]
        .into_iter()
        .map(|(job, schedule)| {
            let this = Arc::clone(&this);
            let cancel = cancel.clone();
            tokio::spawn(async move { this.job_loop(job, schedule, cancel).await })
        })
        .collect()
    }

    async fn job_loop(&self, job: Job, schedule: JobSchedule, cancel: CancellationToken) {
        loop {
            let now = Utc::now();
            let next = schedule.trigger.next_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(job = job.name(), next_run = %next, "Job scheduled");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(job = job.name(), "Shutdown during job run, abandoning it");
                    break;
                }
                _ = self.fire(job, schedule.deadline) => {}
            }
        }
        info!(job = job.name(), "Job loop stopped");
    }

    async fn fire(&self, job: Job, deadline: Duration) {
        match job {
            Job::Reminders => {
                if let Some(summary) = run_with_deadline(job.name(), deadline, self.collection.send_reminders()).await {
                    info!(job = job.name(), reminders = summary.reminders, "Job finished");
                }
            }
            Job::AutoCharge => {
                if let Some(summary) = run_with_deadline(job.name(), deadline, self.collection.collect_overdue()).await {
                    info!(
                        job = job.name(),
                        charged = summary.charged,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "Job finished"
                    );
                }
            }
        }
    }
}

/// Run one job to completion or until `deadline`. Failures and overruns are logged and
/// yield `None`.
pub async fn run_with_deadline<T, F>(job: &'static str, deadline: Duration, run: F) -> Option<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(deadline, run).await {
        Ok(Ok(summary)) => Some(summary),
        Ok(Err(e)) => {
            error!(job, error = %e, "Job failed");
            None
        }
        Err(_) => {
            warn!(job, deadline_secs = deadline.as_secs(), "Job exceeded its deadline and was cut off");
            None
        }
    }
}
