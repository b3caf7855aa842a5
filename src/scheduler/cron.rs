//! Cron expressions and the cron scheduler
//!
//! Expressions have five whitespace-separated fields:
//!
//! ```text
//! minute  hour  day-of-month  month  day-of-week
//! 0-59    0-23  1-31          1-12   0-6 (0 = Sunday, 7 also Sunday)
//! ```
//!
//! Each field is `*`, a number, a range `a-b`, a step `*/n`, or a comma
//! list of those. A minute matches when all five fields match.

use super::{ScheduleEvent, SchedulerContext};
use crate::error::{CronError, Result};
use crate::storage::CronRecord;
use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How far ahead the next-run search looks, in minutes (one year)
pub const SEARCH_HORIZON_MINUTES: u32 = 525_600;

/// A parsed five-field cron expression
///
/// Every field is kept as a bit set of the values it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { name: "minute", min: 0, max: 59 },
    FieldSpec { name: "hour", min: 0, max: 23 },
    FieldSpec { name: "day-of-month", min: 1, max: 31 },
    FieldSpec { name: "month", min: 1, max: 12 },
    FieldSpec { name: "day-of-week", min: 0, max: 7 },
];

impl CronExpression {
    /// Parse an expression
    ///
    /// # Errors
    ///
    /// Returns [`CronError::FieldCount`] when there are not exactly five
    /// fields and [`CronError::InvalidField`] for any malformed or out of
    /// range field.
    ///
    /// # Examples
    ///
    /// ```
    /// use repeater::scheduler::CronExpression;
    ///
    /// assert!(CronExpression::parse("*/15 9-17 * * 1-5").is_ok());
    /// assert!(CronExpression::parse("60 * * * *").is_err());
    /// ```
    pub fn parse(expression: &str) -> std::result::Result<Self, CronError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != FIELDS.len() {
            return Err(CronError::FieldCount(parts.len()));
        }

        let mut sets = [0u64; 5];
        for (i, (part, spec)) in parts.iter().zip(FIELDS.iter()).enumerate() {
            sets[i] = parse_field(part, spec)?;
        }

        // 7 is an alias for Sunday
        let mut days_of_week = sets[4];
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: parts.join(" "),
            minutes: sets[0],
            hours: sets[1],
            days_of_month: sets[2],
            months: sets[3],
            days_of_week,
        })
    }

    /// The expression as written, with whitespace normalized
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the minute containing `t` matches
    pub fn matches<Tz: TimeZone>(&self, t: &DateTime<Tz>) -> bool {
        bit(self.minutes, t.minute())
            && bit(self.hours, t.hour())
            && bit(self.days_of_month, t.day())
            && bit(self.months, t.month())
            && bit(self.days_of_week, t.weekday().num_days_from_sunday())
    }

    /// First matching minute strictly after `from`
    ///
    /// Scans minute by minute from the next whole minute, up to
    /// [`SEARCH_HORIZON_MINUTES`]. Returns `None` if nothing matches.
    pub fn next_run_after<Tz: TimeZone>(&self, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        // Instant arithmetic; re-resolving a local time fails inside a
        // repeated DST hour.
        let floor = from.clone()
            - Duration::seconds(i64::from(from.second()))
            - Duration::nanoseconds(i64::from(from.nanosecond()));
        let mut candidate = floor + Duration::minutes(1);
        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate = candidate + Duration::minutes(1);
        }
        None
    }
}

fn bit(set: u64, value: u32) -> bool {
    set & (1u64 << value) != 0
}

fn parse_field(text: &str, spec: &FieldSpec) -> std::result::Result<u64, CronError> {
    let invalid = || CronError::InvalidField {
        field: spec.name,
        value: text.to_string(),
    };
    let number = |s: &str| -> std::result::Result<u32, CronError> {
        let n: u32 = s.parse().map_err(|_| invalid())?;
        if n < spec.min || n > spec.max {
            return Err(invalid());
        }
        Ok(n)
    };
    let span = |from: u32, to: u32, step: u32| -> u64 {
        (from..=to)
            .step_by(step as usize)
            .fold(0u64, |set, v| set | (1u64 << v))
    };

    let mut set = 0u64;
    for item in text.split(',') {
        set |= if item == "*" {
            span(spec.min, spec.max, 1)
        } else if let Some(step) = item.strip_prefix("*/") {
            let step: u32 = step.parse().map_err(|_| invalid())?;
            if step == 0 {
                return Err(invalid());
            }
            span(spec.min, spec.max, step)
        } else if let Some((from, to)) = item.split_once('-') {
            let (from, to) = (number(from)?, number(to)?);
            if from > to {
                return Err(invalid());
            }
            span(from, to, 1)
        } else {
            1u64 << number(item)?
        };
    }
    Ok(set)
}

/// Next run of `expression` after `from`
///
/// # Errors
///
/// Returns the parse error for a malformed expression, or
/// [`CronError::NoNextRun`] when it never fires within a year.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use repeater::scheduler::cron::get_next_run;
///
/// let from = Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap();
/// let next = get_next_run("0 * * * *", &from).unwrap();
/// assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
/// ```
pub fn get_next_run<Tz: TimeZone>(
    expression: &str,
    from: &DateTime<Tz>,
) -> std::result::Result<DateTime<Tz>, CronError> {
    CronExpression::parse(expression)?
        .next_run_after(from)
        .ok_or_else(|| CronError::NoNextRun(expression.to_string()))
}

/// Externally visible state of one cron schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronStatus {
    pub expression: String,
    /// Next firing, epoch milliseconds
    pub next_run: Option<i64>,
}

struct CronEntry {
    expression: CronExpression,
    next_run: DateTime<Local>,
    generation: u64,
    handle: JoinHandle<()>,
}

/// Runs saved requests on cron schedules
///
/// Each schedule is one task that sleeps until its `next_run`, fires the
/// execution as a detached task, then computes the following run and
/// sleeps again.
pub struct CronScheduler {
    ctx: SchedulerContext,
    entries: Arc<Mutex<HashMap<String, CronEntry>>>,
    generation: AtomicU64,
}

impl CronScheduler {
    pub(crate) fn new(ctx: SchedulerContext) -> Self {
        Self {
            ctx,
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Schedule `request_id` on `expression`, replacing any prior schedule
    ///
    /// Returns `Ok(false)` and schedules nothing when the expression is
    /// invalid or never fires.
    ///
    /// # Errors
    ///
    /// Returns an error only if the schedule could not be persisted.
    pub async fn start(&self, request_id: &str, expression: &str) -> Result<bool> {
        let Some((parsed, next_run)) = first_deadline(request_id, expression) else {
            return Ok(false);
        };
        let mut entries = self.entries.lock().await;
        self.arm(&mut entries, request_id, parsed, next_run);
        self.persist_and_notify(&entries).await?;
        Ok(true)
    }

    /// Cancel the schedule of `request_id`
    ///
    /// Returns `Ok(false)` when no schedule was running. An in-flight
    /// execution is left to finish.
    pub async fn stop(&self, request_id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.remove(request_id) else {
            return Ok(false);
        };
        entry.handle.abort();
        info!(request_id = %request_id, "Cron stopped");
        self.persist_and_notify(&entries).await?;
        Ok(true)
    }

    pub async fn is_running(&self, request_id: &str) -> bool {
        self.entries.lock().await.contains_key(request_id)
    }

    /// Expression and next run of every live schedule
    pub async fn get_all(&self) -> BTreeMap<String, CronStatus> {
        snapshot(&*self.entries.lock().await)
    }

    /// Re-arm every persisted schedule whose request still exists
    ///
    /// Schedules of deleted requests, and expressions that no longer
    /// parse, are pruned. The persisted map is written once, after every
    /// schedule has been re-armed.
    pub async fn restore(&self) -> Result<usize> {
        let persisted = self.ctx.store.get_crons().await?;
        let mut entries = self.entries.lock().await;
        let mut restored = 0;
        for (request_id, record) in &persisted {
            if self.ctx.store.get_request(request_id).await?.is_none() {
                debug!(request_id = %request_id, "Dropping cron of deleted request");
                continue;
            }
            let Some((parsed, next_run)) = first_deadline(request_id, &record.expression) else {
                continue;
            };
            self.arm(&mut entries, request_id, parsed, next_run);
            restored += 1;
        }
        self.persist_and_notify(&entries).await?;
        info!(restored, "Cron schedules restored");
        Ok(restored)
    }

    /// Cancel every live schedule without touching persisted state
    pub(crate) async fn shutdown(&self) {
        for (_, entry) in self.entries.lock().await.drain() {
            entry.handle.abort();
        }
    }

    fn arm(
        &self,
        entries: &mut HashMap<String, CronEntry>,
        request_id: &str,
        expression: CronExpression,
        next_run: DateTime<Local>,
    ) {
        if let Some(prior) = entries.remove(request_id) {
            prior.handle.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let handle = self.spawn_schedule(
            request_id.to_string(),
            expression.clone(),
            next_run,
            generation,
        );
        info!(
            request_id = %request_id,
            expression = %expression.as_str(),
            next_run = %next_run,
            "Cron started"
        );
        entries.insert(
            request_id.to_string(),
            CronEntry {
                expression,
                next_run,
                generation,
                handle,
            },
        );
    }

    fn spawn_schedule(
        &self,
        request_id: String,
        expression: CronExpression,
        first_run: DateTime<Local>,
        generation: u64,
    ) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let entries = self.entries.clone();
        tokio::spawn(async move {
            let mut deadline = first_run;
            loop {
                let wait = (deadline - Local::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                debug!(request_id = %request_id, "Cron fired");
                let exec = ctx.executor.clone();
                let id = request_id.clone();
                tokio::spawn(async move {
                    exec.execute(&id).await;
                });

                let base = std::cmp::max(Local::now(), deadline);
                let Some(next) = expression.next_run_after(&base) else {
                    warn!(request_id = %request_id, "Cron has no further run");
                    retire(&ctx, &entries, &request_id, generation).await;
                    break;
                };
                deadline = next;
                if let Some(entry) = entries.lock().await.get_mut(&request_id) {
                    if entry.generation == generation {
                        entry.next_run = next;
                    }
                }
            }
        })
    }

    async fn persist_and_notify(&self, entries: &HashMap<String, CronEntry>) -> Result<()> {
        persist_and_notify(&self.ctx, entries).await
    }
}

/// Parse `expression` and find its first run from now, logging why not
fn first_deadline(
    request_id: &str,
    expression: &str,
) -> Option<(CronExpression, DateTime<Local>)> {
    let parsed = match CronExpression::parse(expression) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "InvalidCronExpression");
            return None;
        }
    };
    let Some(next_run) = parsed.next_run_after(&Local::now()) else {
        let e = CronError::NoNextRun(expression.to_string());
        warn!(request_id = %request_id, error = %e, "InvalidCronExpression");
        return None;
    };
    Some((parsed, next_run))
}

/// Drop a schedule that can no longer fire
///
/// Only the generation that armed the task is removed, so a schedule
/// restarted in the meantime is left alone.
async fn retire(
    ctx: &SchedulerContext,
    entries: &Mutex<HashMap<String, CronEntry>>,
    request_id: &str,
    generation: u64,
) {
    let mut entries = entries.lock().await;
    if entries.get(request_id).map(|e| e.generation) != Some(generation) {
        return;
    }
    entries.remove(request_id);
    if let Err(e) = persist_and_notify(ctx, &entries).await {
        warn!(request_id = %request_id, error = %e, "Failed to persist retired cron");
    }
}

async fn persist_and_notify(
    ctx: &SchedulerContext,
    entries: &HashMap<String, CronEntry>,
) -> Result<()> {
    ctx.store.save_crons(&records(entries)).await?;
    let _ = ctx.events.send(ScheduleEvent::CronsUpdated {
        crons: snapshot(entries),
    });
    Ok(())
}

fn records(entries: &HashMap<String, CronEntry>) -> BTreeMap<String, CronRecord> {
    entries
        .iter()
        .map(|(id, entry)| {
            (
                id.clone(),
                CronRecord {
                    expression: entry.expression.as_str().to_string(),
                },
            )
        })
        .collect()
}

fn snapshot(entries: &HashMap<String, CronEntry>) -> BTreeMap<String, CronStatus> {
    entries
        .iter()
        .map(|(id, entry)| {
            (
                id.clone(),
                CronStatus {
                    expression: entry.expression.as_str().to_string(),
                    next_run: Some(entry.next_run.timestamp_millis()),
                },
            )
        })
        .collect()
}
