//! Fixed-interval timers

use super::{ScheduleEvent, SchedulerContext};
use crate::error::Result;
use crate::storage::TimerRecord;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

struct TimerEntry {
    interval: u64,
    handle: JoinHandle<()>,
}

/// Runs saved requests every N seconds
pub struct TimerScheduler {
    ctx: SchedulerContext,
    entries: Mutex<HashMap<String, TimerEntry>>,
}

impl TimerScheduler {
    pub(crate) fn new(ctx: SchedulerContext) -> Self {
        Self {
            ctx,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Run `request_id` every `interval` seconds, replacing any prior timer
    ///
    /// Unless `is_restore` is set the request also runs once right away.
    /// Returns `Ok(false)` for a zero interval.
    ///
    /// # Errors
    ///
    /// Returns an error only if the timer map could not be persisted.
    pub async fn start(&self, request_id: &str, interval: u64, is_restore: bool) -> Result<bool> {
        if interval < 1 {
            debug!(request_id = %request_id, interval, "Rejected timer interval");
            return Ok(false);
        }

        let mut entries = self.entries.lock().await;
        self.arm(&mut entries, request_id, interval, is_restore);
        self.persist_and_notify(&entries).await?;
        Ok(true)
    }

    /// Cancel the timer of `request_id`
    ///
    /// Returns `Ok(false)` when no timer was running. An in-flight
    /// execution is left to finish.
    pub async fn stop(&self, request_id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.remove(request_id) else {
            return Ok(false);
        };
        entry.handle.abort();
        info!(request_id = %request_id, "Timer stopped");
        self.persist_and_notify(&entries).await?;
        Ok(true)
    }

    pub async fn is_running(&self, request_id: &str) -> bool {
        self.entries.lock().await.contains_key(request_id)
    }

    /// Interval of every running timer
    pub async fn get_all(&self) -> BTreeMap<String, TimerRecord> {
        records(&*self.entries.lock().await)
    }

    /// Restart every persisted timer whose request still exists
    ///
    /// Restored timers wait a full interval before their first run. The
    /// persisted map is written once, after every timer has been re-armed.
    pub async fn restore(&self) -> Result<usize> {
        let persisted = self.ctx.store.get_timers().await?;
        let mut entries = self.entries.lock().await;
        let mut restored = 0;
        for (request_id, record) in &persisted {
            if record.interval < 1 {
                debug!(request_id = %request_id, "Dropping timer with zero interval");
                continue;
            }
            if self.ctx.store.get_request(request_id).await?.is_none() {
                debug!(request_id = %request_id, "Dropping timer of deleted request");
                continue;
            }
            self.arm(&mut entries, request_id, record.interval, true);
            restored += 1;
        }
        self.persist_and_notify(&entries).await?;
        info!(restored, "Timers restored");
        Ok(restored)
    }

    /// Cancel every live timer without touching persisted state
    pub(crate) async fn shutdown(&self) {
        for (_, entry) in self.entries.lock().await.drain() {
            entry.handle.abort();
        }
    }

    fn arm(
        &self,
        entries: &mut HashMap<String, TimerEntry>,
        request_id: &str,
        interval: u64,
        is_restore: bool,
    ) {
        if let Some(prior) = entries.remove(request_id) {
            prior.handle.abort();
        }

        if !is_restore {
            self.fire(request_id);
        }

        let period = Duration::from_secs(interval);
        let executor = self.ctx.executor.clone();
        let id = request_id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!(request_id = %id, "Timer fired");
                let exec = executor.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    exec.execute(&id).await;
                });
            }
        });

        entries.insert(request_id.to_string(), TimerEntry { interval, handle });
        info!(request_id = %request_id, interval, is_restore, "Timer started");
    }

    fn fire(&self, request_id: &str) {
        let executor = self.ctx.executor.clone();
        let id = request_id.to_string();
        tokio::spawn(async move {
            executor.execute(&id).await;
        });
    }

    async fn persist_and_notify(&self, entries: &HashMap<String, TimerEntry>) -> Result<()> {
        let timers = records(entries);
        self.ctx.store.save_timers(&timers).await?;
        let _ = self.ctx.events.send(ScheduleEvent::TimersUpdated { timers });
        Ok(())
    }
}

fn records(entries: &HashMap<String, TimerEntry>) -> BTreeMap<String, TimerRecord> {
    entries
        .iter()
        .map(|(id, entry)| {
            (
                id.clone(),
                TimerRecord {
                    interval: entry.interval,
                },
            )
        })
        .collect()
}
