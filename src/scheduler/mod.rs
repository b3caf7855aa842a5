//! Recurring execution of saved requests
//!
//! [`SchedulerRegistry`] owns the two schedulers and the channel their
//! change notifications go out on. It is created once, injected into the
//! command dispatcher, restored from the store with
//! [`SchedulerRegistry::init`] and torn down with
//! [`SchedulerRegistry::shutdown`].
//!
//! Every firing runs its execution as a separate task, so stopping a
//! schedule prevents future runs but never cuts off one already underway.

use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::storage::{Store, TimerRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

pub mod cron;
pub mod timer;

pub use cron::{CronExpression, CronScheduler, CronStatus};
pub use timer::TimerScheduler;

const EVENT_CAPACITY: usize = 64;

/// Change notification sent after every start and stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleEvent {
    TimersUpdated {
        timers: BTreeMap<String, TimerRecord>,
    },
    CronsUpdated {
        crons: BTreeMap<String, CronStatus>,
    },
}

/// What both schedulers need to run and report
#[derive(Clone)]
pub(crate) struct SchedulerContext {
    pub(crate) executor: Arc<RequestExecutor>,
    pub(crate) store: Arc<Store>,
    pub(crate) events: broadcast::Sender<ScheduleEvent>,
}

/// Owner of the timer and cron schedulers
pub struct SchedulerRegistry {
    timers: TimerScheduler,
    crons: CronScheduler,
    events: broadcast::Sender<ScheduleEvent>,
}

impl SchedulerRegistry {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let ctx = SchedulerContext {
            store: executor.store().clone(),
            executor,
            events: events.clone(),
        };
        Self {
            timers: TimerScheduler::new(ctx.clone()),
            crons: CronScheduler::new(ctx),
            events,
        }
    }

    pub fn timers(&self) -> &TimerScheduler {
        &self.timers
    }

    pub fn crons(&self) -> &CronScheduler {
        &self.crons
    }

    /// Restore every persisted timer and cron schedule
    pub async fn init(&self) -> Result<()> {
        let timers = self.timers.restore().await?;
        let crons = self.crons.restore().await?;
        info!(timers, crons, "Schedulers initialized");
        Ok(())
    }

    /// Cancel all live schedules, leaving persisted state for the next
    /// [`init`](Self::init)
    pub async fn shutdown(&self) {
        self.timers.shutdown().await;
        self.crons.shutdown().await;
        info!("Schedulers shut down");
    }

    /// Receive change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.events.subscribe()
    }

    /// Stop any timer and cron schedule of `request_id`
    ///
    /// Both are cancelled even if persisting the first stop fails; the
    /// first error is returned afterwards.
    pub async fn stop_all_for(&self, request_id: &str) -> Result<()> {
        let timer = self.timers.stop(request_id).await;
        let cron = self.crons.stop(request_id).await;
        timer?;
        cron?;
        Ok(())
    }
}
