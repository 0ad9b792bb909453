//! Periodic autosave timer

use botbrain_core::{BrainError, BrainResult};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::brain::Brain;

/// The running save timer. Dropping it stops the timer.
pub struct SaveTimer {
    task: JoinHandle<()>,
    period: Duration,
}

impl SaveTimer {
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for SaveTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Brain {
    /// Toggle whether timer ticks save. The timer keeps running either way.
    pub fn set_auto_save(&self, enabled: bool) {
        self.auto_save.store(enabled, Ordering::SeqCst);
        debug!("Autosave {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save.load(Ordering::SeqCst)
    }

    /// Replace the save timer with one firing every `seconds`.
    ///
    /// The first tick comes one full period from now. Must be called from
    /// within a tokio runtime.
    pub fn reset_save_interval(self: &Arc<Self>, seconds: u64) -> BrainResult<()> {
        if seconds == 0 {
            return Err(BrainError::InvalidInterval(seconds));
        }
        let handle = Handle::try_current().map_err(|_| BrainError::NoRuntime)?;
        let period = Duration::from_secs(seconds);

        let mut slot = self.save_timer.lock();
        // Old timer stops before the new one starts
        drop(slot.take());

        let brain = Arc::downgrade(self);
        let task = handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match brain.upgrade() {
                    Some(brain) => brain.autosave_tick(),
                    None => break,
                }
            }
        });

        *slot = Some(SaveTimer { task, period });
        info!("Autosave interval set to {}s", seconds);
        Ok(())
    }

    /// Stop the save timer if one is running
    pub fn cancel_save_interval(&self) {
        if self.save_timer.lock().take().is_some() {
            debug!("Autosave timer cancelled");
        }
    }

    pub fn has_save_timer(&self) -> bool {
        self.save_timer.lock().is_some()
    }

    /// Period of the active save timer
    pub fn save_interval(&self) -> Option<Duration> {
        self.save_timer.lock().as_ref().map(SaveTimer::period)
    }

    fn autosave_tick(&self) {
        let _lifecycle = self.lifecycle.lock();
        if self.is_closed() {
            return;
        }
        if self.auto_save() {
            debug!("Autosave tick");
            self.save();
        }
    }
}
