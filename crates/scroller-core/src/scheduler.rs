//! Scroll scheduler
//!
//! A fixed-period timer checks how much page is left below the viewport and
//! starts a [`FetchCycle`] once that distance drops under the trigger height.
//! Ticks keep coming while a fetch is in flight; the in-flight flag, not the
//! timer, keeps fetches from overlapping.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::fetch::FetchCycle;
use crate::viewport::ViewportMetrics;

/// Scheduler lifecycle; `Stopped` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Armed,
    Stopped,
}

/// True when the unscrolled remainder is below the trigger height
pub fn should_trigger(remaining_distance: i64, trigger_height: u32) -> bool {
    remaining_distance < i64::from(trigger_height)
}

/// Drives fetch cycles from viewport checks
pub struct ScrollScheduler {
    cycle: FetchCycle,
    viewport: Arc<dyn ViewportMetrics>,
    tracker: TaskTracker,
}

impl ScrollScheduler {
    pub fn new(cycle: FetchCycle, viewport: Arc<dyn ViewportMetrics>) -> Self {
        Self {
            cycle,
            viewport,
            tracker: TaskTracker::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.cycle.stop.is_cancelled() {
            SchedulerState::Stopped
        } else {
            SchedulerState::Armed
        }
    }

    /// Tracks fetch tasks started by this scheduler
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// One eligibility check; returns true when a fetch was started
    ///
    /// Must be called from within a Tokio runtime.
    pub fn tick(&self) -> bool {
        if self.state() == SchedulerState::Stopped || self.cycle.is_in_flight() {
            return false;
        }

        let remaining = self.viewport.remaining_distance();
        let trigger_height = self.cycle.config.trigger_height;
        if !should_trigger(remaining, trigger_height) {
            trace!(remaining_px = remaining, trigger_height, "Below fold, waiting");
            return false;
        }

        if !self.cycle.try_begin() {
            return false;
        }

        debug!(remaining_px = remaining, trigger_height, "Trigger reached, fetching next segment");
        let cycle = self.cycle.clone();
        self.tracker.spawn(async move {
            cycle.run().await;
        });
        true
    }

    /// Tick every `check_interval` until stopped
    ///
    /// The first check happens one full period after start.
    pub async fn run(self) {
        let period = self.cycle.config.check_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cycle.stop.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        info!("Scroll scheduler stopped");
    }
}

impl std::fmt::Debug for ScrollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollScheduler")
            .field("state", &self.state())
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}
