//! Per-room periodic tick task

use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Asks the server loop to advance one room by a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickRequest {
    pub room_code: String,
    /// Identifies the scheduler run that produced the request, so requests
    /// queued before a stop are recognisable as stale.
    pub generation: u64,
}

/// Owns at most one spawned ticking task for a room.
///
/// The task only posts `TickRequest`s; the simulation itself runs on the
/// server loop, serialised with player actions. Dropping the scheduler
/// aborts the task.
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            generation: 0,
            handle: None,
        }
    }

    /// Spawns the ticking task unless one is already running.
    ///
    /// Must be called from within a tokio runtime. Returns false when a task
    /// was already active.
    pub fn start(
        &mut self,
        room_code: String,
        generation: u64,
        tick_tx: mpsc::UnboundedSender<TickRequest>,
    ) -> bool {
        if self.is_running() {
            return false;
        }

        let period = self.period;
        self.generation = generation;
        self.handle = Some(tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Skip the first tick since it fires immediately
            timer.tick().await;

            loop {
                timer.tick().await;
                let request = TickRequest {
                    room_code: room_code.clone(),
                    generation,
                };
                if tick_tx.send(request).is_err() {
                    debug!("Tick channel closed, stopping ticks for room {}", room_code);
                    break;
                }
            }
        }));
        true
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// True if `generation` belongs to the currently running task.
    pub fn accepts(&self, generation: u64) -> bool {
        self.handle.is_some() && self.generation == generation
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
