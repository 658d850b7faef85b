//! Screen wake from a noisy motion sensor
//!
//! A PIR sensor chatters. Each level change moves a signed counter up (high)
//! or down (low); once the counter's magnitude exceeds the threshold the
//! display is woken and the counter starts over. Transitions alone never
//! reset it.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Accumulate-and-threshold gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionGate {
    counter: i64,
    threshold: u32,
    /// Last level seen. Kept for diagnostics; it does not affect triggering.
    last_motion_state: bool,
}

impl MotionGate {
    pub fn new(threshold: u32) -> Self {
        Self {
            counter: 0,
            threshold,
            last_motion_state: false,
        }
    }

    /// Feed one level change; `true` when the display should wake.
    pub fn observe(&mut self, active: bool) -> bool {
        self.counter += if active { 1 } else { -1 };
        self.last_motion_state = active;

        if self.counter.unsigned_abs() > u64::from(self.threshold) {
            self.counter = 0;
            true
        } else {
            false
        }
    }

    pub fn counter(&self) -> i64 {
        self.counter
    }

    pub fn last_motion_state(&self) -> bool {
        self.last_motion_state
    }
}

/// Something that wakes the display
#[async_trait::async_trait]
pub trait Waker: Send + Sync {
    async fn wake(&self);
}

/// Run the gate over `levels` until the sender side closes.
pub fn spawn_gate(
    mut levels: mpsc::Receiver<bool>,
    threshold: u32,
    waker: Arc<dyn Waker>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut gate = MotionGate::new(threshold);
        while let Some(level) = levels.recv().await {
            if gate.observe(level) {
                info!(threshold, "motion detected, waking display");
                waker.wake().await;
            } else {
                debug!(level, counter = gate.counter(), "motion level");
            }
        }
        debug!("motion sensor stream ended");
    })
}
