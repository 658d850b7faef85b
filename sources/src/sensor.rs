//! Motion sensor on a sysfs GPIO line
//!
//! The value file is polled; every level change is sent as a bool
//! (`true` = high). The first reading only sets the baseline.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

#[derive(Debug, Clone)]
pub struct GpioSensor {
    root: PathBuf,
    pin: u32,
    poll_interval: Duration,
}

impl GpioSensor {
    pub fn new(pin: u32, poll_interval: Duration) -> Self {
        Self::with_root(SYSFS_GPIO_ROOT, pin, poll_interval)
    }

    pub fn with_root(root: impl AsRef<Path>, pin: u32, poll_interval: Duration) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            pin,
            poll_interval,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    /// Export the pin if needed and configure it as an input.
    pub async fn prepare(&self) -> Result<()> {
        if !tokio::fs::try_exists(self.pin_dir()).await? {
            info!(pin = self.pin, "exporting gpio pin");
            tokio::fs::write(self.root.join("export"), self.pin.to_string()).await?;
        }
        // Some kernels expose direction read-only for already-configured pins
        if let Err(e) = tokio::fs::write(self.pin_dir().join("direction"), "in").await {
            debug!(pin = self.pin, error = %e, "could not set gpio direction");
        }
        Ok(())
    }

    pub async fn read(&self) -> Result<bool> {
        let value = tokio::fs::read_to_string(self.pin_dir().join("value")).await?;
        Ok(value.trim() == "1")
    }

    /// Poll until the receiver is dropped.
    pub fn spawn(self) -> (mpsc::Receiver<bool>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last: Option<bool> = None;
            let mut failing = false;

            loop {
                interval.tick().await;
                let level = match self.read().await {
                    Ok(level) => {
                        failing = false;
                        level
                    }
                    Err(e) => {
                        if !failing {
                            warn!(pin = self.pin, error = %e, "motion sensor read failed");
                            failing = true;
                        }
                        continue;
                    }
                };

                match last {
                    Some(previous) if previous == level => {}
                    Some(_) => {
                        if tx.send(level).await.is_err() {
                            debug!(pin = self.pin, "motion sensor receiver dropped");
                            return;
                        }
                    }
                    None => {}
                }
                last = Some(level);
            }
        });
        (rx, handle)
    }
}
