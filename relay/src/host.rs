//! Host-level commands
//!
//! Restart, reboot and display power are shell commands taken from the
//! config. They are fire-and-forget: output is logged, failures never reach
//! a client.

use std::sync::Arc;
use tracing::{info, warn};

use homeboard_sources::system::CommandRunner;

use crate::config::SystemConfig;
use crate::motion::Waker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Restart,
    Reboot,
    Sleep,
    Wakeup,
    Nudge,
}

impl HostCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostCommand::Restart => "restart",
            HostCommand::Reboot => "reboot",
            HostCommand::Sleep => "sleep",
            HostCommand::Wakeup => "wakeup",
            HostCommand::Nudge => "nudge",
        }
    }
}

#[derive(Clone)]
pub struct HostCommands {
    runner: Arc<dyn CommandRunner>,
    commands: SystemConfig,
}

impl HostCommands {
    pub fn new(runner: Arc<dyn CommandRunner>, commands: SystemConfig) -> Self {
        Self { runner, commands }
    }

    fn command_line(&self, command: HostCommand) -> &str {
        match command {
            HostCommand::Restart => &self.commands.restart,
            HostCommand::Reboot => &self.commands.reboot,
            HostCommand::Sleep => &self.commands.sleep,
            HostCommand::Wakeup => &self.commands.wakeup,
            HostCommand::Nudge => &self.commands.nudge,
        }
    }

    /// Run `command` and log what came back.
    pub async fn run(&self, command: HostCommand) {
        let line = self.command_line(command);
        if line.trim().is_empty() {
            warn!(command = command.as_str(), "no shell command configured");
            return;
        }

        match self.runner.run(line).await {
            Ok(output) if output.success() => {
                info!(
                    command = command.as_str(),
                    stdout = output.stdout.trim(),
                    "host command finished"
                );
            }
            Ok(output) => {
                warn!(
                    command = command.as_str(),
                    status = ?output.status,
                    stdout = output.stdout.trim(),
                    stderr = output.stderr.trim(),
                    "host command failed"
                );
            }
            Err(e) => warn!(command = command.as_str(), error = %e, "host command could not start"),
        }
    }
}

#[async_trait::async_trait]
impl Waker for HostCommands {
    async fn wake(&self) {
        self.run(HostCommand::Nudge).await;
    }
}
