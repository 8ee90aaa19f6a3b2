use anyhow::{Context, Result};
use std::process::{Command, Stdio};

/// Represents the state of a systemd service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive,
    Failed,
    Unknown(String),
}

impl ServiceState {
    /// Map `systemctl is-active` exit codes onto a state
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => ServiceState::Active,
            Some(3) => ServiceState::Inactive,
            Some(4) => ServiceState::Failed,
            Some(other) => ServiceState::Unknown(format!("Exit code: {}", other)),
            None => ServiceState::Unknown("Terminated by signal".to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ServiceState::Active)
    }
}

/// Command executor function type, swapped out in tests
pub type CommandExecutor =
    Box<dyn Fn(&str, &[&str]) -> Result<std::process::ExitStatus> + Send + Sync>;

/// Read-only view of system services. Only liveness is needed here; starting and
/// stopping services is left to the install scripts.
pub struct SystemdManager {
    command_executor: Option<CommandExecutor>,
}

impl SystemdManager {
    /// Create a systemd manager for system services
    pub fn system() -> Self {
        Self {
            command_executor: None,
        }
    }

    /// Create a systemd manager with a custom command executor
    pub fn with_executor(executor: CommandExecutor) -> Self {
        Self {
            command_executor: Some(executor),
        }
    }

    /// Check if a service is currently active
    pub fn is_active(&self, service_name: &str) -> bool {
        self.get_state(service_name).is_active()
    }

    /// Get the detailed state of a service
    pub fn get_state(&self, service_name: &str) -> ServiceState {
        match self.run_systemctl(&["is-active", "--quiet", service_name]) {
            Ok(status) => ServiceState::from_exit_code(status.code()),
            Err(_) => ServiceState::Unknown("Command failed".to_string()),
        }
    }

    fn run_systemctl(&self, args: &[&str]) -> Result<std::process::ExitStatus> {
        if let Some(ref executor) = self.command_executor {
            return executor("systemctl", args);
        }

        Command::new("systemctl")
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run systemctl with args: {:?}", args))
    }
}
