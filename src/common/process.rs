//! External command seams.
//!
//! Everything that touches the host goes through one of two traits so the
//! orchestration engine can be exercised without a Debian box:
//!
//! - [`SystemProbe`]: quick, read-only questions (is `node` on PATH, is
//!   `nginx` active, what does `dpkg -l` print).
//! - [`CommandRunner`]: mutating commands (install scripts, `apt-get`,
//!   `rm -rf`, `update-alternatives --remove-all`), run to completion.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use super::shell::{join_command, split_command};
use super::systemd::SystemdManager;

/// Environment that keeps apt, dpkg and friends from ever waiting on a prompt
pub const NONINTERACTIVE_ENV: &[(&str, &str)] = &[
    ("DEBIAN_FRONTEND", "noninteractive"),
    ("NEEDRESTART_MODE", "a"),
    ("APT_LISTCHANGES_FRONTEND", "none"),
    ("UCF_FORCE_CONFFOLD", "1"),
];

/// A command to run on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Run through `sudo` unless we already are root
    pub privileged: bool,
    pub current_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            privileged: false,
            current_dir: None,
            timeout: None,
        }
    }

    /// Shorthand for a privileged command
    pub fn privileged(program: impl Into<String>) -> Self {
        Self {
            privileged: true,
            ..Self::new(program)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn noninteractive(mut self) -> Self {
        for (key, value) in NONINTERACTIVE_ENV {
            self.env.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// One-line shell rendering, `sudo`-prefixed when privileged.
    ///
    /// Environment and working directory are not part of the rendering; this is
    /// the form stored in rollback journals and shown in dry runs.
    pub fn display(&self) -> String {
        let line = join_command(&self.program, &self.args);
        if self.privileged {
            format!("sudo {}", line)
        } else {
            line
        }
    }

    /// Parse a line produced by [`CommandSpec::display`]
    pub fn parse(line: &str) -> Result<Self> {
        let (program, args) = split_command(line)?;
        if program == "sudo" {
            let (program, rest) = args
                .split_first()
                .with_context(|| format!("`{}` has nothing after sudo", line))?;
            return Ok(CommandSpec::privileged(program.clone()).args(rest.iter().cloned()));
        }
        Ok(CommandSpec::new(program).args(args))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// How a command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn failure(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs mutating commands to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command, streaming its output to the operator's terminal.
    ///
    /// `Err` means the command could not be started or timed out; a command that
    /// ran and failed is `Ok` with a non-zero status.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandStatus>;
}

/// Read-only host probes
pub trait SystemProbe: Send + Sync {
    /// Whether `command` resolves on PATH
    fn command_exists(&self, command: &str) -> bool;

    /// Whether the systemd unit reports `active`
    fn service_active(&self, service: &str) -> bool;

    /// Combined stdout/stderr of a successful run, `None` if the program is
    /// missing or exits non-zero
    fn command_output(&self, program: &str, args: &[&str]) -> Option<String>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct HostRunner;

impl HostRunner {
    pub fn new() -> Self {
        Self
    }

    fn build(spec: &CommandSpec) -> tokio::process::Command {
        let elevate = spec.privileged && !matches!(sudo::check(), sudo::RunningAs::Root);

        let mut command = if elevate {
            // sudo resets the environment, so hand variables over through env(1)
            let mut command = tokio::process::Command::new("sudo");
            if !spec.env.is_empty() {
                command.arg("env");
                for (key, value) in &spec.env {
                    command.arg(format!("{}={}", key, value));
                }
            }
            command.arg(&spec.program);
            command
        } else {
            let mut command = tokio::process::Command::new(&spec.program);
            command.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            command
        };

        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandStatus> {
        let mut child = Self::build(spec)
            .spawn()
            .with_context(|| format!("Failed to start `{}`", spec))?;

        let waited = match spec.timeout {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, child.wait()).await;
                match outcome {
                    Ok(status) => status,
                    Err(_) => {
                        let _ = child.kill().await;
                        anyhow::bail!(
                            "`{}` timed out after {}s and was killed",
                            spec,
                            limit.as_secs_f32()
                        );
                    }
                }
            }
            None => child.wait().await,
        };
        let status = waited.with_context(|| format!("Failed waiting for `{}`", spec))?;

        Ok(CommandStatus {
            code: status.code(),
        })
    }
}

/// [`SystemProbe`] backed by `which`, `systemctl` and `duct`
pub struct HostProbe {
    systemd: SystemdManager,
}

impl Default for HostProbe {
    fn default() -> Self {
        Self {
            systemd: SystemdManager::system(),
        }
    }
}

impl HostProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SystemProbe for HostProbe {
    fn command_exists(&self, command: &str) -> bool {
        which::which(command).is_ok()
    }

    fn service_active(&self, service: &str) -> bool {
        self.systemd.is_active(service)
    }

    fn command_output(&self, program: &str, args: &[&str]) -> Option<String> {
        let output = duct::cmd(program, args)
            .stderr_to_stdout()
            .stdout_capture()
            .stdin_null()
            .unchecked()
            .run()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_parse() {
        let spec = CommandSpec::privileged("apt-get")
            .args(["remove", "-y", "build-essential"])
            .noninteractive();
        assert_eq!(spec.display(), "sudo apt-get remove -y build-essential");

        let parsed = CommandSpec::parse(&spec.display()).unwrap();
        assert!(parsed.privileged);
        assert_eq!(parsed.program, "apt-get");
        assert_eq!(parsed.args, vec!["remove", "-y", "build-essential"]);
    }

    #[test]
    fn parse_plain_command() {
        let parsed = CommandSpec::parse("rm -rf '/tmp/a b'").unwrap();
        assert!(!parsed.privileged);
        assert_eq!(parsed.program, "rm");
        assert_eq!(parsed.args, vec!["-rf", "/tmp/a b"]);
        assert!(CommandSpec::parse("sudo").is_err());
    }

    #[test]
    fn noninteractive_sets_debian_frontend() {
        let spec = CommandSpec::new("apt-get").noninteractive();
        assert!(
            spec.env
                .iter()
                .any(|(k, v)| k == "DEBIAN_FRONTEND" && v == "noninteractive")
        );
    }

    #[tokio::test]
    async fn host_runner_reports_exit_codes() {
        let runner = HostRunner::new();
        let ok = runner.run(&CommandSpec::new("true")).await.unwrap();
        assert!(ok.is_success());
        let failed = runner.run(&CommandSpec::new("false")).await.unwrap();
        assert_eq!(failed.code, Some(1));
    }

    #[tokio::test]
    async fn host_runner_kills_on_timeout() {
        let runner = HostRunner::new();
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .with_timeout(Some(Duration::from_millis(100)));
        let err = runner.run(&spec).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn host_probe_reads_output() {
        let probe = HostProbe::new();
        assert!(probe.command_exists("sh"));
        assert!(!probe.command_exists("definitely-not-a-real-binary-4821"));
        let out = probe.command_output("sh", &["-c", "echo v1.2.3"]).unwrap();
        assert_eq!(out.trim(), "v1.2.3");
        assert!(probe.command_output("sh", &["-c", "exit 2"]).is_none());
    }
}
