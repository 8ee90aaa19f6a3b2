//! In-memory host used by unit tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::common::process::{CommandRunner, CommandSpec, CommandStatus, SystemProbe};

#[derive(Default)]
struct HostState {
    commands: HashSet<String>,
    services: HashSet<String>,
    outputs: HashMap<String, String>,
    log: Vec<String>,
    failures: Vec<String>,
    effects: Vec<(String, Vec<String>)>,
}

/// Scripted probe and command runner in one.
///
/// Commands are matched by substring of their display form. `on_run` makes a
/// successful command put executables on the fake PATH, which is how a fake
/// install script "installs" something.
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(self, commands: &[&str]) -> Self {
        self.add_commands(commands);
        self
    }

    pub fn with_service(self, unit: &str) -> Self {
        self.state.lock().unwrap().services.insert(unit.to_string());
        self
    }

    /// Output for `program`, or for `program args...` when the key has spaces
    pub fn with_output(self, key: &str, output: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .outputs
            .insert(key.to_string(), output.to_string());
        self
    }

    pub fn fail_on(self, pattern: &str) -> Self {
        self.state.lock().unwrap().failures.push(pattern.to_string());
        self
    }

    pub fn on_run(self, pattern: &str, installs: &[&str]) -> Self {
        self.state.lock().unwrap().effects.push((
            pattern.to_string(),
            installs.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_commands(&self, commands: &[&str]) {
        let mut state = self.state.lock().unwrap();
        for command in commands {
            state.commands.insert(command.to_string());
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.lines().iter().any(|line| line.contains(pattern))
    }

    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.contains(pattern))
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl SystemProbe for FakeHost {
    fn command_exists(&self, command: &str) -> bool {
        self.state.lock().unwrap().commands.contains(command)
    }

    fn service_active(&self, service: &str) -> bool {
        self.state.lock().unwrap().services.contains(service)
    }

    fn command_output(&self, program: &str, args: &[&str]) -> Option<String> {
        let state = self.state.lock().unwrap();
        let full = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        state
            .outputs
            .get(&full)
            .or_else(|| state.outputs.get(program))
            .cloned()
    }
}

#[async_trait]
impl CommandRunner for FakeHost {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandStatus> {
        let line = spec.display();
        self.state.lock().unwrap().log.push(line.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        if state.failures.iter().any(|pattern| line.contains(pattern)) {
            return Ok(CommandStatus::failure(1));
        }
        let installs: Vec<String> = state
            .effects
            .iter()
            .filter(|(pattern, _)| line.contains(pattern))
            .flat_map(|(_, installs)| installs.clone())
            .collect();
        state.commands.extend(installs);
        Ok(CommandStatus::success())
    }
}
