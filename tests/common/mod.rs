#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use stackctl::common::config::Settings;
use stackctl::common::process::{CommandRunner, CommandSpec, CommandStatus, SystemProbe};
use stackctl::orchestrator::Orchestrator;
use stackctl::package::{PackageDescriptor, PackageRegistry};

/// Throwaway directory tree standing in for the host filesystem
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let env = Self { temp_dir };
        for dir in [env.install_root(), env.home(), env.usr_local(), env.config_root()] {
            fs::create_dir_all(dir)?;
        }
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn install_root(&self) -> PathBuf {
        self.path().join("repo")
    }

    pub fn rollback_dir(&self) -> PathBuf {
        self.path().join("rollback")
    }

    pub fn home(&self) -> PathBuf {
        self.path().join("home")
    }

    pub fn usr_local(&self) -> PathBuf {
        self.path().join("usr/local")
    }

    pub fn config_root(&self) -> PathBuf {
        self.path().join("root")
    }

    pub fn settings(&self) -> Settings {
        Settings {
            install_root: self.install_root(),
            rollback_dir: self.rollback_dir(),
            lock_timeout_secs: 5,
            usr_local: self.usr_local(),
            config_root: self.config_root(),
            home: Some(self.home()),
            ..Settings::default()
        }
    }

    /// Write `settings()` to a config file for CLI runs
    pub fn write_config(&self) -> Result<PathBuf> {
        let path = self.path().join("config.toml");
        self.settings().save(&path)?;
        Ok(path)
    }

    pub fn write_script(&self, name: &str) -> Result<PathBuf> {
        let path = self.install_root().join("scripts").join(format!("{}.sh", name));
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(&path, "#!/bin/sh\nexit 0\n")?;
        Ok(path)
    }

    pub fn touch(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, "x")?;
        Ok(())
    }

    pub fn rollback_points(&self) -> usize {
        fs::read_dir(self.rollback_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Orchestrator over `descriptors`, with a script written for each
    pub fn orchestrator(
        &self,
        descriptors: Vec<PackageDescriptor>,
        system: Arc<FakeSystem>,
    ) -> Result<Orchestrator> {
        for pkg in &descriptors {
            self.write_script(&pkg.name)?;
        }
        let registry = PackageRegistry::from_descriptors(descriptors)?.into_view();
        Ok(Orchestrator::new(
            &self.settings(),
            registry,
            system.clone(),
            system,
        ))
    }
}

#[derive(Default)]
struct SystemState {
    commands: HashSet<String>,
    outputs: HashMap<String, String>,
    log: Vec<String>,
    failures: Vec<String>,
    effects: Vec<(String, Vec<String>)>,
    running: HashMap<String, usize>,
}

/// Scripted host: PATH, probe outputs and a log of every command run.
///
/// `on_run` makes a successful command put executables on the fake PATH.
/// Concurrency is tracked overall and per command line.
#[derive(Default)]
pub struct FakeSystem {
    state: Mutex<SystemState>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    max_same_command: AtomicUsize,
}

impl FakeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(self, commands: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.commands.extend(commands.iter().map(|c| c.to_string()));
        }
        self
    }

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

    pub fn lines(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.lines().iter().any(|line| line.contains(pattern))
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }

    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.lines().iter().position(|line| line.contains(pattern))
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of identical command lines that were running at once
    pub fn max_same_command(&self) -> usize {
        self.max_same_command.load(Ordering::SeqCst)
    }
}

impl SystemProbe for FakeSystem {
    fn command_exists(&self, command: &str) -> bool {
        self.state.lock().unwrap().commands.contains(command)
    }

    fn service_active(&self, _service: &str) -> bool {
        false
    }

    fn command_output(&self, program: &str, args: &[&str]) -> Option<String> {
        let state = self.state.lock().unwrap();
        let mut full = vec![program];
        full.extend_from_slice(args);
        state
            .outputs
            .get(&full.join(" "))
            .or_else(|| state.outputs.get(program))
            .cloned()
    }
}

#[async_trait]
impl CommandRunner for FakeSystem {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandStatus> {
        let line = spec.display();
        {
            let mut state = self.state.lock().unwrap();
            state.log.push(line.clone());
            let same = state.running.entry(line.clone()).or_insert(0);
            *same += 1;
            self.max_same_command.fetch_max(*same, Ordering::SeqCst);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(same) = state.running.get_mut(&line) {
            *same -= 1;
        }
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
