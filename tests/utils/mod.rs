#![allow(dead_code)]

use anyhow::Result;
use std::process::Command;

use super::common::TestEnvironment;

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run the built binary against the environment's config file
pub fn run_stackctl_command(env: &TestEnvironment, args: &[&str]) -> Result<CommandOutput> {
    let config = env.write_config()?;

    let output = Command::new(env!("CARGO_BIN_EXE_stackctl"))
        .arg("--config")
        .arg(&config)
        .arg("--no-color")
        .args(args)
        .env("HOME", env.home())
        .env("XDG_DATA_HOME", env.path().join("data"))
        .env("XDG_CONFIG_HOME", env.path().join("config"))
        .current_dir(env.path())
        .output()?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Parse every stdout/stderr line that is a JSON object
pub fn json_events(output: &CommandOutput) -> Vec<serde_json::Value> {
    output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter(|value| value.is_object())
        .collect()
}
