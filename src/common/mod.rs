pub mod config;
pub mod paths;
pub mod process;
pub mod shell;
pub mod systemd;

// Re-export commonly used types
pub use config::Settings;
pub use process::{CommandRunner, CommandSpec, CommandStatus, HostProbe, HostRunner, SystemProbe};
