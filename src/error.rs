use thiserror::Error;

/// Failure classes of the orchestration engine.
///
/// "Already satisfied", "critical package protected" and "unknown installation
/// type" are outcomes rather than errors and live on the result types instead.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unknown package '{0}'")]
    UnknownPackage(String),

    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Another operation on '{0}' is in progress (lock not acquired within {1}s)")]
    LockTimeout(String, u64),

    #[error("Dependency '{dependency}' of '{package}' could not be satisfied: {reason}")]
    DependencyFailure {
        package: String,
        dependency: String,
        reason: String,
    },

    #[error("Installation of '{package}' failed: {reason}")]
    InstallationFailure { package: String, reason: String },

    #[error("Install script for '{package}' not found at {path}")]
    ScriptNotFound { package: String, path: String },

    #[error(
        "'{package}' {installed} is installed but {requested} was requested; remove it manually first, replacing the system copy can break OS tooling"
    )]
    VersionConflict {
        package: String,
        installed: String,
        requested: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Stable identifier used in summaries and JSON events
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) | OrchestratorError::UnknownPackage(_) => "validation",
            OrchestratorError::CircularDependency(_) => "circular_dependency",
            OrchestratorError::LockTimeout(..) => "lock_timeout",
            OrchestratorError::DependencyFailure { .. } => "dependency_failure",
            OrchestratorError::InstallationFailure { .. } => "installation_failure",
            OrchestratorError::ScriptNotFound { .. } => "script_not_found",
            OrchestratorError::VersionConflict { .. } => "version_conflict",
            OrchestratorError::Io(_) => "io",
            OrchestratorError::Other(_) => "other",
        }
    }

    /// Whether the operator can simply try again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchestratorError::LockTimeout(..))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        OrchestratorError::Validation(message.into())
    }
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;
