use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{OrchestratorError, Result};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Held while operating on a package; dropping it releases the lock
#[derive(Debug)]
pub struct PackageLock {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl PackageLock {
    pub fn package(&self) -> &str {
        &self.name
    }
}

/// One async mutex per package name.
///
/// The map itself sits behind a short-lived std mutex that is only held to look
/// up or insert an entry; waiting happens on the per-package lock outside it,
/// so different names never contend.
#[derive(Debug)]
pub struct LockManager {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn entry(&self, name: &str) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow::anyhow!("package lock map poisoned"))?;
        Ok(locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    /// Wait up to the configured timeout for exclusive access to `name`
    pub async fn acquire(&self, name: &str) -> Result<PackageLock> {
        let lock = self.entry(name)?;
        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(PackageLock {
                name: name.to_string(),
                _guard: guard,
            }),
            Err(_) => Err(OrchestratorError::LockTimeout(
                name.to_string(),
                self.timeout.as_secs(),
            )),
        }
    }

    /// Number of package names that have ever been locked
    pub fn known_packages(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
