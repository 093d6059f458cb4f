use std::sync::Arc;
use std::time::Duration;

use futures::lock::Mutex;
use moka::future::Cache;

/// Registry of per-employee async mutexes.
///
/// Entries expire after `idle` without use, so the registry only holds
/// employees with recent ledger activity. A handle must not outlive `idle`
/// while locked.
#[derive(Clone)]
pub struct EmployeeLocks {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl EmployeeLocks {
    pub fn new(idle: Duration) -> Self {
        Self {
            locks: Cache::builder().time_to_idle(idle).build(),
        }
    }

    /// The mutex guarding `email`'s requests and balance.
    pub async fn handle(&self, email: &str) -> Arc<Mutex<()>> {
        self.locks
            .get_with(email.to_lowercase(), async { Arc::new(Mutex::new(())) })
            .await
    }
}

impl Default for EmployeeLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}
