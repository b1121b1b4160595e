use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per greenhouse id, created on first use.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks and
/// request handlers. Holding the guard serialises decision cycles and manual
/// overrides for that greenhouse; different greenhouses never contend.
#[derive(Clone, Default)]
pub struct GreenhouseLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl GreenhouseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `greenhouse_id`. Released on drop.
    pub async fn acquire(&self, greenhouse_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(greenhouse_id.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of greenhouses that have been locked at least once.
    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
