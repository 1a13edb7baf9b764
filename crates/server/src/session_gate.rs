use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serialises requests that share a session id inside this process.
///
/// Locks are held weakly; entries whose lock nobody holds or waits on are
/// pruned the next time any session acquires.
#[derive(Default)]
pub(crate) struct SessionGate {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

pub(crate) type SessionPass = OwnedMutexGuard<()>;

impl SessionGate {
    pub(crate) async fn acquire(&self, session_id: &str) -> SessionPass {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(session_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(session_id.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
#[path = "tests/session_gate_tests.rs"]
mod tests;
