//! One-time model initialization with sticky failure.
//!
//! [`LoadOnce`] is double-checked locking over a [`OnceLock`]: the fast path
//! reads the cell without locking; the slow path takes an exclusive gate,
//! rechecks, and runs the loader on a blocking thread. The gate guard travels
//! into that thread, so a caller that stops waiting (timeout, dropped request)
//! cannot let a second initialization start while the first is still running.

use cosmocat_core::error::EngineError;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Outcome of initialization, shared by every caller.
pub enum EngineState<T> {
    Ready(Arc<T>),
    Unavailable(String),
}

impl<T> Clone for EngineState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Ready(value) => Self::Ready(Arc::clone(value)),
            Self::Unavailable(reason) => Self::Unavailable(reason.clone()),
        }
    }
}

impl<T> std::fmt::Debug for EngineState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready"),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

/// A lazily initialized, process-lifetime value.
pub struct LoadOnce<T> {
    state: Arc<OnceLock<EngineState<T>>>,
    gate: Arc<Mutex<()>>,
}

impl<T: Send + Sync + 'static> LoadOnce<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(OnceLock::new()),
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// The settled state, if initialization already finished.
    pub fn peek(&self) -> Option<EngineState<T>> {
        self.state.get().cloned()
    }

    /// Return the settled state, running `load` if nobody has yet.
    ///
    /// Exactly one `load` ever runs. A failure is recorded and returned to
    /// every later caller without retrying.
    pub async fn get_or_load<F>(&self, load: F) -> EngineState<T>
    where
        F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    {
        if let Some(state) = self.state.get() {
            return state.clone();
        }

        let guard = Arc::clone(&self.gate).lock_owned().await;
        if let Some(state) = self.state.get() {
            return state.clone();
        }

        let cell = Arc::clone(&self.state);
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let state = match std::panic::catch_unwind(AssertUnwindSafe(load)) {
                Ok(Ok(value)) => {
                    info!("Model initialized");
                    EngineState::Ready(Arc::new(value))
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Model initialization failed, engine unavailable for this process");
                    EngineState::Unavailable(e.to_string())
                }
                Err(_) => {
                    warn!("Model initialization panicked, engine unavailable for this process");
                    EngineState::Unavailable("initialization panicked".into())
                }
            };
            cell.get_or_init(|| state).clone()
        });

        match task.await {
            Ok(state) => state,
            Err(e) => self
                .state
                .get_or_init(|| EngineState::Unavailable(format!("initialization task failed: {e}")))
                .clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for LoadOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_one_load() {
        let once = Arc::new(LoadOnce::<u32>::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let once = Arc::clone(&once);
            let loads = Arc::clone(&loads);
            handles.push(tokio::spawn(async move {
                once.get_or_load(move || {
                    loads.fetch_add(1, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    Ok(7)
                })
                .await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                EngineState::Ready(value) => assert_eq!(*value, 7),
                other => panic!("expected Ready, got {other:?}"),
            }
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_sticky() {
        let once = LoadOnce::<u32>::new();
        let first = once
            .get_or_load(|| Err(EngineError::Artifacts("weights missing".into())))
            .await;
        assert!(matches!(first, EngineState::Unavailable(ref r) if r.contains("weights missing")));

        let second = once.get_or_load(|| Ok(1)).await;
        assert!(matches!(second, EngineState::Unavailable(_)));
    }

    #[tokio::test]
    async fn panicking_loader_marks_unavailable() {
        let once = LoadOnce::<u32>::new();
        let state = once.get_or_load(|| panic!("boom")).await;
        assert!(matches!(state, EngineState::Unavailable(_)));
        assert!(matches!(once.peek(), Some(EngineState::Unavailable(_))));
    }

    #[tokio::test]
    async fn peek_is_empty_before_load() {
        let once = LoadOnce::<u32>::new();
        assert!(once.peek().is_none());
        once.get_or_load(|| Ok(3)).await;
        assert!(matches!(once.peek(), Some(EngineState::Ready(_))));
    }
}
