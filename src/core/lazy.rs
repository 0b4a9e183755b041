//! Guarded lazy initialization for file-wide aggregates (grid index,
//! envelope, snapshot info).
//!
//! The first caller runs the computation on a named background thread and
//! waits for it; concurrent callers block on the same cell and never
//! recompute. The outcome, success or failure, is stored once and handed to
//! every later caller without locking.
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub struct LazyAggregate<T> {
    name: &'static str,
    cell: OnceCell<std::result::Result<Arc<T>, Arc<Error>>>,
}

impl<T: Send + Sync> LazyAggregate<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Value if the computation already finished successfully.
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().and_then(|r| r.as_ref().ok().cloned())
    }

    pub fn get_or_compute<F>(&self, compute: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T> + Send,
    {
        let outcome = self.cell.get_or_init(|| self.run(compute));
        match outcome {
            Ok(value) => Ok(value.clone()),
            Err(source) => Err(Error::Aggregate {
                name: self.name,
                source: source.clone(),
            }),
        }
    }

    fn run<F>(&self, compute: F) -> std::result::Result<Arc<T>, Arc<Error>>
    where
        F: FnOnce() -> Result<T> + Send,
    {
        let started = Instant::now();
        let joined = std::thread::scope(|scope| {
            std::thread::Builder::new()
                .name(format!("smospro-{}", self.name))
                .spawn_scoped(scope, compute)
                .map(|handle| handle.join())
        });
        let result = match joined {
            Ok(Ok(Ok(value))) => Ok(Arc::new(value)),
            Ok(Ok(Err(e))) => Err(Arc::new(e)),
            Ok(Err(panic)) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                let msg = format!("{} computation panicked: {}", self.name, msg);
                Err(Arc::new(Error::Processing(msg)))

            }
            Err(e) => Err(Arc::new(Error::Io(e))),
        };
        match &result {
            Ok(_) => debug!("{} computed in {:.2?}", self.name, started.elapsed()),
            Err(e) => warn!("{} computation failed: {}", self.name, e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn computes_once_for_concurrent_callers() {
        let lazy = LazyAggregate::<usize>::new("counter");
        let calls = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let v = lazy
                        .get_or_compute(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(42)
                        })
                        .unwrap();
                    assert_eq!(*v, 42);
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lazy.get().as_deref(), Some(&42));
    }

    #[test]
    fn failure_is_cached_and_resurfaced() {
        let lazy = LazyAggregate::<u8>::new("broken");
        let first = lazy.get_or_compute(|| Err(Error::Processing("boom".into())));
        let second = lazy.get_or_compute(|| Ok(1));
        for err in [first.unwrap_err(), second.unwrap_err()] {
            match err {
                Error::Aggregate { name, source } => {
                    assert_eq!(name, "broken");
                    assert!(source.to_string().contains("boom"));
                }
                other => panic!("unexpected {other}"),
            }
        }
        assert!(lazy.is_initialized());
        assert!(lazy.get().is_none());
    }

    #[test]
    fn panic_becomes_error() {
        let lazy = LazyAggregate::<u8>::new("panicky");
        let err = lazy.get_or_compute(|| panic!("bad data")).unwrap_err();
        assert!(err.to_string().contains("bad data"));
    }
}
