//! Thread-safe handle to a table engine.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::TableEngine;

/// Cloneable handle sharing one engine between threads.
///
/// A command locks the engine for its whole run, so concurrent
/// invocations never interleave their changes.
pub struct SharedEngine<E> {
    inner: Arc<Mutex<E>>,
}

impl<E: TableEngine> SharedEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine.
    pub fn lock(&self) -> MutexGuard<'_, E> {
        self.inner.lock()
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}

impl<E> Clone for SharedEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use std::thread;

    #[test]
    fn test_concurrent_chain_creation() {
        let shared = SharedEngine::new(MemoryEngine::new("filter").unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = shared.clone();
                thread::spawn(move || engine.with(|e| e.create_chain(&format!("chain{}", i))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(shared.lock().chains().len(), 3 + 8);
    }

    #[test]
    fn test_duplicate_creation_fails_once() {
        let shared = SharedEngine::new(MemoryEngine::new("filter").unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = shared.clone();
                thread::spawn(move || engine.with(|e| e.create_chain("same").is_ok()))
            })
            .collect();
        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
    }
}
