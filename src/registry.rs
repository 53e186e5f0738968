//! Thread-to-transaction bindings.
//!
//! A table call that is not handed a transaction asks the registry whether
//! its thread already owns one and reuses it. Thread identity is the key
//! only because that argument may be omitted; passing a [`Transaction`]
//! explicitly bypasses the registry entirely.
//!
//! [`Transaction`]: crate::Transaction

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::Mutex;

use crate::error::{ContainerResult, UsageError};
use crate::transaction::TxnSlot;

#[derive(Default)]
pub struct TransactionRegistry {
    bound: Mutex<HashMap<ThreadId, Arc<TxnSlot>>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `slot` to `thread`; a thread holds at most one binding.
    pub(crate) fn bind(&self, thread: ThreadId, slot: Arc<TxnSlot>) -> ContainerResult<()> {
        let mut map = self.bound.lock();
        if map.contains_key(&thread) {
            return Err(UsageError::TransactionAlreadyOpen.into());
        }
        map.insert(thread, slot);
        Ok(())
    }

    /// Removes the binding of `thread` if it still points at `slot`.
    pub(crate) fn unbind(&self, thread: ThreadId, slot: &Arc<TxnSlot>) -> bool {
        let mut map = self.bound.lock();
        match map.get(&thread) {
            Some(bound) if Arc::ptr_eq(bound, slot) => {
                map.remove(&thread);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn current(&self, thread: ThreadId) -> Option<Arc<TxnSlot>> {
        self.bound.lock().get(&thread).cloned()
    }

    pub fn is_bound(&self, thread: ThreadId) -> bool {
        self.bound.lock().contains_key(&thread)
    }

    /// Number of threads with a bound transaction.
    pub fn len(&self) -> usize {
        self.bound.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.lock().is_empty()
    }

    /// Removes every binding and hands back the slots that were bound.
    pub(crate) fn drain(&self) -> Vec<Arc<TxnSlot>> {
        self.bound.lock().drain().map(|(_, slot)| slot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionMode;

    #[test]
    fn test_bind_is_exclusive_per_thread() {
        let registry = TransactionRegistry::new();
        let thread = std::thread::current().id();
        let first = Arc::new(TxnSlot::new(TransactionMode::ReadOnly));
        let second = Arc::new(TxnSlot::new(TransactionMode::ReadOnly));

        registry.bind(thread, Arc::clone(&first)).unwrap();
        let err = registry.bind(thread, Arc::clone(&second)).unwrap_err();
        assert!(err.is_usage(UsageError::TransactionAlreadyOpen));
        assert!(Arc::ptr_eq(&registry.current(thread).unwrap(), &first));

        assert!(!registry.unbind(thread, &second));
        assert!(registry.unbind(thread, &first));
        assert!(registry.current(thread).is_none());
        assert!(!registry.unbind(thread, &first));
    }

    #[test]
    fn test_bindings_are_per_thread() {
        let registry = Arc::new(TransactionRegistry::new());
        let here = std::thread::current().id();
        registry
            .bind(here, Arc::new(TxnSlot::new(TransactionMode::Writable)))
            .unwrap();

        let shared = Arc::clone(&registry);
        std::thread::spawn(move || {
            let there = std::thread::current().id();
            assert!(shared.current(there).is_none());
            shared
                .bind(there, Arc::new(TxnSlot::new(TransactionMode::ReadOnly)))
                .unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.drain().len(), 2);
        assert!(registry.is_empty());
    }
}
