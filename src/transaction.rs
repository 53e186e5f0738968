//! Scoped transactions and their per-thread binding.
//!
//! A [`Transaction`] moves through `Unstarted → Active → Finished`. Beginning
//! it opens a redb transaction and binds it to the calling thread in the
//! [`TransactionRegistry`], so table calls on that thread that pass no
//! transaction join it. Exactly one of commit, rollback or drop finalizes an
//! active transaction, and each of them removes the binding.
//!
//! Read-only transactions can be begun again after they finish. redb cannot
//! renew a snapshot in place, so a renewal takes a fresh snapshot.
//!
//! # Examples
//!
//! ```no_run
//! use redb_containers::{Config, Connection, KeyValueTable, TransactionMode};
//!
//! # fn main() -> redb_containers::ContainerResult<()> {
//! let conn = Connection::create(Config::new("./app.redb"))?;
//! let users: KeyValueTable<u64, String> = KeyValueTable::new(&conn, "users")?;
//!
//! let mut txn = conn.transaction(TransactionMode::Writable)?;
//! users.insert_or_assign(&1, &"ada".to_string())?; // joins `txn`
//! txn.commit()?; // or drop it to roll back
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};
use redb::{ReadTransaction, WriteTransaction};
use strum::Display;

use crate::environment::{Environment, ReaderSlot};
use crate::error::{ContainerResult, EngineContext, UsageError};
use crate::registry::TransactionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransactionMode {
    ReadOnly,
    Writable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransactionState {
    Unstarted,
    Active,
    Finished,
}

/// The redb transaction behind an active [`Transaction`].
pub(crate) enum EngineTxn {
    Read {
        txn: ReadTransaction,
        _slot: ReaderSlot,
    },
    Write(WriteTransaction),
}

impl EngineTxn {
    /// The write transaction, or a usage error inside a read-only one.
    pub(crate) fn writer(&self) -> ContainerResult<&WriteTransaction> {
        match self {
            EngineTxn::Write(txn) => Ok(txn),
            EngineTxn::Read { .. } => Err(UsageError::ReadOnlyTransaction.into()),
        }
    }
}

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Shared cell holding the engine handle; this is what the registry binds.
pub(crate) struct TxnSlot {
    id: u64,
    mode: TransactionMode,
    handle: Mutex<Option<EngineTxn>>,
}

impl TxnSlot {
    pub(crate) fn new(mode: TransactionMode) -> Self {
        Self {
            id: NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed),
            mode,
            handle: Mutex::new(None),
        }
    }

    fn handle(&self) -> MutexGuard<'_, Option<EngineTxn>> {
        self.handle.lock()
    }

    fn is_open(&self) -> bool {
        self.handle().is_some()
    }

    /// Drops the engine handle, aborting pending writes.
    ///
    /// The owning [`Transaction`] then reports itself finished. Returns
    /// whether a handle was open.
    pub(crate) fn abort(&self) -> bool {
        let Some(handle) = self.handle().take() else {
            return false;
        };
        log::debug!("aborting {} transaction {}", self.mode, self.id);
        if let EngineTxn::Write(txn) = handle {
            if let Err(err) = txn.abort() {
                log::warn!("abort of transaction {} failed: {err}", self.id);
            }
        }
        true
    }

    /// Runs `op` against the engine transaction while it is open.
    pub(crate) fn with_engine<R>(
        &self,
        op: impl FnOnce(&EngineTxn) -> ContainerResult<R>,
    ) -> ContainerResult<R> {
        let handle = self.handle();
        match handle.as_ref() {
            Some(txn) => op(txn),
            None => Err(UsageError::NotActive(TransactionState::Finished).into()),
        }
    }
}

/// A scoped unit of atomic access to one environment.
///
/// Dropping an active transaction aborts it; uncommitted writes never persist.
/// Disconnecting the connection aborts it as well, after which it reports
/// [`TransactionState::Finished`].
pub struct Transaction {
    env: Weak<Environment>,
    registry: Arc<TransactionRegistry>,
    slot: Arc<TxnSlot>,
    state: TransactionState,
    owner: Option<ThreadId>,
}

impl Transaction {
    pub(crate) fn new(
        env: &Arc<Environment>,
        registry: Arc<TransactionRegistry>,
        mode: TransactionMode,
    ) -> Self {
        Self {
            env: Arc::downgrade(env),
            registry,
            slot: Arc::new(TxnSlot::new(mode)),
            state: TransactionState::Unstarted,
            owner: None,
        }
    }

    pub fn mode(&self) -> TransactionMode {
        self.slot.mode
    }

    pub fn state(&self) -> TransactionState {
        match self.state {
            TransactionState::Active if !self.slot.is_open() => TransactionState::Finished,
            state => state,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Opens the transaction and binds it to the calling thread.
    ///
    /// Does nothing when already active. Fails with
    /// [`UsageError::TransactionAlreadyOpen`] if the thread is bound to
    /// another transaction.
    pub fn begin(&mut self) -> ContainerResult<()> {
        if self.is_active() {
            return Ok(());
        }
        let env = self.env.upgrade().ok_or(UsageError::NotConnected)?;
        let thread = thread::current().id();
        // Checked before opening: a second writer on this thread would block forever.
        if self.registry.is_bound(thread) {
            return Err(UsageError::TransactionAlreadyOpen.into());
        }

        let handle = match self.slot.mode {
            TransactionMode::ReadOnly => {
                if self.state == TransactionState::Finished {
                    log::trace!("renewing read transaction {}", self.slot.id);
                }
                let (txn, slot) = env.begin_read()?;
                EngineTxn::Read { txn, _slot: slot }
            }
            TransactionMode::Writable => EngineTxn::Write(env.begin_write()?),
        };

        self.registry.bind(thread, Arc::clone(&self.slot))?;
        *self.slot.handle() = Some(handle);
        self.owner = Some(thread);
        self.state = TransactionState::Active;
        log::trace!("began {} transaction {}", self.slot.mode, self.slot.id);
        Ok(())
    }

    /// Commits writes, or releases the snapshot of a read-only transaction.
    ///
    /// The transaction is finished and unbound even when the commit fails.
    pub fn commit(&mut self) -> ContainerResult<()> {
        let handle = self.finish()?;
        log::trace!("committing transaction {}", self.slot.id);
        match handle {
            EngineTxn::Write(txn) => txn.commit().engine("commit transaction"),
            EngineTxn::Read { .. } => Ok(()),
        }
    }

    /// Discards writes, or releases the snapshot of a read-only transaction.
    pub fn rollback(&mut self) -> ContainerResult<()> {
        let handle = self.finish()?;
        log::trace!("rolling back transaction {}", self.slot.id);
        match handle {
            EngineTxn::Write(txn) => txn.abort().engine("abort transaction"),
            EngineTxn::Read { .. } => Ok(()),
        }
    }

    pub(crate) fn slot(&self) -> &Arc<TxnSlot> {
        &self.slot
    }

    fn finish(&mut self) -> ContainerResult<EngineTxn> {
        if self.state != TransactionState::Active {
            return Err(UsageError::NotActive(self.state).into());
        }
        self.state = TransactionState::Finished;
        self.unbind();
        self.slot
            .handle()
            .take()
            .ok_or_else(|| UsageError::NotActive(TransactionState::Finished).into())
    }

    fn unbind(&mut self) {
        if let Some(owner) = self.owner.take() {
            self.registry.unbind(owner, &self.slot);
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }
        self.state = TransactionState::Finished;
        self.unbind();
        self.slot.abort();
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.slot.id)
            .field("mode", &self.slot.mode)
            .field("state", &self.state())
            .finish()
    }
}
