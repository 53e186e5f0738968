//! Connection: owns the environment, the configuration and the registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::environment::Environment;
use crate::error::{ContainerResult, UsageError};
use crate::registry::TransactionRegistry;
use crate::transaction::{Transaction, TransactionMode, TxnSlot};

/// Entry point to one storage environment.
///
/// A connection is shared by every table built on it, usually as an
/// `Arc<Connection>`. Besides scoped [`Transaction`]s it offers a manual
/// transaction per thread through [`begin`](Connection::begin),
/// [`commit`](Connection::commit) and [`rollback`](Connection::rollback).
///
/// # Examples
///
/// ```no_run
/// use redb_containers::{Config, Connection, TransactionMode};
///
/// # fn main() -> redb_containers::ContainerResult<()> {
/// let conn = Connection::create(Config::new("./app.redb"))?;
/// conn.begin(TransactionMode::Writable)?;
/// // ... table calls on this thread join the manual transaction ...
/// conn.commit()?;
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    config: RwLock<Option<Config>>,
    env: RwLock<Option<Arc<Environment>>>,
    registry: Arc<TransactionRegistry>,
    manual: Mutex<HashMap<ThreadId, Transaction>>,
}

impl Connection {
    /// An unconfigured, disconnected connection.
    pub fn new() -> Self {
        Self {
            config: RwLock::new(None),
            env: RwLock::new(None),
            registry: Arc::new(TransactionRegistry::new()),
            manual: Mutex::new(HashMap::new()),
        }
    }

    /// A configured but not yet connected connection.
    pub fn with_config(config: Config) -> Self {
        let conn = Self::new();
        *conn.config.write() = Some(config);
        conn
    }

    /// Configures and connects in one step.
    pub fn create(config: Config) -> ContainerResult<Arc<Self>> {
        let conn = Arc::new(Self::with_config(config));
        conn.connect()?;
        Ok(conn)
    }

    /// Replaces the configuration; refused while connected.
    pub fn configure(&self, config: Config) -> ContainerResult<()> {
        if self.is_connected() {
            return Err(UsageError::AlreadyConnected.into());
        }
        config.validate()?;
        *self.config.write() = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Option<Config> {
        self.config.read().clone()
    }

    /// Opens the environment. Connecting twice is a no-op.
    pub fn connect(&self) -> ContainerResult<()> {
        let mut env = self.env.write();
        if env.is_some() {
            return Ok(());
        }
        let config = self.config().ok_or(UsageError::NotConfigured)?;
        *env = Some(Arc::new(Environment::open(&config)?));
        log::debug!("connected to {}", config.pathname);
        Ok(())
    }

    /// Configures, then connects.
    pub fn connect_with(&self, config: Config) -> ContainerResult<()> {
        self.configure(config)?;
        self.connect()
    }

    /// Closes the environment and aborts every transaction still open on it.
    ///
    /// Manual transactions are rolled back. Scoped transactions that are
    /// still alive lose their engine handle and report
    /// [`TransactionState::Finished`](crate::TransactionState::Finished), so
    /// a later commit fails instead of persisting.
    pub fn disconnect(&self) -> ContainerResult<()> {
        let env = self.env.write().take();

        let pending: Vec<Transaction> = self.manual.lock().drain().map(|(_, txn)| txn).collect();
        let mut first_error = None;
        for mut txn in pending {
            if let Err(err) = txn.rollback() {
                log::warn!("rollback during disconnect failed: {err}");
                first_error.get_or_insert(err);
            }
        }
        let aborted = self
            .registry
            .drain()
            .iter()
            .filter(|slot| slot.abort())
            .count();
        if aborted > 0 {
            log::warn!("disconnect aborted {aborted} open transaction(s)");
        }

        if let Some(env) = env {
            log::debug!("disconnected from {}", env.file().display());
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_connected(&self) -> bool {
        self.env.read().is_some()
    }

    /// The open environment.
    pub fn environment(&self) -> ContainerResult<Arc<Environment>> {
        self.env
            .read()
            .clone()
            .ok_or_else(|| UsageError::NotConnected.into())
    }

    /// Begins a scoped transaction bound to the calling thread.
    pub fn transaction(&self, mode: TransactionMode) -> ContainerResult<Transaction> {
        let mut txn = Transaction::new(&self.environment()?, Arc::clone(&self.registry), mode);
        txn.begin()?;
        Ok(txn)
    }

    /// Begins the calling thread's manual transaction.
    pub fn begin(&self, mode: TransactionMode) -> ContainerResult<()> {
        let thread = thread::current().id();
        if self.registry.is_bound(thread) {
            return Err(UsageError::TransactionAlreadyOpen.into());
        }
        let txn = self.transaction(mode)?;
        self.manual.lock().insert(thread, txn);
        Ok(())
    }

    /// Commits the calling thread's manual transaction.
    pub fn commit(&self) -> ContainerResult<()> {
        self.take_manual()?.commit()
    }

    /// Rolls back the calling thread's manual transaction.
    pub fn rollback(&self) -> ContainerResult<()> {
        self.take_manual()?.rollback()
    }

    /// Whether the calling thread currently has a bound transaction.
    pub fn has_thread_transaction(&self) -> bool {
        self.registry.is_bound(thread::current().id())
    }

    pub fn registry(&self) -> &TransactionRegistry {
        &self.registry
    }

    pub(crate) fn thread_slot(&self) -> Option<Arc<TxnSlot>> {
        self.registry.current(thread::current().id())
    }

    fn take_manual(&self) -> ContainerResult<Transaction> {
        self.manual.lock()
            .remove(&thread::current().id())
            .ok_or_else(|| UsageError::NoOpenTransaction.into())
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.disconnect() {
            log::warn!("disconnect on drop failed: {err}");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &*self.config.read())
            .field("env", &*self.env.read())
            .finish_non_exhaustive()
    }
}
