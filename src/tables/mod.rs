//! Typed table facades over named redb tables.
//!
//! Every facade operation resolves a transaction the same way: an explicit
//! [`Transaction`] argument (the `*_in` methods), else the transaction bound
//! to the calling thread, else a fresh scoped transaction that commits when
//! the operation succeeds and rolls back when it fails.

mod any_value;
mod iterator;
mod key_set;
mod key_value;
mod multi_value;

pub use any_value::{AnyValueTable, TYPE_TAG_LEN, type_tag};
pub use iterator::TableIter;
pub use key_set::KeyTable;
pub use key_value::KeyValueTable;
pub use multi_value::KeyMultiValueTable;

use std::sync::Arc;

use redb::{ReadableTable, ReadableTableMetadata, Table, WriteTransaction};

use crate::codec::KeyOrder;
use crate::connection::Connection;
use crate::error::{ContainerResult, EngineContext, UsageError};
use crate::transaction::{EngineTxn, Transaction, TransactionMode, TxnSlot};

/// Opens a table for reading inside either kind of engine transaction.
///
/// In a read transaction a table that was never created reads as empty and
/// the expression evaluates to `Ok($missing)`.
macro_rules! read_table {
    ($engine:expr, $open:ident($def:expr), |$table:ident| $body:expr, or $missing:expr) => {
        match $engine {
            $crate::transaction::EngineTxn::Read { txn, .. } => match txn.$open($def) {
                Ok($table) => $body,
                Err(::redb::TableError::TableDoesNotExist(_)) => Ok($missing),
                Err(err) => Err($crate::error::ContainerError::engine("open table", err)),
            },
            $crate::transaction::EngineTxn::Write(txn) => {
                let $table = $crate::error::EngineContext::engine(txn.$open($def), "open table")?;
                $body
            }
        }
    };
}

pub(crate) use read_table;

/// Name and connection shared by every facade kind.
pub(crate) struct TableCore {
    connection: Arc<Connection>,
    name: String,
}

impl TableCore {
    /// Registers `name` with the environment and creates the table if needed.
    pub(crate) fn open(
        connection: &Arc<Connection>,
        name: &str,
        create: impl FnOnce(&WriteTransaction, &str) -> ContainerResult<()>,
    ) -> ContainerResult<Self> {
        let env = connection.environment()?;
        env.register_table(name)?;
        let core = Self {
            connection: Arc::clone(connection),
            name: name.to_owned(),
        };
        if !env.is_read_only() {
            core.run(None, TransactionMode::Writable, |engine| match engine {
                EngineTxn::Write(txn) => create(txn, &core.name),
                EngineTxn::Read { .. } => Ok(()),
            })?;
        }
        Ok(core)
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Runs a single engine step in the resolved transaction.
    pub(crate) fn run<R>(
        &self,
        explicit: Option<&Transaction>,
        mode: TransactionMode,
        op: impl FnOnce(&EngineTxn) -> ContainerResult<R>,
    ) -> ContainerResult<R> {
        self.run_scoped(explicit, mode, |slot| slot.with_engine(op))
    }

    /// Runs several engine steps in one resolved transaction.
    pub(crate) fn run_scoped<R>(
        &self,
        explicit: Option<&Transaction>,
        mode: TransactionMode,
        op: impl FnOnce(&TxnSlot) -> ContainerResult<R>,
    ) -> ContainerResult<R> {
        if let Some(txn) = explicit {
            if !txn.is_active() {
                return Err(UsageError::NotActive(txn.state()).into());
            }
            return op(txn.slot());
        }
        if let Some(slot) = self.connection.thread_slot() {
            return op(&slot);
        }

        let mut txn = self.connection.transaction(mode)?;
        match op(txn.slot()) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback() {
                    log::warn!("rollback of scoped transaction on {} failed: {rollback}", self.name);
                }
                Err(err)
            }
        }
    }
}

pub(crate) fn raw_get<O, R>(
    table: &impl ReadableTable<O, &'static [u8]>,
    key: &[u8],
    decode: impl FnOnce(&[u8]) -> ContainerResult<R>,
) -> ContainerResult<Option<R>>
where
    O: KeyOrder,
{
    match table.get(key).engine("get")? {
        Some(guard) => decode(guard.value()).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn raw_contains<O: KeyOrder>(
    table: &impl ReadableTable<O, &'static [u8]>,
    key: &[u8],
) -> ContainerResult<bool> {
    Ok(table.get(key).engine("get")?.is_some())
}

pub(crate) fn raw_len(table: &impl ReadableTableMetadata) -> ContainerResult<u64> {
    table.len().engine("stat table")
}

/// Visits every entry in key order.
pub(crate) fn raw_scan<O: KeyOrder>(
    table: &impl ReadableTable<O, &'static [u8]>,
    mut visit: impl FnMut(&[u8], &[u8]) -> ContainerResult<()>,
) -> ContainerResult<()> {
    for entry in table.iter().engine("open cursor")? {
        let (key, value) = entry.engine("cursor next")?;
        visit(key.value(), value.value())?;
    }
    Ok(())
}

pub(crate) fn raw_put<O: KeyOrder>(
    table: &mut Table<'_, O, &'static [u8]>,
    key: &[u8],
    value: &[u8],
) -> ContainerResult<()> {
    table.insert(key, value).engine("put")?;
    Ok(())
}

/// Stores `value` only when `key` is absent; returns whether it was stored.
pub(crate) fn raw_put_absent<O: KeyOrder>(
    table: &mut Table<'_, O, &'static [u8]>,
    key: &[u8],
    value: &[u8],
) -> ContainerResult<bool> {
    if raw_contains(&*table, key)? {
        return Ok(false);
    }
    raw_put(table, key, value)?;
    Ok(true)
}

pub(crate) fn raw_remove<O: KeyOrder>(
    table: &mut Table<'_, O, &'static [u8]>,
    key: &[u8],
) -> ContainerResult<bool> {
    Ok(table.remove(key).engine("del")?.is_some())
}

/// Deletes every stored key for which `keep` is false.
pub(crate) fn raw_prune<O: KeyOrder>(
    table: &mut Table<'_, O, &'static [u8]>,
    keep: impl Fn(&[u8]) -> bool,
) -> ContainerResult<usize> {
    let mut stale = Vec::new();
    raw_scan(&*table, |key, _| {
        if !keep(key) {
            stale.push(key.to_vec());
        }
        Ok(())
    })?;
    for key in &stale {
        raw_remove(table, key)?;
    }
    Ok(stale.len())
}
