//! Ordered set of keys.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use redb::TableDefinition;

use super::{
    TableCore, TableIter, raw_contains, raw_len, raw_prune, raw_put, raw_put_absent, raw_remove,
    raw_scan, read_table,
};
use crate::codec::{KeyCodec, Scratch};
use crate::connection::Connection;
use crate::error::{ContainerResult, EngineContext};
use crate::transaction::{Transaction, TransactionMode};

const PRESENT: &[u8] = &[];

/// A set of `K`, stored as keys with empty values.
pub struct KeyTable<K> {
    core: TableCore,
    _marker: PhantomData<fn() -> K>,
}

impl<K: KeyCodec> KeyTable<K> {
    pub fn new(connection: &Arc<Connection>, name: &str) -> ContainerResult<Self> {
        let core = TableCore::open(connection, name, |txn, name| {
            txn.open_table(Self::definition_for(name))
                .engine("create table")?;
            Ok(())
        })?;
        Ok(Self {
            core,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    fn definition_for(name: &str) -> TableDefinition<'_, K::Order, &'static [u8]> {
        TableDefinition::new(name)
    }

    fn definition(&self) -> TableDefinition<'_, K::Order, &'static [u8]> {
        Self::definition_for(self.core.name())
    }

    /// Adds `key`; returns false when it was already present.
    pub fn insert(&self, key: &K) -> ContainerResult<bool> {
        self.insert_with(key, None)
    }

    pub fn insert_in(&self, key: &K, txn: &Transaction) -> ContainerResult<bool> {
        self.insert_with(key, Some(txn))
    }

    pub fn contains(&self, key: &K) -> ContainerResult<bool> {
        self.contains_with(key, None)
    }

    pub fn contains_in(&self, key: &K, txn: &Transaction) -> ContainerResult<bool> {
        self.contains_with(key, Some(txn))
    }

    /// Removes `key`; returns whether it was present.
    pub fn erase(&self, key: &K) -> ContainerResult<bool> {
        self.erase_with(key, None)
    }

    pub fn erase_in(&self, key: &K, txn: &Transaction) -> ContainerResult<bool> {
        self.erase_with(key, Some(txn))
    }

    pub fn count(&self) -> ContainerResult<u64> {
        self.count_with(None)
    }

    pub fn count_in(&self, txn: &Transaction) -> ContainerResult<u64> {
        self.count_with(Some(txn))
    }

    pub fn is_empty(&self) -> ContainerResult<bool> {
        Ok(self.count()? == 0)
    }

    pub fn is_empty_in(&self, txn: &Transaction) -> ContainerResult<bool> {
        Ok(self.count_in(txn)? == 0)
    }

    pub fn clear(&self) -> ContainerResult<()> {
        self.clear_with(None)
    }

    pub fn clear_in(&self, txn: &Transaction) -> ContainerResult<()> {
        self.clear_with(Some(txn))
    }

    /// All keys in table order.
    pub fn iter(&self) -> ContainerResult<TableIter<K>> {
        self.iter_with(None)
    }

    pub fn iter_in(&self, txn: &Transaction) -> ContainerResult<TableIter<K>> {
        self.iter_with(Some(txn))
    }

    pub fn keys<C: FromIterator<K>>(&self) -> ContainerResult<C> {
        Ok(self.iter()?.collect())
    }

    pub fn keys_in<C: FromIterator<K>>(&self, txn: &Transaction) -> ContainerResult<C> {
        Ok(self.iter_in(txn)?.collect())
    }

    /// Makes the stored set equal to `keys`.
    pub fn reconcile<'a, I>(&self, keys: I) -> ContainerResult<()>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        self.reconcile_with(keys, None)
    }

    pub fn reconcile_in<'a, I>(&self, keys: I, txn: &Transaction) -> ContainerResult<()>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        self.reconcile_with(keys, Some(txn))
    }

    fn insert_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            raw_put_absent(&mut table, key, PRESENT)
        })
    }

    fn contains_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            read_table!(engine, open_table(self.definition()), |table| {
                raw_contains(&table, key)
            }, or false)
        })
    }

    fn count_with(&self, txn: Option<&Transaction>) -> ContainerResult<u64> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            read_table!(engine, open_table(self.definition()), |table| raw_len(&table), or 0)
        })
    }

    fn clear_with(&self, txn: Option<&Transaction>) -> ContainerResult<()> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let writer = engine.writer()?;
            writer.delete_table(self.definition()).engine("drop table")?;
            writer
                .open_table(self.definition())
                .engine("create table")?;
            Ok(())
        })
    }

    fn erase_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            raw_remove(&mut table, key)
        })
    }

    fn iter_with(&self, txn: Option<&Transaction>) -> ContainerResult<TableIter<K>> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            read_table!(engine, open_table(self.definition()), |table| {
                let mut keys = Vec::new();
                raw_scan(&table, |key, _| {
                    keys.push(K::decode_key(key)?);
                    Ok(())
                })?;
                Ok(TableIter::new(keys))
            }, or TableIter::empty())
        })
    }

    fn reconcile_with<'a, I>(&self, keys: I, txn: Option<&Transaction>) -> ContainerResult<()>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            let mut scratch = Scratch::new();
            let mut keep = HashSet::new();
            for key in keys {
                let key = key.encode_key(&mut scratch);
                raw_put(&mut table, key, PRESENT)?;
                keep.insert(key.to_vec());
            }
            raw_prune(&mut table, |key| keep.contains(key))?;
            Ok(())
        })
    }
}
