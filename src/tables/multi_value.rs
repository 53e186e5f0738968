//! Keys holding several values.

use std::marker::PhantomData;
use std::sync::Arc;

use redb::{MultimapTable, MultimapTableDefinition, ReadableMultimapTable};

use super::{TableCore, TableIter, raw_len, read_table};
use crate::codec::{KeyCodec, KeyOrder, Scratch, ValueCodec};
use crate::connection::Connection;
use crate::error::{ContainerResult, EngineContext};
use crate::transaction::{Transaction, TransactionMode};

/// Multimap from `K` to a set of `V`.
///
/// Values under one key are kept in the byte order of their encoding and a
/// given (key, value) pair is stored at most once.
pub struct KeyMultiValueTable<K, V> {
    core: TableCore,
    _marker: PhantomData<fn() -> (K, V)>,
}

fn scan_values<O: KeyOrder>(
    table: &impl ReadableMultimapTable<O, &'static [u8]>,
    key: &[u8],
    mut visit: impl FnMut(&[u8]) -> ContainerResult<bool>,
) -> ContainerResult<()> {
    for value in table.get(key).engine("get")? {
        if !visit(value.engine("cursor next")?.value())? {
            break;
        }
    }
    Ok(())
}

/// Visits every (key, value) pair in key order.
fn scan_pairs<O: KeyOrder>(
    table: &impl ReadableMultimapTable<O, &'static [u8]>,
    mut visit: impl FnMut(&[u8], &[u8]) -> ContainerResult<()>,
) -> ContainerResult<()> {
    for entry in table.iter().engine("open cursor")? {
        let (key, values) = entry.engine("cursor next")?;
        for value in values {
            visit(key.value(), value.engine("cursor next")?.value())?;
        }
    }
    Ok(())
}

/// Returns true when the pair was not stored before.
fn put_pair<O: KeyOrder>(
    table: &mut MultimapTable<'_, O, &'static [u8]>,
    key: &[u8],
    value: &[u8],
) -> ContainerResult<bool> {
    let existed = table.insert(key, value).engine("put")?;
    Ok(!existed)
}

fn remove_pair<O: KeyOrder>(
    table: &mut MultimapTable<'_, O, &'static [u8]>,
    key: &[u8],
    value: &[u8],
) -> ContainerResult<bool> {
    table.remove(key, value).engine("del")
}

fn remove_key<O: KeyOrder>(
    table: &mut MultimapTable<'_, O, &'static [u8]>,
    key: &[u8],
) -> ContainerResult<usize> {
    let mut removed = 0;
    for value in table.remove_all(key).engine("del")? {
        value.engine("cursor next")?;
        removed += 1;
    }
    Ok(removed)
}

impl<K, V> KeyMultiValueTable<K, V>
where
    K: KeyCodec,
    V: ValueCodec,
{
    pub fn new(connection: &Arc<Connection>, name: &str) -> ContainerResult<Self> {
        let core = TableCore::open(connection, name, |txn, name| {
            txn.open_multimap_table(Self::definition_for(name))
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

    fn definition_for(name: &str) -> MultimapTableDefinition<'_, K::Order, &'static [u8]> {
        MultimapTableDefinition::new(name)
    }

    fn definition(&self) -> MultimapTableDefinition<'_, K::Order, &'static [u8]> {
        Self::definition_for(self.core.name())
    }

    /// Adds the pair; returns false when it was already stored.
    pub fn insert(&self, key: &K, value: &V) -> ContainerResult<bool> {
        self.insert_with(key, value, None)
    }

    pub fn insert_in(&self, key: &K, value: &V, txn: &Transaction) -> ContainerResult<bool> {
        self.insert_with(key, value, Some(txn))
    }

    /// Values stored under `key`; empty when the key is absent.
    pub fn values(&self, key: &K) -> ContainerResult<Vec<V>> {
        self.values_with(key, None)
    }

    pub fn values_in(&self, key: &K, txn: &Transaction) -> ContainerResult<Vec<V>> {
        self.values_with(key, Some(txn))
    }

    pub fn contains(&self, key: &K) -> ContainerResult<bool> {
        self.contains_with(key, None)
    }

    pub fn contains_in(&self, key: &K, txn: &Transaction) -> ContainerResult<bool> {
        self.contains_with(key, Some(txn))
    }

    pub fn contains_pair(&self, key: &K, value: &V) -> ContainerResult<bool> {
        self.contains_pair_with(key, value, None)
    }

    pub fn contains_pair_in(&self, key: &K, value: &V, txn: &Transaction) -> ContainerResult<bool> {
        self.contains_pair_with(key, value, Some(txn))
    }

    /// Total number of stored (key, value) pairs.
    pub fn count(&self) -> ContainerResult<u64> {
        self.count_with(None)
    }

    pub fn count_in(&self, txn: &Transaction) -> ContainerResult<u64> {
        self.count_with(Some(txn))
    }

    /// Number of values stored under `key`.
    pub fn count_values(&self, key: &K) -> ContainerResult<usize> {
        self.count_values_with(key, None)
    }

    pub fn count_values_in(&self, key: &K, txn: &Transaction) -> ContainerResult<usize> {
        self.count_values_with(key, Some(txn))
    }

    pub fn is_empty(&self) -> ContainerResult<bool> {
        Ok(self.count()? == 0)
    }

    pub fn is_empty_in(&self, txn: &Transaction) -> ContainerResult<bool> {
        Ok(self.count_in(txn)? == 0)
    }

    /// Removes every value under `key`; returns how many were removed.
    pub fn erase(&self, key: &K) -> ContainerResult<usize> {
        self.erase_with(key, None)
    }

    pub fn erase_in(&self, key: &K, txn: &Transaction) -> ContainerResult<usize> {
        self.erase_with(key, Some(txn))
    }

    /// Removes one pair; returns whether it was stored.
    pub fn erase_pair(&self, key: &K, value: &V) -> ContainerResult<bool> {
        self.erase_pair_with(key, value, None)
    }

    pub fn erase_pair_in(&self, key: &K, value: &V, txn: &Transaction) -> ContainerResult<bool> {
        self.erase_pair_with(key, value, Some(txn))
    }

    pub fn clear(&self) -> ContainerResult<()> {
        self.clear_with(None)
    }

    pub fn clear_in(&self, txn: &Transaction) -> ContainerResult<()> {
        self.clear_with(Some(txn))
    }

    /// Every pair, ordered by key and then by encoded value.
    pub fn iter(&self) -> ContainerResult<TableIter<(K, V)>> {
        self.iter_with(None)
    }

    pub fn iter_in(&self, txn: &Transaction) -> ContainerResult<TableIter<(K, V)>> {
        self.iter_with(Some(txn))
    }

    fn insert_with(&self, key: &K, value: &V, txn: Option<&Transaction>) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let (mut ks, mut vs) = (Scratch::new(), Scratch::new());
            let key = key.encode_key(&mut ks);
            let value = value.encode_value(&mut vs)?;
            let mut table = engine
                .writer()?
                .open_multimap_table(self.definition())
                .engine("open table")?;
            put_pair(&mut table, key, value)
        })
    }

    fn values_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<Vec<V>> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            read_table!(engine, open_multimap_table(self.definition()), |table| {
                let mut values = Vec::new();
                scan_values(&table, key, |bytes| {
                    values.push(V::decode_value(bytes)?);
                    Ok(true)
                })?;
                Ok(values)
            }, or Vec::new())
        })
    }

    fn contains_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            read_table!(engine, open_multimap_table(self.definition()), |table| {
                let mut found = false;
                scan_values(&table, key, |_| {
                    found = true;
                    Ok(false)
                })?;
                Ok(found)
            }, or false)
        })
    }

    fn contains_pair_with(
        &self,
        key: &K,
        value: &V,
        txn: Option<&Transaction>,
    ) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            let (mut ks, mut vs) = (Scratch::new(), Scratch::new());
            let key = key.encode_key(&mut ks);
            let wanted = value.encode_value(&mut vs)?;
            read_table!(engine, open_multimap_table(self.definition()), |table| {
                let mut found = false;
                scan_values(&table, key, |stored| {
                    found = stored == wanted;
                    Ok(!found)
                })?;
                Ok(found)
            }, or false)
        })
    }

    fn count_with(&self, txn: Option<&Transaction>) -> ContainerResult<u64> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            read_table!(engine, open_multimap_table(self.definition()), |table| {
                raw_len(&table)
            }, or 0)
        })
    }

    fn count_values_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<usize> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            read_table!(engine, open_multimap_table(self.definition()), |table| {
                let mut count = 0;
                scan_values(&table, key, |_| {
                    count += 1;
                    Ok(true)
                })?;
                Ok(count)
            }, or 0)
        })
    }

    fn erase_pair_with(
        &self,
        key: &K,
        value: &V,
        txn: Option<&Transaction>,
    ) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let (mut ks, mut vs) = (Scratch::new(), Scratch::new());
            let key = key.encode_key(&mut ks);
            let value = value.encode_value(&mut vs)?;
            let mut table = engine
                .writer()?
                .open_multimap_table(self.definition())
                .engine("open table")?;
            remove_pair(&mut table, key, value)
        })
    }

    fn clear_with(&self, txn: Option<&Transaction>) -> ContainerResult<()> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let writer = engine.writer()?;
            writer
                .delete_multimap_table(self.definition())
                .engine("drop table")?;
            writer
                .open_multimap_table(self.definition())
                .engine("create table")?;
            Ok(())
        })
    }

    fn erase_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<usize> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            let mut table = engine
                .writer()?
                .open_multimap_table(self.definition())
                .engine("open table")?;
            remove_key(&mut table, key)
        })
    }

    fn iter_with(&self, txn: Option<&Transaction>) -> ContainerResult<TableIter<(K, V)>> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            read_table!(engine, open_multimap_table(self.definition()), |table| {
                let mut items = Vec::new();
                scan_pairs(&table, |key, value| {
                    items.push((K::decode_key(key)?, V::decode_value(value)?));
                    Ok(())
                })?;
                Ok(TableIter::new(items))
            }, or TableIter::empty())
        })
    }
}
