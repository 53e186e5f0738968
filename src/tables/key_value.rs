//! Typed map from keys to values.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use redb::TableDefinition;

use super::{
    TableCore, TableIter, raw_contains, raw_get, raw_len, raw_prune, raw_put, raw_put_absent,
    raw_remove, raw_scan, read_table,
};
use crate::codec::{KeyCodec, Scratch, ValueCodec};
use crate::config::Config;
use crate::connection::Connection;
use crate::error::{ContainerError, ContainerResult, EngineContext};
use crate::transaction::{Transaction, TransactionMode};

/// Ordered map from `K` to `V` stored in one named table.
///
/// The key type selects the table's order: integer and float keys sort
/// numerically, text and byte keys lexicographically.
///
/// # Examples
///
/// ```no_run
/// use std::collections::BTreeMap;
/// use redb_containers::{Config, Connection, KeyValueTable};
///
/// # fn main() -> redb_containers::ContainerResult<()> {
/// let conn = Connection::create(Config::new("./inventory.redb"))?;
/// let stock: KeyValueTable<String, u32> = KeyValueTable::new(&conn, "stock")?;
///
/// stock.insert_or_assign(&"apples".to_string(), &12)?;
/// assert!(!stock.insert(&"apples".to_string(), &99)?);
/// assert_eq!(stock.find(&"apples".to_string())?, Some(12));
///
/// let wanted = BTreeMap::from([("pears".to_string(), 3)]);
/// stock.reconcile(&wanted)?;
/// assert_eq!(stock.retrieve_all::<BTreeMap<_, _>>()?, wanted);
/// # Ok(())
/// # }
/// ```
pub struct KeyValueTable<K, V> {
    core: TableCore,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> KeyValueTable<K, V>
where
    K: KeyCodec,
    V: ValueCodec,
{
    /// Binds the named table, creating it when the environment is writable.
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

    /// Connects with `config` and binds the named table on that connection.
    pub fn open(config: Config, name: &str) -> ContainerResult<Self> {
        let connection = Connection::create(config)?;
        Self::new(&connection, name)
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        self.core.connection()
    }

    fn definition_for(name: &str) -> TableDefinition<'_, K::Order, &'static [u8]> {
        TableDefinition::new(name)
    }

    fn definition(&self) -> TableDefinition<'_, K::Order, &'static [u8]> {
        Self::definition_for(self.core.name())
    }

    /// The value under `key`, or `None` when absent.
    pub fn find(&self, key: &K) -> ContainerResult<Option<V>> {
        self.find_with(key, None)
    }

    pub fn find_in(&self, key: &K, txn: &Transaction) -> ContainerResult<Option<V>> {
        self.find_with(key, Some(txn))
    }

    /// The value under `key`; a missing key is [`ContainerError::KeyNotFound`].
    pub fn at(&self, key: &K) -> ContainerResult<V> {
        self.find(key)?.ok_or(ContainerError::KeyNotFound)
    }

    pub fn at_in(&self, key: &K, txn: &Transaction) -> ContainerResult<V> {
        self.find_in(key, txn)?.ok_or(ContainerError::KeyNotFound)
    }

    /// Writes the value under `key` into `value`; returns false, leaving
    /// `value` untouched, when the key is absent.
    pub fn try_get(&self, key: &K, value: &mut V) -> ContainerResult<bool> {
        Ok(Self::store_found(self.find(key)?, value))
    }

    pub fn try_get_in(&self, key: &K, value: &mut V, txn: &Transaction) -> ContainerResult<bool> {
        Ok(Self::store_found(self.find_in(key, txn)?, value))
    }

    fn store_found(found: Option<V>, value: &mut V) -> bool {
        match found {
            Some(found) => {
                *value = found;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: &K) -> ContainerResult<bool> {
        self.contains_with(key, None)
    }

    pub fn contains_in(&self, key: &K, txn: &Transaction) -> ContainerResult<bool> {
        self.contains_with(key, Some(txn))
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

    /// Stores `value` unless `key` already exists; returns whether it stored.
    pub fn insert(&self, key: &K, value: &V) -> ContainerResult<bool> {
        self.insert_with(key, value, None)
    }

    pub fn insert_in(&self, key: &K, value: &V, txn: &Transaction) -> ContainerResult<bool> {
        self.insert_with(key, value, Some(txn))
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert_or_assign(&self, key: &K, value: &V) -> ContainerResult<()> {
        self.assign_with(key, value, None)
    }

    pub fn insert_or_assign_in(&self, key: &K, value: &V, txn: &Transaction) -> ContainerResult<()> {
        self.assign_with(key, value, Some(txn))
    }

    /// Removes `key`; returns whether it was present.
    pub fn erase(&self, key: &K) -> ContainerResult<bool> {
        self.erase_with(key, None)
    }

    pub fn erase_in(&self, key: &K, txn: &Transaction) -> ContainerResult<bool> {
        self.erase_with(key, Some(txn))
    }

    /// Removes every entry.
    pub fn clear(&self) -> ContainerResult<()> {
        self.clear_with(None)
    }

    pub fn clear_in(&self, txn: &Transaction) -> ContainerResult<()> {
        self.clear_with(Some(txn))
    }

    /// Upserts every pair, leaving other stored keys untouched.
    pub fn append<'a, I>(&self, entries: I) -> ContainerResult<()>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        self.append_with(entries, None)
    }

    pub fn append_in<'a, I>(&self, entries: I, txn: &Transaction) -> ContainerResult<()>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        self.append_with(entries, Some(txn))
    }

    /// Makes the stored entries equal to `entries`.
    ///
    /// Every pair is upserted, then every stored key not among them is
    /// deleted, all in one transaction.
    pub fn reconcile<'a, I>(&self, entries: I) -> ContainerResult<()>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        self.reconcile_with(entries, None)
    }

    pub fn reconcile_in<'a, I>(&self, entries: I, txn: &Transaction) -> ContainerResult<()>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        self.reconcile_with(entries, Some(txn))
    }

    /// All entries in key order.
    pub fn iter(&self) -> ContainerResult<TableIter<(K, V)>> {
        self.iter_with(None)
    }

    pub fn iter_in(&self, txn: &Transaction) -> ContainerResult<TableIter<(K, V)>> {
        self.iter_with(Some(txn))
    }

    pub fn keys(&self) -> ContainerResult<Vec<K>> {
        Ok(self.iter()?.map(|(key, _)| key).collect())
    }

    pub fn keys_in(&self, txn: &Transaction) -> ContainerResult<Vec<K>> {
        Ok(self.iter_in(txn)?.map(|(key, _)| key).collect())
    }

    /// Collects all entries into any collection, e.g. a `BTreeMap`.
    pub fn retrieve_all<C>(&self) -> ContainerResult<C>
    where
        C: FromIterator<(K, V)>,
    {
        Ok(self.iter()?.collect())
    }

    pub fn retrieve_all_in<C>(&self, txn: &Transaction) -> ContainerResult<C>
    where
        C: FromIterator<(K, V)>,
    {
        Ok(self.iter_in(txn)?.collect())
    }

    /// Extends `target` with all entries.
    pub fn load_into<C>(&self, target: &mut C) -> ContainerResult<()>
    where
        C: Extend<(K, V)>,
    {
        target.extend(self.iter()?);
        Ok(())
    }

    pub fn load_into_in<C>(&self, target: &mut C, txn: &Transaction) -> ContainerResult<()>
    where
        C: Extend<(K, V)>,
    {
        target.extend(self.iter_in(txn)?);
        Ok(())
    }

    fn find_with(&self, key: &K, txn: Option<&Transaction>) -> ContainerResult<Option<V>> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            read_table!(engine, open_table(self.definition()), |table| {
                raw_get(&table, key, |bytes| Ok(V::decode_value(bytes)?))
            }, or None)
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
            read_table!(engine, open_table(self.definition()), |table| {
                raw_len(&table)
            }, or 0)
        })
    }

    fn insert_with(&self, key: &K, value: &V, txn: Option<&Transaction>) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let (mut ks, mut vs) = (Scratch::new(), Scratch::new());
            let key = key.encode_key(&mut ks);
            let value = value.encode_value(&mut vs)?;
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            raw_put_absent(&mut table, key, value)
        })
    }

    fn assign_with(&self, key: &K, value: &V, txn: Option<&Transaction>) -> ContainerResult<()> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let (mut ks, mut vs) = (Scratch::new(), Scratch::new());
            let key = key.encode_key(&mut ks);
            let value = value.encode_value(&mut vs)?;
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            raw_put(&mut table, key, value)
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

    fn append_with<'a, I>(&self, entries: I, txn: Option<&Transaction>) -> ContainerResult<()>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            let (mut ks, mut vs) = (Scratch::new(), Scratch::new());
            for (key, value) in entries {
                raw_put(
                    &mut table,
                    key.encode_key(&mut ks),
                    value.encode_value(&mut vs)?,
                )?;
            }
            Ok(())
        })
    }

    fn reconcile_with<'a, I>(&self, entries: I, txn: Option<&Transaction>) -> ContainerResult<()>
    where
        I: IntoIterator<Item = (&'a K, &'a V)>,
        K: 'a,
        V: 'a,
    {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            let (mut ks, mut vs) = (Scratch::new(), Scratch::new());
            let mut keep = HashSet::new();
            for (key, value) in entries {
                let key = key.encode_key(&mut ks);
                raw_put(&mut table, key, value.encode_value(&mut vs)?)?;
                keep.insert(key.to_vec());
            }
            let removed = raw_prune(&mut table, |key| keep.contains(key))?;
            log::trace!(
                "reconciled {}: {} kept, {} removed",
                self.core.name(),
                keep.len(),
                removed
            );
            Ok(())
        })
    }

    fn iter_with(&self, txn: Option<&Transaction>) -> ContainerResult<TableIter<(K, V)>> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            read_table!(engine, open_table(self.definition()), |table| {
                let mut items = Vec::new();
                raw_scan(&table, |key, value| {
                    items.push((K::decode_key(key)?, V::decode_value(value)?));
                    Ok(())
                })?;
                Ok(TableIter::new(items))
            }, or TableIter::empty())
        })
    }
}
