//! Keys mapping to values of any codec-supported type.
//!
//! The value type is chosen per call rather than per table, so reading a
//! key back as a different type than it was written with is a caller
//! mistake. With type tags enabled every stored value carries an 8-byte
//! BLAKE3 digest of its Rust type name, which turns such a mistake into a
//! [`ContainerError::TypeMismatch`] instead of a silently reinterpreted value.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use redb::TableDefinition;

use super::{
    TableCore, TableIter, raw_contains, raw_get, raw_len, raw_put, raw_put_absent, raw_remove,
    raw_scan, read_table,
};
use crate::codec::{KeyCodec, Scratch, ValueCodec};
use crate::connection::Connection;
use crate::error::{ContainerError, ContainerResult, EngineContext};
use crate::transaction::{Transaction, TransactionMode};

pub const TYPE_TAG_LEN: usize = 8;

/// The tag written in front of values of type `T`.
pub fn type_tag<T: ?Sized>() -> [u8; TYPE_TAG_LEN] {
    let digest = blake3::hash(type_name::<T>().as_bytes());
    let mut tag = [0u8; TYPE_TAG_LEN];
    tag.copy_from_slice(&digest.as_bytes()[..TYPE_TAG_LEN]);
    tag
}

/// Heterogeneous map from `K` to values whose type is picked per call.
///
/// # Examples
///
/// ```no_run
/// use redb_containers::{AnyValueTable, Config, Connection};
///
/// # fn main() -> redb_containers::ContainerResult<()> {
/// let conn = Connection::create(Config::new("./settings.redb"))?;
/// let settings = AnyValueTable::<String>::with_type_tags(&conn, "settings")?;
///
/// settings.set(&"retries".to_string(), &3u32)?;
/// settings.set(&"motd".to_string(), &"hello".to_string())?;
/// settings.update(&"retries".to_string(), |n: &mut u32| *n += 1, false)?;
///
/// assert_eq!(settings.get::<u32>(&"retries".to_string())?, 4);
/// assert!(settings.get::<String>(&"retries".to_string()).is_err());
/// # Ok(())
/// # }
/// ```
pub struct AnyValueTable<K> {
    core: TableCore,
    type_tags: bool,
    _marker: PhantomData<fn() -> K>,
}

impl<K: KeyCodec> AnyValueTable<K> {
    pub fn new(connection: &Arc<Connection>, name: &str) -> ContainerResult<Self> {
        let core = TableCore::open(connection, name, |txn, name| {
            txn.open_table(Self::definition_for(name))
                .engine("create table")?;
            Ok(())
        })?;
        Ok(Self {
            core,
            type_tags: false,
            _marker: PhantomData,
        })
    }

    /// Like [`AnyValueTable::new`] with type tags switched on.
    pub fn with_type_tags(connection: &Arc<Connection>, name: &str) -> ContainerResult<Self> {
        let mut table = Self::new(connection, name)?;
        table.set_type_tags(true);
        Ok(table)
    }

    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Switches type tagging for subsequent reads and writes.
    ///
    /// Tagged and untagged values must not share a table.
    pub fn set_type_tags(&mut self, enabled: bool) {
        self.type_tags = enabled;
    }

    pub fn type_tags(&self) -> bool {
        self.type_tags
    }

    fn definition_for(name: &str) -> TableDefinition<'_, K::Order, &'static [u8]> {
        TableDefinition::new(name)
    }

    fn definition(&self) -> TableDefinition<'_, K::Order, &'static [u8]> {
        Self::definition_for(self.core.name())
    }

    fn encode<'a, T: ValueCodec>(
        &self,
        value: &'a T,
        payload: &'a mut Scratch,
        tagged: &'a mut Scratch,
    ) -> ContainerResult<&'a [u8]> {
        let bytes = value.encode_value(payload)?;
        if !self.type_tags {
            return Ok(bytes);
        }
        Ok(tagged.build(|buf| {
            buf.extend_from_slice(&type_tag::<T>());
            buf.extend_from_slice(bytes);
        }))
    }

    fn decode<T: ValueCodec>(&self, bytes: &[u8]) -> ContainerResult<T> {
        let payload = if self.type_tags {
            match bytes.split_at_checked(TYPE_TAG_LEN) {
                Some((tag, payload)) if tag == type_tag::<T>() => payload,
                Some(_) => return Err(mismatch::<T>("type tag differs")),
                None => return Err(mismatch::<T>("value is shorter than its type tag")),
            }
        } else {
            bytes
        };
        T::decode_value(payload).map_err(mismatch::<T>)
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set<T: ValueCodec>(&self, key: &K, value: &T) -> ContainerResult<()> {
        self.set_with(key, value, None)
    }

    pub fn set_in<T: ValueCodec>(&self, key: &K, value: &T, txn: &Transaction) -> ContainerResult<()> {
        self.set_with(key, value, Some(txn))
    }

    /// Stores `value` unless `key` exists; returns whether it stored.
    pub fn insert<T: ValueCodec>(&self, key: &K, value: &T) -> ContainerResult<bool> {
        self.insert_with(key, value, None)
    }

    pub fn insert_in<T: ValueCodec>(
        &self,
        key: &K,
        value: &T,
        txn: &Transaction,
    ) -> ContainerResult<bool> {
        self.insert_with(key, value, Some(txn))
    }

    /// The value under `key` read as `T`, or `None` when the key is absent.
    pub fn find<T: ValueCodec>(&self, key: &K) -> ContainerResult<Option<T>> {
        self.find_with(key, None)
    }

    pub fn find_in<T: ValueCodec>(&self, key: &K, txn: &Transaction) -> ContainerResult<Option<T>> {
        self.find_with(key, Some(txn))
    }

    pub fn get<T: ValueCodec>(&self, key: &K) -> ContainerResult<T> {
        self.find(key)?.ok_or(ContainerError::KeyNotFound)
    }

    pub fn get_in<T: ValueCodec>(&self, key: &K, txn: &Transaction) -> ContainerResult<T> {
        self.find_in(key, txn)?.ok_or(ContainerError::KeyNotFound)
    }

    /// The value under `key`, or `default` when the key is absent.
    ///
    /// A stored value that does not decode as `T` is still an error.
    pub fn get_or<T: ValueCodec>(&self, key: &K, default: T) -> ContainerResult<T> {
        Ok(self.find(key)?.unwrap_or(default))
    }

    pub fn get_or_in<T: ValueCodec>(
        &self,
        key: &K,
        default: T,
        txn: &Transaction,
    ) -> ContainerResult<T> {
        Ok(self.find_in(key, txn)?.unwrap_or(default))
    }

    /// Reads, modifies and writes back the value under `key` atomically.
    ///
    /// A missing key starts from `T::default()` when `create_if_missing` is
    /// set and is otherwise left alone. Returns whether a value was written.
    pub fn update<T, F>(&self, key: &K, modify: F, create_if_missing: bool) -> ContainerResult<bool>
    where
        T: ValueCodec + Default,
        F: FnOnce(&mut T),
    {
        self.update_with(key, modify, create_if_missing, None)
    }

    pub fn update_in<T, F>(
        &self,
        key: &K,
        modify: F,
        create_if_missing: bool,
        txn: &Transaction,
    ) -> ContainerResult<bool>
    where
        T: ValueCodec + Default,
        F: FnOnce(&mut T),
    {
        self.update_with(key, modify, create_if_missing, Some(txn))
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

    /// Removes `key`; returns whether it was present.
    pub fn erase(&self, key: &K) -> ContainerResult<bool> {
        self.erase_with(key, None)
    }

    pub fn erase_in(&self, key: &K, txn: &Transaction) -> ContainerResult<bool> {
        self.erase_with(key, Some(txn))
    }

    /// Every stored key in table order.
    pub fn keys(&self) -> ContainerResult<TableIter<K>> {
        self.keys_with(None)
    }

    pub fn keys_in(&self, txn: &Transaction) -> ContainerResult<TableIter<K>> {
        self.keys_with(Some(txn))
    }

    fn insert_with<T: ValueCodec>(
        &self,
        key: &K,
        value: &T,
        txn: Option<&Transaction>,
    ) -> ContainerResult<bool> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let (mut ks, mut vs, mut ts) = (Scratch::new(), Scratch::new(), Scratch::new());
            let key = key.encode_key(&mut ks);
            let value = self.encode(value, &mut vs, &mut ts)?;
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            raw_put_absent(&mut table, key, value)
        })
    }

    fn update_with<T, F>(
        &self,
        key: &K,
        modify: F,
        create_if_missing: bool,
        txn: Option<&Transaction>,
    ) -> ContainerResult<bool>
    where
        T: ValueCodec + Default,
        F: FnOnce(&mut T),
    {
        // `modify` runs between the two engine steps, outside the slot lock.
        self.core.run_scoped(txn, TransactionMode::Writable, |slot| {
            let mut ks = Scratch::new();
            let key = key.encode_key(&mut ks);
            let current = slot.with_engine(|engine| {
                let table = engine
                    .writer()?
                    .open_table(self.definition())
                    .engine("open table")?;
                raw_get(&table, key, |bytes| self.decode::<T>(bytes))
            })?;
            let mut value = match current {
                Some(value) => value,
                None if create_if_missing => T::default(),
                None => return Ok(false),
            };
            modify(&mut value);
            slot.with_engine(|engine| {
                let (mut vs, mut ts) = (Scratch::new(), Scratch::new());
                let bytes = self.encode(&value, &mut vs, &mut ts)?;
                let mut table = engine
                    .writer()?
                    .open_table(self.definition())
                    .engine("open table")?;
                raw_put(&mut table, key, bytes)
            })?;
            Ok(true)
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

    fn keys_with(&self, txn: Option<&Transaction>) -> ContainerResult<TableIter<K>> {
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

    fn set_with<T: ValueCodec>(
        &self,
        key: &K,
        value: &T,
        txn: Option<&Transaction>,
    ) -> ContainerResult<()> {
        self.core.run(txn, TransactionMode::Writable, |engine| {
            let (mut ks, mut vs, mut ts) = (Scratch::new(), Scratch::new(), Scratch::new());
            let key = key.encode_key(&mut ks);
            let value = self.encode(value, &mut vs, &mut ts)?;
            let mut table = engine
                .writer()?
                .open_table(self.definition())
                .engine("open table")?;
            raw_put(&mut table, key, value)
        })
    }

    fn find_with<T: ValueCodec>(
        &self,
        key: &K,
        txn: Option<&Transaction>,
    ) -> ContainerResult<Option<T>> {
        self.core.run(txn, TransactionMode::ReadOnly, |engine| {
            let mut scratch = Scratch::new();
            let key = key.encode_key(&mut scratch);
            read_table!(engine, open_table(self.definition()), |table| {
                raw_get(&table, key, |bytes| self.decode::<T>(bytes))
            }, or None)
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
}

fn mismatch<T>(reason: impl ToString) -> ContainerError {
    ContainerError::TypeMismatch {
        requested: type_name::<T>(),
        reason: reason.to_string(),
    }
}
