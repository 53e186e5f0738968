//! The open redb database plus the limits this crate enforces on top of it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use redb::{Builder, Database, Durability, ReadTransaction, ReadableDatabase, WriteTransaction};

use crate::config::Config;
use crate::error::{ContainerError, ContainerResult, EngineContext, EngineError};
use crate::path;

/// One open storage file, shared by every table and transaction built on it.
#[derive(Debug)]
pub struct Environment {
    db: Database,
    file: PathBuf,
    read_only: bool,
    sync_durable: bool,
    max_readers: usize,
    readers: Arc<AtomicUsize>,
    max_tables: usize,
    tables: Mutex<HashSet<String>>,
}

impl Environment {
    /// Validates `config`, resolves its path and opens (or creates) the file.
    pub fn open(config: &Config) -> ContainerResult<Self> {
        config.validate()?;
        let file = path::database_file(config)?;

        let mut builder = Builder::new();
        if let Some(bytes) = config.cache_size {
            builder.set_cache_size(bytes);
        }

        let db = if config.read_only {
            builder.open(&file).engine("open environment")?
        } else {
            path::create_parent_dirs(&file)?;
            builder.create(&file).engine("create environment")?
        };

        log::debug!(
            "opened environment {} (read_only: {}, max_readers: {}, max_dbs: {})",
            file.display(),
            config.read_only,
            config.effective_max_readers(),
            config.max_dbs
        );

        Ok(Self {
            db,
            file,
            read_only: config.read_only,
            sync_durable: config.sync_durable,
            max_readers: config.effective_max_readers(),
            readers: Arc::new(AtomicUsize::new(0)),
            max_tables: config.max_dbs as usize,
            tables: Mutex::new(HashSet::new()),
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Read transactions currently holding a slot.
    pub fn active_readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }

    pub(crate) fn begin_read(&self) -> ContainerResult<(ReadTransaction, ReaderSlot)> {
        let slot = ReaderSlot::acquire(&self.readers, self.max_readers)?;
        let txn = self.db.begin_read().engine("begin read transaction")?;
        Ok((txn, slot))
    }

    pub(crate) fn begin_write(&self) -> ContainerResult<WriteTransaction> {
        if self.read_only {
            return Err(ContainerError::engine(
                "begin write transaction",
                EngineError::ReadOnly,
            ));
        }
        let mut txn = self.db.begin_write().engine("begin write transaction")?;
        let durability = if self.sync_durable {
            Durability::Immediate
        } else {
            Durability::None
        };
        txn.set_durability(durability).engine("set durability")?;
        Ok(txn)
    }

    /// Records `name` as a named table, enforcing `max_dbs`.
    pub(crate) fn register_table(&self, name: &str) -> ContainerResult<()> {
        let mut tables = self.tables.lock();
        if tables.contains(name) {
            return Ok(());
        }
        if tables.len() >= self.max_tables {
            return Err(ContainerError::engine(
                "open table",
                EngineError::TablesFull(self.max_tables),
            ));
        }
        tables.insert(name.to_owned());
        log::debug!("registered table {name} in {}", self.file.display());
        Ok(())
    }
}

/// A claimed reader slot, released on drop.
pub(crate) struct ReaderSlot {
    readers: Arc<AtomicUsize>,
}

impl ReaderSlot {
    fn acquire(readers: &Arc<AtomicUsize>, max: usize) -> ContainerResult<Self> {
        readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < max).then_some(active + 1)
            })
            .map_err(|_| {
                ContainerError::engine("begin read transaction", EngineError::ReadersFull(max))
            })?;
        Ok(Self {
            readers: Arc::clone(readers),
        })
    }
}

impl Drop for ReaderSlot {
    fn drop(&mut self) {
        self.readers.fetch_sub(1, Ordering::AcqRel);
    }
}
