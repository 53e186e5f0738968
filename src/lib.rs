//! # redb containers
//!
//! Typed, transactional container facades over a [redb] storage file.
//!
//! A [`Connection`] owns one [`Environment`] (the open redb file). Tables are
//! named, typed views on that environment:
//!
//! - [`KeyValueTable`]: ordered map with `find`, `insert`, `reconcile` and friends
//! - [`KeyTable`]: ordered set of keys
//! - [`KeyMultiValueTable`]: several values per key
//! - [`AnyValueTable`]: value type chosen per call, with optional type tags
//!
//! Keys and values are encoded by the [`codec`] traits. Integer and float
//! keys iterate numerically; text and byte keys iterate lexicographically.
//!
//! ## Transactions
//!
//! Every table call runs in exactly one transaction, resolved in this order:
//!
//! 1. an explicit [`Transaction`] passed to a `*_in` method
//! 2. the transaction bound to the calling thread
//! 3. a fresh transaction scoped to the call
//!
//! ```no_run
//! use redb_containers::prelude::*;
//!
//! # fn main() -> ContainerResult<()> {
//! let conn = Connection::create(Config::new("./orders.redb"))?;
//! let orders: KeyValueTable<u64, String> = KeyValueTable::new(&conn, "orders")?;
//! let open: KeyTable<u64> = KeyTable::new(&conn, "open_orders")?;
//!
//! let mut txn = conn.transaction(TransactionMode::Writable)?;
//! orders.insert_or_assign(&7, &"two lamps".to_string())?;
//! open.insert(&7)?;
//! txn.commit()?;
//!
//! assert_eq!(orders.at(&7)?, "two lamps");
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod environment;
pub mod error;
pub mod path;
pub mod prelude;
pub mod registry;
pub mod tables;
pub mod transaction;

pub use codec::{Bitset, Category, Element, KeyCodec, SelfDescribing, ValueCodec};
pub use config::Config;
pub use connection::Connection;
pub use environment::Environment;
pub use error::{CodecError, ContainerError, ContainerResult, EngineError, UsageError};
pub use registry::TransactionRegistry;
pub use tables::{AnyValueTable, KeyMultiValueTable, KeyTable, KeyValueTable, TableIter};
pub use transaction::{Transaction, TransactionMode, TransactionState};
