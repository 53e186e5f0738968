//! Commonly used types in one import.
//!
//! ```rust
//! use redb_containers::prelude::*;
//! ```

pub use crate::codec::{Bitset, Element, KeyCodec, SelfDescribing, ValueCodec};
pub use crate::config::Config;
pub use crate::connection::Connection;
pub use crate::error::{ContainerError, ContainerResult, UsageError};
pub use crate::tables::{AnyValueTable, KeyMultiValueTable, KeyTable, KeyValueTable, TableIter};
pub use crate::transaction::{Transaction, TransactionMode};
pub use crate::value_codec;
