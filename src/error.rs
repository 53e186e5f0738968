use thiserror::Error;

use crate::transaction::TransactionState;

pub type ContainerResult<T> = Result<T, ContainerError>;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("{operation} failed: {source}")]
    Engine {
        operation: &'static str,
        #[source]
        source: EngineError,
    },
    #[error(transparent)]
    DataFormat(#[from] CodecError),
    #[error("stored value cannot be read as {requested}: {reason}")]
    TypeMismatch {
        requested: &'static str,
        reason: String,
    },
    #[error("key not found")]
    KeyNotFound,
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    pub(crate) fn engine(operation: &'static str, source: impl Into<EngineError>) -> Self {
        ContainerError::Engine {
            operation,
            source: source.into(),
        }
    }

    /// True for a [`ContainerError::Usage`] carrying `expected`.
    pub fn is_usage(&self, expected: UsageError) -> bool {
        matches!(self, ContainerError::Usage(err) if *err == expected)
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    DatabaseError(#[from] redb::DatabaseError),
    #[error(transparent)]
    TransactionError(#[from] redb::TransactionError),
    #[error(transparent)]
    TableError(#[from] redb::TableError),
    #[error(transparent)]
    CommitError(#[from] redb::CommitError),
    #[error(transparent)]
    StorageError(#[from] redb::StorageError),
    #[error(transparent)]
    SetDurabilityError(#[from] redb::SetDurabilityError),
    #[error("all {0} reader slots are in use")]
    ReadersFull(usize),
    #[error("named table limit of {0} reached")]
    TablesFull(usize),
    #[error("environment is opened read-only")]
    ReadOnly,
}

/// Programming errors: the call sequence itself is wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("this thread already has an open transaction")]
    TransactionAlreadyOpen,
    #[error("this thread has no open transaction")]
    NoOpenTransaction,
    #[error("transaction is {0}, expected active")]
    NotActive(TransactionState),
    #[error("write operation attempted inside a read-only transaction")]
    ReadOnlyTransaction,
    #[error("connection has no configuration")]
    NotConfigured,
    #[error("connection is not connected")]
    NotConnected,
    #[error("connection is already connected")]
    AlreadyConnected,
}

/// Decode-time invariant violations, plus encoder failures of delegated codecs.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("{len} bytes is not a multiple of the element size {element_size}")]
    ElementSize { len: usize, element_size: usize },
    #[error("length prefix at offset {offset} is truncated")]
    TruncatedPrefix { offset: usize },
    #[error("span of {len} bytes at offset {offset} runs past the end of the buffer")]
    SpanOverrun { offset: usize, len: usize },
    #[error(transparent)]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("{trailing} trailing bytes after decoding")]
    TrailingBytes { trailing: usize },
    #[error("value {value} does not fit in {target}")]
    OutOfRange { value: u64, target: &'static str },
    #[error(transparent)]
    Decode(#[from] bincode::error::DecodeError),
    #[error(transparent)]
    Encode(#[from] bincode::error::EncodeError),
    #[error("{0}")]
    Custom(String),
}

/// Attaches the failing engine operation to a redb error.
pub(crate) trait EngineContext<T> {
    fn engine(self, operation: &'static str) -> ContainerResult<T>;
}

impl<T, E> EngineContext<T> for Result<T, E>
where
    E: Into<EngineError>,
{
    fn engine(self, operation: &'static str) -> ContainerResult<T> {
        self.map_err(|err| ContainerError::engine(operation, err))
    }
}

macro_rules! impl_from_engine {
    ($($err:ty),*) => {
        $(
            impl From<$err> for ContainerError {
                fn from(err: $err) -> Self {
                    ContainerError::engine("storage engine", err)
                }
            }
        )*
    };
}

impl_from_engine!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::CommitError,
    redb::StorageError
);
