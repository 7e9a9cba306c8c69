//! Error types for channel operations.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::element::ElementType;

/// Errors returned by channel mutators and lookups.
///
/// Recoverable channel conditions (missing reference, failed allocation,
/// unknown type) are reported through [`ChannelState`](crate::channel::ChannelState),
/// not through this type.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The channel is locked and rejects writes.
    #[error("channel is locked")]
    Locked,

    /// Only permanent channels can be locked.
    #[error("only permanent channels can be locked")]
    NotPermanent,

    /// The frame is driven by the execution pass.
    #[error("frame is synchronised with the execution pass")]
    FrameSynced,

    /// Element address outside `[0, count) x [0, item_length)`.
    #[error("invalid element address {levels:?} (count {count}, item length {item_length})")]
    InvalidAddress {
        /// Address levels as given by the caller.
        levels: Vec<i32>,
        count: usize,
        item_length: usize,
    },

    /// Flat storage index outside the allocated range.
    #[error("element index {index} out of range ({len} elements)")]
    OutOfRange { index: usize, len: usize },

    /// Value cannot be translated to the channel's type.
    #[error("cannot store {value} in a {channel} channel")]
    TypeMismatch {
        value: ElementType,
        channel: ElementType,
    },

    /// No channel with that name or id on the node.
    #[error("channel not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Failure of a [`DynamicArray`](crate::dynamic_array::DynamicArray) resize.
#[derive(Debug, Error)]
pub enum ResizeError {
    /// Resized with a different type while elements are still alive.
    #[error("array holds {live} elements, cannot resize as {requested}")]
    TypeMismatch {
        live: ElementType,
        requested: ElementType,
    },

    /// Byte size does not fit in `usize`.
    #[error("requested size overflows")]
    CapacityOverflow,

    /// The allocator refused to grow the buffer.
    #[error("allocation failed: {0}")]
    Alloc(#[from] TryReserveError),
}

/// Failure while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a channel file")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Elements of an unknown type code have no encoding.
    #[error("no element encoding for type code {0}")]
    UnsupportedType(i32),

    /// Negative or oversized field.
    #[error("field {field} out of range: {value}")]
    Overflow { field: &'static str, value: i64 },
}
