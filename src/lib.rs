//! channel-store - typed channel storage engine
//!
//! Runtime-typed, resizable, multi-frame element storage grouped into
//! nodes. Channels reference each other by name, propagate size changes by
//! broadcast, and track a dirty count for cache invalidation.

// Storage
pub mod alloc;
pub mod dynamic_array;
pub mod element;

// Channels
pub mod address;
pub mod channel;
pub mod node;

// I/O and configuration
pub mod cli;
pub mod config;
pub mod error;
pub mod persist;
pub mod snapshot;

// Re-export commonly used types
pub use address::Address;
pub use channel::{Attribute, Channel, ChannelMessage, ChannelState, Mode, UpdateMode};
pub use config::ElementDefaults;
pub use element::{ChannelValue, Element, ElementType};
pub use error::{ChannelError, PersistError};
pub use node::{ChannelMut, Node};
pub use snapshot::NodeSnapshot;
