//! Notifications delivered to channels by their node.

use std::fmt;

/// Inbound channel notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMessage {
    /// Drop all elements and refill with defaults. Ignored while locked.
    Reinitialize,
    /// A sibling's size may have changed; re-run validation.
    SizeChanged,
    /// Some attribute changed; only bumps the dirty count.
    Changed,
}

impl fmt::Display for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelMessage::Reinitialize => "reinitialize",
            ChannelMessage::SizeChanged => "size-changed",
            ChannelMessage::Changed => "changed",
        };
        f.write_str(s)
    }
}
