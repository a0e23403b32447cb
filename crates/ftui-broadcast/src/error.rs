#![forbid(unsafe_code)]

//! Error taxonomy for channel lookup and node updates.

use std::rc::Rc;

/// Errors from broadcast operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// A node received props naming a different channel than the one it was
    /// constructed with.
    ChannelRenamed { expected: Rc<str>, found: Rc<str> },
    /// No ancestor exposes the requested channel.
    MissingChannel { channel: Rc<str> },
    /// The channel exists but carries a different payload type.
    TypeMismatch {
        channel: Rc<str>,
        expected: &'static str,
        found: &'static str,
    },
}

impl BroadcastError {
    /// Name of the channel the error refers to.
    #[must_use]
    pub fn channel(&self) -> &str {
        match self {
            Self::ChannelRenamed { expected, .. } => expected,
            Self::MissingChannel { channel } | Self::TypeMismatch { channel, .. } => channel,
        }
    }
}

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelRenamed { expected, found } => write!(
                f,
                "You cannot change <Broadcast channel> (was '{expected}', got '{found}')"
            ),
            Self::MissingChannel { channel } => write!(f, "no broadcast on channel '{channel}'"),
            Self::TypeMismatch {
                channel,
                expected,
                found,
            } => write!(
                f,
                "channel '{channel}' carries {found}, requested as {expected}"
            ),
        }
    }
}

impl std::error::Error for BroadcastError {}
