#![forbid(unsafe_code)]

//! Inherited channel lookup table.
//!
//! A [`ChannelMap`] is the environment a broadcast node hands to its
//! descendants: channel name → channel handle. Maps are immutable and cheap to
//! clone; a node derives a new map with [`ChannelMap::with_channel`] instead
//! of editing the one it inherited.
//!
//! Channels on one map may carry different payload types, so entries are
//! stored type-erased and checked on lookup.
//!
//! # Usage
//!
//! ```
//! use ftui_broadcast::{Broadcast, ChannelMap};
//!
//! let theme = Broadcast::new("light");
//! let map = ChannelMap::new().with_channel("theme", &theme);
//!
//! let found = map.lookup::<&str>("theme").unwrap();
//! assert!(found.ptr_eq(&theme));
//! assert!(map.get::<&str>("count").is_none());
//! ```

use std::any::{Any, type_name};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::channel::Broadcast;
use crate::error::BroadcastError;

#[derive(Clone)]
struct ChannelEntry {
    /// A boxed `Broadcast<T>`.
    handle: Rc<dyn Any>,
    type_name: &'static str,
}

/// Immutable mapping from channel name to channel handle.
#[derive(Clone, Default)]
pub struct ChannelMap {
    entries: Rc<FxHashMap<Rc<str>, ChannelEntry>>,
}

impl ChannelMap {
    /// The empty map seen by a tree root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a map with `name` bound to `channel`, replacing any existing
    /// entry for `name`. `self` is left unchanged.
    #[must_use]
    pub fn with_channel<T: 'static>(
        &self,
        name: impl Into<Rc<str>>,
        channel: &Broadcast<T>,
    ) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(
            name.into(),
            ChannelEntry {
                handle: Rc::new(channel.clone()),
                type_name: type_name::<T>(),
            },
        );
        Self {
            entries: Rc::new(entries),
        }
    }

    /// Resolve `name` to a channel carrying `T`.
    ///
    /// # Errors
    ///
    /// [`BroadcastError::MissingChannel`] if no entry exists, and
    /// [`BroadcastError::TypeMismatch`] if the entry carries another type.
    pub fn lookup<T: 'static>(&self, name: &str) -> Result<Broadcast<T>, BroadcastError> {
        let Some((key, entry)) = self.entries.get_key_value(name) else {
            return Err(BroadcastError::MissingChannel {
                channel: name.into(),
            });
        };
        entry
            .handle
            .downcast_ref::<Broadcast<T>>()
            .cloned()
            .ok_or_else(|| BroadcastError::TypeMismatch {
                channel: Rc::clone(key),
                expected: type_name::<T>(),
                found: entry.type_name,
            })
    }

    /// Resolve `name`, treating absence and type mismatch alike.
    #[must_use]
    pub fn get<T: 'static>(&self, name: &str) -> Option<Broadcast<T>> {
        self.lookup(name).ok()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Payload type name of the channel bound to `name`.
    #[must_use]
    pub fn type_name(&self, name: &str) -> Option<&'static str> {
        self.entries.get(name).map(|entry| entry.type_name)
    }

    /// Channel names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|k| &**k).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether both maps are the same allocation (no derivation in between).
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl std::fmt::Debug for ChannelMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<(&str, &str)> = self
            .entries
            .iter()
            .map(|(name, entry)| (&**name, entry.type_name))
            .collect();
        entries.sort_unstable();
        f.debug_map().entries(entries).finish()
    }
}
