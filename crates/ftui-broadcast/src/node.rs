#![forbid(unsafe_code)]

//! Broadcast node: the tree position that owns a channel.
//!
//! # Design
//!
//! A [`BroadcastNode<T>`] is created by the host at some position in the
//! widget tree with [`BroadcastProps`] and the [`ChannelMap`] inherited from
//! its nearest broadcasting ancestor. It owns exactly one [`Broadcast<T>`]
//! for its whole life and exposes `inherited + (name → channel)` to its
//! descendants.
//!
//! On every update the node compares the previous prop value with the new
//! one using the comparator it last received. Only a difference is
//! published, so unchanged values never fan out. The exposed map is rebuilt
//! on every update regardless, since the inherited map may have changed
//! upstream.
//!
//! # Invariants
//!
//! 1. The channel name never changes after construction.
//! 2. At most one publish per update.
//! 3. `exposed()` contains every inherited name plus the node's own, and the
//!    node's own channel wins on collision.
//!
//! # Failure Modes
//!
//! - **Channel rename**: [`update`](BroadcastNode::update) panics when the
//!   props name another channel. Silently following the rename would orphan
//!   every subscriber of the existing channel.
//!   [`try_update`](BroadcastNode::try_update) reports it as an error.
//! - **Subscriber panic**: propagates out of `update`. The node has already
//!   recorded the new value and map at that point.

use std::rc::Rc;

use crate::channel::Broadcast;
use crate::error::BroadcastError;
use crate::map::ChannelMap;

/// Equality policy deciding whether a new prop value is worth publishing.
pub type CompareFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Compare shared payloads by pointer instead of by content.
///
/// ```
/// use std::rc::Rc;
/// use ftui_broadcast::{BroadcastProps, same_rc};
///
/// let props = BroadcastProps::with_compare("rows", Rc::new(vec![1, 2]), same_rc);
/// assert_eq!(props.channel(), "rows");
/// ```
#[must_use]
pub fn same_rc<U: ?Sized>(prev: &Rc<U>, next: &Rc<U>) -> bool {
    Rc::ptr_eq(prev, next)
}

/// Inputs of a [`BroadcastNode`] for one construction or update.
pub struct BroadcastProps<T> {
    channel: Rc<str>,
    value: Rc<T>,
    compare: CompareFn<T>,
}

impl<T: 'static> BroadcastProps<T> {
    /// Props comparing values with `PartialEq`.
    #[must_use]
    pub fn new(channel: impl Into<Rc<str>>, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::from_rc(channel, Rc::new(value))
    }

    /// Like [`new`](Self::new), with a value that is already shared. The
    /// allocation is what subscribers receive.
    #[must_use]
    pub fn from_rc(channel: impl Into<Rc<str>>, value: Rc<T>) -> Self
    where
        T: PartialEq,
    {
        Self::with_compare_rc(channel, value, |prev: &T, next: &T| prev == next)
    }

    /// Props with an explicit comparator. `compare(prev, next)` returning
    /// `true` suppresses the publish.
    #[must_use]
    pub fn with_compare(
        channel: impl Into<Rc<str>>,
        value: T,
        compare: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self {
        Self::with_compare_rc(channel, Rc::new(value), compare)
    }

    /// Like [`with_compare`](Self::with_compare), with a value that is
    /// already shared. `T` need not implement `PartialEq`.
    #[must_use]
    pub fn with_compare_rc(
        channel: impl Into<Rc<str>>,
        value: Rc<T>,
        compare: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self {
        Self {
            channel: channel.into(),
            value,
            compare: Rc::new(compare),
        }
    }

    /// Replace the comparator.
    #[must_use]
    pub fn compare_values(mut self, compare: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.compare = Rc::new(compare);
        self
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for BroadcastProps<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastProps")
            .field("channel", &self.channel)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a [`BroadcastNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Channel created and map computed; no update received yet.
    Constructed,
    /// At least one update received.
    Updating,
}

/// What an update did with the new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The comparator reported a change; the value was published.
    Published,
    /// The comparator reported equality; nothing was published.
    Unchanged,
}

impl UpdateOutcome {
    #[must_use]
    pub const fn is_published(self) -> bool {
        matches!(self, Self::Published)
    }
}

/// A tree node owning one broadcast channel.
pub struct BroadcastNode<T> {
    name: Rc<str>,
    channel: Broadcast<T>,
    value: Rc<T>,
    compare: CompareFn<T>,
    inherited: ChannelMap,
    exposed: ChannelMap,
    state: NodeState,
}

impl<T: 'static> BroadcastNode<T> {
    /// Create the node and its channel, seeded with the prop value.
    #[must_use]
    pub fn new(props: BroadcastProps<T>, inherited: &ChannelMap) -> Self {
        let BroadcastProps {
            channel: name,
            value,
            compare,
        } = props;
        let channel = Broadcast::from_rc(Rc::clone(&value));
        let exposed = inherited.with_channel(Rc::clone(&name), &channel);
        tracing::debug!(
            channel = %name,
            inherited = inherited.len(),
            "broadcast node constructed"
        );
        Self {
            name,
            channel,
            value,
            compare,
            inherited: inherited.clone(),
            exposed,
            state: NodeState::Constructed,
        }
    }

    /// Apply new props and a (possibly new) inherited map.
    ///
    /// # Panics
    ///
    /// Panics if `props` names a different channel than the one the node
    /// was constructed with, and propagates subscriber panics.
    pub fn update(&mut self, props: BroadcastProps<T>, inherited: &ChannelMap) -> UpdateOutcome {
        match self.try_update(props, inherited) {
            Ok(outcome) => outcome,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`update`](Self::update), reporting a channel rename instead of
    /// panicking.
    ///
    /// # Errors
    ///
    /// [`BroadcastError::ChannelRenamed`] if `props` names a different
    /// channel. The node is left untouched in that case.
    pub fn try_update(
        &mut self,
        props: BroadcastProps<T>,
        inherited: &ChannelMap,
    ) -> Result<UpdateOutcome, BroadcastError> {
        if props.channel != self.name {
            tracing::error!(
                channel = %self.name,
                requested = %props.channel,
                "broadcast channel renamed"
            );
            return Err(BroadcastError::ChannelRenamed {
                expected: Rc::clone(&self.name),
                found: props.channel,
            });
        }

        let BroadcastProps { value, compare, .. } = props;
        let equal = (self.compare)(&*self.value, &*value);
        self.value = Rc::clone(&value);
        self.compare = compare;
        self.inherit(inherited);
        self.state = NodeState::Updating;

        if equal {
            tracing::trace!(channel = %self.name, "broadcast value unchanged");
            return Ok(UpdateOutcome::Unchanged);
        }
        tracing::debug!(
            channel = %self.name,
            subscribers = self.channel.subscriber_count(),
            "broadcast value changed"
        );
        self.channel.publish_rc(value);
        Ok(UpdateOutcome::Published)
    }

    /// Rebuild the exposed map from a new inherited map without touching
    /// the value.
    pub fn inherit(&mut self, inherited: &ChannelMap) {
        self.exposed = inherited.with_channel(Rc::clone(&self.name), &self.channel);
        self.inherited = inherited.clone();
    }

    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.name
    }

    /// The owned channel.
    #[must_use]
    pub fn channel(&self) -> &Broadcast<T> {
        &self.channel
    }

    /// The prop value last received.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    #[must_use]
    pub fn inherited(&self) -> &ChannelMap {
        &self.inherited
    }

    /// The map descendants of this node receive.
    #[must_use]
    pub fn exposed(&self) -> &ChannelMap {
        &self.exposed
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for BroadcastNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastNode")
            .field("channel", &self.name)
            .field("value", &self.value)
            .field("state", &self.state)
            .field("exposed", &self.exposed)
            .finish_non_exhaustive()
    }
}
