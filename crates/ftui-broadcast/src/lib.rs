#![forbid(unsafe_code)]

//! Channel-scoped value broadcasting for FrankenTUI widget trees.
//!
//! An ancestor widget publishes a value that changes over time. Any
//! descendant subscribes to it directly, without every widget in between
//! re-rendering to forward it. Broadcasts are scoped by channel name, so one
//! tree can carry several at once.
//!
//! - [`Broadcast`]: the channel. Holds the latest value and fans each
//!   `publish` out to its subscribers in registration order.
//! - [`ChannelMap`]: the immutable name → channel table a node inherits from
//!   its ancestors and passes on to its descendants.
//! - [`BroadcastNode`]: the tree position that owns a channel. It publishes
//!   prop changes that pass its comparator and exposes
//!   `inherited + own channel` below it.
//! - [`Subscriber`] / [`Interest`]: the consumer side.
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous (`Rc<RefCell<..>>`, as in
//! `ftui_runtime::reactive`). The channel map is passed explicitly to
//! [`BroadcastNode::new`] and [`BroadcastNode::update`]. It is an
//! environment parameter, not global state, so trees can be exercised
//! without a renderer.
//!
//! # Example
//!
//! ```
//! use ftui_broadcast::{BroadcastNode, BroadcastProps, ChannelMap, Subscriber};
//!
//! let root = ChannelMap::new();
//! let mut theme = BroadcastNode::new(BroadcastProps::new("theme", "light"), &root);
//!
//! // Somewhere deep below the broadcasting node.
//! let mut status_bar = Subscriber::<&str>::new("theme");
//! status_bar.mount(theme.exposed()).unwrap();
//! assert_eq!(status_bar.get(), Some("light"));
//!
//! theme.update(BroadcastProps::new("theme", "dark"), &root);
//! assert_eq!(status_bar.get(), Some("dark"));
//! ```
//!
//! # Invariants
//!
//! 1. A channel's value changes only through `publish`.
//! 2. A publish reaches exactly the subscribers registered when it began, in
//!    registration order.
//! 3. A node publishes at most once per update, and only when its
//!    comparator reports a change.
//! 4. A node's channel name is fixed for its lifetime.
//! 5. A node's own channel shadows an inherited channel of the same name for
//!    its descendants only.

pub mod channel;
pub mod error;
pub mod map;
pub mod node;
pub mod subscriber;

pub use channel::{Broadcast, SubscriberId, Subscription, Unsubscribe};
pub use error::BroadcastError;
pub use map::ChannelMap;
pub use node::{BroadcastNode, BroadcastProps, CompareFn, NodeState, UpdateOutcome, same_rc};
pub use subscriber::{Interest, Subscriber};
