#![forbid(unsafe_code)]

//! Consumer side: reading a broadcast from an inherited [`ChannelMap`].
//!
//! [`Subscriber<T>`] is the reference consumer. A widget holds one, mounts
//! it against the map its position in the tree received, and reads the
//! latest value from it. Dropping or unmounting the subscriber releases the
//! registration, so a consumer never leaks callbacks into a channel that
//! outlives it.
//!
//! [`Interest<T>`] is the lower-level form: a consumer either declares no
//! interest or names a channel plus a callback, and the host resolves that
//! declaration against the map at composition time.
//!
//! A missing channel is not an error here. A subscriber mounted under a tree
//! that lacks its channel simply stays unavailable and logs a warning
//! unless it is quiet.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::channel::{Broadcast, Subscription};
use crate::error::BroadcastError;
use crate::map::ChannelMap;

/// A consumer's declared interest in a channel.
pub enum Interest<T> {
    NotSubscribed,
    Subscribed {
        channel: Rc<str>,
        callback: Box<dyn Fn(&T)>,
    },
}

impl<T: 'static> Interest<T> {
    #[must_use]
    pub fn subscribed(channel: impl Into<Rc<str>>, callback: impl Fn(&T) + 'static) -> Self {
        Self::Subscribed {
            channel: channel.into(),
            callback: Box::new(callback),
        }
    }

    /// Channel named by this interest, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::NotSubscribed => None,
            Self::Subscribed { channel, .. } => Some(channel),
        }
    }

    /// Register the callback on the channel `context` exposes.
    ///
    /// # Errors
    ///
    /// Returns the lookup error when the channel is missing or carries
    /// another payload type.
    pub fn resolve(self, context: &ChannelMap) -> Result<Option<Subscription>, BroadcastError> {
        match self {
            Self::NotSubscribed => Ok(None),
            Self::Subscribed { channel, callback } => {
                let broadcast = context.lookup::<T>(&channel)?;
                Ok(Some(broadcast.subscribe(callback).into_guard()))
            }
        }
    }
}

impl<T> std::fmt::Debug for Interest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSubscribed => f.write_str("NotSubscribed"),
            Self::Subscribed { channel, .. } => f
                .debug_struct("Subscribed")
                .field("channel", channel)
                .finish_non_exhaustive(),
        }
    }
}

struct Connection<T> {
    channel: Broadcast<T>,
    _subscription: Subscription,
}

/// Reference consumer tracking the latest value of one channel.
///
/// # Invariants
///
/// 1. While mounted, `value()` equals the channel's current value.
/// 2. At most one registration is held at a time.
/// 3. Unmounting or dropping releases the registration.
pub struct Subscriber<T> {
    channel_name: Rc<str>,
    quiet: bool,
    on_change: Option<Rc<dyn Fn(&T)>>,
    latest: Rc<RefCell<Option<Rc<T>>>>,
    notifications: Rc<Cell<u64>>,
    connection: Option<Connection<T>>,
}

impl<T: 'static> Subscriber<T> {
    /// An unmounted subscriber for `channel`.
    #[must_use]
    pub fn new(channel: impl Into<Rc<str>>) -> Self {
        Self {
            channel_name: channel.into(),
            quiet: false,
            on_change: None,
            latest: Rc::new(RefCell::new(None)),
            notifications: Rc::new(Cell::new(0)),
            connection: None,
        }
    }

    /// Suppress the warning logged when the channel is missing.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Callback run after each received value has been stored.
    #[must_use]
    pub fn on_change(mut self, callback: impl Fn(&T) + 'static) -> Self {
        self.on_change = Some(Rc::new(callback));
        self
    }

    /// Connect to the channel `context` exposes.
    ///
    /// Call again whenever the inherited map changes: resolving to the
    /// channel already held is a no-op, resolving to another channel moves
    /// the registration, and a missing channel releases it.
    ///
    /// # Errors
    ///
    /// [`BroadcastError::TypeMismatch`] when the channel carries another
    /// payload type. The subscriber is left as it was.
    pub fn mount(&mut self, context: &ChannelMap) -> Result<(), BroadcastError> {
        let channel = match context.lookup::<T>(&self.channel_name) {
            Ok(channel) => channel,
            Err(BroadcastError::MissingChannel { .. }) => {
                if !self.quiet {
                    tracing::warn!(
                        channel = %self.channel_name,
                        available = ?context.names(),
                        "subscriber mounted without a matching broadcast"
                    );
                }
                self.unmount();
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let already_held = self
            .connection
            .as_ref()
            .is_some_and(|connection| connection.channel.ptr_eq(&channel));
        if already_held {
            return Ok(());
        }

        self.connection = None;
        *self.latest.borrow_mut() = Some(channel.snapshot());

        let latest = Rc::clone(&self.latest);
        let notifications = Rc::clone(&self.notifications);
        let on_change = self.on_change.clone();
        let subscription = channel
            .subscribe_rc(move |value: &Rc<T>| {
                *latest.borrow_mut() = Some(Rc::clone(value));
                notifications.set(notifications.get() + 1);
                if let Some(on_change) = &on_change {
                    on_change(&**value);
                }
            })
            .into_guard();
        tracing::trace!(channel = %self.channel_name, "subscriber mounted");

        self.connection = Some(Connection {
            channel,
            _subscription: subscription,
        });
        Ok(())
    }

    /// Release the registration and forget the last value.
    pub fn unmount(&mut self) {
        if self.connection.take().is_some() {
            tracing::trace!(channel = %self.channel_name, "subscriber unmounted");
        }
        *self.latest.borrow_mut() = None;
    }

    /// Latest value, or `None` while unavailable.
    #[must_use]
    pub fn value(&self) -> Option<Rc<T>> {
        self.latest.borrow().clone()
    }

    #[must_use]
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        self.value().map(|value| T::clone(&value))
    }

    /// Whether a channel is currently connected.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.connection.is_some()
    }

    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Number of published values received since construction.
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.notifications.get()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("channel", &self.channel_name)
            .field("value", &self.latest.borrow())
            .field("available", &self.connection.is_some())
            .field("notifications", &self.notifications.get())
            .finish()
    }
}
