#![forbid(unsafe_code)]

//! Broadcast channel: a shared value cell with ordered fan-out to subscribers.
//!
//! # Design
//!
//! [`Broadcast<T>`] keeps the latest published value behind an `Rc<T>` in
//! shared, reference-counted storage (`Rc<RefCell<..>>`). Every `publish`
//! replaces the value and calls each registered subscriber in registration
//! order. The channel performs no equality check of its own; deciding whether
//! a value is worth publishing is the caller's job (see
//! [`BroadcastNode`](crate::node::BroadcastNode)).
//!
//! Subscribers are stored in an ordered map keyed by a monotonically
//! allocated [`SubscriberId`]. Removal is by identifier, so registering the
//! same closure twice yields two independent entries.
//!
//! # Performance
//!
//! | Operation       | Complexity                   |
//! |-----------------|------------------------------|
//! | `get()`         | O(1) + `T::clone`            |
//! | `snapshot()`    | O(1)                         |
//! | `publish()`     | O(S) where S = subscribers   |
//! | `subscribe()`   | O(log S)                     |
//! | `unsubscribe()` | O(log S)                     |
//!
//! # Failure Modes
//!
//! - **Panicking subscriber**: the panic propagates to the caller of
//!   `publish`. Subscribers after it in the list are not called for that
//!   publish, but the channel's bookkeeping stays consistent and the next
//!   `publish` reaches everyone again.
//! - **Re-entrant publish**: calling `publish()` on a channel from within one
//!   of its own subscriber callbacks panics. One fan-out must complete before
//!   the next one on the same channel begins.
//! - **Subscriber leak**: an [`Unsubscribe`] handle that is dropped without
//!   being called leaves its callback registered for the channel's lifetime.
//!   Use [`Unsubscribe::into_guard`] to tie the registration to a scope.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&Rc<T>)>;

/// Stable identifier of one subscriber registration on one channel.
///
/// Ids are allocated in increasing order, so ordering by id is ordering by
/// registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Raw numeric value of the id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Shared interior for [`Broadcast<T>`].
struct BroadcastInner<T> {
    value: Rc<T>,
    version: u64,
    next_id: u64,
    subscribers: BTreeMap<SubscriberId, Callback<T>>,
    /// Set while a fan-out is in progress.
    publishing: bool,
}

/// A shared value with publish/subscribe semantics.
///
/// Cloning a `Broadcast` creates a new handle to the **same** channel.
///
/// # Invariants
///
/// 1. The value changes only through `publish`.
/// 2. `version` increments by exactly 1 per `publish`.
/// 3. A publish reaches exactly the subscribers registered when it began, in
///    registration order.
/// 4. Subscribing never invokes the callback with the current value.
pub struct Broadcast<T> {
    inner: Rc<RefCell<BroadcastInner<T>>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Broadcast")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: 'static> Broadcast<T> {
    /// Create a channel seeded with `value`. Version starts at 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    /// Create a channel seeded with an already shared value.
    #[must_use]
    pub fn from_rc(value: Rc<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BroadcastInner {
                value,
                version: 0,
                next_id: 0,
                subscribers: BTreeMap::new(),
                publishing: false,
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.inner.borrow().value)
    }

    /// The current value as the shared pointer it was published with.
    #[must_use]
    pub fn snapshot(&self) -> Rc<T> {
        Rc::clone(&self.inner.borrow().value)
    }

    /// Access the current value by reference without cloning it.
    ///
    /// The channel is not borrowed while `f` runs, so `f` may publish.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.snapshot();
        f(&*value)
    }

    /// Replace the value and notify every subscriber.
    ///
    /// # Panics
    ///
    /// Panics if called from within a subscriber callback of this same
    /// channel, and propagates any panic raised by a subscriber.
    pub fn publish(&self, value: T) {
        self.publish_rc(Rc::new(value));
    }

    /// Like [`publish`](Self::publish), for a value that is already shared.
    ///
    /// Subscribers and later [`snapshot`](Self::snapshot) calls observe this
    /// exact allocation.
    ///
    /// # Panics
    ///
    /// See [`publish`](Self::publish).
    pub fn publish_rc(&self, value: Rc<T>) {
        let (callbacks, version, previous) = {
            let mut inner = self.inner.borrow_mut();
            assert!(
                !inner.publishing,
                "re-entrant publish: a broadcast subscriber published to its own channel"
            );
            let previous = std::mem::replace(&mut inner.value, Rc::clone(&value));
            inner.version += 1;
            inner.publishing = true;
            let callbacks: Vec<Callback<T>> = inner.subscribers.values().cloned().collect();
            (callbacks, inner.version, previous)
        };
        let _fanout = FanoutGuard { inner: &self.inner };
        // Dropped outside the borrow: the old payload may own a guard for
        // this same channel.
        drop(previous);
        tracing::trace!(version, subscribers = callbacks.len(), "broadcast publish");

        // Callbacks run against a snapshot of the list with no borrow held,
        // so they may subscribe or unsubscribe freely.
        for callback in &callbacks {
            callback(&value);
        }
    }

    /// Register a callback for future publishes.
    ///
    /// The callback is not invoked with the current value; call
    /// [`get`](Self::get) for that.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Unsubscribe {
        self.subscribe_rc(move |value: &Rc<T>| callback(&**value))
    }

    /// Like [`subscribe`](Self::subscribe), receiving the shared pointer so
    /// the subscriber can keep the value without cloning it.
    pub fn subscribe_rc(&self, callback: impl Fn(&Rc<T>) + 'static) -> Unsubscribe {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = SubscriberId(inner.next_id);
            inner.next_id += 1;
            inner.subscribers.insert(id, Rc::new(callback));
            id
        };
        tracing::trace!(subscriber = id.get(), "broadcast subscribe");
        Unsubscribe {
            id,
            channel: Box::new(Rc::downgrade(&self.inner)),
        }
    }

    /// Remove a registration by id. Returns `true` if it was present.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        detach(&self.inner, id)
    }

    /// Number of `publish` calls so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether two handles refer to the same channel.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

fn detach<T>(inner: &RefCell<BroadcastInner<T>>, id: SubscriberId) -> bool {
    // The removed callback is dropped after the borrow is released: its
    // captures may hold guards for this same channel.
    let removed = inner.borrow_mut().subscribers.remove(&id);
    let found = removed.is_some();
    if found {
        tracing::trace!(subscriber = id.get(), "broadcast unsubscribe");
    }
    drop(removed);
    found
}

/// Clears the in-progress flag when a fan-out ends, including by unwinding.
struct FanoutGuard<'a, T> {
    inner: &'a RefCell<BroadcastInner<T>>,
}

impl<T> Drop for FanoutGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.publishing = false;
        }
    }
}

/// Type-erased access to the channel an [`Unsubscribe`] belongs to.
trait Detach {
    fn detach(&self, id: SubscriberId) -> bool;
    fn is_attached(&self, id: SubscriberId) -> bool;
}

impl<T> Detach for Weak<RefCell<BroadcastInner<T>>> {
    fn detach(&self, id: SubscriberId) -> bool {
        match self.upgrade() {
            Some(inner) => detach(&inner, id),
            None => false,
        }
    }

    fn is_attached(&self, id: SubscriberId) -> bool {
        let Some(inner) = self.upgrade() else {
            return false;
        };
        let attached = inner.borrow().subscribers.contains_key(&id);
        attached
    }
}

/// Handle returned by [`Broadcast::subscribe`].
///
/// Holds only a weak reference to the channel: it never keeps a torn-down
/// channel alive. Dropping the handle does **not** unsubscribe; convert it
/// with [`into_guard`](Self::into_guard) for scope-bound registration.
#[must_use = "dropping the handle leaves the callback subscribed; see into_guard()"]
pub struct Unsubscribe {
    id: SubscriberId,
    channel: Box<dyn Detach>,
}

impl Unsubscribe {
    /// Id of the registration this handle removes.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the registration.
    ///
    /// Returns `true` on the call that removed it. Later calls, and calls
    /// after the channel was dropped, are no-ops returning `false`.
    pub fn unsubscribe(&self) -> bool {
        self.channel.detach(self.id)
    }

    /// Whether the registration is still live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.channel.is_attached(self.id)
    }

    /// Convert into a guard that unsubscribes on drop.
    pub fn into_guard(self) -> Subscription {
        Subscription { handle: self }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// RAII guard for a subscriber registration.
///
/// Dropping the `Subscription` removes the callback from its channel.
pub struct Subscription {
    handle: Unsubscribe,
}

impl Subscription {
    /// Id of the guarded registration.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.handle.id
    }

    /// Whether the guarded registration is still live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.handle.is_subscribed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.handle.id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
