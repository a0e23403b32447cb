//! Property-based invariant tests for ftui-broadcast.
//!
//! 1. Subscribers observe exactly the publishes made after they registered.
//! 2. `get`/`snapshot` return the last published value.
//! 3. Unsubscribing mid fan-out does not change the in-progress call.
//! 4. Unsubscribe handles are idempotent.
//! 5. A node publishes exactly when its comparator reports a change.
//! 6. The exposed map is the inherited map plus the node's own entry.
//! 7. A channel rename is always rejected.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use ftui_broadcast::{
    Broadcast, BroadcastError, BroadcastNode, BroadcastProps, ChannelMap, Unsubscribe,
    UpdateOutcome,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

const NAMES: &[&str] = &["theme", "count", "locale", "density", "focus"];

fn name_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(NAMES)
}

fn name_set_strategy() -> impl Strategy<Value = BTreeSet<&'static str>> {
    prop::collection::btree_set(name_strategy(), 0..=NAMES.len())
}

fn recording(channel: &Broadcast<i32>) -> (Rc<RefCell<Vec<i32>>>, Unsubscribe) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = Rc::clone(&log);
    let handle = channel.subscribe(move |v: &i32| log_clone.borrow_mut().push(*v));
    (log, handle)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Subscribers see exactly the publishes after registration
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn late_subscriber_sees_suffix(
        values in prop::collection::vec(any::<i32>(), 0..32),
        split in any::<prop::sample::Index>(),
    ) {
        let k = split.index(values.len() + 1);
        let channel = Broadcast::new(0);
        let (early, _early_handle) = recording(&channel);

        for v in &values[..k] {
            channel.publish(*v);
        }
        let (late, _late_handle) = recording(&channel);
        for v in &values[k..] {
            channel.publish(*v);
        }

        prop_assert_eq!(&*early.borrow(), &values);
        prop_assert_eq!(&*late.borrow(), &values[k..].to_vec());
        prop_assert_eq!(channel.version(), values.len() as u64);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Reads return the last published value
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn get_returns_last_published(
        initial in any::<i64>(),
        values in prop::collection::vec(any::<i64>(), 1..16),
    ) {
        let channel = Broadcast::new(initial);
        let mut last = Rc::new(initial);
        for v in values {
            last = Rc::new(v);
            channel.publish_rc(Rc::clone(&last));
        }
        prop_assert_eq!(channel.get(), *last);
        prop_assert!(Rc::ptr_eq(&channel.snapshot(), &last));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Unsubscribe during fan-out
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unsubscribe_mid_fanout_only_affects_later_calls(
        count in 2usize..8,
        remover_pick in any::<prop::sample::Index>(),
        victim_pick in any::<prop::sample::Index>(),
    ) {
        let remover = remover_pick.index(count);
        let victim = victim_pick.index(count);

        let channel = Broadcast::new(0);
        let calls: Rc<RefCell<Vec<(usize, i32)>>> = Rc::new(RefCell::new(Vec::new()));
        let handles: Rc<RefCell<Vec<Unsubscribe>>> = Rc::new(RefCell::new(Vec::new()));
        let fired = Rc::new(Cell::new(false));

        for i in 0..count {
            let calls = Rc::clone(&calls);
            let handles_inner = Rc::clone(&handles);
            let fired = Rc::clone(&fired);
            let handle = channel.subscribe(move |v: &i32| {
                calls.borrow_mut().push((i, *v));
                if i == remover && !fired.get() {
                    fired.set(true);
                    handles_inner.borrow()[victim].unsubscribe();
                }
            });
            handles.borrow_mut().push(handle);
        }

        channel.publish(1);
        let first: Vec<usize> = calls.borrow().iter().map(|(i, _)| *i).collect();
        prop_assert_eq!(first, (0..count).collect::<Vec<_>>());

        calls.borrow_mut().clear();
        channel.publish(2);
        let second: Vec<usize> = calls.borrow().iter().map(|(i, _)| *i).collect();
        let expected: Vec<usize> = (0..count).filter(|i| *i != victim).collect();
        prop_assert_eq!(second, expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Idempotent unsubscribe
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unsubscribe_twice_is_noop(count in 1usize..6, pick in any::<prop::sample::Index>()) {
        let channel = Broadcast::new(0);
        let handles: Vec<Unsubscribe> = (0..count).map(|_| channel.subscribe(|_| {})).collect();
        let target = &handles[pick.index(count)];

        prop_assert!(target.unsubscribe());
        prop_assert!(!target.unsubscribe());
        prop_assert_eq!(channel.subscriber_count(), count - 1);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Comparator decides publishing
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn node_publishes_iff_comparator_reports_change(
        steps in prop::collection::vec((any::<u8>(), any::<bool>()), 0..24),
    ) {
        let root = ChannelMap::new();
        let equal = Rc::new(Cell::new(false));
        let props = |value: u8| {
            let equal = Rc::clone(&equal);
            BroadcastProps::with_compare("count", value, move |_, _| equal.get())
        };

        let mut node = BroadcastNode::new(props(0), &root);
        let received = Rc::new(Cell::new(0u64));
        let received_clone = Rc::clone(&received);
        let _sub = node
            .channel()
            .subscribe(move |_| received_clone.set(received_clone.get() + 1))
            .into_guard();

        let mut expected = 0u64;
        for (value, report_equal) in steps {
            equal.set(report_equal);
            let outcome = node.update(props(value), &root);
            if report_equal {
                prop_assert_eq!(outcome, UpdateOutcome::Unchanged);
            } else {
                prop_assert_eq!(outcome, UpdateOutcome::Published);
                expected += 1;
                prop_assert_eq!(node.channel().get(), value);
            }
            prop_assert_eq!(node.channel().version(), expected);
            prop_assert_eq!(received.get(), expected);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Exposed map merge
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn exposed_is_inherited_plus_own(
        inherited_names in name_set_strategy(),
        own in name_strategy(),
    ) {
        let mut inherited = ChannelMap::new();
        let mut ancestors = Vec::new();
        for name in &inherited_names {
            let channel = Broadcast::new(name.len());
            inherited = inherited.with_channel(*name, &channel);
            ancestors.push((*name, channel));
        }

        let node = BroadcastNode::new(BroadcastProps::new(own, usize::MAX), &inherited);
        let exposed = node.exposed();

        let mut expected: BTreeSet<&str> = inherited_names.clone();
        expected.insert(own);
        prop_assert_eq!(exposed.names(), expected.into_iter().collect::<Vec<_>>());

        prop_assert!(exposed.lookup::<usize>(own).unwrap().ptr_eq(node.channel()));
        for (name, channel) in &ancestors {
            let resolved = exposed.lookup::<usize>(name).unwrap();
            prop_assert_eq!(resolved.ptr_eq(channel), *name != own);
            // The inherited map itself is never modified.
            prop_assert!(inherited.lookup::<usize>(name).unwrap().ptr_eq(channel));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Rename rejection
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn rename_is_always_rejected(
        first in name_strategy(),
        second in name_strategy(),
        value in any::<i16>(),
    ) {
        prop_assume!(first != second);
        let root = ChannelMap::new();
        let mut node = BroadcastNode::new(BroadcastProps::new(first, value), &root);

        let err = node.try_update(BroadcastProps::new(second, value), &root).unwrap_err();
        let is_renamed = matches!(err, BroadcastError::ChannelRenamed { .. });
        prop_assert!(is_renamed);
        prop_assert_eq!(node.channel_name(), first);
    }
}
