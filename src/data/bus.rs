//! In-process publish/subscribe bus for data fetch/change events.
//!
//! The bus is synchronous and single-threaded: `publish` fans out to every
//! matching subscriber before returning. No queuing, no backpressure. A
//! subscriber that returns an error is logged and skipped; it never stops
//! delivery to the remaining subscribers. Callbacks are taken out of their
//! slot while running so a subscriber may itself subscribe or unsubscribe
//! during dispatch.

use std::cell::RefCell;
use std::fmt;

use serde_json::Value;
use slotmap::{new_key_type, SlotMap};

use crate::data::path::DataPath;
use crate::error::SubscriberError;

new_key_type! {
    /// Identifies a subscription inside a [`DataBus`]. Copy, lightweight.
    pub struct SubscriptionId;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The kind of a [`DataEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A property was read.
    Fetch,
    /// A property was written.
    Change,
}

/// A single data access notification.
#[derive(Debug, Clone)]
pub struct DataEvent {
    pub kind: EventKind,
    /// Path of the containing object/array, from the data root.
    pub path: DataPath,
    /// The accessed key (or `[i]` rendering for index accesses).
    pub key: String,
    /// The value read, or the newly written value.
    pub value: Value,
    /// The previous value, for `Change` events.
    pub old: Option<Value>,
}

impl DataEvent {
    /// Full path of the accessed property: container path plus key.
    pub fn full_path(&self) -> DataPath {
        match parse_index_key(&self.key) {
            Some(index) => self.path.join_index(index),
            None => self.path.join_key(&self.key),
        }
    }
}

/// Event-key rendering of an array element access: `[i]`.
///
/// Index accesses ride the same string-keyed bus as object keys. Path parsing
/// never yields an object key containing brackets, so the form is unambiguous.
pub fn index_key(index: usize) -> String {
    format!("[{index}]")
}

/// Recover the index from an `[i]` event key. `None` for ordinary keys.
pub fn parse_index_key(key: &str) -> Option<usize> {
    key.strip_prefix('[')?.strip_suffix(']')?.parse().ok()
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// Subscriber callback. Returning `Err` is logged and does not interrupt
/// delivery to other subscribers.
pub type SubscriberFn = Box<dyn FnMut(&DataEvent) -> Result<(), SubscriberError>>;

/// A registered subscriber with optional filters.
pub struct Subscriber {
    pub callback: SubscriberFn,
    /// Only deliver events of this kind, if set.
    pub kind: Option<EventKind>,
    /// Only deliver events for exactly this `(container path, key)` pair.
    pub keyed: Option<(DataPath, String)>,
}

impl Subscriber {
    /// An unfiltered subscriber.
    pub fn new(callback: impl FnMut(&DataEvent) -> Result<(), SubscriberError> + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            kind: None,
            keyed: None,
        }
    }

    /// Restrict to one event kind (builder).
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to an exact `(path, key)` pair (builder).
    pub fn keyed(mut self, path: DataPath, key: impl Into<String>) -> Self {
        self.keyed = Some((path, key.into()));
        self
    }

}

/// Filter check shared by [`Subscriber`] and the dispatch loop.
fn filters_match(
    kind: Option<EventKind>,
    keyed: Option<&(DataPath, String)>,
    event: &DataEvent,
) -> bool {
    if let Some(kind) = kind {
        if kind != event.kind {
            return false;
        }
    }
    if let Some((path, key)) = keyed {
        if path != &event.path || key != &event.key {
            return false;
        }
    }
    true
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("kind", &self.kind)
            .field("keyed", &self.keyed)
            .finish_non_exhaustive()
    }
}

/// Slot wrapper: the callback is `Option` so dispatch can take it out while
/// running (avoids holding a `RefMut` on the map across the user callback).
struct Slot {
    callback: Option<SubscriberFn>,
    kind: Option<EventKind>,
    keyed: Option<(DataPath, String)>,
}

// ---------------------------------------------------------------------------
// DataBus
// ---------------------------------------------------------------------------

/// The pub/sub bus. Shared as `Rc<DataBus>`; interior mutability throughout.
#[derive(Default)]
pub struct DataBus {
    subscribers: RefCell<SlotMap<SubscriptionId, Slot>>,
}

impl DataBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, returning its id.
    pub fn subscribe(&self, subscriber: Subscriber) -> SubscriptionId {
        self.subscribers.borrow_mut().insert(Slot {
            callback: Some(subscriber.callback),
            kind: subscriber.kind,
            keyed: subscriber.keyed,
        })
    }

    /// Remove a subscriber. Returns `false` if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.borrow_mut().remove(id).is_some()
    }

    /// Remove a batch of subscribers.
    pub fn unsubscribe_all(&self, ids: &[SubscriptionId]) {
        let mut subs = self.subscribers.borrow_mut();
        for id in ids {
            subs.remove(*id);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Synchronously deliver `event` to every matching subscriber.
    ///
    /// Iteration is slot order: insertion order, but not guaranteed stable
    /// across add/remove. A subscriber error is logged per subscriber and
    /// delivery continues.
    pub fn publish(&self, event: &DataEvent) {
        // Snapshot the ids first; subscribers added during dispatch will see
        // the next publish, not this one.
        let ids: Vec<SubscriptionId> = self.subscribers.borrow().keys().collect();

        for id in ids {
            let maybe_cb = {
                let mut subs = self.subscribers.borrow_mut();
                match subs.get_mut(id) {
                    Some(slot) => {
                        if filters_match(slot.kind, slot.keyed.as_ref(), event) {
                            slot.callback.take()
                        } else {
                            None
                        }
                    }
                    // Unsubscribed by an earlier callback in this dispatch.
                    None => None,
                }
            };

            let Some(mut cb) = maybe_cb else {
                continue;
            };

            if let Err(err) = cb(event) {
                tracing::warn!(
                    subscriber = ?id,
                    error = %err,
                    "subscriber failed during dispatch"
                );
            }

            // Put the callback back unless the subscriber removed itself.
            let mut subs = self.subscribers.borrow_mut();
            if let Some(slot) = subs.get_mut(id) {
                slot.callback = Some(cb);
            }
        }
    }
}

impl fmt::Debug for DataBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn fetch_event(path: &str, key: &str, value: Value) -> DataEvent {
        DataEvent {
            kind: EventKind::Fetch,
            path: DataPath::parse(path),
            key: key.to_owned(),
            value,
            old: None,
        }
    }

    fn change_event(path: &str, key: &str, old: Value, new: Value) -> DataEvent {
        DataEvent {
            kind: EventKind::Change,
            path: DataPath::parse(path),
            key: key.to_owned(),
            value: new,
            old: Some(old),
        }
    }

    #[test]
    fn subscribe_and_publish() {
        let bus = DataBus::new();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        bus.subscribe(Subscriber::new(move |_| {
            hits_c.set(hits_c.get() + 1);
            Ok(())
        }));
        bus.publish(&fetch_event("user", "email", json!("a@b.com")));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn kind_filter() {
        let bus = DataBus::new();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        bus.subscribe(
            Subscriber::new(move |_| {
                hits_c.set(hits_c.get() + 1);
                Ok(())
            })
            .kind(EventKind::Change),
        );
        bus.publish(&fetch_event("user", "email", json!("x")));
        assert_eq!(hits.get(), 0);
        bus.publish(&change_event("user", "email", json!("x"), json!("y")));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn keyed_filter_exact_match_only() {
        let bus = DataBus::new();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        bus.subscribe(
            Subscriber::new(move |_| {
                hits_c.set(hits_c.get() + 1);
                Ok(())
            })
            .keyed(DataPath::parse("user"), "email"),
        );
        bus.publish(&change_event("user", "name", json!("a"), json!("b")));
        bus.publish(&change_event("account", "email", json!("a"), json!("b")));
        assert_eq!(hits.get(), 0);
        bus.publish(&change_event("user", "email", json!("a"), json!("b")));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = DataBus::new();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let id = bus.subscribe(Subscriber::new(move |_| {
            hits_c.set(hits_c.get() + 1);
            Ok(())
        }));
        bus.publish(&fetch_event("", "a", json!(1)));
        assert!(bus.unsubscribe(id));
        bus.publish(&fetch_event("", "a", json!(1)));
        assert_eq!(hits.get(), 1);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn unsubscribe_all_bulk() {
        let bus = DataBus::new();
        let ids: Vec<_> = (0..3)
            .map(|_| bus.subscribe(Subscriber::new(|_| Ok(()))))
            .collect();
        assert_eq!(bus.subscriber_count(), 3);
        bus.unsubscribe_all(&ids);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn failing_subscriber_does_not_block_others() {
        let bus = DataBus::new();
        let hits = Rc::new(Cell::new(0));
        bus.subscribe(Subscriber::new(|_| {
            Err(SubscriberError::new("boom"))
        }));
        let hits_c = hits.clone();
        bus.subscribe(Subscriber::new(move |_| {
            hits_c.set(hits_c.get() + 1);
            Ok(())
        }));
        bus.publish(&fetch_event("", "a", json!(1)));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn subscriber_can_unsubscribe_itself_during_dispatch() {
        let bus = Rc::new(DataBus::new());
        let slot: Rc<Cell<Option<SubscriptionId>>> = Rc::new(Cell::new(None));
        let hits = Rc::new(Cell::new(0));

        let bus_c = bus.clone();
        let slot_c = slot.clone();
        let hits_c = hits.clone();
        let id = bus.subscribe(Subscriber::new(move |_| {
            hits_c.set(hits_c.get() + 1);
            if let Some(id) = slot_c.get() {
                bus_c.unsubscribe(id);
            }
            Ok(())
        }));
        slot.set(Some(id));

        bus.publish(&fetch_event("", "a", json!(1)));
        bus.publish(&fetch_event("", "a", json!(1)));
        assert_eq!(hits.get(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_added_during_dispatch_sees_next_publish() {
        let bus = Rc::new(DataBus::new());
        let second_hits = Rc::new(Cell::new(0));

        let bus_c = bus.clone();
        let second_hits_c = second_hits.clone();
        let added = Rc::new(Cell::new(false));
        let added_c = added.clone();
        bus.subscribe(Subscriber::new(move |_| {
            if !added_c.get() {
                added_c.set(true);
                let hits = second_hits_c.clone();
                bus_c.subscribe(Subscriber::new(move |_| {
                    hits.set(hits.get() + 1);
                    Ok(())
                }));
            }
            Ok(())
        }));

        bus.publish(&fetch_event("", "a", json!(1)));
        assert_eq!(second_hits.get(), 0);
        bus.publish(&fetch_event("", "a", json!(1)));
        assert_eq!(second_hits.get(), 1);
    }

    #[test]
    fn full_path_joins_key() {
        let event = fetch_event("user", "email", json!("x"));
        assert_eq!(event.full_path().to_string(), "user.email");
    }

    #[test]
    fn index_keys_round_trip() {
        assert_eq!(index_key(3), "[3]");
        assert_eq!(parse_index_key("[3]"), Some(3));
        assert_eq!(parse_index_key("email"), None);
        assert_eq!(parse_index_key("[x]"), None);
    }

    #[test]
    fn full_path_joins_index_key_as_index() {
        let event = fetch_event("items", "[1]", json!("x"));
        assert_eq!(event.full_path().to_string(), "items[1]");
        assert_eq!(
            event.full_path().segments().last(),
            Some(&crate::data::path::PathSegment::Index(1))
        );
    }
}
