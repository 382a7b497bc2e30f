//! Observable wrapper around the live data object.
//!
//! Rust has no transparent property interception, so the proxy is an explicit
//! wrapper-object: all reads and writes go through [`DataScope`], which
//! publishes `Fetch`/`Change` events on the shared [`DataBus`] and, when
//! capture mode is on, records every access in a per-instance log. Capture
//! mode is how the render engine discovers a binding's dependencies: one
//! trial evaluation, drain the log, wire keyed subscriptions to exactly the
//! recorded paths. No static analysis, no manual declarations.
//!
//! Capture state is scoped to one [`ObservedData`] instance (one engine
//! mount), never process-global: concurrently mounted trees stay independent.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::data::bus::{
    index_key, parse_index_key, DataBus, DataEvent, EventKind, Subscriber, SubscriptionId,
};
use crate::data::path::{DataPath, PathSegment};
use crate::error::{DataError, SubscriberError};

// ---------------------------------------------------------------------------
// Access records
// ---------------------------------------------------------------------------

/// One recorded property access from a capture-mode evaluation.
///
/// This is the metadata envelope of the capture protocol: the engine derives
/// the keyed subscription and (for single-access bindings) the writable
/// setter from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Access {
    /// Path of the containing object/array, from the data root.
    pub path: DataPath,
    /// The key that was read (`[i]` rendering for index accesses).
    pub key: String,
}

impl Access {
    /// Full path of the accessed property.
    pub fn full_path(&self) -> DataPath {
        match parse_index_key(&self.key) {
            Some(index) => self.path.join_index(index),
            None => self.path.join_key(&self.key),
        }
    }
}

/// Shared per-instance observation state: the capture flag and access log.
#[derive(Default)]
struct ObserveState {
    capture: Cell<bool>,
    log: RefCell<Vec<Access>>,
}

// ---------------------------------------------------------------------------
// ObservedData
// ---------------------------------------------------------------------------

/// Owns one wrapped data object, its bus, and its capture state.
///
/// Created once per render-engine mount; lives for the mount's lifetime.
pub struct ObservedData {
    root: Rc<RefCell<Value>>,
    bus: Rc<DataBus>,
    state: Rc<ObserveState>,
}

impl ObservedData {
    /// Wrap a raw data object with a fresh bus.
    pub fn new(data: Value) -> Self {
        Self {
            root: Rc::new(RefCell::new(data)),
            bus: Rc::new(DataBus::new()),
            state: Rc::new(ObserveState::default()),
        }
    }

    /// The scope positioned at the data root.
    pub fn root(&self) -> DataScope {
        DataScope {
            root: self.root.clone(),
            bus: self.bus.clone(),
            state: self.state.clone(),
            path: DataPath::root(),
        }
    }

    /// The internal bus handle.
    pub fn bus(&self) -> Rc<DataBus> {
        self.bus.clone()
    }

    /// Toggle capture mode. While on, every read through any scope derived
    /// from this instance is recorded in the access log.
    pub fn set_capture(&self, on: bool) {
        self.state.capture.set(on);
    }

    /// Whether capture mode is currently on.
    pub fn capturing(&self) -> bool {
        self.state.capture.get()
    }

    /// Take all recorded accesses, clearing the log.
    pub fn drain_accesses(&self) -> Vec<Access> {
        self.state.log.borrow_mut().drain(..).collect()
    }

    /// A snapshot clone of the whole data object.
    pub fn snapshot(&self) -> Value {
        self.root.borrow().clone()
    }
}

impl fmt::Debug for ObservedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedData")
            .field("capturing", &self.capturing())
            .field("bus", &self.bus)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DataScope
// ---------------------------------------------------------------------------

/// A cursor into the wrapped data object. Cloning is cheap (shared `Rc`s).
///
/// Every `get` publishes a `Fetch` event; every `set` publishes a `Change`
/// event carrying old and new values. Nested objects are reached through
/// [`DataScope::scope`] / [`DataScope::index`], which return further-wrapped
/// cursors rather than raw values.
#[derive(Clone)]
pub struct DataScope {
    root: Rc<RefCell<Value>>,
    bus: Rc<DataBus>,
    state: Rc<ObserveState>,
    path: DataPath,
}

impl DataScope {
    /// Path of this scope from the data root.
    pub fn path(&self) -> &DataPath {
        &self.path
    }

    /// Sentinel access: the internal bus handle, without going through the
    /// public data surface.
    pub fn bus(&self) -> Rc<DataBus> {
        self.bus.clone()
    }

    /// Read the property `key` of the scoped record.
    ///
    /// Publishes a `Fetch` event; in capture mode also records the access.
    /// Returns `None` when the key (or the scope itself) is missing.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = {
            let root = self.root.borrow();
            self.path.get(&root).and_then(|record| match record {
                Value::Object(map) => map.get(key).cloned(),
                _ => None,
            })
        };

        if self.state.capture.get() {
            self.state.log.borrow_mut().push(Access {
                path: self.path.clone(),
                key: key.to_owned(),
            });
        }

        self.bus.publish(&DataEvent {
            kind: EventKind::Fetch,
            path: self.path.clone(),
            key: key.to_owned(),
            value: value.clone().unwrap_or(Value::Null),
            old: None,
        });

        value
    }

    /// Read the element at `index` of the scoped array.
    ///
    /// The observed twin of [`DataScope::get`] for array elements: same
    /// `Fetch` event and capture record, with the `[i]` event key.
    pub fn get_index(&self, index: usize) -> Option<Value> {
        let value = {
            let root = self.root.borrow();
            self.path
                .get(&root)
                .and_then(Value::as_array)
                .and_then(|arr| arr.get(index).cloned())
        };
        let key = index_key(index);

        if self.state.capture.get() {
            self.state.log.borrow_mut().push(Access {
                path: self.path.clone(),
                key: key.clone(),
            });
        }

        self.bus.publish(&DataEvent {
            kind: EventKind::Fetch,
            path: self.path.clone(),
            key,
            value: value.clone().unwrap_or(Value::Null),
            old: None,
        });

        value
    }

    /// Resolve a dotted path relative to this scope, reading through `get`
    /// at each key step so that fetch events and capture records fire for
    /// every property touched along the way.
    pub fn get_path(&self, path: &DataPath) -> Option<Value> {
        let mut scope = self.clone();
        let segments = path.segments();
        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            match segment {
                PathSegment::Key(key) => {
                    if last {
                        return scope.get(key);
                    }
                    scope = scope.scope(key);
                }
                PathSegment::Index(index) => {
                    if last {
                        return scope.get_index(*index);
                    }
                    scope = scope.index(*index);
                }
            }
        }
        scope.value()
    }

    /// The whole scoped record, unobserved. Used for child recursion.
    pub fn value(&self) -> Option<Value> {
        let root = self.root.borrow();
        self.path.get(&root).cloned()
    }

    /// A nested scope for the object under `key` (recursive wrapping).
    pub fn scope(&self, key: &str) -> DataScope {
        DataScope {
            root: self.root.clone(),
            bus: self.bus.clone(),
            state: self.state.clone(),
            path: self.path.join_key(key),
        }
    }

    /// A nested scope for the array element at `index`.
    pub fn index(&self, index: usize) -> DataScope {
        DataScope {
            root: self.root.clone(),
            bus: self.bus.clone(),
            state: self.state.clone(),
            path: self.path.join_index(index),
        }
    }

    /// Length of the scoped array, if the record is one.
    pub fn array_len(&self) -> Option<usize> {
        let root = self.root.borrow();
        self.path.get(&root).and_then(Value::as_array).map(Vec::len)
    }

    /// Write the property `key`, publishing a `Change` event with old and
    /// new values.
    pub fn set(&self, key: &str, value: Value) -> Result<(), DataError> {
        let target = self.path.join_key(key);
        let old = {
            let mut root = self.root.borrow_mut();
            target.set(&mut root, value.clone())?
        };
        self.bus.publish(&DataEvent {
            kind: EventKind::Change,
            path: self.path.clone(),
            key: key.to_owned(),
            value,
            old: Some(old),
        });
        Ok(())
    }

    /// Replace the element at `index` of the scoped array, publishing a
    /// `Change` event with the `[i]` event key.
    pub fn set_index(&self, index: usize, value: Value) -> Result<(), DataError> {
        let target = self.path.join_index(index);
        let old = {
            let mut root = self.root.borrow_mut();
            target.set(&mut root, value.clone())?
        };
        self.bus.publish(&DataEvent {
            kind: EventKind::Change,
            path: self.path.clone(),
            key: index_key(index),
            value,
            old: Some(old),
        });
        Ok(())
    }

    /// A clonable setter closure for `key` — the sanctioned mutation path.
    /// Every write funnels through [`DataScope::set`], so every mutation is
    /// observable.
    pub fn setter(&self, key: &str) -> ValueSetter {
        let scope = self.clone();
        let key = key.to_owned();
        ValueSetter {
            target: scope.path.join_key(&key),
            inner: Rc::new(move |value| scope.set(&key, value)),
        }
    }

    /// The [`DataScope::setter`] counterpart for array elements.
    pub fn index_setter(&self, index: usize) -> ValueSetter {
        let scope = self.clone();
        ValueSetter {
            target: scope.path.join_index(index),
            inner: Rc::new(move |value| scope.set_index(index, value)),
        }
    }

    /// Open a durable subscription for changes to exactly `(this path, key)`.
    pub fn subscribe_key(
        &self,
        key: &str,
        callback: impl FnMut(&DataEvent) -> Result<(), SubscriberError> + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(
            Subscriber::new(callback)
                .kind(EventKind::Change)
                .keyed(self.path.clone(), key),
        )
    }
}

impl fmt::Debug for DataScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataScope")
            .field("path", &self.path.to_string())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ValueSetter
// ---------------------------------------------------------------------------

/// A write handle for one property. Clonable; writes go through the observed
/// scope so change events always fire.
#[derive(Clone)]
pub struct ValueSetter {
    target: DataPath,
    inner: Rc<dyn Fn(Value) -> Result<(), DataError>>,
}

impl ValueSetter {
    pub fn set(&self, value: Value) -> Result<(), DataError> {
        (self.inner)(value)
    }

    /// The property this setter writes.
    pub fn target(&self) -> &DataPath {
        &self.target
    }
}

impl fmt::Debug for ValueSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueSetter")
            .field("target", &self.target.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;

    fn sample() -> ObservedData {
        ObservedData::new(json!({
            "user": {"email": "a@b.com", "name": "Ada"},
            "items": [{"qty": 1}, {"qty": 2}]
        }))
    }

    #[test]
    fn get_reads_value() {
        let data = sample();
        let user = data.root().scope("user");
        assert_eq!(user.get("email"), Some(json!("a@b.com")));
    }

    #[test]
    fn get_publishes_fetch() {
        let data = sample();
        let events: Rc<RefCell<Vec<DataEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let events_c = events.clone();
        data.bus().subscribe(
            Subscriber::new(move |e| {
                events_c.borrow_mut().push(e.clone());
                Ok(())
            })
            .kind(EventKind::Fetch),
        );

        data.root().scope("user").get("email");

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path.to_string(), "user");
        assert_eq!(events[0].key, "email");
        assert_eq!(events[0].value, json!("a@b.com"));
    }

    #[test]
    fn set_publishes_change_with_old_and_new() {
        let data = sample();
        let seen: Rc<RefCell<Vec<DataEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_c = seen.clone();
        data.bus().subscribe(
            Subscriber::new(move |e| {
                seen_c.borrow_mut().push(e.clone());
                Ok(())
            })
            .kind(EventKind::Change),
        );

        data.root().scope("user").set("email", json!("c@d.com")).unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].old, Some(json!("a@b.com")));
        assert_eq!(seen[0].value, json!("c@d.com"));
    }

    #[test]
    fn setter_round_trip() {
        let data = sample();
        let user = data.root().scope("user");
        let setter = user.setter("email");
        setter.set(json!("new@example.com")).unwrap();
        assert_eq!(user.get("email"), Some(json!("new@example.com")));
        assert_eq!(setter.target().to_string(), "user.email");
    }

    #[test]
    fn capture_records_accesses() {
        let data = sample();
        data.set_capture(true);
        let root = data.root();
        root.scope("user").get("email");
        root.scope("items").index(0).get("qty");
        data.set_capture(false);

        let accesses = data.drain_accesses();
        assert_eq!(accesses.len(), 2);
        assert_eq!(accesses[0].full_path().to_string(), "user.email");
        assert_eq!(accesses[1].full_path().to_string(), "items[0].qty");
    }

    #[test]
    fn capture_off_records_nothing() {
        let data = sample();
        data.root().scope("user").get("email");
        assert!(data.drain_accesses().is_empty());
    }

    #[test]
    fn drain_clears_log() {
        let data = sample();
        data.set_capture(true);
        data.root().scope("user").get("email");
        assert_eq!(data.drain_accesses().len(), 1);
        assert!(data.drain_accesses().is_empty());
    }

    #[test]
    fn get_path_walks_nested_keys() {
        let data = sample();
        data.set_capture(true);
        let value = data.root().get_path(&DataPath::parse("user.email"));
        assert_eq!(value, Some(json!("a@b.com")));
        // Only the leaf key access is a plain `get`; the walk itself scopes.
        let accesses = data.drain_accesses();
        assert_eq!(accesses.last().unwrap().full_path().to_string(), "user.email");
    }

    #[test]
    fn get_path_through_index() {
        let data = sample();
        let value = data.root().get_path(&DataPath::parse("items[1].qty"));
        assert_eq!(value, Some(json!(2)));
    }

    #[test]
    fn get_path_to_trailing_index_captures_element() {
        let data = sample();
        data.set_capture(true);
        let value = data.root().get_path(&DataPath::parse("items[1]"));
        data.set_capture(false);
        assert_eq!(value, Some(json!({"qty": 2})));
        let accesses = data.drain_accesses();
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].key, "[1]");
        assert_eq!(accesses[0].full_path().to_string(), "items[1]");
    }

    #[test]
    fn set_index_fires_keyed_subscription() {
        let data = sample();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let items = data.root().scope("items");
        items.subscribe_key("[0]", move |_| {
            hits_c.set(hits_c.get() + 1);
            Ok(())
        });

        items.set_index(1, json!({"qty": 9})).unwrap();
        assert_eq!(hits.get(), 0);
        items.set_index(0, json!({"qty": 7})).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(items.get_index(0), Some(json!({"qty": 7})));
    }

    #[test]
    fn index_setter_round_trip() {
        let data = sample();
        let items = data.root().scope("items");
        let setter = items.index_setter(0);
        setter.set(json!({"qty": 5})).unwrap();
        assert_eq!(items.get_index(0), Some(json!({"qty": 5})));
        assert_eq!(setter.target().to_string(), "items[0]");
    }

    #[test]
    fn keyed_subscription_fires_on_exact_change_only() {
        let data = sample();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        let user = data.root().scope("user");
        user.subscribe_key("email", move |_| {
            hits_c.set(hits_c.get() + 1);
            Ok(())
        });

        user.set("name", json!("Grace")).unwrap();
        assert_eq!(hits.get(), 0);
        user.set("email", json!("g@h.com")).unwrap();
        assert_eq!(hits.get(), 1);
        // Reads never trigger a change subscription.
        user.get("email");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn array_len() {
        let data = sample();
        assert_eq!(data.root().scope("items").array_len(), Some(2));
        assert_eq!(data.root().scope("user").array_len(), None);
    }

    #[test]
    fn capture_state_is_per_instance() {
        let a = sample();
        let b = sample();
        a.set_capture(true);
        b.root().scope("user").get("email");
        assert!(a.drain_accesses().is_empty());
        assert!(b.drain_accesses().is_empty());
        a.root().scope("user").get("email");
        assert_eq!(a.drain_accesses().len(), 1);
    }

    #[test]
    fn get_missing_key_is_none_but_still_publishes() {
        let data = sample();
        let hits = Rc::new(Cell::new(0));
        let hits_c = hits.clone();
        data.bus().subscribe(
            Subscriber::new(move |_| {
                hits_c.set(hits_c.get() + 1);
                Ok(())
            })
            .kind(EventKind::Fetch),
        );
        assert_eq!(data.root().scope("user").get("missing"), None);
        assert_eq!(hits.get(), 1);
    }
}
