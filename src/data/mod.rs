//! Reactive data-access layer: paths, pub/sub bus, observable wrapper.

pub mod bus;
pub mod observe;
pub mod path;

pub use bus::{DataBus, DataEvent, EventKind, Subscriber, SubscriptionId};
pub use observe::{Access, DataScope, ObservedData, ValueSetter};
pub use path::{DataPath, PathSegment};
