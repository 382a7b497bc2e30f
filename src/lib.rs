//! # trellis
//!
//! A declarative, data-driven UI composition engine with reactive bindings.
//!
//! Authors describe a tree of visual elements and their data bindings through
//! a fluent builder chain; a render engine interprets that tree against a
//! live data object and produces component instantiation requests. Binding
//! dependencies are discovered automatically: a binding function is evaluated
//! once with access capture on, and exactly the data paths it read are wired
//! to change notifications. No static analysis, no manual dependency lists.
//!
//! ## Core Systems
//!
//! - **[`data`]** — Dotted/indexed paths, pub/sub bus, observable data wrapper
//!   with capture-mode dependency discovery
//! - **[`plan`]** — The fluent builder chain and the immutable plan it builds
//! - **[`render`]** — The engine: shared-prop inheritance, binding resolution,
//!   array iteration, decorators, scoped re-render on data change
//! - **[`registry`]** — (component name, display mode) → implementation, with
//!   provider nesting
//! - **[`strategy`]** — Pattern-resolved formatting/parsing behavior for leaf
//!   inputs, plus pluggable expression parsers (math, date, percentage)
//! - **[`error`]** — Build, data, binding, and subscriber error types
//!
//! ## A small plan, mounted
//!
//! ```
//! use std::rc::Rc;
//! use serde_json::json;
//! use trellis::plan::builder::{PlanBuilder, TextInput};
//! use trellis::registry::{ComponentRegistry, ComponentWrapper};
//! use trellis::render::{RenderEngine, RenderSettings};
//!
//! let plan = PlanBuilder::new("user-form")
//!     .main()
//!     .element::<TextInput>()
//!     .bind("user.email")
//!     .label("Email")
//!     .done()
//!     .done()
//!     .build()
//!     .unwrap();
//!
//! let registry = Rc::new(ComponentRegistry::new());
//! registry.register(ComponentWrapper::leaf("TextInput"));
//!
//! let engine = RenderEngine::new(registry);
//! let mount = engine.mount(
//!     Rc::new(plan),
//!     json!({"user": {"email": "a@b.com"}}),
//!     RenderSettings::new(),
//! );
//! let output = mount.output();
//! assert_eq!(output[0].component(), Some("TextInput"));
//! ```

// Foundation
pub mod error;

// Reactive data access
pub mod data;

// Authoring
pub mod plan;

// Rendering
pub mod registry;
pub mod render;

// Leaf input behavior
pub mod strategy;
