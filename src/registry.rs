//! Component registry: maps (display name, display mode) to a renderable
//! implementation.
//!
//! Registries nest: a child registry falls back to its parent for names it
//! does not define, so a host can provide a base palette and individual
//! screens can override or extend it (provider nesting). The engine treats a
//! missing component as a logged no-op, never a failure.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::render::output::{Rendered, ResolvedProps, SubRender};

// ---------------------------------------------------------------------------
// Display modes
// ---------------------------------------------------------------------------

/// How a component presents its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DisplayMode {
    /// Actively being edited.
    #[default]
    Editing,
    /// Editable on interaction, displayed as text until then.
    Editable,
    /// Read-only presentation.
    Readonly,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [
        DisplayMode::Editing,
        DisplayMode::Editable,
        DisplayMode::Readonly,
    ];
}

// ---------------------------------------------------------------------------
// ComponentWrapper
// ---------------------------------------------------------------------------

/// Custom render hook: receives the resolved props, the already-rendered
/// children, and a [`SubRender`] factory for ad-hoc fragment rendering.
pub type ComponentRenderFn =
    Rc<dyn Fn(&ResolvedProps, Vec<Rendered>, &SubRender<'_>) -> Rendered>;

/// The engine-facing contract of a concrete visual component.
///
/// The engine needs only the display name, whether children are accepted,
/// the supported display modes, and an optional render hook; everything else
/// about the component is the host's business.
#[derive(Clone)]
pub struct ComponentWrapper {
    pub display_name: String,
    pub accepts_children: bool,
    /// The component manages a whole form record rather than a single value.
    pub is_managed_form: bool,
    pub modes: Vec<DisplayMode>,
    pub render: Option<ComponentRenderFn>,
}

impl ComponentWrapper {
    /// A leaf component supporting every display mode.
    pub fn leaf(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            accepts_children: false,
            is_managed_form: false,
            modes: DisplayMode::ALL.to_vec(),
            render: None,
        }
    }

    /// A container component supporting every display mode.
    pub fn container(display_name: impl Into<String>) -> Self {
        Self {
            accepts_children: true,
            ..Self::leaf(display_name)
        }
    }

    /// Restrict the supported display modes (builder).
    pub fn modes(mut self, modes: &[DisplayMode]) -> Self {
        self.modes = modes.to_vec();
        self
    }

    pub fn managed_form(mut self, managed: bool) -> Self {
        self.is_managed_form = managed;
        self
    }

    /// Attach a custom render hook (builder).
    pub fn render_with(
        mut self,
        f: impl Fn(&ResolvedProps, Vec<Rendered>, &SubRender<'_>) -> Rendered + 'static,
    ) -> Self {
        self.render = Some(Rc::new(f));
        self
    }

    pub fn supports(&self, mode: DisplayMode) -> bool {
        self.modes.contains(&mode)
    }
}

impl fmt::Debug for ComponentWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentWrapper")
            .field("display_name", &self.display_name)
            .field("accepts_children", &self.accepts_children)
            .field("is_managed_form", &self.is_managed_form)
            .field("modes", &self.modes)
            .field("has_render", &self.render.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// (name, mode) → wrapper map with parent fallback.
#[derive(Default)]
pub struct ComponentRegistry {
    parent: Option<Rc<ComponentRegistry>>,
    entries: RefCell<HashMap<(String, DisplayMode), ComponentWrapper>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A nested registry that falls back to `self` for unknown names.
    pub fn child(self: &Rc<Self>) -> ComponentRegistry {
        ComponentRegistry {
            parent: Some(self.clone()),
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Register a wrapper under every display mode it supports.
    pub fn register(&self, wrapper: ComponentWrapper) {
        let mut entries = self.entries.borrow_mut();
        for mode in &wrapper.modes {
            entries.insert((wrapper.display_name.clone(), *mode), wrapper.clone());
        }
    }

    /// Resolve a wrapper for `(name, mode)`, consulting parents on a miss.
    pub fn resolve(&self, name: &str, mode: DisplayMode) -> Option<ComponentWrapper> {
        if let Some(wrapper) = self.entries.borrow().get(&(name.to_owned(), mode)) {
            return Some(wrapper.clone());
        }
        self.parent.as_ref()?.resolve(name, mode)
    }

    /// Whether `name` is registered under any mode, here or in a parent.
    pub fn knows(&self, name: &str) -> bool {
        DisplayMode::ALL
            .iter()
            .any(|mode| self.resolve(name, *mode).is_some())
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("entries", &self.entries.borrow().len())
            .field("nested", &self.parent.is_some())
            .finish()
    }
}

/// Props key under which decorator configuration is passed. Shared between
/// the engine's decorator wrapping and component implementations.
pub const DECORATOR_PROPS_KEY: &str = "decorator";

/// Convenience: a props map holding one decorator config entry.
pub fn decorator_props(config: Value) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert(DECORATOR_PROPS_KEY.to_owned(), config);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let registry = ComponentRegistry::new();
        registry.register(ComponentWrapper::leaf("TextInput"));
        assert!(registry.resolve("TextInput", DisplayMode::Editing).is_some());
        assert!(registry.resolve("TextInput", DisplayMode::Readonly).is_some());
        assert!(registry.resolve("Missing", DisplayMode::Editing).is_none());
    }

    #[test]
    fn mode_restriction() {
        let registry = ComponentRegistry::new();
        registry.register(
            ComponentWrapper::leaf("ReadonlyBadge").modes(&[DisplayMode::Readonly]),
        );
        assert!(registry.resolve("ReadonlyBadge", DisplayMode::Editing).is_none());
        assert!(registry
            .resolve("ReadonlyBadge", DisplayMode::Readonly)
            .is_some());
    }

    #[test]
    fn child_falls_back_to_parent() {
        let parent = Rc::new(ComponentRegistry::new());
        parent.register(ComponentWrapper::leaf("TextInput"));
        let child = parent.child();
        assert!(child.resolve("TextInput", DisplayMode::Editing).is_some());
    }

    #[test]
    fn child_overrides_parent() {
        let parent = Rc::new(ComponentRegistry::new());
        parent.register(ComponentWrapper::leaf("TextInput"));
        let child = parent.child();
        child.register(ComponentWrapper::leaf("TextInput").managed_form(true));
        let resolved = child.resolve("TextInput", DisplayMode::Editing).unwrap();
        assert!(resolved.is_managed_form);
    }

    #[test]
    fn knows_across_modes() {
        let registry = ComponentRegistry::new();
        registry.register(ComponentWrapper::leaf("X").modes(&[DisplayMode::Editable]));
        assert!(registry.knows("X"));
        assert!(!registry.knows("Y"));
    }

    #[test]
    fn leaf_vs_container() {
        assert!(!ComponentWrapper::leaf("A").accepts_children);
        assert!(ComponentWrapper::container("B").accepts_children);
    }
}
