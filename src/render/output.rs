//! Render engine output: instantiation requests and resolved props.
//!
//! The engine does not draw anything. Its product is a tree of
//! [`Rendered`] values — component instantiation requests carrying fully
//! resolved props — which the host maps onto its actual view layer.

use std::fmt;

use serde_json::{Map, Value};
use slotmap::new_key_type;

use crate::data::observe::{DataScope, ValueSetter};
use crate::plan::descriptor::LabelPosition;
use crate::plan::model::ElementSet;
use crate::registry::DisplayMode;

new_key_type! {
    /// Identifies a live node inside a mount's arena. Copy, lightweight.
    pub struct RenderNodeId;
}

// ---------------------------------------------------------------------------
// Node state
// ---------------------------------------------------------------------------

/// Lifecycle state of a rendered node.
///
/// Transitions are one-shot per render pass, except `Bound* ->
/// PendingBinding` which a matching data-change notification triggers; the
/// next flush re-runs binding resolution for just that node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Hidden,
    PendingBinding,
    BoundReadonly,
    BoundWritable,
    Error,
    UnregisteredComponent,
}

// ---------------------------------------------------------------------------
// Resolved props
// ---------------------------------------------------------------------------

/// The props handed to a component implementation: value, label, disabled,
/// error, helper text, test id, and a change setter when the binding is
/// writable.
#[derive(Clone, Default)]
pub struct ResolvedProps {
    pub value: Option<Value>,
    pub label: Option<String>,
    pub disabled: bool,
    pub error: Option<String>,
    pub helper_text: Option<String>,
    pub test_id: Option<String>,
    pub label_position: Option<LabelPosition>,
    /// Write handle for the bound value. `None` for read-only bindings
    /// (path bindings and multi-property function bindings).
    pub setter: Option<ValueSetter>,
    /// Pass-through component props plus resolved extra bindings.
    pub extra: Map<String, Value>,
}

impl fmt::Debug for ResolvedProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProps")
            .field("value", &self.value)
            .field("label", &self.label)
            .field("disabled", &self.disabled)
            .field("error", &self.error)
            .field("writable", &self.setter.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Rendered tree
// ---------------------------------------------------------------------------

/// One component instantiation request.
#[derive(Debug, Clone)]
pub struct InstantiationNode {
    pub component: String,
    pub display_mode: DisplayMode,
    pub props: ResolvedProps,
    pub children: Vec<Rendered>,
    /// The arena node this request came from; `None` for decorator wrappers
    /// and ad-hoc fragments.
    pub node: Option<RenderNodeId>,
}

/// Output of rendering one element: an instantiation request, or nothing
/// (hidden element, unregistered component).
#[derive(Debug, Clone)]
pub enum Rendered {
    Node(Box<InstantiationNode>),
    Nothing,
}

impl Rendered {
    pub fn node(node: InstantiationNode) -> Self {
        Rendered::Node(Box::new(node))
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Rendered::Nothing)
    }

    /// The component name, for instantiation requests.
    pub fn component(&self) -> Option<&str> {
        match self {
            Rendered::Node(n) => Some(&n.component),
            Rendered::Nothing => None,
        }
    }

    pub fn as_node(&self) -> Option<&InstantiationNode> {
        match self {
            Rendered::Node(n) => Some(n),
            Rendered::Nothing => None,
        }
    }

    /// Depth-first count of instantiation requests in this subtree.
    pub fn request_count(&self) -> usize {
        match self {
            Rendered::Nothing => 0,
            Rendered::Node(n) => {
                1 + n.children.iter().map(Rendered::request_count).sum::<usize>()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SubRender
// ---------------------------------------------------------------------------

/// Factory handle passed to component render hooks: lets a container request
/// ad-hoc rendering of an arbitrary element set against arbitrary data.
pub struct SubRender<'a> {
    #[allow(clippy::type_complexity)]
    render: &'a dyn Fn(&ElementSet, &DataScope) -> Vec<Rendered>,
}

impl<'a> SubRender<'a> {
    pub(crate) fn new(render: &'a dyn Fn(&ElementSet, &DataScope) -> Vec<Rendered>) -> Self {
        Self { render }
    }

    /// Render `set` against the given data scope.
    pub fn render_set(&self, set: &ElementSet, data: &DataScope) -> Vec<Rendered> {
        (self.render)(set, data)
    }
}

impl fmt::Debug for SubRender<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubRender")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(component: &str) -> Rendered {
        Rendered::node(InstantiationNode {
            component: component.to_owned(),
            display_mode: DisplayMode::Editing,
            props: ResolvedProps::default(),
            children: Vec::new(),
            node: None,
        })
    }

    #[test]
    fn request_count_counts_subtree() {
        let tree = Rendered::node(InstantiationNode {
            component: "Stack".into(),
            display_mode: DisplayMode::Editing,
            props: ResolvedProps::default(),
            children: vec![leaf("A"), Rendered::Nothing, leaf("B")],
            node: None,
        });
        assert_eq!(tree.request_count(), 3);
    }

    #[test]
    fn nothing_has_no_component() {
        assert!(Rendered::Nothing.is_nothing());
        assert_eq!(Rendered::Nothing.component(), None);
        assert_eq!(leaf("A").component(), Some("A"));
    }
}
