//! Per-element configuration: props, bindings, decorators, shared blocks.
//!
//! An [`ElementDescriptor`] is merged from three sources at render time, in
//! ascending priority: schema-derived defaults, inherited shared props, the
//! element's own explicit options. Every presentation field is `Option` —
//! `None` means "unset, take it from a weaker source", mirroring the cascade
//! merge of a style sheet.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::BindingError;
use crate::render::context::RenderContext;

// ---------------------------------------------------------------------------
// Closures
// ---------------------------------------------------------------------------

/// A binding or expression closure. Invocable at render time; serializes as
/// an opaque marker so plans stay serializable.
#[derive(Clone)]
pub struct PropFn(Rc<dyn Fn(&RenderContext) -> Result<Value, BindingError>>);

impl PropFn {
    pub fn new(f: impl Fn(&RenderContext) -> Result<Value, BindingError> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, ctx: &RenderContext) -> Result<Value, BindingError> {
        (self.0)(ctx)
    }
}

impl fmt::Debug for PropFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PropFn(<fn>)")
    }
}

impl Serialize for PropFn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<fn>")
    }
}

// ---------------------------------------------------------------------------
// Expression props
// ---------------------------------------------------------------------------

/// When an expression prop is (re-)evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ExecutionPlan {
    /// Resolved to a literal while the plan is built.
    OnBuild,
    /// Evaluated once per render pass.
    #[default]
    OnRender,
    /// Evaluated per render pass, inside the capture window, so data reads
    /// register change subscriptions of their own.
    OnSourceChange,
    /// Re-evaluated whenever the node re-renders for a prop change.
    OnPropChange,
}

/// A computed prop: an execution plan plus the expression itself.
#[derive(Debug, Clone, Serialize)]
pub struct ExpressionProp {
    pub execution: ExecutionPlan,
    pub expr: PropFn,
}

/// A presentation field value: a literal or a computed expression.
#[derive(Debug, Clone, Serialize)]
pub enum Prop {
    Literal(Value),
    Expr(ExpressionProp),
}

impl Prop {
    pub fn literal(value: impl Into<Value>) -> Self {
        Prop::Literal(value.into())
    }

    pub fn expr(
        execution: ExecutionPlan,
        f: impl Fn(&RenderContext) -> Result<Value, BindingError> + 'static,
    ) -> Self {
        Prop::Expr(ExpressionProp {
            execution,
            expr: PropFn::new(f),
        })
    }

    /// The literal value, if this prop is one.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Prop::Literal(v) => Some(v),
            Prop::Expr(_) => None,
        }
    }
}

impl From<bool> for Prop {
    fn from(value: bool) -> Self {
        Prop::Literal(Value::Bool(value))
    }
}

impl From<&str> for Prop {
    fn from(value: &str) -> Self {
        Prop::Literal(Value::String(value.to_owned()))
    }
}

impl From<String> for Prop {
    fn from(value: String) -> Self {
        Prop::Literal(Value::String(value))
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// How a node resolves its value from the live data object.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A dotted/indexed path resolved against the local data scope.
    Path(String),
    /// A function of the render context; dependencies are discovered by
    /// capture-mode evaluation.
    Func(PropFn),
}

impl Binding {
    pub fn path(path: impl Into<String>) -> Self {
        Binding::Path(path.into())
    }

    pub fn func(f: impl Fn(&RenderContext) -> Result<Value, BindingError> + 'static) -> Self {
        Binding::Func(PropFn::new(f))
    }
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Binding::Path(p) => serializer.serialize_str(p),
            Binding::Func(_) => serializer.serialize_str("<fn>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Decorators
// ---------------------------------------------------------------------------

/// A component that wraps another rendered node's output as its child.
#[derive(Debug, Clone, Serialize)]
pub struct DecoratorSpec {
    pub component_name: String,
    pub props: Map<String, Value>,
}

impl DecoratorSpec {
    pub fn new(component_name: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            props: Map::new(),
        }
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Shared props
// ---------------------------------------------------------------------------

/// Where a field label is placed relative to its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LabelPosition {
    Above,
    Left,
    Inline,
}

/// Presentation defaults declared once on a set and inherited by descendants.
///
/// `from_component_index` restricts the block to members at that index and
/// later; `None` applies to the whole set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPropsBlock {
    pub label_position: Option<LabelPosition>,
    pub display_mode: Option<crate::registry::DisplayMode>,
    pub component_props: Map<String, Value>,
    pub from_component_index: Option<usize>,
    pub decorators: Vec<DecoratorSpec>,
}

impl SharedPropsBlock {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// ElementDescriptor
// ---------------------------------------------------------------------------

/// One node's configuration in the plan.
#[derive(Debug, Clone, Default)]
pub struct ElementDescriptor {
    pub hidden: Option<Prop>,
    pub disabled: Option<Prop>,
    pub error: Option<Prop>,
    pub helper_text: Option<Prop>,
    pub label: Option<Prop>,
    pub label_position: Option<LabelPosition>,
    pub display_mode: Option<crate::registry::DisplayMode>,
    pub binding: Option<Binding>,
    /// Named additional bindings, resolved read-only into `extra` props.
    pub extra_bindings: BTreeMap<String, Binding>,
    pub decorators: Vec<DecoratorSpec>,
    /// Render an array-bound child set once against the whole array instead
    /// of once per element.
    pub use_single_child_for_arrays: bool,
    pub component_props: Map<String, Value>,
    pub test_id: Option<String>,
}

impl ElementDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `self` (stronger) over `defaults` (weaker): every unset field of
    /// `self` takes the default's value; set fields always win. Component
    /// props merge per key, self winning.
    pub fn merge_over(&self, defaults: &ElementDescriptor) -> ElementDescriptor {
        fn pick<T: Clone>(own: &Option<T>, default: &Option<T>) -> Option<T> {
            if own.is_some() {
                own.clone()
            } else {
                default.clone()
            }
        }

        let mut component_props = defaults.component_props.clone();
        for (k, v) in &self.component_props {
            component_props.insert(k.clone(), v.clone());
        }

        let mut extra_bindings = defaults.extra_bindings.clone();
        for (k, v) in &self.extra_bindings {
            extra_bindings.insert(k.clone(), v.clone());
        }

        ElementDescriptor {
            hidden: pick(&self.hidden, &defaults.hidden),
            disabled: pick(&self.disabled, &defaults.disabled),
            error: pick(&self.error, &defaults.error),
            helper_text: pick(&self.helper_text, &defaults.helper_text),
            label: pick(&self.label, &defaults.label),
            label_position: pick(&self.label_position, &defaults.label_position),
            display_mode: pick(&self.display_mode, &defaults.display_mode),
            binding: pick(&self.binding, &defaults.binding),
            extra_bindings,
            decorators: if self.decorators.is_empty() {
                defaults.decorators.clone()
            } else {
                self.decorators.clone()
            },
            use_single_child_for_arrays: self.use_single_child_for_arrays
                || defaults.use_single_child_for_arrays,
            component_props,
            test_id: pick(&self.test_id, &defaults.test_id),
        }
    }
}

impl Serialize for ElementDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ElementDescriptor", 8)?;
        s.serialize_field("hidden", &self.hidden)?;
        s.serialize_field("disabled", &self.disabled)?;
        s.serialize_field("label", &self.label)?;
        s.serialize_field("helperText", &self.helper_text)?;
        s.serialize_field("binding", &self.binding)?;
        s.serialize_field("decorators", &self.decorators)?;
        s.serialize_field("componentProps", &self.component_props)?;
        s.serialize_field("testId", &self.test_id)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_explicit_wins() {
        let defaults = ElementDescriptor {
            label: Some("Default".into()),
            hidden: Some(false.into()),
            ..Default::default()
        };
        let own = ElementDescriptor {
            label: Some("Mine".into()),
            ..Default::default()
        };
        let merged = own.merge_over(&defaults);
        assert_eq!(
            merged.label.unwrap().as_literal(),
            Some(&json!("Mine"))
        );
        // Unset on own, filled from defaults.
        assert_eq!(merged.hidden.unwrap().as_literal(), Some(&json!(false)));
    }

    #[test]
    fn merge_component_props_per_key() {
        let mut defaults = ElementDescriptor::new();
        defaults.component_props.insert("a".into(), json!(1));
        defaults.component_props.insert("b".into(), json!(2));
        let mut own = ElementDescriptor::new();
        own.component_props.insert("b".into(), json!(20));

        let merged = own.merge_over(&defaults);
        assert_eq!(merged.component_props["a"], json!(1));
        assert_eq!(merged.component_props["b"], json!(20));
    }

    #[test]
    fn merge_decorators_replace_not_append() {
        let defaults = ElementDescriptor {
            decorators: vec![DecoratorSpec::new("Frame")],
            ..Default::default()
        };
        let own = ElementDescriptor {
            decorators: vec![DecoratorSpec::new("Highlight")],
            ..Default::default()
        };
        let merged = own.merge_over(&defaults);
        assert_eq!(merged.decorators.len(), 1);
        assert_eq!(merged.decorators[0].component_name, "Highlight");
    }

    #[test]
    fn merge_keeps_default_decorators_when_own_empty() {
        let defaults = ElementDescriptor {
            decorators: vec![DecoratorSpec::new("Frame")],
            ..Default::default()
        };
        let merged = ElementDescriptor::new().merge_over(&defaults);
        assert_eq!(merged.decorators[0].component_name, "Frame");
    }

    #[test]
    fn prop_from_conversions() {
        assert_eq!(Prop::from(true).as_literal(), Some(&json!(true)));
        assert_eq!(Prop::from("hi").as_literal(), Some(&json!("hi")));
    }

    #[test]
    fn binding_serializes_path_or_marker() {
        assert_eq!(
            serde_json::to_value(Binding::path("user.email")).unwrap(),
            json!("user.email")
        );
        assert_eq!(
            serde_json::to_value(Binding::func(|_| Ok(json!(1)))).unwrap(),
            json!("<fn>")
        );
    }

    #[test]
    fn descriptor_serializes() {
        let desc = ElementDescriptor {
            label: Some("Email".into()),
            binding: Some(Binding::path("email")),
            test_id: Some("email-field".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&desc).unwrap();
        assert_eq!(value["binding"], json!("email"));
        assert_eq!(value["testId"], json!("email-field"));
    }
}
