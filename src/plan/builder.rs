//! The fluent plan builder: typed element chains that materialize a [`Plan`].
//!
//! The chain is parent-linked: [`ElementSetBuilder`] owns whatever it will
//! hand its finished set back to, and `done()` walks one level up. Component
//! kinds are zero-sized marker types carrying their display name and
//! child-bearing capability in the type, so attaching children to a leaf
//! component is a compile error rather than a render-time surprise.
//!
//! Build-time work beyond assembly: path bindings are validated against the
//! data descriptor in scope, and `OnBuild` expressions are resolved to
//! literals so the finished plan carries their values, not their closures.

use std::marker::PhantomData;
use std::rc::Rc;

use serde_json::Value;

use crate::data::path::DataPath;
use crate::error::{BindingError, BuildError};
use crate::plan::descriptor::{
    Binding, DecoratorSpec, ElementDescriptor, ExecutionPlan, ExpressionProp, LabelPosition, Prop,
    PropFn, SharedPropsBlock,
};
use crate::plan::model::{
    BuildSettings, ElementSet, ElementSetMember, MemberOrigin, Plan, PlanRule,
};
use crate::plan::schema::DataDescriptor;
use crate::registry::DisplayMode;
use crate::render::context::RenderContext;

// ---------------------------------------------------------------------------
// Component kinds
// ---------------------------------------------------------------------------

/// A zero-sized marker describing one component the builder can place.
///
/// Hosts declare their own kinds alongside their registry entries; the ones
/// below cover the built-in palette.
pub trait ComponentKind {
    const NAME: &'static str;
    const ACCEPTS_CHILDREN: bool = false;
}

/// Marker subtrait gating [`ElementBuilder::containing_set`]: only kinds that
/// accept children implement it.
pub trait AcceptsChildren: ComponentKind {}

macro_rules! leaf_kind {
    ($($kind:ident => $name:literal),+ $(,)?) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $kind;
        impl ComponentKind for $kind {
            const NAME: &'static str = $name;
        }
    )+};
}

macro_rules! container_kind {
    ($($kind:ident => $name:literal),+ $(,)?) => {$(
        #[derive(Debug, Clone, Copy)]
        pub struct $kind;
        impl ComponentKind for $kind {
            const NAME: &'static str = $name;
            const ACCEPTS_CHILDREN: bool = true;
        }
        impl AcceptsChildren for $kind {}
    )+};
}

leaf_kind! {
    TextInput => "TextInput",
    NumberInput => "NumberInput",
    MoneyInput => "MoneyInput",
    DateInput => "DateInput",
    Checkbox => "Checkbox",
    Label => "Label",
}

container_kind! {
    Stack => "Stack",
    Section => "Section",
    Form => "Form",
    Table => "Table",
}

/// Kind for components addressed by a runtime name. Child acceptance cannot
/// be checked statically for these; the registry decides at render time.
#[derive(Debug, Clone, Copy)]
pub struct Dynamic;

impl ComponentKind for Dynamic {
    const NAME: &'static str = "";
    const ACCEPTS_CHILDREN: bool = true;
}
impl AcceptsChildren for Dynamic {}

// ---------------------------------------------------------------------------
// Parent linkage
// ---------------------------------------------------------------------------

/// Where a finished [`ElementSet`] goes when its builder completes.
pub trait SetHost: Sized {
    fn accept_set(self, set: ElementSet) -> Self;
}

// ---------------------------------------------------------------------------
// PlanBuilder
// ---------------------------------------------------------------------------

/// Entry point of the fluent chain.
#[derive(Default)]
pub struct PlanBuilder {
    id: String,
    name: String,
    version: String,
    rules: Vec<PlanRule>,
    display_type_map: Vec<(String, String)>,
    build_settings: BuildSettings,
    schema: Option<Rc<DataDescriptor>>,
    main: ElementSet,
}

impl PlanBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: "1".to_owned(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// A named plan-level expression, re-evaluated once per render pass.
    pub fn rule(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&RenderContext) -> Result<Value, BindingError> + 'static,
    ) -> Self {
        self.rules.push(PlanRule {
            name: name.into(),
            expression: ExpressionProp {
                execution: ExecutionPlan::OnRender,
                expr: PropFn::new(f),
            },
        });
        self
    }

    /// Map an abstract display type tag to a component name. First mapping
    /// for a tag wins.
    pub fn display_type(mut self, tag: impl Into<String>, component: impl Into<String>) -> Self {
        self.display_type_map.push((tag.into(), component.into()));
        self
    }

    /// Declare the shape of the root data record.
    pub fn schema(mut self, descriptor: Rc<DataDescriptor>) -> Self {
        self.schema = Some(descriptor);
        self
    }

    pub fn build_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.build_settings = self.build_settings.value(key, value);
        self
    }

    /// Open the main element set.
    pub fn main(self) -> ElementSetBuilder<PlanBuilder> {
        ElementSetBuilder {
            parent: self,
            set: ElementSet::new(),
        }
    }

    /// Validate and materialize the plan.
    pub fn build(mut self) -> Result<Plan, BuildError> {
        if self.id.trim().is_empty() {
            return Err(BuildError::EmptyPlanId);
        }
        let schema = self.main.scope.clone().or_else(|| self.schema.clone());
        validate_set(&self.main, schema.as_deref())?;
        resolve_on_build(&mut self.main, &self.build_settings);
        Ok(Plan {
            id: self.id,
            name: self.name,
            version: self.version,
            rules: self.rules,
            display_type_map: self.display_type_map,
            main: self.main,
            build_settings: self.build_settings,
            schema: self.schema,
        })
    }
}

impl SetHost for PlanBuilder {
    fn accept_set(mut self, set: ElementSet) -> Self {
        self.main = set;
        self
    }
}

// ---------------------------------------------------------------------------
// ElementSetBuilder
// ---------------------------------------------------------------------------

/// Builds one ordered element sequence; `done()` hands it to the parent.
pub struct ElementSetBuilder<P: SetHost> {
    parent: P,
    set: ElementSet,
}

impl<P: SetHost> ElementSetBuilder<P> {
    /// Open a typed element.
    pub fn element<K: ComponentKind>(self) -> ElementBuilder<P, K> {
        let mut member = ElementSetMember::new(ElementDescriptor::new());
        member.component_name = Some(K::NAME.to_owned());
        ElementBuilder {
            parent: self,
            member,
            _kind: PhantomData,
        }
    }

    /// Open an element for a component addressed by runtime name.
    pub fn element_named(self, name: impl Into<String>) -> ElementBuilder<P, Dynamic> {
        let mut member = ElementSetMember::new(ElementDescriptor::new());
        member.component_name = Some(name.into());
        ElementBuilder {
            parent: self,
            member,
            _kind: PhantomData,
        }
    }

    /// Open an element whose component will be picked from schema metadata.
    pub fn auto_element(self) -> ElementBuilder<P, Dynamic> {
        ElementBuilder {
            parent: self,
            member: ElementSetMember::new(ElementDescriptor::new()),
            _kind: PhantomData,
        }
    }

    /// Splice in a pre-built member.
    pub fn member(mut self, mut member: ElementSetMember) -> Self {
        member.origin = MemberOrigin::Prebuilt;
        self.set.members.push(member);
        self
    }

    /// Open a shared-props block scoped to this set.
    pub fn shared(self) -> SharedPropsBuilder<P> {
        SharedPropsBuilder {
            parent: self,
            block: SharedPropsBlock::new(),
        }
    }

    /// Declare the shape of the data locally in scope for this set.
    pub fn scoped_to(mut self, descriptor: Rc<DataDescriptor>) -> Self {
        self.set.scope = Some(descriptor);
        self
    }

    /// Close the set, handing it to the parent.
    pub fn done(self) -> P {
        self.parent.accept_set(self.set)
    }
}

// ---------------------------------------------------------------------------
// ElementBuilder
// ---------------------------------------------------------------------------

/// Configures one element; `done()` appends it to the owning set.
pub struct ElementBuilder<P: SetHost, K: ComponentKind> {
    parent: ElementSetBuilder<P>,
    member: ElementSetMember,
    _kind: PhantomData<K>,
}

impl<P: SetHost, K: ComponentKind> ElementBuilder<P, K> {
    /// Bind the element's value to a path in the local data scope
    /// (read-only).
    pub fn bind(mut self, path: impl Into<String>) -> Self {
        self.member.options.binding = Some(Binding::path(path));
        self
    }

    /// Bind the element's value to a function of the render context.
    /// Dependencies are discovered by capture-mode evaluation; a
    /// single-property function is two-way editable.
    pub fn bind_fn(
        mut self,
        f: impl Fn(&RenderContext) -> Result<Value, BindingError> + 'static,
    ) -> Self {
        self.member.options.binding = Some(Binding::func(f));
        self
    }

    /// A named additional binding, resolved read-only into the props map.
    pub fn extra_binding(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.member.options.extra_bindings.insert(name.into(), binding);
        self
    }

    pub fn label(mut self, label: impl Into<Prop>) -> Self {
        self.member.options.label = Some(label.into());
        self
    }

    pub fn label_position(mut self, position: LabelPosition) -> Self {
        self.member.options.label_position = Some(position);
        self
    }

    pub fn hidden(mut self, hidden: impl Into<Prop>) -> Self {
        self.member.options.hidden = Some(hidden.into());
        self
    }

    pub fn disabled(mut self, disabled: impl Into<Prop>) -> Self {
        self.member.options.disabled = Some(disabled.into());
        self
    }

    pub fn error(mut self, error: impl Into<Prop>) -> Self {
        self.member.options.error = Some(error.into());
        self
    }

    pub fn helper_text(mut self, text: impl Into<Prop>) -> Self {
        self.member.options.helper_text = Some(text.into());
        self
    }

    pub fn display_mode(mut self, mode: DisplayMode) -> Self {
        self.member.options.display_mode = Some(mode);
        self
    }

    /// A pass-through component prop.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member.options.component_props.insert(key.into(), value.into());
        self
    }

    pub fn decorate(mut self, decorator: DecoratorSpec) -> Self {
        self.member.options.decorators.push(decorator);
        self
    }

    pub fn test_id(mut self, id: impl Into<String>) -> Self {
        self.member.options.test_id = Some(id.into());
        self
    }

    /// Render an array-bound child set once against the whole array instead
    /// of once per element.
    pub fn single_child_for_arrays(mut self) -> Self {
        self.member.options.use_single_child_for_arrays = true;
        self
    }

    /// Close the element, appending it to the owning set.
    pub fn done(mut self) -> ElementSetBuilder<P> {
        self.parent.set.members.push(self.member);
        self.parent
    }
}

impl<P: SetHost, K: AcceptsChildren> ElementBuilder<P, K> {
    /// Open the child element set. Available only on kinds that accept
    /// children.
    pub fn containing_set(self) -> ElementSetBuilder<ElementBuilder<P, K>> {
        ElementSetBuilder {
            parent: self,
            set: ElementSet::new(),
        }
    }
}

impl<P: SetHost, K: AcceptsChildren> SetHost for ElementBuilder<P, K> {
    fn accept_set(mut self, set: ElementSet) -> Self {
        self.member.containing = Some(set);
        self
    }
}

// ---------------------------------------------------------------------------
// Extension traits
// ---------------------------------------------------------------------------

/// Table-specific sugar. Hosts add their own extension traits the same way:
/// a trait bound on the concrete kind, implemented for every parent.
pub trait TableBuilderExt {
    fn columns(self, columns: &[&str]) -> Self;
}

impl<P: SetHost> TableBuilderExt for ElementBuilder<P, Table> {
    fn columns(self, columns: &[&str]) -> Self {
        self.prop(
            "columns",
            Value::Array(columns.iter().map(|c| Value::String((*c).to_owned())).collect()),
        )
    }
}

// ---------------------------------------------------------------------------
// SharedPropsBuilder
// ---------------------------------------------------------------------------

/// Builds one shared-props block for a set.
pub struct SharedPropsBuilder<P: SetHost> {
    parent: ElementSetBuilder<P>,
    block: SharedPropsBlock,
}

impl<P: SetHost> SharedPropsBuilder<P> {
    pub fn label_position(mut self, position: LabelPosition) -> Self {
        self.block.label_position = Some(position);
        self
    }

    pub fn display_mode(mut self, mode: DisplayMode) -> Self {
        self.block.display_mode = Some(mode);
        self
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.block.component_props.insert(key.into(), value.into());
        self
    }

    pub fn decorate(mut self, decorator: DecoratorSpec) -> Self {
        self.block.decorators.push(decorator);
        self
    }

    /// Apply this block only from the member at `index` onward.
    pub fn from_component_index(mut self, index: usize) -> Self {
        self.block.from_component_index = Some(index);
        self
    }

    pub fn done(mut self) -> ElementSetBuilder<P> {
        self.parent.set.shared.push(self.block);
        self.parent
    }
}

// ---------------------------------------------------------------------------
// Build-time validation
// ---------------------------------------------------------------------------

/// Check every path binding of `set` against the descriptor in scope, and
/// that every member can resolve to something renderable.
fn validate_set(set: &ElementSet, schema: Option<&DataDescriptor>) -> Result<(), BuildError> {
    let schema = set.scope.as_deref().or(schema);
    for member in &set.members {
        if let Some(Binding::Path(path)) = &member.options.binding {
            if let Some(descriptor) = schema {
                validate_path(descriptor, path)?;
            }
        }
        let has_meta = schema
            .zip(binding_attribute(&member.options))
            .map(|(s, attr)| s.has(&attr))
            .unwrap_or(false);
        if member.component_name.is_none() && member.options.binding.is_none() && !has_meta {
            return Err(BuildError::UnresolvableElement {
                label: member
                    .options
                    .test_id
                    .clone()
                    .unwrap_or_else(|| "<anonymous>".to_owned()),
            });
        }

        if let Some(containing) = &member.containing {
            let child_schema = member
                .options
                .binding
                .as_ref()
                .and_then(|b| match b {
                    Binding::Path(p) => Some(p.as_str()),
                    Binding::Func(_) => None,
                })
                .and_then(|p| DataPath::parse(p).last_key().map(str::to_owned))
                .and_then(|attr| schema.and_then(|s| s.element_shape(&attr)));
            validate_set(containing, child_schema.as_deref())?;
        }
    }
    Ok(())
}

fn binding_attribute(options: &ElementDescriptor) -> Option<String> {
    match options.binding.as_ref()? {
        Binding::Path(path) => DataPath::parse(path).last_key().map(str::to_owned),
        Binding::Func(_) => None,
    }
}

/// Walk `path` through the descriptor, crossing element shapes. Keys the
/// descriptor chain cannot see (past an attribute without an element shape)
/// are accepted; declared shapes must match.
fn validate_path(schema: &DataDescriptor, path: &str) -> Result<(), BuildError> {
    let mut current = Some(schema.clone());
    for segment in DataPath::parse(path).segments() {
        let Some(key) = segment.as_key() else { continue };
        let next = match current.as_ref() {
            None => break,
            Some(descriptor) => match descriptor.get(key) {
                Some(meta) => meta.element.as_deref().cloned(),
                None => {
                    return Err(BuildError::UnknownAttribute {
                        attribute: key.to_owned(),
                        descriptor: descriptor.name.clone(),
                    })
                }
            },
        };
        current = next;
    }
    Ok(())
}

/// Resolve every `OnBuild` expression in the tree to a literal. Build-time
/// expressions read no live data; they see build settings only. A failing
/// expression resolves to `Null` and is logged.
fn resolve_on_build(set: &mut ElementSet, settings: &BuildSettings) {
    let (_data, ctx) = RenderContext::detached(Rc::new(settings.clone()));
    resolve_set_on_build(set, &ctx);
}

fn resolve_set_on_build(set: &mut ElementSet, ctx: &RenderContext) {
    for member in &mut set.members {
        let options = &mut member.options;
        for prop in [
            &mut options.hidden,
            &mut options.disabled,
            &mut options.error,
            &mut options.helper_text,
            &mut options.label,
        ] {
            if let Some(Prop::Expr(expr)) = prop {
                if expr.execution == ExecutionPlan::OnBuild {
                    let value = expr.expr.call(ctx).unwrap_or_else(|err| {
                        tracing::warn!(error = %err, "build-time expression failed");
                        Value::Null
                    });
                    *prop = Some(Prop::Literal(value));
                }
            }
        }
        if let Some(containing) = &mut member.containing {
            resolve_set_on_build(containing, ctx);
        }
    }
}
