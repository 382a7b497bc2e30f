//! The render engine: interprets a built plan against observed data.
//!
//! One [`Mount`] per rendered tree: it owns the observed data object, a
//! slotmap arena of live nodes, and the dirty queue that change
//! notifications feed. Rendering is recursive and depth-first, one pass per
//! element set; re-rendering is scoped to the nodes whose bound data
//! actually changed.
//!
//! Nothing in here panics on bad input: a failing binding marks its node, an
//! unregistered component logs and renders nothing, and every error is
//! surfaced as rendered state rather than crossing the engine boundary.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::{Map, Value};
use slotmap::SlotMap;

use crate::data::bus::{index_key, parse_index_key, SubscriptionId};
use crate::data::observe::{Access, DataScope, ObservedData, ValueSetter};
use crate::data::path::{DataPath, PathSegment};
use crate::plan::descriptor::{Binding, DecoratorSpec, ElementDescriptor, ExecutionPlan, Prop};
use crate::plan::model::{ElementSet, ElementSetMember, Plan};
use crate::plan::schema::{AttributeMeta, DataDescriptor};
use crate::registry::{ComponentRegistry, ComponentWrapper, DisplayMode};
use crate::render::context::{RenderContext, RenderSettings};
use crate::render::merge::{effective_shared, schema_defaults, shared_defaults, EffectiveShared};
use crate::render::output::{
    InstantiationNode, NodeState, Rendered, RenderNodeId, ResolvedProps, SubRender,
};

// ---------------------------------------------------------------------------
// RenderEngine
// ---------------------------------------------------------------------------

/// Entry point: holds the component registry and mounts plans.
#[derive(Debug)]
pub struct RenderEngine {
    registry: Rc<ComponentRegistry>,
}

impl RenderEngine {
    pub fn new(registry: Rc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// Interpret `plan` against `data`, producing a live mount.
    pub fn mount(&self, plan: Rc<Plan>, data: Value, settings: RenderSettings) -> Mount {
        let observed = ObservedData::new(data);
        let mount = Mount {
            registry: self.registry.clone(),
            build_settings: Rc::new(plan.build_settings.clone()),
            render_settings: Rc::new(settings),
            plan,
            data: observed,
            nodes: RefCell::new(SlotMap::with_key()),
            roots: RefCell::new(Vec::new()),
            dirty: Rc::new(RefCell::new(Vec::new())),
            rule_results: RefCell::new(Map::new()),
            temps: Rc::new(RefCell::new(Map::new())),
        };
        mount.initial_render();
        mount
    }
}

// ---------------------------------------------------------------------------
// Mount internals
// ---------------------------------------------------------------------------

/// Arena slot for one live node: everything needed to re-render it in place.
struct NodeSlot {
    member: ElementSetMember,
    /// Shared props effective at this member (ancestors + own set, filtered
    /// by member index, already flattened).
    shared: EffectiveShared,
    /// Path of the local data scope this node renders against.
    scope_path: DataPath,
    schema: Option<Rc<DataDescriptor>>,
    state: NodeState,
    props: ResolvedProps,
    component: Option<(String, DisplayMode)>,
    wrapper: Option<ComponentWrapper>,
    decorators: Vec<DecoratorSpec>,
    children: Vec<RenderNodeId>,
    subscriptions: Vec<SubscriptionId>,
}

/// A live rendered tree: observed data, node arena, dirty queue.
pub struct Mount {
    registry: Rc<ComponentRegistry>,
    plan: Rc<Plan>,
    data: ObservedData,
    build_settings: Rc<crate::plan::model::BuildSettings>,
    render_settings: Rc<RenderSettings>,
    nodes: RefCell<SlotMap<RenderNodeId, NodeSlot>>,
    roots: RefCell<Vec<RenderNodeId>>,
    dirty: Rc<RefCell<Vec<RenderNodeId>>>,
    rule_results: RefCell<Map<String, Value>>,
    temps: Rc<RefCell<Map<String, Value>>>,
}

impl Mount {
    // -----------------------------------------------------------------------
    // Public surface
    // -----------------------------------------------------------------------

    /// Assemble the current instantiation-request tree.
    pub fn output(&self) -> Vec<Rendered> {
        let roots = self.roots.borrow().clone();
        roots.iter().map(|id| self.assemble(*id)).collect()
    }

    /// Re-render every node whose bound data changed since the last flush.
    pub fn process_changes(&self) {
        // Re-running a node may dirty further nodes; drain until quiet.
        loop {
            let batch: Vec<RenderNodeId> = {
                let mut dirty = self.dirty.borrow_mut();
                let mut seen = HashSet::new();
                dirty.drain(..).filter(|id| seen.insert(*id)).collect()
            };
            if batch.is_empty() {
                break;
            }
            tracing::debug!(count = batch.len(), "re-rendering dirty nodes");
            for id in batch {
                if self.nodes.borrow().contains_key(id) {
                    self.render_node(id);
                }
            }
        }
        self.eval_rules();
    }

    /// Write through the observed data object, then flush dirty nodes.
    /// The sanctioned mutation path: every write is observable.
    pub fn set(&self, path: &str, value: Value) -> Result<(), crate::error::DataError> {
        let full = DataPath::parse(path);
        let (parent, last) = full.split_last().ok_or(crate::error::DataError::EmptyPath)?;
        let scope = self.scope_at(&parent);
        match last {
            PathSegment::Key(key) => scope.set(key, value)?,
            PathSegment::Index(i) => scope.set_index(*i, value)?,
        }
        self.process_changes();
        Ok(())
    }

    /// Snapshot of the current data object.
    pub fn data_snapshot(&self) -> Value {
        self.data.snapshot()
    }

    /// The observed data handle, for hosts that mutate through scopes.
    pub fn data(&self) -> &ObservedData {
        &self.data
    }

    /// Results of the plan-level rules from the last render pass.
    pub fn rule_results(&self) -> Map<String, Value> {
        self.rule_results.borrow().clone()
    }

    /// Number of live nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Number of open data subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.data.bus().subscriber_count()
    }

    /// Tear down one node and its subtree, closing every subscription the
    /// subtree opened.
    pub fn unmount_node(&self, id: RenderNodeId) {
        self.remove_subtree(id);
        self.roots.borrow_mut().retain(|root| *root != id);
    }

    // -----------------------------------------------------------------------
    // Initial render
    // -----------------------------------------------------------------------

    fn initial_render(&self) {
        let plan = self.plan.clone();
        let schema = plan.main.scope.clone().or_else(|| plan.schema.clone());
        let roots = self.render_set(
            &plan.main,
            &DataPath::root(),
            &EffectiveShared::default(),
            schema,
        );
        *self.roots.borrow_mut() = roots;
        self.eval_rules();
    }

    fn eval_rules(&self) {
        let ctx = self.context_at(&DataPath::root());
        let mut results = Map::new();
        for rule in &self.plan.rules {
            match rule.expression.expr.call(&ctx) {
                Ok(value) => {
                    results.insert(rule.name.clone(), value);
                }
                Err(err) => {
                    tracing::warn!(rule = %rule.name, error = %err, "plan rule failed");
                    results.insert(rule.name.clone(), Value::Null);
                }
            }
        }
        *self.rule_results.borrow_mut() = results;
    }

    // -----------------------------------------------------------------------
    // Recursive set rendering
    // -----------------------------------------------------------------------

    fn render_set(
        &self,
        set: &ElementSet,
        scope_path: &DataPath,
        inherited: &EffectiveShared,
        schema: Option<Rc<DataDescriptor>>,
    ) -> Vec<RenderNodeId> {
        let schema = set.scope.clone().or(schema);
        let mut ids = Vec::with_capacity(set.members.len());
        for (index, member) in set.members.iter().enumerate() {
            let shared = effective_shared(inherited, &set.shared, index);
            let id = self.nodes.borrow_mut().insert(NodeSlot {
                member: member.clone(),
                shared,
                scope_path: scope_path.clone(),
                schema: schema.clone(),
                state: NodeState::PendingBinding,
                props: ResolvedProps::default(),
                component: None,
                wrapper: None,
                decorators: Vec::new(),
                children: Vec::new(),
                subscriptions: Vec::new(),
            });
            self.render_node(id);
            ids.push(id);
        }
        ids
    }

    /// Steps 2–8 for one node: merge, hidden check, binding, schema
    /// defaulting, children, component resolution. Idempotent: re-running
    /// tears down the previous subtree and subscriptions first.
    fn render_node(&self, id: RenderNodeId) {
        // Snapshot what we need, then release the borrow: binding evaluation
        // publishes events whose subscribers must be able to reach the queue.
        let (member, shared, scope_path, schema) = {
            let nodes = self.nodes.borrow();
            let Some(slot) = nodes.get(id) else { return };
            (
                slot.member.clone(),
                slot.shared.clone(),
                slot.scope_path.clone(),
                slot.schema.clone(),
            )
        };
        self.teardown(id);

        let ctx = self.context_at(&scope_path);

        // Step 2: shared props as defaults under the element's own options.
        let mut effective = member.options.merge_over(&shared_defaults(&shared));

        // Step 3: hidden short-circuit. No binding, no subscriptions, no
        // instantiation.
        if self.prop_truthy(id, &effective.hidden, &ctx) {
            self.store(id, |slot| {
                slot.state = NodeState::Hidden;
                slot.props = ResolvedProps::default();
            });
            return;
        }

        // Step 4: binding resolution.
        let resolution = self.resolve_binding(id, &effective, &ctx, &scope_path);

        // Step 5: schema defaulting of entirely-unset fields.
        let meta = self.binding_meta(&effective, &resolution, schema.as_deref(), &scope_path);
        if let Some(meta) = &meta {
            effective = effective.merge_over(&schema_defaults(meta));
        }

        // Hidden may only now have arrived from the schema. Subscriptions
        // from step 4 stay open; the short-circuit above covers the rest.
        if self.prop_truthy(id, &effective.hidden, &ctx) {
            self.store(id, |slot| {
                slot.state = NodeState::Hidden;
                slot.props = ResolvedProps::default();
            });
            return;
        }

        // Step 6: children, local data rebound to the resolved record.
        let mut children =
            self.render_children(&member, &effective, &resolution, &scope_path, &schema);

        // Step 7: component resolution.
        let component_name = member
            .component_name
            .clone()
            .or_else(|| {
                meta.as_ref()
                    .and_then(|m| m.preferred_display_component.clone())
            })
            .or_else(|| {
                meta.as_ref()
                    .and_then(|m| m.preferred_display_type.as_deref())
                    .and_then(|tag| self.plan.component_for_display_type(tag))
                    .map(str::to_owned)
            });
        let display_mode = effective
            .display_mode
            .unwrap_or(self.render_settings.display_mode);

        let wrapper = component_name
            .as_deref()
            .and_then(|name| self.registry.resolve(name, display_mode));
        let unregistered = match (&component_name, &wrapper) {
            (Some(name), None) => {
                tracing::warn!(component = %name, ?display_mode, "no component registered");
                true
            }
            (None, _) => {
                tracing::warn!(element = ?member.options.test_id, "element resolves to no component");
                true
            }
            _ => false,
        };

        // Typed kinds can't reach this; runtime-named kinds are checked here
        // against the registry wrapper.
        if let Some(w) = &wrapper {
            if !children.is_empty() && !w.accepts_children {
                tracing::warn!(component = %w.display_name, "leaf component given children; dropping them");
                for child in children.drain(..) {
                    self.remove_subtree(child);
                }
            }
        }

        let props = self.resolve_props(id, &effective, &resolution, &ctx);

        let state = if unregistered {
            NodeState::UnregisteredComponent
        } else {
            match &resolution {
                BindingResolution::Failed(_) => NodeState::Error,
                BindingResolution::Writable { .. } => NodeState::BoundWritable,
                _ => NodeState::BoundReadonly,
            }
        };

        self.store(id, |slot| {
            slot.state = state;
            slot.props = props;
            slot.component = component_name.clone().map(|n| (n, display_mode));
            slot.wrapper = wrapper.clone();
            slot.decorators = effective.decorators.clone();
            slot.children = children.clone();
        });
    }

    // -----------------------------------------------------------------------
    // Binding resolution
    // -----------------------------------------------------------------------

    fn resolve_binding(
        &self,
        id: RenderNodeId,
        effective: &ElementDescriptor,
        ctx: &RenderContext,
        scope_path: &DataPath,
    ) -> BindingResolution {
        match &effective.binding {
            None => BindingResolution::Unbound,
            Some(Binding::Path(path)) => {
                let rel = DataPath::parse(path);
                let value = ctx.local.get_path(&rel).unwrap_or(Value::Null);
                let full = scope_path.join(&rel);
                match full.split_last() {
                    Some((container, PathSegment::Key(key))) => {
                        self.open_subscription(id, &container, key);
                    }
                    Some((container, PathSegment::Index(i))) => {
                        self.open_subscription(id, &container, &index_key(*i));
                    }
                    None => {}
                }
                BindingResolution::Readonly {
                    value,
                    source: Some(rel),
                }
            }
            Some(Binding::Func(f)) => {
                self.data.set_capture(true);
                let result = f.call(ctx);
                let accesses = self.data.drain_accesses();
                self.data.set_capture(false);

                // One durable keyed subscription per distinct property read.
                let distinct: Vec<Access> = {
                    let mut seen = HashSet::new();
                    accesses
                        .into_iter()
                        .filter(|a| seen.insert(a.clone()))
                        .collect()
                };
                for access in &distinct {
                    self.open_subscription(id, &access.path, &access.key);
                }

                match result {
                    Err(err) => {
                        tracing::warn!(error = %err, "binding evaluation failed");
                        BindingResolution::Failed(err.to_string())
                    }
                    Ok(value) => {
                        if distinct.len() == 1 {
                            // Exactly one property read: the binding has a
                            // natural setter and is two-way editable.
                            let access = &distinct[0];
                            let setter = match parse_index_key(&access.key) {
                                Some(i) => self.scope_at(&access.path).index_setter(i),
                                None => self.scope_at(&access.path).setter(&access.key),
                            };
                            BindingResolution::Writable {
                                value,
                                setter,
                                source: access.full_path(),
                            }
                        } else {
                            BindingResolution::Readonly {
                                value,
                                source: None,
                            }
                        }
                    }
                }
            }
        }
    }

    fn open_subscription(&self, id: RenderNodeId, container: &DataPath, key: &str) {
        let dirty = self.dirty.clone();
        let sub = self.scope_at(container).subscribe_key(key, move |_event| {
            dirty.borrow_mut().push(id);
            Ok(())
        });
        self.store(id, |slot| slot.subscriptions.push(sub));
    }

    /// Attribute metadata for the bound property, resolved against the
    /// in-scope descriptor.
    fn binding_meta(
        &self,
        effective: &ElementDescriptor,
        resolution: &BindingResolution,
        schema: Option<&DataDescriptor>,
        scope_path: &DataPath,
    ) -> Option<AttributeMeta> {
        let schema = schema?;
        match (&effective.binding, resolution) {
            (Some(Binding::Path(path)), _) => resolve_meta(schema, &DataPath::parse(path)),
            (Some(Binding::Func(_)), BindingResolution::Writable { source, .. }) => {
                // Only meaningful when the single read happened inside the
                // local scope the descriptor describes.
                let rel = relative_to(source, scope_path)?;
                resolve_meta(schema, &rel)
            }
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Children
    // -----------------------------------------------------------------------

    fn render_children(
        &self,
        member: &ElementSetMember,
        effective: &ElementDescriptor,
        resolution: &BindingResolution,
        scope_path: &DataPath,
        schema: &Option<Rc<DataDescriptor>>,
    ) -> Vec<RenderNodeId> {
        let Some(containing) = &member.containing else {
            return Vec::new();
        };

        // Rebind local data to the resolved record, when the binding names one.
        let record_path = match resolution {
            BindingResolution::Readonly {
                source: Some(rel), ..
            } => scope_path.join(rel),
            BindingResolution::Writable { source, .. } => source.clone(),
            _ => scope_path.clone(),
        };

        let child_schema = containing.scope.clone().or_else(|| {
            schema.as_ref().and_then(|s| {
                let rel = relative_to(&record_path, scope_path)?;
                let attr = rel.segments().first()?.as_key()?;
                s.element_shape(attr)
            })
        });

        let record = self.scope_at(&record_path).value();
        let is_array = matches!(record, Some(Value::Array(_)));
        let shared = EffectiveShared {
            label_position: effective.label_position,
            display_mode: effective.display_mode,
            component_props: Map::new(),
            decorators: Vec::new(),
        };

        if is_array && !effective.use_single_child_for_arrays {
            let len = self
                .scope_at(&record_path)
                .array_len()
                .unwrap_or(0);
            let mut ids = Vec::new();
            for i in 0..len {
                let element_path = record_path.join_index(i);
                ids.extend(self.render_set(containing, &element_path, &shared, child_schema.clone()));
            }
            ids
        } else {
            self.render_set(containing, &record_path, &shared, child_schema)
        }
    }

    // -----------------------------------------------------------------------
    // Props
    // -----------------------------------------------------------------------

    fn resolve_props(
        &self,
        id: RenderNodeId,
        effective: &ElementDescriptor,
        resolution: &BindingResolution,
        ctx: &RenderContext,
    ) -> ResolvedProps {
        let (value, setter, binding_error) = match resolution {
            BindingResolution::Unbound => (None, None, None),
            BindingResolution::Readonly { value, .. } => (Some(value.clone()), None, None),
            BindingResolution::Writable { value, setter, .. } => {
                (Some(value.clone()), Some(setter.clone()), None)
            }
            BindingResolution::Failed(msg) => {
                (Some(Value::Null), None, Some(msg.clone()))
            }
        };

        let mut extra = effective.component_props.clone();
        for (name, binding) in &effective.extra_bindings {
            let resolved = match binding {
                Binding::Path(p) => ctx.local.get_path(&DataPath::parse(p)).unwrap_or(Value::Null),
                Binding::Func(f) => f.call(ctx).unwrap_or(Value::Null),
            };
            extra.insert(name.clone(), resolved);
        }

        let test_id = effective.test_id.as_ref().map(|id| {
            match &self.render_settings.test_id_prefix {
                Some(prefix) => format!("{prefix}{id}"),
                None => id.clone(),
            }
        });

        ResolvedProps {
            value,
            label: self.prop_string(id, &effective.label, ctx),
            disabled: self.prop_truthy(id, &effective.disabled, ctx),
            error: binding_error.or_else(|| self.prop_string(id, &effective.error, ctx)),
            helper_text: self.prop_string(id, &effective.helper_text, ctx),
            test_id,
            label_position: effective.label_position,
            setter,
            extra,
        }
    }

    /// Evaluate one prop for the node `id`. `OnSourceChange` expressions run
    /// inside a capture window: every property they read gets a keyed change
    /// subscription, so the node re-renders when any of those values move.
    fn eval_prop(&self, id: RenderNodeId, prop: &Prop, ctx: &RenderContext) -> Value {
        let expr = match prop {
            Prop::Literal(v) => return v.clone(),
            Prop::Expr(e) => e,
        };

        let tracked = expr.execution == ExecutionPlan::OnSourceChange;
        if tracked {
            self.data.set_capture(true);
        }
        let result = expr.expr.call(ctx);
        if tracked {
            let accesses = self.data.drain_accesses();
            self.data.set_capture(false);
            let mut seen = HashSet::new();
            for access in accesses {
                if seen.insert(access.clone()) {
                    self.open_subscription(id, &access.path, &access.key);
                }
            }
        }

        match result {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(error = %err, "prop expression failed");
                Value::Null
            }
        }
    }

    fn prop_truthy(&self, id: RenderNodeId, prop: &Option<Prop>, ctx: &RenderContext) -> bool {
        prop.as_ref()
            .map(|p| truthy(&self.eval_prop(id, p, ctx)))
            .unwrap_or(false)
    }

    fn prop_string(
        &self,
        id: RenderNodeId,
        prop: &Option<Prop>,
        ctx: &RenderContext,
    ) -> Option<String> {
        let prop = prop.as_ref()?;
        match self.eval_prop(id, prop, ctx) {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    // -----------------------------------------------------------------------
    // Assembly
    // -----------------------------------------------------------------------

    fn assemble(&self, id: RenderNodeId) -> Rendered {
        let (state, component, props, wrapper, decorators, children) = {
            let nodes = self.nodes.borrow();
            let Some(slot) = nodes.get(id) else {
                return Rendered::Nothing;
            };
            (
                slot.state,
                slot.component.clone(),
                slot.props.clone(),
                slot.wrapper.clone(),
                slot.decorators.clone(),
                slot.children.clone(),
            )
        };

        if matches!(state, NodeState::Hidden | NodeState::UnregisteredComponent) {
            return Rendered::Nothing;
        }
        let Some((name, mode)) = component else {
            return Rendered::Nothing;
        };

        let rendered_children: Vec<Rendered> =
            children.iter().map(|c| self.assemble(*c)).collect();

        let mut rendered = match wrapper.as_ref().and_then(|w| w.render.clone()) {
            Some(hook) => {
                // Ad-hoc sub-rendering: render into the arena, assemble, then
                // tear the temporary nodes down again.
                let adhoc = |set: &ElementSet, data: &DataScope| -> Vec<Rendered> {
                    let ids = self.render_set(
                        set,
                        data.path(),
                        &EffectiveShared::default(),
                        set.scope.clone(),
                    );
                    let out = ids.iter().map(|id| self.assemble(*id)).collect();
                    for id in ids {
                        self.remove_subtree(id);
                    }
                    out
                };
                let factory = SubRender::new(&adhoc);
                hook(&props, rendered_children, &factory)
            }
            None => Rendered::node(InstantiationNode {
                component: name.clone(),
                display_mode: mode,
                props,
                children: rendered_children,
                node: Some(id),
            }),
        };

        // Step 8: decorators wrap in declared order, first-declared innermost.
        for decorator in &decorators {
            rendered = Rendered::node(InstantiationNode {
                component: decorator.component_name.clone(),
                display_mode: mode,
                props: ResolvedProps {
                    extra: decorator.props.clone(),
                    ..Default::default()
                },
                children: vec![rendered],
                node: None,
            });
        }
        rendered
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Close this node's subscriptions and remove its children, keeping the
    /// node itself for re-render.
    fn teardown(&self, id: RenderNodeId) {
        let (subs, children) = {
            let mut nodes = self.nodes.borrow_mut();
            let Some(slot) = nodes.get_mut(id) else { return };
            (
                std::mem::take(&mut slot.subscriptions),
                std::mem::take(&mut slot.children),
            )
        };
        self.data.bus().unsubscribe_all(&subs);
        for child in children {
            self.remove_subtree(child);
        }
    }

    /// Remove a node and its whole subtree from the arena, closing every
    /// subscription along the way.
    fn remove_subtree(&self, id: RenderNodeId) {
        let slot = self.nodes.borrow_mut().remove(id);
        let Some(slot) = slot else { return };
        self.data.bus().unsubscribe_all(&slot.subscriptions);
        for child in slot.children {
            self.remove_subtree(child);
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn scope_at(&self, path: &DataPath) -> DataScope {
        let mut scope = self.data.root();
        for segment in path.segments() {
            scope = match segment {
                PathSegment::Key(k) => scope.scope(k),
                PathSegment::Index(i) => scope.index(*i),
            };
        }
        scope
    }

    fn context_at(&self, scope_path: &DataPath) -> RenderContext {
        RenderContext::new(
            self.data.root(),
            self.scope_at(scope_path),
            self.build_settings.clone(),
            self.render_settings.clone(),
            self.temps.clone(),
        )
    }

    fn store(&self, id: RenderNodeId, f: impl FnOnce(&mut NodeSlot)) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(slot) = nodes.get_mut(id) {
            f(slot);
        }
    }

    /// Node state, for inspection and tests.
    pub fn node_state(&self, id: RenderNodeId) -> Option<NodeState> {
        self.nodes.borrow().get(id).map(|slot| slot.state)
    }

    /// Ids of the root nodes.
    pub fn root_ids(&self) -> Vec<RenderNodeId> {
        self.roots.borrow().clone()
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        let roots = self.roots.borrow().clone();
        for id in roots {
            self.remove_subtree(id);
        }
    }
}

impl std::fmt::Debug for Mount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mount")
            .field("plan", &self.plan.id)
            .field("nodes", &self.node_count())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Binding resolution result
// ---------------------------------------------------------------------------

enum BindingResolution {
    /// No binding declared.
    Unbound,
    /// Value resolved, not writable. `source` is the path relative to the
    /// local scope for path bindings, absent for multi-read functions.
    Readonly {
        value: Value,
        source: Option<DataPath>,
    },
    /// Single-property function binding: two-way editable.
    Writable {
        value: Value,
        setter: ValueSetter,
        /// Absolute path of the single property read.
        source: DataPath,
    },
    Failed(String),
}

/// Loose truthiness for prop values: null, false, "", and 0 are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        _ => true,
    }
}

/// Walk a descriptor along a path, crossing into element shapes for nested
/// keys, returning the metadata of the final key.
fn resolve_meta(schema: &DataDescriptor, path: &DataPath) -> Option<AttributeMeta> {
    let mut current = schema.clone();
    let segments = path.segments();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            PathSegment::Key(key) => {
                let meta = current.get(key)?.clone();
                if i + 1 == segments.len() {
                    return Some(meta);
                }
                current = meta.element.as_deref()?.clone();
            }
            // Indexing stays within the element shape already in hand.
            PathSegment::Index(_) => {}
        }
    }
    None
}

/// `full` expressed relative to `base`, if `base` is a prefix.
fn relative_to(full: &DataPath, base: &DataPath) -> Option<DataPath> {
    let full_segments = full.segments();
    let base_segments = base.segments();
    if full_segments.len() < base_segments.len() || &full_segments[..base_segments.len()] != base_segments
    {
        return None;
    }
    Some(DataPath::from_segments(
        full_segments[base_segments.len()..].to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(0)));
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!({})));
    }

    #[test]
    fn relative_to_prefix() {
        let full = DataPath::parse("items[0].qty");
        let base = DataPath::parse("items[0]");
        assert_eq!(relative_to(&full, &base).unwrap().to_string(), "qty");
        assert!(relative_to(&base, &full).is_none());
        assert!(relative_to(&full, &DataPath::parse("other")).is_none());
    }

    #[test]
    fn resolve_meta_nested() {
        use crate::plan::schema::AttributeMeta;
        let line = Rc::new(
            DataDescriptor::new("Line")
                .attribute("qty", AttributeMeta::new().label("Quantity")),
        );
        let order = DataDescriptor::new("Order")
            .attribute("lines", AttributeMeta::new().array_of(line));

        let meta = resolve_meta(&order, &DataPath::parse("lines[0].qty")).unwrap();
        assert_eq!(meta.label.as_deref(), Some("Quantity"));
        assert!(resolve_meta(&order, &DataPath::parse("missing")).is_none());
    }
}
