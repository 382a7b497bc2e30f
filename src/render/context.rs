//! The context handed to binding functions and prop expressions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::data::observe::{DataScope, ObservedData};
use crate::data::path::DataPath;
use crate::plan::model::BuildSettings;
use crate::registry::DisplayMode;

/// Settings supplied by the host for one render-engine mount.
#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    /// Default display mode for nodes that do not declare one.
    pub display_mode: DisplayMode,
    /// Prefixed onto generated test ids, when set.
    pub test_id_prefix: Option<String>,
    /// Free-form host values visible to expressions.
    pub values: Map<String, Value>,
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = mode;
        self
    }

    pub fn test_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.test_id_prefix = Some(prefix.into());
        self
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// What a binding function sees: the root and locally scoped data (both
/// observed), build/render settings, and a scratch map for transient values.
#[derive(Clone)]
pub struct RenderContext {
    pub root: DataScope,
    pub local: DataScope,
    pub build_settings: Rc<BuildSettings>,
    pub render_settings: Rc<RenderSettings>,
    temps: Rc<RefCell<Map<String, Value>>>,
}

impl RenderContext {
    pub(crate) fn new(
        root: DataScope,
        local: DataScope,
        build_settings: Rc<BuildSettings>,
        render_settings: Rc<RenderSettings>,
        temps: Rc<RefCell<Map<String, Value>>>,
    ) -> Self {
        Self {
            root,
            local,
            build_settings,
            render_settings,
            temps,
        }
    }

    /// A context over fresh empty data; used to resolve build-time
    /// expressions, which by definition read no live data.
    pub(crate) fn detached(build_settings: Rc<BuildSettings>) -> (ObservedData, Self) {
        let data = ObservedData::new(Value::Null);
        let ctx = Self {
            root: data.root(),
            local: data.root(),
            build_settings,
            render_settings: Rc::new(RenderSettings::default()),
            temps: Rc::new(RefCell::new(Map::new())),
        };
        (data, ctx)
    }

    /// The same context with a different local scope.
    pub(crate) fn with_local(&self, local: DataScope) -> Self {
        Self {
            local,
            ..self.clone()
        }
    }

    /// Read a dotted path from the local scope. Missing resolves to `Null`.
    pub fn get(&self, path: &str) -> Value {
        self.local
            .get_path(&DataPath::parse(path))
            .unwrap_or(Value::Null)
    }

    /// Read a dotted path from the data root. Missing resolves to `Null`.
    pub fn get_root(&self, path: &str) -> Value {
        self.root
            .get_path(&DataPath::parse(path))
            .unwrap_or(Value::Null)
    }

    /// Store a transient value for later steps of the same pass.
    pub fn set_temp(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.temps.borrow_mut().insert(key.into(), value.into());
    }

    /// Read a transient value.
    pub fn temp(&self, key: &str) -> Option<Value> {
        self.temps.borrow().get(key).cloned()
    }

    /// A build-time setting value.
    pub fn build_setting(&self, key: &str) -> Option<&Value> {
        self.build_settings.values.get(key)
    }

    /// A render-time setting value.
    pub fn render_setting(&self, key: &str) -> Option<&Value> {
        self.render_settings.values.get(key)
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_over(data: Value) -> (ObservedData, RenderContext) {
        let observed = ObservedData::new(data);
        let ctx = RenderContext::new(
            observed.root(),
            observed.root(),
            Rc::new(BuildSettings::new()),
            Rc::new(RenderSettings::new()),
            Rc::new(RefCell::new(Map::new())),
        );
        (observed, ctx)
    }

    #[test]
    fn get_reads_local_path() {
        let (_data, ctx) = ctx_over(json!({"user": {"email": "a@b.com"}}));
        assert_eq!(ctx.get("user.email"), json!("a@b.com"));
        assert_eq!(ctx.get("user.missing"), Value::Null);
    }

    #[test]
    fn with_local_rebinds_scope() {
        let (data, ctx) = ctx_over(json!({"user": {"email": "a@b.com"}}));
        let scoped = ctx.with_local(data.root().scope("user"));
        assert_eq!(scoped.get("email"), json!("a@b.com"));
        // Root access still sees the whole object.
        assert_eq!(scoped.get_root("user.email"), json!("a@b.com"));
    }

    #[test]
    fn temps_round_trip() {
        let (_data, ctx) = ctx_over(json!({}));
        ctx.set_temp("subtotal", 41);
        assert_eq!(ctx.temp("subtotal"), Some(json!(41)));
        assert_eq!(ctx.temp("missing"), None);
    }

    #[test]
    fn settings_visible() {
        let observed = ObservedData::new(json!({}));
        let ctx = RenderContext::new(
            observed.root(),
            observed.root(),
            Rc::new(BuildSettings::new().value("tenant", "acme")),
            Rc::new(RenderSettings::new().value("locale", "en")),
            Rc::new(RefCell::new(Map::new())),
        );
        assert_eq!(ctx.build_setting("tenant"), Some(&json!("acme")));
        assert_eq!(ctx.render_setting("locale"), Some(&json!("en")));
    }
}
