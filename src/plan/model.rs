//! The built plan tree: element sets, members, and plan metadata.
//!
//! A [`Plan`] is immutable once built and serializable (closures serialize as
//! opaque markers). It is produced once per author-time definition and
//! re-interpreted on every render pass.

use std::rc::Rc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::plan::descriptor::{ElementDescriptor, ExpressionProp, SharedPropsBlock};
use crate::plan::schema::DataDescriptor;

// ---------------------------------------------------------------------------
// Element sets
// ---------------------------------------------------------------------------

/// Whether a member came from the fluent chain or was supplied pre-built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemberOrigin {
    Authored,
    Prebuilt,
}

/// A named slot in an ordered element sequence. Order is significant: it
/// drives default layout and the `from_component_index` filter of shared
/// prop blocks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSetMember {
    pub component_name: Option<String>,
    pub options: ElementDescriptor,
    pub containing: Option<ElementSet>,
    pub origin: MemberOrigin,
}

impl ElementSetMember {
    pub fn new(options: ElementDescriptor) -> Self {
        Self {
            component_name: None,
            options,
            containing: None,
            origin: MemberOrigin::Authored,
        }
    }
}

/// An ordered sequence of members plus the shared-prop blocks declared at
/// this level and the data shape in scope here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ElementSet {
    pub members: Vec<ElementSetMember>,
    pub shared: Vec<SharedPropsBlock>,
    /// Shape of the locally scoped data, when declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Rc<DataDescriptor>>,
}

impl ElementSet {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A named plan-level expression, evaluated once per render pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRule {
    pub name: String,
    pub expression: ExpressionProp,
}

/// Settings fixed at build time and visible to expressions via the render
/// context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildSettings {
    pub values: Map<String, Value>,
}

impl BuildSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// The immutable, built declarative UI tree plus its metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub version: String,
    pub rules: Vec<PlanRule>,
    /// `(display type tag, component name)` pairs; first match wins.
    pub display_type_map: Vec<(String, String)>,
    pub main: ElementSet,
    pub build_settings: BuildSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Rc<DataDescriptor>>,
}

impl Plan {
    /// Look up a component name for a display type tag.
    pub fn component_for_display_type(&self, tag: &str) -> Option<&str> {
        self.display_type_map
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, c)| c.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::descriptor::Binding;

    fn minimal_plan() -> Plan {
        let mut options = ElementDescriptor::new();
        options.binding = Some(Binding::path("email"));
        let member = ElementSetMember {
            component_name: Some("TextInput".into()),
            options,
            containing: None,
            origin: MemberOrigin::Authored,
        };
        Plan {
            id: "user-form".into(),
            name: "User Form".into(),
            version: "1".into(),
            rules: Vec::new(),
            display_type_map: vec![
                ("text".into(), "TextInput".into()),
                ("money".into(), "MoneyInput".into()),
            ],
            main: ElementSet {
                members: vec![member],
                shared: Vec::new(),
                scope: None,
            },
            build_settings: BuildSettings::new(),
            schema: None,
        }
    }

    #[test]
    fn display_type_lookup() {
        let plan = minimal_plan();
        assert_eq!(plan.component_for_display_type("money"), Some("MoneyInput"));
        assert_eq!(plan.component_for_display_type("date"), None);
    }

    #[test]
    fn plan_serializes() {
        let plan = minimal_plan();
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["id"], "user-form");
        assert_eq!(value["main"]["members"][0]["componentName"], "TextInput");
    }

    #[test]
    fn first_display_type_match_wins() {
        let mut plan = minimal_plan();
        plan.display_type_map.push(("text".into(), "Other".into()));
        assert_eq!(plan.component_for_display_type("text"), Some("TextInput"));
    }
}
