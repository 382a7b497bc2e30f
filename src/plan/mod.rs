//! Authoring layer: the fluent builder and the immutable plan it produces.

pub mod builder;
pub mod descriptor;
pub mod model;
pub mod schema;

pub use builder::{
    AcceptsChildren, ComponentKind, ElementBuilder, ElementSetBuilder, PlanBuilder, SetHost,
    SharedPropsBuilder, TableBuilderExt,
};
pub use descriptor::{
    Binding, DecoratorSpec, ElementDescriptor, ExecutionPlan, ExpressionProp, LabelPosition, Prop,
    PropFn, SharedPropsBlock,
};
pub use model::{
    BuildSettings, ElementSet, ElementSetMember, MemberOrigin, Plan, PlanRule,
};
pub use schema::{AttributeMeta, DataDescriptor};
