//! The render engine and its output model.

pub mod context;
pub mod engine;
pub mod merge;
pub mod output;

pub use context::{RenderContext, RenderSettings};
pub use engine::{Mount, RenderEngine};
pub use output::{InstantiationNode, NodeState, Rendered, RenderNodeId, ResolvedProps, SubRender};
