//! Shared-prop inheritance and schema defaulting.
//!
//! Priority, weakest to strongest: schema-derived defaults, inherited shared
//! props (ancestor blocks weakest, nearest-declared strongest), the element's
//! own explicit options. All merging is "set fields win over unset", the
//! same shape as a style cascade.

use crate::plan::descriptor::{
    DecoratorSpec, ElementDescriptor, LabelPosition, Prop, SharedPropsBlock,
};
use crate::plan::schema::AttributeMeta;
use crate::registry::DisplayMode;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Effective shared props
// ---------------------------------------------------------------------------

/// The flattened result of applying a chain of shared-prop blocks.
#[derive(Debug, Clone, Default)]
pub struct EffectiveShared {
    pub label_position: Option<LabelPosition>,
    pub display_mode: Option<DisplayMode>,
    pub component_props: Map<String, Value>,
    pub decorators: Vec<DecoratorSpec>,
}

impl EffectiveShared {
    /// Apply one block on top: its set fields override, component props merge
    /// per key, a non-empty decorator list replaces the inherited one.
    fn apply(&mut self, block: &SharedPropsBlock) {
        if block.label_position.is_some() {
            self.label_position = block.label_position;
        }
        if block.display_mode.is_some() {
            self.display_mode = block.display_mode;
        }
        for (k, v) in &block.component_props {
            self.component_props.insert(k.clone(), v.clone());
        }
        if !block.decorators.is_empty() {
            self.decorators = block.decorators.clone();
        }
    }
}

/// Compute the shared props effective for the member at `member_index`.
///
/// Blocks whose `from_component_index` is past the member are skipped; the
/// rest are applied in ascending `from_component_index` order (whole-set
/// blocks first) on top of the inherited ancestor state, so the
/// nearest-declared block wins.
pub fn effective_shared(
    inherited: &EffectiveShared,
    blocks: &[SharedPropsBlock],
    member_index: usize,
) -> EffectiveShared {
    let mut applicable: Vec<&SharedPropsBlock> = blocks
        .iter()
        .filter(|b| b.from_component_index.map_or(true, |from| from <= member_index))
        .collect();
    applicable.sort_by_key(|b| b.from_component_index.unwrap_or(0));

    let mut effective = inherited.clone();
    for block in applicable {
        effective.apply(block);
    }
    effective
}

/// Shared props as weak element defaults, for the cascade merge.
pub fn shared_defaults(shared: &EffectiveShared) -> ElementDescriptor {
    ElementDescriptor {
        label_position: shared.label_position,
        display_mode: shared.display_mode,
        component_props: shared.component_props.clone(),
        decorators: shared.decorators.clone(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Schema defaulting
// ---------------------------------------------------------------------------

/// Attribute metadata as the weakest layer of element defaults. Only fields
/// the metadata actually sets are produced; an entirely unset field stays
/// unset rather than defaulting to false/empty.
pub fn schema_defaults(meta: &AttributeMeta) -> ElementDescriptor {
    ElementDescriptor {
        label: meta.label.as_deref().map(Prop::from),
        helper_text: meta.helper_text.as_deref().map(Prop::from),
        disabled: meta.disabled.map(Prop::from),
        hidden: meta.hidden.map(Prop::from),
        error: meta.error.as_deref().map(Prop::from),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(from: Option<usize>) -> SharedPropsBlock {
        SharedPropsBlock {
            from_component_index: from,
            ..Default::default()
        }
    }

    #[test]
    fn whole_set_block_applies_everywhere() {
        let mut b = block(None);
        b.label_position = Some(LabelPosition::Left);
        let effective = effective_shared(&EffectiveShared::default(), &[b], 0);
        assert_eq!(effective.label_position, Some(LabelPosition::Left));
    }

    #[test]
    fn indexed_block_skips_earlier_members() {
        let mut b = block(Some(2));
        b.display_mode = Some(DisplayMode::Readonly);
        let blocks = [b];

        let before = effective_shared(&EffectiveShared::default(), &blocks, 1);
        assert_eq!(before.display_mode, None);
        let at = effective_shared(&EffectiveShared::default(), &blocks, 2);
        assert_eq!(at.display_mode, Some(DisplayMode::Readonly));
        let after = effective_shared(&EffectiveShared::default(), &blocks, 5);
        assert_eq!(after.display_mode, Some(DisplayMode::Readonly));
    }

    #[test]
    fn later_index_overrides_earlier() {
        let mut a = block(None);
        a.label_position = Some(LabelPosition::Above);
        a.component_props.insert("width".into(), json!("narrow"));
        let mut b = block(Some(1));
        b.label_position = Some(LabelPosition::Inline);
        b.component_props.insert("width".into(), json!("wide"));

        // Declared out of order on purpose; ascending from_component_index wins.
        let effective = effective_shared(&EffectiveShared::default(), &[b, a], 3);
        assert_eq!(effective.label_position, Some(LabelPosition::Inline));
        assert_eq!(effective.component_props["width"], json!("wide"));
    }

    #[test]
    fn nearest_declared_beats_ancestor() {
        let mut ancestor = EffectiveShared::default();
        ancestor.label_position = Some(LabelPosition::Above);
        ancestor.component_props.insert("size".into(), json!("s"));

        let mut b = block(None);
        b.label_position = Some(LabelPosition::Left);

        let effective = effective_shared(&ancestor, &[b], 0);
        assert_eq!(effective.label_position, Some(LabelPosition::Left));
        // Untouched ancestor props survive.
        assert_eq!(effective.component_props["size"], json!("s"));
    }

    #[test]
    fn decorators_replace_when_redeclared() {
        let mut ancestor = EffectiveShared::default();
        ancestor.decorators = vec![DecoratorSpec::new("Frame")];

        let mut b = block(None);
        b.decorators = vec![DecoratorSpec::new("Highlight")];
        let effective = effective_shared(&ancestor, &[b], 0);
        assert_eq!(effective.decorators.len(), 1);
        assert_eq!(effective.decorators[0].component_name, "Highlight");

        // A block without decorators keeps the inherited set.
        let effective = effective_shared(&ancestor, &[block(None)], 0);
        assert_eq!(effective.decorators[0].component_name, "Frame");
    }

    #[test]
    fn schema_defaults_only_set_fields() {
        let meta = AttributeMeta::new().label("User Email");
        let defaults = schema_defaults(&meta);
        assert_eq!(defaults.label.unwrap().as_literal(), Some(&json!("User Email")));
        assert!(defaults.disabled.is_none());
        assert!(defaults.hidden.is_none());
    }

    #[test]
    fn explicit_beats_shared_beats_schema() {
        let schema = schema_defaults(&AttributeMeta::new().label("Schema Label"));
        let mut shared = EffectiveShared::default();
        shared.label_position = Some(LabelPosition::Left);

        let explicit = ElementDescriptor {
            label: Some("Explicit Label".into()),
            ..Default::default()
        };

        let merged = explicit
            .merge_over(&shared_defaults(&shared))
            .merge_over(&schema);
        assert_eq!(
            merged.label.unwrap().as_literal(),
            Some(&json!("Explicit Label"))
        );
        assert_eq!(merged.label_position, Some(LabelPosition::Left));
    }
}
