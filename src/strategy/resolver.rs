//! Pattern-matched resolution of input strategies.
//!
//! Resolution order, tightest first: the most specific matching registered
//! pattern (exact key, then partial hints, then wildcards), a per-data-type
//! factory fallback, and finally the universal text passthrough. Ties in
//! specificity go to the first-registered pattern; this is a deliberate,
//! tested policy, not an accident of iteration order.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::strategy::expr::ExpressionParserRegistry;
use crate::strategy::format::{
    DateStrategy, Formatter, MoneyStrategy, NumberStrategy, PercentStrategy, TextPassthrough,
    ValueParser,
};
use crate::strategy::key::{StrategyKey, StrategyPattern};

// ---------------------------------------------------------------------------
// InputStrategy
// ---------------------------------------------------------------------------

/// Horizontal alignment of an input's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

/// The composable behavior bundle a leaf input consults: alignment,
/// adornment text, formatter, parser. Every part is optional; an absent
/// part means "component default".
#[derive(Clone, Default)]
pub struct InputStrategy {
    pub alignment: Option<Alignment>,
    pub adornment: Option<String>,
    pub formatter: Option<Rc<dyn Formatter>>,
    pub parser: Option<Rc<dyn ValueParser>>,
}

impl InputStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn adornment(mut self, adornment: impl Into<String>) -> Self {
        self.adornment = Some(adornment.into());
        self
    }

    pub fn formatter(mut self, formatter: Rc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn parser(mut self, parser: Rc<dyn ValueParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Format through the strategy's formatter, falling back to text
    /// passthrough.
    pub fn format(&self, value: &Value) -> String {
        match &self.formatter {
            Some(f) => f.format(value),
            None => TextPassthrough.format(value),
        }
    }

    /// Parse through the strategy's parser, falling back to text
    /// passthrough.
    pub fn parse(&self, input: &str) -> crate::strategy::format::ParseOutcome {
        match &self.parser {
            Some(p) => p.parse(input),
            None => TextPassthrough.parse(input),
        }
    }
}

impl fmt::Debug for InputStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStrategy")
            .field("alignment", &self.alignment)
            .field("adornment", &self.adornment)
            .field("has_formatter", &self.formatter.is_some())
            .field("has_parser", &self.parser.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StrategyResolver
// ---------------------------------------------------------------------------

/// Constructs a default strategy for a data type when no pattern matched.
/// The key is passed so factories can honor hints (`dp2`, `accounting`).
pub type StrategyFactory = Rc<dyn Fn(&StrategyKey) -> InputStrategy>;

/// The pattern registry plus fallbacks.
pub struct StrategyResolver {
    /// Registration order is the specificity tie-break.
    patterns: Vec<(StrategyPattern, InputStrategy)>,
    factories: HashMap<String, StrategyFactory>,
    expressions: ExpressionParserRegistry,
}

impl StrategyResolver {
    /// An empty resolver: everything falls through to text passthrough.
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
            factories: HashMap::new(),
            expressions: ExpressionParserRegistry::new(),
        }
    }

    /// A resolver with the built-in expression parsers and per-data-type
    /// factories for `text`, `number`, `money`, `percent`, `date`.
    pub fn with_defaults() -> Self {
        let mut resolver = Self {
            patterns: Vec::new(),
            factories: HashMap::new(),
            expressions: ExpressionParserRegistry::with_defaults(),
        };

        let math = resolver.expressions.by_id("math");
        let date = resolver.expressions.by_id("date");

        resolver.register_factory("text", |_| {
            InputStrategy::new()
                .alignment(Alignment::Left)
                .formatter(Rc::new(TextPassthrough))
                .parser(Rc::new(TextPassthrough))
        });

        let math_for_number = math.clone();
        resolver.register_factory("number", move |key| {
            let mut strategy = NumberStrategy::new();
            if let Some(places) = decimal_places_hint(key) {
                strategy = strategy.decimal_places(places);
            }
            if let Some(math) = &math_for_number {
                strategy = strategy.expression(math.clone());
            }
            let strategy = Rc::new(strategy);
            InputStrategy::new()
                .alignment(Alignment::Right)
                .formatter(strategy.clone())
                .parser(strategy)
        });

        resolver.register_factory("money", move |key| {
            let mut strategy = MoneyStrategy::new();
            if let Some(places) = decimal_places_hint(key) {
                strategy = strategy.decimal_places(places);
            }
            if key.hints.iter().any(|h| h == "accounting") {
                strategy =
                    strategy.negative_style(crate::strategy::format::NegativeStyle::Parentheses);
            }
            if let Some(math) = &math {
                strategy = strategy.expression(math.clone());
            }
            let strategy = Rc::new(strategy);
            InputStrategy::new()
                .alignment(Alignment::Right)
                .adornment("$")
                .formatter(strategy.clone())
                .parser(strategy)
        });

        resolver.register_factory("percent", |_| {
            let strategy = Rc::new(PercentStrategy::new());
            InputStrategy::new()
                .alignment(Alignment::Right)
                .adornment("%")
                .formatter(strategy.clone())
                .parser(strategy)
        });

        resolver.register_factory("date", move |_| {
            let mut strategy = DateStrategy::new();
            if let Some(date) = &date {
                strategy = strategy.expression(date.clone());
            }
            let strategy = Rc::new(strategy);
            InputStrategy::new()
                .alignment(Alignment::Left)
                .formatter(strategy.clone())
                .parser(strategy)
        });

        resolver
    }

    /// Register a pattern-keyed strategy. Earlier registrations win
    /// specificity ties.
    pub fn register(&mut self, pattern: &str, strategy: InputStrategy) {
        self.patterns.push((StrategyPattern::parse(pattern), strategy));
    }

    /// Register the default-strategy factory for one data type.
    pub fn register_factory(
        &mut self,
        data_type: impl Into<String>,
        factory: impl Fn(&StrategyKey) -> InputStrategy + 'static,
    ) {
        self.factories.insert(data_type.into(), Rc::new(factory));
    }

    /// The expression-parser registry, for plugin registration.
    pub fn expressions_mut(&mut self) -> &mut ExpressionParserRegistry {
        &mut self.expressions
    }

    /// Resolve the strategy for a key. Never fails: the universal text
    /// passthrough is the final fallback.
    pub fn resolve(&self, key: &StrategyKey) -> InputStrategy {
        let mut best: Option<(&StrategyPattern, &InputStrategy)> = None;
        for (pattern, strategy) in &self.patterns {
            if !pattern.matches(key) {
                continue;
            }
            // Strictly-greater keeps the first-registered pattern on ties.
            let better = match best {
                Some((current, _)) => pattern.specificity() > current.specificity(),
                None => true,
            };
            if better {
                best = Some((pattern, strategy));
            }
        }
        if let Some((pattern, strategy)) = best {
            tracing::debug!(key = %key, pattern = %pattern, "strategy resolved by pattern");
            return strategy.clone();
        }

        if let Some(factory) = self.factories.get(&key.data_type) {
            tracing::debug!(key = %key, "strategy resolved by data-type factory");
            return factory(key);
        }

        tracing::debug!(key = %key, "strategy fell back to text passthrough");
        InputStrategy::new()
            .formatter(Rc::new(TextPassthrough))
            .parser(Rc::new(TextPassthrough))
    }

    /// Convenience: resolve from the raw key parts.
    pub fn resolve_parts(&self, data_type: &str, display_mode: &str, hints: &[&str]) -> InputStrategy {
        self.resolve(&StrategyKey::new(data_type, display_mode, hints))
    }
}

impl Default for StrategyResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StrategyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyResolver")
            .field("patterns", &self.patterns.len())
            .field("factories", &self.factories.len())
            .finish()
    }
}

/// `dpN` hint → N decimal places.
fn decimal_places_hint(key: &StrategyKey) -> Option<u8> {
    key.hints
        .iter()
        .find_map(|h| h.strip_prefix("dp").and_then(|n| n.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tightest_pattern_wins() {
        let mut resolver = StrategyResolver::new();
        resolver.register("number:*", InputStrategy::new().adornment("loose"));
        resolver.register(
            "number:editing:dp2",
            InputStrategy::new().adornment("tight"),
        );

        let exact = resolver.resolve(&StrategyKey::parse("number:editing:dp2"));
        assert_eq!(exact.adornment.as_deref(), Some("tight"));

        // No exact pattern for dp3; the wildcard catches it.
        let fallback = resolver.resolve(&StrategyKey::parse("number:editing:dp3"));
        assert_eq!(fallback.adornment.as_deref(), Some("loose"));
    }

    #[test]
    fn first_registered_wins_ties() {
        let mut resolver = StrategyResolver::new();
        resolver.register("number:editing", InputStrategy::new().adornment("first"));
        resolver.register("number:editing", InputStrategy::new().adornment("second"));
        let resolved = resolver.resolve(&StrategyKey::parse("number:editing"));
        assert_eq!(resolved.adornment.as_deref(), Some("first"));
    }

    #[test]
    fn factory_fallback_when_no_pattern_matches() {
        let resolver = StrategyResolver::with_defaults();
        let strategy = resolver.resolve_parts("number", "editing", &["dp2"]);
        assert_eq!(strategy.alignment, Some(Alignment::Right));
        assert_eq!(strategy.format(&json!(12.5)), "12.50");
    }

    #[test]
    fn pattern_beats_factory() {
        let mut resolver = StrategyResolver::with_defaults();
        resolver.register("number:readonly", InputStrategy::new().adornment("#"));
        let resolved = resolver.resolve_parts("number", "readonly", &[]);
        assert_eq!(resolved.adornment.as_deref(), Some("#"));
    }

    #[test]
    fn universal_text_fallback() {
        let resolver = StrategyResolver::new();
        let strategy = resolver.resolve_parts("mystery", "editing", &[]);
        assert!(strategy.alignment.is_none());
        assert_eq!(strategy.format(&json!("x")), "x");
        assert!(strategy.parse("anything").is_parsed());
    }

    #[test]
    fn money_factory_honors_hints() {
        let resolver = StrategyResolver::with_defaults();
        let strategy = resolver.resolve_parts("money", "editing", &["accounting"]);
        assert_eq!(strategy.format(&json!(-12.5)), "(12.50)");
        assert_eq!(strategy.parse("(12.50)").value(), Some(&json!(-12.5)));
    }

    #[test]
    fn number_factory_wires_math_expressions() {
        let resolver = StrategyResolver::with_defaults();
        let strategy = resolver.resolve_parts("number", "editing", &[]);
        assert_eq!(strategy.parse("2+3").value(), Some(&json!(5.0)));
    }

    #[test]
    fn date_factory_wires_date_expressions() {
        let resolver = StrategyResolver::with_defaults();
        let strategy = resolver.resolve_parts("date", "editing", &[]);
        // `t` always parses, whatever today is.
        assert!(strategy.parse("t").is_parsed());
        assert!(strategy.parse("2024-03-01").is_parsed());
        assert!(!strategy.parse("soon").is_parsed());
    }
}
