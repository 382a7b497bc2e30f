//! Input strategies: pattern-resolved formatting, parsing, and adornment
//! behavior for leaf inputs, plus the pluggable expression parsers.

pub mod expr;
pub mod format;
pub mod key;
pub mod resolver;

pub use expr::{
    DateMathParser, ExpressionParser, ExpressionParserRegistry, MathParser, PercentageParser,
};
pub use format::{
    DateStrategy, Formatter, MoneyStrategy, NegativeStyle, NumberStrategy, ParseOutcome,
    PercentStrategy, TextPassthrough, ValueParser,
};
pub use key::{StrategyKey, StrategyPattern};
pub use resolver::{Alignment, InputStrategy, StrategyFactory, StrategyResolver};
