//! Formatters and parsers for leaf input values.
//!
//! A formatter turns a raw value into a display string; a parser turns a
//! display string back into a raw value. Parse failure is data, not an
//! error: input fields never block typing, so an unparseable string comes
//! back as [`ParseOutcome::Unparsed`] carrying the original input for
//! inline annotation.

use std::fmt;
use std::rc::Rc;

use serde_json::{json, Value};
use time::macros::format_description;
use time::Date;

use crate::strategy::expr::{format_iso_date, ExpressionParser};

// ---------------------------------------------------------------------------
// Traits and outcome
// ---------------------------------------------------------------------------

pub trait Formatter {
    fn format(&self, value: &Value) -> String;
}

pub trait ValueParser {
    fn parse(&self, input: &str) -> ParseOutcome;
}

/// Discriminated parse result. `expression` is set when the value came from
/// a computed expression rather than a literal; the original text is kept
/// for audit and redisplay.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed {
        value: Value,
        expression: Option<String>,
    },
    Unparsed {
        raw_input: String,
        error: String,
    },
}

impl ParseOutcome {
    pub fn parsed(value: Value) -> Self {
        ParseOutcome::Parsed {
            value,
            expression: None,
        }
    }

    pub fn parsed_expression(value: Value, expression: impl Into<String>) -> Self {
        ParseOutcome::Parsed {
            value,
            expression: Some(expression.into()),
        }
    }

    pub fn unparsed(raw_input: impl Into<String>, error: impl Into<String>) -> Self {
        ParseOutcome::Unparsed {
            raw_input: raw_input.into(),
            error: error.into(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed { .. })
    }

    /// The parsed value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ParseOutcome::Parsed { value, .. } => Some(value),
            ParseOutcome::Unparsed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// The universal fallback: strings pass through untouched, other values
/// render via their JSON form.
pub struct TextPassthrough;

impl Formatter for TextPassthrough {
    fn format(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl ValueParser for TextPassthrough {
    fn parse(&self, input: &str) -> ParseOutcome {
        ParseOutcome::parsed(Value::String(input.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Plain numeric input, optional fixed decimal places, optional expression
/// fallback for computed input.
pub struct NumberStrategy {
    pub decimal_places: Option<u8>,
    pub expression: Option<Rc<dyn ExpressionParser>>,
}

impl NumberStrategy {
    pub fn new() -> Self {
        Self {
            decimal_places: None,
            expression: None,
        }
    }

    pub fn decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = Some(places);
        self
    }

    pub fn expression(mut self, parser: Rc<dyn ExpressionParser>) -> Self {
        self.expression = Some(parser);
        self
    }
}

impl Default for NumberStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for NumberStrategy {
    fn format(&self, value: &Value) -> String {
        let Some(n) = value.as_f64() else {
            return TextPassthrough.format(value);
        };
        match self.decimal_places {
            Some(places) => format!("{:.*}", places as usize, n),
            None => format_trimmed(n),
        }
    }
}

impl ValueParser for NumberStrategy {
    fn parse(&self, input: &str) -> ParseOutcome {
        let trimmed = input.trim();
        if let Ok(n) = trimmed.parse::<f64>() {
            return ParseOutcome::parsed(json!(n));
        }
        if let Some(expr) = &self.expression {
            if expr.can_parse(trimmed) {
                return expr.parse(trimmed);
            }
        }
        ParseOutcome::unparsed(input, "not a number")
    }
}

/// Render an f64 without a trailing `.0` for whole numbers.
fn format_trimmed(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// How negative amounts are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeStyle {
    #[default]
    Minus,
    /// Accounting notation: `(12.50)` for `-12.5`.
    Parentheses,
}

/// Fixed-decimal money. The parser accepts accounting notation only when
/// the strategy formats with it; under `Minus` style a parenthesized input
/// comes back unparsed, so a host never silently accepts a notation it
/// would not itself display.
pub struct MoneyStrategy {
    pub decimal_places: u8,
    pub negative_style: NegativeStyle,
    pub symbol: Option<String>,
    pub expression: Option<Rc<dyn ExpressionParser>>,
}

impl MoneyStrategy {
    pub fn new() -> Self {
        Self {
            decimal_places: 2,
            negative_style: NegativeStyle::default(),
            symbol: None,
            expression: None,
        }
    }

    pub fn decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = places;
        self
    }

    pub fn negative_style(mut self, style: NegativeStyle) -> Self {
        self.negative_style = style;
        self
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn expression(mut self, parser: Rc<dyn ExpressionParser>) -> Self {
        self.expression = Some(parser);
        self
    }

    fn strip_symbol<'a>(&self, input: &'a str) -> &'a str {
        match &self.symbol {
            Some(symbol) => input.strip_prefix(symbol.as_str()).unwrap_or(input).trim(),
            None => input,
        }
    }
}

impl Default for MoneyStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for MoneyStrategy {
    fn format(&self, value: &Value) -> String {
        let Some(n) = value.as_f64() else {
            return TextPassthrough.format(value);
        };
        let places = self.decimal_places as usize;
        let symbol = self.symbol.as_deref().unwrap_or("");
        if n < 0.0 {
            match self.negative_style {
                NegativeStyle::Minus => format!("-{symbol}{:.*}", places, -n),
                NegativeStyle::Parentheses => format!("({symbol}{:.*})", places, -n),
            }
        } else {
            format!("{symbol}{:.*}", places, n)
        }
    }
}

impl ValueParser for MoneyStrategy {
    fn parse(&self, input: &str) -> ParseOutcome {
        let trimmed = input.trim();

        // Accounting notation round-trips only under the matching style.
        if let Some(inner) = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
        {
            if self.negative_style != NegativeStyle::Parentheses {
                return ParseOutcome::unparsed(input, "accounting notation not accepted");
            }
            return match self.strip_symbol(inner.trim()).parse::<f64>() {
                Ok(n) => ParseOutcome::parsed(json!(-n)),
                Err(_) => ParseOutcome::unparsed(input, "not an amount"),
            };
        }

        let body = self.strip_symbol(trimmed);
        if let Ok(n) = body.parse::<f64>() {
            return ParseOutcome::parsed(json!(n));
        }
        if let Some(expr) = &self.expression {
            if expr.can_parse(body) {
                return expr.parse(body);
            }
        }
        ParseOutcome::unparsed(input, "not an amount")
    }
}

// ---------------------------------------------------------------------------
// Percent
// ---------------------------------------------------------------------------

/// Fractions displayed as percentages: `0.45` ↔ `"45%"`. Bare numbers parse
/// as percentages too (`"45"` → `0.45`).
pub struct PercentStrategy {
    pub decimal_places: u8,
}

impl PercentStrategy {
    pub fn new() -> Self {
        Self { decimal_places: 0 }
    }

    pub fn decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = places;
        self
    }
}

impl Default for PercentStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for PercentStrategy {
    fn format(&self, value: &Value) -> String {
        let Some(n) = value.as_f64() else {
            return TextPassthrough.format(value);
        };
        format!("{:.*}%", self.decimal_places as usize, n * 100.0)
    }
}

impl ValueParser for PercentStrategy {
    fn parse(&self, input: &str) -> ParseOutcome {
        let trimmed = input.trim();
        let body = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        match body.parse::<f64>() {
            Ok(n) => ParseOutcome::parsed(json!(n / 100.0)),
            Err(_) => ParseOutcome::unparsed(input, "not a percentage"),
        }
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// ISO-date values with date-math expression fallback (`t+3d`).
pub struct DateStrategy {
    pub expression: Option<Rc<dyn ExpressionParser>>,
}

impl DateStrategy {
    pub fn new() -> Self {
        Self { expression: None }
    }

    pub fn expression(mut self, parser: Rc<dyn ExpressionParser>) -> Self {
        self.expression = Some(parser);
        self
    }
}

impl Default for DateStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for DateStrategy {
    fn format(&self, value: &Value) -> String {
        TextPassthrough.format(value)
    }
}

impl ValueParser for DateStrategy {
    fn parse(&self, input: &str) -> ParseOutcome {
        let trimmed = input.trim();
        let iso = format_description!("[year]-[month]-[day]");
        if let Ok(date) = Date::parse(trimmed, &iso) {
            return ParseOutcome::parsed(json!(format_iso_date(date)));
        }
        if let Some(expr) = &self.expression {
            if expr.can_parse(trimmed) {
                return expr.parse(trimmed);
            }
        }
        ParseOutcome::unparsed(input, "not a date")
    }
}

impl fmt::Debug for NumberStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumberStrategy")
            .field("decimal_places", &self.decimal_places)
            .field("has_expression", &self.expression.is_some())
            .finish()
    }
}

impl fmt::Debug for MoneyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoneyStrategy")
            .field("decimal_places", &self.decimal_places)
            .field("negative_style", &self.negative_style)
            .field("symbol", &self.symbol)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::expr::{DateMathParser, MathParser};
    use time::macros::date;

    #[test]
    fn text_round_trip() {
        assert_eq!(TextPassthrough.format(&json!("hello")), "hello");
        assert_eq!(TextPassthrough.format(&Value::Null), "");
        assert_eq!(
            TextPassthrough.parse("hello"),
            ParseOutcome::parsed(json!("hello"))
        );
    }

    #[test]
    fn number_fixed_decimals() {
        let strategy = NumberStrategy::new().decimal_places(2);
        assert_eq!(strategy.format(&json!(12.5)), "12.50");
        assert_eq!(strategy.format(&json!(3)), "3.00");
    }

    #[test]
    fn number_trims_whole_values() {
        let strategy = NumberStrategy::new();
        assert_eq!(strategy.format(&json!(3.0)), "3");
        assert_eq!(strategy.format(&json!(3.25)), "3.25");
    }

    #[test]
    fn number_literal_beats_expression() {
        let strategy = NumberStrategy::new().expression(Rc::new(MathParser));
        // A plain literal never reaches the expression parser.
        assert_eq!(strategy.parse("42"), ParseOutcome::parsed(json!(42.0)));
        // A computed input retains its expression text.
        match strategy.parse("2+3*4") {
            ParseOutcome::Parsed { value, expression } => {
                assert_eq!(value, json!(14.0));
                assert_eq!(expression.as_deref(), Some("2+3*4"));
            }
            ParseOutcome::Unparsed { .. } => panic!("expected parse"),
        }
    }

    #[test]
    fn number_unparseable_is_data() {
        let strategy = NumberStrategy::new();
        match strategy.parse("abc") {
            ParseOutcome::Unparsed { raw_input, .. } => assert_eq!(raw_input, "abc"),
            ParseOutcome::Parsed { .. } => panic!("expected unparsed"),
        }
    }

    #[test]
    fn money_accounting_format() {
        let strategy = MoneyStrategy::new()
            .decimal_places(2)
            .negative_style(NegativeStyle::Parentheses);
        assert_eq!(strategy.format(&json!(-12.5)), "(12.50)");
        assert_eq!(strategy.format(&json!(12.5)), "12.50");
    }

    #[test]
    fn money_accounting_round_trip() {
        let strategy = MoneyStrategy::new()
            .decimal_places(2)
            .negative_style(NegativeStyle::Parentheses);
        assert_eq!(strategy.parse("(12.50)"), ParseOutcome::parsed(json!(-12.5)));
    }

    #[test]
    fn money_minus_style_rejects_accounting_notation() {
        let strategy = MoneyStrategy::new().negative_style(NegativeStyle::Minus);
        assert_eq!(strategy.format(&json!(-12.5)), "-12.50");
        match strategy.parse("(12.50)") {
            ParseOutcome::Unparsed { raw_input, .. } => assert_eq!(raw_input, "(12.50)"),
            ParseOutcome::Parsed { .. } => panic!("expected unparsed"),
        }
        assert_eq!(strategy.parse("-12.50"), ParseOutcome::parsed(json!(-12.5)));
    }

    #[test]
    fn money_symbol_stripped_on_parse() {
        let strategy = MoneyStrategy::new()
            .symbol("$")
            .negative_style(NegativeStyle::Parentheses);
        assert_eq!(strategy.format(&json!(-12.5)), "($12.50)");
        assert_eq!(strategy.parse("($12.50)"), ParseOutcome::parsed(json!(-12.5)));
        assert_eq!(strategy.parse("$7.25"), ParseOutcome::parsed(json!(7.25)));
    }

    #[test]
    fn percent_round_trip() {
        let strategy = PercentStrategy::new();
        assert_eq!(strategy.format(&json!(0.45)), "45%");
        assert_eq!(strategy.parse("45%"), ParseOutcome::parsed(json!(0.45)));
        assert_eq!(strategy.parse("45"), ParseOutcome::parsed(json!(0.45)));
    }

    #[test]
    fn date_literal_and_expression() {
        let strategy = DateStrategy::new()
            .expression(Rc::new(DateMathParser::with_today(date!(2024 - 01 - 15))));
        assert_eq!(
            strategy.parse("2024-03-01"),
            ParseOutcome::parsed(json!("2024-03-01"))
        );
        match strategy.parse("t+3d") {
            ParseOutcome::Parsed { value, expression } => {
                assert_eq!(value, json!("2024-01-18"));
                assert_eq!(expression.as_deref(), Some("t+3d"));
            }
            ParseOutcome::Unparsed { .. } => panic!("expected parse"),
        }
        assert!(!strategy.parse("soon").is_parsed());
    }
}
