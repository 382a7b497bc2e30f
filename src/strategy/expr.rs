//! Pluggable expression parsers for input fields.
//!
//! A numeric or date strategy first attempts a literal parse; only when that
//! fails does it ask its configured expression parser whether the input is a
//! computable expression (`"2+3*4"`, `"t+3d"`, `"45%"`). A successful
//! expression parse retains both the computed value and the original
//! expression text for redisplay.

use std::fmt;
use std::rc::Rc;

use logos::Logos;
use serde_json::{json, Value};
use time::{Date, Month, OffsetDateTime};

use crate::strategy::format::ParseOutcome;

// ---------------------------------------------------------------------------
// The plugin trait and registry
// ---------------------------------------------------------------------------

/// An externally registrable expression parser.
pub trait ExpressionParser {
    fn id(&self) -> &str;

    /// Cheap pre-check: is this input plausibly an expression this parser
    /// handles? `parse` is only called when this returns true.
    fn can_parse(&self, input: &str) -> bool;

    fn parse(&self, input: &str) -> ParseOutcome;
}

/// Id-keyed registry of expression parsers.
#[derive(Clone, Default)]
pub struct ExpressionParserRegistry {
    parsers: Vec<Rc<dyn ExpressionParser>>,
}

impl ExpressionParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in set: math, date, percentage.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Rc::new(MathParser));
        registry.register(Rc::new(DateMathParser::new()));
        registry.register(Rc::new(PercentageParser));
        registry
    }

    /// Later registrations under an existing id replace the earlier one.
    pub fn register(&mut self, parser: Rc<dyn ExpressionParser>) {
        self.parsers.retain(|p| p.id() != parser.id());
        self.parsers.push(parser);
    }

    pub fn by_id(&self, id: &str) -> Option<Rc<dyn ExpressionParser>> {
        self.parsers.iter().find(|p| p.id() == id).cloned()
    }
}

impl fmt::Debug for ExpressionParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionParserRegistry")
            .field("ids", &self.parsers.iter().map(|p| p.id()).collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Math expressions
// ---------------------------------------------------------------------------

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
enum MathToken {
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

/// Arithmetic over f64: `+ - * /`, parentheses, unary minus. Standard
/// precedence via recursive descent.
pub struct MathParser;

struct MathCursor {
    tokens: Vec<MathToken>,
    pos: usize,
}

impl MathCursor {
    fn peek(&self) -> Option<&MathToken> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<MathToken> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                MathToken::Plus => {
                    self.bump();
                    value += self.term()?;
                }
                MathToken::Minus => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                MathToken::Star => {
                    self.bump();
                    value *= self.factor()?;
                }
                MathToken::Slash => {
                    self.bump();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return None;
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Some(value)
    }

    // factor := '-' factor | '(' expr ')' | number
    fn factor(&mut self) -> Option<f64> {
        match self.bump()? {
            MathToken::Minus => Some(-self.factor()?),
            MathToken::LParen => {
                let value = self.expr()?;
                match self.bump()? {
                    MathToken::RParen => Some(value),
                    _ => None,
                }
            }
            MathToken::Number(n) => Some(n),
            _ => None,
        }
    }
}

fn eval_math(input: &str) -> Option<f64> {
    let tokens: Result<Vec<_>, _> = MathToken::lexer(input).collect();
    let mut cursor = MathCursor {
        tokens: tokens.ok()?,
        pos: 0,
    };
    let value = cursor.expr()?;
    // Trailing junk means the expression did not consume the whole input.
    if cursor.pos != cursor.tokens.len() {
        return None;
    }
    Some(value)
}

impl ExpressionParser for MathParser {
    fn id(&self) -> &str {
        "math"
    }

    fn can_parse(&self, input: &str) -> bool {
        // An operator beyond a leading sign distinguishes an expression from
        // a plain literal.
        let trimmed = input.trim();
        let body = trimmed.strip_prefix('-').unwrap_or(trimmed);
        body.contains(['+', '-', '*', '/', '(']) && eval_math(trimmed).is_some()
    }

    fn parse(&self, input: &str) -> ParseOutcome {
        match eval_math(input.trim()) {
            Some(value) => ParseOutcome::parsed_expression(json!(value), input),
            None => ParseOutcome::unparsed(input, "not a valid arithmetic expression"),
        }
    }
}

// ---------------------------------------------------------------------------
// Date math
// ---------------------------------------------------------------------------

/// Date offsets relative to today: `t`, `t+3d`, `t-2w`, `t+1m`, `t-1y`.
/// Case-insensitive. The reference date is injectable for deterministic
/// tests.
pub struct DateMathParser {
    today: Date,
}

impl DateMathParser {
    pub fn new() -> Self {
        Self {
            today: OffsetDateTime::now_utc().date(),
        }
    }

    pub fn with_today(today: Date) -> Self {
        Self { today }
    }

    fn compute(&self, input: &str) -> Option<Date> {
        let input = input.trim().to_ascii_lowercase();
        let rest = input.strip_prefix('t')?;
        if rest.is_empty() {
            return Some(self.today);
        }
        if !rest.is_ascii() {
            return None;
        }
        let sign = match rest.as_bytes().first()? {
            b'+' => 1i64,
            b'-' => -1i64,
            _ => return None,
        };
        let unit = rest.chars().last()?;
        // `rest` may be just the sign ("t+"); a checked slice keeps truncated
        // mid-typing input a parse failure, not a panic.
        let amount: i64 = rest.get(1..rest.len() - 1)?.parse().ok()?;
        let amount = sign * amount;
        match unit {
            'd' => self.today.checked_add(time::Duration::days(amount)),
            'w' => self.today.checked_add(time::Duration::weeks(amount)),
            'm' => add_months(self.today, amount),
            'y' => add_months(self.today, amount.checked_mul(12)?),
            _ => None,
        }
    }
}

impl Default for DateMathParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar-month arithmetic with day-of-month clamping (Jan 31 + 1m =
/// Feb 28/29).
fn add_months(date: Date, months: i64) -> Option<Date> {
    let zero_based = date.year() as i64 * 12 + (date.month() as u8 as i64 - 1);
    let target = zero_based.checked_add(months)?;
    let year = i32::try_from(target.div_euclid(12)).ok()?;
    let month = Month::try_from((target.rem_euclid(12) + 1) as u8).ok()?;
    let last_day = time::util::days_in_year_month(year, month);
    Date::from_calendar_date(year, month, date.day().min(last_day)).ok()
}

/// ISO `YYYY-MM-DD` rendering of a date value.
pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

impl ExpressionParser for DateMathParser {
    fn id(&self) -> &str {
        "date"
    }

    fn can_parse(&self, input: &str) -> bool {
        self.compute(input).is_some()
    }

    fn parse(&self, input: &str) -> ParseOutcome {
        match self.compute(input) {
            Some(date) => ParseOutcome::parsed_expression(json!(format_iso_date(date)), input),
            None => ParseOutcome::unparsed(input, "not a valid date expression"),
        }
    }
}

// ---------------------------------------------------------------------------
// Percentages
// ---------------------------------------------------------------------------

/// `"45%"` → `0.45`.
pub struct PercentageParser;

impl ExpressionParser for PercentageParser {
    fn id(&self) -> &str {
        "percentage"
    }

    fn can_parse(&self, input: &str) -> bool {
        input
            .trim()
            .strip_suffix('%')
            .map(|n| n.trim().parse::<f64>().is_ok())
            .unwrap_or(false)
    }

    fn parse(&self, input: &str) -> ParseOutcome {
        let parsed = input
            .trim()
            .strip_suffix('%')
            .and_then(|n| n.trim().parse::<f64>().ok());
        match parsed {
            Some(n) => ParseOutcome::parsed_expression(json!(n / 100.0), input),
            None => ParseOutcome::unparsed(input, "not a percentage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn math_precedence() {
        assert_eq!(eval_math("2+3*4"), Some(14.0));
        assert_eq!(eval_math("(2+3)*4"), Some(20.0));
        assert_eq!(eval_math("10/4"), Some(2.5));
        assert_eq!(eval_math("-3+5"), Some(2.0));
    }

    #[test]
    fn math_rejects_garbage() {
        assert_eq!(eval_math("2+"), None);
        assert_eq!(eval_math("2 3"), None);
        assert_eq!(eval_math("abc"), None);
        assert_eq!(eval_math("1/0"), None);
    }

    #[test]
    fn math_can_parse_distinguishes_literals() {
        let parser = MathParser;
        assert!(parser.can_parse("2+3"));
        assert!(parser.can_parse("(1+2)*3"));
        // Plain literals, even negative, are not expressions.
        assert!(!parser.can_parse("42"));
        assert!(!parser.can_parse("-42"));
    }

    #[test]
    fn math_parse_retains_expression_text() {
        let outcome = MathParser.parse("2+3*4");
        match outcome {
            ParseOutcome::Parsed { value, expression } => {
                assert_eq!(value, json!(14.0));
                assert_eq!(expression.as_deref(), Some("2+3*4"));
            }
            ParseOutcome::Unparsed { .. } => panic!("expected parse"),
        }
    }

    #[test]
    fn date_math_offsets() {
        let parser = DateMathParser::with_today(date!(2024 - 01 - 15));
        assert_eq!(parser.compute("t"), Some(date!(2024 - 01 - 15)));
        assert_eq!(parser.compute("t+3d"), Some(date!(2024 - 01 - 18)));
        assert_eq!(parser.compute("t-2w"), Some(date!(2024 - 01 - 01)));
        assert_eq!(parser.compute("t+1m"), Some(date!(2024 - 02 - 15)));
        assert_eq!(parser.compute("t-1y"), Some(date!(2023 - 01 - 15)));
        assert_eq!(parser.compute("T+3D"), Some(date!(2024 - 01 - 18)));
    }

    #[test]
    fn date_math_clamps_month_end() {
        let parser = DateMathParser::with_today(date!(2024 - 01 - 31));
        // 2024 is a leap year.
        assert_eq!(parser.compute("t+1m"), Some(date!(2024 - 02 - 29)));
    }

    #[test]
    fn date_math_rejects_other_input() {
        let parser = DateMathParser::with_today(date!(2024 - 01 - 15));
        assert!(!parser.can_parse("2024-01-15"));
        assert!(!parser.can_parse("t+3q"));
        assert!(!parser.can_parse("tomorrow"));
    }

    #[test]
    fn date_math_rejects_truncated_offsets() {
        let parser = DateMathParser::with_today(date!(2024 - 01 - 15));
        // Mid-typing input: sign but no amount/unit yet.
        assert!(!parser.can_parse("t+"));
        assert!(!parser.can_parse("t-"));
        assert!(!parser.can_parse("t+d"));
        assert!(!parser.parse("t+").is_parsed());
    }

    #[test]
    fn percentage_parses() {
        let parser = PercentageParser;
        assert!(parser.can_parse("45%"));
        assert!(!parser.can_parse("45"));
        match parser.parse("45%") {
            ParseOutcome::Parsed { value, .. } => assert_eq!(value, json!(0.45)),
            ParseOutcome::Unparsed { .. } => panic!("expected parse"),
        }
    }

    #[test]
    fn registry_lookup_and_replacement() {
        let registry = ExpressionParserRegistry::with_defaults();
        assert!(registry.by_id("math").is_some());
        assert!(registry.by_id("date").is_some());
        assert!(registry.by_id("percentage").is_some());
        assert!(registry.by_id("missing").is_none());

        let mut registry = registry;
        registry.register(Rc::new(DateMathParser::with_today(date!(2020 - 06 - 01))));
        let replaced = registry.by_id("date").unwrap();
        assert!(replaced.can_parse("t+1d"));
    }
}
