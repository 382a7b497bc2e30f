//! Strategy keys and wildcard patterns.
//!
//! A strategy is addressed by `dataType:displayMode:hint1:hint2:...`.
//! Registered patterns may replace any segment with `*` or omit trailing
//! segments entirely; resolution picks the most specific matching pattern,
//! ties broken by registration order.

use std::fmt;

// ---------------------------------------------------------------------------
// StrategyKey
// ---------------------------------------------------------------------------

/// A concrete lookup key: data type, display mode, ordered hints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrategyKey {
    pub data_type: String,
    pub display_mode: String,
    pub hints: Vec<String>,
}

impl StrategyKey {
    pub fn new(
        data_type: impl Into<String>,
        display_mode: impl Into<String>,
        hints: &[&str],
    ) -> Self {
        Self {
            data_type: data_type.into(),
            display_mode: display_mode.into(),
            hints: hints.iter().map(|h| (*h).to_owned()).collect(),
        }
    }

    /// Parse `"number:editing:dp2"`. Missing segments default to empty.
    pub fn parse(input: &str) -> Self {
        let mut parts = input.split(':');
        let data_type = parts.next().unwrap_or("").to_owned();
        let display_mode = parts.next().unwrap_or("").to_owned();
        let hints = parts.map(str::to_owned).collect();
        Self {
            data_type,
            display_mode,
            hints,
        }
    }

    /// All segments in order: data type, display mode, hints.
    pub fn segments(&self) -> Vec<&str> {
        let mut out = vec![self.data_type.as_str(), self.display_mode.as_str()];
        out.extend(self.hints.iter().map(String::as_str));
        out
    }
}

impl fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.data_type, self.display_mode)?;
        for hint in &self.hints {
            write!(f, ":{hint}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StrategyPattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    Wildcard,
}

/// A registered pattern: literal segments, `*` wildcards, optional trailing
/// truncation (a two-segment pattern matches any longer key it prefixes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyPattern {
    segments: Vec<PatternSegment>,
}

/// Match tightness, ordered so that `Ord` comparison picks the winner the
/// same way a style-sheet specificity tuple does: more literal segments beat
/// fewer, then longer patterns beat shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    pub literals: usize,
    pub length: usize,
}

impl StrategyPattern {
    /// Parse `"number:*"`, `"number:editing:dp2"`, `"*:readonly"`.
    pub fn parse(input: &str) -> Self {
        let segments = input
            .split(':')
            .map(|part| {
                if part == "*" {
                    PatternSegment::Wildcard
                } else {
                    PatternSegment::Literal(part.to_owned())
                }
            })
            .collect();
        Self { segments }
    }

    /// Whether this pattern matches `key`: segment-wise comparison, wildcard
    /// matching anything, pattern acting as a prefix of longer keys.
    pub fn matches(&self, key: &StrategyKey) -> bool {
        let key_segments = key.segments();
        if self.segments.len() > key_segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(key_segments)
            .all(|(pattern, actual)| match pattern {
                PatternSegment::Wildcard => true,
                PatternSegment::Literal(expected) => expected == actual,
            })
    }

    pub fn specificity(&self) -> Specificity {
        Specificity {
            literals: self
                .segments
                .iter()
                .filter(|s| matches!(s, PatternSegment::Literal(_)))
                .count(),
            length: self.segments.len(),
        }
    }
}

impl fmt::Display for StrategyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                f.write_str(":")?;
            }
            match segment {
                PatternSegment::Literal(s) => f.write_str(s)?,
                PatternSegment::Wildcard => f.write_str("*")?,
            }
            first = false;
        }
        Ok(())
    }
}
