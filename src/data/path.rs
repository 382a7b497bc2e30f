//! Dotted/indexed data paths and resolution against `serde_json::Value`.
//!
//! A [`DataPath`] addresses a location in the live data object: `user.email`,
//! `items[2].name`. Resolution is read (`get`) or read-then-write (`set`);
//! `set` returns the old value so callers can publish change events carrying
//! both sides.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::DataError;

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// One step of a [`DataPath`]: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// The key name, if this segment is a key.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathSegment::Key(k) => Some(k),
            PathSegment::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, "{k}"),
            PathSegment::Index(i) => write!(f, "[{i}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// DataPath
// ---------------------------------------------------------------------------

/// An ordered sequence of segments from the data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct DataPath {
    segments: Vec<PathSegment>,
}

impl DataPath {
    /// The empty path (the root itself).
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse a dotted/indexed path string: `a.b`, `items[2].name`.
    ///
    /// An empty string parses to the root path. Bare `[n]` prefixes are
    /// accepted (`[0].name` indexes the root array).
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        for part in input.split('.') {
            if part.is_empty() {
                continue;
            }
            let mut rest = part;
            // Leading identifier before any `[`.
            if let Some(open) = rest.find('[') {
                if open > 0 {
                    segments.push(PathSegment::Key(rest[..open].to_owned()));
                }
                rest = &rest[open..];
            } else {
                segments.push(PathSegment::Key(rest.to_owned()));
                continue;
            }
            // One or more `[n]` suffixes.
            while let Some(close) = rest.find(']') {
                if let Ok(index) = rest[1..close].parse::<usize>() {
                    segments.push(PathSegment::Index(index));
                }
                rest = &rest[close + 1..];
                if !rest.starts_with('[') {
                    break;
                }
            }
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment, returning the extended path.
    pub fn join_key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.into()));
        Self { segments }
    }

    /// Append an index segment, returning the extended path.
    pub fn join_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    /// Append another path, returning the combined path.
    pub fn join(&self, other: &DataPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// The path without its last segment, plus that segment. `None` for root.
    pub fn split_last(&self) -> Option<(DataPath, &PathSegment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            DataPath {
                segments: rest.to_vec(),
            },
            last,
        ))
    }

    /// The final key name, if the path ends in a key segment.
    pub fn last_key(&self) -> Option<&str> {
        self.segments.last().and_then(PathSegment::as_key)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Read the value at this path. `None` if any segment is missing.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Key(k) => current.as_object()?.get(k)?,
                PathSegment::Index(i) => current.as_array()?.get(*i)?,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, returning the previous value.
    ///
    /// Intermediate containers must already exist; a missing intermediate is
    /// [`DataError::PathNotFound`]. Writing a fresh key into an existing
    /// object is allowed (old value is `Null`).
    pub fn set(&self, root: &mut Value, value: Value) -> Result<Value, DataError> {
        let (parent_path, last) = self.split_last().ok_or(DataError::EmptyPath)?;
        let mut current = root;
        for segment in parent_path.segments() {
            current = match segment {
                PathSegment::Key(k) => current
                    .as_object_mut()
                    .and_then(|obj| obj.get_mut(k))
                    .ok_or_else(|| DataError::PathNotFound(self.to_string()))?,
                PathSegment::Index(i) => current
                    .as_array_mut()
                    .and_then(|arr| arr.get_mut(*i))
                    .ok_or_else(|| DataError::PathNotFound(self.to_string()))?,
            };
        }
        match last {
            PathSegment::Key(k) => {
                let obj = current.as_object_mut().ok_or(DataError::TypeMismatch {
                    path: parent_path.to_string(),
                    expected: "object",
                })?;
                Ok(obj.insert(k.clone(), value).unwrap_or(Value::Null))
            }
            PathSegment::Index(i) => {
                let path = parent_path.to_string();
                let arr = current.as_array_mut().ok_or(DataError::TypeMismatch {
                    path: path.clone(),
                    expected: "array",
                })?;
                let len = arr.len();
                let slot = arr.get_mut(*i).ok_or(DataError::IndexOutOfBounds {
                    path,
                    index: *i,
                    len,
                })?;
                Ok(std::mem::replace(slot, value))
            }
        }
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(k) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                PathSegment::Index(i) => write!(f, "[{i}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

impl From<&str> for DataPath {
    fn from(input: &str) -> Self {
        DataPath::parse(input)
    }
}
