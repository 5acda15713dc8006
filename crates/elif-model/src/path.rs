//! Attribute paths: `a.b[2].c`
//!
//! A path is an ordered list of object keys and array indices. Rule tables
//! address array elements through the wildcard form, `items[].name`, which
//! [`AttributePath::normalized`] produces from any concrete path.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One step into the attribute tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
    /// Any array element, written `[]`
    Wildcard,
}

impl Segment {
    /// Whether this segment addresses an array element
    pub fn is_element(&self) -> bool {
        matches!(self, Segment::Index(_) | Segment::Wildcard)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributePath {
    segments: Vec<Segment>,
}

impl AttributePath {
    /// The empty path, addressing the whole attribute tree
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted/bracketed path. Parsing never fails: a bracket holding
    /// something other than a number is read as an object key.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        let mut key = String::new();
        let mut chars = path.chars();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut key)));
                    }
                    let inner: String = chars.by_ref().take_while(|c| *c != ']').collect();
                    let inner = inner.trim();
                    segments.push(if inner.is_empty() {
                        Segment::Wildcard
                    } else {
                        match inner.parse::<usize>() {
                            Ok(index) => Segment::Index(index),
                            Err(_) => Segment::Key(inner.to_string()),
                        }
                    });
                }
                c => key.push(c),
            }
        }

        if !key.is_empty() {
            segments.push(Segment::Key(key));
        }

        Self { segments }
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Child path for an object key
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    /// Child path for an array index
    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Every index replaced by the wildcard
    pub fn normalized(&self) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .map(|segment| match segment {
                    Segment::Index(_) => Segment::Wildcard,
                    other => other.clone(),
                })
                .collect(),
        }
    }

    /// Whether the path contains a concrete index or a wildcard
    pub fn has_elements(&self) -> bool {
        self.segments.iter().any(Segment::is_element)
    }

    /// Whether `self` is `prefix` followed by zero or more segments
    pub fn starts_with(&self, prefix: &AttributePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Leading key of the path, if any
    pub fn first_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(key)) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if position == 0 => f.write_str(key)?,
                Segment::Key(key) => write!(f, ".{}", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
                Segment::Wildcard => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for AttributePath {
    type Err = std::convert::Infallible;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(path))
    }
}

impl From<&str> for AttributePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for AttributePath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl Serialize for AttributePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AttributePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Ok(Self::parse(&path))
    }
}
