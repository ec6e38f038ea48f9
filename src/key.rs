//! Composite keys
//!
//! Human-authored keys address a record in the document store and, optionally,
//! a single field inside it:
//!
//! ```text
//! Guild Name/Commands/Sticker%color
//! └──────── path ───────────┘ └field┘
//! ```
//!
//! Path segments have their whitespace replaced by `_` so they can be used as
//! store addresses directly. The field selector is kept as written.

use std::fmt;
use std::str::FromStr;

use crate::error::{MiseryError, Result};

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// Separator between the path and the field selector
pub const FIELD_SEPARATOR: char = '%';

/// A parsed composite key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    /// Normalized path segments (guild, command, specific name, id, ...)
    segments: Vec<String>,

    /// Optional field selector
    field: Option<String>,
}

impl CompositeKey {
    /// Parse a composite key string
    pub fn parse(key: &str) -> Result<Self> {
        let (segments, field) = parse(key)?;
        Ok(Self { segments, field })
    }

    /// Create a key from already separated parts
    ///
    /// Segments are normalized the same way `parse` normalizes them.
    pub fn new<S: AsRef<str>>(segments: &[S], field: Option<&str>) -> Result<Self> {
        let raw = build(segments, field);
        let mut normalized = Vec::with_capacity(segments.len());
        for segment in segments {
            normalized.push(normalize_segment(&raw, segment.as_ref())?);
        }
        if segments.is_empty() {
            return Err(MiseryError::invalid_key(&raw, "key has no path segments"));
        }
        let field = match field {
            Some(f) => Some(validate_field(&raw, f)?.to_string()),
            None => None,
        };
        Ok(Self {
            segments: normalized,
            field,
        })
    }

    /// Path segments in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Field selector, if any
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Slash-joined path, without the field selector
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// The same path with a different (or no) field selector
    pub fn with_field(&self, field: Option<&str>) -> Result<Self> {
        let field = match field {
            Some(field) => Some(validate_field(&build(&self.segments, Some(field)), field)?),
            None => None,
        };
        Ok(Self {
            segments: self.segments.clone(),
            field: field.map(str::to_string),
        })
    }

    /// Key of a child record one level below this path
    ///
    /// The field selector is carried over.
    pub fn child(&self, name: &str) -> Result<Self> {
        let name = normalize_segment(name, name)?;
        let mut segments = self.segments.clone();
        segments.push(name);
        Ok(Self {
            segments,
            field: self.field.clone(),
        })
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build(&self.segments, self.field.as_deref()))
    }
}

impl FromStr for CompositeKey {
    type Err = MiseryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split a composite key into normalized path segments and a field selector
pub fn parse(key: &str) -> Result<(Vec<String>, Option<String>)> {
    let mut parts = key.split(FIELD_SEPARATOR);
    // split always yields at least one item
    let path = parts.next().unwrap_or_default();
    let field = parts.next();
    if parts.next().is_some() {
        return Err(MiseryError::invalid_key(
            key,
            "more than one field separator",
        ));
    }

    let segments = path
        .split(PATH_SEPARATOR)
        .map(|segment| normalize_segment(key, segment))
        .collect::<Result<Vec<_>>>()?;

    let field = match field {
        Some(f) => Some(validate_field(key, f)?.to_string()),
        None => None,
    };

    Ok((segments, field))
}

/// Join path segments and an optional field back into a key string
pub fn build<S: AsRef<str>>(path: &[S], field: Option<&str>) -> String {
    let mut key = path
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("/");
    if let Some(field) = field {
        key.push(FIELD_SEPARATOR);
        key.push_str(field);
    }
    key
}

fn normalize_segment(key: &str, segment: &str) -> Result<String> {
    if segment.is_empty() {
        return Err(MiseryError::invalid_key(key, "empty path segment"));
    }
    if segment.contains(PATH_SEPARATOR) || segment.contains(FIELD_SEPARATOR) {
        return Err(MiseryError::invalid_key(
            key,
            format!("segment {:?} contains a separator", segment),
        ));
    }
    Ok(segment
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect())
}

fn validate_field<'a>(key: &str, field: &'a str) -> Result<&'a str> {
    if field.is_empty() {
        return Err(MiseryError::invalid_key(key, "empty field selector"));
    }
    if field.contains(FIELD_SEPARATOR) {
        return Err(MiseryError::invalid_key(
            key,
            "more than one field separator",
        ));
    }
    Ok(field)
}
