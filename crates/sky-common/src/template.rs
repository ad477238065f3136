//! Path templates for locating source files.
//!
//! A template is plain text with `{field}` placeholders. `{field:.N}` keeps
//! only the first `N` characters of the value, which is how brick and atlas
//! directories are sharded (`{id:.3}/{id}`).

use crate::error::{SkyError, SkyResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { name: String, max_len: Option<usize> },
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template string.
    pub fn parse(template: &str) -> SkyResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }
            let mut spec = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                spec.push(c);
            }
            if !closed || spec.is_empty() {
                return Err(SkyError::invalid_parameter(
                    "template",
                    format!("unterminated placeholder in '{}'", template),
                ));
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(parse_field(&spec, template)?);
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Names of all placeholders, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute placeholders using `lookup`.
    pub fn render<'a, F>(&self, lookup: F) -> SkyResult<String>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut out = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, max_len } => {
                    let value = lookup(name).ok_or_else(|| {
                        SkyError::Internal(format!(
                            "template '{}' references unknown field '{}'",
                            self.source, name
                        ))
                    })?;
                    match max_len {
                        Some(n) => out.extend(value.chars().take(*n)),
                        None => out.push_str(value),
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn parse_field(spec: &str, template: &str) -> SkyResult<Segment> {
    match spec.split_once(":.") {
        Some((name, len)) => {
            let max_len = len.parse::<usize>().map_err(|_| {
                SkyError::invalid_parameter(
                    "template",
                    format!("bad width '{}' in '{}'", len, template),
                )
            })?;
            Ok(Segment::Field {
                name: name.to_string(),
                max_len: Some(max_len),
            })
        }
        None => Ok(Segment::Field {
            name: spec.to_string(),
            max_len: None,
        }),
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for PathTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for PathTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PathTemplate::parse(&s).map_err(serde::de::Error::custom)
    }
}
