use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const SEPARATOR: char = '.';

/// Dotted path into a JSON-like value, e.g. `req.user.location.0`.
///
/// Object keys are matched literally, numeric segments also index into
/// arrays. A path never fails to evaluate: anything it cannot follow
/// yields `None`.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub struct ValuePath {
    segments: Vec<String>,
}

impl ValuePath {
    pub fn new(path: &str) -> Self {
        let segments = path
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self { segments }
    }

    /// Path that resolves to the root value itself.
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// New path with `other` appended below this one.
    pub fn join(&self, other: &ValuePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Follow the path. Explicit `null` counts as missing.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    let index = segment.parse::<usize>().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        match current {
            Value::Null => None,
            value => Some(value),
        }
    }

    /// Like [`ValuePath::resolve`] but only yields values carrying content.
    pub fn resolve_present<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.resolve(root).filter(|value| is_present(value))
    }
}

/// A value carries content unless it is `null`, `false`, an empty string
/// or an empty collection. Numbers always carry content.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

/// String form of a value: strings are taken verbatim, everything else
/// uses its JSON rendering.
pub fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FromStr for ValuePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for ValuePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ValuePath {
    fn from(path: String) -> Self {
        Self::new(&path)
    }
}

impl From<ValuePath> for String {
    fn from(path: ValuePath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl fmt::Debug for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValuePath({})", self)
    }
}
