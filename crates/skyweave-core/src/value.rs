//! Configuration values and deferred references.
//!
//! A [`Config`] is an ordered map of option name to [`Value`]. Values may
//! embed [`Reference`]s to other resources' outputs at any depth; these stay
//! opaque until synthesis replaces them with concrete values.

use std::collections::BTreeMap;

use skyweave_common::error::Result;

use crate::descriptor::ResourceId;

/// Names the stack output a reference was obtained through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportRef {
    /// Name of the producing stack.
    pub stack: String,
    /// Name of the exposed output.
    pub output: String,
}

impl ExportRef {
    /// Export name used by templates, e.g. `Persistent:tableName`.
    #[must_use]
    pub fn export_name(&self) -> String {
        format!(
            "{}{}{}",
            self.stack,
            skyweave_common::constants::EXPORT_SEPARATOR,
            self.output
        )
    }
}

/// Deferred pointer to one output attribute of another resource.
///
/// A reference is a `(producer, attribute)` pair. It is created at
/// construction time and resolved only after its producer has been placed
/// ahead of the consumer in the deployment order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    source: ResourceId,
    source_address: String,
    attribute: String,
    export: Option<ExportRef>,
}

impl Reference {
    pub(crate) const fn new(source: ResourceId, source_address: String, attribute: String) -> Self {
        Self {
            source,
            source_address,
            attribute,
            export: None,
        }
    }

    pub(crate) fn via_export(mut self, export: ExportRef) -> Self {
        self.export = Some(export);
        self
    }

    /// Arena handle of the producing resource.
    #[must_use]
    pub const fn source(&self) -> ResourceId {
        self.source
    }

    /// Path-qualified address of the producing resource.
    #[must_use]
    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    /// Name of the referenced output attribute.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The exposed stack output this reference was consumed through, if any.
    #[must_use]
    pub const fn export(&self) -> Option<&ExportRef> {
        self.export.as_ref()
    }
}

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Explicit absence.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Any other JSON number, kept as written.
    Number(serde_json::Number),
    /// Text.
    String(String),
    /// Ordered list.
    List(Vec<Value>),
    /// Nested map with sorted keys.
    Map(BTreeMap<String, Value>),
    /// Deferred reference to another resource's output.
    Ref(Reference),
}

impl Value {
    /// Short name of the value's type, used in schema messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Ref(_) => "reference",
        }
    }

    /// Builds a map value from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// A `Fn::Sub` intrinsic; `${...}` placeholders are substituted at deploy time.
    #[must_use]
    pub fn sub(template: impl Into<String>) -> Self {
        Self::map([("Fn::Sub", template.into())])
    }

    /// Whether this is a single-key intrinsic function object such as
    /// `{"Fn::Sub": ...}` or `{"Ref": ...}`.
    #[must_use]
    pub fn is_intrinsic(&self) -> bool {
        match self {
            Self::Map(entries) if entries.len() == 1 => entries
                .keys()
                .all(|k| k == "Ref" || k.starts_with("Fn::")),
            _ => false,
        }
    }

    /// Collects every reference embedded in this value, depth first.
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match self {
            Self::Ref(r) => out.push(r),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(out)),
            Self::Null | Self::Bool(_) | Self::Integer(_) | Self::Number(_) | Self::String(_) => {}
        }
    }

    /// Converts to JSON, replacing every reference with the value `resolve` returns.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `resolve`.
    pub fn resolve<F>(&self, resolve: &mut F) -> Result<serde_json::Value>
    where
        F: FnMut(&Reference) -> Result<serde_json::Value>,
    {
        Ok(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(n) => serde_json::Value::from(*n),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.resolve(resolve))
                    .collect::<Result<_>>()?,
            ),
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.resolve(resolve)?)))
                    .collect::<Result<_>>()?,
            ),
            Self::Ref(r) => resolve(r)?,
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Self::Ref(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(entries)
    }
}

impl From<Config> for Value {
    fn from(config: Config) -> Self {
        Self::Map(config.0)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Number(n.clone()), Self::Integer),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Option name to value mapping for one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config(BTreeMap<String, Value>);

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` and returns the configuration, for chained construction.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.0.insert(key.into(), value.into());
        self
    }

    /// Sets `key` only when `value` is present.
    #[must_use]
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Every reference embedded anywhere in the configuration.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.0.values().for_each(|v| v.collect_references(&mut out));
        out
    }

    /// Converts to a JSON object with every reference resolved.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `resolve`.
    pub fn resolve<F>(&self, resolve: &mut F) -> Result<serde_json::Value>
    where
        F: FnMut(&Reference) -> Result<serde_json::Value>,
    {
        Ok(serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| Ok((k.clone(), v.resolve(resolve)?)))
                .collect::<Result<_>>()?,
        ))
    }
}
