//! Provider plugin contract.
//!
//! The core never provisions anything. Each resource kind is backed by a
//! [`ResourceProvider`] that validates configurations, declares which output
//! attributes it produces, and mints the tokens those outputs resolve to.

pub mod catalog;

use std::collections::BTreeMap;
use std::fmt;

use serde_json::json;
use skyweave_common::error::{Result, SkyweaveError};
use skyweave_common::types::TemplateId;

use crate::descriptor::Outputs;
use crate::value::{Config, Value};

/// Contract every resource kind implements.
pub trait ResourceProvider: fmt::Debug + Send + Sync {
    /// Kind tag this provider handles.
    fn kind(&self) -> &str;

    /// Checks a configuration against the kind's shape.
    ///
    /// When `strict` is set, fields the kind does not declare are rejected.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first violation.
    fn validate(&self, config: &Config, strict: bool) -> std::result::Result<(), String>;

    /// Output attributes the kind produces.
    fn declared_outputs(&self) -> &[&str];

    /// Attribute that addresses the resource for associations, if any.
    fn identity_attribute(&self) -> Option<&str> {
        None
    }

    /// Attribute returned by a plain `Ref`, if any.
    fn primary_output(&self) -> Option<&str> {
        None
    }

    /// Mints the output tokens for a realized resource.
    fn realize(&self, id: &TemplateId) -> Outputs {
        self.declared_outputs()
            .iter()
            .map(|attr| {
                let token = if self.primary_output() == Some(*attr) {
                    json!({ "Ref": id.as_str() })
                } else {
                    json!({ "Fn::GetAtt": [id.as_str(), pascal_case(attr)] })
                };
                ((*attr).to_string(), token)
            })
            .collect()
    }
}

/// Shape of a single configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Any value.
    Any,
    /// Boolean.
    Bool,
    /// Integer.
    Integer,
    /// String.
    String,
    /// String, reference, or intrinsic function object resolved at deploy time.
    Token,
    /// List of values.
    List,
    /// Map of values.
    Map,
}

impl ValueType {
    /// Whether `value` is acceptable for a field of this type.
    ///
    /// References resolve to scalars, so they satisfy any scalar type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _)
            | (Self::Bool, Value::Bool(_))
            | (Self::Integer, Value::Integer(_))
            | (Self::String | Self::Token, Value::String(_))
            | (Self::List, Value::List(_))
            | (Self::Map, Value::Map(_))
            | (Self::Bool | Self::Integer | Self::String | Self::Token, Value::Ref(_)) => true,
            (Self::Token, Value::Map(_)) => value.is_intrinsic(),
            _ => false,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Token => "string or intrinsic",
            Self::List => "list",
            Self::Map => "map",
        }
    }
}

/// Declared configuration field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Option name.
    pub name: &'static str,
    /// Expected value type.
    pub ty: ValueType,
    /// Whether the option must be present and non-null.
    pub required: bool,
}

impl FieldSpec {
    /// A required field.
    #[must_use]
    pub const fn required(name: &'static str, ty: ValueType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    /// An optional field.
    #[must_use]
    pub const fn optional(name: &'static str, ty: ValueType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// Static, table-driven provider.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSchema {
    /// Kind tag.
    pub kind: &'static str,
    /// Declared configuration fields.
    pub fields: &'static [FieldSpec],
    /// Declared output attributes.
    pub outputs: &'static [&'static str],
    /// Attribute a plain `Ref` yields.
    pub primary_output: Option<&'static str>,
    /// Attribute that addresses the resource for associations.
    pub identity: Option<&'static str>,
}

impl ResourceProvider for ResourceSchema {
    fn kind(&self) -> &str {
        self.kind
    }

    fn validate(&self, config: &Config, strict: bool) -> std::result::Result<(), String> {
        for field in self.fields {
            match config.get(field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(format!("missing required field \"{}\"", field.name));
                }
                Some(value) if !matches!(value, Value::Null) && !field.ty.accepts(value) => {
                    return Err(format!(
                        "field \"{}\" expects {}, got {}",
                        field.name,
                        field.ty.name(),
                        value.type_name()
                    ));
                }
                _ => {}
            }
        }
        if strict {
            if let Some((key, _)) = config
                .iter()
                .find(|(key, _)| !self.fields.iter().any(|f| f.name == key.as_str()))
            {
                return Err(format!("unknown field \"{key}\""));
            }
        }
        Ok(())
    }

    fn declared_outputs(&self) -> &[&str] {
        self.outputs
    }

    fn identity_attribute(&self) -> Option<&str> {
        self.identity
    }

    fn primary_output(&self) -> Option<&str> {
        self.primary_output
    }
}

/// Registry of providers, keyed by kind.
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn ResourceProvider>>,
    strict: bool,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self {
            providers: BTreeMap::new(),
            strict,
        }
    }

    /// Creates a registry preloaded with the built-in catalog.
    #[must_use]
    pub fn builtin(strict: bool) -> Self {
        let mut registry = Self::new(strict);
        for schema in catalog::ALL {
            let _ = registry
                .providers
                .insert(schema.kind.to_string(), Box::new(*schema));
        }
        registry
    }

    /// Whether unknown configuration fields are rejected.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Registers an additional provider.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider for the same kind is already registered.
    pub fn register(&mut self, provider: Box<dyn ResourceProvider>) -> Result<()> {
        let kind = provider.kind().to_string();
        if self.providers.contains_key(&kind) {
            return Err(SkyweaveError::Config {
                message: format!("provider for {kind} is already registered"),
            });
        }
        let _ = self.providers.insert(kind, provider);
        Ok(())
    }

    /// Looks up the provider for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::NotFound`] if no provider handles `kind`.
    pub fn get(&self, kind: &str) -> Result<&dyn ResourceProvider> {
        self.providers
            .get(kind)
            .map(AsRef::as_ref)
            .ok_or_else(|| SkyweaveError::NotFound {
                kind: "provider",
                id: kind.to_string(),
            })
    }

    /// Validates `config` for a resource of `kind` at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`SkyweaveError::Schema`] on the first violation, or
    /// [`SkyweaveError::NotFound`] for an unregistered kind.
    pub fn validate(&self, kind: &str, address: &str, config: &Config) -> Result<()> {
        self.get(kind)?
            .validate(config, self.strict)
            .map_err(|message| SkyweaveError::Schema {
                kind: kind.to_string(),
                address: address.to_string(),
                message,
            })
    }
}

/// Converts a `snake_case` attribute or field name to `PascalCase`.
#[must_use]
pub fn pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}
