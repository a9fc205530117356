//! Domain primitive types used across the Skyweave workspace.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{PATH_SEPARATOR, TEMPLATE_ID_HASH_LENGTH};

/// Hierarchical address of a construct, from its stack root downwards.
///
/// Paths are assigned once, when the construct is created, and are the
/// stable identity used for ordering tie-breaks and template ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ConstructPath(Vec<String>);

impl ConstructPath {
    /// Creates the path of a stack root.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Returns the path of a child named `name` below this path.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut components = self.0.clone();
        components.push(name.into());
        Self(components)
    }

    /// Returns the path components, stack name first.
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Returns the last path component.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// Returns the stack name (first component).
    #[must_use]
    pub fn stack(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }

    /// Derives the template-safe id for this path.
    ///
    /// The id is the concatenation of the alphanumeric characters of every
    /// component, followed by the first hex digits of the SHA-256 of the
    /// `/`-joined path, so two paths that flatten to the same text still
    /// receive distinct ids.
    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        let human: String = self
            .0
            .iter()
            .flat_map(|c| c.chars())
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let digest = Sha256::digest(self.to_string().as_bytes());
        let suffix: String = digest
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<String>()
            .chars()
            .take(TEMPLATE_ID_HASH_LENGTH)
            .collect();
        TemplateId(format!("{human}{suffix}"))
    }
}

impl fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(PATH_SEPARATOR.to_string().as_str()))
    }
}

impl From<ConstructPath> for String {
    fn from(path: ConstructPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for ConstructPath {
    type Error = crate::error::SkyweaveError;

    fn try_from(value: String) -> crate::error::Result<Self> {
        let components: Vec<String> = value.split(PATH_SEPARATOR).map(String::from).collect();
        if components.iter().any(String::is_empty) {
            return Err(crate::error::SkyweaveError::Config {
                message: format!("invalid construct path: \"{value}\""),
            });
        }
        Ok(Self(components))
    }
}

/// Identifier of a resource inside a synthesized template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks that `name` is usable as a construct name or logical id.
///
/// # Errors
///
/// Returns an error if the name is empty or contains the path separator.
pub fn validate_name(name: &str) -> crate::error::Result<()> {
    if name.is_empty() || name.contains(PATH_SEPARATOR) {
        return Err(crate::error::SkyweaveError::Config {
            message: format!("invalid construct name: \"{name}\""),
        });
    }
    Ok(())
}

/// Checks that `name` is usable as a stack output name.
///
/// Output names become template output ids and the second half of
/// `Stack:output` export names, so they must be non-empty ASCII alphanumerics.
///
/// # Errors
///
/// Returns an error if the name is empty or contains any other character.
pub fn validate_output_name(name: &str) -> crate::error::Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(crate::error::SkyweaveError::Config {
            message: format!("invalid output name \"{name}\": expected ASCII letters and digits"),
        });
    }
    Ok(())
}
