//! Forbidden name lists and the ignore targets derived from them.
//!
//! [`IgnoreConfig`] holds three independently classified lists of [`ForbidExpression`]s:
//! forbidden types, forbidden members and forbidden fields. A name is forbidden if any
//! expression of the applicable list matches it.
//!
//! The configuration is usually read from a JSON document:
//!
//! ```json
//! {
//!   "forbidden_types":   [ { "pattern": "System.*", "kind": "Wildcard" } ],
//!   "forbidden_members": [ { "pattern": "ToString", "kind": "ExactString" } ],
//!   "forbidden_fields":  [ { "pattern": "^<.*>k__BackingField$", "kind": "Regex" } ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    filter::{ForbidExpression, MemberFilter},
    metadata::{FieldDefinition, MethodDefinition, TypeDefinition},
    Result,
};

/// The three forbidden lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreConfig {
    /// Matched against namespace qualified type names
    pub forbidden_types: Vec<ForbidExpression>,
    /// Matched against simple and qualified (`Type::Member`) method names
    pub forbidden_members: Vec<ForbidExpression>,
    /// Matched against simple and qualified (`Type::Field`) field names
    pub forbidden_fields: Vec<ForbidExpression>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawExpression {
    pattern: String,
    kind: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawIgnoreConfig {
    #[serde(default)]
    forbidden_types: Vec<RawExpression>,
    #[serde(default)]
    forbidden_members: Vec<RawExpression>,
    #[serde(default)]
    forbidden_fields: Vec<RawExpression>,
}

fn compile_all(raw: &[RawExpression]) -> Result<Vec<ForbidExpression>> {
    raw.iter()
        .map(|entry| ForbidExpression::parse(&entry.pattern, &entry.kind))
        .collect()
}

fn to_raw(expressions: &[ForbidExpression]) -> Vec<RawExpression> {
    expressions
        .iter()
        .map(|expression| RawExpression {
            pattern: expression.pattern().to_string(),
            kind: expression.kind().to_string(),
        })
        .collect()
}

fn any_match(expressions: &[ForbidExpression], names: &[&str]) -> bool {
    expressions
        .iter()
        .any(|expression| names.iter().any(|name| expression.is_match(name)))
}

impl IgnoreConfig {
    /// Parse a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] for a document of the wrong shape, and
    /// [`crate::Error::UnknownPatternKind`], [`crate::Error::InvalidPattern`] or
    /// [`crate::Error::InvalidArgument`] for the first entry that does not compile.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawIgnoreConfig = serde_json::from_str(json)?;

        Ok(IgnoreConfig {
            forbidden_types: compile_all(&raw.forbidden_types)?,
            forbidden_members: compile_all(&raw.forbidden_members)?,
            forbidden_fields: compile_all(&raw.forbidden_fields)?,
        })
    }

    /// Read a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file can not be read, plus everything
    /// [`IgnoreConfig::from_json`] returns.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize the configuration to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let raw = RawIgnoreConfig {
            forbidden_types: to_raw(&self.forbidden_types),
            forbidden_members: to_raw(&self.forbidden_members),
            forbidden_fields: to_raw(&self.forbidden_fields),
        };
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    /// Returns `true` if the qualified type name is forbidden.
    #[must_use]
    pub fn is_type_forbidden(&self, full_name: &str) -> bool {
        any_match(&self.forbidden_types, &[full_name])
    }

    /// Returns `true` if the member `name` of type `type_name` is forbidden.
    #[must_use]
    pub fn is_member_forbidden(&self, type_name: &str, name: &str) -> bool {
        let qualified = format!("{type_name}::{name}");
        any_match(&self.forbidden_members, &[name, &qualified])
    }

    /// Returns `true` if the field `name` of type `type_name` is forbidden.
    #[must_use]
    pub fn is_field_forbidden(&self, type_name: &str, name: &str) -> bool {
        let qualified = format!("{type_name}::{name}");
        any_match(&self.forbidden_fields, &[name, &qualified])
    }

    /// Derive the ignore targets the difference engine consumes: one type target per
    /// forbidden type, one method target per forbidden member.
    #[must_use]
    pub fn ignore_targets(&self) -> Vec<IgnoreTarget> {
        self.forbidden_types
            .iter()
            .cloned()
            .map(IgnoreTarget::ty)
            .chain(self.forbidden_members.iter().cloned().map(IgnoreTarget::method))
            .collect()
    }
}

/// What an [`IgnoreTarget`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Matched against namespace qualified type names
    Type,
    /// Matched against simple method names
    Method,
}

/// A named exclusion rule for the difference engine.
///
/// # Examples
///
/// ```rust
/// use ildiff::filter::{ForbidExpression, IgnoreTarget, TargetKind};
///
/// let target = IgnoreTarget::method(ForbidExpression::exact("ToString")?);
/// assert!(target.matches(TargetKind::Method, "ToString"));
/// assert!(!target.matches(TargetKind::Type, "ToString"));
/// # Ok::<(), ildiff::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreTarget {
    /// What the rule applies to
    pub kind: TargetKind,
    /// The name pattern
    pub pattern: ForbidExpression,
}

impl IgnoreTarget {
    /// A type-kind target.
    #[must_use]
    pub fn ty(pattern: ForbidExpression) -> Self {
        IgnoreTarget {
            kind: TargetKind::Type,
            pattern,
        }
    }

    /// A method-kind target.
    #[must_use]
    pub fn method(pattern: ForbidExpression) -> Self {
        IgnoreTarget {
            kind: TargetKind::Method,
            pattern,
        }
    }

    /// Returns `true` if this target is of `kind` and its pattern matches `name`.
    #[must_use]
    pub fn matches(&self, kind: TargetKind, name: &str) -> bool {
        self.kind == kind && self.pattern.is_match(name)
    }
}

/// A [`MemberFilter`] rejecting everything an [`IgnoreConfig`] forbids.
///
/// A member or field of a forbidden type is rejected as well.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    config: IgnoreConfig,
}

impl IgnoreFilter {
    /// Create a filter for `config`.
    #[must_use]
    pub fn new(config: IgnoreConfig) -> Self {
        IgnoreFilter { config }
    }

    /// The underlying configuration.
    #[must_use]
    pub fn config(&self) -> &IgnoreConfig {
        &self.config
    }
}

impl MemberFilter for IgnoreFilter {
    fn is_type_usable(&self, ty: &TypeDefinition) -> bool {
        !self.config.is_type_forbidden(&ty.full_name())
    }

    fn is_method_usable(&self, ty: &TypeDefinition, method: &MethodDefinition) -> bool {
        let type_name = ty.full_name();
        !self.config.is_type_forbidden(&type_name)
            && !self.config.is_member_forbidden(&type_name, &method.name)
    }

    fn is_field_usable(&self, ty: &TypeDefinition, field: &FieldDefinition) -> bool {
        let type_name = ty.full_name();
        !self.config.is_type_forbidden(&type_name)
            && !self.config.is_field_forbidden(&type_name, &field.name)
    }
}
