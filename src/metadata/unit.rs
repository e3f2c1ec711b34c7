//! The compiled unit: one loaded build of a module.
//!
//! A [`CompiledUnit`] owns its types exclusively and is never mutated once loaded. Both the
//! difference engine and the rewriter only ever borrow it; the rewriter produces new
//! methods rather than touching the unit it was given.
//!
//! Loading a unit from a binary module is the job of an external loader. Units can be
//! exchanged with such a loader as JSON through [`CompiledUnit::from_json`] and
//! [`CompiledUnit::to_json`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    metadata::{MethodDefinition, TypeDefinition},
    Result,
};

/// A named collection of type definitions.
///
/// # Examples
///
/// ```rust
/// use ildiff::metadata::{CompiledUnit, TypeDefinition};
///
/// let unit = CompiledUnit::new("Bank.dll")
///     .with_type(TypeDefinition::new("Bank", "Account"))
///     .with_type(TypeDefinition::new("Bank", "Ledger"));
///
/// assert_eq!(unit.types().len(), 2);
/// assert!(unit.type_by_name("Bank.Ledger").is_some());
/// assert!(unit.type_by_name("Ledger").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledUnit {
    /// Name or location identifying the unit
    pub name: String,
    /// The types defined by the unit
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
}

impl CompiledUnit {
    /// Create an empty unit called `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        CompiledUnit {
            name: name.to_string(),
            types: Vec::new(),
        }
    }

    /// Add a type definition.
    #[must_use]
    pub fn with_type(mut self, ty: TypeDefinition) -> Self {
        self.types.push(ty);
        self
    }

    /// Returns all types of the unit.
    #[must_use]
    pub fn types(&self) -> &[TypeDefinition] {
        &self.types
    }

    /// Returns the type with the namespace qualified name `full_name`.
    #[must_use]
    pub fn type_by_name(&self, full_name: &str) -> Option<&TypeDefinition> {
        self.types.iter().find(|ty| ty.full_name() == full_name)
    }

    /// Returns the type declaring `method`.
    ///
    /// This is a lookup by name, the method holds no reference back into the unit.
    #[must_use]
    pub fn declaring_type(&self, method: &MethodDefinition) -> Option<&TypeDefinition> {
        self.types.iter().find(|ty| {
            ty.namespace == method.declaring_type.namespace
                && ty.name == method.declaring_type.name
        })
    }

    /// Iterate over every method of every type.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDefinition> {
        self.types.iter().flat_map(|ty| ty.methods.iter())
    }

    /// Check the body invariants of every method.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for the first method that violates them.
    pub fn validate(&self) -> Result<()> {
        for method in self.methods() {
            method.validate()?;
        }
        Ok(())
    }

    /// Parse a unit from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] if the document is not a valid unit.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a unit from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file can not be read, or
    /// [`crate::Error::JsonError`] if it is not a valid unit.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize the unit to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
