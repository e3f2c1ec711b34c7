//! Type definitions and their field descriptors.

use serde::{Deserialize, Serialize};

use crate::{
    assembly::TypeRef,
    metadata::{FieldModifiers, MethodDefinition, TypeModifiers, Visibility},
};

/// A field descriptor: name, flags and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// Accessibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: FieldModifiers,
    /// Declared type of the field
    pub field_type: TypeRef,
}

impl FieldDefinition {
    /// Create a private instance field.
    #[must_use]
    pub fn new(name: &str, field_type: TypeRef) -> Self {
        FieldDefinition {
            name: name.to_string(),
            visibility: Visibility::Private,
            modifiers: FieldModifiers::empty(),
            field_type,
        }
    }

    /// Set the accessibility.
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the modifier flags.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: FieldModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// A type definition owned by a [`crate::metadata::CompiledUnit`].
///
/// # Examples
///
/// ```rust
/// use ildiff::assembly::TypeRef;
/// use ildiff::metadata::{FieldDefinition, MethodDefinition, TypeDefinition};
///
/// let account = TypeDefinition::new("Bank", "Account")
///     .with_field(FieldDefinition::new("balance", TypeRef::int32()))
///     .with_method(MethodDefinition::new(TypeRef::new("Bank", "Account"), "Deposit"));
///
/// assert_eq!(account.full_name(), "Bank.Account");
/// assert!(account.method_by_name("Deposit").is_some());
/// assert!(account.field_by_name("balance").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Accessibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: TypeModifiers,
    /// Methods declared by the type
    #[serde(default)]
    pub methods: Vec<MethodDefinition>,
    /// Fields declared by the type
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl TypeDefinition {
    /// Create a public type without members.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeDefinition {
            namespace: namespace.to_string(),
            name: name.to_string(),
            visibility: Visibility::Public,
            modifiers: TypeModifiers::empty(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add a method.
    #[must_use]
    pub fn with_method(mut self, method: MethodDefinition) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the accessibility.
    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the modifier flags.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: TypeModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Returns the namespace qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.type_ref().full_name()
    }

    /// Returns a reference to this type.
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        TypeRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            is_value_type: self.modifiers.contains(TypeModifiers::VALUE_TYPE),
        }
    }

    /// Returns the first method called `name`.
    #[must_use]
    pub fn method_by_name(&self, name: &str) -> Option<&MethodDefinition> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Returns all methods called `name` (the overload set).
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDefinition> {
        self.methods.iter().filter(move |method| method.name == name)
    }

    /// Returns the method whose full signature equals `signature`.
    #[must_use]
    pub fn method_by_signature(&self, signature: &str) -> Option<&MethodDefinition> {
        self.methods
            .iter()
            .find(|method| method.signature() == signature)
    }

    /// Returns the field called `name`.
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }
}
