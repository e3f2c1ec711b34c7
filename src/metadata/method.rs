//! Method definitions and their bodies.
//!
//! A [`MethodDefinition`] carries its qualified signature together with the decoded body:
//! the offset ordered operations, the exception regions, the declared maximum stack depth
//! and the declared local variable slots.
//!
//! # Examples
//!
//! ```rust
//! use ildiff::assembly::{InstructionAssembler, TypeRef};
//! use ildiff::metadata::MethodDefinition;
//!
//! let account = TypeRef::new("Bank", "Account");
//!
//! let mut asm = InstructionAssembler::new();
//! asm.ldc_i4(0).ret();
//!
//! let method = MethodDefinition::new(account, "Balance")
//!     .returning(TypeRef::int32())
//!     .with_body(asm.finish()?);
//!
//! assert_eq!(method.full_name(), "Bank.Account::Balance");
//! assert_eq!(method.signature(), "System.Int32 Bank.Account::Balance()");
//! assert_eq!(method.code_size(), 6);
//! method.validate()?;
//! # Ok::<(), ildiff::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    assembly::{validate_offsets, MethodRef, Operation, TypeRef},
    metadata::{ExceptionRegion, MethodModifiers, Visibility},
    Result,
};

/// Default max stack of a method body, as used by the ECMA-335 tiny header format.
pub const DEFAULT_MAX_STACK: u16 = 8;

/// A declared local variable slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariable {
    /// Slot index, equal to the position in the declaring method's local list
    pub index: u16,
    /// Name of the local (from debug information, or generated)
    pub name: String,
    /// Declared type
    pub ty: TypeRef,
}

/// A method with its decoded body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDefinition {
    /// The declaring type. A name based lookup, never an owning reference
    pub declaring_type: TypeRef,
    /// Simple method name
    pub name: String,
    /// Parameter types, excluding the implicit `this`
    #[serde(default)]
    pub parameters: Vec<TypeRef>,
    /// Return type, `None` for `void`
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    /// Accessibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Modifier flags
    #[serde(default)]
    pub modifiers: MethodModifiers,
    /// The body, in strictly increasing offset order
    #[serde(default)]
    pub operations: Vec<Operation>,
    /// Exception regions of the body
    #[serde(default)]
    pub exception_regions: Vec<ExceptionRegion>,
    /// Declared maximum evaluation stack depth
    pub max_stack: u16,
    /// Declared local variables
    #[serde(default)]
    pub locals: Vec<LocalVariable>,
}

impl MethodDefinition {
    /// Create a public, parameterless `void` instance method with an empty body.
    #[must_use]
    pub fn new(declaring_type: TypeRef, name: &str) -> Self {
        MethodDefinition {
            declaring_type,
            name: name.to_string(),
            parameters: Vec::new(),
            return_type: None,
            visibility: Visibility::Public,
            modifiers: MethodModifiers::empty(),
            operations: Vec::new(),
            exception_regions: Vec::new(),
            max_stack: DEFAULT_MAX_STACK,
            locals: Vec::new(),
        }
    }

    /// Replace the body operations.
    #[must_use]
    pub fn with_body(mut self, operations: Vec<Operation>) -> Self {
        self.operations = operations;
        self
    }

    /// Add an exception region.
    #[must_use]
    pub fn with_region(mut self, region: ExceptionRegion) -> Self {
        self.exception_regions.push(region);
        self
    }

    /// Declare a new local of type `ty`, placed in the next free slot.
    #[must_use]
    pub fn with_local(mut self, name: &str, ty: TypeRef) -> Self {
        self.add_local(name, ty);
        self
    }

    /// Set the declared max stack.
    #[must_use]
    pub fn with_max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = max_stack;
        self
    }

    /// Replace the parameter list.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<TypeRef>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the return type.
    #[must_use]
    pub fn returning(mut self, return_type: TypeRef) -> Self {
        self.return_type = Some(return_type);
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
    pub fn with_modifiers(mut self, modifiers: MethodModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Declare a new local of type `ty` and return its slot index.
    pub fn add_local(&mut self, name: &str, ty: TypeRef) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let index = self.locals.len() as u16;
        self.locals.push(LocalVariable {
            index,
            name: name.to_string(),
            ty,
        });
        index
    }

    /// Returns the local in slot `index`.
    #[must_use]
    pub fn local(&self, index: u16) -> Option<&LocalVariable> {
        self.locals.get(usize::from(index))
    }

    /// Returns `true` if the method does not return a value.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns the qualified name, e.g. `Bank.Account::Withdraw`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }

    /// Returns a reference that calls this method.
    #[must_use]
    pub fn method_ref(&self) -> MethodRef {
        MethodRef {
            declaring_type: self.declaring_type.clone(),
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            return_type: self.return_type.clone(),
            has_this: !self.is_static(),
        }
    }

    /// Returns the full signature, e.g. `System.Boolean Bank.Account::Withdraw(System.Int32)`.
    #[must_use]
    pub fn signature(&self) -> String {
        self.method_ref().signature()
    }

    /// Size in bytes of the body, measured up to the end of the last operation.
    ///
    /// Saturates at `u32::MAX` for a body that ends beyond the offset range, which
    /// [`MethodDefinition::validate`] rejects.
    #[must_use]
    pub fn code_size(&self) -> u32 {
        self.operations
            .last()
            .map_or(0, |last| last.end_offset().unwrap_or(u32::MAX))
    }

    /// Check the body invariants.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the operation offsets are not strictly
    /// increasing, the last operation ends beyond the offset range, an exception region is
    /// inverted, or the local slots are not numbered by their position.
    pub fn validate(&self) -> Result<()> {
        validate_offsets(&self.operations)
            .map_err(|e| malformed_error!("{} - {}", self.full_name(), e))?;

        if let Some(last) = self.operations.last() {
            if last.end_offset().is_none() {
                return Err(malformed_error!(
                    "{} - {} ends beyond the offset range",
                    self.full_name(),
                    last
                ));
            }
        }

        for region in &self.exception_regions {
            region
                .validate()
                .map_err(|e| malformed_error!("{} - {}", self.full_name(), e))?;
        }

        for (position, local) in self.locals.iter().enumerate() {
            if usize::from(local.index) != position {
                return Err(malformed_error!(
                    "{} - local '{}' declares slot {} at position {}",
                    self.full_name(),
                    local.name,
                    local.index,
                    position
                ));
            }
        }

        Ok(())
    }
}
