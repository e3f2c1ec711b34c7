//! Accessibility and modifier flags for types, methods and fields.
//!
//! The values follow the ECMA-335 attribute encodings (§II.23.1), reduced to the subset
//! the filters consult.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Member and type accessibility, §II.23.1.10 / §II.23.1.15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    /// Member not referenceable
    CompilerControlled,
    /// Accessible only by the parent type
    #[default]
    Private,
    /// Accessible by sub-types only in this assembly
    FamilyAndAssembly,
    /// Accessible by anyone in the assembly
    Assembly,
    /// Accessible only by type and sub-types
    Family,
    /// Accessible by sub-types anywhere, plus anyone in the assembly
    FamilyOrAssembly,
    /// Accessible by anyone who has visibility to this scope
    Public,
}

impl Visibility {
    /// Decode the 3-bit access field of a method or field attribute word.
    #[must_use]
    pub fn from_member_flags(flags: u32) -> Self {
        match flags & 0x0007 {
            0x0000 => Visibility::CompilerControlled,
            0x0001 => Visibility::Private,
            0x0002 => Visibility::FamilyAndAssembly,
            0x0003 => Visibility::Assembly,
            0x0004 => Visibility::Family,
            0x0005 => Visibility::FamilyOrAssembly,
            _ => Visibility::Public,
        }
    }

    /// Returns `true` if code outside the declaring assembly can reach the member.
    #[must_use]
    pub fn is_externally_visible(&self) -> bool {
        matches!(
            self,
            Visibility::Public | Visibility::Family | Visibility::FamilyOrAssembly
        )
    }
}

bitflags! {
    /// Type modifier flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TypeModifiers: u32 {
        /// Type is an interface
        const INTERFACE = 0x0020;
        /// Type is abstract
        const ABSTRACT = 0x0080;
        /// Type can not be derived from
        const SEALED = 0x0100;
        /// Type is a value type
        const VALUE_TYPE = 0x10000;
    }
}

bitflags! {
    /// Method modifier flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method can not be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special (property accessor, operator, ...)
        const SPECIAL_NAME = 0x0800;
    }
}

bitflags! {
    /// Field modifier flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FieldModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
    }
}
