//! Decoded operation representation, operand types and symbolic references.
//!
//! This module defines the instruction model the diff engine and the rewriter operate on.
//! Operations arrive already decoded from an external loader: every [`Operation`] is an
//! `(offset, kind, operand)` triple, where the offset is unique within its body and the
//! only key used to find neighbouring operations.
//!
//! # Key Components
//!
//! - [`crate::assembly::instruction::Operation`] - One decoded instruction
//! - [`crate::assembly::instruction::OpKind`] - Closed set of operation kinds
//! - [`crate::assembly::instruction::Operand`] - Typed operand representation
//! - [`crate::assembly::instruction::MethodRef`], [`crate::assembly::instruction::TypeRef`],
//!   [`crate::assembly::instruction::FieldRef`] - Symbolic references carried by operands
//!
//! # Usage Examples
//!
//! ```rust
//! use ildiff::assembly::{MethodRef, OpKind, Operand, Operation, TypeRef};
//!
//! let account = TypeRef::new("Bank", "Account");
//! let deposit = MethodRef::instance(account, "Deposit");
//!
//! let op = Operation::new(0x10, OpKind::CallVirt, Operand::Method(deposit));
//! assert_eq!(op.encoded_size(), 5);
//! assert_eq!(op.to_string(), "IL_0010: callvirt System.Void Bank.Account::Deposit()");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A symbolic reference to a type.
///
/// Only the information the core needs is kept: the qualified name, and whether the
/// type is a value type (which decides if a recorded return value has to be boxed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    /// Namespace of the type, empty for the global namespace
    pub namespace: String,
    /// Simple name of the type
    pub name: String,
    /// `true` for value types (structs, enums, primitives other than `string`/`object`)
    #[serde(default)]
    pub is_value_type: bool,
}

impl TypeRef {
    /// Create a reference type reference.
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            is_value_type: false,
        }
    }

    /// Create a value type reference.
    #[must_use]
    pub fn value_type(namespace: &str, name: &str) -> Self {
        TypeRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            is_value_type: true,
        }
    }

    /// `System.Object`
    #[must_use]
    pub fn object() -> Self {
        TypeRef::new("System", "Object")
    }

    /// `System.String`
    #[must_use]
    pub fn string() -> Self {
        TypeRef::new("System", "String")
    }

    /// `System.Int32`
    #[must_use]
    pub fn int32() -> Self {
        TypeRef::value_type("System", "Int32")
    }

    /// `System.Boolean`
    #[must_use]
    pub fn boolean() -> Self {
        TypeRef::value_type("System", "Boolean")
    }

    /// Returns the namespace qualified name, e.g. `Bank.Account`.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

/// A symbolic reference to a method, as carried by `call`, `callvirt` and `newobj`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// The type declaring the method
    pub declaring_type: TypeRef,
    /// Simple method name (`.ctor` for constructors)
    pub name: String,
    /// Parameter types, excluding the implicit `this`
    #[serde(default)]
    pub parameters: Vec<TypeRef>,
    /// Return type, `None` for `void`
    #[serde(default)]
    pub return_type: Option<TypeRef>,
    /// Whether the method takes an implicit `this` argument
    #[serde(default)]
    pub has_this: bool,
}

impl MethodRef {
    /// Create a reference to a parameterless `void` instance method.
    #[must_use]
    pub fn instance(declaring_type: TypeRef, name: &str) -> Self {
        MethodRef {
            declaring_type,
            name: name.to_string(),
            parameters: Vec::new(),
            return_type: None,
            has_this: true,
        }
    }

    /// Create a reference to a parameterless `void` static method.
    #[must_use]
    pub fn static_method(declaring_type: TypeRef, name: &str) -> Self {
        MethodRef {
            declaring_type,
            name: name.to_string(),
            parameters: Vec::new(),
            return_type: None,
            has_this: false,
        }
    }

    /// Create a reference to a parameterless instance constructor of `declaring_type`.
    #[must_use]
    pub fn constructor(declaring_type: TypeRef) -> Self {
        MethodRef::instance(declaring_type, ".ctor")
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

    /// Returns `true` if the method does not return a value.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    /// Number of evaluation stack slots consumed by a call to this method.
    #[must_use]
    pub fn stack_pops(&self) -> usize {
        self.parameters.len() + usize::from(self.has_this)
    }

    /// Returns the full signature, e.g. `System.Int32 Bank.Account::Withdraw(System.Int32)`.
    #[must_use]
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.return_type {
            Some(ret) => write!(f, "{ret} ")?,
            None => write!(f, "System.Void ")?,
        }
        write!(f, "{}::{}(", self.declaring_type, self.name)?;
        for (index, param) in self.parameters.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")
    }
}

/// A symbolic reference to a field, as carried by `ldfld`/`stfld` style operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// The type declaring the field
    pub declaring_type: TypeRef,
    /// Field name
    pub name: String,
    /// Type of the field
    pub field_type: TypeRef,
}

/// Represents an immediate value embedded in an operation.
///
/// Floating point values compare by bit pattern, so a `NaN` constant equals itself and
/// `0.0` differs from `-0.0`; both matter when deciding whether a body changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Immediate {
    /// Integer immediate of any width
    Int(i64),
    /// Floating point immediate of any width
    Float(f64),
}

impl PartialEq for Immediate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Immediate::Int(a), Immediate::Int(b)) => a == b,
            (Immediate::Float(a), Immediate::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Immediate {}

/// Represents an operand in a structured way.
///
/// # Examples
///
/// ```rust
/// use ildiff::assembly::{Operand, TypeRef};
///
/// let local = Operand::Local(0);
/// let text = Operand::String("hello".to_string());
/// let ty = Operand::Type(TypeRef::int32());
///
/// assert_eq!(local.as_string(), Some("V_0".to_string()));
/// assert_eq!(text.as_string(), Some("\"hello\"".to_string()));
/// assert_eq!(ty.as_string(), Some("System.Int32".to_string()));
/// assert_eq!(Operand::None.as_string(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// No operand present
    None,
    /// Method reference (`call`, `callvirt`, `newobj`)
    Method(MethodRef),
    /// Local variable index (`ldloc`, `stloc`)
    Local(u16),
    /// String constant (`ldstr`)
    String(String),
    /// Type reference (`box`, `newarr`, `castclass`, ...)
    Type(TypeRef),
    /// Field reference (`ldfld`, `stfld`, ...)
    Field(FieldRef),
    /// Method argument index
    Argument(u16),
    /// Immediate constant
    Immediate(Immediate),
    /// Branch target, as an absolute offset within the same body
    Target(u32),
}

impl Operand {
    /// Returns a formatted string representation of the operand.
    ///
    /// Returns `None` for [`Operand::None`].
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        match self {
            Operand::None => None,
            Operand::Method(method) => Some(method.to_string()),
            Operand::Local(index) => Some(format!("V_{index}")),
            Operand::String(value) => Some(format!("{value:?}")),
            Operand::Type(ty) => Some(ty.to_string()),
            Operand::Field(field) => Some(format!(
                "{} {}::{}",
                field.field_type, field.declaring_type, field.name
            )),
            Operand::Argument(index) => Some(format!("A_{index}")),
            Operand::Immediate(Immediate::Int(value)) => Some(value.to_string()),
            Operand::Immediate(Immediate::Float(value)) => Some(value.to_string()),
            Operand::Target(target) => Some(format!("IL_{target:04X}")),
        }
    }

    /// Width in bytes of the operand encoding.
    fn encoded_size(&self) -> u32 {
        match self {
            Operand::None => 0,
            Operand::Local(index) | Operand::Argument(index) => {
                if *index <= 255 {
                    1
                } else {
                    2
                }
            }
            Operand::Immediate(Immediate::Int(value)) => {
                if i32::try_from(*value).is_ok() {
                    4
                } else {
                    8
                }
            }
            Operand::Immediate(Immediate::Float(_)) => 8,
            Operand::Method(_)
            | Operand::String(_)
            | Operand::Type(_)
            | Operand::Field(_)
            | Operand::Target(_) => 4,
        }
    }
}

/// The closed set of operation kinds the core distinguishes.
///
/// Width variants are coalesced: `stloc.0`, `stloc.s` and `stloc` are all
/// [`OpKind::StoreLocal`], the local index lives in the operand. Everything the core never
/// inspects is [`OpKind::Other`], which keeps the raw opcode so two different opaque
/// instructions never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    /// `call`
    Call,
    /// `callvirt`
    CallVirt,
    /// `newobj`
    NewObj,
    /// `ldloc` (all widths)
    LoadLocal,
    /// `stloc` (all widths)
    StoreLocal,
    /// `pop`
    Pop,
    /// `ret`
    Return,
    /// `ldstr`
    LoadString,
    /// `box`
    Box,
    /// `leave` (all widths)
    Leave,
    /// Any branch (`br`, `brtrue`, `beq`, ...), carrying the long-form opcode. Short forms
    /// are coalesced onto it, `brtrue.s` (`0x2D`) is `Branch(0x3A)`
    Branch(u16),
    /// Opaque pass-through operation, carrying its raw opcode (`0xFE`-prefixed opcodes
    /// as `0xFExx`)
    Other(u16),
}

impl OpKind {
    /// Returns the canonical mnemonic of this kind.
    #[must_use]
    pub fn mnemonic(&self) -> String {
        match self {
            OpKind::Call => "call".to_string(),
            OpKind::CallVirt => "callvirt".to_string(),
            OpKind::NewObj => "newobj".to_string(),
            OpKind::LoadLocal => "ldloc".to_string(),
            OpKind::StoreLocal => "stloc".to_string(),
            OpKind::Pop => "pop".to_string(),
            OpKind::Return => "ret".to_string(),
            OpKind::LoadString => "ldstr".to_string(),
            OpKind::Box => "box".to_string(),
            OpKind::Leave => "leave".to_string(),
            OpKind::Branch(opcode) => branch_mnemonic(*opcode),
            OpKind::Other(opcode) => format!("op_{opcode:02X}"),
        }
    }

    /// Returns `true` for kinds whose operand is a branch target.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(self, OpKind::Leave | OpKind::Branch(_))
    }
}

fn branch_mnemonic(opcode: u16) -> String {
    let name = match opcode {
        0x38 => "br",
        0x39 => "brfalse",
        0x3A => "brtrue",
        0x3B => "beq",
        0x3C => "bge",
        0x3D => "bgt",
        0x3E => "ble",
        0x3F => "blt",
        0x40 => "bne.un",
        0x41 => "bge.un",
        0x42 => "bgt.un",
        0x43 => "ble.un",
        0x44 => "blt.un",
        _ => return format!("br_{opcode:02X}"),
    };
    name.to_string()
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}

/// One decoded instruction of a method body.
///
/// Equality of two operations *as instructions* ignores the offset, see
/// [`Operation::same_instruction`]; the derived `PartialEq` compares all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Offset of the operation within its body, unique and strictly increasing
    pub offset: u32,
    /// What the operation does
    pub kind: OpKind,
    /// The operand of the operation
    pub operand: Operand,
}

impl Operation {
    /// Create a new operation.
    #[must_use]
    pub fn new(offset: u32, kind: OpKind, operand: Operand) -> Self {
        Operation {
            offset,
            kind,
            operand,
        }
    }

    /// Returns `true` if both operations perform the same instruction, i.e. same kind and
    /// same operand. The offset is not considered.
    #[must_use]
    pub fn same_instruction(&self, other: &Operation) -> bool {
        self.kind == other.kind && self.operand == other.operand
    }

    /// Returns the method referenced by this operation, if any.
    #[must_use]
    pub fn method(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Returns the local variable index referenced by this operation, if any.
    #[must_use]
    pub fn local(&self) -> Option<u16> {
        match self.operand {
            Operand::Local(index) => Some(index),
            _ => None,
        }
    }

    /// Returns the branch target of this operation, if any.
    #[must_use]
    pub fn target(&self) -> Option<u32> {
        match self.operand {
            Operand::Target(target) => Some(target),
            _ => None,
        }
    }

    /// Returns `true` for store-local operations of any width.
    #[must_use]
    pub fn is_store_local(&self) -> bool {
        self.kind == OpKind::StoreLocal
    }

    /// Returns `true` for `ret`.
    #[must_use]
    pub fn is_return(&self) -> bool {
        self.kind == OpKind::Return
    }

    /// Offset one past the end of this operation, `None` if it does not fit in `u32`.
    #[must_use]
    pub fn end_offset(&self) -> Option<u32> {
        self.offset.checked_add(self.encoded_size())
    }

    /// Size in bytes this operation occupies when laid out.
    ///
    /// Local loads and stores use the most compact form for their index, branches always use
    /// the long form, so laying out a body never requires a second pass.
    #[must_use]
    pub fn encoded_size(&self) -> u32 {
        match self.kind {
            OpKind::Call
            | OpKind::CallVirt
            | OpKind::NewObj
            | OpKind::LoadString
            | OpKind::Box
            | OpKind::Leave
            | OpKind::Branch(_) => 5,
            OpKind::LoadLocal | OpKind::StoreLocal => match self.operand {
                Operand::Local(0..=3) => 1,
                Operand::Local(4..=255) => 2,
                Operand::Local(_) => 4,
                _ => 1,
            },
            OpKind::Pop | OpKind::Return => 1,
            OpKind::Other(opcode) => {
                let opcode_size = if opcode > 0xFF { 2 } else { 1 };
                opcode_size + self.operand.encoded_size()
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04X}: {}", self.offset, self.kind)?;
        if let Some(operand) = self.operand.as_string() {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_instruction_ignores_offset() {
        let a = Operation::new(0, OpKind::LoadString, Operand::String("a".to_string()));
        let b = Operation::new(12, OpKind::LoadString, Operand::String("a".to_string()));
        let c = Operation::new(0, OpKind::LoadString, Operand::String("b".to_string()));

        assert!(a.same_instruction(&b));
        assert!(!a.same_instruction(&c));
        assert_ne!(a, b);
    }

    #[test]
    fn other_kinds_keep_opcode_identity() {
        let add = Operation::new(0, OpKind::Other(0x58), Operand::None);
        let sub = Operation::new(0, OpKind::Other(0x59), Operand::None);
        assert!(!add.same_instruction(&sub));
    }

    #[test]
    fn conditional_branches_keep_their_condition() {
        let brtrue = Operation::new(0, OpKind::Branch(0x3A), Operand::Target(8));
        let brfalse = Operation::new(0, OpKind::Branch(0x39), Operand::Target(8));

        assert!(!brtrue.same_instruction(&brfalse));
        assert_eq!(brtrue.kind.mnemonic(), "brtrue");
        assert_eq!(OpKind::Branch(0x42).mnemonic(), "bgt.un");
        assert!(brfalse.kind.is_branch());
    }

    #[test]
    fn end_offset_does_not_overflow() {
        let ldstr = Operation::new(u32::MAX - 1, OpKind::LoadString, Operand::String("x".into()));
        assert_eq!(ldstr.end_offset(), None);

        let pop = Operation::new(u32::MAX - 1, OpKind::Pop, Operand::None);
        assert_eq!(pop.end_offset(), Some(u32::MAX));
    }

    #[test]
    fn float_immediates_compare_bitwise() {
        assert_eq!(Immediate::Float(f64::NAN), Immediate::Float(f64::NAN));
        assert_ne!(Immediate::Float(0.0), Immediate::Float(-0.0));
        assert_ne!(Immediate::Int(1), Immediate::Float(1.0));
    }

    #[test]
    fn encoded_sizes() {
        let ldloc = |index| Operation::new(0, OpKind::LoadLocal, Operand::Local(index));
        assert_eq!(ldloc(0).encoded_size(), 1);
        assert_eq!(ldloc(3).encoded_size(), 1);
        assert_eq!(ldloc(4).encoded_size(), 2);
        assert_eq!(ldloc(300).encoded_size(), 4);

        let ldc = Operation::new(0, OpKind::Other(0x20), Operand::Immediate(Immediate::Int(42)));
        assert_eq!(ldc.encoded_size(), 5);

        let ceq = Operation::new(0, OpKind::Other(0xFE01), Operand::None);
        assert_eq!(ceq.encoded_size(), 2);
    }

    #[test]
    fn method_signature_formatting() {
        let account = TypeRef::new("Bank", "Account");
        let withdraw = MethodRef::instance(account, "Withdraw")
            .with_parameters(vec![TypeRef::int32()])
            .returning(TypeRef::boolean());

        assert_eq!(
            withdraw.signature(),
            "System.Boolean Bank.Account::Withdraw(System.Int32)"
        );
        assert_eq!(withdraw.stack_pops(), 2);
        assert!(!withdraw.is_void());
    }

    #[test]
    fn global_namespace_type_name() {
        let ty = TypeRef::new("", "Program");
        assert_eq!(ty.full_name(), "Program");
        assert_eq!(ty.to_string(), "Program");
    }
}
