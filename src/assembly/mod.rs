//! Instruction model, offset index and body assembler.
//!
//! This module holds the decoded representation of method bodies the rest of the crate
//! works with. Bodies are supplied by an external loader; nothing here decodes raw bytes.
//!
//! # Key Components
//!
//! - [`Operation`], [`OpKind`], [`Operand`] - One decoded instruction and its parts
//! - [`MethodRef`], [`TypeRef`], [`FieldRef`] - Symbolic references carried by operands
//! - [`OffsetIndex`] - O(1) offset lookup with previous/next neighbour derivation
//! - [`InstructionAssembler`] - Fluent builder assigning offsets to emitted operations
//!
//! # Invariants
//!
//! Offsets within one body are unique and strictly increasing. [`OffsetIndex::new`] and
//! [`validate_offsets`] reject bodies that break this.

mod assembler;
mod index;
mod instruction;

pub use assembler::{InstructionAssembler, BR};
pub use index::{validate_offsets, OffsetIndex};
pub use instruction::{FieldRef, Immediate, MethodRef, OpKind, Operand, Operation, TypeRef};
