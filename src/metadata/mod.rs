//! In-memory model of compiled units, types and methods.
//!
//! This module implements the unit/type/method side of the instruction model. Units are
//! produced by an external loader and are immutable once loaded.
//!
//! # Key Components
//!
//! - [`CompiledUnit`] - A named collection of types, one build of a module
//! - [`TypeDefinition`] / [`FieldDefinition`] - Types and their field descriptors
//! - [`MethodDefinition`] - Method signature plus decoded body, locals and max stack
//! - [`ExceptionRegion`] - Inclusive try/handler offset ranges
//! - [`Visibility`], [`TypeModifiers`], [`MethodModifiers`], [`FieldModifiers`] - Attribute flags

mod exceptions;
mod flags;
mod method;
mod typedef;
mod unit;

pub use exceptions::{ExceptionRegion, HandlerKind};
pub use flags::{FieldModifiers, MethodModifiers, TypeModifiers, Visibility};
pub use method::{LocalVariable, MethodDefinition, DEFAULT_MAX_STACK};
pub use typedef::{FieldDefinition, TypeDefinition};
pub use unit::CompiledUnit;
