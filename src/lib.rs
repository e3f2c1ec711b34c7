// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # ildiff
//!
//! Behavioral regression detection between two builds of a .NET program, working on decoded
//! CIL method bodies.
//!
//! `ildiff` covers the parts of a regression pipeline that operate directly on compiled
//! method bytecode:
//!
//! - **Semantic diff** - Find the types and methods whose instruction streams changed between
//!   two builds, ignoring layout shifts caused by padding
//! - **Trace instrumentation** - Rewrite generated test methods so that every construction
//!   and call on the object under test reports to a recording API
//! - **Ignore patterns** - Exclude types, members and fields by exact name, regular
//!   expression or wildcard
//! - **Trace comparison** - Collect the recorded events and report where two runs diverge
//!
//! Loading binaries, generating tests, compiling and executing them are left to the caller.
//! The loader hands units over as an in-memory model (or as JSON, see
//! [`metadata::CompiledUnit::from_json`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use ildiff::prelude::*;
//!
//! fn build(limit: i32) -> ildiff::Result<CompiledUnit> {
//!     let account = TypeDefinition::new("Bank", "Account");
//!
//!     let mut asm = InstructionAssembler::new();
//!     asm.ldc_i4(limit).pop().ret();
//!     let withdraw = MethodDefinition::new(account.type_ref(), "Withdraw").with_body(asm.finish()?);
//!
//!     Ok(CompiledUnit::new("Bank.dll").with_type(account.with_method(withdraw)))
//! }
//!
//! let old = build(100)?;
//! let new = build(500)?;
//!
//! let diff = DiffEngine::default().compare(&old, &new);
//! assert_eq!(diff.changed_types(), vec!["Bank.Account".to_string()]);
//! # Ok::<(), ildiff::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - Operations, operands, the offset index and the instruction assembler
//! - [`metadata`] - Units, types, methods, exception regions and attribute flags
//! - [`filter`] - Ignore patterns and member filters
//! - [`diff`] - The semantic difference engine
//! - [`instrument`] - The instrumentation rewriter
//! - [`trace`] - Recorders, trace logs and trace comparison
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Parallelism
//!
//! Diffing and rewriting are pure functions over their input. Type pairs are diffed and
//! methods are rewritten in parallel on the `rayon` thread pool; all model types are
//! `Send + Sync`.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use ildiff::prelude::*;
///
/// let engine = DiffEngine::new(Vec::new());
/// assert!(engine.ignore_targets().is_empty());
/// ```
pub mod prelude;

/// Decoded instructions and the tools to build and navigate method bodies.
///
/// # Key Types
///
/// - [`assembly::Operation`] - One instruction: offset, kind and operand
/// - [`assembly::OpKind`] / [`assembly::Operand`] - What an instruction does and on what
/// - [`assembly::OffsetIndex`] - Constant time neighbour lookup by offset
/// - [`assembly::InstructionAssembler`] - Fluent body builder with labels
pub mod assembly;

/// The in-memory model of compiled units.
///
/// # Key Types
///
/// - [`metadata::CompiledUnit`] - A named collection of types
/// - [`metadata::TypeDefinition`] - A type with its methods and fields
/// - [`metadata::MethodDefinition`] - Signature, body, exception regions and locals
pub mod metadata;

/// Ignore patterns and composable member filters.
pub mod filter;

/// The semantic difference engine.
pub mod diff;

/// The instrumentation rewriter.
pub mod instrument;

/// Trace recording and comparison.
pub mod trace;

/// `ildiff` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use ildiff::{metadata::CompiledUnit, Result};
///
/// fn load(json: &str) -> Result<CompiledUnit> {
///     CompiledUnit::from_json(json)
/// }
///
/// assert!(load(r#"{ "name": "Empty.dll" }"#).is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `ildiff` Error type
///
/// # Examples
///
/// ```rust
/// use ildiff::{filter::ForbidExpression, Error};
///
/// match ForbidExpression::parse("Foo", "Fuzzy") {
///     Err(Error::UnknownPatternKind(kind)) => assert_eq!(kind, "Fuzzy"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
pub use error::Error;
