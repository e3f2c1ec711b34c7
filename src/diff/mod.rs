//! Semantic difference engine for compiled units.
//!
//! The engine pairs the types of two builds by their qualified name and, within each pair,
//! the methods by their name. Paired methods are compared body against body with
//! [`compare_bodies`]; everything that changed ends up in an [`AssemblyDiff`].
//!
//! Only structurally paired items are compared. Types and methods that exist in the new
//! build alone are listed as [`Unpaired`] items, which are informational and never make a
//! diff "different". Items only present in the old build are not reported at all.
//!
//! Bodies are validated pair by pair, right before they are compared. A pair where either
//! body breaks the instruction model invariants is listed as a [`Skipped`] item and the
//! rest of the unit is still compared. Ignored types and methods are never looked at.
//!
//! # Key Components
//!
//! - [`DiffEngine`] - Holds the ignore targets and runs the comparison
//! - [`AssemblyDiff`] - Changed types of a unit pair
//! - [`TypeDiff`] - Changed methods of one type pair
//! - [`BodyComparison`] - How two bodies relate, used for logging and tests
//!
//! # Examples
//!
//! ```rust
//! use ildiff::assembly::InstructionAssembler;
//! use ildiff::diff::DiffEngine;
//! use ildiff::metadata::{CompiledUnit, MethodDefinition, TypeDefinition};
//!
//! fn unit(message: &str) -> ildiff::Result<CompiledUnit> {
//!     let mut asm = InstructionAssembler::new();
//!     asm.ldstr(message).pop().ret();
//!
//!     let ty = TypeDefinition::new("Demo", "Greeter");
//!     let method = MethodDefinition::new(ty.type_ref(), "Greet").with_body(asm.finish()?);
//!     Ok(CompiledUnit::new("Demo.dll").with_type(ty.with_method(method)))
//! }
//!
//! let old = unit("hello")?;
//! let new = unit("bonjour")?;
//!
//! let diff = DiffEngine::default().compare(&old, &new);
//! assert!(diff.is_different());
//! assert_eq!(diff.changed_types(), vec!["Demo.Greeter".to_string()]);
//! # Ok::<(), ildiff::Error>(())
//! ```

mod body;

pub use body::{compare_bodies, BodyComparison};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::{
    filter::{IgnoreConfig, IgnoreTarget, TargetKind},
    metadata::{CompiledUnit, MethodDefinition, TypeDefinition},
};

/// A type or method of the new build that has no counterpart in the old one.
#[derive(Debug, Clone, Copy)]
pub enum Unpaired<'a> {
    /// No type of the same qualified name exists in the old build
    Type(&'a TypeDefinition),
    /// The declaring type is paired, but no method of this name exists in the old build
    Method {
        /// Declaring type in the new build
        ty: &'a TypeDefinition,
        /// The method in the new build
        method: &'a MethodDefinition,
    },
}

impl Unpaired<'_> {
    /// Qualified name of the item.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            Unpaired::Type(ty) => ty.full_name(),
            Unpaired::Method { method, .. } => method.full_name(),
        }
    }
}

/// A paired method left out of the comparison because a body is malformed.
#[derive(Debug, Clone)]
pub struct Skipped<'a> {
    /// Declaring type in the new build
    pub ty: &'a TypeDefinition,
    /// The method in the new build
    pub method: &'a MethodDefinition,
    /// Why the pair could not be compared
    pub reason: String,
}

/// The changed methods of one paired type.
#[derive(Debug, Clone)]
pub struct TypeDiff<'a> {
    /// The type in the old build
    pub old: &'a TypeDefinition,
    /// The type in the new build
    pub new: &'a TypeDefinition,
    /// Changed methods, as found in the new build
    pub changed_methods: Vec<&'a MethodDefinition>,
}

impl TypeDiff<'_> {
    /// Returns `true` if at least one method changed.
    #[must_use]
    pub fn is_different(&self) -> bool {
        !self.changed_methods.is_empty()
    }

    /// Qualified name of the type.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.new.full_name()
    }

    /// Simple names of the changed methods.
    #[must_use]
    pub fn changed_method_names(&self) -> Vec<&str> {
        self.changed_methods
            .iter()
            .map(|method| method.name.as_str())
            .collect()
    }
}

/// The result of comparing two units.
#[derive(Debug, Clone)]
pub struct AssemblyDiff<'a> {
    /// The old build
    pub old: &'a CompiledUnit,
    /// The new build
    pub new: &'a CompiledUnit,
    /// One entry per type with at least one changed method
    pub type_diffs: Vec<TypeDiff<'a>>,
    /// Items of the new build that could not be paired
    pub unpaired: Vec<Unpaired<'a>>,
    /// Paired methods that could not be compared
    pub skipped: Vec<Skipped<'a>>,
}

impl<'a> AssemblyDiff<'a> {
    /// Returns `true` if any type changed.
    #[must_use]
    pub fn is_different(&self) -> bool {
        !self.type_diffs.is_empty()
    }

    /// Qualified names of the changed types.
    #[must_use]
    pub fn changed_types(&self) -> Vec<String> {
        self.type_diffs.iter().map(TypeDiff::full_name).collect()
    }

    /// The diff of the type named `full_name`, if it changed.
    #[must_use]
    pub fn type_diff(&self, full_name: &str) -> Option<&TypeDiff<'a>> {
        self.type_diffs
            .iter()
            .find(|diff| diff.new.full_name() == full_name)
    }

    /// Total number of changed methods over all types.
    #[must_use]
    pub fn changed_method_count(&self) -> usize {
        self.type_diffs
            .iter()
            .map(|diff| diff.changed_methods.len())
            .sum()
    }
}

/// Outcome of diffing one type of the new build.
enum TypeOutcome<'a> {
    Ignored,
    Unpaired(&'a TypeDefinition),
    Paired {
        diff: TypeDiff<'a>,
        unpaired: Vec<Unpaired<'a>>,
        skipped: Vec<Skipped<'a>>,
    },
}

/// Compares two builds of a unit.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    ignore: Vec<IgnoreTarget>,
}

impl DiffEngine {
    /// Create an engine that skips everything matched by `ignore`.
    #[must_use]
    pub fn new(ignore: Vec<IgnoreTarget>) -> Self {
        DiffEngine { ignore }
    }

    /// Create an engine from the type and member lists of an [`IgnoreConfig`].
    #[must_use]
    pub fn from_config(config: &IgnoreConfig) -> Self {
        Self::new(config.ignore_targets())
    }

    /// The configured ignore targets.
    #[must_use]
    pub fn ignore_targets(&self) -> &[IgnoreTarget] {
        &self.ignore
    }

    fn is_ignored(&self, kind: TargetKind, name: &str) -> bool {
        self.ignore.iter().any(|target| target.matches(kind, name))
    }

    /// Compare `old` against `new`.
    ///
    /// Types are diffed in parallel; the order of [`AssemblyDiff::type_diffs`] follows the
    /// order of the new build. Malformed method pairs end up in [`AssemblyDiff::skipped`].
    #[must_use]
    pub fn compare<'a>(&self, old: &'a CompiledUnit, new: &'a CompiledUnit) -> AssemblyDiff<'a> {
        let old_types: FxHashMap<String, &'a TypeDefinition> = old
            .types()
            .iter()
            .map(|ty| (ty.full_name(), ty))
            .collect();

        let outcomes: Vec<TypeOutcome<'a>> = new
            .types()
            .par_iter()
            .map(|ty| {
                let name = ty.full_name();
                if self.is_ignored(TargetKind::Type, &name) {
                    return TypeOutcome::Ignored;
                }

                match old_types.get(&name) {
                    Some(&old_ty) => self.diff_type(old_ty, ty),
                    None => TypeOutcome::Unpaired(ty),
                }
            })
            .collect();

        let mut result = AssemblyDiff {
            old,
            new,
            type_diffs: Vec::new(),
            unpaired: Vec::new(),
            skipped: Vec::new(),
        };

        for outcome in outcomes {
            match outcome {
                TypeOutcome::Ignored => {}
                TypeOutcome::Unpaired(ty) => result.unpaired.push(Unpaired::Type(ty)),
                TypeOutcome::Paired {
                    diff,
                    unpaired,
                    skipped,
                } => {
                    result.unpaired.extend(unpaired);
                    result.skipped.extend(skipped);
                    if diff.is_different() {
                        result.type_diffs.push(diff);
                    }
                }
            }
        }

        result
    }

    fn diff_type<'a>(&self, old: &'a TypeDefinition, new: &'a TypeDefinition) -> TypeOutcome<'a> {
        let mut diff = TypeDiff {
            old,
            new,
            changed_methods: Vec::new(),
        };
        let mut unpaired = Vec::new();
        let mut skipped = Vec::new();

        for method in &new.methods {
            if self.is_ignored(TargetKind::Method, &method.name) {
                continue;
            }

            let Some(counterpart) = pair_method(old, method) else {
                unpaired.push(Unpaired::Method { ty: new, method });
                continue;
            };

            if let Err(error) = counterpart.validate().and_then(|()| method.validate()) {
                log::warn!("{} not compared: {}", method.full_name(), error);
                skipped.push(Skipped {
                    ty: new,
                    method,
                    reason: error.to_string(),
                });
                continue;
            }

            let comparison = compare_bodies(&counterpart.operations, &method.operations);
            if comparison.is_changed() {
                log::debug!("{} changed: {}", method.full_name(), comparison);
                diff.changed_methods.push(method);
            }
        }

        TypeOutcome::Paired {
            diff,
            unpaired,
            skipped,
        }
    }
}

/// Find the counterpart of `method` in `old`: the same-named method with an identical
/// signature, otherwise the first same-named overload.
fn pair_method<'a>(
    old: &'a TypeDefinition,
    method: &MethodDefinition,
) -> Option<&'a MethodDefinition> {
    let signature = method.signature();
    let mut fallback = None;

    for candidate in old.methods.iter().filter(|m| m.name == method.name) {
        if candidate.signature() == signature {
            return Some(candidate);
        }
        if fallback.is_none() {
            fallback = Some(candidate);
        }
    }

    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{InstructionAssembler, TypeRef},
        filter::ForbidExpression,
        test::account_unit,
    };

    fn overloaded(first_message: &str, second_message: &str) -> CompiledUnit {
        let ty = TypeDefinition::new("Bank", "Printer");

        let mut first = InstructionAssembler::new();
        first.ldstr(first_message).pop().ret();
        let mut second = InstructionAssembler::new();
        second.ldstr(second_message).pop().ret();

        let by_int = MethodDefinition::new(ty.type_ref(), "Print")
            .with_parameters(vec![TypeRef::int32()])
            .with_body(first.finish().unwrap());
        let by_string = MethodDefinition::new(ty.type_ref(), "Print")
            .with_parameters(vec![TypeRef::string()])
            .with_body(second.finish().unwrap());

        CompiledUnit::new("Bank.dll").with_type(ty.with_method(by_int).with_method(by_string))
    }

    #[test]
    fn unit_against_itself() {
        let unit = account_unit("Bank.dll", 10);
        let diff = DiffEngine::default().compare(&unit, &unit);

        assert!(!diff.is_different());
        assert!(diff.unpaired.is_empty());
        assert_eq!(diff.changed_method_count(), 0);
    }

    #[test]
    fn withdraw_changed() {
        let old = account_unit("Bank.dll", 10);
        let new = account_unit("Bank.dll", 20);
        let diff = DiffEngine::default().compare(&old, &new);

        let account = diff.type_diff("Bank.Account").unwrap();
        assert_eq!(account.changed_method_names(), vec!["Withdraw"]);
    }

    #[test]
    fn overloads_pair_by_signature() {
        let old = overloaded("a", "b");
        let swapped = {
            let mut unit = overloaded("a", "b");
            unit.types[0].methods.reverse();
            unit
        };
        let changed = overloaded("a", "c");

        let engine = DiffEngine::default();
        assert!(!engine.compare(&old, &swapped).is_different());

        let diff = engine.compare(&old, &changed);
        let printer = diff.type_diff("Bank.Printer").unwrap();
        assert_eq!(printer.changed_methods.len(), 1);
        assert_eq!(printer.changed_methods[0].parameters, vec![TypeRef::string()]);
    }

    #[test]
    fn additions_are_unpaired_not_changed() {
        let old = account_unit("Bank.dll", 10);
        let mut new = account_unit("Bank.dll", 10);
        let ledger = TypeDefinition::new("Bank", "Ledger");
        let audit = MethodDefinition::new(new.types[0].type_ref(), "Audit");
        new.types[0].methods.push(audit);
        new.types.push(ledger);

        let diff = DiffEngine::default().compare(&old, &new);
        assert!(!diff.is_different());

        let mut names: Vec<String> = diff.unpaired.iter().map(Unpaired::full_name).collect();
        names.sort();
        assert_eq!(names, vec!["Bank.Account::Audit", "Bank.Ledger"]);
    }

    #[test]
    fn method_targets_skip_by_name() {
        let old = account_unit("Bank.dll", 10);
        let new = account_unit("Bank.dll", 20);
        let engine = DiffEngine::new(vec![IgnoreTarget::method(
            ForbidExpression::wildcard("With*").unwrap(),
        )]);

        assert!(!engine.compare(&old, &new).is_different());
    }

    #[test]
    fn malformed_pair_is_skipped_rest_compared() {
        let old = account_unit("Bank.dll", 10);
        let mut new = account_unit("Bank.dll", 20);
        new.types[0].methods[0].operations.reverse();

        let diff = DiffEngine::default().compare(&old, &new);

        assert_eq!(diff.skipped.len(), 1);
        assert_eq!(diff.skipped[0].method.name, "Deposit");
        assert!(diff.skipped[0].reason.contains("Bank.Account::Deposit"));
        let account = diff.type_diff("Bank.Account").unwrap();
        assert_eq!(account.changed_method_names(), vec!["Withdraw"]);
    }

    #[test]
    fn ignored_malformed_types_are_never_validated() {
        let mut unit = account_unit("Bank.dll", 10);
        unit.types[0].methods[0].operations.reverse();

        let engine = DiffEngine::new(vec![IgnoreTarget::ty(
            ForbidExpression::exact("Bank.Account").unwrap(),
        )]);
        let diff = engine.compare(&unit, &unit);

        assert!(!diff.is_different());
        assert!(diff.skipped.is_empty());
    }
}
