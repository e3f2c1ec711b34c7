//! Structural comparison of two method bodies.
//!
//! Offsets never take part in the comparison. Two bodies are equal if they hold the same
//! number of operations and every pair of operations at the same position carries the
//! same kind and operand. Branch and leave targets are offsets too, so they are compared by
//! the position of the operation they point at; a body that only moved because of padding
//! therefore stays equal.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::assembly::{Operand, Operation};

/// Where a branch target points, independent of the body layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKey {
    /// The operation at this position
    Position(usize),
    /// One past the last operation
    End,
    /// Neither an operation nor the end of the body
    Raw(u32),
}

struct TargetResolver {
    positions: FxHashMap<u32, usize>,
    code_end: Option<u32>,
}

impl TargetResolver {
    fn new(operations: &[Operation]) -> Self {
        let positions = operations
            .iter()
            .enumerate()
            .map(|(position, operation)| (operation.offset, position))
            .collect();
        let code_end = operations
            .last()
            .map_or(Some(0), Operation::end_offset);

        TargetResolver {
            positions,
            code_end,
        }
    }

    fn resolve(&self, target: u32) -> TargetKey {
        match self.positions.get(&target) {
            Some(position) => TargetKey::Position(*position),
            None if Some(target) == self.code_end => TargetKey::End,
            None => TargetKey::Raw(target),
        }
    }
}

/// The outcome of comparing two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyComparison {
    /// Same operations in the same order
    Identical,
    /// The bodies hold a different number of operations
    CountChanged {
        /// Operations in the old body
        old: usize,
        /// Operations in the new body
        new: usize,
    },
    /// The first position at which the operations differ
    OperationChanged {
        /// Zero-based position in both bodies
        position: usize,
    },
}

impl BodyComparison {
    /// Returns `true` unless the bodies are identical.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        !matches!(self, BodyComparison::Identical)
    }
}

impl fmt::Display for BodyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyComparison::Identical => write!(f, "identical"),
            BodyComparison::CountChanged { old, new } => {
                write!(f, "operation count {old} -> {new}")
            }
            BodyComparison::OperationChanged { position } => {
                write!(f, "operation #{position} differs")
            }
        }
    }
}

/// Compare two bodies, see the module documentation for the equality rules.
///
/// # Examples
///
/// ```rust
/// use ildiff::assembly::InstructionAssembler;
/// use ildiff::diff::{compare_bodies, BodyComparison};
///
/// let mut old = InstructionAssembler::new();
/// old.ldstr("a").pop().ret();
///
/// let mut new = InstructionAssembler::new();
/// new.nop().ldstr("a").pop().ret();
///
/// let old = old.finish()?;
/// let new = new.finish()?;
/// assert_eq!(
///     compare_bodies(&old, &new),
///     BodyComparison::CountChanged { old: 3, new: 4 }
/// );
/// # Ok::<(), ildiff::Error>(())
/// ```
#[must_use]
pub fn compare_bodies(old: &[Operation], new: &[Operation]) -> BodyComparison {
    if old.len() != new.len() {
        return BodyComparison::CountChanged {
            old: old.len(),
            new: new.len(),
        };
    }

    let old_targets = TargetResolver::new(old);
    let new_targets = TargetResolver::new(new);

    for (position, (left, right)) in old.iter().zip(new).enumerate() {
        let same = match (&left.operand, &right.operand) {
            (Operand::Target(a), Operand::Target(b)) => {
                left.kind == right.kind && old_targets.resolve(*a) == new_targets.resolve(*b)
            }
            _ => left.same_instruction(right),
        };

        if !same {
            return BodyComparison::OperationChanged { position };
        }
    }

    BodyComparison::Identical
}
