//! Offset keyed index over a method body.
//!
//! Operations do not have a uniform width, so the position of an operation in the body
//! and its offset diverge. [`OffsetIndex`] maps offsets to positions in O(1) and derives
//! the previous/next neighbour of an operation from the sorted order of the body, without
//! any linked structure between operations.

use rustc_hash::FxHashMap;

use crate::{assembly::Operation, Result};

/// Offset to operation index over a borrowed, offset ordered body.
///
/// # Examples
///
/// ```rust
/// use ildiff::assembly::{InstructionAssembler, OffsetIndex, OpKind};
///
/// let mut asm = InstructionAssembler::new();
/// asm.ldloc(0).pop().ret();
/// let body = asm.finish()?;
///
/// let index = OffsetIndex::new(&body)?;
/// let pop = index.get(1).unwrap();
/// assert_eq!(pop.kind, OpKind::Pop);
/// assert_eq!(index.predecessor(1).unwrap().kind, OpKind::LoadLocal);
/// assert_eq!(index.successor(1).unwrap().kind, OpKind::Return);
/// assert!(index.predecessor(0).is_none());
/// # Ok::<(), ildiff::Error>(())
/// ```
#[derive(Debug)]
pub struct OffsetIndex<'a> {
    operations: &'a [Operation],
    positions: FxHashMap<u32, usize>,
}

impl<'a> OffsetIndex<'a> {
    /// Build the index for `operations`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the offsets are not strictly increasing.
    pub fn new(operations: &'a [Operation]) -> Result<Self> {
        validate_offsets(operations)?;

        let mut positions = FxHashMap::default();
        positions.reserve(operations.len());
        for (position, operation) in operations.iter().enumerate() {
            positions.insert(operation.offset, position);
        }

        Ok(OffsetIndex {
            operations,
            positions,
        })
    }

    /// Number of indexed operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if the indexed body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the position in the body of the operation at `offset`.
    #[must_use]
    pub fn position(&self, offset: u32) -> Option<usize> {
        self.positions.get(&offset).copied()
    }

    /// Returns `true` if an operation starts at `offset`.
    #[must_use]
    pub fn contains(&self, offset: u32) -> bool {
        self.positions.contains_key(&offset)
    }

    /// Returns the operation at `offset`.
    #[must_use]
    pub fn get(&self, offset: u32) -> Option<&'a Operation> {
        self.position(offset).map(|position| &self.operations[position])
    }

    /// Returns the operation immediately preceding the one at `offset`.
    #[must_use]
    pub fn predecessor(&self, offset: u32) -> Option<&'a Operation> {
        let position = self.position(offset)?;
        position
            .checked_sub(1)
            .and_then(|previous| self.operations.get(previous))
    }

    /// Returns the operation immediately following the one at `offset`.
    #[must_use]
    pub fn successor(&self, offset: u32) -> Option<&'a Operation> {
        let position = self.position(offset)?;
        self.operations.get(position + 1)
    }

    /// Returns the indexed operations in offset order.
    #[must_use]
    pub fn operations(&self) -> &'a [Operation] {
        self.operations
    }
}

/// Check that the offsets of `operations` are strictly increasing.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] naming the first offending pair.
pub fn validate_offsets(operations: &[Operation]) -> Result<()> {
    for pair in operations.windows(2) {
        if pair[1].offset <= pair[0].offset {
            return Err(malformed_error!(
                "Operation offsets are not strictly increasing - IL_{:04X} followed by IL_{:04X}",
                pair[0].offset,
                pair[1].offset
            ));
        }
    }
    Ok(())
}
