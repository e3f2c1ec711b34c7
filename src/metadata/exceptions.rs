//! Exception region representation for method bodies.
//!
//! A region pairs a protected `try` range with its handler range. Unlike the ECMA-335
//! on-disk encoding (offset + length), both ranges are stored as **inclusive** offset
//! pairs: the operation starting at `try_end` is still inside the try block.
//!
//! # Layout
//!
//! ```text
//! IL_0000  newobj ...        <- try_start
//! ...
//! IL_0020  leave IL_0030     <- try_end (inclusive)
//! IL_0025  pop               <- handler_start
//! IL_002B  leave IL_0030     <- handler_end (inclusive)
//! IL_0030  ret
//! ```

use serde::{Deserialize, Serialize};

use crate::{assembly::TypeRef, Result};

/// The kind of handler attached to a protected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerKind {
    /// A typed exception clause (`catch`)
    Catch,
    /// An exception filter and handler clause
    Filter,
    /// A `finally` clause
    Finally,
    /// A `fault` clause (finally that only runs on exception)
    Fault,
}

/// A try block and its handler, as inclusive offset ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRegion {
    /// Offset of the first operation of the try block
    pub try_start: u32,
    /// Offset of the last operation of the try block (inclusive)
    pub try_end: u32,
    /// Offset of the first operation of the handler
    pub handler_start: u32,
    /// Offset of the last operation of the handler (inclusive)
    pub handler_end: u32,
    /// What kind of handler this is
    pub kind: HandlerKind,
    /// For [`HandlerKind::Catch`], the type that is caught
    #[serde(default)]
    pub catch_type: Option<TypeRef>,
}

impl ExceptionRegion {
    /// Create a `catch (System.Exception)` region.
    #[must_use]
    pub fn catch(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32) -> Self {
        ExceptionRegion {
            try_start,
            try_end,
            handler_start,
            handler_end,
            kind: HandlerKind::Catch,
            catch_type: Some(TypeRef::new("System", "Exception")),
        }
    }

    /// Create a `finally` region.
    #[must_use]
    pub fn finally(try_start: u32, try_end: u32, handler_start: u32, handler_end: u32) -> Self {
        ExceptionRegion {
            try_start,
            try_end,
            handler_start,
            handler_end,
            kind: HandlerKind::Finally,
            catch_type: None,
        }
    }

    /// Returns `true` if `offset` lies within the try block, bounds included.
    #[must_use]
    pub fn in_try(&self, offset: u32) -> bool {
        (self.try_start..=self.try_end).contains(&offset)
    }

    /// Returns `true` if `offset` lies within the handler, bounds included.
    #[must_use]
    pub fn in_handler(&self, offset: u32) -> bool {
        (self.handler_start..=self.handler_end).contains(&offset)
    }

    /// Returns the four bounds in declaration order.
    #[must_use]
    pub fn bounds(&self) -> [u32; 4] {
        [
            self.try_start,
            self.try_end,
            self.handler_start,
            self.handler_end,
        ]
    }

    /// Check that both ranges are ordered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a range ends before it starts.
    pub fn validate(&self) -> Result<()> {
        if self.try_end < self.try_start {
            return Err(malformed_error!(
                "Try block ends before it starts - IL_{:04X}..IL_{:04X}",
                self.try_start,
                self.try_end
            ));
        }
        if self.handler_end < self.handler_start {
            return Err(malformed_error!(
                "Handler ends before it starts - IL_{:04X}..IL_{:04X}",
                self.handler_start,
                self.handler_end
            ));
        }
        Ok(())
    }
}
