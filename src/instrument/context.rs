//! Per-method state of a rewrite.

use rustc_hash::FxHashSet;

use crate::{
    assembly::{OffsetIndex, Operation, TypeRef},
    metadata::{ExceptionRegion, LocalVariable, MethodDefinition},
    Result,
};

/// State of one method rewrite.
///
/// A context lives exactly as long as one rewrite and is never shared: the offset index
/// borrows the input body, the locals are a private working copy.
#[derive(Debug)]
pub(crate) struct RewriteContext<'a> {
    /// Offset lookup over the original body
    pub index: OffsetIndex<'a>,
    /// The single try/handler region of the method
    pub region: &'a ExceptionRegion,
    /// Local believed to hold the object under test
    pub target: Option<u16>,
    /// Declared locals plus the temporaries added so far
    pub locals: Vec<LocalVariable>,
    names: FxHashSet<String>,
    prefix: &'a str,
    counter: u32,
}

impl<'a> RewriteContext<'a> {
    pub fn new(
        method: &'a MethodDefinition,
        region: &'a ExceptionRegion,
        prefix: &'a str,
    ) -> Result<Self> {
        let index = OffsetIndex::new(&method.operations)?;
        let names = method.locals.iter().map(|local| local.name.clone()).collect();

        Ok(RewriteContext {
            index,
            region,
            target: None,
            locals: method.locals.clone(),
            names,
            prefix,
            counter: 0,
        })
    }

    /// Returns `true` if `operation` lies inside the try block.
    pub fn in_try(&self, operation: &Operation) -> bool {
        self.region.in_try(operation.offset)
    }

    /// The operation preceding `operation` by offset.
    pub fn predecessor(&self, operation: &Operation) -> Option<&'a Operation> {
        self.index.predecessor(operation.offset)
    }

    /// Declare a temporary of type `ty` with a name no other local uses.
    ///
    /// Returns `None` once every local slot is taken.
    pub fn fresh_local(&mut self, ty: TypeRef) -> Option<u16> {
        let index = u16::try_from(self.locals.len()).ok()?;
        let name = loop {
            let candidate = format!("{}_{}", self.prefix, self.counter);
            self.counter += 1;
            if !self.names.contains(&candidate) {
                break candidate;
            }
        };

        self.names.insert(name.clone());
        self.locals.push(LocalVariable { index, name, ty });
        Some(index)
    }
}
