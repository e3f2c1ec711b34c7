//! Emit sink of the rewriter.
//!
//! The emitter lays out the rewritten body. Every original operation opens a *group*; the
//! group spans the instrumentation emitted in front of the operation after the group was
//! opened, the operation itself, and whatever is emitted before the next group opens.
//! Groups are what exception regions and branch targets are remapped onto:
//!
//! - region starts and branch targets move to the first operation of their group
//! - inclusive region ends move to the last operation of their group

use rustc_hash::FxHashMap;

use crate::{
    assembly::{InstructionAssembler, MethodRef, OffsetIndex, Operation, TypeRef},
    metadata::ExceptionRegion,
    Result,
};

const END_LABEL: &str = "end";

fn group_label(offset: u32) -> String {
    format!("IL_{offset:04X}")
}

#[derive(Debug, Clone, Copy)]
struct Group {
    start: u32,
    end: u32,
}

/// Collects the rewritten body.
#[derive(Debug, Default)]
pub(crate) struct BodyEmitter {
    assembler: InstructionAssembler,
    groups: FxHashMap<u32, Group>,
    open: Option<u32>,
}

impl BodyEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the group of the original operation at `offset`, closing the previous one.
    pub fn open_group(&mut self, offset: u32) -> Result<()> {
        self.close_group();

        let start = self.assembler.position();
        self.groups.insert(offset, Group { start, end: start });
        self.assembler.label(&group_label(offset))?;
        self.open = Some(offset);
        Ok(())
    }

    fn close_group(&mut self) {
        let Some(offset) = self.open.take() else {
            return;
        };
        if let (Some(group), Some(last)) = (self.groups.get_mut(&offset), self.assembler.last_offset())
        {
            group.end = last;
        }
    }

    /// Emit an original operation. Every target operand, whatever the kind carrying it, is
    /// resolved against the groups once the body is complete.
    pub fn original(&mut self, operation: &Operation, index: &OffsetIndex<'_>, code_end: u32) {
        let Some(target) = operation.target() else {
            self.assembler.emit_operation(operation);
            return;
        };

        let label = if index.contains(target) {
            group_label(target)
        } else if target == code_end {
            END_LABEL.to_string()
        } else {
            log::warn!(
                "IL_{:04X}: {} targets IL_{:04X}, which is no operation; target kept",
                operation.offset,
                operation.kind,
                target
            );
            self.assembler.emit_operation(operation);
            return;
        };

        self.assembler.emit_to_label(operation.kind, &label);
    }

    pub fn call(&mut self, method: &MethodRef) {
        self.assembler.call(method.clone());
    }

    pub fn ldloc(&mut self, index: u16) {
        self.assembler.ldloc(index);
    }

    pub fn stloc(&mut self, index: u16) {
        self.assembler.stloc(index);
    }

    pub fn ldstr(&mut self, value: &str) {
        self.assembler.ldstr(value);
    }

    pub fn box_value(&mut self, ty: &TypeRef) {
        self.assembler.box_value(ty.clone());
    }

    /// Number of operations emitted so far.
    pub fn len(&self) -> usize {
        self.assembler.len()
    }

    /// Complete the body and remap `regions` onto it.
    pub fn finish(
        mut self,
        regions: &[ExceptionRegion],
    ) -> Result<(Vec<Operation>, Vec<ExceptionRegion>)> {
        self.close_group();
        self.assembler.label(END_LABEL)?;

        let remapped = regions
            .iter()
            .map(|region| {
                let start = |offset: u32| self.groups.get(&offset).map_or(offset, |g| g.start);
                let end = |offset: u32| self.groups.get(&offset).map_or(offset, |g| g.end);

                ExceptionRegion {
                    try_start: start(region.try_start),
                    try_end: end(region.try_end),
                    handler_start: start(region.handler_start),
                    handler_end: end(region.handler_end),
                    kind: region.kind,
                    catch_type: region.catch_type.clone(),
                }
            })
            .collect();

        Ok((self.assembler.finish()?, remapped))
    }
}
