//! Fluent construction of offset ordered method bodies.
//!
//! [`InstructionAssembler`] appends [`Operation`]s and assigns each one its offset from
//! the running position, using [`Operation::encoded_size`] as the width. Branches can
//! target an absolute offset or a named label that is resolved in [`InstructionAssembler::finish`].
//!
//! The assembler is used by external collaborators and tests to produce bodies, and by
//! the instrumentation rewriter to lay out the rewritten body.
//!
//! # Examples
//!
//! ```rust
//! use ildiff::assembly::{InstructionAssembler, MethodRef, OpKind, TypeRef};
//!
//! let account = TypeRef::new("Bank", "Account");
//!
//! let mut asm = InstructionAssembler::new();
//! asm.newobj(MethodRef::constructor(account.clone()))
//!     .stloc(0)
//!     .ldloc(0)
//!     .callvirt(MethodRef::instance(account, "Close"))
//!     .leave_label("end")
//!     .label("end")?
//!     .ret();
//!
//! let body = asm.finish()?;
//! assert_eq!(body.len(), 6);
//! assert_eq!(body[4].kind, OpKind::Leave);
//! assert_eq!(body[4].target(), Some(body[5].offset));
//! # Ok::<(), ildiff::Error>(())
//! ```

use rustc_hash::FxHashMap;

use crate::{
    assembly::{Immediate, MethodRef, OpKind, Operand, Operation, TypeRef},
    Error, Result,
};

/// Long-form opcode of the unconditional `br`.
pub const BR: u16 = 0x38;

/// A branch awaiting resolution of its label.
#[derive(Debug, Clone)]
struct LabelFixup {
    /// Index of the branch operation in the output
    operation: usize,
    /// Name of the targeted label
    label: String,
}

/// Builder for offset ordered operation sequences.
#[derive(Debug, Default)]
pub struct InstructionAssembler {
    /// Emitted operations
    operations: Vec<Operation>,
    /// Offset the next operation will be placed at
    position: u32,
    /// Defined label positions (label_name -> offset)
    labels: FxHashMap<String, u32>,
    /// Pending branch fixups awaiting label resolution
    fixups: Vec<LabelFixup>,
}

impl InstructionAssembler {
    /// Create a new, empty assembler starting at offset 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation of `kind` with `operand` at the current position.
    pub fn emit(&mut self, kind: OpKind, operand: Operand) -> &mut Self {
        let operation = Operation::new(self.position, kind, operand);
        self.position = self.position.saturating_add(operation.encoded_size());
        self.operations.push(operation);
        self
    }

    /// Re-emit a previously decoded operation at the current position.
    ///
    /// Returns the offset the operation was placed at.
    pub fn emit_operation(&mut self, operation: &Operation) -> u32 {
        let offset = self.position;
        self.emit(operation.kind, operation.operand.clone());
        offset
    }

    /// Advance the position by `bytes` without emitting anything, as alignment padding
    /// between operations does.
    pub fn pad(&mut self, bytes: u32) -> &mut Self {
        self.position = self.position.saturating_add(bytes);
        self
    }

    /// Emit `call method`.
    pub fn call(&mut self, method: MethodRef) -> &mut Self {
        self.emit(OpKind::Call, Operand::Method(method))
    }

    /// Emit `callvirt method`.
    pub fn callvirt(&mut self, method: MethodRef) -> &mut Self {
        self.emit(OpKind::CallVirt, Operand::Method(method))
    }

    /// Emit `newobj ctor`.
    pub fn newobj(&mut self, ctor: MethodRef) -> &mut Self {
        self.emit(OpKind::NewObj, Operand::Method(ctor))
    }

    /// Emit a load of local `index`.
    pub fn ldloc(&mut self, index: u16) -> &mut Self {
        self.emit(OpKind::LoadLocal, Operand::Local(index))
    }

    /// Emit a store to local `index`.
    pub fn stloc(&mut self, index: u16) -> &mut Self {
        self.emit(OpKind::StoreLocal, Operand::Local(index))
    }

    /// Emit `pop`.
    pub fn pop(&mut self) -> &mut Self {
        self.emit(OpKind::Pop, Operand::None)
    }

    /// Emit `ret`.
    pub fn ret(&mut self) -> &mut Self {
        self.emit(OpKind::Return, Operand::None)
    }

    /// Emit `ldstr value`.
    pub fn ldstr(&mut self, value: &str) -> &mut Self {
        self.emit(OpKind::LoadString, Operand::String(value.to_string()))
    }

    /// Emit `box ty`.
    pub fn box_value(&mut self, ty: TypeRef) -> &mut Self {
        self.emit(OpKind::Box, Operand::Type(ty))
    }

    /// Emit `nop`.
    pub fn nop(&mut self) -> &mut Self {
        self.emit(OpKind::Other(0x00), Operand::None)
    }

    /// Emit `ldc.i4 value`.
    pub fn ldc_i4(&mut self, value: i32) -> &mut Self {
        self.emit(
            OpKind::Other(0x20),
            Operand::Immediate(Immediate::Int(i64::from(value))),
        )
    }

    /// Emit an opaque operation with raw `opcode`.
    pub fn other(&mut self, opcode: u16, operand: Operand) -> &mut Self {
        self.emit(OpKind::Other(opcode), operand)
    }

    /// Emit `leave` to the absolute offset `target`.
    pub fn leave(&mut self, target: u32) -> &mut Self {
        self.emit(OpKind::Leave, Operand::Target(target))
    }

    /// Emit `br` to the absolute offset `target`.
    pub fn br(&mut self, target: u32) -> &mut Self {
        self.branch(BR, target)
    }

    /// Emit the branch with long-form `opcode` to the absolute offset `target`.
    pub fn branch(&mut self, opcode: u16, target: u32) -> &mut Self {
        self.emit(OpKind::Branch(opcode), Operand::Target(target))
    }

    /// Emit `leave` to `label`, resolved in [`InstructionAssembler::finish`].
    pub fn leave_label(&mut self, label: &str) -> &mut Self {
        self.emit_to_label(OpKind::Leave, label)
    }

    /// Emit `br` to `label`, resolved in [`InstructionAssembler::finish`].
    pub fn br_label(&mut self, label: &str) -> &mut Self {
        self.branch_label(BR, label)
    }

    /// Emit the branch with long-form `opcode` to `label`.
    pub fn branch_label(&mut self, opcode: u16, label: &str) -> &mut Self {
        self.emit_to_label(OpKind::Branch(opcode), label)
    }

    /// Emit an operation of `kind` whose target operand is `label`, resolved in
    /// [`InstructionAssembler::finish`].
    pub fn emit_to_label(&mut self, kind: OpKind, label: &str) -> &mut Self {
        self.fixups.push(LabelFixup {
            operation: self.operations.len(),
            label: label.to_string(),
        });
        self.emit(kind, Operand::Target(0))
    }

    /// Define `label` at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DuplicateLabel`] if the label was already defined.
    pub fn label(&mut self, label: &str) -> Result<&mut Self> {
        if self.labels.contains_key(label) {
            return Err(Error::DuplicateLabel(label.to_string()));
        }

        self.labels.insert(label.to_string(), self.position);
        Ok(self)
    }

    /// Offset the next operation will be placed at.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Offset of the most recently emitted operation.
    #[must_use]
    pub fn last_offset(&self) -> Option<u32> {
        self.operations.last().map(|operation| operation.offset)
    }

    /// Number of emitted operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if nothing was emitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Resolve pending labels and return the emitted operations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UndefinedLabel`] if a branch targets a label that was
    /// never defined.
    pub fn finish(mut self) -> Result<Vec<Operation>> {
        for fixup in &self.fixups {
            let target = self
                .labels
                .get(&fixup.label)
                .copied()
                .ok_or_else(|| Error::UndefinedLabel(fixup.label.clone()))?;
            self.operations[fixup.operation].operand = Operand::Target(target);
        }

        Ok(self.operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_encoded_sizes() {
        let ty = TypeRef::new("Bank", "Account");
        let mut asm = InstructionAssembler::new();
        asm.newobj(MethodRef::constructor(ty))
            .stloc(0)
            .ldloc(5)
            .ldstr("x")
            .pop()
            .ret();

        let body = asm.finish().unwrap();
        let offsets: Vec<u32> = body.iter().map(|op| op.offset).collect();
        assert_eq!(offsets, vec![0, 5, 6, 8, 13, 14]);
    }

    #[test]
    fn padding_shifts_offsets() {
        let mut asm = InstructionAssembler::new();
        asm.nop().pad(3).ret();

        let body = asm.finish().unwrap();
        assert_eq!(body[1].offset, 4);
    }

    #[test]
    fn backward_and_forward_labels() {
        let mut asm = InstructionAssembler::new();
        asm.label("top").unwrap();
        asm.nop().br_label("bottom").br_label("top");
        asm.label("bottom").unwrap();
        asm.ret();

        let body = asm.finish().unwrap();
        assert_eq!(body[1].target(), Some(11));
        assert_eq!(body[2].target(), Some(0));
    }

    #[test]
    fn conditional_branch_to_label() {
        let mut asm = InstructionAssembler::new();
        asm.ldc_i4(0).branch_label(0x39, "exit").pop();
        asm.label("exit").unwrap().ret();

        let body = asm.finish().unwrap();
        assert_eq!(body[1].kind, OpKind::Branch(0x39));
        assert_eq!(body[1].target(), Some(body[3].offset));
    }

    #[test]
    fn undefined_label() {
        let mut asm = InstructionAssembler::new();
        asm.leave_label("nowhere");
        assert!(matches!(asm.finish(), Err(Error::UndefinedLabel(name)) if name == "nowhere"));
    }

    #[test]
    fn duplicate_label() {
        let mut asm = InstructionAssembler::new();
        asm.label("a").unwrap();
        assert!(matches!(asm.label("a"), Err(Error::DuplicateLabel(_))));
    }
}
