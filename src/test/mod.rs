//! Factories for the units and bodies shared by the unit tests.

use crate::{
    assembly::{FieldRef, InstructionAssembler, MethodRef, Operand, Operation, TypeRef},
    metadata::{CompiledUnit, ExceptionRegion, FieldDefinition, MethodDefinition, TypeDefinition},
};

const LDARG_0: u16 = 0x02;
const LDARG_1: u16 = 0x03;
const ADD: u16 = 0x58;
const SUB: u16 = 0x59;
const LDFLD: u16 = 0x7B;
const STFLD: u16 = 0x7D;
const CGT: u16 = 0xFE02;

fn balance_field() -> FieldRef {
    FieldRef {
        declaring_type: TypeRef::new("Bank", "Account"),
        name: "balance".to_string(),
        field_type: TypeRef::int32(),
    }
}

/// `Bank.Account` with `Deposit` at `methods[0]` and `Withdraw` at `methods[1]`.
///
/// Only `Withdraw` depends on `limit`, so two units built with different limits differ in
/// exactly that method.
pub fn account_unit(name: &str, limit: i32) -> CompiledUnit {
    let account = TypeDefinition::new("Bank", "Account")
        .with_field(FieldDefinition::new("balance", TypeRef::int32()));
    let amount = vec![TypeRef::int32()];

    let mut deposit = InstructionAssembler::new();
    deposit
        .other(LDARG_0, Operand::None)
        .other(LDARG_0, Operand::None)
        .other(LDFLD, Operand::Field(balance_field()))
        .other(LDARG_1, Operand::None)
        .other(ADD, Operand::None)
        .other(STFLD, Operand::Field(balance_field()))
        .ret();

    let mut withdraw = InstructionAssembler::new();
    withdraw
        .other(LDARG_1, Operand::None)
        .ldc_i4(limit)
        .other(CGT, Operand::None)
        .pop()
        .other(LDARG_0, Operand::None)
        .other(LDARG_0, Operand::None)
        .other(LDFLD, Operand::Field(balance_field()))
        .other(LDARG_1, Operand::None)
        .other(SUB, Operand::None)
        .other(STFLD, Operand::Field(balance_field()))
        .ret();

    let deposit = MethodDefinition::new(account.type_ref(), "Deposit")
        .with_parameters(amount.clone())
        .with_body(deposit.finish().unwrap());
    let withdraw = MethodDefinition::new(account.type_ref(), "Withdraw")
        .with_parameters(amount)
        .with_body(withdraw.finish().unwrap());

    CompiledUnit::new(name).with_type(account.with_method(deposit).with_method(withdraw))
}

/// `Tests.SubjectTests::Run`:
///
/// ```text
/// newobj Subject::.ctor; stloc 0; ldloc 0; callvirt Subject::Foo(); pop; ret
/// ```
///
/// with one catch region whose try block spans the whole body. `Foo` returns `result`.
pub fn scenario_method(result: TypeRef) -> MethodDefinition {
    let subject = TypeRef::new("Tests", "Subject");
    let foo = MethodRef::instance(subject.clone(), "Foo").returning(result);

    let mut asm = InstructionAssembler::new();
    asm.newobj(MethodRef::constructor(subject.clone()))
        .stloc(0)
        .ldloc(0)
        .callvirt(foo)
        .pop()
        .ret();
    let operations = asm.finish().unwrap();
    let last = operations[operations.len() - 1].offset;

    MethodDefinition::new(TypeRef::new("Tests", "SubjectTests"), "Run")
        .with_local("subject", subject)
        .with_max_stack(1)
        .with_body(operations)
        .with_region(ExceptionRegion::catch(0, last, last, last))
}

/// The mnemonics of `operations`, in order.
pub fn mnemonics(operations: &[Operation]) -> Vec<String> {
    operations
        .iter()
        .map(|operation| operation.kind.mnemonic())
        .collect()
}
