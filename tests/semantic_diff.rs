//! Integration tests for the semantic difference engine.
//!
//! Units are built the way a loader would hand them over: types with methods whose bodies
//! are decoded operation streams.

use std::io::Write;

use ildiff::{prelude::*, Result};

/// Account type with `Deposit` and `Withdraw`; `Withdraw` embeds `limit`, `Deposit` embeds
/// `padding` bytes of layout slack that does not change its instructions.
fn bank(limit: i32, padding: u32) -> Result<CompiledUnit> {
    let account = TypeDefinition::new("Bank", "Account");
    let audit = TypeDefinition::new("Bank.Internal", "Audit");
    let amount = vec![TypeRef::int32()];

    let mut deposit = InstructionAssembler::new();
    deposit
        .other(0x02, Operand::None)
        .pad(padding)
        .other(0x03, Operand::None)
        .other(0x58, Operand::None)
        .pop()
        .ret();

    let mut withdraw = InstructionAssembler::new();
    withdraw
        .other(0x03, Operand::None)
        .ldc_i4(limit)
        .other(0xFE02, Operand::None)
        .pop()
        .ret();

    let mut log = InstructionAssembler::new();
    log.ldstr(&format!("limit={limit}")).pop().ret();

    Ok(CompiledUnit::new("Bank.dll")
        .with_type(
            account
                .clone()
                .with_method(
                    MethodDefinition::new(account.type_ref(), "Deposit")
                        .with_parameters(amount.clone())
                        .with_body(deposit.finish()?),
                )
                .with_method(
                    MethodDefinition::new(account.type_ref(), "Withdraw")
                        .with_parameters(amount)
                        .with_body(withdraw.finish()?),
                ),
        )
        .with_type(audit.clone().with_method(
            MethodDefinition::new(audit.type_ref(), "Log").with_body(log.finish()?),
        )))
}

fn ignore_configs() -> Result<Vec<Vec<IgnoreTarget>>> {
    Ok(vec![
        Vec::new(),
        vec![IgnoreTarget::ty(ForbidExpression::wildcard("Bank.*")?)],
        vec![IgnoreTarget::method(ForbidExpression::regex("^With")?)],
        vec![
            IgnoreTarget::ty(ForbidExpression::exact("Bank.Account")?),
            IgnoreTarget::method(ForbidExpression::exact("Log")?),
        ],
    ])
}

#[test]
fn test_reflexivity_under_every_configuration() -> Result<()> {
    let unit = bank(100, 0)?;

    for targets in ignore_configs()? {
        let diff = DiffEngine::new(targets).compare(&unit, &unit);
        assert!(!diff.is_different());
        assert_eq!(diff.changed_method_count(), 0);
    }
    Ok(())
}

#[test]
fn test_withdraw_changed_deposit_identical() -> Result<()> {
    let old = bank(100, 0)?;
    let new = bank(500, 0)?;

    let diff = DiffEngine::default().compare(&old, &new);
    let account = diff
        .type_diff("Bank.Account")
        .expect("Bank.Account must be reported");

    assert_eq!(account.changed_method_names(), vec!["Withdraw"]);
    assert!(std::ptr::eq(account.new, &new.types[0]));
    assert!(std::ptr::eq(diff.new, &new));
    Ok(())
}

#[test]
fn test_type_targets_hide_every_method() -> Result<()> {
    let old = bank(100, 0)?;
    let new = bank(500, 0)?;

    for pattern in [
        ForbidExpression::exact("Bank.Account")?,
        ForbidExpression::wildcard("Bank.Acc*")?,
        ForbidExpression::regex("Account$")?,
    ] {
        let diff = DiffEngine::new(vec![IgnoreTarget::ty(pattern)]).compare(&old, &new);
        assert!(diff.type_diff("Bank.Account").is_none());
        assert!(diff
            .type_diffs
            .iter()
            .flat_map(|ty| ty.changed_methods.iter())
            .all(|method| method.declaring_type.name != "Account"));
    }
    Ok(())
}

#[test]
fn test_operand_change_is_detected() -> Result<()> {
    let old = bank(100, 0)?;
    let new = bank(100, 0)?;
    let mut changed = bank(100, 0)?;

    if let Some(Operation {
        operand: Operand::String(message),
        ..
    }) = changed.types[1].methods[0].operations.first_mut()
    {
        *message = "limit=?".to_string();
    }

    let engine = DiffEngine::default();
    assert!(!engine.compare(&old, &new).is_different());

    let diff = engine.compare(&old, &changed);
    assert_eq!(diff.changed_types(), vec!["Bank.Internal.Audit".to_string()]);
    Ok(())
}

#[test]
fn test_padding_shift_is_ignored() -> Result<()> {
    let old = bank(100, 0)?;
    let new = bank(100, 12)?;

    assert_ne!(
        old.types[0].methods[0].code_size(),
        new.types[0].methods[0].code_size()
    );
    assert!(!DiffEngine::default().compare(&old, &new).is_different());
    Ok(())
}

#[test]
fn test_ignore_config_from_file_drives_the_engine() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(
        br#"{
            "forbidden_types": [],
            "forbidden_members": [ { "pattern": "Withdraw", "kind": "ExactString" } ],
            "forbidden_fields": []
        }"#,
    )?;

    let config = IgnoreConfig::from_file(file.path())?;
    let engine = DiffEngine::from_config(&config);

    let old = bank(100, 0)?;
    let new = bank(500, 0)?;

    let diff = engine.compare(&old, &new);
    assert!(diff.type_diff("Bank.Account").is_none());
    assert!(diff.type_diff("Bank.Internal.Audit").is_some());
    Ok(())
}

#[test]
fn test_units_loaded_from_json() -> Result<()> {
    let old = CompiledUnit::from_json(&bank(100, 0)?.to_json()?)?;
    let new = CompiledUnit::from_json(&bank(500, 0)?.to_json()?)?;

    let diff = DiffEngine::default().compare(&old, &new);
    assert_eq!(diff.changed_method_count(), 2);
    Ok(())
}

#[test]
fn test_malformed_method_does_not_hide_other_changes() -> Result<()> {
    let old = bank(100, 0)?;
    let mut new = bank(500, 0)?;
    new.types[0].methods[0].operations.swap(0, 1);

    let diff = DiffEngine::default().compare(&old, &new);

    let skipped: Vec<String> = diff
        .skipped
        .iter()
        .map(|item| item.method.full_name())
        .collect();
    assert_eq!(skipped, vec!["Bank.Account::Deposit"]);
    assert_eq!(
        diff.type_diff("Bank.Account")
            .expect("Withdraw still compared")
            .changed_method_names(),
        vec!["Withdraw"]
    );
    assert!(diff.type_diff("Bank.Internal.Audit").is_some());
    Ok(())
}
