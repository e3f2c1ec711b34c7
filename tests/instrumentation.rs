//! Integration tests for the instrumentation rewriter.
//!
//! The bodies follow the shape the test generator emits: construct the object under test,
//! store it, then call methods on it inside a single try block.

use std::io::Write;

use ildiff::{prelude::*, Result};

fn cart() -> TypeRef {
    TypeRef::new("Shop", "Cart")
}

fn is_api_call(api: &RecordingApi, operation: &Operation) -> bool {
    operation.kind == OpKind::Call
        && operation
            .method()
            .is_some_and(|method| api.is_entry_point(method))
}

fn api_calls<'a>(api: &RecordingApi, operations: &'a [Operation]) -> Vec<&'a MethodRef> {
    operations
        .iter()
        .filter(|operation| is_api_call(api, operation))
        .filter_map(Operation::method)
        .collect()
}

/// A test constructing a cart and calling `calls` on it, every call with one `int32`
/// argument and its result discarded when `returns_value`.
fn cart_test(calls: &[&str], returns_value: bool) -> Result<MethodDefinition> {
    let mut asm = InstructionAssembler::new();
    asm.newobj(MethodRef::constructor(cart())).stloc(0);

    for (argument, name) in (1..).zip(calls) {
        let mut callee = MethodRef::instance(cart(), name).with_parameters(vec![TypeRef::int32()]);
        if returns_value {
            callee = callee.returning(TypeRef::int32());
        }
        asm.ldloc(0).ldc_i4(argument).callvirt(callee);
        if returns_value {
            asm.pop();
        }
    }
    asm.ret();

    let body = asm.finish()?;
    let last = body[body.len() - 1].offset;

    Ok(MethodDefinition::new(TypeRef::new("Shop", "CartTests"), "Run")
        .with_local("cart", cart())
        .with_max_stack(2)
        .with_body(body)
        .with_region(ExceptionRegion::catch(0, last, last, last)))
}

#[test]
fn test_ineligible_bodies_pass_through() -> Result<()> {
    let instrumenter = Instrumenter::new(InstrumentConfig::default())?;
    let shaped = cart_test(&["Add"], false)?;

    let mut bare = shaped.clone();
    bare.exception_regions.clear();

    let mut doubled = shaped.clone();
    doubled
        .exception_regions
        .push(shaped.exception_regions[0].clone());

    for (method, expected) in [
        (bare, PassThroughReason::NoExceptionRegion),
        (doubled, PassThroughReason::MultipleExceptionRegions(2)),
    ] {
        match instrumenter.instrument(&method)? {
            Rewrite::PassThrough {
                method: result,
                reason,
            } => {
                assert_eq!(reason, expected);
                assert_eq!(result, method);
            }
            Rewrite::Instrumented { .. } => panic!("{expected} must not be instrumented"),
        }
    }
    Ok(())
}

#[test]
fn test_injected_calls_and_original_order() -> Result<()> {
    let config = InstrumentConfig::default();
    let instrumenter = Instrumenter::new(config.clone())?;

    for returns_value in [false, true] {
        let calls = ["Add", "Remove", "Add", "Checkout"];
        let method = cart_test(&calls, returns_value)?;

        let rewrite = instrumenter.instrument(&method)?;
        let stats = rewrite.stats().expect("eligible body").clone();
        let injected = api_calls(&config.api, &rewrite.method().operations);

        assert_eq!(injected.len(), 1 + 1 + calls.len() + 1);
        assert_eq!(stats.injected_calls(), injected.len());
        assert_eq!(injected[0], &config.api.start_test);
        assert_eq!(injected[injected.len() - 1], &config.api.end_test);

        let originals: Vec<&Operation> = if returns_value {
            // Popped results are consumed by a temporary store instead of the pop.
            method
                .operations
                .iter()
                .filter(|operation| operation.kind != OpKind::Pop)
                .collect()
        } else {
            method.operations.iter().collect()
        };
        let mut remaining = rewrite.method().operations.iter();
        for original in originals {
            assert!(
                remaining.any(|emitted| emitted.same_instruction(original)),
                "{original} missing or out of order"
            );
        }
    }
    Ok(())
}

#[test]
fn test_value_call_scenario() -> Result<()> {
    let subject = TypeRef::new("Tests", "Subject");
    let foo = MethodRef::instance(subject.clone(), "Foo").returning(TypeRef::int32());

    let mut asm = InstructionAssembler::new();
    asm.newobj(MethodRef::constructor(subject.clone()))
        .stloc(0)
        .ldloc(0)
        .callvirt(foo)
        .pop()
        .ret();
    let body = asm.finish()?;
    let last = body[body.len() - 1].offset;
    let method = MethodDefinition::new(TypeRef::new("Tests", "SubjectTests"), "Run")
        .with_local("subject", subject)
        .with_max_stack(1)
        .with_body(body)
        .with_region(ExceptionRegion::catch(0, last, last, last));

    let rewrite = Instrumenter::new(InstrumentConfig::default())?.instrument(&method)?;
    let rewritten = rewrite.method();

    let mnemonics: Vec<String> = rewritten
        .operations
        .iter()
        .map(|operation| operation.kind.mnemonic())
        .collect();
    assert_eq!(
        mnemonics,
        vec![
            "ldstr", "call", "newobj", "stloc", "ldloc", "ldstr", "call", "ldloc", "callvirt",
            "stloc", "ldloc", "ldloc", "box", "ldstr", "call", "call", "ret",
        ]
    );

    let temporary = rewritten.operations[9].local().expect("temporary store");
    assert_eq!(rewritten.locals[usize::from(temporary)].name, "__result_0");
    assert_eq!(rewritten.operations[10].local(), Some(0));
    assert_eq!(rewritten.operations[11].local(), Some(temporary));
    assert_eq!(rewritten.operations[5].operand, Operand::String(".ctor".to_string()));
    assert_eq!(rewritten.max_stack, 3);
    Ok(())
}

#[test]
fn test_regions_and_leave_targets_are_remapped() -> Result<()> {
    let clear = MethodRef::instance(cart(), "Clear");

    let mut asm = InstructionAssembler::new();
    asm.newobj(MethodRef::constructor(cart()))
        .stloc(0)
        .ldloc(0)
        .callvirt(clear)
        .leave_label("exit");
    asm.pop().leave_label("exit");
    asm.label("exit")?.ret();
    let body = asm.finish()?;

    let region =
        ExceptionRegion::catch(body[0].offset, body[4].offset, body[5].offset, body[6].offset);
    let method = MethodDefinition::new(TypeRef::new("Shop", "CartTests"), "Run")
        .with_local("cart", cart())
        .with_body(body)
        .with_region(region);

    let rewrite = Instrumenter::new(InstrumentConfig::default())?.instrument(&method)?;
    let ops = &rewrite.method().operations;
    let remapped = &rewrite.method().exception_regions[0];

    assert_eq!(ops.len(), 17);
    assert_eq!(remapped.try_start, ops[2].offset);
    assert_eq!(remapped.try_end, ops[12].offset);
    assert_eq!(remapped.handler_start, ops[13].offset);
    assert_eq!(remapped.handler_end, ops[14].offset);

    // Every original try operation, and every record call it triggered, stays inside.
    for operation in &ops[2..=12] {
        assert!(remapped.in_try(operation.offset));
    }
    assert!(!remapped.in_try(ops[1].offset));

    // Both leaves land on the EndTest call in front of the return.
    assert_eq!(ops[12].target(), Some(ops[15].offset));
    assert_eq!(ops[14].target(), Some(ops[15].offset));
    Ok(())
}

#[test]
fn test_unit_rewrite_with_visibility_filter() -> Result<()> {
    let visible = cart_test(&["Add"], false)?;
    let hidden = MethodDefinition {
        name: "Helper".to_string(),
        visibility: Visibility::Private,
        ..visible.clone()
    };
    let unit = CompiledUnit::new("Shop.Tests.dll").with_type(
        TypeDefinition::new("Shop", "CartTests")
            .with_method(visible)
            .with_method(hidden),
    );

    let result = Instrumenter::new(InstrumentConfig::default())?
        .with_filter(VisibilityFilter::new())
        .instrument_unit(&unit);

    assert_eq!(result.instrumented_count(), 1);
    assert_eq!(
        result.pass_through().collect::<Vec<_>>(),
        vec![("Shop.CartTests::Helper", PassThroughReason::Filtered)]
    );
    assert_eq!(result.unit.types[0].methods[1], unit.types[0].methods[1]);
    Ok(())
}

#[test]
fn test_config_from_file_retargets_api() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    let custom = InstrumentConfig::default().with_api_type("Acme.Qa", "Recorder")?;
    file.write_all(serde_json::to_string(&custom)?.as_bytes())?;

    let config = InstrumentConfig::from_file(file.path())?;
    assert_eq!(config, custom);

    let rewrite = Instrumenter::new(config.clone())?.instrument(&cart_test(&["Add"], false)?)?;
    let injected = api_calls(&config.api, &rewrite.method().operations);

    assert_eq!(injected.len(), 4);
    assert!(injected
        .iter()
        .all(|method| method.declaring_type.full_name() == "Acme.Qa.Recorder"));
    Ok(())
}

#[test]
fn test_malformed_method_does_not_abort_unit() -> Result<()> {
    let good = cart_test(&["Add"], false)?;
    let bad = MethodDefinition::new(TypeRef::new("Shop", "CartTests"), "Bad").with_body(vec![
        Operation::new(4, OpKind::Pop, Operand::None),
        Operation::new(1, OpKind::Return, Operand::None),
    ]);
    let unit = CompiledUnit::new("Shop.Tests.dll").with_type(
        TypeDefinition::new("Shop", "CartTests")
            .with_method(good)
            .with_method(bad),
    );

    let result = Instrumenter::new(InstrumentConfig::default())?.instrument_unit(&unit);

    assert_eq!(result.instrumented_count(), 1);
    assert_eq!(
        result.pass_through().collect::<Vec<_>>(),
        vec![("Shop.CartTests::Bad", PassThroughReason::Malformed)]
    );
    assert_eq!(result.unit.types[0].methods[1], unit.types[0].methods[1]);
    Ok(())
}
