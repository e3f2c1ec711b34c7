//! The rewrite pass.
//!
//! A single forward pass over the body in offset order. Every decision looks exactly one
//! operation backwards through the offset index:
//!
//! | Current operation          | Predecessor | Emitted                                                 |
//! |----------------------------|-------------|---------------------------------------------------------|
//! | in-try `stloc v`           | `newobj`    | `stloc v`, record `(v, ".ctor")`                        |
//! | in-try `pop`               | `callvirt`  | `stloc tmp`, record `(target, tmp, name)`               |
//! | in-try anything else       | `callvirt`  | record `(target, name)`, the operation                  |
//! | `ret` (anywhere)           | any         | `call EndTest`, `ret`                                   |
//! | anything else              | any         | the operation                                           |
//!
//! The prologue `ldstr <type name>; call StartTest` precedes everything.

use crate::{
    assembly::{MethodRef, OpKind, Operation},
    instrument::{
        context::RewriteContext, emitter::BodyEmitter, DegradedSite, InstrumentConfig,
        RewriteStats, SiteIssue,
    },
    metadata::{ExceptionRegion, MethodDefinition},
    Result,
};

/// The call site preceding the current operation, if it qualifies for recording.
struct CallSite<'a> {
    target: u16,
    callee: &'a MethodRef,
}

fn call_site<'a>(
    context: &RewriteContext<'a>,
    call: &'a Operation,
) -> std::result::Result<CallSite<'a>, SiteIssue> {
    let callee = call.method().ok_or(SiteIssue::NonMethodOperand)?;
    let target = context.target.ok_or(SiteIssue::NoTarget)?;
    Ok(CallSite { target, callee })
}

fn degrade(stats: &mut RewriteStats, operation: &Operation, issue: SiteIssue) {
    log::debug!("{operation}: left as is, {issue}");
    stats.degraded.push(DegradedSite {
        offset: operation.offset,
        issue,
    });
}

/// Rewrite `method`, whose only exception region is `region`.
///
/// The input is left untouched, the rewritten method is a new value.
pub(crate) fn rewrite(
    method: &MethodDefinition,
    region: &ExceptionRegion,
    config: &InstrumentConfig,
) -> Result<(MethodDefinition, RewriteStats)> {
    let api = &config.api;
    let code_end = method.code_size();
    let mut context = RewriteContext::new(method, region, &config.temp_local_prefix)?;
    let mut emitter = BodyEmitter::new();
    let mut stats = RewriteStats::default();

    emitter.ldstr(&method.declaring_type.name);
    emitter.call(&api.start_test);

    for operation in &method.operations {
        let previous = context.predecessor(operation);
        let in_try = context.in_try(operation);

        if in_try && operation.is_store_local() {
            emitter.open_group(operation.offset)?;
            emitter.original(operation, &context.index, code_end);

            match (previous, operation.local()) {
                (None, _) => degrade(&mut stats, operation, SiteIssue::NoPredecessor),
                (Some(constructor), Some(local)) if constructor.kind == OpKind::NewObj => {
                    context.target = Some(local);
                    emitter.ldloc(local);
                    emitter.ldstr(&config.constructor_signature);
                    emitter.call(&api.record_void_instance_call);
                    stats.constructions += 1;
                }
                (Some(constructor), None) if constructor.kind == OpKind::NewObj => {
                    degrade(&mut stats, operation, SiteIssue::NonLocalOperand);
                }
                _ => {}
            }
            continue;
        }

        if let Some(call) = previous.filter(|call| in_try && call.kind == OpKind::CallVirt) {
            match call_site(&context, call) {
                Ok(site) if operation.kind == OpKind::Pop => match &site.callee.return_type {
                    None => degrade(&mut stats, operation, SiteIssue::VoidResultPopped),
                    Some(result_type) => match context.fresh_local(result_type.clone()) {
                        None => degrade(&mut stats, operation, SiteIssue::TooManyLocals),
                        Some(temporary) => {
                            emitter.open_group(operation.offset)?;
                            emitter.stloc(temporary);
                            emitter.ldloc(site.target);
                            emitter.ldloc(temporary);
                            if result_type.is_value_type {
                                emitter.box_value(result_type);
                            }
                            emitter.ldstr(&site.callee.name);
                            emitter.call(&api.record_instance_call);

                            stats.value_calls += 1;
                            stats.temporaries += 1;
                            continue;
                        }
                    },
                },
                Ok(site) => {
                    // Trails the group of the callvirt.
                    emitter.ldloc(site.target);
                    emitter.ldstr(&site.callee.name);
                    emitter.call(&api.record_void_instance_call);
                    stats.void_calls += 1;
                }
                Err(issue) => degrade(&mut stats, operation, issue),
            }
        }

        emitter.open_group(operation.offset)?;
        if operation.is_return() {
            emitter.call(&api.end_test);
            stats.end_tests += 1;
        }
        emitter.original(operation, &context.index, code_end);
    }

    log::debug!(
        "{}: {} operations emitted for {} original, {} site(s) degraded",
        method.full_name(),
        emitter.len(),
        method.operations.len(),
        stats.degraded.len()
    );

    let (operations, exception_regions) = emitter.finish(&method.exception_regions)?;
    let rewritten = MethodDefinition {
        operations,
        exception_regions,
        locals: context.locals,
        max_stack: method.max_stack.max(config.min_max_stack),
        ..method.clone()
    };

    Ok((rewritten, stats))
}
