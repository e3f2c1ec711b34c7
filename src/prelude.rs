//! # ildiff Prelude
//!
//! The most commonly used types of the crate, for glob imports.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ildiff operations
pub use crate::Error;

/// The result type used throughout ildiff
pub use crate::Result;

// ================================================================================================
// Instruction Model
// ================================================================================================

/// Instructions, operands and body construction
pub use crate::assembly::{
    InstructionAssembler, MethodRef, OffsetIndex, OpKind, Operand, Operation, TypeRef,
};

/// Units, types, methods and exception regions
pub use crate::metadata::{
    CompiledUnit, ExceptionRegion, FieldDefinition, HandlerKind, MethodDefinition, TypeDefinition,
    Visibility,
};

// ================================================================================================
// Filters
// ================================================================================================

/// Ignore patterns and member filters
pub use crate::filter::{
    FilterChain, ForbidExpression, IgnoreConfig, IgnoreFilter, IgnoreTarget, MemberFilter,
    PatternKind, TargetKind, VisibilityFilter,
};

// ================================================================================================
// Diff, Instrumentation and Traces
// ================================================================================================

/// The difference engine and its results
pub use crate::diff::{AssemblyDiff, DiffEngine, Skipped, TypeDiff, Unpaired};

/// The instrumentation rewriter
pub use crate::instrument::{
    InstrumentConfig, Instrumenter, PassThroughReason, RecordingApi, Rewrite, RewriteStats,
};

/// Trace recording and comparison
pub use crate::trace::{compare_traces, MemoryRecorder, Recorder, TraceEvent, TraceLog};
