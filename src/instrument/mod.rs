//! Trace instrumentation of generated test methods.
//!
//! The [`Instrumenter`] rewrites method bodies of the recognized test shape: one object
//! construction followed by calls on that object, wrapped in exactly one try block. The
//! rewritten body reports the construction and every call to the [`RecordingApi`] and
//! behaves like the original otherwise.
//!
//! Anything outside that shape is returned untouched as a [`Rewrite::PassThrough`]
//! together with the reason, so callers can leave such methods out of trace comparison.
//! Individual sites inside an eligible body that do not fit the bookkeeping are emitted
//! unchanged and counted in [`RewriteStats::degraded`].
//!
//! # Key Components
//!
//! - [`Instrumenter`] - Entry point, rewrites single methods or whole units
//! - [`InstrumentConfig`] / [`RecordingApi`] - Where injected calls go and how temporaries
//!   are named
//! - [`Rewrite`] - Outcome of one method rewrite
//!
//! # Examples
//!
//! ```rust
//! use ildiff::assembly::{InstructionAssembler, MethodRef, TypeRef};
//! use ildiff::instrument::{Instrumenter, InstrumentConfig};
//! use ildiff::metadata::{ExceptionRegion, MethodDefinition};
//!
//! let subject = TypeRef::new("Shop", "Cart");
//! let clear = MethodRef::instance(subject.clone(), "Clear");
//!
//! let mut asm = InstructionAssembler::new();
//! asm.newobj(MethodRef::constructor(subject.clone()))
//!     .stloc(0)
//!     .ldloc(0)
//!     .callvirt(clear)
//!     .ret();
//! let body = asm.finish()?;
//! let last = body[body.len() - 1].offset;
//!
//! let test = MethodDefinition::new(TypeRef::new("Shop", "CartTests"), "Run")
//!     .with_local("cart", subject)
//!     .with_body(body)
//!     .with_region(ExceptionRegion::catch(0, last, last, last));
//!
//! let instrumenter = Instrumenter::new(InstrumentConfig::default())?;
//! let rewrite = instrumenter.instrument(&test)?;
//!
//! assert!(rewrite.is_instrumented());
//! assert_eq!(rewrite.method().operations.len(), test.operations.len() + 9);
//! # Ok::<(), ildiff::Error>(())
//! ```

mod api;
mod config;
mod context;
mod emitter;
mod rewriter;

pub use api::{RecordingApi, DEFAULT_API_NAMESPACE, DEFAULT_API_TYPE};
pub use config::InstrumentConfig;

use std::fmt;

use rayon::prelude::*;

use crate::{
    filter::MemberFilter,
    metadata::{CompiledUnit, MethodDefinition, TypeDefinition},
    Result,
};

/// Why a method was returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassThroughReason {
    /// The method has no exception region
    NoExceptionRegion,
    /// The method has more than one exception region
    MultipleExceptionRegions(usize),
    /// A bound of the exception region is not the offset of an operation
    RegionNotAligned,
    /// The method or its declaring type was rejected by the configured filter
    Filtered,
    /// The body breaks the instruction model invariants
    Malformed,
}

impl fmt::Display for PassThroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassThroughReason::NoExceptionRegion => write!(f, "no exception region"),
            PassThroughReason::MultipleExceptionRegions(count) => {
                write!(f, "{count} exception regions")
            }
            PassThroughReason::RegionNotAligned => {
                write!(f, "exception region not aligned to operations")
            }
            PassThroughReason::Filtered => write!(f, "filtered"),
            PassThroughReason::Malformed => write!(f, "malformed body"),
        }
    }
}

/// Why a single site of an eligible body was left uninstrumented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteIssue {
    /// A store in the try block has no preceding operation
    NoPredecessor,
    /// A call was seen before any constructed object was stored
    NoTarget,
    /// The `callvirt` operand is not a method reference
    NonMethodOperand,
    /// The result of a void call is popped
    VoidResultPopped,
    /// The store after a construction has no local operand
    NonLocalOperand,
    /// No local slot is left for the temporary holding a call result
    TooManyLocals,
}

impl fmt::Display for SiteIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SiteIssue::NoPredecessor => "no preceding operation",
            SiteIssue::NoTarget => "no object under test captured yet",
            SiteIssue::NonMethodOperand => "callee is not a method reference",
            SiteIssue::VoidResultPopped => "void callee followed by pop",
            SiteIssue::NonLocalOperand => "store without local operand",
            SiteIssue::TooManyLocals => "no local slot left for the result",
        };
        f.write_str(text)
    }
}

/// A site emitted unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegradedSite {
    /// Offset of the site in the original body
    pub offset: u32,
    /// What did not fit
    pub issue: SiteIssue,
}

/// Counters of one method rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Constructions recorded
    pub constructions: usize,
    /// Calls recorded without a result
    pub void_calls: usize,
    /// Calls recorded with their result
    pub value_calls: usize,
    /// `EndTest` calls injected, one per return
    pub end_tests: usize,
    /// Temporaries declared
    pub temporaries: usize,
    /// Sites left uninstrumented
    pub degraded: Vec<DegradedSite>,
}

impl RewriteStats {
    /// Number of call operations injected, the `StartTest` call included.
    #[must_use]
    pub fn injected_calls(&self) -> usize {
        1 + self.constructions + self.void_calls + self.value_calls + self.end_tests
    }
}

/// The outcome of instrumenting one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// The method was rewritten
    Instrumented {
        /// The rewritten method
        method: MethodDefinition,
        /// What was injected
        stats: RewriteStats,
    },
    /// The method is an unchanged copy of the input
    PassThrough {
        /// The input method
        method: MethodDefinition,
        /// Why nothing was rewritten
        reason: PassThroughReason,
    },
}

/// [`Rewrite`] without the method, as listed per method by [`UnitRewrite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The method was rewritten
    Instrumented(RewriteStats),
    /// The method was passed through
    PassThrough(PassThroughReason),
}

impl Rewrite {
    /// The resulting method.
    #[must_use]
    pub fn method(&self) -> &MethodDefinition {
        match self {
            Rewrite::Instrumented { method, .. } | Rewrite::PassThrough { method, .. } => method,
        }
    }

    /// Returns `true` if the method was rewritten.
    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        matches!(self, Rewrite::Instrumented { .. })
    }

    /// The rewrite counters, if the method was rewritten.
    #[must_use]
    pub fn stats(&self) -> Option<&RewriteStats> {
        match self {
            Rewrite::Instrumented { stats, .. } => Some(stats),
            Rewrite::PassThrough { .. } => None,
        }
    }

    /// Split into the resulting method and its outcome.
    #[must_use]
    pub fn into_parts(self) -> (MethodDefinition, Outcome) {
        match self {
            Rewrite::Instrumented { method, stats } => (method, Outcome::Instrumented(stats)),
            Rewrite::PassThrough { method, reason } => (method, Outcome::PassThrough(reason)),
        }
    }
}

/// Outcome of one method of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodOutcome {
    /// Qualified method name
    pub full_name: String,
    /// What happened to it
    pub outcome: Outcome,
}

/// A rewritten unit and what happened to each of its methods.
#[derive(Debug, Clone)]
pub struct UnitRewrite {
    /// The unit with every method replaced by its rewrite
    pub unit: CompiledUnit,
    /// One entry per method, in unit order
    pub outcomes: Vec<MethodOutcome>,
}

impl UnitRewrite {
    /// Number of rewritten methods.
    #[must_use]
    pub fn instrumented_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|entry| matches!(entry.outcome, Outcome::Instrumented(_)))
            .count()
    }

    /// Methods passed through, with the reason.
    pub fn pass_through(&self) -> impl Iterator<Item = (&str, PassThroughReason)> {
        self.outcomes.iter().filter_map(|entry| match entry.outcome {
            Outcome::PassThrough(reason) => Some((entry.full_name.as_str(), reason)),
            Outcome::Instrumented(_) => None,
        })
    }
}

/// Rewrites test methods to report to the recording API.
pub struct Instrumenter {
    config: InstrumentConfig,
    filter: Option<Box<dyn MemberFilter>>,
}

impl Instrumenter {
    /// Create an instrumenter for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] if the configuration names an empty
    /// symbol.
    pub fn new(config: InstrumentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Instrumenter {
            config,
            filter: None,
        })
    }

    /// Pass through every method the filter rejects.
    #[must_use]
    pub fn with_filter<F: MemberFilter + 'static>(mut self, filter: F) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Instrument `method`.
    ///
    /// The filter is not consulted, as it needs the declaring type; see
    /// [`Instrumenter::instrument_in`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the body breaks the instruction model
    /// invariants. Unsupported shapes are [`Rewrite::PassThrough`], not errors.
    pub fn instrument(&self, method: &MethodDefinition) -> Result<Rewrite> {
        method.validate()?;

        let region = match method.exception_regions.as_slice() {
            [region] => region,
            [] => return Ok(pass_through(method, PassThroughReason::NoExceptionRegion)),
            regions => {
                return Ok(pass_through(
                    method,
                    PassThroughReason::MultipleExceptionRegions(regions.len()),
                ))
            }
        };

        let aligned = region.bounds().iter().all(|bound| {
            method
                .operations
                .binary_search_by_key(bound, |operation| operation.offset)
                .is_ok()
        });
        if !aligned {
            return Ok(pass_through(method, PassThroughReason::RegionNotAligned));
        }

        let (method, stats) = rewriter::rewrite(method, region, &self.config)?;
        Ok(Rewrite::Instrumented { method, stats })
    }

    /// Instrument `method` declared by `ty`, consulting the filter first.
    ///
    /// # Errors
    ///
    /// See [`Instrumenter::instrument`].
    pub fn instrument_in(&self, ty: &TypeDefinition, method: &MethodDefinition) -> Result<Rewrite> {
        if let Some(filter) = &self.filter {
            if !filter.is_method_usable(ty, method) {
                method.validate()?;
                return Ok(pass_through(method, PassThroughReason::Filtered));
            }
        }
        self.instrument(method)
    }

    /// Instrument every method of `unit`. Methods are rewritten in parallel.
    ///
    /// A method whose body is malformed is passed through with
    /// [`PassThroughReason::Malformed`]; the other methods are still rewritten.
    #[must_use]
    pub fn instrument_unit(&self, unit: &CompiledUnit) -> UnitRewrite {
        let per_type: Vec<Vec<Rewrite>> = unit
            .types()
            .iter()
            .map(|ty| {
                ty.methods
                    .par_iter()
                    .map(|method| {
                        self.instrument_in(ty, method).unwrap_or_else(|error| {
                            log::warn!("{} not instrumented: {}", method.full_name(), error);
                            pass_through(method, PassThroughReason::Malformed)
                        })
                    })
                    .collect()
            })
            .collect();

        let mut rewritten = CompiledUnit::new(&unit.name);
        let mut outcomes = Vec::new();

        for (ty, rewrites) in unit.types().iter().zip(per_type) {
            let mut methods = Vec::with_capacity(rewrites.len());
            for rewrite in rewrites {
                let (method, outcome) = rewrite.into_parts();
                outcomes.push(MethodOutcome {
                    full_name: method.full_name(),
                    outcome,
                });
                methods.push(method);
            }

            rewritten.types.push(TypeDefinition {
                namespace: ty.namespace.clone(),
                name: ty.name.clone(),
                visibility: ty.visibility,
                modifiers: ty.modifiers,
                methods,
                fields: ty.fields.clone(),
            });
        }

        UnitRewrite {
            unit: rewritten,
            outcomes,
        }
    }
}

impl fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumenter")
            .field("config", &self.config)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

fn pass_through(method: &MethodDefinition, reason: PassThroughReason) -> Rewrite {
    log::debug!("{}: passed through, {}", method.full_name(), reason);
    Rewrite::PassThrough {
        method: method.clone(),
        reason,
    }
}
