//! Name and visibility based exclusion of types, members and fields.
//!
//! The filters decide which parts of a unit take part in comparison and instrumentation.
//! Every filter implements [`MemberFilter`]; filters compose by conjunction through
//! [`FilterChain`], so an item is usable only if *every* filter in the chain approves it.
//!
//! # Key Components
//!
//! - [`ForbidExpression`] / [`PatternKind`] - Exact, regex and wildcard name patterns
//! - [`IgnoreConfig`] - The three forbidden lists (types, members, fields), loadable from JSON
//! - [`IgnoreFilter`] - A [`MemberFilter`] backed by an [`IgnoreConfig`]
//! - [`IgnoreTarget`] - Type or method exclusion rule consumed by the difference engine
//! - [`VisibilityFilter`] - Keeps only externally visible items
//!
//! # Examples
//!
//! ```rust
//! use ildiff::filter::{FilterChain, ForbidExpression, IgnoreConfig, IgnoreFilter, MemberFilter, VisibilityFilter};
//! use ildiff::metadata::{TypeDefinition, Visibility};
//!
//! let mut config = IgnoreConfig::default();
//! config.forbidden_types.push(ForbidExpression::wildcard("System.*")?);
//!
//! let chain = FilterChain::new()
//!     .with(IgnoreFilter::new(config))
//!     .with(VisibilityFilter::new());
//!
//! let public = TypeDefinition::new("Bank", "Account");
//! let internal = TypeDefinition::new("Bank", "Audit").with_visibility(Visibility::Assembly);
//! let framework = TypeDefinition::new("System", "Object");
//!
//! assert!(chain.is_type_usable(&public));
//! assert!(!chain.is_type_usable(&internal));
//! assert!(!chain.is_type_usable(&framework));
//! # Ok::<(), ildiff::Error>(())
//! ```

mod expression;
mod ignore;
mod visibility;

pub use expression::{ForbidExpression, PatternKind};
pub use ignore::{IgnoreConfig, IgnoreFilter, IgnoreTarget, TargetKind};
pub use visibility::VisibilityFilter;

use crate::metadata::{FieldDefinition, MethodDefinition, TypeDefinition};

/// Decides whether types, methods and fields may be used.
///
/// Implementations must be pure: the same item always yields the same answer, so a
/// filter can be shared across threads that diff or rewrite in parallel.
pub trait MemberFilter: Send + Sync {
    /// Returns `true` if `ty` may be used.
    fn is_type_usable(&self, ty: &TypeDefinition) -> bool;

    /// Returns `true` if `method`, declared by `ty`, may be used.
    fn is_method_usable(&self, ty: &TypeDefinition, method: &MethodDefinition) -> bool;

    /// Returns `true` if `field`, declared by `ty`, may be used.
    fn is_field_usable(&self, ty: &TypeDefinition, field: &FieldDefinition) -> bool;
}

/// Conjunction of filters.
///
/// An empty chain approves everything.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn MemberFilter>>,
}

impl FilterChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter.
    #[must_use]
    pub fn with<F: MemberFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Append a boxed filter.
    pub fn push(&mut self, filter: Box<dyn MemberFilter>) {
        self.filters.push(filter);
    }

    /// Number of composed filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if the chain holds no filter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl MemberFilter for FilterChain {
    fn is_type_usable(&self, ty: &TypeDefinition) -> bool {
        self.filters.iter().all(|filter| filter.is_type_usable(ty))
    }

    fn is_method_usable(&self, ty: &TypeDefinition, method: &MethodDefinition) -> bool {
        self.filters
            .iter()
            .all(|filter| filter.is_method_usable(ty, method))
    }

    fn is_field_usable(&self, ty: &TypeDefinition, field: &FieldDefinition) -> bool {
        self.filters
            .iter()
            .all(|filter| filter.is_field_usable(ty, field))
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}
