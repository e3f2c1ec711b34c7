//! Visibility based filtering.

use crate::{
    filter::MemberFilter,
    metadata::{FieldDefinition, MethodDefinition, TypeDefinition},
};

/// Keeps only items reachable from outside their assembly.
///
/// Members are usable only if both the member and its declaring type are externally
/// visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityFilter;

impl VisibilityFilter {
    /// Create the filter.
    #[must_use]
    pub fn new() -> Self {
        VisibilityFilter
    }
}

impl MemberFilter for VisibilityFilter {
    fn is_type_usable(&self, ty: &TypeDefinition) -> bool {
        ty.visibility.is_externally_visible()
    }

    fn is_method_usable(&self, ty: &TypeDefinition, method: &MethodDefinition) -> bool {
        self.is_type_usable(ty) && method.visibility.is_externally_visible()
    }

    fn is_field_usable(&self, ty: &TypeDefinition, field: &FieldDefinition) -> bool {
        self.is_type_usable(ty) && field.visibility.is_externally_visible()
    }
}
