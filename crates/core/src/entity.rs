//! Entity traits: identity + continuity across state changes.

use crate::id::BusinessId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// Records owned by exactly one business (the tenant boundary).
///
/// Listing operations filter on this when a principal may only see the
/// businesses it belongs to.
pub trait BusinessScoped {
    fn business_id(&self) -> BusinessId;
}
