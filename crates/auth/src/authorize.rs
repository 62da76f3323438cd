use std::collections::BTreeSet;

use thiserror::Error;

use shelfwise_core::BusinessId;

use crate::{Principal, Role};

/// Outcome of the listing policy for one principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Every record across every business.
    All,
    /// Only records owned by these businesses.
    Businesses(BTreeSet<BusinessId>),
    /// Nothing at all.
    Nothing,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: not a member of business {0}")]
    NotAMember(BusinessId),
}

/// The single visibility rule shared by every listing (collections, items,
/// businesses).
///
/// - `admin` sees everything
/// - `user` sees the businesses it belongs to
/// - any other role sees nothing
///
/// No IO, no panics.
pub fn visibility(role: &Role, business_ids: &[BusinessId]) -> Visibility {
    if role.is_admin() {
        Visibility::All
    } else if role.is_user() {
        Visibility::Businesses(business_ids.iter().copied().collect())
    } else {
        tracing::debug!(role = %role, "role has no catalog visibility");
        Visibility::Nothing
    }
}

impl Visibility {
    pub fn for_principal(principal: &Principal) -> Self {
        visibility(&principal.role, &principal.business_ids)
    }

    pub fn allows(&self, business_id: BusinessId) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Businesses(ids) => ids.contains(&business_id),
            Visibility::Nothing => false,
        }
    }
}

/// Write-side check for member-managed businesses: the principal must be
/// able to see the business (admins always can, users through membership).
pub fn authorize_member(principal: &Principal, business_id: BusinessId) -> Result<(), AuthzError> {
    if Visibility::for_principal(principal).allows(business_id) {
        Ok(())
    } else {
        Err(AuthzError::NotAMember(business_id))
    }
}
