use serde::{Deserialize, Serialize};

use shelfwise_core::{BusinessId, UserId};

use crate::Role;

/// An authenticated user as seen by the policy layer: identity, role and the
/// businesses the user is a member of.
///
/// Construction is decoupled from storage; the user directory resolves it
/// from the membership table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    pub business_ids: Vec<BusinessId>,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role, business_ids: Vec<BusinessId>) -> Self {
        Self {
            user_id,
            role,
            business_ids,
        }
    }
}
