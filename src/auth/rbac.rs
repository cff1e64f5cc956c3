//! Role/group based permission computation.
//!
//! Permissions are `resource:action` strings. A pattern is either an
//! exact `resource:action`, a family wildcard `resource:*`, or the
//! global wildcard `*`. The static role table below is the source of
//! truth; group grants extend it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

use crate::auth::models::UserProfile;

/// Closed set of assignable roles, ordered roughly by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    TenantAdmin,
    Manager,
    Member,
    Guest,
}

impl Role {
    /// Static permission patterns granted by this role.
    #[must_use]
    pub fn permission_patterns(self) -> &'static [&'static str] {
        match self {
            Self::SuperAdmin => &["*"],
            Self::TenantAdmin => &["tenant:*", "user:*", "conversation:*", "analytics:read"],
            Self::Manager => &["user:read", "conversation:*", "analytics:read"],
            Self::Member => &["conversation:read", "conversation:write", "profile:*"],
            Self::Guest => &["conversation:read"],
        }
    }
}

/// Static permission patterns granted through group membership.
fn group_patterns(group: &str) -> &'static [&'static str] {
    match group {
        "administrators" => &["admin:*"],
        "auditors" => &["audit:read", "analytics:read"],
        "support" => &["user:read", "conversation:read"],
        _ => &[],
    }
}

/// Keep a pattern if it is a wildcard or targets the queried resource.
fn applies_to(pattern: &str, resource: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.split_once(':') {
        Some((prefix, _)) => prefix == resource,
        None => false,
    }
}

/// Union of role- and group-derived permissions filtered by `resource`.
///
/// The result is a set: duplicates collapse and ordering is not
/// meaningful.
#[must_use]
pub fn permissions_for(user: &UserProfile, resource: &str) -> HashSet<String> {
    let role_patterns = user
        .roles
        .iter()
        .flat_map(|role| role.permission_patterns().iter());
    let group_grants = user
        .groups
        .iter()
        .flat_map(|group| group_patterns(group).iter());

    role_patterns
        .chain(group_grants)
        .filter(|pattern| applies_to(pattern, resource))
        .map(ToString::to_string)
        .collect()
}
