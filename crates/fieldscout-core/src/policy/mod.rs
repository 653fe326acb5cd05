//! Pure authorization decisions.
//!
//! Every function takes the caller's [`AuthContext`](crate::AuthContext)
//! explicitly plus a minimal description of the target, and returns a
//! [`Decision`] whose deny reason maps onto the shared error taxonomy. Role
//! capability is always evaluated against the caller's own realm; only
//! super-admins are realm-unbounded.

mod admin;
mod identity;
mod records;

pub use admin::{create_realm, create_schema, patch_realm, write_alliances};
pub use identity::{
    IdentityScope, IdentityTarget, clamp_role_patch, clamp_roles, delete_identity,
    list_identities, patch_identity, precheck_identity_write, read_identity,
};
pub use records::{require_authenticated, stamp_record};

use std::fmt;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    NotSelfOrAdmin,
    CrossRealm,
    AdminRequired,
    SuperAdminRequired,
}

impl DenyReason {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DenyReason::NotAuthenticated => ErrorKind::Unauthenticated,
            DenyReason::NotSelfOrAdmin
            | DenyReason::CrossRealm
            | DenyReason::AdminRequired
            | DenyReason::SuperAdminRequired => ErrorKind::Forbidden,
        }
    }

    /// Stable code for audit logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "not_authenticated",
            DenyReason::NotSelfOrAdmin => "not_self_or_admin",
            DenyReason::CrossRealm => "cross_realm",
            DenyReason::AdminRequired => "admin_required",
            DenyReason::SuperAdminRequired => "super_admin_required",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for DenyReason {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_authenticated_maps_to_unauthenticated() {
        assert_eq!(
            DenyReason::NotAuthenticated.kind(),
            ErrorKind::Unauthenticated
        );
    }

    #[test]
    fn every_other_reason_maps_to_forbidden() {
        for reason in [
            DenyReason::NotSelfOrAdmin,
            DenyReason::CrossRealm,
            DenyReason::AdminRequired,
            DenyReason::SuperAdminRequired,
        ] {
            assert_eq!(reason.kind(), ErrorKind::Forbidden, "{reason}");
        }
    }

    #[test]
    fn decision_into_result_carries_reason() {
        assert_eq!(Decision::Allow.into_result(), Ok(()));
        assert_eq!(
            Decision::Deny(DenyReason::CrossRealm).into_result(),
            Err(DenyReason::CrossRealm)
        );
    }
}
