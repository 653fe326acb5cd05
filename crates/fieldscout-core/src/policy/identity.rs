use crate::claims::AuthContext;
use crate::ids::{RealmId, SubjectId};
use crate::roles::Roles;

use super::{Decision, DenyReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityTarget {
    pub id: SubjectId,
    pub realm: RealmId,
    pub is_super_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityScope {
    All,
    Realm(RealmId),
}

/// The part of an identity-write check that needs no lookup: self, or an
/// admin of some realm. Evaluated before the target is fetched so plain users
/// cannot learn which identities exist.
pub fn precheck_identity_write(ctx: &AuthContext, target: SubjectId) -> Decision {
    if ctx.subject == target || ctx.roles.is_admin_or_above() {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotSelfOrAdmin)
    }
}

fn same_realm_admin(ctx: &AuthContext, target: &IdentityTarget) -> Decision {
    if ctx.subject == target.id {
        return Decision::Allow;
    }
    if !ctx.roles.is_admin_or_above() {
        return Decision::Deny(DenyReason::NotSelfOrAdmin);
    }
    if ctx.roles.is_super_admin || ctx.realm == target.realm {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::CrossRealm)
    }
}

pub fn read_identity(ctx: &AuthContext, target: &IdentityTarget) -> Decision {
    same_realm_admin(ctx, target)
}

/// Writes additionally protect super-admin accounts: only another
/// super-admin (or the account itself) may change or remove one.
fn account_write(ctx: &AuthContext, target: &IdentityTarget) -> Decision {
    if target.is_super_admin && !ctx.roles.is_super_admin && ctx.subject != target.id {
        return Decision::Deny(DenyReason::SuperAdminRequired);
    }
    same_realm_admin(ctx, target)
}

pub fn patch_identity(ctx: &AuthContext, target: &IdentityTarget) -> Decision {
    account_write(ctx, target)
}

pub fn delete_identity(ctx: &AuthContext, target: &IdentityTarget) -> Decision {
    account_write(ctx, target)
}

pub fn list_identities(ctx: &AuthContext) -> IdentityScope {
    if ctx.roles.is_super_admin {
        IdentityScope::All
    } else {
        IdentityScope::Realm(ctx.realm)
    }
}

/// Downgrades requested roles to what the caller may hand out for an
/// identity in `target_realm`. Never an error: unauthorized flags are
/// dropped silently.
pub fn clamp_roles(ctx: Option<&AuthContext>, target_realm: RealmId, requested: Roles) -> Roles {
    let Some(ctx) = ctx else {
        return Roles::NONE;
    };
    if !ctx.roles.is_admin_or_above() {
        return Roles::NONE;
    }
    if ctx.roles.is_super_admin {
        return requested;
    }

    let mut granted = requested;
    granted.is_super_admin = false;
    if target_realm != ctx.realm {
        granted.is_verified = false;
        granted.is_admin = false;
    }
    granted
}

/// Patch variant of [`clamp_roles`]. Non-admins have the roles field removed
/// from the patch entirely; admins who are not super-admins can neither set
/// nor clear the target's super-admin flag.
pub fn clamp_role_patch(
    ctx: &AuthContext,
    target_realm: RealmId,
    current: Roles,
    requested: Option<Roles>,
) -> Option<Roles> {
    let requested = requested?;
    if !ctx.roles.is_admin_or_above() {
        return None;
    }

    let mut granted = clamp_roles(Some(ctx), target_realm, requested);
    if !ctx.roles.is_super_admin {
        granted.is_super_admin = current.is_super_admin;
        if target_realm != ctx.realm {
            granted.is_verified = current.is_verified;
            granted.is_admin = current.is_admin;
        }
    }
    Some(granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::strategies;
    use proptest::prelude::*;

    fn caller(subject: i64, realm: i64, roles: Roles) -> AuthContext {
        AuthContext::new(SubjectId::new(subject), RealmId::new(realm), roles)
    }

    fn target(id: i64, realm: i64) -> IdentityTarget {
        IdentityTarget {
            id: SubjectId::new(id),
            realm: RealmId::new(realm),
            is_super_admin: false,
        }
    }

    fn super_target(id: i64, realm: i64) -> IdentityTarget {
        IdentityTarget {
            is_super_admin: true,
            ..target(id, realm)
        }
    }

    #[test]
    fn admin_cannot_patch_or_delete_super_admin_in_own_realm() {
        let admin = caller(1, 5, Roles::admin());

        assert_eq!(
            patch_identity(&admin, &super_target(2, 5)),
            Decision::Deny(DenyReason::SuperAdminRequired)
        );
        assert_eq!(
            delete_identity(&admin, &super_target(2, 5)),
            Decision::Deny(DenyReason::SuperAdminRequired)
        );
        assert_eq!(read_identity(&admin, &super_target(2, 5)), Decision::Allow);
    }

    #[test]
    fn super_admins_manage_each_other_and_themselves() {
        let root = caller(1, 5, Roles::super_admin());

        assert_eq!(patch_identity(&root, &super_target(2, 6)), Decision::Allow);
        assert_eq!(delete_identity(&root, &super_target(1, 5)), Decision::Allow);
    }

    #[test]
    fn admin_patches_identity_in_own_realm() {
        let admin = caller(1, 5, Roles::admin());

        assert_eq!(patch_identity(&admin, &target(2, 5)), Decision::Allow);
    }

    #[test]
    fn admin_cannot_patch_identity_in_other_realm() {
        let admin = caller(1, 5, Roles::admin());

        assert_eq!(
            patch_identity(&admin, &target(2, 6)),
            Decision::Deny(DenyReason::CrossRealm)
        );
    }

    #[test]
    fn super_admin_patches_any_realm() {
        let root = caller(1, 5, Roles::super_admin());

        assert_eq!(patch_identity(&root, &target(2, 6)), Decision::Allow);
    }

    #[test]
    fn plain_user_cannot_touch_others_even_in_same_realm() {
        let user = caller(1, 5, Roles::NONE);

        assert_eq!(
            delete_identity(&user, &target(2, 5)),
            Decision::Deny(DenyReason::NotSelfOrAdmin)
        );
        assert_eq!(
            precheck_identity_write(&user, SubjectId::new(2)),
            Decision::Deny(DenyReason::NotSelfOrAdmin)
        );
    }

    #[test]
    fn verified_user_has_no_administrative_power() {
        let verified = caller(1, 5, Roles::verified());

        assert_eq!(
            patch_identity(&verified, &target(2, 5)),
            Decision::Deny(DenyReason::NotSelfOrAdmin)
        );
    }

    #[test]
    fn list_scope_follows_super_admin_flag() {
        assert_eq!(
            list_identities(&caller(1, 5, Roles::admin())),
            IdentityScope::Realm(RealmId::new(5))
        );
        assert_eq!(
            list_identities(&caller(1, 5, Roles::super_admin())),
            IdentityScope::All
        );
    }

    #[test]
    fn anonymous_sign_up_gets_no_roles() {
        let requested = Roles::super_admin();

        assert_eq!(clamp_roles(None, RealmId::new(1), requested), Roles::NONE);
    }

    #[test]
    fn admin_can_grant_admin_and_verified_in_own_realm() {
        let admin = caller(1, 5, Roles::admin());
        let requested = Roles {
            is_verified: true,
            is_admin: true,
            is_super_admin: true,
        };

        let granted = clamp_roles(Some(&admin), RealmId::new(5), requested);

        assert_eq!(
            granted,
            Roles {
                is_verified: true,
                is_admin: true,
                is_super_admin: false
            }
        );
    }

    #[test]
    fn admin_cannot_grant_anything_in_other_realm() {
        let admin = caller(1, 5, Roles::admin());

        let granted = clamp_roles(Some(&admin), RealmId::new(6), Roles::super_admin());

        assert_eq!(granted, Roles::NONE);
    }

    #[test]
    fn non_admin_patch_drops_roles_entirely() {
        let user = caller(1, 5, Roles::verified());

        assert_eq!(
            clamp_role_patch(&user, RealmId::new(5), Roles::verified(), Some(Roles::admin())),
            None
        );
    }

    #[test]
    fn admin_cannot_self_grant_super_admin() {
        let admin = caller(1, 5, Roles::admin());

        let granted = clamp_role_patch(
            &admin,
            RealmId::new(5),
            Roles::admin(),
            Some(Roles::super_admin()),
        )
        .unwrap();

        assert!(!granted.is_super_admin);
        assert!(granted.is_admin);
    }

    #[test]
    fn admin_cannot_strip_super_admin_from_target() {
        let admin = caller(1, 5, Roles::admin());

        let granted =
            clamp_role_patch(&admin, RealmId::new(5), Roles::super_admin(), Some(Roles::NONE))
                .unwrap();

        assert!(granted.is_super_admin);
    }

    #[test]
    fn super_admin_can_revoke_super_admin() {
        let root = caller(1, 5, Roles::super_admin());

        let granted =
            clamp_role_patch(&root, RealmId::new(9), Roles::super_admin(), Some(Roles::NONE))
                .unwrap();

        assert_eq!(granted, Roles::NONE);
    }

    proptest! {
        #[test]
        fn self_access_is_always_allowed(ctx in strategies::context(strategies::roles())) {
            let me = IdentityTarget {
                id: ctx.subject,
                realm: ctx.realm,
                is_super_admin: ctx.roles.is_super_admin,
            };

            prop_assert_eq!(patch_identity(&ctx, &me), Decision::Allow);
            prop_assert_eq!(delete_identity(&ctx, &me), Decision::Allow);
            prop_assert_eq!(read_identity(&ctx, &me), Decision::Allow);
            prop_assert_eq!(precheck_identity_write(&ctx, ctx.subject), Decision::Allow);
        }

        #[test]
        fn realm_isolation_for_non_super_admins(
            ctx in strategies::context(strategies::non_super_roles()),
            other_id in 1000i64..2000,
            realm_offset in 1i64..20,
        ) {
            let foreign = IdentityTarget {
                id: SubjectId::new(other_id),
                realm: RealmId::new(ctx.realm.value() + realm_offset),
                is_super_admin: false,
            };

            prop_assert!(!patch_identity(&ctx, &foreign).is_allowed());
            prop_assert!(!delete_identity(&ctx, &foreign).is_allowed());
        }

        #[test]
        fn super_admin_accounts_are_out_of_reach_for_lesser_callers(
            ctx in strategies::context(strategies::non_super_roles()),
            other_id in 1000i64..2000,
            realm_offset in 0i64..20,
        ) {
            let root = IdentityTarget {
                id: SubjectId::new(other_id),
                realm: RealmId::new(ctx.realm.value() + realm_offset),
                is_super_admin: true,
            };

            prop_assert!(!patch_identity(&ctx, &root).is_allowed());
            prop_assert!(!delete_identity(&ctx, &root).is_allowed());
        }

        #[test]
        fn non_super_admin_never_grants_super_admin(
            ctx in proptest::option::of(strategies::context(strategies::non_super_roles())),
            realm in 0i64..20,
            requested in strategies::roles(),
            current in strategies::non_super_roles(),
        ) {
            let granted = clamp_roles(ctx.as_ref(), RealmId::new(realm), requested);
            prop_assert!(!granted.is_super_admin);

            if let Some(ref ctx) = ctx {
                let patched = clamp_role_patch(ctx, RealmId::new(realm), current, Some(requested));
                prop_assert!(patched.is_none_or(|r| !r.is_super_admin));
            }
        }

        #[test]
        fn clamping_never_exceeds_the_request(
            ctx in proptest::option::of(strategies::context(strategies::roles())),
            realm in 0i64..20,
            requested in strategies::roles(),
        ) {
            let granted = clamp_roles(ctx.as_ref(), RealmId::new(realm), requested);

            prop_assert!(!granted.is_verified || requested.is_verified);
            prop_assert!(!granted.is_admin || requested.is_admin);
            prop_assert!(!granted.is_super_admin || requested.is_super_admin);
        }
    }
}
