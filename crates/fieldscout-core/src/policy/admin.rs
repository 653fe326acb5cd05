use crate::claims::AuthContext;
use crate::ids::RealmId;
use crate::schema::SchemaScope;

use super::{Decision, DenyReason};

fn super_admin_only(ctx: Option<&AuthContext>) -> Decision {
    match ctx {
        None => Decision::Deny(DenyReason::NotAuthenticated),
        Some(ctx) if ctx.roles.is_super_admin => Decision::Allow,
        Some(_) => Decision::Deny(DenyReason::SuperAdminRequired),
    }
}

fn realm_admin(ctx: Option<&AuthContext>, realm: RealmId) -> Decision {
    let Some(ctx) = ctx else {
        return Decision::Deny(DenyReason::NotAuthenticated);
    };
    if ctx.roles.is_super_admin {
        return Decision::Allow;
    }
    if !ctx.roles.is_admin {
        return Decision::Deny(DenyReason::AdminRequired);
    }
    if ctx.realm == realm {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::CrossRealm)
    }
}

/// Alliance rosters are authoritative match data.
pub fn write_alliances(ctx: Option<&AuthContext>) -> Decision {
    super_admin_only(ctx)
}

pub fn create_realm(ctx: Option<&AuthContext>) -> Decision {
    super_admin_only(ctx)
}

pub fn patch_realm(ctx: Option<&AuthContext>, realm: RealmId) -> Decision {
    realm_admin(ctx, realm)
}

pub fn create_schema(ctx: Option<&AuthContext>, scope: &SchemaScope) -> Decision {
    match scope {
        SchemaScope::Standard { .. } => super_admin_only(ctx),
        SchemaScope::Realm { realm_id, .. } => realm_admin(ctx, *realm_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SubjectId;
    use crate::roles::Roles;

    fn caller(realm: i64, roles: Roles) -> AuthContext {
        AuthContext::new(SubjectId::new(1), RealmId::new(realm), roles)
    }

    #[test]
    fn only_super_admin_writes_alliances() {
        assert_eq!(
            write_alliances(Some(&caller(1, Roles::admin()))),
            Decision::Deny(DenyReason::SuperAdminRequired)
        );
        assert_eq!(
            write_alliances(Some(&caller(1, Roles::super_admin()))),
            Decision::Allow
        );
        assert_eq!(
            write_alliances(None),
            Decision::Deny(DenyReason::NotAuthenticated)
        );
    }

    #[test]
    fn admin_patches_only_own_realm() {
        let admin = caller(4, Roles::admin());

        assert_eq!(patch_realm(Some(&admin), RealmId::new(4)), Decision::Allow);
        assert_eq!(
            patch_realm(Some(&admin), RealmId::new(5)),
            Decision::Deny(DenyReason::CrossRealm)
        );
    }

    #[test]
    fn verified_user_cannot_patch_realm() {
        assert_eq!(
            patch_realm(Some(&caller(4, Roles::verified())), RealmId::new(4)),
            Decision::Deny(DenyReason::AdminRequired)
        );
    }

    #[test]
    fn standard_schema_requires_super_admin() {
        let scope = SchemaScope::Standard { year: 2024 };

        assert_eq!(
            create_schema(Some(&caller(4, Roles::admin())), &scope),
            Decision::Deny(DenyReason::SuperAdminRequired)
        );
        assert_eq!(
            create_schema(Some(&caller(4, Roles::super_admin())), &scope),
            Decision::Allow
        );
    }

    #[test]
    fn realm_schema_requires_admin_of_that_realm() {
        let scope = SchemaScope::Realm {
            realm_id: RealmId::new(4),
            year: Some(2024),
        };

        assert_eq!(
            create_schema(Some(&caller(4, Roles::admin())), &scope),
            Decision::Allow
        );
        assert_eq!(
            create_schema(Some(&caller(5, Roles::admin())), &scope),
            Decision::Deny(DenyReason::CrossRealm)
        );
    }

    #[test]
    fn creating_realms_is_super_admin_only() {
        assert!(create_realm(Some(&caller(1, Roles::super_admin()))).is_allowed());
        assert!(!create_realm(Some(&caller(1, Roles::admin()))).is_allowed());
    }
}
