use serde::{Deserialize, Serialize};

/// Role grants carried by an identity. The three flags are independent
/// grants; the capability ordering is derived by [`Roles::level`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Roles {
    pub is_verified: bool,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

/// Capability lattice, least to most powerful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleLevel {
    Plain,
    Verified,
    Admin,
    SuperAdmin,
}

impl Roles {
    pub const NONE: Roles = Roles {
        is_verified: false,
        is_admin: false,
        is_super_admin: false,
    };

    pub fn super_admin() -> Self {
        Self {
            is_verified: true,
            is_admin: true,
            is_super_admin: true,
        }
    }

    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::NONE
        }
    }

    pub fn verified() -> Self {
        Self {
            is_verified: true,
            ..Self::NONE
        }
    }

    pub fn level(&self) -> RoleLevel {
        if self.is_super_admin {
            RoleLevel::SuperAdmin
        } else if self.is_admin {
            RoleLevel::Admin
        } else if self.is_verified {
            RoleLevel::Verified
        } else {
            RoleLevel::Plain
        }
    }

    pub fn is_admin_or_above(&self) -> bool {
        self.level() >= RoleLevel::Admin
    }
}
