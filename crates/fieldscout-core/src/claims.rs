//! Interpretation of an already-verified token payload.
//!
//! Signature and expiry checks happen before this point; `extract` only turns
//! trusted JSON into an [`AuthContext`] and rejects payloads whose subject,
//! realm or roles are absent or of the wrong shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;
use crate::ids::{RealmId, SubjectId};
use crate::roles::Roles;

pub const SUBJECT_CLAIM: &str = "sub";
pub const REALM_CLAIM: &str = "realm";
pub const ROLES_CLAIM: &str = "roles";

/// Per-request identity. Built once from claims and passed explicitly to
/// every policy and visibility call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub subject: SubjectId,
    pub realm: RealmId,
    pub roles: Roles,
}

impl AuthContext {
    pub fn new(subject: SubjectId, realm: RealmId, roles: Roles) -> Self {
        Self {
            subject,
            realm,
            roles,
        }
    }
}

/// Wire shape of the token claims, used when issuing tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub realm: i64,
    pub roles: Roles,
    pub exp: u64,
    pub iat: u64,
}

impl Claims {
    pub fn new(ctx: &AuthContext, issued_at: u64, ttl_secs: u64) -> Self {
        Self {
            sub: ctx.subject.to_string(),
            realm: ctx.realm.value(),
            roles: ctx.roles,
            exp: issued_at + ttl_secs,
            iat: issued_at,
        }
    }
}

/// Token-side roles: unlike request bodies, every flag must be present.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrictRoles {
    is_verified: bool,
    is_admin: bool,
    is_super_admin: bool,
}

impl From<StrictRoles> for Roles {
    fn from(r: StrictRoles) -> Self {
        Roles {
            is_verified: r.is_verified,
            is_admin: r.is_admin,
            is_super_admin: r.is_super_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimsError {
    #[error("claims payload is not an object")]
    NotAnObject,

    #[error("missing subject claim")]
    MissingSubject,

    #[error("subject claim is not an integer string")]
    InvalidSubject,

    #[error("missing realm claim")]
    MissingRealm,

    #[error("realm claim is not an integer")]
    InvalidRealm,

    #[error("missing roles claim")]
    MissingRoles,

    #[error("roles claim is malformed")]
    InvalidRoles,
}

impl ClaimsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Unauthenticated
    }
}

pub fn extract(payload: &Value) -> Result<AuthContext, ClaimsError> {
    let object = payload.as_object().ok_or(ClaimsError::NotAnObject)?;

    let subject = match object.get(SUBJECT_CLAIM) {
        None | Some(Value::Null) => return Err(ClaimsError::MissingSubject),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map_err(|_| ClaimsError::InvalidSubject)?,
        Some(_) => return Err(ClaimsError::InvalidSubject),
    };

    let realm = match object.get(REALM_CLAIM) {
        None | Some(Value::Null) => return Err(ClaimsError::MissingRealm),
        Some(v) => v.as_i64().ok_or(ClaimsError::InvalidRealm)?,
    };

    let roles = match object.get(ROLES_CLAIM) {
        None | Some(Value::Null) => return Err(ClaimsError::MissingRoles),
        Some(v @ Value::Object(_)) => StrictRoles::deserialize(v)
            .map_err(|_| ClaimsError::InvalidRoles)?
            .into(),
        Some(_) => return Err(ClaimsError::InvalidRoles),
    };

    Ok(AuthContext {
        subject: SubjectId::new(subject),
        realm: RealmId::new(realm),
        roles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "sub": "42",
            "realm": 3,
            "roles": {"isVerified": true, "isAdmin": false, "isSuperAdmin": false},
            "exp": 1_900_000_000u64,
            "iat": 1_800_000_000u64,
        })
    }

    #[test]
    fn extracts_subject_realm_and_roles() {
        let ctx = extract(&valid_payload()).unwrap();

        assert_eq!(ctx.subject, SubjectId::new(42));
        assert_eq!(ctx.realm, RealmId::new(3));
        assert_eq!(ctx.roles, Roles::verified());
    }

    #[test]
    fn missing_subject_is_rejected() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("sub");

        assert_eq!(extract(&payload), Err(ClaimsError::MissingSubject));
    }

    #[test]
    fn numeric_subject_is_rejected() {
        let mut payload = valid_payload();
        payload["sub"] = json!(42);

        assert_eq!(extract(&payload), Err(ClaimsError::InvalidSubject));
    }

    #[test]
    fn non_integer_subject_string_is_rejected() {
        let mut payload = valid_payload();
        payload["sub"] = json!("forty-two");

        assert_eq!(extract(&payload), Err(ClaimsError::InvalidSubject));
    }

    #[test]
    fn missing_realm_is_rejected() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("realm");

        assert_eq!(extract(&payload), Err(ClaimsError::MissingRealm));
    }

    #[test]
    fn null_realm_is_rejected() {
        let mut payload = valid_payload();
        payload["realm"] = Value::Null;

        assert_eq!(extract(&payload), Err(ClaimsError::MissingRealm));
    }

    #[test]
    fn string_realm_is_rejected() {
        let mut payload = valid_payload();
        payload["realm"] = json!("3");

        assert_eq!(extract(&payload), Err(ClaimsError::InvalidRealm));
    }

    #[test]
    fn missing_roles_is_rejected() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("roles");

        assert_eq!(extract(&payload), Err(ClaimsError::MissingRoles));
    }

    #[test]
    fn non_boolean_role_flag_is_rejected() {
        let mut payload = valid_payload();
        payload["roles"] = json!({"isAdmin": "yes"});

        assert_eq!(extract(&payload), Err(ClaimsError::InvalidRoles));
    }

    #[test]
    fn empty_roles_object_is_rejected() {
        let mut payload = valid_payload();
        payload["roles"] = json!({});

        assert_eq!(extract(&payload), Err(ClaimsError::InvalidRoles));
    }

    #[test]
    fn partial_roles_object_is_rejected() {
        let mut payload = valid_payload();
        payload["roles"] = json!({"isAdmin": true});

        assert_eq!(extract(&payload), Err(ClaimsError::InvalidRoles));
    }

    #[test]
    fn null_role_flag_is_rejected() {
        let mut payload = valid_payload();
        payload["roles"] = json!({"isVerified": null, "isAdmin": false, "isSuperAdmin": false});

        assert_eq!(extract(&payload), Err(ClaimsError::InvalidRoles));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert_eq!(extract(&json!([1, 2])), Err(ClaimsError::NotAnObject));
    }

    #[test]
    fn issued_claims_extract_back_to_the_same_context() {
        let ctx = AuthContext::new(SubjectId::new(7), RealmId::new(2), Roles::admin());
        let claims = Claims::new(&ctx, 1_000, 60);

        let extracted = extract(&serde_json::to_value(&claims).unwrap()).unwrap();

        assert_eq!(extracted, ctx);
        assert_eq!(claims.exp, 1_060);
    }

    #[test]
    fn every_claims_error_is_unauthenticated() {
        assert_eq!(ClaimsError::MissingRealm.kind(), ErrorKind::Unauthenticated);
        assert_eq!(ClaimsError::InvalidRoles.kind(), ErrorKind::Unauthenticated);
    }
}
