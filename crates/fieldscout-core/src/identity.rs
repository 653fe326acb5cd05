use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, check_length};
use crate::ids::{RealmId, SubjectId, TeamKey};
use crate::roles::Roles;

pub const USERNAME_LEN: (usize, usize) = (4, 32);
pub const PASSWORD_LEN: (usize, usize) = (8, 128);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: SubjectId,
    pub username: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub realm_id: RealmId,
    pub first_name: String,
    pub last_name: String,
    pub roles: Roles,
    pub stars: Vec<TeamKey>,
}

/// Request body for identity creation. `roles` is clamped by policy before
/// validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIdentity {
    pub username: String,
    pub password: String,
    pub realm_id: RealmId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub roles: Roles,
}

impl NewIdentity {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("username", &self.username, USERNAME_LEN.0, USERNAME_LEN.1)?;
        check_length("password", &self.password, PASSWORD_LEN.0, PASSWORD_LEN.1)?;
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::Required("firstName"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::Required("lastName"));
        }
        Ok(())
    }
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Option<Roles>,
    pub stars: Option<Vec<TeamKey>>,
}

impl IdentityPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ref username) = self.username {
            check_length("username", username, USERNAME_LEN.0, USERNAME_LEN.1)?;
        }
        if let Some(ref password) = self.password {
            check_length("password", password, PASSWORD_LEN.0, PASSWORD_LEN.1)?;
        }
        Ok(())
    }
}

/// Login request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("username", &self.username, USERNAME_LEN.0, USERNAME_LEN.1)?;
        check_length("password", &self.password, PASSWORD_LEN.0, PASSWORD_LEN.1)
    }
}

/// What the storage layer receives: the password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub username: String,
    pub hashed_password: String,
    pub realm_id: RealmId,
    pub first_name: String,
    pub last_name: String,
    pub roles: Roles,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub username: Option<String>,
    pub hashed_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Option<Roles>,
    pub stars: Option<Vec<TeamKey>>,
}

impl Identity {
    pub fn apply(&mut self, update: IdentityUpdate) {
        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(hash) = update.hashed_password {
            self.hashed_password = hash;
        }
        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(roles) = update.roles {
            self.roles = roles;
        }
        if let Some(stars) = update.stars {
            self.stars = stars;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_identity() -> NewIdentity {
        NewIdentity {
            username: "scout01".to_string(),
            password: "correct horse".to_string(),
            realm_id: RealmId::new(1),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            roles: Roles::NONE,
        }
    }

    #[test]
    fn valid_identity_passes() {
        assert!(new_identity().validate().is_ok());
    }

    #[test]
    fn short_username_fails() {
        let mut identity = new_identity();
        identity.username = "abc".to_string();

        let err = identity.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Length {
                field: "username",
                ..
            }
        ));
    }

    #[test]
    fn short_password_fails() {
        let mut identity = new_identity();
        identity.password = "short".to_string();

        assert!(matches!(
            identity.validate(),
            Err(ValidationError::Length {
                field: "password",
                ..
            })
        ));
    }

    #[test]
    fn missing_first_name_fails() {
        let mut identity = new_identity();
        identity.first_name = String::new();

        assert_eq!(
            identity.validate(),
            Err(ValidationError::Required("firstName"))
        );
    }

    #[test]
    fn empty_patch_is_valid() {
        assert!(IdentityPatch::default().validate().is_ok());
    }

    #[test]
    fn patch_validates_present_fields_only() {
        let patch = IdentityPatch {
            password: Some("tiny".to_string()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn credentials_use_identity_length_rules() {
        let creds: Credentials =
            serde_json::from_str(r#"{"username": "abc", "password": "long enough"}"#).unwrap();
        assert!(matches!(
            creds.validate(),
            Err(ValidationError::Length {
                field: "username",
                ..
            })
        ));
    }

    #[test]
    fn hashed_password_is_never_serialized() {
        let identity = Identity {
            id: SubjectId::new(1),
            username: "scout01".to_string(),
            hashed_password: "$argon2id$secret".to_string(),
            realm_id: RealmId::new(1),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            roles: Roles::NONE,
            stars: vec![],
        };

        let json = serde_json::to_string(&identity).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("realmId"));
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut identity = Identity {
            id: SubjectId::new(1),
            username: "scout01".to_string(),
            hashed_password: "h".to_string(),
            realm_id: RealmId::new(1),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            roles: Roles::NONE,
            stars: vec![],
        };

        identity.apply(IdentityUpdate {
            first_name: Some("Grace".to_string()),
            ..Default::default()
        });

        assert_eq!(identity.first_name, "Grace");
        assert_eq!(identity.last_name, "Lovelace");
        assert_eq!(identity.username, "scout01");
    }
}
