use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, check_length};
use crate::ids::RealmId;

/// A tenant. `share_reports` decides whether the realm's reports, comments
/// and schemas are exposed to callers outside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Realm {
    pub id: RealmId,
    pub name: String,
    pub share_reports: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRealm {
    pub name: String,
    #[serde(default)]
    pub share_reports: bool,
}

impl NewRealm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("name", self.name.trim(), 1, 64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub share_reports: Option<bool>,
}

impl RealmPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.name {
            Some(ref name) => check_length("name", name.trim(), 1, 64),
            None => Ok(()),
        }
    }
}

impl Realm {
    pub fn apply(&mut self, patch: &RealmPatch) {
        if let Some(ref name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(share) = patch.share_reports {
            self.share_reports = share;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_realm_name_is_invalid() {
        let realm = NewRealm {
            name: "   ".to_string(),
            share_reports: true,
        };
        assert!(realm.validate().is_err());
    }

    #[test]
    fn share_reports_defaults_to_private() {
        let realm: NewRealm = serde_json::from_str(r#"{"name": "Pigmice"}"#).unwrap();
        assert!(!realm.share_reports);
        assert!(realm.validate().is_ok());
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let mut realm = Realm {
            id: RealmId::new(1),
            name: "Pigmice".to_string(),
            share_reports: false,
        };
        let patch: RealmPatch = serde_json::from_str(r#"{"shareReports": true}"#).unwrap();

        realm.apply(&patch);

        assert_eq!(realm.name, "Pigmice");
        assert!(realm.share_reports);
    }
}
