use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{RealmId, SchemaId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub stat_type: StatType,
}

/// Who a schema belongs to. Standard schemas are realm-less and unique per
/// year; realm schemas are owned by one realm and need not name a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaScope {
    Standard { year: i32 },
    Realm { realm_id: RealmId, year: Option<i32> },
}

impl SchemaScope {
    pub fn realm_id(&self) -> Option<RealmId> {
        match self {
            SchemaScope::Standard { .. } => None,
            SchemaScope::Realm { realm_id, .. } => Some(*realm_id),
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            SchemaScope::Standard { year } => Some(*year),
            SchemaScope::Realm { year, .. } => *year,
        }
    }

    pub fn from_parts(year: Option<i32>, realm_id: Option<RealmId>) -> Option<Self> {
        match (year, realm_id) {
            (Some(year), None) => Some(SchemaScope::Standard { year }),
            (year, Some(realm_id)) => Some(SchemaScope::Realm { realm_id, year }),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: SchemaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realm_id: Option<RealmId>,
    pub auto: Vec<StatDescription>,
    pub teleop: Vec<StatDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSchema {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub auto: Vec<StatDescription>,
    #[serde(default)]
    pub teleop: Vec<StatDescription>,
}

impl NewSchema {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.auto.is_empty() && self.teleop.is_empty() {
            return Err(ValidationError::EmptySchema);
        }
        unique_names("auto", &self.auto)?;
        unique_names("teleop", &self.teleop)
    }
}

fn unique_names(phase: &'static str, stats: &[StatDescription]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for stat in stats {
        if stat.name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if !seen.insert(stat.name.as_str()) {
            return Err(ValidationError::DuplicateStat {
                phase,
                name: stat.name.clone(),
            });
        }
    }
    Ok(())
}
