use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::ids::{EventKey, MatchKey, RealmId, SubjectId, TeamKey};
use crate::upsert::Upsertable;

pub const MAX_COMMENT_LEN: usize = 10_000;

/// Ownership binding shared by crowd-sourced records. Both fields are set by
/// the server from the caller's own identity, never from client input.
pub trait Owned {
    fn realm_id(&self) -> Option<RealmId>;
    fn set_owner(&mut self, reporter: SubjectId, realm: RealmId);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObservationKey {
    pub match_key: MatchKey,
    pub team_key: TeamKey,
    pub reporter_id: Option<SubjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(skip_deserializing)]
    pub event_key: EventKey,
    #[serde(skip_deserializing)]
    pub match_key: MatchKey,
    #[serde(skip_deserializing)]
    pub team_key: TeamKey,
    #[serde(default)]
    pub reporter_id: Option<SubjectId>,
    #[serde(default, skip_serializing)]
    pub realm_id: Option<RealmId>,
    pub comment: String,
}

impl Comment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let len = self.comment.chars().count();
        if len > MAX_COMMENT_LEN {
            return Err(ValidationError::Length {
                field: "comment",
                min: 0,
                max: MAX_COMMENT_LEN,
                len,
            });
        }
        Ok(())
    }

    pub fn located(mut self, event: &EventKey, match_key: &MatchKey, team: &TeamKey) -> Self {
        self.event_key = event.clone();
        self.match_key = match_key.clone();
        self.team_key = team.clone();
        self
    }
}

impl Upsertable for Comment {
    type Key = ObservationKey;

    fn natural_key(&self) -> ObservationKey {
        ObservationKey {
            match_key: self.match_key.clone(),
            team_key: self.team_key.clone(),
            reporter_id: self.reporter_id,
        }
    }

    fn replace_payload(&mut self, incoming: Self) {
        self.comment = incoming.comment;
    }
}

impl Owned for Comment {
    fn realm_id(&self) -> Option<RealmId> {
        self.realm_id
    }

    fn set_owner(&mut self, reporter: SubjectId, realm: RealmId) {
        self.reporter_id = Some(reporter);
        self.realm_id = Some(realm);
    }
}

/// A single statistic from one match: either a counted stat
/// (attempts/successes) or a boolean one (attempted/succeeded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    #[serde(rename = "statName")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    #[serde(default)]
    pub auto: Vec<Stat>,
    #[serde(default)]
    pub teleop: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(skip_deserializing)]
    pub event_key: EventKey,
    #[serde(skip_deserializing)]
    pub match_key: MatchKey,
    #[serde(skip_deserializing)]
    pub team_key: TeamKey,
    #[serde(default)]
    pub reporter_id: Option<SubjectId>,
    #[serde(default, skip_serializing)]
    pub realm_id: Option<RealmId>,
    #[serde(default)]
    pub auto_name: String,
    pub data: ReportData,
}

impl Report {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_stats("auto", &self.data.auto)?;
        validate_stats("teleop", &self.data.teleop)
    }

    pub fn located(mut self, event: &EventKey, match_key: &MatchKey, team: &TeamKey) -> Self {
        self.event_key = event.clone();
        self.match_key = match_key.clone();
        self.team_key = team.clone();
        self
    }
}

fn validate_stats(phase: &'static str, stats: &[Stat]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for stat in stats {
        if stat.name.trim().is_empty() {
            return Err(ValidationError::Required("statName"));
        }
        if !seen.insert(stat.name.as_str()) {
            return Err(ValidationError::DuplicateStat {
                phase,
                name: stat.name.clone(),
            });
        }
        if let (Some(attempts), Some(successes)) = (stat.attempts, stat.successes)
            && successes > attempts
        {
            return Err(ValidationError::InvalidStat {
                phase,
                name: stat.name.clone(),
                reason: "successes exceed attempts",
            });
        }
        if stat.succeeded == Some(true) && stat.attempted == Some(false) {
            return Err(ValidationError::InvalidStat {
                phase,
                name: stat.name.clone(),
                reason: "succeeded without being attempted",
            });
        }
    }
    Ok(())
}

impl Upsertable for Report {
    type Key = ObservationKey;

    fn natural_key(&self) -> ObservationKey {
        ObservationKey {
            match_key: self.match_key.clone(),
            team_key: self.team_key.clone(),
            reporter_id: self.reporter_id,
        }
    }

    fn replace_payload(&mut self, incoming: Self) {
        self.auto_name = incoming.auto_name;
        self.data = incoming.data;
    }
}

impl Owned for Report {
    fn realm_id(&self) -> Option<RealmId> {
        self.realm_id
    }

    fn set_owner(&mut self, reporter: SubjectId, realm: RealmId) {
        self.reporter_id = Some(reporter);
        self.realm_id = Some(realm);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllianceKey {
    pub match_key: MatchKey,
    pub is_blue: bool,
}

/// Authoritative roster for one side of a match. Carries no realm and no
/// reporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllianceEntry {
    pub match_key: MatchKey,
    pub is_blue: bool,
    pub team_keys: Vec<TeamKey>,
}

impl Upsertable for AllianceEntry {
    type Key = AllianceKey;

    fn natural_key(&self) -> AllianceKey {
        AllianceKey {
            match_key: self.match_key.clone(),
            is_blue: self.is_blue,
        }
    }

    fn replace_payload(&mut self, incoming: Self) {
        self.team_keys = incoming.team_keys;
    }
}

/// Both alliances of one match as fed by a super-admin. Writing a roster
/// creates the match if needed and replaces both sides in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRoster {
    pub event_key: EventKey,
    pub match_key: MatchKey,
    pub red: Vec<TeamKey>,
    pub blue: Vec<TeamKey>,
}

impl MatchRoster {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for team in self.red.iter().chain(&self.blue) {
            if team.as_str().trim().is_empty() {
                return Err(ValidationError::Required("teamKey"));
            }
            if !seen.insert(team) {
                return Err(ValidationError::DuplicateTeam(team.to_string()));
            }
        }
        Ok(())
    }

    pub fn alliances(&self) -> [AllianceEntry; 2] {
        [
            AllianceEntry {
                match_key: self.match_key.clone(),
                is_blue: false,
                team_keys: self.red.clone(),
            },
            AllianceEntry {
                match_key: self.match_key.clone(),
                is_blue: true,
                team_keys: self.blue.clone(),
            },
        ]
    }
}

/// Selection for record reads. The realm predicate is passed separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub event_key: EventKey,
    pub match_key: Option<MatchKey>,
    pub team_key: Option<TeamKey>,
}

impl RecordQuery {
    pub fn event(event_key: EventKey) -> Self {
        Self {
            event_key,
            match_key: None,
            team_key: None,
        }
    }

    pub fn team(mut self, team_key: TeamKey) -> Self {
        self.team_key = Some(team_key);
        self
    }

    pub fn in_match(mut self, match_key: MatchKey) -> Self {
        self.match_key = Some(match_key);
        self
    }

    pub fn matches(&self, event: &EventKey, match_key: &MatchKey, team: &TeamKey) -> bool {
        &self.event_key == event
            && self.match_key.as_ref().is_none_or(|m| m == match_key)
            && self.team_key.as_ref().is_none_or(|t| t == team)
    }
}
