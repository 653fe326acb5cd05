use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use fieldscout_core::identity::{Identity, IdentityRecord, IdentityUpdate};
use fieldscout_core::ids::{EventKey, MatchKey, RealmId, SchemaId, SubjectId};
use fieldscout_core::policy::IdentityScope;
use fieldscout_core::realm::{NewRealm, Realm, RealmPatch};
use fieldscout_core::records::{
    AllianceEntry, AllianceKey, Comment, MatchRoster, ObservationKey, Owned, RecordQuery, Report,
};
use fieldscout_core::schema::{NewSchema, Schema, SchemaScope};
use fieldscout_core::upsert::upsert_in;
use fieldscout_core::{RealmFilter, UpsertOutcome};

use crate::traits::{
    IdentityStore, MatchStore, RealmStore, RecordStore, SchemaStore, StorageError,
};

#[derive(Debug, Default)]
struct InnerState {
    last_realm_id: i64,
    last_subject_id: i64,
    last_schema_id: i64,
    realms: BTreeMap<RealmId, Realm>,
    identities: BTreeMap<SubjectId, Identity>,
    matches: HashMap<MatchKey, EventKey>,
    alliances: HashMap<AllianceKey, AllianceEntry>,
    comments: HashMap<ObservationKey, Comment>,
    reports: HashMap<ObservationKey, Report>,
    schemas: BTreeMap<SchemaId, Schema>,
}

impl InnerState {
    fn admits(&self, filter: &RealmFilter, realm: Option<RealmId>) -> bool {
        let share = realm
            .and_then(|id| self.realms.get(&id))
            .is_some_and(|r| r.share_reports);
        filter.admits(realm, share)
    }

    fn visible<'a, R: Owned + 'a>(
        &'a self,
        rows: impl Iterator<Item = &'a R> + 'a,
        filter: &'a RealmFilter,
    ) -> impl Iterator<Item = &'a R> + 'a {
        rows.filter(move |r| self.admits(filter, r.realm_id()))
    }

    fn username_taken(&self, username: &str, except: Option<SubjectId>) -> bool {
        self.identities
            .values()
            .any(|i| i.username == username && Some(i.id) != except)
    }

    fn require_match(&self, match_key: &MatchKey) -> Result<(), StorageError> {
        if self.matches.contains_key(match_key) {
            Ok(())
        } else {
            Err(StorageError::ForeignKeyViolation(format!(
                "match {match_key}"
            )))
        }
    }
}

/// Every table sits behind one mutex, so each trait call is a single critical
/// section and upserts are atomic without further coordination.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InnerState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Internal("in-memory store lock poisoned".to_string()))
    }
}

fn sorted_by_key<R: Clone>(rows: impl Iterator<Item = R>, key: impl Fn(&R) -> String) -> Vec<R> {
    let mut rows: Vec<R> = rows.collect();
    rows.sort_by_key(|r| key(r));
    rows
}

impl RealmStore for InMemoryStore {
    async fn create_realm(&self, realm: &NewRealm) -> Result<Realm, StorageError> {
        let mut state = self.lock()?;
        let name = realm.name.trim();
        if state.realms.values().any(|r| r.name == name) {
            return Err(StorageError::AlreadyExists(format!("realm {name}")));
        }

        state.last_realm_id += 1;
        let created = Realm {
            id: RealmId::new(state.last_realm_id),
            name: name.to_string(),
            share_reports: realm.share_reports,
        };
        state.realms.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_realm(&self, id: RealmId) -> Result<Realm, StorageError> {
        let state = self.lock()?;
        state
            .realms
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("realm {id}")))
    }

    async fn list_realms(&self, filter: &RealmFilter) -> Result<Vec<Realm>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .realms
            .values()
            .filter(|r| filter.admits(Some(r.id), r.share_reports))
            .cloned()
            .collect())
    }

    async fn patch_realm(&self, id: RealmId, patch: &RealmPatch) -> Result<Realm, StorageError> {
        let mut state = self.lock()?;
        if let Some(ref name) = patch.name {
            let name = name.trim();
            if state.realms.values().any(|r| r.name == name && r.id != id) {
                return Err(StorageError::AlreadyExists(format!("realm {name}")));
            }
        }
        let realm = state
            .realms
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("realm {id}")))?;
        realm.apply(patch);
        Ok(realm.clone())
    }
}

impl IdentityStore for InMemoryStore {
    async fn create_identity(&self, identity: IdentityRecord) -> Result<Identity, StorageError> {
        let mut state = self.lock()?;
        if !state.realms.contains_key(&identity.realm_id) {
            return Err(StorageError::ForeignKeyViolation(format!(
                "realm {}",
                identity.realm_id
            )));
        }
        if state.username_taken(&identity.username, None) {
            return Err(StorageError::AlreadyExists(format!(
                "username {}",
                identity.username
            )));
        }

        state.last_subject_id += 1;
        let created = Identity {
            id: SubjectId::new(state.last_subject_id),
            username: identity.username,
            hashed_password: identity.hashed_password,
            realm_id: identity.realm_id,
            first_name: identity.first_name,
            last_name: identity.last_name,
            roles: identity.roles,
            stars: Vec::new(),
        };
        state.identities.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_identity(&self, id: SubjectId) -> Result<Identity, StorageError> {
        let state = self.lock()?;
        state
            .identities
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("identity {id}")))
    }

    async fn get_identity_by_username(&self, username: &str) -> Result<Identity, StorageError> {
        let state = self.lock()?;
        state
            .identities
            .values()
            .find(|i| i.username == username)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("username {username}")))
    }

    async fn list_identities(&self, scope: IdentityScope) -> Result<Vec<Identity>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .identities
            .values()
            .filter(|i| match scope {
                IdentityScope::All => true,
                IdentityScope::Realm(realm) => i.realm_id == realm,
            })
            .cloned()
            .collect())
    }

    async fn patch_identity(
        &self,
        id: SubjectId,
        update: IdentityUpdate,
    ) -> Result<Identity, StorageError> {
        let mut state = self.lock()?;
        if !state.identities.contains_key(&id) {
            return Err(StorageError::NotFound(format!("identity {id}")));
        }
        if let Some(ref username) = update.username
            && state.username_taken(username, Some(id))
        {
            return Err(StorageError::AlreadyExists(format!("username {username}")));
        }

        let identity = state
            .identities
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("identity {id}")))?;
        identity.apply(update);
        Ok(identity.clone())
    }

    async fn delete_identity(&self, id: SubjectId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .identities
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(format!("identity {id}")))
    }
}

impl MatchStore for InMemoryStore {
    async fn upsert_match(&self, roster: &MatchRoster) -> Result<UpsertOutcome, StorageError> {
        let mut state = self.lock()?;
        let created = state
            .matches
            .insert(roster.match_key.clone(), roster.event_key.clone())
            .is_none();
        for alliance in roster.alliances() {
            upsert_in(&mut state.alliances, alliance);
        }
        Ok(UpsertOutcome::from_created(created))
    }

    async fn match_exists(
        &self,
        event: &EventKey,
        match_key: &MatchKey,
    ) -> Result<bool, StorageError> {
        let state = self.lock()?;
        Ok(state.matches.get(match_key) == Some(event))
    }

    async fn alliances(&self, match_key: &MatchKey) -> Result<Vec<AllianceEntry>, StorageError> {
        let state = self.lock()?;
        let mut entries: Vec<AllianceEntry> = state
            .alliances
            .values()
            .filter(|a| &a.match_key == match_key)
            .cloned()
            .collect();
        entries.sort_by_key(|a| a.is_blue);
        Ok(entries)
    }
}

impl RecordStore for InMemoryStore {
    async fn upsert_comment(&self, comment: Comment) -> Result<UpsertOutcome, StorageError> {
        let mut state = self.lock()?;
        state.require_match(&comment.match_key)?;
        Ok(upsert_in(&mut state.comments, comment))
    }

    async fn upsert_report(&self, report: Report) -> Result<UpsertOutcome, StorageError> {
        let mut state = self.lock()?;
        state.require_match(&report.match_key)?;
        Ok(upsert_in(&mut state.reports, report))
    }

    async fn comments(
        &self,
        query: &RecordQuery,
        filter: &RealmFilter,
    ) -> Result<Vec<Comment>, StorageError> {
        let state = self.lock()?;
        let rows = state
            .visible(state.comments.values(), filter)
            .filter(|c| query.matches(&c.event_key, &c.match_key, &c.team_key))
            .cloned();
        Ok(sorted_by_key(rows, |c| {
            format!("{}/{}/{:?}", c.match_key, c.team_key, c.reporter_id)
        }))
    }

    async fn reports(
        &self,
        query: &RecordQuery,
        filter: &RealmFilter,
    ) -> Result<Vec<Report>, StorageError> {
        let state = self.lock()?;
        let rows = state
            .visible(state.reports.values(), filter)
            .filter(|r| query.matches(&r.event_key, &r.match_key, &r.team_key))
            .cloned();
        Ok(sorted_by_key(rows, |r| {
            format!("{}/{}/{:?}", r.match_key, r.team_key, r.reporter_id)
        }))
    }
}

impl SchemaStore for InMemoryStore {
    async fn create_schema(
        &self,
        scope: SchemaScope,
        schema: &NewSchema,
    ) -> Result<Schema, StorageError> {
        let mut state = self.lock()?;
        match scope {
            SchemaScope::Standard { year } => {
                if state
                    .schemas
                    .values()
                    .any(|s| s.realm_id.is_none() && s.year == Some(year))
                {
                    return Err(StorageError::AlreadyExists(format!(
                        "standard schema for {year}"
                    )));
                }
            }
            SchemaScope::Realm { realm_id, .. } => {
                if !state.realms.contains_key(&realm_id) {
                    return Err(StorageError::ForeignKeyViolation(format!("realm {realm_id}")));
                }
            }
        }

        state.last_schema_id += 1;
        let created = Schema {
            id: SchemaId::new(state.last_schema_id),
            year: scope.year(),
            realm_id: scope.realm_id(),
            auto: schema.auto.clone(),
            teleop: schema.teleop.clone(),
        };
        state.schemas.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_schema(&self, id: SchemaId, filter: &RealmFilter) -> Result<Schema, StorageError> {
        let state = self.lock()?;
        state
            .schemas
            .get(&id)
            .filter(|s| state.admits(filter, s.realm_id))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("schema {id}")))
    }

    async fn standard_schema_for_year(&self, year: i32) -> Result<Schema, StorageError> {
        let state = self.lock()?;
        state
            .schemas
            .values()
            .find(|s| s.realm_id.is_none() && s.year == Some(year))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("standard schema for {year}")))
    }

    async fn visible_schemas(&self, filter: &RealmFilter) -> Result<Vec<Schema>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .schemas
            .values()
            .filter(|s| state.admits(filter, s.realm_id))
            .cloned()
            .collect())
    }
}
