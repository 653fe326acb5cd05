pub mod migrations;
mod queries;

use sqlx::PgPool;

use fieldscout_core::identity::{Identity, IdentityRecord, IdentityUpdate};
use fieldscout_core::ids::{EventKey, MatchKey, RealmId, SchemaId, SubjectId};
use fieldscout_core::policy::IdentityScope;
use fieldscout_core::realm::{NewRealm, Realm, RealmPatch};
use fieldscout_core::records::{AllianceEntry, Comment, MatchRoster, RecordQuery, Report};
use fieldscout_core::schema::{NewSchema, Schema, SchemaScope};
use fieldscout_core::{RealmFilter, UpsertOutcome};

use crate::traits::{
    IdentityStore, MatchStore, RealmStore, RecordStore, SchemaStore, StorageError,
};

pub use migrations::run_migrations;

/// Natural-key uniqueness is enforced by table constraints and every upsert
/// is a single `INSERT ... ON CONFLICT DO UPDATE` statement.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RealmStore for PostgresStore {
    async fn create_realm(&self, realm: &NewRealm) -> Result<Realm, StorageError> {
        queries::insert_realm(&self.pool, realm).await
    }

    async fn get_realm(&self, id: RealmId) -> Result<Realm, StorageError> {
        queries::select_realm(&self.pool, id).await
    }

    async fn list_realms(&self, filter: &RealmFilter) -> Result<Vec<Realm>, StorageError> {
        queries::select_realms(&self.pool, filter).await
    }

    async fn patch_realm(&self, id: RealmId, patch: &RealmPatch) -> Result<Realm, StorageError> {
        queries::update_realm(&self.pool, id, patch).await
    }
}

impl IdentityStore for PostgresStore {
    async fn create_identity(&self, identity: IdentityRecord) -> Result<Identity, StorageError> {
        queries::insert_identity(&self.pool, &identity).await
    }

    async fn get_identity(&self, id: SubjectId) -> Result<Identity, StorageError> {
        queries::select_identity(&self.pool, id).await
    }

    async fn get_identity_by_username(&self, username: &str) -> Result<Identity, StorageError> {
        queries::select_identity_by_username(&self.pool, username).await
    }

    async fn list_identities(&self, scope: IdentityScope) -> Result<Vec<Identity>, StorageError> {
        queries::select_identities(&self.pool, scope).await
    }

    async fn patch_identity(
        &self,
        id: SubjectId,
        update: IdentityUpdate,
    ) -> Result<Identity, StorageError> {
        queries::update_identity(&self.pool, id, &update).await
    }

    async fn delete_identity(&self, id: SubjectId) -> Result<(), StorageError> {
        queries::delete_identity(&self.pool, id).await
    }
}

impl MatchStore for PostgresStore {
    async fn upsert_match(&self, roster: &MatchRoster) -> Result<UpsertOutcome, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let outcome =
            queries::upsert_match_row(&mut *tx, &roster.event_key, &roster.match_key).await?;
        for alliance in roster.alliances() {
            queries::upsert_alliance(&mut *tx, &alliance).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(outcome)
    }

    async fn match_exists(
        &self,
        event: &EventKey,
        match_key: &MatchKey,
    ) -> Result<bool, StorageError> {
        queries::match_exists(&self.pool, event, match_key).await
    }

    async fn alliances(&self, match_key: &MatchKey) -> Result<Vec<AllianceEntry>, StorageError> {
        queries::select_alliances(&self.pool, match_key).await
    }
}

impl RecordStore for PostgresStore {
    async fn upsert_comment(&self, comment: Comment) -> Result<UpsertOutcome, StorageError> {
        queries::upsert_comment(&self.pool, &comment).await
    }

    async fn upsert_report(&self, report: Report) -> Result<UpsertOutcome, StorageError> {
        queries::upsert_report(&self.pool, &report).await
    }

    async fn comments(
        &self,
        query: &RecordQuery,
        filter: &RealmFilter,
    ) -> Result<Vec<Comment>, StorageError> {
        queries::select_comments(&self.pool, query, filter).await
    }

    async fn reports(
        &self,
        query: &RecordQuery,
        filter: &RealmFilter,
    ) -> Result<Vec<Report>, StorageError> {
        queries::select_reports(&self.pool, query, filter).await
    }
}

impl SchemaStore for PostgresStore {
    async fn create_schema(
        &self,
        scope: SchemaScope,
        schema: &NewSchema,
    ) -> Result<Schema, StorageError> {
        queries::insert_schema(&self.pool, scope, schema).await
    }

    async fn get_schema(&self, id: SchemaId, filter: &RealmFilter) -> Result<Schema, StorageError> {
        queries::select_schema(&self.pool, id, filter).await
    }

    async fn standard_schema_for_year(&self, year: i32) -> Result<Schema, StorageError> {
        queries::select_standard_schema(&self.pool, year).await
    }

    async fn visible_schemas(&self, filter: &RealmFilter) -> Result<Vec<Schema>, StorageError> {
        queries::select_visible_schemas(&self.pool, filter).await
    }
}
