use fieldscout_core::ErrorKind;
use fieldscout_core::identity::{Identity, IdentityRecord, IdentityUpdate};
use fieldscout_core::ids::{EventKey, MatchKey, RealmId, SchemaId, SubjectId};
use fieldscout_core::policy::IdentityScope;
use fieldscout_core::realm::{NewRealm, Realm, RealmPatch};
use fieldscout_core::records::{AllianceEntry, Comment, MatchRoster, RecordQuery, Report};
use fieldscout_core::schema::{NewSchema, Schema, SchemaScope};
use fieldscout_core::{RealmFilter, UpsertOutcome};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("referenced {0} does not exist")]
    ForeignKeyViolation(String),
    #[error("internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::AlreadyExists(_) => ErrorKind::Conflict,
            StorageError::ForeignKeyViolation(_) => ErrorKind::Validation,
            StorageError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub trait RealmStore: Send + Sync {
    fn create_realm(
        &self,
        realm: &NewRealm,
    ) -> impl Future<Output = Result<Realm, StorageError>> + Send;

    fn get_realm(&self, id: RealmId) -> impl Future<Output = Result<Realm, StorageError>> + Send;

    fn list_realms(
        &self,
        filter: &RealmFilter,
    ) -> impl Future<Output = Result<Vec<Realm>, StorageError>> + Send;

    fn patch_realm(
        &self,
        id: RealmId,
        patch: &RealmPatch,
    ) -> impl Future<Output = Result<Realm, StorageError>> + Send;
}

pub trait IdentityStore: Send + Sync {
    /// Fails with `AlreadyExists` on a taken username and
    /// `ForeignKeyViolation` when the realm does not exist.
    fn create_identity(
        &self,
        identity: IdentityRecord,
    ) -> impl Future<Output = Result<Identity, StorageError>> + Send;

    fn get_identity(
        &self,
        id: SubjectId,
    ) -> impl Future<Output = Result<Identity, StorageError>> + Send;

    fn get_identity_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Identity, StorageError>> + Send;

    fn list_identities(
        &self,
        scope: IdentityScope,
    ) -> impl Future<Output = Result<Vec<Identity>, StorageError>> + Send;

    fn patch_identity(
        &self,
        id: SubjectId,
        update: IdentityUpdate,
    ) -> impl Future<Output = Result<Identity, StorageError>> + Send;

    fn delete_identity(
        &self,
        id: SubjectId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait MatchStore: Send + Sync {
    /// Upserts the match row and both alliance rows as one atomic step. The
    /// outcome reports whether the match itself was new.
    fn upsert_match(
        &self,
        roster: &MatchRoster,
    ) -> impl Future<Output = Result<UpsertOutcome, StorageError>> + Send;

    fn match_exists(
        &self,
        event: &EventKey,
        match_key: &MatchKey,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn alliances(
        &self,
        match_key: &MatchKey,
    ) -> impl Future<Output = Result<Vec<AllianceEntry>, StorageError>> + Send;
}

/// Crowd-sourced observations. Writes fail with `ForeignKeyViolation` when the
/// match does not exist; reads only return rows the filter admits.
pub trait RecordStore: Send + Sync {
    fn upsert_comment(
        &self,
        comment: Comment,
    ) -> impl Future<Output = Result<UpsertOutcome, StorageError>> + Send;

    fn upsert_report(
        &self,
        report: Report,
    ) -> impl Future<Output = Result<UpsertOutcome, StorageError>> + Send;

    fn comments(
        &self,
        query: &RecordQuery,
        filter: &RealmFilter,
    ) -> impl Future<Output = Result<Vec<Comment>, StorageError>> + Send;

    fn reports(
        &self,
        query: &RecordQuery,
        filter: &RealmFilter,
    ) -> impl Future<Output = Result<Vec<Report>, StorageError>> + Send;
}

pub trait SchemaStore: Send + Sync {
    /// Standard schemas are unique per year; a second one is `AlreadyExists`.
    fn create_schema(
        &self,
        scope: SchemaScope,
        schema: &NewSchema,
    ) -> impl Future<Output = Result<Schema, StorageError>> + Send;

    /// Schemas the filter does not admit are reported as `NotFound`.
    fn get_schema(
        &self,
        id: SchemaId,
        filter: &RealmFilter,
    ) -> impl Future<Output = Result<Schema, StorageError>> + Send;

    fn standard_schema_for_year(
        &self,
        year: i32,
    ) -> impl Future<Output = Result<Schema, StorageError>> + Send;

    fn visible_schemas(
        &self,
        filter: &RealmFilter,
    ) -> impl Future<Output = Result<Vec<Schema>, StorageError>> + Send;
}

/// Everything the service needs from one backend.
pub trait Store: RealmStore + IdentityStore + MatchStore + RecordStore + SchemaStore {}

impl<T> Store for T where T: RealmStore + IdentityStore + MatchStore + RecordStore + SchemaStore {}
