use std::sync::Arc;

use fieldscout_core::error::ValidationError;
use fieldscout_core::identity::{
    Credentials, Identity, IdentityPatch, IdentityRecord, IdentityUpdate, NewIdentity,
};
use fieldscout_core::policy::{self, IdentityTarget};
use fieldscout_core::realm::{NewRealm, Realm, RealmPatch};
use fieldscout_core::records::{AllianceEntry, Comment, MatchRoster, RecordQuery, Report};
use fieldscout_core::schema::{NewSchema, Schema, SchemaScope};
use fieldscout_core::visibility::filter_for;
use fieldscout_core::{
    AuthContext, ErrorKind, EventKey, MatchKey, RealmId, SchemaId, SubjectId, UpsertOutcome,
};
use fieldscout_storage::{StorageError, Store};

use crate::audit::{AuditEvent, AuditSink, Operation, Outcome};
use crate::error::ApiError;
use crate::metrics::Metrics;
use crate::password::{hash_password, verify_password};
use crate::token::TokenIssuer;

pub struct ScoutService<S: Store> {
    store: Arc<S>,
    issuer: TokenIssuer,
    audit: AuditSink,
    metrics: Arc<Metrics>,
}

impl<S: Store> ScoutService<S> {
    pub fn new(store: Arc<S>, issuer: TokenIssuer, audit: AuditSink, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            issuer,
            audit,
            metrics,
        }
    }

    pub async fn authenticate(&self, credentials: Credentials) -> Result<String, ApiError> {
        credentials.validate()?;
        let target = format!("username {}", credentials.username);

        let result = async {
            let identity = match self
                .store
                .get_identity_by_username(&credentials.username)
                .await
            {
                Ok(identity) => identity,
                Err(StorageError::NotFound(_)) => return Err(ApiError::InvalidCredentials),
                Err(e) => return Err(e.into()),
            };
            if !verify_password(&credentials.password, &identity.hashed_password)? {
                return Err(ApiError::InvalidCredentials);
            }
            let ctx = AuthContext::new(identity.id, identity.realm_id, identity.roles);
            Ok::<_, ApiError>(self.issuer.issue(&ctx)?)
        }
        .await;

        self.observe(Operation::Authenticate, None, &target, result)
    }

    pub async fn create_realm(
        &self,
        ctx: Option<&AuthContext>,
        realm: NewRealm,
    ) -> Result<Realm, ApiError> {
        let target = format!("realm {}", realm.name.trim());
        let result = async {
            policy::create_realm(ctx).into_result()?;
            realm.validate()?;
            Ok::<_, ApiError>(self.store.create_realm(&realm).await?)
        }
        .await;
        self.observe(Operation::CreateRealm, ctx, &target, result)
    }

    pub async fn list_realms(&self, ctx: Option<&AuthContext>) -> Result<Vec<Realm>, ApiError> {
        self.store
            .list_realms(&filter_for(ctx))
            .await
            .map_err(ApiError::from)
            .inspect_err(|e| log_fault("list_realms", ctx, "realms", e))
    }

    pub async fn patch_realm(
        &self,
        ctx: Option<&AuthContext>,
        id: RealmId,
        patch: RealmPatch,
    ) -> Result<Realm, ApiError> {
        let target = format!("realm {id}");
        let result = async {
            policy::patch_realm(ctx, id).into_result()?;
            patch.validate()?;
            Ok::<_, ApiError>(self.store.patch_realm(id, &patch).await?)
        }
        .await;
        self.observe(Operation::PatchRealm, ctx, &target, result)
    }

    /// Sign-up and admin-driven creation share this path. Requested roles are
    /// clamped to what the caller may grant before anything else is checked.
    pub async fn create_identity(
        &self,
        ctx: Option<&AuthContext>,
        mut new: NewIdentity,
    ) -> Result<Identity, ApiError> {
        let target = format!("username {}", new.username);
        let result = async {
            new.roles = policy::clamp_roles(ctx, new.realm_id, new.roles);
            new.validate()?;
            let hashed_password = hash_password(&new.password)?;
            let record = IdentityRecord {
                username: new.username,
                hashed_password,
                realm_id: new.realm_id,
                first_name: new.first_name,
                last_name: new.last_name,
                roles: new.roles,
            };
            Ok::<_, ApiError>(self.store.create_identity(record).await?)
        }
        .await;
        self.observe(Operation::CreateIdentity, ctx, &target, result)
    }

    pub async fn list_identities(
        &self,
        ctx: Option<&AuthContext>,
    ) -> Result<Vec<Identity>, ApiError> {
        let result = async {
            let caller = policy::require_authenticated(ctx)?;
            let scope = policy::list_identities(caller);
            Ok::<_, ApiError>(self.store.list_identities(scope).await?)
        }
        .await;
        self.observe(Operation::ListIdentities, ctx, "identities", result)
    }

    pub async fn get_identity(
        &self,
        ctx: Option<&AuthContext>,
        id: SubjectId,
    ) -> Result<Identity, ApiError> {
        let target = format!("identity {id}");
        let result = async {
            let (caller, identity) = self.load_identity(ctx, id).await?;
            policy::read_identity(caller, &identity_target(&identity)).into_result()?;
            Ok::<_, ApiError>(identity)
        }
        .await;
        self.observe(Operation::ReadIdentity, ctx, &target, result)
    }

    pub async fn patch_identity(
        &self,
        ctx: Option<&AuthContext>,
        id: SubjectId,
        patch: IdentityPatch,
    ) -> Result<Identity, ApiError> {
        let target = format!("identity {id}");
        let result = async {
            let (caller, current) = self.load_identity(ctx, id).await?;
            policy::patch_identity(caller, &identity_target(&current)).into_result()?;

            let roles =
                policy::clamp_role_patch(caller, current.realm_id, current.roles, patch.roles);
            patch.validate()?;
            let hashed_password = patch
                .password
                .as_deref()
                .map(hash_password)
                .transpose()?;

            let update = IdentityUpdate {
                username: patch.username,
                hashed_password,
                first_name: patch.first_name,
                last_name: patch.last_name,
                roles,
                stars: patch.stars,
            };
            Ok::<_, ApiError>(self.store.patch_identity(id, update).await?)
        }
        .await;
        self.observe(Operation::PatchIdentity, ctx, &target, result)
    }

    pub async fn delete_identity(
        &self,
        ctx: Option<&AuthContext>,
        id: SubjectId,
    ) -> Result<(), ApiError> {
        let target = format!("identity {id}");
        let result = async {
            let (caller, current) = self.load_identity(ctx, id).await?;
            policy::delete_identity(caller, &identity_target(&current)).into_result()?;
            Ok::<_, ApiError>(self.store.delete_identity(id).await?)
        }
        .await;
        self.observe(Operation::DeleteIdentity, ctx, &target, result)
    }

    /// Precheck, then lookup. A plain user asking about someone else is told
    /// 403 whether or not the identity exists.
    async fn load_identity<'a>(
        &self,
        ctx: Option<&'a AuthContext>,
        id: SubjectId,
    ) -> Result<(&'a AuthContext, Identity), ApiError> {
        let caller = policy::require_authenticated(ctx)?;
        policy::precheck_identity_write(caller, id).into_result()?;
        let identity = self.store.get_identity(id).await?;
        Ok((caller, identity))
    }

    pub async fn put_match(
        &self,
        ctx: Option<&AuthContext>,
        roster: MatchRoster,
    ) -> Result<UpsertOutcome, ApiError> {
        let target = format!("match {}", roster.match_key);
        let result = async {
            policy::write_alliances(ctx).into_result()?;
            roster.validate()?;
            Ok::<_, ApiError>(self.store.upsert_match(&roster).await?)
        }
        .await;
        let outcome = self.observe(Operation::WriteMatch, ctx, &target, result)?;
        self.metrics.record_upsert(outcome);
        Ok(outcome)
    }

    pub async fn alliances(
        &self,
        event: &EventKey,
        match_key: &MatchKey,
    ) -> Result<Vec<AllianceEntry>, ApiError> {
        let result = async {
            if !self.store.match_exists(event, match_key).await? {
                return Err(ApiError::NotFound(format!("match {match_key}")));
            }
            Ok::<_, ApiError>(self.store.alliances(match_key).await?)
        }
        .await;
        result.inspect_err(|e| log_fault("alliances", None, match_key.as_str(), e))
    }

    /// `comment` must already carry its location; ownership is stamped here.
    pub async fn put_comment(
        &self,
        ctx: Option<&AuthContext>,
        comment: Comment,
    ) -> Result<UpsertOutcome, ApiError> {
        let target = format!("comment {} {}", comment.match_key, comment.team_key);
        let result = async {
            let comment = policy::stamp_record(ctx, comment)?;
            comment.validate()?;
            Ok::<_, ApiError>(
                self.store
                    .upsert_comment(comment)
                    .await
                    .map_err(missing_match)?,
            )
        }
        .await;
        let outcome = self.observe(Operation::WriteComment, ctx, &target, result)?;
        self.metrics.record_upsert(outcome);
        Ok(outcome)
    }

    pub async fn put_report(
        &self,
        ctx: Option<&AuthContext>,
        report: Report,
    ) -> Result<UpsertOutcome, ApiError> {
        let target = format!("report {} {}", report.match_key, report.team_key);
        let result = async {
            let report = policy::stamp_record(ctx, report)?;
            report.validate()?;
            Ok::<_, ApiError>(self.store.upsert_report(report).await.map_err(missing_match)?)
        }
        .await;
        let outcome = self.observe(Operation::WriteReport, ctx, &target, result)?;
        self.metrics.record_upsert(outcome);
        Ok(outcome)
    }

    pub async fn comments(
        &self,
        ctx: Option<&AuthContext>,
        query: &RecordQuery,
    ) -> Result<Vec<Comment>, ApiError> {
        self.store
            .comments(query, &filter_for(ctx))
            .await
            .map_err(ApiError::from)
            .inspect_err(|e| log_fault("comments", ctx, query.event_key.as_str(), e))
    }

    pub async fn reports(
        &self,
        ctx: Option<&AuthContext>,
        query: &RecordQuery,
    ) -> Result<Vec<Report>, ApiError> {
        self.store
            .reports(query, &filter_for(ctx))
            .await
            .map_err(ApiError::from)
            .inspect_err(|e| log_fault("reports", ctx, query.event_key.as_str(), e))
    }

    /// A schema with a realm is that realm's private schema; one with only a
    /// year is the standard schema for that year.
    pub async fn create_schema(
        &self,
        ctx: Option<&AuthContext>,
        realm_id: Option<RealmId>,
        schema: NewSchema,
    ) -> Result<Schema, ApiError> {
        let scope = SchemaScope::from_parts(schema.year, realm_id)
            .ok_or(ValidationError::Required("year"))?;
        let target = match scope {
            SchemaScope::Standard { year } => format!("standard schema {year}"),
            SchemaScope::Realm { realm_id, .. } => format!("schema of realm {realm_id}"),
        };

        let result = async {
            policy::create_schema(ctx, &scope).into_result()?;
            schema.validate()?;
            Ok::<_, ApiError>(self.store.create_schema(scope, &schema).await?)
        }
        .await;
        self.observe(Operation::CreateSchema, ctx, &target, result)
    }

    pub async fn get_schema(
        &self,
        ctx: Option<&AuthContext>,
        id: SchemaId,
    ) -> Result<Schema, ApiError> {
        self.store
            .get_schema(id, &filter_for(ctx))
            .await
            .map_err(ApiError::from)
            .inspect_err(|e| log_fault("get_schema", ctx, "schema", e))
    }

    pub async fn schemas(&self, ctx: Option<&AuthContext>) -> Result<Vec<Schema>, ApiError> {
        self.store
            .visible_schemas(&filter_for(ctx))
            .await
            .map_err(ApiError::from)
            .inspect_err(|e| log_fault("schemas", ctx, "schemas", e))
    }

    pub async fn standard_schema(&self, year: i32) -> Result<Schema, ApiError> {
        self.store
            .standard_schema_for_year(year)
            .await
            .map_err(ApiError::from)
            .inspect_err(|e| log_fault("standard_schema", None, "schema", e))
    }

    /// Turns the result of an audited operation into audit events and
    /// counters. Client errors that are not access decisions are not audited.
    fn observe<T>(
        &self,
        operation: Operation,
        ctx: Option<&AuthContext>,
        target: &str,
        result: Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let event = match &result {
            Ok(_) => Some(AuditEvent::new(operation, ctx, target, Outcome::Allowed)),
            Err(err) => match err.denial_code() {
                Some(reason) => {
                    self.metrics.record_denied();
                    Some(AuditEvent::denied(operation, ctx, target, reason))
                }
                None if err.kind() == ErrorKind::Internal => {
                    log_fault(operation.as_str(), ctx, target, err);
                    Some(AuditEvent::new(operation, ctx, target, Outcome::Failed))
                }
                None => None,
            },
        };
        if let Some(event) = event {
            self.audit.submit(event);
        }
        result
    }
}

fn identity_target(identity: &Identity) -> IdentityTarget {
    IdentityTarget {
        id: identity.id,
        realm: identity.realm_id,
        is_super_admin: identity.roles.is_super_admin,
    }
}

fn missing_match(err: StorageError) -> ApiError {
    match err {
        StorageError::ForeignKeyViolation(what) => ApiError::NotFound(what),
        other => other.into(),
    }
}

fn log_fault(operation: &str, ctx: Option<&AuthContext>, target: &str, err: &ApiError) {
    if err.kind() == ErrorKind::Internal {
        tracing::error!(
            operation,
            subject = ?ctx.map(|c| c.subject.value()),
            resource = target,
            error = %err,
            "operation failed"
        );
    }
}
