use sqlx::types::Json;

use fieldscout_core::identity::{Identity, IdentityRecord, IdentityUpdate};
use fieldscout_core::ids::{EventKey, MatchKey, RealmId, SchemaId, SubjectId, TeamKey};
use fieldscout_core::policy::IdentityScope;
use fieldscout_core::realm::{NewRealm, Realm, RealmPatch};
use fieldscout_core::records::{AllianceEntry, Comment, RecordQuery, Report, ReportData};
use fieldscout_core::schema::{NewSchema, Schema, SchemaScope, StatDescription};
use fieldscout_core::{RealmFilter, Roles, UpsertOutcome};

use crate::traits::StorageError;

fn to_storage_error(e: sqlx::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

/// Translates constraint violations into the storage taxonomy. `conflict`
/// names the unique value, `reference` the row a foreign key points at.
fn classify(e: sqlx::Error, conflict: &str, reference: &str) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StorageError::AlreadyExists(conflict.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StorageError::ForeignKeyViolation(reference.to_string());
        }
    }
    to_storage_error(e)
}

/// `(unrestricted, own realm)` bound into every visibility predicate.
fn realm_binds(filter: &RealmFilter) -> (bool, Option<i64>) {
    (
        filter.is_unrestricted(),
        filter.own_realm().map(|r| r.value()),
    )
}

type RealmRow = (i64, String, bool);

fn realm_from_row((id, name, share_reports): RealmRow) -> Realm {
    Realm {
        id: RealmId::new(id),
        name,
        share_reports,
    }
}

pub async fn insert_realm<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    realm: &NewRealm,
) -> Result<Realm, StorageError> {
    let name = realm.name.trim();
    let row: RealmRow = sqlx::query_as(
        "INSERT INTO realms (name, share_reports) VALUES ($1, $2) RETURNING id, name, share_reports",
    )
    .bind(name)
    .bind(realm.share_reports)
    .fetch_one(executor)
    .await
    .map_err(|e| classify(e, &format!("realm {name}"), "realm"))?;
    Ok(realm_from_row(row))
}

pub async fn select_realm<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: RealmId,
) -> Result<Realm, StorageError> {
    let row: Option<RealmRow> =
        sqlx::query_as("SELECT id, name, share_reports FROM realms WHERE id = $1")
            .bind(id.value())
            .fetch_optional(executor)
            .await
            .map_err(to_storage_error)?;
    row.map(realm_from_row)
        .ok_or_else(|| StorageError::NotFound(format!("realm {id}")))
}

pub async fn select_realms<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    filter: &RealmFilter,
) -> Result<Vec<Realm>, StorageError> {
    let (unrestricted, own) = realm_binds(filter);
    let rows: Vec<RealmRow> = sqlx::query_as(
        r#"
        SELECT id, name, share_reports FROM realms
        WHERE $1 OR share_reports OR id = $2::BIGINT
        ORDER BY id
        "#,
    )
    .bind(unrestricted)
    .bind(own)
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(realm_from_row).collect())
}

pub async fn update_realm<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: RealmId,
    patch: &RealmPatch,
) -> Result<Realm, StorageError> {
    let name = patch.name.as_deref().map(str::trim);
    let row: Option<RealmRow> = sqlx::query_as(
        r#"
        UPDATE realms SET
            name = COALESCE($2, name),
            share_reports = COALESCE($3, share_reports)
        WHERE id = $1
        RETURNING id, name, share_reports
        "#,
    )
    .bind(id.value())
    .bind(name)
    .bind(patch.share_reports)
    .fetch_optional(executor)
    .await
    .map_err(|e| classify(e, &format!("realm {}", name.unwrap_or_default()), "realm"))?;
    row.map(realm_from_row)
        .ok_or_else(|| StorageError::NotFound(format!("realm {id}")))
}

type IdentityRow = (
    i64,
    String,
    String,
    i64,
    String,
    String,
    bool,
    bool,
    bool,
    Vec<String>,
);

const IDENTITY_COLUMNS: &str = "id, username, hashed_password, realm_id, first_name, last_name, \
     is_verified, is_admin, is_super_admin, stars";

fn identity_from_row(row: IdentityRow) -> Identity {
    let (id, username, hashed_password, realm_id, first_name, last_name, v, a, s, stars) = row;
    Identity {
        id: SubjectId::new(id),
        username,
        hashed_password,
        realm_id: RealmId::new(realm_id),
        first_name,
        last_name,
        roles: Roles {
            is_verified: v,
            is_admin: a,
            is_super_admin: s,
        },
        stars: stars.into_iter().map(TeamKey::new).collect(),
    }
}

pub async fn insert_identity<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    identity: &IdentityRecord,
) -> Result<Identity, StorageError> {
    let query = format!(
        r#"
        INSERT INTO users
            (username, hashed_password, realm_id, first_name, last_name,
             is_verified, is_admin, is_super_admin)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {IDENTITY_COLUMNS}
        "#
    );
    let row: IdentityRow = sqlx::query_as(&query)
        .bind(&identity.username)
        .bind(&identity.hashed_password)
        .bind(identity.realm_id.value())
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(identity.roles.is_verified)
        .bind(identity.roles.is_admin)
        .bind(identity.roles.is_super_admin)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            classify(
                e,
                &format!("username {}", identity.username),
                &format!("realm {}", identity.realm_id),
            )
        })?;
    Ok(identity_from_row(row))
}

pub async fn select_identity<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: SubjectId,
) -> Result<Identity, StorageError> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1");
    let row: Option<IdentityRow> = sqlx::query_as(&query)
        .bind(id.value())
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    row.map(identity_from_row)
        .ok_or_else(|| StorageError::NotFound(format!("identity {id}")))
}

pub async fn select_identity_by_username<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    username: &str,
) -> Result<Identity, StorageError> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE username = $1");
    let row: Option<IdentityRow> = sqlx::query_as(&query)
        .bind(username)
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    row.map(identity_from_row)
        .ok_or_else(|| StorageError::NotFound(format!("username {username}")))
}

pub async fn select_identities<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    scope: IdentityScope,
) -> Result<Vec<Identity>, StorageError> {
    let realm = match scope {
        IdentityScope::All => None,
        IdentityScope::Realm(realm) => Some(realm.value()),
    };
    let query = format!(
        "SELECT {IDENTITY_COLUMNS} FROM users WHERE $1::BIGINT IS NULL OR realm_id = $1 ORDER BY id"
    );
    let rows: Vec<IdentityRow> = sqlx::query_as(&query)
        .bind(realm)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(identity_from_row).collect())
}

pub async fn update_identity<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: SubjectId,
    update: &IdentityUpdate,
) -> Result<Identity, StorageError> {
    let query = format!(
        r#"
        UPDATE users SET
            username = COALESCE($2, username),
            hashed_password = COALESCE($3, hashed_password),
            first_name = COALESCE($4, first_name),
            last_name = COALESCE($5, last_name),
            is_verified = COALESCE($6, is_verified),
            is_admin = COALESCE($7, is_admin),
            is_super_admin = COALESCE($8, is_super_admin),
            stars = COALESCE($9, stars)
        WHERE id = $1
        RETURNING {IDENTITY_COLUMNS}
        "#
    );
    let stars: Option<Vec<String>> = update
        .stars
        .as_ref()
        .map(|s| s.iter().map(|t| t.as_str().to_string()).collect());
    let row: Option<IdentityRow> = sqlx::query_as(&query)
        .bind(id.value())
        .bind(update.username.as_deref())
        .bind(update.hashed_password.as_deref())
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.roles.map(|r| r.is_verified))
        .bind(update.roles.map(|r| r.is_admin))
        .bind(update.roles.map(|r| r.is_super_admin))
        .bind(stars)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            classify(
                e,
                &format!("username {}", update.username.as_deref().unwrap_or_default()),
                "realm",
            )
        })?;
    row.map(identity_from_row)
        .ok_or_else(|| StorageError::NotFound(format!("identity {id}")))
}

pub async fn delete_identity<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: SubjectId,
) -> Result<(), StorageError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id.value())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound(format!("identity {id}")));
    }
    Ok(())
}

pub async fn upsert_match_row<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    event: &EventKey,
    match_key: &MatchKey,
) -> Result<UpsertOutcome, StorageError> {
    let (created,): (bool,) = sqlx::query_as(
        r#"
        INSERT INTO matches (key, event_key) VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET event_key = EXCLUDED.event_key
        RETURNING (xmax = 0) AS created
        "#,
    )
    .bind(match_key.as_str())
    .bind(event.as_str())
    .fetch_one(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(UpsertOutcome::from_created(created))
}

pub async fn upsert_alliance<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    alliance: &AllianceEntry,
) -> Result<UpsertOutcome, StorageError> {
    let teams: Vec<&str> = alliance.team_keys.iter().map(TeamKey::as_str).collect();
    let (created,): (bool,) = sqlx::query_as(
        r#"
        INSERT INTO alliances (match_key, is_blue, team_keys) VALUES ($1, $2, $3)
        ON CONFLICT (match_key, is_blue) DO UPDATE SET team_keys = EXCLUDED.team_keys
        RETURNING (xmax = 0) AS created
        "#,
    )
    .bind(alliance.match_key.as_str())
    .bind(alliance.is_blue)
    .bind(teams)
    .fetch_one(executor)
    .await
    .map_err(|e| classify(e, "alliance", &format!("match {}", alliance.match_key)))?;
    Ok(UpsertOutcome::from_created(created))
}

pub async fn match_exists<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    event: &EventKey,
    match_key: &MatchKey,
) -> Result<bool, StorageError> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM matches WHERE key = $1 AND event_key = $2)")
            .bind(match_key.as_str())
            .bind(event.as_str())
            .fetch_one(executor)
            .await
            .map_err(to_storage_error)?;
    Ok(exists)
}

pub async fn select_alliances<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    match_key: &MatchKey,
) -> Result<Vec<AllianceEntry>, StorageError> {
    let rows: Vec<(String, bool, Vec<String>)> = sqlx::query_as(
        "SELECT match_key, is_blue, team_keys FROM alliances WHERE match_key = $1 ORDER BY is_blue",
    )
    .bind(match_key.as_str())
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(rows
        .into_iter()
        .map(|(match_key, is_blue, teams)| AllianceEntry {
            match_key: MatchKey::new(match_key),
            is_blue,
            team_keys: teams.into_iter().map(TeamKey::new).collect(),
        })
        .collect())
}

pub async fn upsert_comment<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    comment: &Comment,
) -> Result<UpsertOutcome, StorageError> {
    let (created,): (bool,) = sqlx::query_as(
        r#"
        INSERT INTO comments (match_key, team_key, reporter_id, realm_id, comment)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (match_key, team_key, reporter_id)
        DO UPDATE SET comment = EXCLUDED.comment
        RETURNING (xmax = 0) AS created
        "#,
    )
    .bind(comment.match_key.as_str())
    .bind(comment.team_key.as_str())
    .bind(comment.reporter_id.map(|r| r.value()))
    .bind(comment.realm_id.map(|r| r.value()))
    .bind(&comment.comment)
    .fetch_one(executor)
    .await
    .map_err(|e| classify(e, "comment", &format!("match {}", comment.match_key)))?;
    Ok(UpsertOutcome::from_created(created))
}

pub async fn upsert_report<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    report: &Report,
) -> Result<UpsertOutcome, StorageError> {
    let (created,): (bool,) = sqlx::query_as(
        r#"
        INSERT INTO reports (match_key, team_key, reporter_id, realm_id, auto_name, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (match_key, team_key, reporter_id)
        DO UPDATE SET auto_name = EXCLUDED.auto_name, data = EXCLUDED.data
        RETURNING (xmax = 0) AS created
        "#,
    )
    .bind(report.match_key.as_str())
    .bind(report.team_key.as_str())
    .bind(report.reporter_id.map(|r| r.value()))
    .bind(report.realm_id.map(|r| r.value()))
    .bind(&report.auto_name)
    .bind(Json(&report.data))
    .fetch_one(executor)
    .await
    .map_err(|e| classify(e, "report", &format!("match {}", report.match_key)))?;
    Ok(UpsertOutcome::from_created(created))
}

type CommentRow = (String, String, String, Option<i64>, Option<i64>, String);

pub async fn select_comments<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    query: &RecordQuery,
    filter: &RealmFilter,
) -> Result<Vec<Comment>, StorageError> {
    let (unrestricted, own) = realm_binds(filter);
    let rows: Vec<CommentRow> = sqlx::query_as(
        r#"
        SELECT m.event_key, c.match_key, c.team_key, c.reporter_id, c.realm_id, c.comment
        FROM comments c
        JOIN matches m ON m.key = c.match_key
        LEFT JOIN realms r ON r.id = c.realm_id
        WHERE m.event_key = $1
          AND ($2::TEXT IS NULL OR c.match_key = $2)
          AND ($3::TEXT IS NULL OR c.team_key = $3)
          AND (c.realm_id IS NULL OR $4 OR r.share_reports OR c.realm_id = $5::BIGINT)
        ORDER BY c.match_key, c.team_key, c.reporter_id
        "#,
    )
    .bind(query.event_key.as_str())
    .bind(query.match_key.as_ref().map(MatchKey::as_str))
    .bind(query.team_key.as_ref().map(TeamKey::as_str))
    .bind(unrestricted)
    .bind(own)
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(rows
        .into_iter()
        .map(|(event, match_key, team, reporter, realm, comment)| Comment {
            event_key: EventKey::new(event),
            match_key: MatchKey::new(match_key),
            team_key: TeamKey::new(team),
            reporter_id: reporter.map(SubjectId::new),
            realm_id: realm.map(RealmId::new),
            comment,
        })
        .collect())
}

type ReportRow = (
    String,
    String,
    String,
    Option<i64>,
    Option<i64>,
    String,
    Json<ReportData>,
);

pub async fn select_reports<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    query: &RecordQuery,
    filter: &RealmFilter,
) -> Result<Vec<Report>, StorageError> {
    let (unrestricted, own) = realm_binds(filter);
    let rows: Vec<ReportRow> = sqlx::query_as(
        r#"
        SELECT m.event_key, p.match_key, p.team_key, p.reporter_id, p.realm_id,
               p.auto_name, p.data
        FROM reports p
        JOIN matches m ON m.key = p.match_key
        LEFT JOIN realms r ON r.id = p.realm_id
        WHERE m.event_key = $1
          AND ($2::TEXT IS NULL OR p.match_key = $2)
          AND ($3::TEXT IS NULL OR p.team_key = $3)
          AND (p.realm_id IS NULL OR $4 OR r.share_reports OR p.realm_id = $5::BIGINT)
        ORDER BY p.match_key, p.team_key, p.reporter_id
        "#,
    )
    .bind(query.event_key.as_str())
    .bind(query.match_key.as_ref().map(MatchKey::as_str))
    .bind(query.team_key.as_ref().map(TeamKey::as_str))
    .bind(unrestricted)
    .bind(own)
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(rows
        .into_iter()
        .map(
            |(event, match_key, team, reporter, realm, auto_name, Json(data))| Report {
                event_key: EventKey::new(event),
                match_key: MatchKey::new(match_key),
                team_key: TeamKey::new(team),
                reporter_id: reporter.map(SubjectId::new),
                realm_id: realm.map(RealmId::new),
                auto_name,
                data,
            },
        )
        .collect())
}

type SchemaRow = (
    i64,
    Option<i32>,
    Option<i64>,
    Json<Vec<StatDescription>>,
    Json<Vec<StatDescription>>,
);

fn schema_from_row((id, year, realm_id, Json(auto), Json(teleop)): SchemaRow) -> Schema {
    Schema {
        id: SchemaId::new(id),
        year,
        realm_id: realm_id.map(RealmId::new),
        auto,
        teleop,
    }
}

pub async fn insert_schema<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    scope: SchemaScope,
    schema: &NewSchema,
) -> Result<Schema, StorageError> {
    let conflict = match scope {
        SchemaScope::Standard { year } => format!("standard schema for {year}"),
        SchemaScope::Realm { realm_id, .. } => format!("schema for realm {realm_id}"),
    };
    let row: SchemaRow = sqlx::query_as(
        r#"
        INSERT INTO schemas (year, realm_id, auto, teleop) VALUES ($1, $2, $3, $4)
        RETURNING id, year, realm_id, auto, teleop
        "#,
    )
    .bind(scope.year())
    .bind(scope.realm_id().map(|r| r.value()))
    .bind(Json(&schema.auto))
    .bind(Json(&schema.teleop))
    .fetch_one(executor)
    .await
    .map_err(|e| classify(e, &conflict, "realm"))?;
    Ok(schema_from_row(row))
}

pub async fn select_schema<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: SchemaId,
    filter: &RealmFilter,
) -> Result<Schema, StorageError> {
    let (unrestricted, own) = realm_binds(filter);
    let row: Option<SchemaRow> = sqlx::query_as(
        r#"
        SELECT s.id, s.year, s.realm_id, s.auto, s.teleop
        FROM schemas s
        LEFT JOIN realms r ON r.id = s.realm_id
        WHERE s.id = $1
          AND (s.realm_id IS NULL OR $2 OR r.share_reports OR s.realm_id = $3::BIGINT)
        "#,
    )
    .bind(id.value())
    .bind(unrestricted)
    .bind(own)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;
    row.map(schema_from_row)
        .ok_or_else(|| StorageError::NotFound(format!("schema {id}")))
}

pub async fn select_standard_schema<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    year: i32,
) -> Result<Schema, StorageError> {
    let row: Option<SchemaRow> = sqlx::query_as(
        "SELECT id, year, realm_id, auto, teleop FROM schemas WHERE year = $1 AND realm_id IS NULL",
    )
    .bind(year)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;
    row.map(schema_from_row)
        .ok_or_else(|| StorageError::NotFound(format!("standard schema for {year}")))
}

pub async fn select_visible_schemas<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    filter: &RealmFilter,
) -> Result<Vec<Schema>, StorageError> {
    let (unrestricted, own) = realm_binds(filter);
    let rows: Vec<SchemaRow> = sqlx::query_as(
        r#"
        SELECT s.id, s.year, s.realm_id, s.auto, s.teleop
        FROM schemas s
        LEFT JOIN realms r ON r.id = s.realm_id
        WHERE s.realm_id IS NULL OR $1 OR r.share_reports OR s.realm_id = $2::BIGINT
        ORDER BY s.id
        "#,
    )
    .bind(unrestricted)
    .bind(own)
    .fetch_all(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(schema_from_row).collect())
}
