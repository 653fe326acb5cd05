use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};

use fieldscout_core::identity::{Credentials, Identity, IdentityPatch, NewIdentity};
use fieldscout_core::realm::{NewRealm, Realm, RealmPatch};
use fieldscout_core::records::{AllianceEntry, Comment, MatchRoster, RecordQuery, Report};
use fieldscout_core::schema::Schema;
use fieldscout_core::{EventKey, MatchKey, RealmId, SchemaId, SubjectId, TeamKey, UpsertOutcome};
use fieldscout_storage::Store;

use crate::error::ApiError;
use crate::middleware::auth::Caller;

use super::AppState;
use super::types::*;

fn upsert_status(outcome: UpsertOutcome) -> StatusCode {
    match outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Updated => StatusCode::NO_CONTENT,
    }
}

fn observation_query(event: EventKey, partial: &str, team: TeamKey) -> RecordQuery {
    let match_key = MatchKey::for_event(&event, partial);
    RecordQuery::event(event).in_match(match_key).team(team)
}

pub async fn authenticate<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let jwt = state.service.authenticate(credentials).await?;
    Ok(Json(AuthenticateResponse { jwt }))
}

pub async fn create_realm<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Json(realm): Json<NewRealm>,
) -> Result<(StatusCode, Json<Realm>), ApiError> {
    let realm = state.service.create_realm(caller.context(), realm).await?;
    Ok((StatusCode::CREATED, Json(realm)))
}

pub async fn list_realms<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Realm>>, ApiError> {
    Ok(Json(state.service.list_realms(caller.context()).await?))
}

pub async fn patch_realm<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(patch): Json<RealmPatch>,
) -> Result<Json<Realm>, ApiError> {
    let realm = state
        .service
        .patch_realm(caller.context(), RealmId::new(id), patch)
        .await?;
    Ok(Json(realm))
}

pub async fn create_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Json(identity): Json<NewIdentity>,
) -> Result<(StatusCode, Json<Identity>), ApiError> {
    let identity = state
        .service
        .create_identity(caller.context(), identity)
        .await?;
    Ok((StatusCode::CREATED, Json(identity)))
}

pub async fn list_users<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Identity>>, ApiError> {
    Ok(Json(state.service.list_identities(caller.context()).await?))
}

pub async fn get_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<Identity>, ApiError> {
    let identity = state
        .service
        .get_identity(caller.context(), SubjectId::new(id))
        .await?;
    Ok(Json(identity))
}

pub async fn patch_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
    Json(patch): Json<IdentityPatch>,
) -> Result<Json<Identity>, ApiError> {
    let identity = state
        .service
        .patch_identity(caller.context(), SubjectId::new(id), patch)
        .await?;
    Ok(Json(identity))
}

pub async fn delete_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_identity(caller.context(), SubjectId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_match<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path((event, partial)): Path<(EventKey, String)>,
    Json(req): Json<MatchRosterRequest>,
) -> Result<StatusCode, ApiError> {
    let roster = MatchRoster {
        match_key: MatchKey::for_event(&event, &partial),
        event_key: event,
        red: req.red,
        blue: req.blue,
    };
    let outcome = state.service.put_match(caller.context(), roster).await?;
    Ok(upsert_status(outcome))
}

pub async fn alliances<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path((event, partial)): Path<(EventKey, String)>,
) -> Result<Json<Vec<AllianceEntry>>, ApiError> {
    let match_key = MatchKey::for_event(&event, &partial);
    Ok(Json(state.service.alliances(&event, &match_key).await?))
}

pub async fn put_comment<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path((event, partial, team)): Path<(EventKey, String, TeamKey)>,
    Json(comment): Json<Comment>,
) -> Result<StatusCode, ApiError> {
    let match_key = MatchKey::for_event(&event, &partial);
    let comment = comment.located(&event, &match_key, &team);
    let outcome = state.service.put_comment(caller.context(), comment).await?;
    Ok(upsert_status(outcome))
}

pub async fn match_team_comments<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path((event, partial, team)): Path<(EventKey, String, TeamKey)>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let query = observation_query(event, &partial, team);
    let comments = state.service.comments(caller.context(), &query).await?;
    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}

pub async fn team_comments<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path((event, team)): Path<(EventKey, TeamKey)>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let query = RecordQuery::event(event).team(team);
    let comments = state.service.comments(caller.context(), &query).await?;
    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}

pub async fn put_report<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path((event, partial, team)): Path<(EventKey, String, TeamKey)>,
    Json(report): Json<Report>,
) -> Result<StatusCode, ApiError> {
    let match_key = MatchKey::for_event(&event, &partial);
    let report = report.located(&event, &match_key, &team);
    let outcome = state.service.put_report(caller.context(), report).await?;
    Ok(upsert_status(outcome))
}

pub async fn match_team_reports<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path((event, partial, team)): Path<(EventKey, String, TeamKey)>,
) -> Result<Json<Vec<ReportView>>, ApiError> {
    let query = observation_query(event, &partial, team);
    let reports = state.service.reports(caller.context(), &query).await?;
    Ok(Json(reports.into_iter().map(ReportView::from).collect()))
}

pub async fn event_reports<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path(event): Path<EventKey>,
) -> Result<Json<Vec<ReportView>>, ApiError> {
    let query = RecordQuery::event(event);
    let reports = state.service.reports(caller.context(), &query).await?;
    Ok(Json(reports.into_iter().map(ReportView::from).collect()))
}

pub async fn team_reports<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path((event, team)): Path<(EventKey, TeamKey)>,
) -> Result<Json<Vec<ReportView>>, ApiError> {
    let query = RecordQuery::event(event).team(team);
    let reports = state.service.reports(caller.context(), &query).await?;
    Ok(Json(reports.into_iter().map(ReportView::from).collect()))
}

pub async fn create_schema<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateSchemaRequest>,
) -> Result<(StatusCode, Json<Schema>), ApiError> {
    let schema = state
        .service
        .create_schema(caller.context(), req.realm_id, req.schema)
        .await?;
    Ok((StatusCode::CREATED, Json(schema)))
}

pub async fn list_schemas<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Schema>>, ApiError> {
    Ok(Json(state.service.schemas(caller.context()).await?))
}

pub async fn get_schema<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<i64>,
) -> Result<Json<Schema>, ApiError> {
    let schema = state
        .service
        .get_schema(caller.context(), SchemaId::new(id))
        .await?;
    Ok(Json(schema))
}

pub async fn schema_for_year<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Path(year): Path<i32>,
) -> Result<Json<Schema>, ApiError> {
    Ok(Json(state.service.standard_schema(year).await?))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
