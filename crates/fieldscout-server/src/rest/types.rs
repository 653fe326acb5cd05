use fieldscout_core::records::{Comment, Report, ReportData};
use fieldscout_core::schema::NewSchema;
use fieldscout_core::{EventKey, RealmId, SubjectId, TeamKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    pub jwt: String,
}

/// `realmId` present means a realm-private schema; absent means the
/// standard schema for `year`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchemaRequest {
    #[serde(default)]
    pub realm_id: Option<RealmId>,
    #[serde(flatten)]
    pub schema: NewSchema,
}

#[derive(Debug, Deserialize)]
pub struct MatchRosterRequest {
    pub red: Vec<TeamKey>,
    pub blue: Vec<TeamKey>,
}

/// Records are addressed by event in the URL, so responses carry the
/// event-local match key (`qm1`) rather than the global one.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub event_key: EventKey,
    pub match_key: String,
    pub team_key: TeamKey,
    pub reporter_id: Option<SubjectId>,
    pub comment: String,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            match_key: comment.match_key.partial().to_string(),
            event_key: comment.event_key,
            team_key: comment.team_key,
            reporter_id: comment.reporter_id,
            comment: comment.comment,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub event_key: EventKey,
    pub match_key: String,
    pub team_key: TeamKey,
    pub reporter_id: Option<SubjectId>,
    pub auto_name: String,
    pub data: ReportData,
}

impl From<Report> for ReportView {
    fn from(report: Report) -> Self {
        Self {
            match_key: report.match_key.partial().to_string(),
            event_key: report.event_key,
            team_key: report.team_key,
            reporter_id: report.reporter_id,
            auto_name: report.auto_name,
            data: report.data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
