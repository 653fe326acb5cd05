use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fieldscout_core::{AuthContext, extract};

use crate::token::TokenVerifier;

/// The request's caller. `None` is an anonymous request, which is legal for
/// sign-up, login and reads of shared data.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<AuthContext>);

impl Caller {
    pub fn context(&self) -> Option<&AuthContext> {
        self.0.as_ref()
    }
}

#[derive(Clone)]
pub struct AuthState {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthState {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

fn skip_auth(path: &str) -> bool {
    matches!(path, "/healthz" | "/metrics")
}

/// Resolves the bearer token into a [`Caller`] extension. A missing header
/// means anonymous; a header that is present but unusable is a 401, never a
/// silent downgrade to anonymous.
pub async fn rest_auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if skip_auth(request.uri().path()) {
        return next.run(request).await;
    }

    let header = request.headers().get(AUTHORIZATION).map(|value| {
        value
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
    });

    let token = match header {
        None => {
            request.extensions_mut().insert(Caller(None));
            return next.run(request).await;
        }
        Some(None) => {
            return error_json(StatusCode::UNAUTHORIZED, "invalid authorization format");
        }
        Some(Some(token)) => token,
    };

    let payload = match auth_state.verifier.verify(&token) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(target: "audit", event = "auth_failure", reason = %e, "token rejected");
            return error_json(StatusCode::UNAUTHORIZED, "invalid token");
        }
    };

    match extract(&payload) {
        Ok(ctx) => {
            request.extensions_mut().insert(Caller(Some(ctx)));
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(target: "audit", event = "auth_failure", reason = %e, "token claims rejected");
            error_json(StatusCode::UNAUTHORIZED, "invalid token claims")
        }
    }
}

pub(crate) fn error_json(status: StatusCode, msg: &str) -> Response {
    let body = serde_json::json!({"error": msg});
    (status, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{DEFAULT_TTL_SECS, Hs256Verifier, TokenIssuer};
    use axum::Router;
    use axum::http::HeaderValue;
    use axum::middleware;
    use axum::routing::get;
    use axum_test::TestServer;
    use fieldscout_core::{RealmId, Roles, SubjectId};
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn make_server() -> TestServer {
        let auth = AuthState::new(Arc::new(Hs256Verifier::new(SECRET)));
        let app = Router::new()
            .route(
                "/whoami",
                get(|axum::Extension(caller): axum::Extension<Caller>| async move {
                    match caller.context() {
                        Some(ctx) => axum::Json(json!({
                            "subject": ctx.subject.value(),
                            "realm": ctx.realm.value(),
                        })),
                        None => axum::Json(json!({"subject": null})),
                    }
                }),
            )
            .route(
                "/healthz",
                get(|| async { axum::Json(json!({"status": "ok"})) }),
            )
            .layer(middleware::from_fn_with_state(
                auth.clone(),
                rest_auth_middleware,
            ))
            .with_state(auth);
        TestServer::new(app).unwrap()
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let server = make_server();

        let response = server.get("/whoami").await;

        response.assert_status_ok();
        response.assert_json(&json!({"subject": null}));
    }

    #[tokio::test]
    async fn valid_token_yields_context() {
        let server = make_server();
        let ctx = AuthContext::new(SubjectId::new(9), RealmId::new(3), Roles::NONE);
        let token = TokenIssuer::new(SECRET, DEFAULT_TTL_SECS)
            .issue(&ctx)
            .unwrap();

        let response = server
            .get("/whoami")
            .add_header(AUTHORIZATION, bearer(&token))
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({"subject": 9, "realm": 3}));
    }

    #[tokio::test]
    async fn non_bearer_header_returns_401() {
        let server = make_server();

        let response = server
            .get("/whoami")
            .add_header(AUTHORIZATION, HeaderValue::from_static("Basic c2NvdXQ6cHc="))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_returns_401_not_anonymous() {
        let server = make_server();

        let response = server
            .get("/whoami")
            .add_header(AUTHORIZATION, bearer("not.a.jwt"))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid token");
    }

    #[tokio::test]
    async fn signed_token_without_realm_returns_401() {
        let server = make_server();
        let now = jsonwebtoken::get_current_timestamp();
        let token = jsonwebtoken::encode(
            &Header::default(),
            &json!({"sub": "9", "roles": {"isSuperAdmin": true}, "exp": now + 60}),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let response = server
            .get("/whoami")
            .add_header(AUTHORIZATION, bearer(&token))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid token claims");
    }

    #[tokio::test]
    async fn healthz_skips_auth() {
        let server = make_server();

        let response = server
            .get("/healthz")
            .add_header(AUTHORIZATION, bearer("not.a.jwt"))
            .await;

        response.assert_status_ok();
    }
}
