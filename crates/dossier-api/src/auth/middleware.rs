use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dossier_core::{AppError, UserIdentity};
use std::sync::Arc;

/// Turns a bearer token into a verified identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserIdentity, AppError>;
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Requires a valid bearer token and stores the caller as [`AuthUser`].
pub async fn auth_middleware(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        tracing::debug!(path = %request.uri().path(), "Missing bearer token");
        return HttpAppError(AppError::Unauthorized(
            "Missing or malformed Authorization header".to_string(),
        ))
        .into_response();
    };

    let identity = match verifier.verify(token).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(path = %request.uri().path(), error = %e, "Token rejected");
            return HttpAppError(e).into_response();
        }
    };

    tracing::debug!(username = %identity.preferred_username, "Authenticated request");
    request.extensions_mut().insert(AuthUser(identity));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    struct OneToken;

    #[async_trait]
    impl TokenVerifier for OneToken {
        async fn verify(&self, token: &str) -> Result<UserIdentity, AppError> {
            if token != "good" {
                return Err(AppError::Unauthorized("Invalid or expired token".to_string()));
            }
            Ok(UserIdentity {
                given_name: "Ana".to_string(),
                family_name: "Ruiz".to_string(),
                preferred_username: "aruiz".to_string(),
                email: "ana.ruiz@example.edu".to_string(),
            })
        }
    }

    fn app() -> Router {
        let verifier: Arc<dyn TokenVerifier> = Arc::new(OneToken);
        Router::new()
            .route(
                "/",
                get(|AuthUser(user): AuthUser| async move { user.folder_key().to_string() }),
            )
            .layer(axum::middleware::from_fn_with_state(verifier, auth_middleware))
    }

    async fn call(authorization: Option<&str>) -> Response {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let response = call(Some("Bearer good")).await;
        assert_eq!(response.status(), 200);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Ruiz_Ana_aruiz");
    }

    #[tokio::test]
    async fn missing_or_bad_tokens_are_rejected() {
        assert_eq!(call(None).await.status(), 401);
        assert_eq!(call(Some("Basic good")).await.status(), 401);
        assert_eq!(call(Some("Bearer ")).await.status(), 401);
        assert_eq!(call(Some("Bearer bad")).await.status(), 401);
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let request = Request::builder()
            .header(AUTHORIZATION, "bearer abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc"));
    }
}
