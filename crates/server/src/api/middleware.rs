//! Caller resolution, manager authentication, and metrics middleware.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use reelgate_core::{AuthError, Caller, Identity, ManagementCredentials};

use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Resolves the caller from the `Authorization` header.
///
/// Management credentials are presented as `Authorization: Token id:secret`.
/// Nothing is verified here; the caller is carried as presented and checked
/// where it matters (manager middleware, token issuance, streaming gate).
pub async fn caller_middleware(mut request: Request<Body>, next: Next) -> Response {
    let caller = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Token "))
        .and_then(ManagementCredentials::parse)
        .map(Caller::Manager)
        .unwrap_or(Caller::Anonymous);

    request.extensions_mut().insert(caller);
    next.run(request).await
}

/// Authenticates management routes against the document system.
///
/// Verified requests carry the manager's [`Identity`] in extensions. Without
/// a configured document API the deployment is single-operator: management
/// stays open and requests proceed without an identity.
pub async fn manager_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(oracle) = state.oracle() else {
        return Ok(next.run(request).await);
    };

    let caller = request
        .extensions()
        .get::<Caller>()
        .cloned()
        .unwrap_or(Caller::Anonymous);

    let Some(credentials) = caller.credentials() else {
        AUTH_FAILURES_TOTAL
            .with_label_values(&["missing_credentials"])
            .inc();
        return Err(StatusCode::UNAUTHORIZED);
    };

    match oracle.verify_manager(credentials).await {
        Ok(identity) => {
            debug!(
                "manager verified: user_id={}, email={}",
                identity.user_id, identity.email
            );
            let mut request = request;
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(AuthError::ServiceUnavailable(reason)) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["oracle_unavailable"])
                .inc();
            debug!("manager verification unavailable: {}", reason);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Err(_) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["invalid_credentials"])
                .inc();
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Extractor for the request's caller.
///
/// Falls back to anonymous if the caller middleware did not run.
#[derive(Debug, Clone)]
pub struct AuthCaller(pub Caller);

impl<S> FromRequestParts<S> for AuthCaller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let caller = parts
            .extensions
            .get::<Caller>()
            .cloned()
            .unwrap_or(Caller::Anonymous);
        std::future::ready(Ok(AuthCaller(caller)))
    }
}

/// Extractor for the verified manager's email, used for attribution fields.
///
/// Falls back to "anonymous" when no identity was verified (open deployments
/// without a document API).
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user = parts
            .extensions
            .get::<Identity>()
            .map(|identity| identity.email.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
        middleware,
        routing::get,
        Extension, Router,
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use reelgate_core::testing::{fixtures, MemoryBlobStore, MockEncoder, MockOracle};
    use reelgate_core::{
        create_signer, BlobStore, Encoder, JobRunner, JobScheduler, MediaStore, PermissionOracle,
        SqliteMediaStore, StreamingGate, SystemClock, TokenIssuer,
    };

    async fn caller_handler(Extension(caller): Extension<Caller>) -> &'static str {
        match caller {
            Caller::Anonymous => "anonymous",
            Caller::Manager(_) => "manager",
        }
    }

    async fn user_handler(AuthUser(user): AuthUser) -> String {
        user
    }

    fn test_state(oracle: Option<MockOracle>) -> Arc<AppState> {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        // Leak the temp_dir to keep the database around
        std::mem::forget(temp_dir);

        let config = reelgate_core::load_config_from_str(
            r#"
[auth]
signing_key = "middleware-test-key"
"#,
        )
        .unwrap();

        let store: Arc<dyn MediaStore> = Arc::new(SqliteMediaStore::new(&db_path).unwrap());
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
        let encoder: Arc<dyn Encoder> = Arc::new(MockEncoder::new());
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store),
            Arc::clone(&blobs),
            encoder,
            config.encoder.clone(),
            config.pipeline.clone(),
        ));
        let scheduler = Arc::new(JobScheduler::new(
            config.pipeline.clone(),
            Arc::clone(&store),
            runner,
        ));

        let signer = create_signer(&config.auth, Arc::new(SystemClock)).unwrap();
        let oracle: Option<Arc<dyn PermissionOracle>> =
            oracle.map(|o| Arc::new(o) as Arc<dyn PermissionOracle>);
        let issuer = TokenIssuer::new(signer.clone(), oracle.clone());
        let gate = StreamingGate::new(signer, oracle.clone());

        Arc::new(AppState::new(
            config, store, blobs, scheduler, issuer, gate, oracle,
        ))
    }

    fn managed_app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/test", get(user_handler))
            .route_layer(middleware::from_fn_with_state(
                state,
                manager_auth_middleware,
            ))
            .layer(middleware::from_fn(caller_middleware))
    }

    #[tokio::test]
    async fn test_caller_middleware_parses_token_header() {
        let app = Router::new()
            .route("/test", get(caller_handler))
            .layer(middleware::from_fn(caller_middleware));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Token svc-token:svc-secret")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"manager");
    }

    #[tokio::test]
    async fn test_caller_middleware_malformed_header_is_anonymous() {
        let app = Router::new()
            .route("/test", get(caller_handler))
            .layer(middleware::from_fn(caller_middleware));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Bearer whatever")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"anonymous");
    }

    #[tokio::test]
    async fn test_manager_auth_open_without_oracle() {
        let app = managed_app(test_state(None));

        let request = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"anonymous");
    }

    #[tokio::test]
    async fn test_manager_auth_rejects_anonymous() {
        let oracle = MockOracle::new();
        let app = managed_app(test_state(Some(oracle)));

        let request = Request::builder()
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_manager_auth_accepts_registered_manager() {
        let oracle = MockOracle::new();
        oracle
            .register_manager(&fixtures::manager_credentials(), fixtures::admin_identity())
            .await;
        let app = managed_app(test_state(Some(oracle)));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Token svc-token:svc-secret")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"admin@example.com");
    }

    #[tokio::test]
    async fn test_manager_auth_rejects_bad_secret() {
        let oracle = MockOracle::new();
        oracle
            .register_manager(&fixtures::manager_credentials(), fixtures::admin_identity())
            .await;
        let app = managed_app(test_state(Some(oracle)));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Token svc-token:wrong-secret")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_manager_auth_oracle_outage_maps_to_503() {
        let oracle = MockOracle::new();
        oracle
            .set_next_error(AuthError::ServiceUnavailable("connect refused".to_string()))
            .await;
        let app = managed_app(test_state(Some(oracle)));

        let request = Request::builder()
            .uri("/test")
            .header(header::AUTHORIZATION, "Token svc-token:svc-secret")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
