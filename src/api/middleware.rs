//! Request plumbing shared by every route
//!
//! - CORS: origin `*` when the gateway is open, else the configured wallet
//!   origin; `OPTIONS` is answered here and never reaches the router
//! - extractors that turn framework rejections into `VALIDATION_ERROR`
//! - fallbacks and the panic handler, all rendering `GatewayError` bodies

use crate::config::{GatewayConfig, DEFAULT_ORIGIN};
use crate::error::GatewayError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request, State,
    },
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;

const ALLOW_METHODS: &str = "GET, PUT, POST, DELETE";
const ALLOW_HEADERS: &str = "Content-Type, Accept";

// =============================================================================
// CORS
// =============================================================================

/// Headers computed once from the mode gate at router construction
#[derive(Clone)]
pub struct CorsPolicy {
    origin: HeaderValue,
}

impl CorsPolicy {
    pub fn new(config: &GatewayConfig) -> Self {
        let origin = if config.mode.is_open() {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(config.origin.trim()).unwrap_or_else(|_| {
                log::warn!(
                    "Origin '{}' is not a valid header value, using {}",
                    config.origin,
                    DEFAULT_ORIGIN
                );
                HeaderValue::from_static(DEFAULT_ORIGIN)
            })
        };
        Self { origin }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
    }
}

pub async fn cors(State(policy): State<CorsPolicy>, req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::OK.into_response();
        policy.apply(resp.headers_mut());
        return resp;
    }
    let mut resp = next.run(req).await;
    policy.apply(resp.headers_mut());
    resp
}

// =============================================================================
// Fallbacks
// =============================================================================

pub async fn invalid_route(method: Method, uri: Uri) -> GatewayError {
    log::debug!("No route for {} {}", method, uri);
    GatewayError::InvalidRoute
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> GatewayError {
    log::debug!("Method {} not allowed on {}", method, uri);
    GatewayError::MethodNotAllowed
}

/// Used by `CatchPanicLayer`; the process keeps serving
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    log::error!("Handler panicked: {}", detail);
    GatewayError::Internal("request handler panicked".into()).into_response()
}

// =============================================================================
// Extractors
// =============================================================================

/// `Json` whose rejection is a `VALIDATION_ERROR` body
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(GatewayError::Validation(rejection.body_text())),
        }
    }
}

/// `Path` whose rejection is a `VALIDATION_ERROR` body
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(GatewayError::Validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayMode;
    use axum::{body::to_bytes, body::Body, routing::get, Router};
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    #[test]
    fn test_policy_origin() {
        let open = GatewayConfig {
            mode: GatewayMode {
                public_rest: false,
                non_local: true,
            },
            ..Default::default()
        };
        let mut headers = HeaderMap::new();
        CorsPolicy::new(&open).apply(&mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);

        let bad_origin = GatewayConfig {
            origin: "https://wallet\n.example".into(),
            ..Default::default()
        };
        let mut headers = HeaderMap::new();
        CorsPolicy::new(&bad_origin).apply(&mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], DEFAULT_ORIGIN);
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        async fn boom() -> &'static str {
            panic!("handler exploded")
        }
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/boom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert_eq!(body["status"], 500);
    }
}
