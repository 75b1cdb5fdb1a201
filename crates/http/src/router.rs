//! Router builder for the edge router

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    routing::any,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestId, RequestId, SetRequestIdLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::{Timestamp, Uuid};

use dashfeed_kernel::ModuleRegistry;

use crate::{error::AppError, openapi};

/// Headers attached to every response, static assets and errors included.
pub const SECURITY_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
];

/// Builder for constructing the main HTTP router.
///
/// Axum layers only wrap what is already in the router, so add routes and
/// the fallback first and middleware last; `with_security_headers` should be
/// the final layer so it also covers timeout and CORS responses.
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `/api/{module_name}`
    pub fn mount_module(mut self, module_name: &str, module_router: Router) -> Self {
        let api_path = format!("/api/{}", module_name);
        self.router = self.router.nest(&api_path, module_router);
        self
    }

    /// Answer unmatched `/api/*` paths with a JSON 404 instead of the
    /// static fallback
    pub fn with_api_not_found(mut self) -> Self {
        self.router = self.router.route("/api/{*path}", any(api_not_found));
        self
    }

    /// Serve files from `dir` for every path no route matched
    pub fn with_static_fallback(mut self, dir: &str) -> Self {
        self.router = self.router.fallback_service(ServeDir::new(dir));
        self
    }

    /// Serve the merged OpenAPI document and Swagger UI
    pub fn with_openapi(mut self, registry: &ModuleRegistry) -> Self {
        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .external_url_unchecked(openapi::DOCUMENT_PATH, openapi::collect(registry)),
        );
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Add CORS middleware
    pub fn with_cors(mut self) -> Self {
        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Add request ID middleware
    pub fn with_request_id(mut self) -> Self {
        self.router = self
            .router
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7));
        self
    }

    /// Add timeout middleware. Requests still running after `timeout_ms`
    /// are cut off with 504.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self.router.layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            Duration::from_millis(timeout_ms),
        ));
        self
    }

    /// Attach `SECURITY_HEADERS` to every response
    pub fn with_security_headers(mut self) -> Self {
        for (name, value) in SECURITY_HEADERS {
            self.router = self.router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ));
        }
        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn api_not_found() -> AppError {
    AppError::not_found("No such API endpoint")
}

/// Time-ordered request ids
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get};
    use tower::ServiceExt;

    fn assert_security_headers(response: &axum::response::Response) {
        for (name, value) in SECURITY_HEADERS {
            assert_eq!(
                response.headers().get(&name).and_then(|v| v.to_str().ok()),
                Some(value),
                "missing {name}"
            );
        }
    }

    #[tokio::test]
    async fn module_routes_are_nested_under_api() {
        let module_router = Router::new().route("/quotes", get(|| async { "quotes" }));

        let router = RouterBuilder::new()
            .mount_module("finance", module_router)
            .build();

        let response = router
            .oneshot(
                Request::get("/api/finance/quotes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn security_headers_cover_routes_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>tools</h1>").unwrap();

        let router = RouterBuilder::new()
            .route("/healthz", get(|| async { "ok" }))
            .with_static_fallback(dir.path().to_str().unwrap())
            .with_request_id()
            .with_security_headers()
            .build();

        for (path, status) in [
            ("/healthz", StatusCode::OK),
            ("/index.html", StatusCode::OK),
            ("/missing.png", StatusCode::NOT_FOUND),
        ] {
            let response = router
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), status, "{path}");
            assert_security_headers(&response);
            assert!(response.headers().contains_key("x-request-id"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_route_is_cut_off_with_gateway_timeout() {
        let router = RouterBuilder::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    "late"
                }),
            )
            .with_timeout(15_000)
            .with_security_headers()
            .build();

        let response = router
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_security_headers(&response);
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let module_router = Router::new().route("/quotes", get(|| async { "quotes" }));

        let router = RouterBuilder::new()
            .mount_module("finance", module_router)
            .with_api_not_found()
            .with_static_fallback(dir.path().to_str().unwrap())
            .with_security_headers()
            .build();

        let known = router
            .clone()
            .oneshot(Request::get("/api/finance/quotes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(known.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/api/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_security_headers(&response);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "No such API endpoint");
    }
}
