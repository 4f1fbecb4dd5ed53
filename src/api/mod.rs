// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::Request,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{debug_span, Span};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::middleware::require_auth,
    models::{
        CreateRepoRequest, CreatedRepoResponse, EmailRequest, LoggedOutResponse, LoginRequest,
        LoginResponse, MeResponse, OkResponse, RefreshRequest, RefreshResponse, RegisterRequest,
        RegisteredUser, ResetPasswordRequest, ResponseStatus, VerifiedResponse,
    },
    rate_limit::rate_limit,
    state::AppState,
    storage::{Repository, Visibility},
};

pub mod auth;
pub mod extract;
pub mod health;
pub mod me;
pub mod repos;

/// Prefix of every rate-limited API route.
pub const API_PREFIX: &str = "/api/v1";

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/verify", get(auth::verify))
        .route("/auth/resend-verification", post(auth::resend_verification))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/auth/request-password-reset",
            post(auth::request_password_reset),
        )
        .route("/auth/reset-password", post(auth::reset_password));

    let protected = Router::new()
        .route("/me", get(me::me))
        .route("/repos/create", post(repos::create_repo))
        .route("/repos", get(repos::list_repos))
        .route("/repos/{id}", get(repos::get_repo))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let v1_routes = public
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest(API_PREFIX, v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .layer(CorsLayer::permissive())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!(
        "http-request",
        method = %request.method(),
        path = request.uri().path(),
        request_id
    )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::verify,
        auth::resend_verification,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::request_password_reset,
        auth::reset_password,
        me::me,
        repos::create_repo,
        repos::list_repos,
        repos::get_repo,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ResponseStatus,
            RegisterRequest,
            LoginRequest,
            EmailRequest,
            RefreshRequest,
            ResetPasswordRequest,
            RegisteredUser,
            LoginResponse,
            RefreshResponse,
            VerifiedResponse,
            LoggedOutResponse,
            OkResponse,
            MeResponse,
            CreateRepoRequest,
            CreatedRepoResponse,
            Repository,
            Visibility,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, verification and sessions"),
        (name = "Repositories", description = "Bare repository management"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::testing::{get, TestApp};

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/auth/register",
            "/api/v1/auth/verify",
            "/api/v1/auth/resend-verification",
            "/api/v1/auth/login",
            "/api/v1/auth/refresh",
            "/api/v1/auth/logout",
            "/api/v1/auth/request-password-reset",
            "/api/v1/auth/reset-password",
            "/api/v1/me",
            "/api/v1/repos/create",
            "/api/v1/repos",
            "/api/v1/repos/{id}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = TestApp::new();
        let res = app.send(get("/health/live")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.headers.contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = TestApp::new();
        let res = app.send(get("/api-doc/openapi.json")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert!(res.body["paths"]["/api/v1/auth/login"].is_object());
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let app = TestApp::new();
        let res = app.send(get("/api/v1/nope")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
}
