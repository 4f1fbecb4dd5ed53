// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;

use crate::{
    auth::Auth,
    models::{Envelope, MeResponse},
};

#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The authenticated caller", body = Envelope<MeResponse>),
        (status = 401, description = "Missing, invalid, expired or revoked token")
    )
)]
pub async fn me(Auth(user): Auth) -> Json<Envelope<MeResponse>> {
    Json(Envelope::success(
        "ok",
        MeResponse {
            ok: true,
            user_id: user.user_id,
        },
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};

    use crate::testing::{bearer, get, TestApp};

    #[tokio::test]
    async fn me_returns_caller_id() {
        let app = TestApp::new();
        let user_id = app.register_verified("alice", "a@x.com", "password1").await;
        let access = app.access_token("a@x.com", "password1").await;

        let res = app.send(bearer(get("/api/v1/me"), &access)).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body["data"]["user_id"], user_id);
    }

    #[tokio::test]
    async fn me_rejects_missing_and_malformed_headers() {
        let app = TestApp::new();

        let res = app.send(get("/api/v1/me")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["message"], "authorization header required");

        let mut req = get("/api/v1/me");
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let res = app.send(req).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["status"], "error");

        let res = app.send(bearer(get("/api/v1/me"), "garbage")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["message"], "invalid token");
    }
}
