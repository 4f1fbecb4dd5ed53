// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use super::extract::ValidJson;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{CreateRepoRequest, CreatedRepoResponse, Envelope},
    repos::{validate_repo_name, ProvisionError},
    state::AppState,
    storage::{NewRepository, Repository, StoreError},
};

#[utoipa::path(
    post,
    path = "/api/v1/repos/create",
    request_body = CreateRepoRequest,
    tag = "Repositories",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Bare repository provisioned", body = Envelope<CreatedRepoResponse>),
        (status = 400, description = "Invalid or duplicate name"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_repo(
    State(state): State<AppState>,
    Auth(user): Auth,
    ValidJson(req): ValidJson<CreateRepoRequest>,
) -> Result<(StatusCode, Json<Envelope<CreatedRepoResponse>>), ApiError> {
    validate_repo_name(&req.name).map_err(ApiError::bad_request)?;

    if state
        .repositories
        .find_repository_by_name(user.user_id, &req.name)?
        .is_some()
    {
        return Err(ApiError::bad_request("repository already exists"));
    }

    let path = state
        .provisioner
        .provision(user.user_id, &req.name)
        .await
        .map_err(|e| match e {
            ProvisionError::AlreadyExists(_) => ApiError::bad_request("repository already exists"),
            other => ApiError::internal(other),
        })?;
    let path = path.to_string_lossy().into_owned();

    let created = state.repositories.create_repository(NewRepository {
        owner_id: user.user_id,
        name: req.name,
        description: req.description,
        visibility: req.visibility,
        path: path.clone(),
    });
    let repo = match created {
        Ok(repo) => repo,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&path).await {
                warn!(path = %path, error = %cleanup, "failed to remove orphaned repository");
            }
            return Err(match e {
                StoreError::Duplicate(_) => ApiError::bad_request("repository already exists"),
                other => ApiError::from(other),
            });
        }
    };
    info!(user_id = user.user_id, repo_id = repo.id, name = %repo.name, "repository created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success(
            "repository created",
            CreatedRepoResponse {
                id: repo.id,
                repo_name: repo.name,
                clone_url: repo.path,
            },
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/repos",
    tag = "Repositories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Repositories owned by the caller", body = Envelope<Vec<Repository>>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_repos(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<Envelope<Vec<Repository>>>, ApiError> {
    let repos = state.repositories.list_repositories(user.user_id)?;
    Ok(Json(Envelope::success("ok", repos)))
}

/// Private repositories of other users are reported as missing.
#[utoipa::path(
    get,
    path = "/api/v1/repos/{id}",
    params(
        ("id" = u64, Path, description = "Repository id")
    ),
    tag = "Repositories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Repository metadata", body = Envelope<Repository>),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Unknown or not visible to the caller")
    )
)]
pub async fn get_repo(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Repository>>, ApiError> {
    let not_found = || ApiError::not_found("repo not found");

    let id = id.parse::<u64>().map_err(|_| not_found())?;
    let repo = state
        .repositories
        .find_repository(id)?
        .filter(|repo| repo.is_visible_to(user.user_id))
        .ok_or_else(not_found)?;

    Ok(Json(Envelope::success("ok", repo)))
}
