//! `/v1/users` handlers.

use super::{json_body, path_id, query, ErrorBody};
use crate::{
    model::{CreateUser, Page, PageRequest, UpdateUser, User, UserFilter},
    service::Services,
    Result,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Json, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
};

#[utoipa::path(
    get,
    path = "/v1/users",
    params(UserFilter, PageRequest),
    responses(
        (status = 200, description = "Matching users ordered by id", body = Page<User>),
        (status = 400, description = "Invalid filter or page window", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn list(
    services: Extension<Services>,
    filter: std::result::Result<Query<UserFilter>, QueryRejection>,
    page: std::result::Result<Query<PageRequest>, QueryRejection>,
) -> Result<Json<Page<User>>> {
    let page = services.users.list(query(filter)?, query(page)?).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email taken or organization missing", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn create(
    services: Extension<Services>,
    payload: std::result::Result<Json<CreateUser>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let user = services.users.create(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn get(
    services: Extension<Services>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<User>> {
    let user = services.users.get(path_id(id)?).await?;
    Ok(Json(user))
}

#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid or empty patch", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Email taken or organization missing", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn update(
    services: Extension<Services>,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Json<User>> {
    let id = path_id(id)?;
    let user = services.users.update(id, json_body(payload)?).await?;
    Ok(Json(user))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn delete(
    services: Extension<Services>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<StatusCode> {
    services.users.delete(path_id(id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
