//! `/v1/organizations` handlers.

use super::{json_body, path_id, query, DeleteParams, ErrorBody};
use crate::{
    model::{
        CreateOrganization, Organization, OrganizationFilter, Page, PageRequest,
        SetOrganizationStatus, UpdateOrganization,
    },
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
    path = "/v1/organizations",
    params(OrganizationFilter, PageRequest),
    responses(
        (status = 200, description = "Matching organizations ordered by id", body = Page<Organization>),
        (status = 400, description = "Invalid filter or page window", body = ErrorBody)
    ),
    tag = "organizations"
)]
pub async fn list(
    services: Extension<Services>,
    filter: std::result::Result<Query<OrganizationFilter>, QueryRejection>,
    page: std::result::Result<Query<PageRequest>, QueryRejection>,
) -> Result<Json<Page<Organization>>> {
    let page = services
        .organizations
        .list(query(filter)?, query(page)?)
        .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/v1/organizations",
    request_body = CreateOrganization,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Name or slug already taken", body = ErrorBody)
    ),
    tag = "organizations"
)]
pub async fn create(
    services: Extension<Services>,
    payload: std::result::Result<Json<CreateOrganization>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let org = services.organizations.create(json_body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

#[utoipa::path(
    get,
    path = "/v1/organizations/{id}",
    params(("id" = i64, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 404, description = "Organization not found", body = ErrorBody)
    ),
    tag = "organizations"
)]
pub async fn get(
    services: Extension<Services>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Organization>> {
    let org = services.organizations.get(path_id(id)?).await?;
    Ok(Json(org))
}

#[utoipa::path(
    patch,
    path = "/v1/organizations/{id}",
    params(("id" = i64, Path, description = "Organization id")),
    request_body = UpdateOrganization,
    responses(
        (status = 200, description = "Updated organization", body = Organization),
        (status = 400, description = "Invalid or empty patch", body = ErrorBody),
        (status = 404, description = "Organization not found", body = ErrorBody),
        (status = 409, description = "Name or slug already taken", body = ErrorBody)
    ),
    tag = "organizations"
)]
pub async fn update(
    services: Extension<Services>,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateOrganization>, JsonRejection>,
) -> Result<Json<Organization>> {
    let id = path_id(id)?;
    let org = services
        .organizations
        .update(id, json_body(payload)?)
        .await?;
    Ok(Json(org))
}

#[utoipa::path(
    put,
    path = "/v1/organizations/{id}/status",
    params(("id" = i64, Path, description = "Organization id")),
    request_body = SetOrganizationStatus,
    responses(
        (status = 200, description = "Updated organization", body = Organization),
        (status = 400, description = "Invalid status", body = ErrorBody),
        (status = 404, description = "Organization not found", body = ErrorBody)
    ),
    tag = "organizations"
)]
pub async fn set_status(
    services: Extension<Services>,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<SetOrganizationStatus>, JsonRejection>,
) -> Result<Json<Organization>> {
    let id = path_id(id)?;
    let SetOrganizationStatus { status } = json_body(payload)?;
    let org = services.organizations.set_status(id, status).await?;
    Ok(Json(org))
}

#[utoipa::path(
    delete,
    path = "/v1/organizations/{id}",
    params(("id" = i64, Path, description = "Organization id"), DeleteParams),
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 404, description = "Organization not found", body = ErrorBody),
        (status = 409, description = "Organization still has users", body = ErrorBody)
    ),
    tag = "organizations"
)]
pub async fn delete(
    services: Extension<Services>,
    id: std::result::Result<Path<i64>, PathRejection>,
    params: std::result::Result<Query<DeleteParams>, QueryRejection>,
) -> Result<StatusCode> {
    let id = path_id(id)?;
    let DeleteParams { cascade } = query(params)?;
    services.organizations.delete(id, cascade).await?;
    Ok(StatusCode::NO_CONTENT)
}
