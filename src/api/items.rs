//! Item CRUD endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::items::{CreateItem, Item, ItemPage, UpdateItem, ValidationError};
use crate::server::AppState;

const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

fn item_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    path.map(|Path(id)| id)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Item {} not found", id))
}

/// GET /api/v1/items/ - List items with offset pagination
#[tracing::instrument(name = "http.list_items", skip(state, query))]
pub async fn list_items(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ItemPage>> {
    let Query(query) = query.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    if query.skip < 0 {
        return Err(ValidationError::NegativeParameter("skip").into());
    }
    if query.limit < 0 {
        return Err(ValidationError::NegativeParameter("limit").into());
    }

    let page = state.items.list(query.skip, query.limit).await?;
    Ok(Json(page))
}

/// GET /api/v1/items/{id} - Get a specific item
#[tracing::instrument(name = "http.get_item", skip(state, path))]
pub async fn get_item(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Item>> {
    let id = item_id(path)?;

    state
        .items
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// POST /api/v1/items/ - Create a new item
#[tracing::instrument(name = "http.create_item", skip(state, body))]
pub async fn create_item(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateItem>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>)> {
    let Json(request) = body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    request.validate()?;

    let created = state.items.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/v1/items/{id} - Partially update an item
#[tracing::instrument(name = "http.update_item", skip(state, path, body))]
pub async fn update_item(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<UpdateItem>, JsonRejection>,
) -> Result<Json<Item>> {
    let id = item_id(path)?;
    let Json(changes) = body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;
    changes.validate()?;

    state
        .items
        .update(id, changes)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// DELETE /api/v1/items/{id} - Delete an item
#[tracing::instrument(name = "http.delete_item", skip(state, path))]
pub async fn delete_item(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<StatusCode> {
    let id = item_id(path)?;

    if state.items.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
