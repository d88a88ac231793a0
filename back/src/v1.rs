use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::de::DeserializeOwned;
use todo_api::v1::{TodoCreate, TodoItem, TodoPatch};
use tracing::info;

use crate::{error::ApiError, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/todos", get(get_all_todos).post(add_todo))
        .route(
            "/todos/:id",
            get(get_todo).patch(patch_todo).delete(delete_todo),
        )
}

/// Decodes a JSON request body.
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::BadRequest)
}

async fn add_todo(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<TodoItem>), ApiError> {
    let create: TodoCreate = decode(&body)?;
    let todo = state.store.add_todo(create).await?;

    info!(id = todo.id, title = %todo.title, "created todo");

    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_all_todos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TodoItem>>, ApiError> {
    Ok(Json(state.store.get_all_todos().await?))
}

async fn get_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TodoItem>, ApiError> {
    Ok(Json(state.store.get_todo(&id).await?))
}

async fn patch_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<TodoItem>, ApiError> {
    let patch: TodoPatch = decode(&body)?;
    let todo = state.store.patch_todo(&id, patch).await?;

    info!(
        id = todo.id,
        title = ?todo.title,
        "updated todo"
    );

    Ok(Json(todo))
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_todo(&id).await?;

    info!(%id, "deleted todo");

    Ok(StatusCode::NO_CONTENT)
}
