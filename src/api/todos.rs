//! Todo CRUD endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use crate::db::{CreateTodoRequest, Todo, TodoPatch};
use crate::AppState;

/// List todos, newest first
///
/// GET /api/todos
pub async fn list_todos(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Todo>>, ApiError> {
    let mut todos = state
        .db
        .todos()
        .list()
        .await
        .map_err(|e| ApiError::database("Failed to fetch todos", &e))?;

    todos.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(todos))
}

/// Create a todo
///
/// POST /api/todos
pub async fn create_todo(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.require("title", &req.title, "Title");
    errors.finish()?;

    let todo = Todo::new(req.title, req.description, Utc::now());
    let todo = state
        .db
        .todos()
        .add(&todo)
        .await
        .map_err(|e| ApiError::database("Failed to create todo", &e))?;

    info!(todo_id = %todo.id, "Todo created");

    Ok((StatusCode::CREATED, Json(todo)))
}

/// Apply a partial update
///
/// PUT /api/todos/:id
pub async fn update_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TodoPatch>,
) -> Result<Json<Todo>, ApiError> {
    let todos = state.db.todos();

    let mut todo = todos
        .get(&id)
        .await
        .map_err(|e| ApiError::database("Failed to read todo", &e))?
        .ok_or_else(|| ApiError::not_found("Todo not found"))?;

    todo.apply(patch, Utc::now());

    let todo = todos
        .set(&id, &todo)
        .await
        .map_err(|e| ApiError::database("Failed to update todo", &e))?;

    Ok(Json(todo))
}

/// Delete a todo
///
/// DELETE /api/todos/:id
pub async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .db
        .todos()
        .delete(&id)
        .await
        .map_err(|e| ApiError::database("Failed to delete todo", &e))?;

    if !deleted {
        return Err(ApiError::not_found("Todo not found"));
    }

    info!(todo_id = %id, "Todo deleted");
    Ok(StatusCode::NO_CONTENT)
}
