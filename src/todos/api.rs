//! Todo API Endpoints
//! Mission: Owner-scoped todo CRUD behind the auth gate

use crate::auth::models::Claims;
use crate::todos::models::{
    validate_todo, StatusFilter, TodoPatchRequest, TodoResponse, TodoValidationError,
    TodoWriteRequest,
};
use crate::todos::store::TodoStore;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Shared todo state
#[derive(Clone)]
pub struct TodoApiState {
    pub todo_store: Arc<TodoStore>,
}

impl TodoApiState {
    pub fn new(todo_store: Arc<TodoStore>) -> Self {
        Self { todo_store }
    }
}

/// List query parameters
#[derive(Debug, Deserialize)]
pub struct ListTodosQuery {
    pub status: Option<String>,
}

/// List todos - GET /api/todos/?status=<completed|inprogress|open>
///
/// Unrecognized or absent status values mean "no filter"; the owner scope
/// always applies.
pub async fn list_todos(
    State(state): State<TodoApiState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListTodosQuery>,
) -> Result<Json<Vec<TodoResponse>>, TodoApiError> {
    let filter = query.status.as_deref().and_then(StatusFilter::parse);

    let todos = state
        .todo_store
        .list(&claims.sub, filter)
        .await
        .map_err(|e| {
            warn!("Failed to list todos: {}", e);
            TodoApiError::InternalError
        })?;

    Ok(Json(todos.iter().map(TodoResponse::from_record).collect()))
}

/// Create todo - POST /api/todos/
///
/// The owner is always the caller; an `owner` key in the body is ignored.
pub async fn create_todo(
    State(state): State<TodoApiState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(payload), _): WithRejection<Json<TodoWriteRequest>, TodoApiError>,
) -> Result<(StatusCode, Json<TodoResponse>), TodoApiError> {
    validate_todo(&payload.title, payload.inprogress, payload.completed)?;

    let record = state
        .todo_store
        .create(
            &claims.sub,
            &payload.title,
            &payload.description,
            payload.inprogress,
            payload.completed,
        )
        .await
        .map_err(|e| {
            warn!("Failed to create todo: {}", e);
            TodoApiError::InternalError
        })?;

    Ok((StatusCode::CREATED, Json(TodoResponse::from_record(&record))))
}

/// Retrieve todo - GET /api/todos/:id/
pub async fn get_todo(
    State(state): State<TodoApiState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<TodoResponse>, TodoApiError> {
    let id = parse_todo_id(&id)?;

    let record = state
        .todo_store
        .get(&claims.sub, id)
        .await
        .map_err(|_| TodoApiError::InternalError)?
        .ok_or(TodoApiError::NotFound)?;

    Ok(Json(TodoResponse::from_record(&record)))
}

/// Replace todo - PUT /api/todos/:id/
pub async fn put_todo(
    State(state): State<TodoApiState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<TodoWriteRequest>, TodoApiError>,
) -> Result<Json<TodoResponse>, TodoApiError> {
    let id = parse_todo_id(&id)?;
    validate_todo(&payload.title, payload.inprogress, payload.completed)?;

    let record = state
        .todo_store
        .update(
            &claims.sub,
            id,
            &payload.title,
            &payload.description,
            payload.inprogress,
            payload.completed,
        )
        .await
        .map_err(|e| {
            warn!("Failed to update todo {}: {}", id, e);
            TodoApiError::InternalError
        })?
        .ok_or(TodoApiError::NotFound)?;

    Ok(Json(TodoResponse::from_record(&record)))
}

/// Merge-update todo - PATCH /api/todos/:id/
///
/// Provided fields are laid over the stored record, then the merged result
/// is validated as a whole (a PATCH may not smuggle in the both-flags state).
pub async fn patch_todo(
    State(state): State<TodoApiState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    WithRejection(Json(payload), _): WithRejection<Json<TodoPatchRequest>, TodoApiError>,
) -> Result<Json<TodoResponse>, TodoApiError> {
    let id = parse_todo_id(&id)?;

    let current = state
        .todo_store
        .get(&claims.sub, id)
        .await
        .map_err(|_| TodoApiError::InternalError)?
        .ok_or(TodoApiError::NotFound)?;

    let title = payload.title.unwrap_or(current.title);
    let description = payload.description.unwrap_or(current.description);
    let inprogress = payload.inprogress.unwrap_or(current.inprogress);
    let completed = payload.completed.unwrap_or(current.completed);

    validate_todo(&title, inprogress, completed)?;

    let record = state
        .todo_store
        .update(&claims.sub, id, &title, &description, inprogress, completed)
        .await
        .map_err(|e| {
            warn!("Failed to patch todo {}: {}", id, e);
            TodoApiError::InternalError
        })?
        .ok_or(TodoApiError::NotFound)?;

    Ok(Json(TodoResponse::from_record(&record)))
}

/// Delete todo - DELETE /api/todos/:id/
pub async fn delete_todo(
    State(state): State<TodoApiState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, TodoApiError> {
    let id = parse_todo_id(&id)?;

    let deleted = state
        .todo_store
        .delete(&claims.sub, id)
        .await
        .map_err(|_| TodoApiError::InternalError)?;

    if !deleted {
        return Err(TodoApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// A non-numeric id cannot name an owned record, so it is a 404 like any
/// other miss. 400 here would leak that the path itself was understood.
fn parse_todo_id(raw: &str) -> Result<i64, TodoApiError> {
    raw.parse::<i64>().map_err(|_| TodoApiError::NotFound)
}

/// Todo API errors
#[derive(Debug)]
pub enum TodoApiError {
    BlankTitle,
    TitleTooLong,
    ConflictingStatus,
    MalformedBody(String),
    NotFound,
    InternalError,
}

impl From<TodoValidationError> for TodoApiError {
    fn from(err: TodoValidationError) -> Self {
        match err {
            TodoValidationError::BlankTitle => TodoApiError::BlankTitle,
            TodoValidationError::TitleTooLong => TodoApiError::TitleTooLong,
            TodoValidationError::ConflictingStatus => TodoApiError::ConflictingStatus,
        }
    }
}

/// Bodies that fail to parse (missing fields, bad JSON, wrong content type)
/// are validation failures like any other: 400 with a detail message.
impl From<JsonRejection> for TodoApiError {
    fn from(rejection: JsonRejection) -> Self {
        TodoApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for TodoApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            TodoApiError::BlankTitle => {
                (StatusCode::BAD_REQUEST, "Title may not be blank".to_string())
            }
            TodoApiError::TitleTooLong => (
                StatusCode::BAD_REQUEST,
                "Title must be at most 120 characters".to_string(),
            ),
            TodoApiError::ConflictingStatus => (
                StatusCode::BAD_REQUEST,
                "A todo cannot be both in progress and completed".to_string(),
            ),
            TodoApiError::MalformedBody(detail) => (StatusCode::BAD_REQUEST, detail),
            TodoApiError::NotFound => (StatusCode::NOT_FOUND, "Todo not found".to_string()),
            TodoApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_todo_id_disguises_malformed_ids() {
        assert_eq!(parse_todo_id("42").unwrap(), 42);
        assert!(matches!(parse_todo_id("abc"), Err(TodoApiError::NotFound)));
        assert!(matches!(parse_todo_id(""), Err(TodoApiError::NotFound)));
        assert!(matches!(
            parse_todo_id("1.5"),
            Err(TodoApiError::NotFound)
        ));
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            TodoApiError::ConflictingStatus.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TodoApiError::BlankTitle.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TodoApiError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            TodoApiError::MalformedBody("missing field `title`".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_malformed_body_detail_carries_the_parse_error() {
        let resp = TodoApiError::MalformedBody("missing field `title`".to_string()).into_response();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["detail"], "missing field `title`");
    }

    #[tokio::test]
    async fn test_conflicting_status_body_is_descriptive() {
        let resp = TodoApiError::ConflictingStatus.into_response();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value["detail"],
            "A todo cannot be both in progress and completed"
        );
    }
}
