//! CRUD handlers for the /tasks routes.
//!
//! Follows the conventional form-backed flow: successful mutations
//! redirect back to the task list, validation failures come back as 422
//! with the error and the submitted attributes so the form can re-render.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use taskd_core::{Task, TaskId};
use taskd_store::{NewTask, StoreError, TaskPatch};

use crate::server::AppState;

/// A task as rendered to clients, with the derived status fields.
#[derive(Clone, Debug, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub done: bool,
    pub parent_id: Option<TaskId>,
    pub status: &'static str,
    pub symbol: &'static str,
    pub css_color: &'static str,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_tasks: Option<Vec<TaskView>>,
}

impl TaskView {
    fn render(task: &Task, now: DateTime<Utc>) -> Self {
        let status = task.status(now);
        Self {
            id: task.id.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            done: task.done,
            parent_id: task.parent_id.clone(),
            status: status.as_str(),
            symbol: status.symbol(),
            css_color: status.css_color(),
            created_at: task.created_at.clone(),
            updated_at: task.updated_at.clone(),
            sub_tasks: None,
        }
    }
}

/// Store errors surfaced to HTTP clients.
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Database(_) | StoreError::Io(_) => {
                tracing::error!(error = %self.0, "store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// GET /tasks — parent tasks with their sub-tasks nested.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<TaskView>>, ApiError> {
    let now = Utc::now();
    let mut views = Vec::new();
    for parent in state.repo.list_parents()? {
        let mut view = TaskView::render(&parent, now);
        let subs = state.repo.sub_tasks(&parent.id)?;
        view.sub_tasks = Some(subs.iter().map(|t| TaskView::render(t, now)).collect());
        views.push(view);
    }
    Ok(Json(views))
}

/// GET /tasks/new — blank creation form representation.
pub async fn new_form() -> impl IntoResponse {
    Json(serde_json::json!({
        "task": {
            "description": "",
            "due_date": null,
            "done": false,
            "parent_id": null,
        }
    }))
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreateTaskForm {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub parent_id: Option<TaskId>,
}

/// POST /tasks — create, then redirect to the list.
pub async fn create(
    State(state): State<AppState>,
    Json(form): Json<CreateTaskForm>,
) -> Result<Redirect, Response> {
    let new = NewTask {
        description: form.description.clone(),
        due_date: form.due_date,
        done: form.done,
        parent_id: form.parent_id.clone(),
    };
    match state.repo.create(new) {
        Ok(task) => {
            tracing::info!(task_id = %task.id, "task created");
            Ok(Redirect::to("/tasks"))
        }
        Err(StoreError::Validation(msg)) => Err(form_error(StatusCode::UNPROCESSABLE_ENTITY, &msg, &form)),
        Err(e) => Err(ApiError(e).into_response()),
    }
}

/// GET /tasks/{id}/edit — the task's editable representation.
pub async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let task = state.repo.get(&TaskId::from_raw(id))?;
    Ok(Json(TaskView::render(&task, Utc::now())))
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdateTaskForm {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<TaskId>>,
}

/// PUT /tasks/{id} — update, then redirect to the list.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<UpdateTaskForm>,
) -> Result<Redirect, Response> {
    let patch = TaskPatch {
        description: form.description.clone(),
        due_date: form.due_date,
        done: form.done,
        parent_id: form.parent_id.clone(),
    };
    match state.repo.update(&TaskId::from_raw(id), patch) {
        Ok(task) => {
            tracing::info!(task_id = %task.id, "task updated");
            Ok(Redirect::to("/tasks"))
        }
        Err(StoreError::Validation(msg)) => Err(form_error(StatusCode::UNPROCESSABLE_ENTITY, &msg, &form)),
        Err(e) => Err(ApiError(e).into_response()),
    }
}

/// DELETE /tasks/{id} — cascade delete, then redirect to the list.
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    let removed = state.repo.delete(&TaskId::from_raw(id))?;
    tracing::info!(removed, "task destroyed");
    Ok(Redirect::to("/tasks"))
}

/// Build the 422 re-render payload: the error plus the submitted fields.
fn form_error<T: Serialize>(status: StatusCode, msg: &str, form: &T) -> Response {
    let body = serde_json::json!({ "error": msg, "task": form });
    (status, Json(body)).into_response()
}

/// Distinguishes an absent field (leave unchanged) from an explicit null
/// (clear the value) when deserializing patch bodies.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}
