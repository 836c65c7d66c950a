use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::action::SearchAction;
use crate::core::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "index_ready": state.answers.index().is_ready(),
    }))
}

/// Submit a question.
///
/// Creates the action, spawns its worker and returns the fresh snapshot so
/// the caller can poll it by id while the answer streams in.
pub async fn submit_question(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<SearchAction>, AppError> {
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(AppError::BadRequest("question must not be empty".to_string()));
    }

    let action = state.actions.insert(SearchAction::new(question.clone())).await;

    let answers = state.answers.clone();
    let action_id = action.id;
    tokio::spawn(async move {
        answers.ask(action_id, question).await;
    });

    Ok(Json(action))
}

pub async fn list_actions(State(state): State<Arc<AppState>>) -> Json<Vec<SearchAction>> {
    Json(state.actions.snapshot().await)
}

pub async fn get_action(
    State(state): State<Arc<AppState>>,
    Path(action_id): Path<Uuid>,
) -> Result<Json<SearchAction>, AppError> {
    state
        .actions
        .get(action_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("action {action_id}")))
}
