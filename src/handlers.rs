// src/handlers.rs
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::PollError;
use crate::extract::{JsonBody, PathParam};
use crate::identity::{self, Caller};
use crate::models::{CreatePoll, PollId, RegisterRequest, UpdatePoll, UserView, VoteRequest};
use crate::routes::AppState;

/// Register a user in the directory
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, PollError> {
    let user = identity::register(state.store.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(UserView::from(user))))
}

/// The authenticated caller
pub async fn current_user(State(state): State<AppState>, caller: Caller) -> impl IntoResponse {
    Json(state.engine.current_user(&caller))
}

/// All polls, with the caller's own vote
pub async fn list_polls(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, PollError> {
    let polls = state.engine.list_polls(&caller).await?;
    Ok(Json(polls))
}

/// Create a poll (admin only)
pub async fn create_poll(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(request): JsonBody<CreatePoll>,
) -> Result<impl IntoResponse, PollError> {
    let poll = state.engine.create_poll(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

/// Edit, close or reopen a poll (admin only)
pub async fn update_poll(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(poll_id): PathParam<PollId>,
    JsonBody(request): JsonBody<UpdatePoll>,
) -> Result<impl IntoResponse, PollError> {
    let poll = state.engine.update_poll(&caller, poll_id, request).await?;
    Ok(Json(poll))
}

/// Delete a poll and its votes (admin only)
pub async fn delete_poll(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(poll_id): PathParam<PollId>,
) -> Result<impl IntoResponse, PollError> {
    state.engine.delete_poll(&caller, poll_id).await?;
    Ok(Json(json!({ "message": "Poll deleted successfully" })))
}

/// Vote on a poll
pub async fn vote(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(poll_id): PathParam<PollId>,
    JsonBody(request): JsonBody<VoteRequest>,
) -> Result<impl IntoResponse, PollError> {
    state
        .engine
        .cast_vote(&caller, poll_id, request.option_index)
        .await?;
    Ok(Json(json!({ "message": "Vote recorded successfully" })))
}

/// Results of a closed poll, for callers who voted on it
pub async fn results(
    State(state): State<AppState>,
    caller: Caller,
    PathParam(poll_id): PathParam<PollId>,
) -> Result<impl IntoResponse, PollError> {
    let results = state.engine.results(&caller, poll_id).await?;
    Ok(Json(results))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
