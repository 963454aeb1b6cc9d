//! Rename routes: paste hook, plan preview, last report, settings view.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::error::{ErrorBody, ErrorCode};
use crate::planner::RenamePlan;
use crate::services::pass::{self, PassError};
use crate::services::scheduler::{self, PasteEvent};
use crate::state::AppState;
use crate::store::{self, StoreError};

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub target: String,
    pub prefix: String,
    /// Every canvas in the vault, i.e. the valid choices for `target`.
    pub documents: Vec<String>,
}

/// `POST /api/paste`: schedule a paste pass if the paste can add an image.
pub async fn paste(State(state): State<AppState>, Json(event): Json<PasteEvent>) -> StatusCode {
    if scheduler::notify_paste(&state, &event) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::NO_CONTENT
    }
}

/// `GET /api/plan`: renames the next pass would attempt.
pub async fn plan(State(state): State<AppState>) -> Result<Json<RenamePlan>, ApiError> {
    pass::preview(state.store.as_ref(), &state.config)
        .await
        .map(Json)
        .map_err(|e| api_error(pass_error_to_status(&e), &e))
}

/// `GET /api/report`: outcome of the last pass, 204 before the first one.
pub async fn report(State(state): State<AppState>) -> Response {
    match state.last_report.read().await.clone() {
        Some(report) => Json(report).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /api/settings`: active settings and the canvases to choose from.
pub async fn settings(State(state): State<AppState>) -> Result<Json<SettingsView>, ApiError> {
    let documents = store::canvas_documents(state.store.as_ref())
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, &e))?;
    Ok(Json(SettingsView { target: state.config.target.clone(), prefix: state.config.prefix.clone(), documents }))
}

pub(crate) fn pass_error_to_status(err: &PassError) -> StatusCode {
    match err {
        PassError::Read { source: StoreError::NotFound(_), .. } => StatusCode::NOT_FOUND,
        PassError::Canvas { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PassError::Read { .. } | PassError::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> ApiError {
    (status, Json(ErrorBody::from_error(err)))
}

#[cfg(test)]
#[path = "rename_test.rs"]
mod tests;
