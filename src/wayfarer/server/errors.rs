// SPDX-License-Identifier: MIT

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::adk::error::WorkflowError;
use crate::wayfarer::workflow::state::ThreadId;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'static str>,
    /// Thread the request created before failing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
}

impl ErrorResponse {
    pub fn from_workflow(err: &WorkflowError) -> Self {
        Self {
            error: err.to_string(),
            error_type: Some(err.kind()),
            thread_id: None,
        }
    }
}

/// Handler error, rendered as `{error, error_type}` with a matching status
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Workflow(WorkflowError),
    /// A node failed on a thread the same request created
    OnThread { thread_id: ThreadId, error: WorkflowError },
}

impl AppError {
    pub fn on_thread(thread_id: ThreadId) -> impl FnOnce(WorkflowError) -> AppError {
        move |error| AppError::OnThread { thread_id, error }
    }
}

pub fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::MissingInput { .. } | WorkflowError::UnknownNode(_) => StatusCode::BAD_REQUEST,
        WorkflowError::UnknownThread(_) | WorkflowError::UnknownSnapshot { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: msg,
                    error_type: None,
                    thread_id: None,
                },
            ),
            AppError::Workflow(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    log::error!("Request failed: {}", err);
                }
                (status, ErrorResponse::from_workflow(&err))
            }
            AppError::OnThread { thread_id, error } => {
                let status = status_for(&error);
                if status.is_server_error() {
                    log::error!("Request failed on thread {}: {}", thread_id, error);
                }
                let mut body = ErrorResponse::from_workflow(&error);
                body.thread_id = Some(thread_id);
                (status, body)
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        AppError::Workflow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&WorkflowError::missing_input("generate", "plan")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&WorkflowError::UnknownThread(ThreadId::from("9"))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&WorkflowError::generation("empty")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_carries_kind() {
        let body = ErrorResponse::from_workflow(&WorkflowError::missing_input("planner", "task"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error_type"], "MissingInputError");
        assert!(json["error"].as_str().unwrap().contains("task"));
        assert!(json.get("thread_id").is_none());
    }
}
