//! API error types with HTTP response mapping.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lifecycle::{ErrorKind, LifecycleError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Error from a lifecycle operation.
    Lifecycle(LifecycleError),
    /// Malformed request that never reached the lifecycle.
    BadRequest(String),
    /// Missing or malformed identity headers.
    Unauthenticated(String),
}

/// Marks a response whose message describes an internal failure.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InternalDetail {
    kind: &'static str,
}

const GENERIC_MESSAGE: &str = "Internal server error";

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Lifecycle(err) => status_for(err.kind()),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Lifecycle(err) => err.kind().as_str(),
            ApiError::BadRequest(_) => ErrorKind::Validation.as_str(),
            ApiError::Unauthenticated(_) => "unauthenticated",
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientStock => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden | ErrorKind::NotAssignedDeliveryPerson => StatusCode::FORBIDDEN,
        ErrorKind::InvalidStatusTransition
        | ErrorKind::InvalidOrderState
        | ErrorKind::AlreadyAssigned
        | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn body(kind: &str, message: &str) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "error": { "kind": kind, "message": message }
    }))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = match &self {
            ApiError::Lifecycle(err) => err.to_string(),
            ApiError::BadRequest(msg) | ApiError::Unauthenticated(msg) => msg.clone(),
        };

        metrics::counter!("api_errors_total", "kind" => kind).increment(1);

        if status.is_server_error() {
            tracing::error!(error = ?self, kind, "internal server error");
            let mut response = (status, body(kind, &message)).into_response();
            response.extensions_mut().insert(InternalDetail { kind });
            return response;
        }
        (status, body(kind, &message)).into_response()
    }
}

/// Replaces internal error messages with a generic one unless `expose` is set.
pub(crate) async fn redact_internal(State(expose): State<bool>, response: Response) -> Response {
    if expose {
        return response;
    }
    match response.extensions().get::<InternalDetail>().copied() {
        Some(detail) => (response.status(), body(detail.kind, GENERIC_MESSAGE)).into_response(),
        None => response,
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        ApiError::Lifecycle(err)
    }
}

impl From<domain::DomainError> for ApiError {
    fn from(err: domain::DomainError) -> Self {
        ApiError::Lifecycle(err.into())
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, UserId};
    use domain::DomainError;

    use super::*;

    #[test]
    fn lifecycle_kinds_map_to_statuses() {
        let cases = [
            (LifecycleError::from(DomainError::EmptyCart), StatusCode::BAD_REQUEST),
            (
                LifecycleError::not_found("order", OrderId::new()),
                StatusCode::NOT_FOUND,
            ),
            (LifecycleError::forbidden("no"), StatusCode::FORBIDDEN),
            (
                LifecycleError::NotAssignedDeliveryPerson {
                    order_id: OrderId::new(),
                    actor_id: UserId::new(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                LifecycleError::AlreadyAssigned {
                    order_id: OrderId::new(),
                },
                StatusCode::CONFLICT,
            ),
            (LifecycleError::Conflict("lost".into()), StatusCode::CONFLICT),
            (
                LifecycleError::Attachment("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn server_errors_are_marked_for_redaction() {
        let response = ApiError::from(LifecycleError::Attachment("disk full".into())).into_response();
        assert!(response.extensions().get::<InternalDetail>().is_some());

        let response = ApiError::BadRequest("bad".into()).into_response();
        assert!(response.extensions().get::<InternalDetail>().is_none());
    }

    async fn message_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["error"]["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn internal_messages_are_redacted_unless_exposed() {
        let internal = || ApiError::from(LifecycleError::Attachment("disk full".into())).into_response();

        let redacted = redact_internal(State(false), internal()).await;
        assert_eq!(redacted.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message_of(redacted).await, GENERIC_MESSAGE);

        let exposed = redact_internal(State(true), internal()).await;
        assert!(message_of(exposed).await.contains("disk full"));

        let client = redact_internal(State(false), ApiError::BadRequest("bad cart".into()).into_response()).await;
        assert_eq!(message_of(client).await, "bad cart");
    }
}
