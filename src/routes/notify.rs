use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde_json::json;

use crate::app_state::AppState;
use crate::models::api::{error_response, ErrorResponse, NotifyRequest};
use crate::models::notification::{NotificationEnvelope, NotificationKind, NotificationStatus};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// POST /api/v1/notify — manual notification injection.
///
/// Connectivity test hook outside the job pipeline: broadcasts when no
/// user id is given, targets one user otherwise.
pub async fn send_notification(
    State(state): State<AppState>,
    Json(request): Json<NotifyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    request
        .validate()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

    let envelope = NotificationEnvelope::new(
        NotificationKind::System,
        NotificationStatus::Completed,
        request.message,
        request.user_id,
    );

    state.notifications.push(&envelope).await.map_err(|e| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Failed to queue notification: {e}"),
        )
    })?;

    Ok(Json(json!({ "queued": true, "id": envelope.id })))
}
