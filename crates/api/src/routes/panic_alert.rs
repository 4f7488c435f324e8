use alerta_db::models::{GeoPoint, PanicAlert, PanicStatus};
use alerta_services::{NotifyOutcome, alerts::CreatePanicAlert};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{FeedQuery, parse_id, timestamp};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreatePanicAlertRequest {
    pub category: String,
    pub location: Option<GeoPoint>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub responder_username: Option<String>,
}

/// Body of the callable status endpoint. Every field is required; they are
/// optional here so a missing one maps to `invalid-argument`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCallRequest {
    pub alert_id: Option<String>,
    pub new_status: Option<String>,
    pub target_user_id: Option<String>,
    pub responder_username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusCallResponse {
    pub success: bool,
    pub message: String,
    pub notification: &'static str,
    pub alert: PanicAlertView,
}

#[derive(Debug, Serialize)]
pub struct PanicAlertView {
    pub id: String,
    pub user_id: String,
    pub user_name_panic: String,
    pub category: String,
    pub location: Option<GeoPoint>,
    pub address: String,
    pub created_at: String,
    pub status: String,
    pub status_updated_at: Option<String>,
    pub responder_username: Option<String>,
}

pub fn to_view(a: PanicAlert) -> PanicAlertView {
    PanicAlertView {
        id: a.id.map(|id| id.to_hex()).unwrap_or_default(),
        user_id: a.user_id.to_hex(),
        user_name_panic: a.user_name_panic,
        category: a.category.to_string(),
        location: a.location,
        address: a.address,
        created_at: timestamp(a.created_at),
        status: a.status.to_string(),
        status_updated_at: a.status_updated_at.map(timestamp),
        responder_username: a.responder_username,
    }
}

/// Short outcome key and the caller-facing message for a reporter push.
pub fn describe_outcome(outcome: &NotifyOutcome) -> (&'static str, &'static str) {
    match outcome {
        NotifyOutcome::Sent(_) => (
            "sent",
            "Estado actualizado y notificación (si aplica) enviada.",
        ),
        NotifyOutcome::NotApplicable => (
            "not_applicable",
            "Estado actualizado, sin notificación para este estado.",
        ),
        NotifyOutcome::Degraded(_) => (
            "degraded",
            "Estado actualizado, pero falló el envío de notificación.",
        ),
    }
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<PanicAlertView>>, ApiError> {
    let items = state
        .alerts
        .list_panic_alerts(&auth.session(), query.category()?, query.limit)
        .await?;
    Ok(Json(items.into_iter().map(to_view).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreatePanicAlertRequest>,
) -> Result<(StatusCode, Json<PanicAlertView>), ApiError> {
    let alert = state
        .alerts
        .create_panic_alert(
            &auth.session(),
            CreatePanicAlert {
                category: body.category,
                location: body.location,
                address: body.address,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(to_view(alert))))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(alert_id): Path<String>,
) -> Result<Json<PanicAlertView>, ApiError> {
    let id = parse_id(&alert_id, "alert_id")?;
    let alert = state.alerts.get_panic_alert(&auth.session(), id).await?;
    Ok(Json(to_view(alert)))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(alert_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<StatusCallResponse>, ApiError> {
    let id = parse_id(&alert_id, "alert_id")?;
    let status = body
        .status
        .parse::<PanicStatus>()
        .map_err(ApiError::Validation)?;
    let responder = body
        .responder_username
        .unwrap_or_else(|| auth.username.clone());

    let transition = state
        .lifecycle
        .apply_panic_transition(id, status, &auth.session(), &responder)
        .await?;
    let (notification, message) = describe_outcome(&transition.notification);
    Ok(Json(StatusCallResponse {
        success: true,
        message: message.to_string(),
        notification,
        alert: to_view(transition.alert),
    }))
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ApiError::InvalidArgument(format!(
                "Faltan datos necesarios (alertId, newStatus, targetUserId, responderUsername): {name}"
            ))
        })
}

/// Callable form of the status transition used by the mobile client.
pub async fn status_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<StatusCallRequest>,
) -> Result<Json<StatusCallResponse>, ApiError> {
    let alert_id = required(body.alert_id, "alertId")?;
    let new_status = required(body.new_status, "newStatus")?;
    let target_user_id = required(body.target_user_id, "targetUserId")?;
    let responder = required(body.responder_username, "responderUsername")?;

    let id = bson::oid::ObjectId::parse_str(&alert_id)
        .map_err(|_| ApiError::InvalidArgument("Invalid alertId".to_string()))?;
    let target = bson::oid::ObjectId::parse_str(&target_user_id)
        .map_err(|_| ApiError::InvalidArgument("Invalid targetUserId".to_string()))?;
    let status = new_status
        .parse::<PanicStatus>()
        .map_err(ApiError::InvalidArgument)?;

    let current = state.store.get_panic_alert(id).await?;
    if current.user_id != target {
        return Err(ApiError::InvalidArgument(
            "targetUserId is not the reporter of this alert".to_string(),
        ));
    }

    info!(%id, %status, responder = %responder, actor = %auth.username, "Status change requested");
    let transition = state
        .lifecycle
        .apply_panic_transition(id, status, &auth.session(), &responder)
        .await?;
    let (notification, message) = describe_outcome(&transition.notification);
    Ok(Json(StatusCallResponse {
        success: true,
        message: message.to_string(),
        notification,
        alert: to_view(transition.alert),
    }))
}
