use alerta_db::models::{Notification, NotificationResponse, NotificationStatus};
use alerta_services::alerts::CreateNotification;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use super::{FeedQuery, parse_id, timestamp};
use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub category: String,
    pub title: String,
    pub description: String,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateResponseRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub attachment_url: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub email: String,
    pub created_at: String,
    pub status: String,
    pub status_updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResponseView {
    pub id: String,
    pub notification_id: String,
    pub text: String,
    pub user_id: String,
    pub user_name: String,
    pub role: String,
    pub created_at: String,
}

pub fn to_view(n: Notification) -> NotificationView {
    NotificationView {
        id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
        category: n.category.to_string(),
        title: n.title,
        description: n.description,
        attachment_url: n.attachment_url,
        user_id: n.user_id.to_hex(),
        user_name: n.user_name,
        email: n.email,
        created_at: timestamp(n.created_at),
        status: n.status.to_string(),
        status_updated_at: n.status_updated_at.map(timestamp),
    }
}

pub fn to_response_view(r: NotificationResponse) -> ResponseView {
    ResponseView {
        id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
        notification_id: r.notification_id.to_hex(),
        text: r.text,
        user_id: r.user_id.to_hex(),
        user_name: r.user_name,
        role: r.role.to_string(),
        created_at: timestamp(r.created_at),
    }
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<NotificationView>>, ApiError> {
    let items = state
        .alerts
        .list_notifications(&auth.session(), query.category()?, query.limit)
        .await?;
    Ok(Json(items.into_iter().map(to_view).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationView>), ApiError> {
    let notification = state
        .alerts
        .create_notification(
            &auth.session(),
            CreateNotification {
                category: body.category,
                title: body.title,
                description: body.description,
                attachment_url: body.attachment_url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(to_view(notification))))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<NotificationView>, ApiError> {
    let id = parse_id(&notification_id, "notification_id")?;
    let notification = state.alerts.get_notification(&auth.session(), id).await?;
    Ok(Json(to_view(notification)))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<NotificationView>, ApiError> {
    let id = parse_id(&notification_id, "notification_id")?;
    let status = body
        .status
        .parse::<NotificationStatus>()
        .map_err(ApiError::Validation)?;
    let notification = state
        .lifecycle
        .apply_notification_transition(id, status, &auth.session())
        .await?;
    Ok(Json(to_view(notification)))
}

pub async fn list_responses(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<Vec<ResponseView>>, ApiError> {
    let id = parse_id(&notification_id, "notification_id")?;
    let responses = state.alerts.list_responses(&auth.session(), id).await?;
    Ok(Json(responses.into_iter().map(to_response_view).collect()))
}

pub async fn add_response(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
    Json(body): Json<CreateResponseRequest>,
) -> Result<(StatusCode, Json<ResponseView>), ApiError> {
    let id = parse_id(&notification_id, "notification_id")?;
    let response = state
        .alerts
        .add_response(&auth.session(), id, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(to_response_view(response))))
}
