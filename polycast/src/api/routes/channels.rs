//! Channel management routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    AddOutputRequest, ApplyTemplateRequest, BulkAction, BulkOutputRequest, ChannelResponse,
    CreateChannelRequest, DuplicateChannelRequest, HealthMonitoringRequest, PreviewRequest,
    SetBackupRequest, UpdateOutputRequest,
};
use crate::api::server::AppState;
use crate::channel::{BulkReport, ChannelManager};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_channels).post(create_channel))
        .route("/start-all", post(start_all))
        .route("/stop-all", post(stop_all))
        .route("/{id}", get(get_channel).delete(delete_channel))
        .route("/{id}/duplicate", post(duplicate_channel))
        .route("/{id}/start", post(start_channel))
        .route("/{id}/stop", post(stop_channel))
        .route("/{id}/restart", post(restart_channel))
        .route("/{id}/preview", post(start_preview))
        .route("/{id}/preview/live", post(preview_to_live))
        .route("/{id}/preview/cancel", post(cancel_preview))
        .route("/{id}/outputs", post(add_output))
        .route("/{id}/outputs/bulk", post(bulk_outputs))
        .route(
            "/{id}/outputs/{index}",
            patch(update_output).delete(remove_output),
        )
        .route(
            "/{id}/outputs/{index}/backup",
            put(set_output_backup).delete(remove_output_backup),
        )
        .route("/{id}/health", put(set_health_monitoring))
        .route("/{id}/failover/{index}", post(trigger_failover))
        .route("/{id}/restore/{index}", post(restore_primary))
        .route("/{id}/templates/{template_id}", post(apply_template))
}

fn channel_response(manager: &ChannelManager, id: &str) -> ApiResult<Json<ChannelResponse>> {
    manager
        .get(id)
        .map(|channel| Json(ChannelResponse::from(channel)))
        .ok_or_else(|| ApiError::not_found(format!("Channel with id '{}' not found", id)))
}

// ========== Channel CRUD ==========

async fn list_channels(State(state): State<AppState>) -> Json<Vec<ChannelResponse>> {
    let manager = state.manager.lock().await;
    Json(manager.channels().iter().map(ChannelResponse::from).collect())
}

async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChannelResponse>> {
    channel_response(&*state.manager.lock().await, &id)
}

async fn create_channel(
    State(state): State<AppState>,
    Json(request): Json<CreateChannelRequest>,
) -> ApiResult<(StatusCode, Json<ChannelResponse>)> {
    let mut manager = state.manager.lock().await;
    let channel = manager.create_channel(&request.name)?;
    if let Some(input_url) = request.input_url.filter(|u| !u.trim().is_empty()) {
        channel.input_url = input_url;
    }
    channel.policy.auto_start = request.auto_start;
    let response = ChannelResponse::from(&*channel);

    info!(channel_id = %response.id, name = %response.name, "Channel created via API");
    state.persist(&manager).await;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut manager = state.manager.lock().await;
    manager.delete_channel(&id).await?;
    state.persist(&manager).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn duplicate_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<DuplicateChannelRequest>,
) -> ApiResult<(StatusCode, Json<ChannelResponse>)> {
    let mut manager = state.manager.lock().await;
    let response = ChannelResponse::from(&*manager.duplicate_channel(&id, &request.name)?);
    state.persist(&manager).await;
    Ok((StatusCode::CREATED, Json(response)))
}

// ========== Lifecycle ==========

async fn start_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.start_channel(&id).await?;
    channel_response(&manager, &id)
}

async fn stop_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.stop_channel(&id).await?;
    channel_response(&manager, &id)
}

async fn restart_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.restart_channel(&id).await?;
    channel_response(&manager, &id)
}

async fn start_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.start_preview(&id, request.duration_sec).await?;
    channel_response(&manager, &id)
}

async fn preview_to_live(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.preview_to_live(&id)?;
    channel_response(&manager, &id)
}

async fn cancel_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.cancel_preview(&id).await?;
    channel_response(&manager, &id)
}

async fn start_all(State(state): State<AppState>) -> Json<BulkReport<String>> {
    Json(state.manager.lock().await.start_all().await)
}

async fn stop_all(State(state): State<AppState>) -> Json<BulkReport<String>> {
    Json(state.manager.lock().await.stop_all().await)
}

// ========== Outputs ==========

async fn add_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddOutputRequest>,
) -> ApiResult<(StatusCode, Json<ChannelResponse>)> {
    let mut manager = state.manager.lock().await;
    if request.service.is_custom() {
        manager
            .add_custom_output(
                &id,
                request.rtmp_url.as_deref().unwrap_or_default(),
                &request.stream_key,
                request.orientation,
                request.encoding,
            )
            .await?;
    } else {
        manager
            .add_output(
                &id,
                request.service,
                &request.stream_key,
                request.orientation,
                request.encoding,
            )
            .await?;
    }
    state.persist(&manager).await;
    Ok((StatusCode::CREATED, channel_response(&manager, &id)?))
}

async fn remove_output(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.remove_output(&id, index).await?;
    state.persist(&manager).await;
    channel_response(&manager, &id)
}

async fn update_output(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    Json(request): Json<UpdateOutputRequest>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    if let Some(encoding) = request.encoding {
        manager.update_output_encoding(&id, index, encoding).await?;
    }
    if let Some(enabled) = request.enabled {
        manager.set_output_enabled(&id, index, enabled).await?;
    }
    state.persist(&manager).await;
    channel_response(&manager, &id)
}

async fn set_output_backup(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    Json(request): Json<SetBackupRequest>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.set_output_backup(&id, index, request.backup_index)?;
    state.persist(&manager).await;
    channel_response(&manager, &id)
}

async fn remove_output_backup(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.remove_output_backup(&id, index)?;
    state.persist(&manager).await;
    channel_response(&manager, &id)
}

async fn set_health_monitoring(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<HealthMonitoringRequest>,
) -> ApiResult<Json<ChannelResponse>> {
    if request.check_interval_sec == Some(0) || request.failure_threshold == Some(0) {
        return Err(ApiError::validation(
            "check_interval_sec and failure_threshold must be positive",
        ));
    }

    let mut manager = state.manager.lock().await;
    manager.set_health_monitoring(&id, request.enabled)?;
    // applied after the toggle, which seeds defaults on first enable
    if let Some(channel) = manager.get_mut(&id) {
        if let Some(interval) = request.check_interval_sec {
            channel.health.check_interval_sec = interval;
        }
        if let Some(threshold) = request.failure_threshold {
            channel.health.failure_threshold = threshold;
        }
    }
    state.persist(&manager).await;
    channel_response(&manager, &id)
}

async fn bulk_outputs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BulkOutputRequest>,
) -> ApiResult<Json<BulkReport>> {
    let mut manager = state.manager.lock().await;
    let indices = &request.indices;
    let report = match request.action {
        BulkAction::Enable => manager.bulk_enable(&id, indices, true).await?,
        BulkAction::Disable => manager.bulk_enable(&id, indices, false).await?,
        BulkAction::Delete => manager.bulk_delete(&id, indices).await?,
        BulkAction::UpdateEncoding => {
            let encoding = request
                .encoding
                .ok_or_else(|| ApiError::validation("update_encoding needs an encoding"))?;
            manager.bulk_update_encoding(&id, indices, encoding).await?
        }
        BulkAction::Start => manager.bulk_start(&id, indices).await?,
        BulkAction::Stop => manager.bulk_stop(&id, indices).await?,
    };
    state.persist(&manager).await;
    Ok(Json(report))
}

// ========== Failover ==========

async fn trigger_failover(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.trigger_failover(&id, index).await?;
    channel_response(&manager, &id)
}

async fn restore_primary(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
) -> ApiResult<Json<ChannelResponse>> {
    let mut manager = state.manager.lock().await;
    manager.restore_primary(&id, index).await?;
    channel_response(&manager, &id)
}

// ========== Templates ==========

async fn apply_template(
    State(state): State<AppState>,
    Path((id, template_id)): Path<(String, String)>,
    Json(request): Json<ApplyTemplateRequest>,
) -> ApiResult<(StatusCode, Json<ChannelResponse>)> {
    let mut manager = state.manager.lock().await;
    manager
        .apply_template(&id, &template_id, &request.stream_key)
        .await?;
    state.persist(&manager).await;
    Ok((StatusCode::CREATED, channel_response(&manager, &id)?))
}
