//! Output template routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CreateTemplateRequest, TemplateResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates).post(create_template))
        .route("/{id}", delete(delete_template))
}

async fn list_templates(State(state): State<AppState>) -> Json<Vec<TemplateResponse>> {
    let manager = state.manager.lock().await;
    Json(manager.templates().iter().map(TemplateResponse::from).collect())
}

async fn create_template(
    State(state): State<AppState>,
    Json(request): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<TemplateResponse>)> {
    let mut manager = state.manager.lock().await;
    let id = manager.create_template(
        &request.name,
        request.service,
        request.orientation,
        request.encoding,
    )?;
    state.persist(&manager).await;

    let template = manager
        .templates()
        .get(&id)
        .ok_or_else(|| ApiError::internal("Template vanished after creation"))?;
    Ok((StatusCode::CREATED, Json(TemplateResponse::from(template))))
}

async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut manager = state.manager.lock().await;
    manager.delete_template(&id)?;
    state.persist(&manager).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use super::*;
    use crate::channel::ChannelManager;

    fn app() -> Router {
        let manager = Arc::new(Mutex::new(ChannelManager::new(None)));
        Router::new()
            .nest("/api/templates", router())
            .with_state(AppState::new(manager))
    }

    #[tokio::test]
    async fn test_list_includes_builtins() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/templates")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let templates: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert!(!templates.is_empty());
        assert!(templates.iter().all(|t| t["is_builtin"] == true));
    }

    #[tokio::test]
    async fn test_builtin_cannot_be_deleted() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/templates/builtin_youtube_1080p60")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/templates")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"  ","service":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
