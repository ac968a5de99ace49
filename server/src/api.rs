//! HTTP and WebSocket routes over the design session store
//!
//! Interpretations release the store lock while the chat collaborator is
//! working; the store's in-flight guard rejects a second submission to the
//! same design until the first completes.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use promptcad::session::{CompletedTurn, PendingTurn};
use promptcad::{
    export, merge_for_export, Design, DesignId, MeshData, Resolution, SessionError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/designs", get(list_designs).post(create_design))
        .route("/designs/:id", get(get_design).delete(delete_design))
        .route("/designs/:id/activate", post(activate_design))
        .route("/designs/:id/messages", post(post_message))
        .route("/designs/:id/undo", post(undo))
        .route("/designs/:id/redo", post(redo))
        .route("/designs/:id/export/stl", get(export_stl))
        .route("/designs/:id/export/sch", get(export_sch))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignSummary {
    pub id: DesignId,
    pub name: String,
    pub has_model: bool,
    pub message_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub generating: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignList {
    pub active: Option<DesignId>,
    pub designs: Vec<DesignSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateDesignRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub design: Design,
    pub resolution: Option<Resolution>,
    pub calls: usize,
    /// Set when the initial interpretation of a new design failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn list_designs(State(state): State<Arc<AppState>>) -> Json<DesignList> {
    let store = state.store.read().await;
    let designs = store
        .designs()
        .map(|d| DesignSummary {
            id: d.id,
            name: d.name.clone(),
            has_model: d.model.is_some(),
            message_count: d.messages.len(),
            can_undo: d.history.can_undo(),
            can_redo: d.history.can_redo(),
            generating: store.is_generating(d.id),
            created_at: d.created_at,
        })
        .collect();
    Json(DesignList {
        active: store.active_id(),
        designs,
    })
}

async fn get_design(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
) -> Result<Json<Design>, ApiError> {
    Ok(Json(state.store.read().await.design(id)?.clone()))
}

async fn create_design(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateDesignRequest>,
) -> Result<(StatusCode, Json<TurnResponse>), ApiError> {
    let (design, pending) = {
        let mut store = state.store.write().await;
        let design = store.create_design(body.prompt.as_deref());
        let pending = if design.messages.is_empty() {
            None
        } else {
            Some(store.begin_initial_interpretation(design.id)?)
        };
        (design, pending)
    };
    publish_active(&state).await;

    let Some(pending) = pending else {
        return Ok((
            StatusCode::CREATED,
            Json(TurnResponse {
                design,
                resolution: None,
                calls: 0,
                error: None,
            }),
        ));
    };

    let id = design.id;
    let completed = run_turn(&state, pending).await?;

    let response = match completed {
        Ok(turn) => TurnResponse {
            design: turn.design,
            resolution: Some(turn.resolution),
            calls: turn.calls,
            error: None,
        },
        Err(SessionError::Refine(e)) => {
            warn!("Initial interpretation of design {} failed: {}", id, e);
            TurnResponse {
                design: state.store.read().await.design(id)?.clone(),
                resolution: None,
                calls: 0,
                error: Some(e.to_string()),
            }
        }
        Err(e) => return Err(e.into()),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn delete_design(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
) -> Result<StatusCode, ApiError> {
    state.store.write().await.delete_design(id)?;
    publish_active(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_design(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
) -> Result<Json<Design>, ApiError> {
    let design = state.store.write().await.set_active(id)?.clone();
    publish_active(&state).await;
    Ok(Json(design))
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let pending = state.store.write().await.begin_interpretation(id, &body.text)?;
    let turn = run_turn(&state, pending).await??;

    Ok(Json(TurnResponse {
        design: turn.design,
        resolution: Some(turn.resolution),
        calls: turn.calls,
        error: None,
    }))
}

/// Interpret and commit on a detached task. If the request is dropped
/// mid-flight the turn still completes and the design leaves the busy state.
async fn run_turn(
    state: &Arc<AppState>,
    pending: PendingTurn,
) -> Result<Result<CompletedTurn, SessionError>, ApiError> {
    let state = state.clone();
    let task = tokio::spawn(async move {
        let id = pending.design_id;
        let result = state
            .refiner
            .interpret(&pending.text, pending.previous.as_ref(), &pending.history)
            .await;
        let completed = state.store.write().await.complete_interpretation(pending, result);
        if completed.is_ok() {
            publish_if_active(&state, id).await;
        }
        completed
    });
    Ok(task.await?)
}

async fn undo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
) -> Result<Json<Design>, ApiError> {
    let design = state.store.write().await.undo(id)?;
    publish_if_active(&state, id).await;
    Ok(Json(design))
}

async fn redo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
) -> Result<Json<Design>, ApiError> {
    let design = state.store.write().await.redo(id)?;
    publish_if_active(&state, id).await;
    Ok(Json(design))
}

async fn export_stl(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
) -> Result<Response, ApiError> {
    let store = state.store.read().await;
    let design = store.design(id)?;
    let Some(stl) = export::export_stl(design, &state.mesh_config) else {
        debug!("Design {} has no geometry to export", id);
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    info!("Exporting STL for {}", design.name);
    Ok(attachment(stl, "application/sla", &export::file_name(design, "stl")))
}

async fn export_sch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DesignId>,
) -> Result<Response, ApiError> {
    let store = state.store.read().await;
    let design = store.design(id)?;
    let schematic = export::export_schematic(design)?;
    info!("Exporting schematic for {}", design.name);
    Ok(attachment(schematic, "application/json", &export::file_name(design, "sch")))
}

fn attachment(body: String, content_type: &'static str, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

/// Binary mesh frame for the active design; an empty frame when there is
/// nothing to show.
async fn active_mesh_frame(state: &AppState) -> Vec<u8> {
    let store = state.store.read().await;
    store
        .active()
        .and_then(|design| design.model.as_ref())
        .and_then(|model| merge_for_export(model, &state.mesh_config))
        .map(|merged| merged.mesh)
        .unwrap_or_default()
        .to_binary()
}

async fn publish_active(state: &AppState) {
    let frame = active_mesh_frame(state).await;
    debug!("Publishing mesh frame: {} bytes", frame.len());
    *state.current_mesh.write().await = Some(frame.clone());
    let _ = state.mesh_tx.send(frame);
}

async fn publish_if_active(state: &AppState, id: DesignId) {
    if state.store.read().await.active_id() == Some(id) {
        publish_active(state).await;
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.mesh_tx.subscribe();

    // Send current mesh if available
    let current = state.current_mesh.read().await.clone();
    let initial = match current {
        Some(frame) => frame,
        None => MeshData::new().to_binary(),
    };
    if sender.send(Message::Binary(initial)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            Ok(frame) = rx.recv() => {
                if sender.send(Message::Binary(frame)).await.is_err() {
                    break;
                }
            }
            Some(msg) = receiver.next() => {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            else => break,
        }
    }
    debug!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use promptcad::{ChatClient, ChatError, ChatRequest, MeshConfig, RefineConfig, Refiner};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ChatError>>>,
    }

    #[async_trait]
    impl ChatClient for Scripted {
        async fn send(&self, _request: &ChatRequest) -> Result<String, ChatError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("nothing structured".into()))
        }
    }

    fn state(replies: Vec<Result<String, ChatError>>) -> Arc<AppState> {
        let client = Arc::new(Scripted {
            replies: Mutex::new(replies.into()),
        });
        Arc::new(AppState::new(
            Refiner::new(client, RefineConfig::default()),
            MeshConfig { circular_segments: 8 },
        ))
    }

    fn reply(kind: &str, color: &str) -> Result<String, ChatError> {
        Ok(format!(
            "Here.\n```json\n{{\"model\": {{\"type\": \"primitive\", \"primitive\": \"{kind}\", \"scale\": 1, \"color\": \"{color}\"}}, \"explanation\": \"made a {kind}\"}}\n```"
        ))
    }

    async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn create(state: &Arc<AppState>) -> u64 {
        let response = call(state, "POST", "/designs", Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["design"]["id"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let state = state(vec![]);
        let id = create(&state).await;

        let list = json_body(call(&state, "GET", "/designs", None).await).await;
        assert_eq!(list["active"], json!(id));
        assert_eq!(list["designs"][0]["name"], "Design 1");
        assert_eq!(list["designs"][0]["hasModel"], false);
        assert_eq!(list["designs"][0]["canUndo"], false);
    }

    #[tokio::test]
    async fn test_create_with_prompt_interprets_it() {
        let state = state(vec![reply("torus", "#123456")]);
        let response = call(&state, "POST", "/designs", Some(json!({"prompt": "a ring"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["resolution"], "primary");
        assert_eq!(body["design"]["model"]["primitive"], "torus");
        assert_eq!(body["design"]["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["design"]["refinedPrompt"], "a ring");
    }

    #[tokio::test]
    async fn test_message_then_undo_redo() {
        let state = state(vec![reply("sphere", "#111111"), reply("cone", "#222222")]);
        let id = create(&state).await;

        let first = call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "a ball"}))).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = json_body(
            call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "a cone"}))).await,
        )
        .await;
        assert_eq!(second["design"]["model"]["primitive"], "cone");
        assert_eq!(second["calls"], 1);

        let undone = json_body(call(&state, "POST", &format!("/designs/{id}/undo"), None).await).await;
        assert_eq!(undone["model"]["primitive"], "sphere");
        let redone = json_body(call(&state, "POST", &format!("/designs/{id}/redo"), None).await).await;
        assert_eq!(redone["model"]["primitive"], "cone");
    }

    #[tokio::test]
    async fn test_unknown_design_is_404() {
        let state = state(vec![]);
        let response = call(&state, "POST", "/designs/99/undo", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["code"], "NOT_FOUND");
        assert_eq!(call(&state, "DELETE", "/designs/99", None).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_submission_while_in_flight_is_409() {
        let state = state(vec![]);
        let id = create(&state).await;
        let _pending = state.store.write().await.begin_interpretation(id, "a cube").unwrap();

        let response = call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "a ball"}))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    /// Answers every call with a valid box after a delay.
    struct Slow;

    #[async_trait]
    impl ChatClient for Slow {
        async fn send(&self, _request: &ChatRequest) -> Result<String, ChatError> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            reply("box", "#445566")
        }
    }

    #[tokio::test]
    async fn test_dropped_request_does_not_leave_design_busy() {
        let state = Arc::new(AppState::new(
            Refiner::new(Arc::new(Slow), RefineConfig::default()),
            MeshConfig { circular_segments: 8 },
        ));
        let id = create(&state).await;

        let dropped = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "a box"}))),
        )
        .await;
        assert!(dropped.is_err());
        assert!(state.store.read().await.is_generating(id));

        // The detached turn still finishes and commits
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        assert!(!state.store.read().await.is_generating(id));
        let design = json_body(call(&state, "GET", &format!("/designs/{id}"), None).await).await;
        assert_eq!(design["model"]["primitive"], "box");

        assert_eq!(call(&state, "POST", &format!("/designs/{id}/undo"), None).await.status(), StatusCode::OK);
        let response = call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "again"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_message_is_400() {
        let state = state(vec![]);
        let id = create(&state).await;
        let response = call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "  "}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transport_failure_is_502_and_commits_nothing() {
        let state = state(vec![
            Err(ChatError::Unavailable("down".into())),
            Err(ChatError::Unavailable("down".into())),
        ]);
        let id = create(&state).await;

        let response = call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "a cube"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let design = json_body(call(&state, "GET", &format!("/designs/{id}"), None).await).await;
        assert_eq!(design["messages"], json!([]));
        assert_eq!(design["model"], Value::Null);
    }

    #[tokio::test]
    async fn test_export_stl() {
        let state = state(vec![reply("box", "#ff0000")]);
        let id = create(&state).await;

        let empty = call(&state, "GET", &format!("/designs/{id}/export/stl"), None).await;
        assert_eq!(empty.status(), StatusCode::NO_CONTENT);

        call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "a box"}))).await;
        let response = call(&state, "GET", &format!("/designs/{id}/export/stl"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Design 1.stl\""
        );
        let stl = text_body(response).await;
        assert!(stl.starts_with("solid Design_1"));
        assert_eq!(stl.matches("endfacet").count(), 12);
    }

    #[tokio::test]
    async fn test_export_schematic() {
        let state = state(vec![]);
        let id = create(&state).await;
        let response = call(&state, "GET", &format!("/designs/{id}/export/sch"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Design 1.sch\""
        );
        let body = json_body(response).await;
        assert_eq!(body["name"], "Design 1");
        assert_eq!(body["recentMessages"], json!([]));
    }

    #[tokio::test]
    async fn test_delete_and_activate() {
        let state = state(vec![]);
        let first = create(&state).await;
        let second = create(&state).await;

        let response = call(&state, "POST", &format!("/designs/{first}/activate"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.read().await.active_id(), Some(first));

        let response = call(&state, "DELETE", &format!("/designs/{first}"), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.store.read().await.active_id(), Some(second));
        assert_eq!(
            call(&state, "GET", &format!("/designs/{first}"), None).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_model_change_broadcasts_mesh_frame() {
        let state = state(vec![reply("box", "#00ff00")]);
        let id = create(&state).await;
        let mut rx = state.mesh_tx.subscribe();

        call(&state, "POST", &format!("/designs/{id}/messages"), Some(json!({"text": "a box"}))).await;

        let frame = rx.try_recv().unwrap();
        let vertices = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let indices = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        assert_eq!(vertices, 24);
        assert_eq!(indices, 36);
        assert_eq!(state.current_mesh.read().await.as_ref(), Some(&frame));
    }
}
