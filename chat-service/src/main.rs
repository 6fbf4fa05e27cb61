// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod config;
mod directory;
mod error;
mod policy;
mod presence;
mod service;
mod store;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use gamegoo_common::{
    ActiveChatroomsResponse, ChatCreateResponse, ChatMessageList, ChatroomCreatedResponse,
    ChatroomEnterResponse, CreateChatroomByMatchRequest, ListingId, MemberId, SendMessageRequest,
};
use lambda_http::run as lambda_run;
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::ServiceConfig,
    directory::{SeededDirectory, load_directory_seed},
    error::ChatError,
    presence::SocketServerNotifier,
    service::{ChatService, ChatTarget, Collaborators},
};

const MEMBER_ID_HEADER: &str = "x-member-id";

#[derive(Clone)]
struct AppState {
    chat: ChatService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "chat_service=debug,tower_http=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let directory = Arc::new(SeededDirectory::from_seed(load_directory_seed(
        config.directory_seed_path.as_deref(),
    )));
    let presence = Arc::new(SocketServerNotifier::new(
        config.socket_server_base_url.clone(),
        config.presence_timeout,
    )?);

    let state = AppState {
        chat: ChatService::new(Collaborators::seeded(directory, presence), config.page_size),
    };

    let app = build_router(state);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("AWS Lambda runtime detected; running chat-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = config.bind_addr;
    info!(
        %bind_addr,
        socket_server = %config.socket_server_base_url,
        page_size = config.page_size,
        "chat-service listening"
    );
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/chat/start/member/{member_id}",
            post(start_with_member_handler),
        )
        .route(
            "/v1/chat/start/board/{board_id}",
            post(start_with_board_handler),
        )
        .route("/v1/chat/rooms", get(active_rooms_handler))
        .route("/v1/chat/{uuid}", post(send_message_handler))
        .route("/v1/chat/{uuid}/enter", get(enter_chatroom_handler))
        .route("/v1/chat/{uuid}/messages", get(get_messages_handler))
        .route("/v1/chat/{uuid}/read", patch(read_messages_handler))
        .route("/v1/chat/{uuid}/exit", patch(exit_chatroom_handler))
        .route("/internal/v1/chat/match", post(create_by_match_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": "chat-service"}))
}

/// Caller identity, set by the upstream gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CallerId(MemberId);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(MEMBER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized(format!("missing {MEMBER_ID_HEADER} header")))?;

        raw.to_str()
            .ok()
            .and_then(|value| value.trim().parse::<MemberId>().ok())
            .map(CallerId)
            .ok_or_else(|| ApiError::bad_request(format!("invalid {MEMBER_ID_HEADER} header")))
    }
}

#[derive(Debug, Default, Deserialize)]
struct CursorQuery {
    cursor: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReadQuery {
    timestamp: Option<i64>,
}

async fn start_with_member_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(member_id): Path<MemberId>,
) -> Result<Json<ChatroomEnterResponse>, ApiError> {
    let response = state
        .chat
        .start_chatroom(caller, ChatTarget::Member(member_id))
        .await?;
    Ok(Json(response))
}

async fn start_with_board_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(board_id): Path<ListingId>,
) -> Result<Json<ChatroomEnterResponse>, ApiError> {
    let response = state
        .chat
        .start_chatroom(caller, ChatTarget::Listing(board_id))
        .await?;
    Ok(Json(response))
}

async fn active_rooms_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
) -> Result<Json<ActiveChatroomsResponse>, ApiError> {
    let uuids = state.chat.active_chatroom_uuids(caller).await?;
    Ok(Json(ActiveChatroomsResponse { uuids }))
}

async fn enter_chatroom_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(uuid): Path<String>,
) -> Result<Json<ChatroomEnterResponse>, ApiError> {
    Ok(Json(state.chat.enter_chatroom(&uuid, caller).await?))
}

async fn get_messages_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(uuid): Path<String>,
    Query(query): Query<CursorQuery>,
) -> Result<Json<ChatMessageList>, ApiError> {
    Ok(Json(
        state.chat.get_messages(&uuid, caller, query.cursor).await?,
    ))
}

async fn send_message_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(uuid): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<ChatCreateResponse>, ApiError> {
    let outcome = state.chat.send_message(&uuid, caller, request).await?;
    Ok(Json(outcome.message))
}

async fn read_messages_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(uuid): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .chat
        .read_messages(&uuid, caller, query.timestamp)
        .await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn exit_chatroom_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(uuid): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.chat.exit_chatroom(&uuid, caller).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn create_by_match_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateChatroomByMatchRequest>,
) -> Result<Json<ChatroomCreatedResponse>, ApiError> {
    Ok(Json(
        state
            .chat
            .create_chatroom_by_match(request.member_list)
            .await?,
    ))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "COMMON400",
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "COMMON401",
            message: message.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        Self {
            status: error.status(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, code = self.code, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message, "code": self.code})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        directory::DirectorySeed,
        presence::{PresenceEvent, PresenceNotifier},
    };
    use async_trait::async_trait;
    use axum::http::Request;
    use gamegoo_common::{ChatMessage, ContactFlag, Listing, Member, SystemFlag};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPresenceNotifier {
        events: Mutex<Vec<PresenceEvent>>,
    }

    #[async_trait]
    impl PresenceNotifier for RecordingPresenceNotifier {
        async fn notify_join(&self, member_id: MemberId, chatroom_uuid: &str) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(PresenceEvent {
                member_id,
                chatroom_uuid: chatroom_uuid.to_string(),
            });
            Ok(())
        }
    }

    struct FailingPresenceNotifier;

    #[async_trait]
    impl PresenceNotifier for FailingPresenceNotifier {
        async fn notify_join(&self, _member_id: MemberId, _chatroom_uuid: &str) -> anyhow::Result<()> {
            anyhow::bail!("socket-server returned 503 Service Unavailable")
        }
    }

    fn seeded_directory() -> Arc<SeededDirectory> {
        let member = |id: MemberId, name: &str| Member {
            id,
            game_name: name.to_string(),
            profile_image: 1,
            blind: false,
        };
        Arc::new(SeededDirectory::from_seed(DirectorySeed {
            members: vec![member(1, "faker"), member(2, "chovy"), member(3, "keria")],
            blocks: vec![],
            friends: vec![],
            boards: vec![Listing {
                id: 11,
                author_id: 2,
            }],
        }))
    }

    fn app_state_with(presence: Arc<dyn PresenceNotifier>) -> (AppState, Arc<SeededDirectory>) {
        let directory = seeded_directory();
        let state = AppState {
            chat: ChatService::new(Collaborators::seeded(directory.clone(), presence), 20),
        };
        (state, directory)
    }

    fn app_state() -> (AppState, Arc<RecordingPresenceNotifier>, Arc<SeededDirectory>) {
        let presence = Arc::new(RecordingPresenceNotifier::default());
        let (state, directory) = app_state_with(presence.clone());
        (state, presence, directory)
    }

    async fn start(state: &AppState, caller: MemberId, target: MemberId) -> ChatroomEnterResponse {
        start_with_member_handler(State(state.clone()), CallerId(caller), Path(target))
            .await
            .unwrap()
            .0
    }

    async fn send(state: &AppState, caller: MemberId, uuid: &str, text: &str) -> ChatCreateResponse {
        send_message_handler(
            State(state.clone()),
            CallerId(caller),
            Path(uuid.to_string()),
            Json(SendMessageRequest {
                message: text.to_string(),
                system: None,
            }),
        )
        .await
        .unwrap()
        .0
    }

    /// Presence runs in the background once the handler has answered.
    async fn delivered_joins(presence: &RecordingPresenceNotifier, expected: usize) -> Vec<MemberId> {
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while presence.events.lock().unwrap().len() < expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        presence
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.member_id)
            .collect()
    }

    #[tokio::test]
    async fn caller_id_is_read_from_the_member_header() {
        let (mut parts, _) = Request::builder()
            .header(MEMBER_ID_HEADER, " 42 ")
            .body(())
            .unwrap()
            .into_parts();
        let caller = CallerId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(caller, CallerId(42));

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let error = CallerId::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);

        let (mut parts, _) = Request::builder()
            .header(MEMBER_ID_HEADER, "faker")
            .body(())
            .unwrap()
            .into_parts();
        let error = CallerId::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "COMMON400");
    }

    #[tokio::test]
    async fn router_builds_with_every_route() {
        let (state, _, _) = app_state();
        let _router = build_router(state);
        assert_eq!(health().await.0["service"], "chat-service");
    }

    #[tokio::test]
    async fn chat_errors_map_to_status_and_code() {
        let (state, _, _) = app_state();

        let error = start_with_member_handler(State(state.clone()), CallerId(1), Path(1))
            .await
            .unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
        assert_eq!(error.code, "CHAT4001");

        let error = enter_chatroom_handler(State(state.clone()), CallerId(1), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(error.status, StatusCode::NOT_FOUND);
        assert_eq!(error.code, "CHAT4042");

        let error = start_with_board_handler(State(state), CallerId(1), Path(999))
            .await
            .unwrap_err();
        assert_eq!(error.code, "BOARD404");
    }

    #[tokio::test]
    async fn conversation_flow_over_handlers() {
        let (state, presence, _) = app_state();
        let room = start(&state, 1, 2).await;

        let sent = send(&state, 1, &room.uuid, "hi").await;
        assert_eq!(sent.sender_name, "faker");
        assert_eq!(delivered_joins(&presence, 2).await, vec![1, 2]);

        send(&state, 2, &room.uuid, "hello").await;
        tokio::task::yield_now().await;
        assert_eq!(presence.events.lock().unwrap().len(), 2);

        let entered = enter_chatroom_handler(State(state.clone()), CallerId(2), Path(room.uuid.clone()))
            .await
            .unwrap()
            .0;
        assert_eq!(entered.member_id, 1);
        let texts: Vec<String> = entered
            .chat_message_list
            .unwrap()
            .chat_message_dto_list
            .iter()
            .map(|message| message.text().to_string())
            .collect();
        assert_eq!(texts, vec!["hello", "hi"]);

        let ack = read_messages_handler(
            State(state.clone()),
            CallerId(1),
            Path(room.uuid.clone()),
            Query(ReadQuery {
                timestamp: Some(sent.timestamp),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(ack["ok"], true);

        let rooms = active_rooms_handler(State(state.clone()), CallerId(1))
            .await
            .unwrap()
            .0;
        assert_eq!(rooms.uuids, vec![room.uuid.clone()]);

        let ack = exit_chatroom_handler(State(state.clone()), CallerId(1), Path(room.uuid.clone()))
            .await
            .unwrap()
            .0;
        assert_eq!(ack["ok"], true);
        let rooms = active_rooms_handler(State(state.clone()), CallerId(1))
            .await
            .unwrap()
            .0;
        assert!(rooms.uuids.is_empty());

        let history = get_messages_handler(
            State(state),
            CallerId(1),
            Path(room.uuid),
            Query(CursorQuery::default()),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(history.list_size, 2);
        assert!(!history.has_next);
    }

    #[tokio::test]
    async fn board_start_then_system_send_hides_counterpart_notice() {
        let (state, _, _) = app_state();
        let room = start_with_board_handler(State(state.clone()), CallerId(1), Path(11))
            .await
            .unwrap()
            .0;
        assert_eq!(room.member_id, 2);
        assert_eq!(
            room.system,
            Some(SystemFlag {
                flag: ContactFlag::Initial,
                board_id: 11
            })
        );

        let sent = send_message_handler(
            State(state.clone()),
            CallerId(1),
            Path(room.uuid.clone()),
            Json(SendMessageRequest {
                message: "need a support".to_string(),
                system: room.system,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(sent.message, "need a support");

        let history = get_messages_handler(
            State(state),
            CallerId(1),
            Path(room.uuid),
            Query(CursorQuery::default()),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(history.list_size, 2);
        assert!(matches!(history.chat_message_dto_list[0], ChatMessage::User(_)));
        assert!(matches!(history.chat_message_dto_list[1], ChatMessage::System(_)));
    }

    #[tokio::test]
    async fn blocked_send_is_forbidden() {
        let (state, _, directory) = app_state();
        let room = start(&state, 1, 2).await;
        directory.block(2, 1).await;

        let error = send_message_handler(
            State(state),
            CallerId(1),
            Path(room.uuid),
            Json(SendMessageRequest {
                message: "hi".to_string(),
                system: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status, StatusCode::FORBIDDEN);
        assert_eq!(error.code, "CHAT4035");
    }

    #[tokio::test]
    async fn presence_failures_do_not_fail_the_send() {
        let (state, _) = app_state_with(Arc::new(FailingPresenceNotifier));
        let room = start(&state, 1, 2).await;

        let sent = send(&state, 1, &room.uuid, "hi").await;
        assert_eq!(sent.message, "hi");
    }

    #[tokio::test]
    async fn match_endpoint_creates_joined_room() {
        let (state, presence, _) = app_state();
        let created = create_by_match_handler(
            State(state.clone()),
            Json(CreateChatroomByMatchRequest {
                member_list: vec![1, 3],
            }),
        )
        .await
        .unwrap()
        .0;

        let rooms = active_rooms_handler(State(state.clone()), CallerId(3))
            .await
            .unwrap()
            .0;
        assert_eq!(rooms.uuids, vec![created.uuid]);
        assert!(presence.events.lock().unwrap().is_empty());

        let error = create_by_match_handler(
            State(state),
            Json(CreateChatroomByMatchRequest {
                member_list: vec![1, 2, 3],
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(error.status, StatusCode::BAD_REQUEST);
    }
}
