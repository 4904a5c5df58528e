use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use rounds_db::models::{MessagePreviewRow, MessageRow, parse_datetime};
use rounds_types::api::{
    ActionResponse, ActionStatus, Claims, EditMessageRequest, MessagePreview, MessageResponse,
    OpenRoomRequest, RoomDetailResponse, RoomResponse, RoomSummary, SendMessageRequest,
};
use rounds_types::events::Invalidation;
use rounds_types::models::MESSAGE_MAX_CHARS;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::users::to_user_summary;
use crate::{run_db, to_uuid};

// -- Validation --

fn normalize_message_text(raw: &str) -> Result<String, ApiError> {
    let text = raw.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::InvalidInput("Message text is required.".into()));
    }
    if text.chars().count() > MESSAGE_MAX_CHARS {
        return Err(ApiError::InvalidInput(
            "Message is too long (max 10,000 characters).".into(),
        ));
    }
    Ok(text)
}

fn to_message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: to_uuid(&row.id),
        room_id: to_uuid(&row.chat_room_id),
        author_id: to_uuid(&row.author_id),
        author_username: row.author_username,
        text: row.text,
        is_edited: row.is_edited,
        created_at: parse_datetime(&row.created_at),
    }
}

fn to_message_preview(row: MessagePreviewRow) -> MessagePreview {
    MessagePreview {
        author_id: to_uuid(&row.author_id),
        text: row.text,
        created_at: parse_datetime(&row.created_at),
    }
}

// -- Handlers --

pub async fn open_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OpenRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.target_user_id == claims.sub {
        return Err(ApiError::InvalidTarget);
    }

    let (room_id, created) = run_db(&state, {
        let me = claims.sub.to_string();
        let target = req.target_user_id.to_string();
        move |db| {
            if db.get_user_by_id(&target)?.is_none() {
                return Err(ApiError::InvalidTarget);
            }
            Ok(db.get_or_create_direct_room(&Uuid::new_v4().to_string(), &me, &target)?)
        }
    })
    .await?;

    if created {
        state.notify.broadcast(Invalidation::ConversationList {
            user_id: claims.sub,
        });
        state.notify.broadcast(Invalidation::ConversationList {
            user_id: req.target_user_id,
        });
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(RoomResponse {
            room_id: to_uuid(&room_id),
            created,
        }),
    ))
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RoomSummary>>, ApiError> {
    let summaries = run_db(&state, {
        let me = claims.sub.to_string();
        move |db| {
            let rooms = db.rooms_for_user(&me)?;
            let mut summaries = Vec::with_capacity(rooms.len());
            for room in rooms {
                let other_user = if room.is_direct {
                    db.other_room_member(&room.id, &me)?.map(to_user_summary)
                } else {
                    None
                };
                let last_message = db.last_message(&room.id)?.map(to_message_preview);
                let unread_count = db.unread_count(&room.id, &me)?;
                summaries.push(RoomSummary {
                    room_id: to_uuid(&room.id),
                    name: room.name,
                    is_direct: room.is_direct,
                    other_user,
                    last_message,
                    unread_count,
                    updated_at: parse_datetime(&room.updated_at),
                });
            }
            Ok(summaries)
        }
    })
    .await?;

    Ok(Json(summaries))
}

#[derive(Deserialize)]
pub struct RoomQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub before: Option<Uuid>,
}

fn default_limit() -> u32 {
    50
}

pub async fn get_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<RoomDetailResponse>, ApiError> {
    let limit = query.limit.clamp(1, 200);
    let before = query.before.map(|id| id.to_string());

    let (room, other_user, rows) = run_db(&state, {
        let me = claims.sub.to_string();
        let room_id = room_id.to_string();
        move |db| {
            let room = db.get_room(&room_id)?.ok_or(ApiError::NotFound("room"))?;
            if !db.is_room_member(&room_id, &me)? {
                return Err(ApiError::NotAMember);
            }
            let other_user = if room.is_direct {
                db.other_room_member(&room_id, &me)?.map(to_user_summary)
            } else {
                None
            };
            let rows = db.room_messages(&room_id, limit, before.as_deref())?;
            db.mark_room_read(&room_id, &me)?;
            Ok((room, other_user, rows))
        }
    })
    .await?;

    // Rows come back newest-first; the transcript renders oldest-first.
    Ok(Json(RoomDetailResponse {
        room_id: to_uuid(&room.id),
        name: room.name,
        is_direct: room.is_direct,
        other_user,
        messages: rows.into_iter().rev().map(to_message_response).collect(),
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id = Uuid::new_v4();

    // Membership is settled before the text is inspected, so outsiders
    // learn nothing about a room from validation errors.
    let (text, created_at, other_member) = run_db(&state, {
        let me = claims.sub.to_string();
        let room_key = room_id.to_string();
        let id = message_id.to_string();
        move |db| {
            if db.get_room(&room_key)?.is_none() {
                return Err(ApiError::NotFound("room"));
            }
            if !db.is_room_member(&room_key, &me)? {
                return Err(ApiError::NotAMember);
            }
            let text = normalize_message_text(&req.text)?;
            let created_at = db.insert_message(&id, &room_key, &me, &text)?;
            let other_member = db.other_room_member(&room_key, &me)?;
            Ok((text, created_at, other_member))
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::Room { room_id });
    state.notify.broadcast(Invalidation::ConversationList {
        user_id: claims.sub,
    });
    if let Some(other) = &other_member {
        state.notify.broadcast(Invalidation::ConversationList {
            user_id: to_uuid(&other.id),
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            room_id,
            author_id: claims.sub,
            author_username: claims.username,
            text,
            is_edited: false,
            created_at: parse_datetime(&created_at),
        }),
    ))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<EditMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let row = run_db(&state, {
        let me = claims.sub.to_string();
        let id = message_id.to_string();
        move |db| {
            let meta = db
                .get_message_meta(&id)?
                .ok_or(ApiError::NotFound("message"))?;
            if meta.is_deleted {
                return Err(ApiError::NotFound("message"));
            }
            if meta.author_id != me {
                return Err(ApiError::Forbidden("message"));
            }
            let text = normalize_message_text(&req.text)?;
            db.edit_message(&id, &text)?;
            db.get_message(&id)?.ok_or(ApiError::NotFound("message"))
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::Room {
        room_id: to_uuid(&row.chat_room_id),
    });

    Ok(Json(to_message_response(row)))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
) -> Result<Json<ActionResponse>, ApiError> {
    let room_key = run_db(&state, {
        let me = claims.sub.to_string();
        let id = message_id.to_string();
        move |db| {
            let meta = db
                .get_message_meta(&id)?
                .ok_or(ApiError::NotFound("message"))?;
            if meta.is_deleted {
                return Err(ApiError::NotFound("message"));
            }
            if meta.author_id != me {
                return Err(ApiError::Forbidden("message"));
            }
            db.soft_delete_message(&id)?;
            Ok(meta.chat_room_id)
        }
    })
    .await?;

    state.notify.broadcast(Invalidation::Room {
        room_id: to_uuid(&room_key),
    });

    Ok(Json(ActionResponse {
        status: ActionStatus::Success,
        message: "Message deleted.".into(),
    }))
}
