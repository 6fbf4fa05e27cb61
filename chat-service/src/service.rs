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

//! Chatroom lifecycle and message delivery between two members.
//!
//! Every command resolves its external facts (members, blocks, friendship,
//! listings) first, then validates and mutates the store inside a single
//! write-lock section. Presence events produced by a command are handed to a
//! background task only after that section ends.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gamegoo_common::{
    ChatCreateResponse, ChatMessage, ChatMessageList, ChatroomCreatedResponse,
    ChatroomEnterResponse, ContactFlag, LISTING_SYSTEM_MESSAGE_TO_MEMBER,
    LISTING_SYSTEM_MESSAGE_TO_MEMBER_INIT, LISTING_SYSTEM_MESSAGE_TO_TARGET_MEMBER, ListingId,
    Member, MemberId, SendMessageRequest, SystemFlag, SystemMessage, UserMessage,
    WITHDRAWN_MEMBER_NAME,
};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::{debug, info};

use crate::{
    directory::{BlockDirectory, FriendDirectory, ListingStore, MemberDirectory, SeededDirectory},
    error::{ChatError, ChatPhase},
    policy::{self, BlockState, Denial, GateAction},
    presence::{self, PresenceEvent, PresenceNotifier},
    store::{ChatStore, Chatroom, MemberPair, MembershipStore, MessagePage, MessageRecord, NewMessage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTarget {
    Member(MemberId),
    /// The listing's author becomes the target.
    Listing(ListingId),
}

#[derive(Clone)]
pub struct Collaborators {
    pub members: Arc<dyn MemberDirectory>,
    pub blocks: Arc<dyn BlockDirectory>,
    pub friends: Arc<dyn FriendDirectory>,
    pub listings: Arc<dyn ListingStore>,
    pub presence: Arc<dyn PresenceNotifier>,
}

impl Collaborators {
    pub fn seeded(directory: Arc<SeededDirectory>, presence: Arc<dyn PresenceNotifier>) -> Self {
        Self {
            members: directory.clone(),
            blocks: directory.clone(),
            friends: directory.clone(),
            listings: directory,
            presence,
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<RwLock<ChatStore>>,
    collaborators: Collaborators,
    page_size: usize,
}

/// A stored message. `presence` is the background delivery of the join
/// events it caused; dropping the handle leaves delivery running.
#[derive(Debug)]
pub struct SendOutcome {
    pub message: ChatCreateResponse,
    pub presence: Option<JoinHandle<()>>,
}

/// A room the caller belongs to, plus the other member.
struct RoomContext {
    room: Chatroom,
    counterpart_id: MemberId,
}

impl ChatService {
    pub fn new(collaborators: Collaborators, page_size: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(ChatStore::default())),
            collaborators,
            page_size: page_size.max(1),
        }
    }

    pub async fn start_chatroom(
        &self,
        requester_id: MemberId,
        target: ChatTarget,
    ) -> Result<ChatroomEnterResponse, ChatError> {
        let requester = self.member(requester_id).await?;

        let (target_id, board_id) = match target {
            ChatTarget::Member(member_id) => (member_id, None),
            ChatTarget::Listing(listing_id) => {
                let listing = self
                    .collaborators
                    .listings
                    .find_listing(listing_id)
                    .await?
                    .ok_or(ChatError::ListingNotFound(listing_id))?;
                (listing.author_id, Some(listing.id))
            }
        };

        let target = self
            .collaborators
            .members
            .find_member(target_id)
            .await?
            .ok_or(ChatError::TargetNotFound(target_id))?;

        if requester.id == target.id {
            return Err(ChatError::SelfTarget);
        }
        if target.blind {
            return Err(ChatError::TargetDeactivated(target.id));
        }

        let blocks = self.block_state(requester.id, target.id).await?;
        if blocks.me_blocks_them {
            return Err(ChatError::blocked(Denial::CallerBlocksTarget, ChatPhase::Start));
        }
        let friend = self
            .collaborators
            .friends
            .is_friend(requester.id, target.id)
            .await?;

        let mut guard = self.store.write().await;
        let store = &mut *guard;
        let now = Utc::now();

        let existing = store
            .chatrooms
            .find_by_pair(MemberPair::new(requester.id, target.id))
            .cloned();

        let Some(room) = existing else {
            policy::evaluate(GateAction::OpenNew, blocks)
                .map_err(|denial| ChatError::blocked(denial, ChatPhase::Start))?;

            let room = store.open_pair_room([requester.id, target.id], Some(requester.id), None, now);
            info!(
                chatroom_uuid = %room.uuid,
                requester_id = requester.id,
                target_id = target.id,
                board_id = ?board_id,
                "created chatroom"
            );

            return Ok(enter_response(
                room.uuid,
                &target,
                friend,
                false,
                board_id.map(|board_id| SystemFlag {
                    flag: ContactFlag::Initial,
                    board_id,
                }),
                None,
            ));
        };

        let membership = store
            .memberships
            .get_mut(requester.id, room.id)
            .ok_or_else(|| access_denied(requester.id, &room.uuid))?;
        let joined = membership.is_joined();
        policy::evaluate(GateAction::OpenExisting { joined }, blocks)
            .map_err(|denial| ChatError::blocked(denial, ChatPhase::Start))?;

        let page = store
            .messages
            .page(room.id, requester.id, None, self.page_size);
        membership.view_until(now);

        debug!(
            chatroom_uuid = %room.uuid,
            requester_id = requester.id,
            start_member = ?room.start_member,
            joined,
            "resumed existing chatroom"
        );

        let system = board_id.map(|board_id| SystemFlag {
            flag: if joined {
                ContactFlag::Repeat
            } else {
                ContactFlag::Initial
            },
            board_id,
        });
        let messages = render_page(&page, &[&requester, &target]);

        Ok(enter_response(
            room.uuid,
            &target,
            friend,
            blocks.them_blocks_me,
            system,
            Some(messages),
        ))
    }

    /// Opens a room for a matched pair; both members start out joined.
    pub async fn create_chatroom_by_match(
        &self,
        member_list: Vec<MemberId>,
    ) -> Result<ChatroomCreatedResponse, ChatError> {
        let [first, second] = <[MemberId; 2]>::try_from(member_list).map_err(|list| {
            ChatError::BadRequest(format!(
                "matching requires exactly two members, got {}",
                list.len()
            ))
        })?;
        if first == second {
            return Err(ChatError::BadRequest(
                "matching requires two distinct members".to_string(),
            ));
        }

        self.member(first).await?;
        self.member(second).await?;

        let now = Utc::now();
        let room = self
            .store
            .write()
            .await
            .open_pair_room([first, second], None, Some(now), now);

        info!(
            chatroom_uuid = %room.uuid,
            first_member_id = first,
            second_member_id = second,
            "created chatroom by match"
        );

        Ok(ChatroomCreatedResponse {
            uuid: room.uuid,
            created_at: room.created_at,
        })
    }

    pub async fn enter_chatroom(
        &self,
        chatroom_uuid: &str,
        member_id: MemberId,
    ) -> Result<ChatroomEnterResponse, ChatError> {
        let member = self.member(member_id).await?;
        let context = self.resolve_room(chatroom_uuid, member_id).await?;
        let counterpart = self
            .collaborators
            .members
            .find_member(context.counterpart_id)
            .await?
            .ok_or(ChatError::TargetNotFound(context.counterpart_id))?;

        let blocks = self.block_state(member_id, counterpart.id).await?;
        let friend = self
            .collaborators
            .friends
            .is_friend(member_id, counterpart.id)
            .await?;

        let mut guard = self.store.write().await;
        let store = &mut *guard;
        let room = context.room;

        let membership = store
            .memberships
            .get_mut(member_id, room.id)
            .ok_or_else(|| access_denied(member_id, &room.uuid))?;
        policy::evaluate(
            GateAction::OpenExisting {
                joined: membership.is_joined(),
            },
            blocks,
        )
        .map_err(|denial| ChatError::blocked(denial, ChatPhase::Start))?;

        let page = store.messages.page(room.id, member_id, None, self.page_size);
        membership.view_until(Utc::now());

        debug!(
            chatroom_uuid = %room.uuid,
            member_id,
            start_member = ?room.start_member,
            "entered chatroom"
        );

        let messages = render_page(&page, &[&member, &counterpart]);
        Ok(enter_response(
            room.uuid,
            &counterpart,
            friend,
            blocks.them_blocks_me,
            None,
            Some(messages),
        ))
    }

    pub async fn send_message(
        &self,
        chatroom_uuid: &str,
        member_id: MemberId,
        request: SendMessageRequest,
    ) -> Result<SendOutcome, ChatError> {
        if request.message.trim().is_empty() {
            return Err(ChatError::BadRequest("message must not be empty".to_string()));
        }

        let sender = self.member(member_id).await?;
        let RoomContext {
            room,
            counterpart_id,
        } = self.resolve_room(chatroom_uuid, member_id).await?;

        let blocks = self.block_state(member_id, counterpart_id).await?;
        policy::evaluate(GateAction::Send, blocks)
            .map_err(|denial| ChatError::blocked(denial, ChatPhase::Send))?;

        let source_listing = match request.system {
            Some(system) => self
                .collaborators
                .listings
                .find_listing(system.board_id)
                .await?
                .map(|listing| listing.id),
            None => None,
        };

        let (record, events) = {
            let mut guard = self.store.write().await;
            let store = &mut *guard;

            if store.memberships.get(member_id, room.id).is_none() {
                return Err(access_denied(member_id, &room.uuid));
            }

            let mut events = Vec::new();

            if let Some(system) = request.system {
                let to_member_text = match system.flag {
                    ContactFlag::Initial => LISTING_SYSTEM_MESSAGE_TO_MEMBER_INIT,
                    ContactFlag::Repeat => LISTING_SYSTEM_MESSAGE_TO_MEMBER,
                };
                let now = Utc::now();
                let to_member = store.messages.append(
                    NewMessage::system(room.id, member_id, to_member_text, source_listing, system.flag),
                    now,
                );
                let to_counterpart = store.messages.append(
                    NewMessage::system(
                        room.id,
                        counterpart_id,
                        LISTING_SYSTEM_MESSAGE_TO_TARGET_MEMBER,
                        source_listing,
                        system.flag,
                    ),
                    now,
                );

                synchronize_join_state(
                    &mut store.memberships,
                    &room,
                    (member_id, to_member.created_at),
                    (counterpart_id, to_counterpart.created_at),
                    &mut events,
                );
            }

            let record = store.messages.append(
                NewMessage::from_member(room.id, member_id, request.message),
                Utc::now(),
            );

            if request.system.is_none() {
                synchronize_join_state(
                    &mut store.memberships,
                    &room,
                    (member_id, record.created_at),
                    (counterpart_id, record.created_at),
                    &mut events,
                );
            }

            (record, events)
        };

        debug!(
            chatroom_uuid = %room.uuid,
            member_id,
            message_id = record.id,
            timestamp = record.timestamp,
            joined_members = events.len(),
            "message stored"
        );

        let presence = self.spawn_presence(events);

        Ok(SendOutcome {
            message: ChatCreateResponse {
                sender_id: sender.id,
                sender_name: sender.game_name.clone(),
                sender_profile_img: sender.profile_image,
                message: record.contents,
                created_at: record.created_at,
                timestamp: record.timestamp,
            },
            presence,
        })
    }

    /// Moves the read cursor to now, or to the creation time of the message
    /// carrying `timestamp`.
    pub async fn read_messages(
        &self,
        chatroom_uuid: &str,
        member_id: MemberId,
        timestamp: Option<i64>,
    ) -> Result<(), ChatError> {
        self.member(member_id).await?;

        let mut guard = self.store.write().await;
        let store = &mut *guard;

        let room = store
            .chatrooms
            .find_by_uuid(chatroom_uuid)
            .cloned()
            .ok_or_else(|| ChatError::ChatroomNotFound(chatroom_uuid.to_string()))?;
        let membership = store
            .memberships
            .get_mut(member_id, room.id)
            .ok_or_else(|| access_denied(member_id, &room.uuid))?;

        let view_at = match timestamp {
            None => Utc::now(),
            Some(timestamp) => store
                .messages
                .find_by_timestamp(room.id, timestamp)
                .map(|message| message.created_at)
                .ok_or(ChatError::MessageNotFound(timestamp))?,
        };
        membership.view_until(view_at);

        debug!(chatroom_uuid = %room.uuid, member_id, ?timestamp, "read cursor moved");
        Ok(())
    }

    pub async fn exit_chatroom(&self, chatroom_uuid: &str, member_id: MemberId) -> Result<(), ChatError> {
        self.member(member_id).await?;

        let mut guard = self.store.write().await;
        let store = &mut *guard;

        let room = store
            .chatrooms
            .find_by_uuid(chatroom_uuid)
            .cloned()
            .ok_or_else(|| ChatError::ChatroomNotFound(chatroom_uuid.to_string()))?;
        store
            .memberships
            .get_mut(member_id, room.id)
            .ok_or_else(|| access_denied(member_id, &room.uuid))?
            .exit();

        info!(chatroom_uuid = %room.uuid, member_id, "member exited chatroom");
        Ok(())
    }

    /// History page older than `cursor`; leaves the read cursor alone.
    pub async fn get_messages(
        &self,
        chatroom_uuid: &str,
        member_id: MemberId,
        cursor: Option<i64>,
    ) -> Result<ChatMessageList, ChatError> {
        let member = self.member(member_id).await?;
        let context = self.resolve_room(chatroom_uuid, member_id).await?;
        let counterpart = self
            .collaborators
            .members
            .find_member(context.counterpart_id)
            .await?;

        let page = self
            .store
            .read()
            .await
            .messages
            .page(context.room.id, member_id, cursor, self.page_size);

        let mut participants = vec![&member];
        participants.extend(counterpart.as_ref());
        Ok(render_page(&page, &participants))
    }

    pub async fn active_chatroom_uuids(&self, member_id: MemberId) -> Result<Vec<String>, ChatError> {
        self.member(member_id).await?;

        let store = self.store.read().await;
        Ok(store
            .memberships
            .joined_rooms(member_id)
            .into_iter()
            .filter_map(|room_id| store.chatrooms.get(room_id))
            .map(|room| room.uuid.clone())
            .collect())
    }

    fn spawn_presence(&self, events: Vec<PresenceEvent>) -> Option<JoinHandle<()>> {
        if events.is_empty() {
            return None;
        }
        let notifier = self.collaborators.presence.clone();
        Some(tokio::spawn(async move {
            presence::dispatch(notifier.as_ref(), events).await;
        }))
    }

    async fn member(&self, member_id: MemberId) -> Result<Member, ChatError> {
        self.collaborators
            .members
            .find_member(member_id)
            .await?
            .ok_or(ChatError::MemberNotFound(member_id))
    }

    async fn block_state(&self, me: MemberId, them: MemberId) -> Result<BlockState, ChatError> {
        Ok(BlockState {
            me_blocks_them: self.collaborators.blocks.is_blocked(me, them).await?,
            them_blocks_me: self.collaborators.blocks.is_blocked(them, me).await?,
        })
    }

    async fn resolve_room(&self, chatroom_uuid: &str, member_id: MemberId) -> Result<RoomContext, ChatError> {
        let store = self.store.read().await;
        let room = store
            .chatrooms
            .find_by_uuid(chatroom_uuid)
            .cloned()
            .ok_or_else(|| ChatError::ChatroomNotFound(chatroom_uuid.to_string()))?;

        if store.memberships.get(member_id, room.id).is_none() {
            return Err(access_denied(member_id, &room.uuid));
        }

        let counterpart_id = store
            .memberships
            .counterpart(room.id, member_id)
            .ok_or_else(|| anyhow::anyhow!("chatroom {} has no counterpart for member {member_id}", room.uuid))?;

        Ok(RoomContext {
            room,
            counterpart_id,
        })
    }
}

/// Joins whichever of the two members is not joined yet. The caller's cursor
/// follows its anchor; the counterpart's cursor is left where it was.
fn synchronize_join_state(
    memberships: &mut MembershipStore,
    room: &Chatroom,
    (caller_id, caller_anchor): (MemberId, DateTime<Utc>),
    (counterpart_id, counterpart_anchor): (MemberId, DateTime<Utc>),
    events: &mut Vec<PresenceEvent>,
) {
    if let Some(caller) = memberships.get_mut(caller_id, room.id) {
        if !caller.is_joined() {
            caller.join(caller_anchor);
            events.push(PresenceEvent {
                member_id: caller_id,
                chatroom_uuid: room.uuid.clone(),
            });
        }
        caller.view_until(caller_anchor);
    }

    if let Some(counterpart) = memberships.get_mut(counterpart_id, room.id) {
        if !counterpart.is_joined() {
            counterpart.join(counterpart_anchor);
            events.push(PresenceEvent {
                member_id: counterpart_id,
                chatroom_uuid: room.uuid.clone(),
            });
        }
    }
}

fn access_denied(member_id: MemberId, chatroom_uuid: &str) -> ChatError {
    ChatError::AccessDenied {
        member_id,
        uuid: chatroom_uuid.to_string(),
    }
}

fn enter_response(
    uuid: String,
    target: &Member,
    friend: bool,
    blocked: bool,
    system: Option<SystemFlag>,
    chat_message_list: Option<ChatMessageList>,
) -> ChatroomEnterResponse {
    ChatroomEnterResponse {
        uuid,
        member_id: target.id,
        game_name: target.game_name.clone(),
        member_profile_img: target.profile_image,
        friend,
        blocked,
        system,
        chat_message_list,
    }
}

fn render_page(page: &MessagePage, participants: &[&Member]) -> ChatMessageList {
    let chat_message_dto_list: Vec<ChatMessage> = page
        .messages
        .iter()
        .map(|record| render_message(record, participants))
        .collect();

    ChatMessageList {
        list_size: chat_message_dto_list.len(),
        chat_message_dto_list,
        has_next: page.has_next,
        next_cursor: page.next_cursor(),
    }
}

fn render_message(record: &MessageRecord, participants: &[&Member]) -> ChatMessage {
    if record.is_system() {
        return ChatMessage::System(SystemMessage {
            sender_id: record.sender_id,
            message: record.contents.clone(),
            created_at: record.created_at,
            timestamp: record.timestamp,
            board_id: record.source_listing,
            system_type: record.system_type.unwrap_or(ContactFlag::Initial),
        });
    }

    let sender = participants
        .iter()
        .find(|member| member.id == record.sender_id);
    let (sender_name, sender_profile_img) = match sender {
        Some(member) if !member.blind => (member.game_name.clone(), member.profile_image),
        Some(member) => (WITHDRAWN_MEMBER_NAME.to_string(), member.profile_image),
        None => (WITHDRAWN_MEMBER_NAME.to_string(), 0),
    };

    ChatMessage::User(UserMessage {
        sender_id: record.sender_id,
        sender_name,
        sender_profile_img,
        message: record.contents.clone(),
        created_at: record.created_at,
        timestamp: record.timestamp,
    })
}
