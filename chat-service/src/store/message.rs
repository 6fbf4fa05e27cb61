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

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gamegoo_common::{ContactFlag, ListingId, MemberId, SYSTEM_MEMBER_ID};

use super::chatroom::ChatroomId;

pub type MessageId = u64;

#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: MessageId,
    pub chatroom_id: ChatroomId,
    pub sender_id: MemberId,
    /// Set on system messages, which are addressed to a single member.
    pub recipient_id: Option<MemberId>,
    pub contents: String,
    pub source_listing: Option<ListingId>,
    pub system_type: Option<ContactFlag>,
    /// Epoch millis, strictly increasing across the store. Doubles as the page cursor.
    pub timestamp: i64,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn is_system(&self) -> bool {
        self.sender_id == SYSTEM_MEMBER_ID
    }

    pub fn visible_to(&self, member_id: MemberId) -> bool {
        self.recipient_id.is_none_or(|recipient| recipient == member_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chatroom_id: ChatroomId,
    pub sender_id: MemberId,
    pub recipient_id: Option<MemberId>,
    pub contents: String,
    pub source_listing: Option<ListingId>,
    pub system_type: Option<ContactFlag>,
}

impl NewMessage {
    pub fn from_member(chatroom_id: ChatroomId, sender_id: MemberId, contents: String) -> Self {
        Self {
            chatroom_id,
            sender_id,
            recipient_id: None,
            contents,
            source_listing: None,
            system_type: None,
        }
    }

    pub fn system(
        chatroom_id: ChatroomId,
        recipient_id: MemberId,
        contents: &str,
        source_listing: Option<ListingId>,
        system_type: ContactFlag,
    ) -> Self {
        Self {
            chatroom_id,
            sender_id: SYSTEM_MEMBER_ID,
            recipient_id: Some(recipient_id),
            contents: contents.to_string(),
            source_listing,
            system_type: Some(system_type),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    /// Newest first.
    pub messages: Vec<MessageRecord>,
    pub has_next: bool,
}

impl MessagePage {
    pub fn next_cursor(&self) -> Option<i64> {
        if !self.has_next {
            return None;
        }
        self.messages.last().map(|message| message.timestamp)
    }
}

#[derive(Default)]
pub struct MessageStore {
    by_room: HashMap<ChatroomId, Vec<MessageRecord>>,
    last_id: MessageId,
    last_timestamp: i64,
    last_created_at: Option<DateTime<Utc>>,
}

impl MessageStore {
    pub fn append(&mut self, message: NewMessage, now: DateTime<Utc>) -> MessageRecord {
        let created_at = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        let timestamp = created_at
            .timestamp_millis()
            .max(self.last_timestamp + 1);

        self.last_id += 1;
        self.last_timestamp = timestamp;
        self.last_created_at = Some(created_at);

        let record = MessageRecord {
            id: self.last_id,
            chatroom_id: message.chatroom_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            contents: message.contents,
            source_listing: message.source_listing,
            system_type: message.system_type,
            timestamp,
            created_at,
        };

        self.by_room
            .entry(record.chatroom_id)
            .or_default()
            .push(record.clone());
        record
    }

    pub fn in_room(&self, chatroom_id: ChatroomId) -> &[MessageRecord] {
        self.by_room
            .get(&chatroom_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn find_by_timestamp(&self, chatroom_id: ChatroomId, timestamp: i64) -> Option<&MessageRecord> {
        let messages = self.in_room(chatroom_id);
        messages
            .binary_search_by_key(&timestamp, |message| message.timestamp)
            .ok()
            .map(|index| &messages[index])
    }

    /// Messages older than `cursor` (all when None) visible to `viewer`, newest first.
    pub fn page(
        &self,
        chatroom_id: ChatroomId,
        viewer: MemberId,
        cursor: Option<i64>,
        size: usize,
    ) -> MessagePage {
        let mut messages: Vec<MessageRecord> = self
            .in_room(chatroom_id)
            .iter()
            .rev()
            .filter(|message| cursor.is_none_or(|cursor| message.timestamp < cursor))
            .filter(|message| message.visible_to(viewer))
            .take(size + 1)
            .cloned()
            .collect();

        let has_next = messages.len() > size;
        messages.truncate(size);
        MessagePage { messages, has_next }
    }
}
