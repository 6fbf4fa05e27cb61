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
use gamegoo_common::MemberId;
use uuid::Uuid;

pub type ChatroomId = u64;

#[derive(Debug, Clone)]
pub struct Chatroom {
    pub id: ChatroomId,
    pub uuid: String,
    /// None when the room was opened by the matching flow.
    pub start_member: Option<MemberId>,
    pub created_at: DateTime<Utc>,
}

/// Unordered member pair, normalized so `(a, b)` and `(b, a)` hash alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberPair(MemberId, MemberId);

impl MemberPair {
    pub fn new(a: MemberId, b: MemberId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }
}

#[derive(Default)]
pub struct ChatroomStore {
    rooms: HashMap<ChatroomId, Chatroom>,
    by_uuid: HashMap<String, ChatroomId>,
    by_pair: HashMap<MemberPair, ChatroomId>,
    last_id: ChatroomId,
}

impl ChatroomStore {
    /// Registers a new room and points the pair lookup at it.
    pub fn insert(
        &mut self,
        pair: MemberPair,
        start_member: Option<MemberId>,
        created_at: DateTime<Utc>,
    ) -> Chatroom {
        self.last_id += 1;
        let room = Chatroom {
            id: self.last_id,
            uuid: Uuid::new_v4().to_string(),
            start_member,
            created_at,
        };

        self.by_uuid.insert(room.uuid.clone(), room.id);
        self.by_pair.insert(pair, room.id);
        self.rooms.insert(room.id, room.clone());
        room
    }

    pub fn get(&self, id: ChatroomId) -> Option<&Chatroom> {
        self.rooms.get(&id)
    }

    pub fn find_by_uuid(&self, uuid: &str) -> Option<&Chatroom> {
        self.by_uuid.get(uuid).and_then(|id| self.rooms.get(id))
    }

    pub fn find_by_pair(&self, pair: MemberPair) -> Option<&Chatroom> {
        self.by_pair.get(&pair).and_then(|id| self.rooms.get(id))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_lookup_ignores_member_order() {
        let mut store = ChatroomStore::default();
        let room = store.insert(MemberPair::new(2, 1), Some(2), Utc::now());

        let found = store.find_by_pair(MemberPair::new(1, 2)).unwrap();
        assert_eq!(found.id, room.id);
        assert_eq!(store.find_by_uuid(&room.uuid).unwrap().id, room.id);
        assert!(store.find_by_pair(MemberPair::new(1, 3)).is_none());
    }

    #[test]
    fn newer_room_takes_over_pair_lookup() {
        let mut store = ChatroomStore::default();
        let first = store.insert(MemberPair::new(1, 2), Some(1), Utc::now());
        let second = store.insert(MemberPair::new(1, 2), None, Utc::now());

        assert_ne!(first.uuid, second.uuid);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find_by_pair(MemberPair::new(2, 1)).unwrap().id, second.id);
        assert!(store.find_by_uuid(&first.uuid).is_some());
    }
}
