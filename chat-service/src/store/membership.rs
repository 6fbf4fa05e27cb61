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

use super::chatroom::ChatroomId;

/// Whether a member currently takes part in a room.
///
/// `Exited` covers both "never joined" and "left"; the two behave the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Joined { since: DateTime<Utc> },
    Exited,
}

#[derive(Debug, Clone)]
pub struct Membership {
    pub member_id: MemberId,
    pub chatroom_id: ChatroomId,
    pub join_state: JoinState,
    /// Read cursor: messages created at or before this instant are read.
    pub last_view_date: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn new(member_id: MemberId, chatroom_id: ChatroomId, joined_at: Option<DateTime<Utc>>) -> Self {
        Self {
            member_id,
            chatroom_id,
            join_state: match joined_at {
                Some(since) => JoinState::Joined { since },
                None => JoinState::Exited,
            },
            last_view_date: None,
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.join_state, JoinState::Joined { .. })
    }

    #[cfg(test)]
    pub fn last_join_date(&self) -> Option<DateTime<Utc>> {
        match self.join_state {
            JoinState::Joined { since } => Some(since),
            JoinState::Exited => None,
        }
    }

    pub fn join(&mut self, since: DateTime<Utc>) {
        self.join_state = JoinState::Joined { since };
    }

    pub fn exit(&mut self) {
        self.join_state = JoinState::Exited;
    }

    pub fn view_until(&mut self, at: DateTime<Utc>) {
        self.last_view_date = Some(at);
    }
}

#[derive(Default)]
pub struct MembershipStore {
    rows: HashMap<(MemberId, ChatroomId), Membership>,
    by_room: HashMap<ChatroomId, Vec<MemberId>>,
    by_member: HashMap<MemberId, Vec<ChatroomId>>,
}

impl MembershipStore {
    /// Upsert keyed by (member, chatroom).
    pub fn upsert(&mut self, membership: Membership) {
        let key = (membership.member_id, membership.chatroom_id);
        if !self.rows.contains_key(&key) {
            self.by_room
                .entry(membership.chatroom_id)
                .or_default()
                .push(membership.member_id);
            self.by_member
                .entry(membership.member_id)
                .or_default()
                .push(membership.chatroom_id);
        }
        self.rows.insert(key, membership);
    }

    pub fn get(&self, member_id: MemberId, chatroom_id: ChatroomId) -> Option<&Membership> {
        self.rows.get(&(member_id, chatroom_id))
    }

    pub fn get_mut(&mut self, member_id: MemberId, chatroom_id: ChatroomId) -> Option<&mut Membership> {
        self.rows.get_mut(&(member_id, chatroom_id))
    }

    pub fn members_of(&self, chatroom_id: ChatroomId) -> &[MemberId] {
        self.by_room
            .get(&chatroom_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The other party of a two-member room.
    pub fn counterpart(&self, chatroom_id: ChatroomId, member_id: MemberId) -> Option<MemberId> {
        self.members_of(chatroom_id)
            .iter()
            .copied()
            .find(|other| *other != member_id)
    }

    /// Rooms the member is currently joined to, oldest first.
    pub fn joined_rooms(&self, member_id: MemberId) -> Vec<ChatroomId> {
        self.by_member
            .get(&member_id)
            .into_iter()
            .flatten()
            .copied()
            .filter(|room| self.get(member_id, *room).is_some_and(Membership::is_joined))
            .collect()
    }
}
