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

mod chatroom;
mod membership;
mod message;

use chrono::{DateTime, Utc};
use gamegoo_common::MemberId;

pub use chatroom::{Chatroom, ChatroomStore, MemberPair};
pub use membership::{Membership, MembershipStore};
pub use message::{MessagePage, MessageRecord, MessageStore, NewMessage};

/// All chat state. Held behind a single lock so each command commits as a unit.
#[derive(Default)]
pub struct ChatStore {
    pub chatrooms: ChatroomStore,
    pub memberships: MembershipStore,
    pub messages: MessageStore,
}

impl ChatStore {
    /// Creates a room together with both of its memberships.
    ///
    /// `joined_at` pre-joins both members (matching); None leaves both exited.
    pub fn open_pair_room(
        &mut self,
        members: [MemberId; 2],
        start_member: Option<MemberId>,
        joined_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Chatroom {
        let room = self
            .chatrooms
            .insert(MemberPair::new(members[0], members[1]), start_member, now);
        for member_id in members {
            self.memberships
                .upsert(Membership::new(member_id, room.id, joined_at));
        }
        room
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_pair_room_creates_exactly_two_memberships() {
        let mut store = ChatStore::default();
        let room = store.open_pair_room([1, 2], Some(1), None, Utc::now());

        assert_eq!(store.memberships.members_of(room.id), &[1, 2]);
        assert!(!store.memberships.get(1, room.id).unwrap().is_joined());
        assert!(!store.memberships.get(2, room.id).unwrap().is_joined());
        assert_eq!(
            store.chatrooms.find_by_pair(MemberPair::new(2, 1)).map(|r| r.id),
            Some(room.id)
        );
    }

    #[test]
    fn pre_joined_rooms_leave_cursors_empty() {
        let mut store = ChatStore::default();
        let now = Utc::now();
        let room = store.open_pair_room([3, 4], None, Some(now), now);

        for member_id in [3, 4] {
            let membership = store.memberships.get(member_id, room.id).unwrap();
            assert_eq!(membership.last_join_date(), Some(now));
            assert_eq!(membership.last_view_date, None);
        }
        assert_eq!(room.start_member, None);
    }
}
