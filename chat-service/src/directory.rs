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

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use gamegoo_common::{Listing, ListingId, Member, MemberId, SYSTEM_MEMBER_ID, expand_env_vars};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn find_member(&self, member_id: MemberId) -> anyhow::Result<Option<Member>>;
}

#[async_trait]
pub trait BlockDirectory: Send + Sync {
    async fn is_blocked(&self, blocker: MemberId, blockee: MemberId) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait FriendDirectory: Send + Sync {
    async fn is_friend(&self, a: MemberId, b: MemberId) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn find_listing(&self, listing_id: ListingId) -> anyhow::Result<Option<Listing>>;
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BlockEntry {
    pub blocker: MemberId,
    pub blockee: MemberId,
}

#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub blocks: Vec<BlockEntry>,
    #[serde(default)]
    pub friends: Vec<[MemberId; 2]>,
    #[serde(default)]
    pub boards: Vec<Listing>,
}

#[derive(Default)]
struct DirectoryData {
    members: HashMap<MemberId, Member>,
    blocks: HashSet<(MemberId, MemberId)>,
    friends: HashSet<(MemberId, MemberId)>,
    listings: HashMap<ListingId, Listing>,
}

fn friend_key(a: MemberId, b: MemberId) -> (MemberId, MemberId) {
    if a <= b { (a, b) } else { (b, a) }
}

pub fn system_member() -> Member {
    Member {
        id: SYSTEM_MEMBER_ID,
        game_name: "SYSTEM".to_string(),
        profile_image: 0,
        blind: false,
    }
}

/// In-process stand-in for the member, block, friend and board services.
///
/// Always carries the system member so system messages have a real sender.
pub struct SeededDirectory {
    data: RwLock<DirectoryData>,
}

impl Default for SeededDirectory {
    fn default() -> Self {
        Self::from_seed(DirectorySeed::default())
    }
}

impl SeededDirectory {
    pub fn from_seed(seed: DirectorySeed) -> Self {
        let mut data = DirectoryData::default();
        data.members.insert(SYSTEM_MEMBER_ID, system_member());
        for member in seed.members {
            data.members.insert(member.id, member);
        }
        for block in seed.blocks {
            data.blocks.insert((block.blocker, block.blockee));
        }
        for [a, b] in seed.friends {
            data.friends.insert(friend_key(a, b));
        }
        for listing in seed.boards {
            data.listings.insert(listing.id, listing);
        }

        Self {
            data: RwLock::new(data),
        }
    }

    #[cfg(test)]
    pub async fn upsert_member(&self, member: Member) {
        self.data.write().await.members.insert(member.id, member);
    }

    #[cfg(test)]
    pub async fn block(&self, blocker: MemberId, blockee: MemberId) {
        self.data.write().await.blocks.insert((blocker, blockee));
    }

    #[cfg(test)]
    pub async fn unblock(&self, blocker: MemberId, blockee: MemberId) {
        self.data.write().await.blocks.remove(&(blocker, blockee));
    }
}

#[async_trait]
impl MemberDirectory for SeededDirectory {
    async fn find_member(&self, member_id: MemberId) -> anyhow::Result<Option<Member>> {
        Ok(self.data.read().await.members.get(&member_id).cloned())
    }
}

#[async_trait]
impl BlockDirectory for SeededDirectory {
    async fn is_blocked(&self, blocker: MemberId, blockee: MemberId) -> anyhow::Result<bool> {
        Ok(self.data.read().await.blocks.contains(&(blocker, blockee)))
    }
}

#[async_trait]
impl FriendDirectory for SeededDirectory {
    async fn is_friend(&self, a: MemberId, b: MemberId) -> anyhow::Result<bool> {
        Ok(self.data.read().await.friends.contains(&friend_key(a, b)))
    }
}

#[async_trait]
impl ListingStore for SeededDirectory {
    async fn find_listing(&self, listing_id: ListingId) -> anyhow::Result<Option<Listing>> {
        Ok(self.data.read().await.listings.get(&listing_id).cloned())
    }
}

pub fn parse_directory_seed(raw: &str) -> Result<DirectorySeed, serde_yaml::Error> {
    serde_yaml::from_str::<DirectorySeed>(&expand_env_vars(raw))
}

pub fn load_directory_seed(path: Option<&str>) -> DirectorySeed {
    let Some(path) = path.map(str::trim).filter(|value| !value.is_empty()) else {
        return DirectorySeed::default();
    };

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read directory seed file");
            return DirectorySeed::default();
        }
    };

    if raw.trim().is_empty() {
        warn!(path = %path, "directory seed file is empty");
        return DirectorySeed::default();
    }

    match parse_directory_seed(&raw) {
        Ok(seed) => {
            info!(
                path = %path,
                members = seed.members.len(),
                blocks = seed.blocks.len(),
                friends = seed.friends.len(),
                boards = seed.boards.len(),
                "loaded directory seed"
            );
            seed
        }
        Err(error) => {
            warn!(path = %path, error = %error, "failed to parse directory seed yaml");
            DirectorySeed::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"
members:
  - id: 1
    game_name: faker
    profile_image: 3
  - id: 2
    game_name: chovy
  - id: 1000
    game_name: gone
    blind: true
blocks:
  - blocker: 2
    blockee: 1
friends:
  - [2, 1]
boards:
  - id: 7
    author_id: 2
    title: "duo queue tonight"
"#;

    #[tokio::test]
    async fn seed_yaml_populates_every_directory() {
        let directory = SeededDirectory::from_seed(parse_directory_seed(SEED).unwrap());

        let faker = directory.find_member(1).await.unwrap().unwrap();
        assert_eq!(faker.game_name, "faker");
        assert_eq!(faker.profile_image, 3);
        assert!(directory.find_member(1000).await.unwrap().unwrap().blind);

        assert!(directory.is_blocked(2, 1).await.unwrap());
        assert!(!directory.is_blocked(1, 2).await.unwrap());
        assert!(directory.is_friend(1, 2).await.unwrap());

        let listing = directory.find_listing(7).await.unwrap().unwrap();
        assert_eq!(listing.author_id, 2);
    }

    #[tokio::test]
    async fn system_member_is_always_provisioned() {
        let directory = SeededDirectory::default();
        let system = directory.find_member(SYSTEM_MEMBER_ID).await.unwrap();
        assert_eq!(system, Some(system_member()));
    }

    #[tokio::test]
    async fn block_and_unblock_toggle_one_direction() {
        let directory = SeededDirectory::default();
        directory.block(1, 2).await;
        assert!(directory.is_blocked(1, 2).await.unwrap());
        assert!(!directory.is_blocked(2, 1).await.unwrap());

        directory.unblock(1, 2).await;
        assert!(!directory.is_blocked(1, 2).await.unwrap());
    }

    #[test]
    fn missing_seed_path_yields_empty_seed() {
        let seed = load_directory_seed(None);
        assert!(seed.members.is_empty());
        let seed = load_directory_seed(Some("/definitely/not/here.yaml"));
        assert!(seed.boards.is_empty());
    }
}
