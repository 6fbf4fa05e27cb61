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

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type MemberId = i64;
pub type ListingId = i64;

/// Author of every system message. Must exist in the member directory.
pub const SYSTEM_MEMBER_ID: MemberId = 0;
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const WITHDRAWN_MEMBER_NAME: &str = "(withdrawn member)";

pub const LISTING_SYSTEM_MESSAGE_TO_MEMBER_INIT: &str =
    "You reached out after seeing their post. Start the conversation!";
pub const LISTING_SYSTEM_MESSAGE_TO_MEMBER: &str = "You reached out after seeing their post.";
pub const LISTING_SYSTEM_MESSAGE_TO_TARGET_MEMBER: &str =
    "Someone reached out after seeing your post.";

/// Tells the client which system-message wording to request on its next send.
///
/// Travels as a bare integer (`1` or `2`) on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "u8", try_from = "u8")]
pub enum ContactFlag {
    /// The requester has never been (or is no longer) joined to the room.
    Initial = 1,
    /// The requester is already joined and is contacting again.
    Repeat = 2,
}

impl From<ContactFlag> for u8 {
    fn from(flag: ContactFlag) -> Self {
        flag as u8
    }
}

impl TryFrom<u8> for ContactFlag {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ContactFlag::Initial),
            2 => Ok(ContactFlag::Repeat),
            other => Err(format!("unsupported system flag {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub game_name: String,
    #[serde(default)]
    pub profile_image: i32,
    #[serde(default)]
    pub blind: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub id: ListingId,
    pub author_id: MemberId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemFlag {
    pub flag: ContactFlag,
    pub board_id: ListingId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
    /// Present when the client wants the listing-contact system messages
    /// injected ahead of this message.
    #[serde(default)]
    pub system: Option<SystemFlag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatroomByMatchRequest {
    pub member_list: Vec<MemberId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatroomCreatedResponse {
    pub uuid: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveChatroomsResponse {
    pub uuids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatroomEnterResponse {
    pub uuid: String,
    pub member_id: MemberId,
    pub game_name: String,
    pub member_profile_img: i32,
    pub friend: bool,
    pub blocked: bool,
    #[serde(default)]
    pub system: Option<SystemFlag>,
    #[serde(default)]
    pub chat_message_list: Option<ChatMessageList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageList {
    /// Newest first.
    pub chat_message_dto_list: Vec<ChatMessage>,
    pub list_size: usize,
    pub has_next: bool,
    /// Timestamp of the oldest message in this page, set only when `has_next`.
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChatMessage {
    System(SystemMessage),
    User(UserMessage),
}

impl ChatMessage {
    pub fn timestamp(&self) -> i64 {
        match self {
            ChatMessage::System(message) => message.timestamp,
            ChatMessage::User(message) => message.timestamp,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ChatMessage::System(message) => &message.message,
            ChatMessage::User(message) => &message.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserMessage {
    pub sender_id: MemberId,
    pub sender_name: String,
    pub sender_profile_img: i32,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMessage {
    pub sender_id: MemberId,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub timestamp: i64,
    pub board_id: Option<ListingId>,
    pub system_type: ContactFlag,
}

/// Echo of a freshly persisted message, returned to the sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCreateResponse {
    pub sender_id: MemberId,
    pub sender_name: String,
    pub sender_profile_img: i32,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub timestamp: i64,
}

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}
