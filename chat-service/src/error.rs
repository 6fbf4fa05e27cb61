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

use axum::http::StatusCode;
use gamegoo_common::{ListingId, MemberId};
use thiserror::Error;

use crate::policy::Denial;

/// Which kind of command a block denial interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    Start,
    Send,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("member {0} not found")]
    MemberNotFound(MemberId),

    #[error("chat target member {0} not found")]
    TargetNotFound(MemberId),

    #[error("board {0} not found")]
    ListingNotFound(ListingId),

    #[error("chatroom {0} does not exist")]
    ChatroomNotFound(String),

    #[error("chat message with timestamp {0} not found")]
    MessageNotFound(i64),

    #[error("member {member_id} has no access to chatroom {uuid}")]
    AccessDenied { member_id: MemberId, uuid: String },

    #[error("cannot start a chat with yourself")]
    SelfTarget,

    #[error("member {0} is deactivated")]
    TargetDeactivated(MemberId),

    #[error("{}", blocked_message(.denial, .phase))]
    Blocked { denial: Denial, phase: ChatPhase },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("collaborator failure: {0:#}")]
    Collaborator(#[from] anyhow::Error),
}

fn blocked_message(denial: &Denial, phase: &ChatPhase) -> &'static str {
    match (*denial, *phase) {
        (Denial::CallerBlocksTarget, ChatPhase::Start) => {
            "you blocked this member, so the chat cannot be opened"
        }
        (Denial::BlockedByTarget, ChatPhase::Start) => {
            "this member blocked you, so the chat cannot be opened"
        }
        (Denial::CallerBlocksTarget, ChatPhase::Send) => {
            "you blocked this member, so the message cannot be sent"
        }
        (Denial::BlockedByTarget, ChatPhase::Send) => {
            "this member blocked you, so the message cannot be sent"
        }
    }
}

impl ChatError {
    pub fn blocked(denial: Denial, phase: ChatPhase) -> Self {
        ChatError::Blocked { denial, phase }
    }

    /// Stable code surfaced to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::MemberNotFound(_) => "MEMBER404",
            ChatError::TargetNotFound(_) => "CHAT4041",
            ChatError::ListingNotFound(_) => "BOARD404",
            ChatError::ChatroomNotFound(_) => "CHAT4042",
            ChatError::MessageNotFound(_) => "CHAT4043",
            ChatError::AccessDenied { .. } => "CHAT4031",
            ChatError::SelfTarget => "CHAT4001",
            ChatError::TargetDeactivated(_) => "MEMBER403",
            ChatError::Blocked { denial, phase } => match (denial, phase) {
                (Denial::CallerBlocksTarget, ChatPhase::Start) => "CHAT4032",
                (Denial::BlockedByTarget, ChatPhase::Start) => "CHAT4033",
                (Denial::CallerBlocksTarget, ChatPhase::Send) => "CHAT4034",
                (Denial::BlockedByTarget, ChatPhase::Send) => "CHAT4035",
            },
            ChatError::BadRequest(_) => "COMMON400",
            ChatError::Collaborator(_) => "COMMON500",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::MemberNotFound(_)
            | ChatError::TargetNotFound(_)
            | ChatError::ListingNotFound(_)
            | ChatError::ChatroomNotFound(_)
            | ChatError::MessageNotFound(_) => StatusCode::NOT_FOUND,
            ChatError::AccessDenied { .. }
            | ChatError::TargetDeactivated(_)
            | ChatError::Blocked { .. } => StatusCode::FORBIDDEN,
            ChatError::SelfTarget | ChatError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::Collaborator(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_denials_have_distinct_codes_per_phase() {
        let codes = [
            ChatError::blocked(Denial::CallerBlocksTarget, ChatPhase::Start).code(),
            ChatError::blocked(Denial::BlockedByTarget, ChatPhase::Start).code(),
            ChatError::blocked(Denial::CallerBlocksTarget, ChatPhase::Send).code(),
            ChatError::blocked(Denial::BlockedByTarget, ChatPhase::Send).code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn collaborator_failures_are_internal_errors() {
        let error = ChatError::from(anyhow::anyhow!("directory offline"));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error.to_string().contains("directory offline"));
    }
}
