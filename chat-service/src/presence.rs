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

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use gamegoo_common::MemberId;
use tracing::{debug, warn};

/// A member became joined and their live socket should subscribe to the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    pub member_id: MemberId,
    pub chatroom_uuid: String,
}

#[async_trait]
pub trait PresenceNotifier: Send + Sync {
    async fn notify_join(&self, member_id: MemberId, chatroom_uuid: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SocketServerNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl SocketServerNotifier {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build socket-server http client")?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PresenceNotifier for SocketServerNotifier {
    async fn notify_join(&self, member_id: MemberId, chatroom_uuid: &str) -> anyhow::Result<()> {
        let url = self.endpoint("internal/socket/room/join");
        let payload = serde_json::json!({
            "member_id": member_id,
            "chatroom_uuid": chatroom_uuid,
        });

        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .context("failed to call socket-server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            anyhow::bail!("socket-server returned {status}: {body}");
        }

        Ok(())
    }
}

/// Delivers events produced by a committed command. Failures are logged and dropped.
pub async fn dispatch(notifier: &dyn PresenceNotifier, events: Vec<PresenceEvent>) {
    for event in events {
        match notifier
            .notify_join(event.member_id, &event.chatroom_uuid)
            .await
        {
            Ok(()) => debug!(
                member_id = event.member_id,
                chatroom_uuid = %event.chatroom_uuid,
                "socket joined to chatroom"
            ),
            Err(error) => warn!(
                member_id = event.member_id,
                chatroom_uuid = %event.chatroom_uuid,
                error = %error,
                "failed to join socket to chatroom"
            ),
        }
    }
}
