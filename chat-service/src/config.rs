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

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use gamegoo_common::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub socket_server_base_url: String,
    pub presence_timeout: Duration,
    pub page_size: usize,
    pub directory_seed_path: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("CHAT_SERVICE_BIND").unwrap_or_else(|| "0.0.0.0:8083".to_string());
        let bind_addr = bind
            .parse()
            .context("invalid CHAT_SERVICE_BIND")?;

        Ok(Self {
            bind_addr,
            socket_server_base_url: lookup("SOCKET_SERVER_BASE_URL")
                .unwrap_or_else(|| "http://socket-server:3000".to_string()),
            presence_timeout: Duration::from_millis(
                lookup("PRESENCE_TIMEOUT_MS")
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(3000)
                    .max(1),
            ),
            page_size: lookup("CHAT_PAGE_SIZE")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .max(1),
            directory_seed_path: lookup("DIRECTORY_SEED_PATH")
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        })
    }
}
