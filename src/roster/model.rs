//! Roster data as served by the upstream status API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// A single game server entry
///
/// Rebuilt on every fetch; has no identity across ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,

    /// Capacity
    pub max_players: i32,

    /// Current player count. Negative means the server did not report one.
    pub players: i32,

    pub map: String,

    /// Connect address handed to game clients
    #[serde(rename = "serverAddress", default)]
    pub server_address: String,

    /// Client version
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub addr: String,

    #[serde(default)]
    pub os: String,

    #[serde(rename = "isPassworded", default)]
    pub is_passworded: bool,

    /// Game build channel, e.g. "live" or "playtest"
    #[serde(rename = "gameVersion", default)]
    pub game_version: String,
}

impl ServerRecord {
    /// Whether this server may appear in rendered output
    pub fn is_listable(&self) -> bool {
        self.players >= 0 && !self.is_passworded
    }
}

/// Response body of the status endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RosterResponse {
    #[serde(default)]
    pub servers: Option<Vec<ServerRecord>>,
}

/// The roster as observed by one successful fetch
///
/// Servers are ordered by descending player count. Ties keep the order the
/// upstream returned them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSnapshot {
    fetched_at: DateTime<Utc>,
    servers: Vec<ServerRecord>,
}

impl RosterSnapshot {
    pub fn new(mut servers: Vec<ServerRecord>, fetched_at: DateTime<Utc>) -> Self {
        // sort_by_key is stable
        servers.sort_by_key(|s| Reverse(s.players));
        Self {
            fetched_at,
            servers,
        }
    }

    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), fetched_at)
    }

    pub fn servers(&self) -> &[ServerRecord] {
        &self.servers
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Servers that pass the listing filter, in roster order
    pub fn listable(&self) -> impl Iterator<Item = &ServerRecord> {
        self.servers.iter().filter(|s| s.is_listable())
    }
}

#[cfg(test)]
pub(crate) fn server(name: &str, players: i32, max_players: i32) -> ServerRecord {
    ServerRecord {
        name: name.to_string(),
        max_players,
        players,
        map: "Arena".to_string(),
        server_address: "127.0.0.1:7777".to_string(),
        version: "1.0".to_string(),
        addr: "127.0.0.1".to_string(),
        os: "linux".to_string(),
        is_passworded: false,
        game_version: "live".to_string(),
    }
}
