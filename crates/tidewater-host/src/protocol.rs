//! Wire messages between clients and a match session.

use serde::{Deserialize, Serialize};
use tidewater_core::board::PlayerId;
use tidewater_core::game::ErrorClass;
use tidewater_core::{PlayerAction, Snapshot};
use uuid::Uuid;

/// Client-to-host messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Take a seat, or reclaim one by presenting a previous token.
    Join {
        name: String,
        #[serde(default)]
        token: Option<Uuid>,
    },
    /// Submit a game action for the seat bound to this connection.
    Action { action: PlayerAction },
}

/// Host-to-client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Seat assignment plus the token that reclaims it after a drop.
    Joined { token: Uuid, seat: PlayerId },
    /// Full state, broadcast after every accepted action.
    Snapshot { state: Snapshot },
    /// A rejected message; state did not change.
    Error { class: ErrorClass, reason: String },
}
