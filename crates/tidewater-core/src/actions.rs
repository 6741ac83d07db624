//! Player actions and the serializable game snapshot.

use serde::{Deserialize, Serialize};

use crate::board::{BoardGraph, EdgeId, HexDef, HexId, PlayerId, PortDef, VertexId};
use crate::game::Phase;
use crate::player::{Player, Resource, ResourceHand};

/// What a `Build` action places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildKind {
    Settlement,
    City,
    Road,
}

/// Everything a player (or the lobby host) can ask the game to do.
///
/// `target` in `Build` is a vertex id for settlements and cities, an edge
/// id for roads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerAction {
    /// Leave the lobby and begin setup
    Start,
    RollDice,
    Build {
        kind: BuildKind,
        target: u16,
    },
    MoveRobber {
        hex: HexId,
        /// `None` forgoes the theft
        steal_from: Option<PlayerId>,
    },
    PlayKnight {
        hex: HexId,
        steal_from: Option<PlayerId>,
    },
    PlayMonopoly {
        resource: Resource,
    },
    PlayYearOfPlenty {
        first: Resource,
        second: Resource,
    },
    PlayRoadBuilding,
    BuyDevCard,
    DiscardCards {
        cards: ResourceHand,
    },
    /// Bank exchange at the player's best port rate
    Trade {
        give: Resource,
        receive: Resource,
    },
    EndTurn,
    /// Replace the board while still in the lobby
    SetCustomBoard {
        hexes: Vec<HexDef>,
        ports: Vec<PortDef>,
    },
    /// Back to the lobby, same seats, fresh board
    Reset,
    /// Debug faucet: hand a player free resources
    Grant {
        player: PlayerId,
        cards: ResourceHand,
    },
}

/// One placed building in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingEntry {
    pub vertex: VertexId,
    pub owner: PlayerId,
    pub is_city: bool,
}

/// One placed road in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEntry {
    pub edge: EdgeId,
    pub owner: PlayerId,
}

/// Full serializable view of a game, broadcast after every accepted action.
///
/// Buildings and roads are flattened to sorted lists; JSON maps need
/// string keys and clients want stable ordering anyway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub board: BoardGraph,
    pub players: Vec<Player>,
    pub phase: Phase,
    pub buildings: Vec<BuildingEntry>,
    pub roads: Vec<RoadEntry>,
    pub robber: HexId,
    pub last_roll: Option<u8>,
    pub turn_number: u32,
    pub log: Vec<String>,
    pub winner: Option<PlayerId>,
}
