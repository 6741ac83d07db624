//! Rule engine for a hex-and-harbor settlement game.
//!
//! The crate is transport-agnostic: [`game::Game`] owns all state, every
//! mutation goes through [`game::Game::apply`], and
//! [`game::Game::snapshot`] produces the serializable view clients render.
//! Board topology is resolved once by [`board::BoardGraph::resolve`] and
//! immutable afterwards.

pub mod actions;
pub mod board;
pub mod game;
pub mod geometry;
pub mod player;
pub mod rules;

pub use actions::{BuildKind, PlayerAction, Snapshot};
pub use board::{BoardGraph, EdgeId, HexDef, HexId, HexKind, PlayerId, PortDef, VertexId};
pub use game::{Game, GameError, Phase, SetupPlacing, TurnStage};
pub use player::{DevCard, Player, Resource, ResourceHand};
