//! The game itself: lobby, setup snake, turn loop and win detection.
//!
//! All mutation flows through [`Game::apply`]. An action either commits
//! fully or returns a [`GameError`] leaving the state untouched; callers
//! can therefore broadcast a fresh snapshot after every `Ok`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::{BuildKind, BuildingEntry, PlayerAction, RoadEntry, Snapshot};
use crate::board::{BoardError, BoardGraph, EdgeId, HexId, PlayerId, VertexId};
use crate::player::{costs, DevCard, Player, Resource, ResourceHand};
use crate::rules::{self, Building, RoadOwners, VertexOwners};

pub const WINNING_SCORE: u32 = 10;
pub const MIN_LONGEST_ROAD: u32 = 5;
pub const MIN_LARGEST_ARMY: u32 = 3;
/// Hands above this size must discard down to it when a 7 is rolled.
pub const HAND_LIMIT: u32 = 7;
pub const MAX_PLAYERS: usize = 4;
pub const MIN_PLAYERS: usize = 2;

/// What the setup snake is waiting for from the active player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SetupPlacing {
    Settlement,
    /// A road incident to the settlement just placed
    Road { settlement: VertexId },
}

/// Sub-state of a normal turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum TurnStage {
    AwaitingRoll,
    /// A 7 was rolled; these players still owe a discard
    Discarding { remaining: Vec<PlayerId> },
    MovingRobber,
    /// The main stage. `free_roads` > 0 while Road Building resolves and
    /// blocks every other action.
    Building { free_roads: u8 },
}

/// Top-level game phase. Exactly one player is ever active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum Phase {
    Lobby,
    Setup {
        player: PlayerId,
        /// 1 (forward pass) or 2 (backward pass)
        round: u8,
        placing: SetupPlacing,
    },
    Turn {
        player: PlayerId,
        stage: TurnStage,
        /// One development card per turn
        dev_played: bool,
    },
    Finished {
        winner: PlayerId,
    },
}

/// Coarse classification of a rejection, for transport-level reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    /// The request itself was unintelligible
    Malformed,
    /// Well-formed but against the rules in this state
    Illegal,
    /// Was plausibly legal a moment ago; the state moved on
    StateConflict,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "camelCase")]
pub enum GameError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("that action does not apply in the current phase")]
    WrongPhase,

    #[error("that spot is already occupied")]
    Occupied,

    #[error("settlements need every adjacent vertex empty")]
    DistanceRule,

    #[error("piece does not connect to your network")]
    NotConnected,

    #[error("you cannot afford that")]
    CannotAfford,

    #[error("no pieces of that kind remaining")]
    NoPiecesRemaining,

    #[error("the development deck is empty")]
    EmptyDeck,

    #[error("you do not hold that card")]
    NoSuchCard,

    #[error("you already played a development card this turn")]
    DevAlreadyPlayed,

    #[error("target does not exist or is not eligible")]
    InvalidTarget,

    #[error("discard must match what you owe, from cards you hold")]
    InvalidDiscard,

    #[error("gold cannot be traded")]
    GoldNotTradeable,

    #[error("the lobby is full")]
    LobbyFull,

    #[error("not enough players to start")]
    NotEnoughPlayers,

    #[error("finish placing your free roads first")]
    FreeRoadsPending,

    #[error("that action was overtaken by the current state")]
    StaleAction,

    #[error("the game is over")]
    GameOver,

    #[error("invalid board: {0}")]
    Board(#[from] BoardError),
}

impl GameError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GameError::Malformed(_) => ErrorClass::Malformed,
            // Only actions overtaken by state that already moved on;
            // not-your-turn and wrong-phase are plain rule violations.
            GameError::StaleAction | GameError::GameOver => ErrorClass::StateConflict,
            _ => ErrorClass::Illegal,
        }
    }
}

/// A running match. Not serialized directly; [`Game::snapshot`] is the
/// wire form.
#[derive(Debug, Clone)]
pub struct Game {
    board: BoardGraph,
    pub players: Vec<Player>,
    phase: Phase,
    buildings: VertexOwners,
    roads: RoadOwners,
    robber: HexId,
    dev_deck: Vec<DevCard>,
    last_roll: Option<u8>,
    turn_number: u32,
    log: Vec<String>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self::with_board(BoardGraph::standard())
    }

    pub fn with_board(board: BoardGraph) -> Self {
        let robber = board.desert_hex().unwrap_or(HexId(0));
        Self {
            board,
            players: Vec::new(),
            phase: Phase::Lobby,
            buildings: VertexOwners::new(),
            roads: RoadOwners::new(),
            robber,
            dev_deck: DevCard::standard_deck(),
            last_roll: None,
            turn_number: 0,
            log: Vec::new(),
        }
    }

    pub fn board(&self) -> &BoardGraph {
        &self.board
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn robber(&self) -> HexId {
        self.robber
    }

    pub fn building_at(&self, vertex: VertexId) -> Option<Building> {
        self.buildings.get(&vertex).copied()
    }

    pub fn road_at(&self, edge: EdgeId) -> Option<PlayerId> {
        self.roads.get(&edge).copied()
    }

    /// Seat a new player. Only possible while in the lobby.
    pub fn join(&mut self, name: &str) -> Result<PlayerId, GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::WrongPhase);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::LobbyFull);
        }
        let id = self.players.len() as PlayerId;
        self.players.push(Player::new(id, name.to_string()));
        self.log.push(format!("{} joined", name));
        Ok(id)
    }

    /// Victory points for one player: buildings, titles and VP cards.
    pub fn score(&self, player: PlayerId) -> u32 {
        let p = match self.players.iter().find(|p| p.id == player) {
            Some(p) => p,
            None => return 0,
        };
        let mut score = p.settlements.len() as u32 + 2 * p.cities.len() as u32;
        if p.has_longest_road {
            score += 2;
        }
        if p.has_largest_army {
            score += 2;
        }
        score + p.victory_card_points()
    }

    pub fn apply(&mut self, player: PlayerId, action: PlayerAction) -> Result<(), GameError> {
        self.apply_with_rng(player, action, &mut rand::thread_rng())
    }

    pub fn apply_with_rng<R: Rng>(
        &mut self,
        player: PlayerId,
        action: PlayerAction,
        rng: &mut R,
    ) -> Result<(), GameError> {
        if (player as usize) >= self.players.len() {
            return Err(GameError::Malformed(format!(
                "player {} is not seated",
                player
            )));
        }

        match action {
            PlayerAction::Start => self.start(rng),
            PlayerAction::SetCustomBoard { hexes, ports } => self.set_custom_board(&hexes, &ports),
            PlayerAction::Reset => self.reset(rng),
            PlayerAction::Grant { player, cards } => self.grant(player, &cards),
            PlayerAction::RollDice => self.roll_dice(player, rng),
            PlayerAction::Build { kind, target } => self.build(player, kind, target),
            PlayerAction::MoveRobber { hex, steal_from } => {
                self.require_stage(player, |s| *s == TurnStage::MovingRobber)?;
                self.move_robber(player, hex, steal_from, rng)?;
                self.set_stage(TurnStage::Building { free_roads: 0 });
                Ok(())
            }
            PlayerAction::PlayKnight { hex, steal_from } => {
                self.play_knight(player, hex, steal_from, rng)
            }
            PlayerAction::PlayMonopoly { resource } => self.play_monopoly(player, resource),
            PlayerAction::PlayYearOfPlenty { first, second } => {
                self.play_year_of_plenty(player, first, second)
            }
            PlayerAction::PlayRoadBuilding => self.play_road_building(player),
            PlayerAction::BuyDevCard => self.buy_dev_card(player),
            PlayerAction::DiscardCards { cards } => self.discard(player, &cards),
            PlayerAction::Trade { give, receive } => self.trade(player, give, receive),
            PlayerAction::EndTurn => self.end_turn(player),
        }
    }

    // ==================== Lobby ====================

    fn start<R: Rng>(&mut self, rng: &mut R) -> Result<(), GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::WrongPhase);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        self.dev_deck.shuffle(rng);
        self.phase = Phase::Setup {
            player: 0,
            round: 1,
            placing: SetupPlacing::Settlement,
        };
        self.log.push("game started".to_string());
        Ok(())
    }

    fn set_custom_board(
        &mut self,
        hexes: &[crate::board::HexDef],
        ports: &[crate::board::PortDef],
    ) -> Result<(), GameError> {
        if self.phase != Phase::Lobby {
            return Err(GameError::WrongPhase);
        }
        let board = BoardGraph::resolve(hexes, ports)?;
        self.robber = board.desert_hex().unwrap_or(HexId(0));
        self.board = board;
        self.log.push("custom board installed".to_string());
        Ok(())
    }

    /// Back to the lobby: seats survive, everything else starts over.
    fn reset<R: Rng>(&mut self, rng: &mut R) -> Result<(), GameError> {
        self.board = BoardGraph::standard_with_rng(rng);
        self.robber = self.board.desert_hex().unwrap_or(HexId(0));
        for player in &mut self.players {
            *player = Player::new(player.id, player.name.clone());
        }
        self.buildings.clear();
        self.roads.clear();
        self.dev_deck = DevCard::standard_deck();
        self.last_roll = None;
        self.turn_number = 0;
        self.log.clear();
        self.phase = Phase::Lobby;
        self.log.push("game reset".to_string());
        Ok(())
    }

    /// Debug faucet.
    fn grant(&mut self, target: PlayerId, cards: &ResourceHand) -> Result<(), GameError> {
        if matches!(self.phase, Phase::Finished { .. }) {
            return Err(GameError::GameOver);
        }
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == target)
            .ok_or(GameError::InvalidTarget)?;
        player.resources.add_hand(cards);
        self.log.push(format!("{} granted resources", player.name));
        Ok(())
    }

    // ==================== Turn sequencing ====================

    /// Check the action comes from the turn's active player in an
    /// acceptable stage. `RollDice` after rolling and similar re-sends map
    /// to `StaleAction`.
    fn require_stage(
        &self,
        actor: PlayerId,
        ok: impl Fn(&TurnStage) -> bool,
    ) -> Result<(), GameError> {
        match &self.phase {
            Phase::Turn { player, stage, .. } => {
                if *player != actor {
                    Err(GameError::NotYourTurn)
                } else if ok(stage) {
                    Ok(())
                } else if matches!(stage, TurnStage::Building { free_roads } if *free_roads > 0) {
                    Err(GameError::FreeRoadsPending)
                } else {
                    Err(GameError::StaleAction)
                }
            }
            Phase::Finished { .. } => Err(GameError::GameOver),
            _ => Err(GameError::WrongPhase),
        }
    }

    fn set_stage(&mut self, new_stage: TurnStage) {
        if let Phase::Turn { stage, .. } = &mut self.phase {
            *stage = new_stage;
        }
    }

    fn roll_dice<R: Rng>(&mut self, actor: PlayerId, rng: &mut R) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::AwaitingRoll)?;
        let roll = rng.gen_range(1..=6) + rng.gen_range(1..=6);
        self.resolve_roll(actor, roll);
        Ok(())
    }

    /// Apply a known roll value. Split from the dice so the 7-path can be
    /// driven deterministically.
    fn resolve_roll(&mut self, actor: PlayerId, roll: u8) {
        self.last_roll = Some(roll);
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} rolled {}", name, roll));

        if roll == 7 {
            let owing: Vec<PlayerId> = self
                .players
                .iter()
                .filter(|p| p.resources.total() > HAND_LIMIT)
                .map(|p| p.id)
                .collect();
            if owing.is_empty() {
                self.set_stage(TurnStage::MovingRobber);
            } else {
                self.set_stage(TurnStage::Discarding { remaining: owing });
            }
            return;
        }

        let payouts = rules::roll_payout(&self.board, &self.buildings, self.robber, roll);
        for (player_id, gains) in payouts {
            let player = &mut self.players[player_id as usize];
            for (resource, count) in gains {
                player.resources.add(resource, count);
            }
        }
        self.set_stage(TurnStage::Building { free_roads: 0 });
    }

    fn discard(&mut self, actor: PlayerId, cards: &ResourceHand) -> Result<(), GameError> {
        let remaining = match &self.phase {
            Phase::Turn {
                stage: TurnStage::Discarding { remaining },
                ..
            } => remaining.clone(),
            Phase::Turn { .. } => return Err(GameError::StaleAction),
            Phase::Finished { .. } => return Err(GameError::GameOver),
            _ => return Err(GameError::WrongPhase),
        };
        if !remaining.contains(&actor) {
            // Already discarded, or was never required to.
            return Err(GameError::StaleAction);
        }

        let hand = &self.players[actor as usize].resources;
        let owed = hand.total() - HAND_LIMIT;
        if cards.total() != owed || !hand.can_afford(cards) {
            return Err(GameError::InvalidDiscard);
        }

        self.players[actor as usize].resources.subtract(cards);
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} discarded {} cards", name, owed));

        let remaining: Vec<PlayerId> = remaining.into_iter().filter(|&p| p != actor).collect();
        if remaining.is_empty() {
            self.set_stage(TurnStage::MovingRobber);
        } else {
            self.set_stage(TurnStage::Discarding { remaining });
        }
        Ok(())
    }

    /// Relocate the robber and optionally steal. Moving it to the hex it
    /// already occupies is legal and changes nothing but the theft.
    fn move_robber<R: Rng>(
        &mut self,
        actor: PlayerId,
        hex: HexId,
        steal_from: Option<PlayerId>,
        rng: &mut R,
    ) -> Result<(), GameError> {
        if self.board.hex(hex).is_none() {
            return Err(GameError::InvalidTarget);
        }
        if let Some(victim) = steal_from {
            let candidates =
                rules::theft_candidates(&self.board, &self.buildings, &self.players, hex, actor);
            if !candidates.contains(&victim) {
                return Err(GameError::InvalidTarget);
            }
        }

        self.robber = hex;
        if let Some(victim) = steal_from {
            let stolen = self.players[victim as usize].resources.steal_random(rng);
            if let Some(resource) = stolen {
                self.players[actor as usize].resources.add(resource, 1);
                let thief = self.players[actor as usize].name.clone();
                let victim = self.players[victim as usize].name.clone();
                self.log
                    .push(format!("{} stole a {:?} from {}", thief, resource, victim));
            }
        } else {
            let name = self.players[actor as usize].name.clone();
            self.log.push(format!("{} moved the robber", name));
        }
        Ok(())
    }

    fn end_turn(&mut self, actor: PlayerId) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        self.players[actor as usize].end_turn();
        let next = (actor + 1) % self.players.len() as PlayerId;
        self.turn_number += 1;
        self.phase = Phase::Turn {
            player: next,
            stage: TurnStage::AwaitingRoll,
            dev_played: false,
        };
        Ok(())
    }

    // ==================== Building ====================

    fn build(&mut self, actor: PlayerId, kind: BuildKind, target: u16) -> Result<(), GameError> {
        match self.phase.clone() {
            Phase::Setup {
                player,
                round,
                placing,
            } => {
                if player != actor {
                    return Err(GameError::NotYourTurn);
                }
                match (kind, placing) {
                    (BuildKind::Settlement, SetupPlacing::Settlement) => {
                        self.place_setup_settlement(actor, round, VertexId(target))
                    }
                    (BuildKind::Road, SetupPlacing::Road { settlement }) => {
                        self.place_setup_road(actor, round, settlement, EdgeId(target))
                    }
                    _ => Err(GameError::WrongPhase),
                }
            }
            Phase::Turn { .. } => match kind {
                BuildKind::Road => self.build_road(actor, EdgeId(target)),
                BuildKind::Settlement => self.build_settlement(actor, VertexId(target)),
                BuildKind::City => self.build_city(actor, VertexId(target)),
            },
            Phase::Finished { .. } => Err(GameError::GameOver),
            Phase::Lobby => Err(GameError::WrongPhase),
        }
    }

    fn place_setup_settlement(
        &mut self,
        actor: PlayerId,
        round: u8,
        vertex: VertexId,
    ) -> Result<(), GameError> {
        if self.board.vertex(vertex).is_none() {
            return Err(GameError::InvalidTarget);
        }
        if self.buildings.contains_key(&vertex) {
            return Err(GameError::Occupied);
        }
        if !rules::distance_rule_ok(&self.board, &self.buildings, vertex) {
            return Err(GameError::DistanceRule);
        }

        self.buildings.insert(vertex, Building::Settlement(actor));
        self.players[actor as usize].settlements.push(vertex);

        // The second settlement comes with one card per adjacent
        // producing hex.
        if round == 2 {
            for &hex_id in &self.board.vertex(vertex).unwrap().hexes.clone() {
                if let Some(resource) = self.board.hex(hex_id).and_then(|h| h.resource()) {
                    self.players[actor as usize].resources.add(resource, 1);
                }
            }
        }

        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} placed a settlement", name));
        self.phase = Phase::Setup {
            player: actor,
            round,
            placing: SetupPlacing::Road { settlement: vertex },
        };
        Ok(())
    }

    fn place_setup_road(
        &mut self,
        actor: PlayerId,
        round: u8,
        settlement: VertexId,
        edge: EdgeId,
    ) -> Result<(), GameError> {
        let edge_rec = self.board.edge(edge).ok_or(GameError::InvalidTarget)?;
        if self.roads.contains_key(&edge) {
            return Err(GameError::Occupied);
        }
        // The setup road must leave the settlement just placed.
        if !edge_rec.endpoints.contains(&settlement) {
            return Err(GameError::NotConnected);
        }

        self.roads.insert(edge, actor);
        self.players[actor as usize].roads.push(edge);
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} placed a road", name));

        self.phase = self.advance_setup(actor, round);
        Ok(())
    }

    /// Snake order: 0..n-1 forward, then n-1..0 backward, then player 0
    /// opens the first turn.
    fn advance_setup(&mut self, actor: PlayerId, round: u8) -> Phase {
        let last = self.players.len() as PlayerId - 1;
        match (round, actor) {
            (1, p) if p < last => Phase::Setup {
                player: p + 1,
                round: 1,
                placing: SetupPlacing::Settlement,
            },
            (1, _) => Phase::Setup {
                player: last,
                round: 2,
                placing: SetupPlacing::Settlement,
            },
            (2, p) if p > 0 => Phase::Setup {
                player: p - 1,
                round: 2,
                placing: SetupPlacing::Settlement,
            },
            (2, _) => {
                self.turn_number = 1;
                Phase::Turn {
                    player: 0,
                    stage: TurnStage::AwaitingRoll,
                    dev_played: false,
                }
            }
            _ => unreachable!("setup rounds are 1 or 2"),
        }
    }

    fn build_road(&mut self, actor: PlayerId, edge: EdgeId) -> Result<(), GameError> {
        self.require_stage(actor, |s| matches!(s, TurnStage::Building { .. }))?;
        let free_roads = match &self.phase {
            Phase::Turn {
                stage: TurnStage::Building { free_roads },
                ..
            } => *free_roads,
            _ => 0,
        };

        if self.board.edge(edge).is_none() {
            return Err(GameError::InvalidTarget);
        }
        if self.roads.contains_key(&edge) {
            return Err(GameError::Occupied);
        }
        if !rules::road_attaches(&self.board, &self.buildings, &self.roads, actor, edge) {
            return Err(GameError::NotConnected);
        }
        if self.players[actor as usize].roads_remaining() == 0 {
            return Err(GameError::NoPiecesRemaining);
        }
        if free_roads == 0 {
            if !self.players[actor as usize].can_afford(&costs::ROAD) {
                return Err(GameError::CannotAfford);
            }
            self.players[actor as usize].pay(&costs::ROAD);
        }

        self.roads.insert(edge, actor);
        self.players[actor as usize].roads.push(edge);
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} built a road", name));

        if free_roads > 0 {
            // Re-cap: a placement can exhaust the last open slot.
            let remaining = (free_roads - 1)
                .min(self.open_road_slots(actor))
                .min(self.players[actor as usize].roads_remaining());
            self.set_stage(TurnStage::Building {
                free_roads: remaining,
            });
        }
        self.refresh_longest_road();
        self.check_win(actor);
        Ok(())
    }

    fn build_settlement(&mut self, actor: PlayerId, vertex: VertexId) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        if self.board.vertex(vertex).is_none() {
            return Err(GameError::InvalidTarget);
        }
        if self.buildings.contains_key(&vertex) {
            return Err(GameError::Occupied);
        }
        if !rules::distance_rule_ok(&self.board, &self.buildings, vertex) {
            return Err(GameError::DistanceRule);
        }
        if !rules::settlement_attaches(&self.board, &self.roads, actor, vertex) {
            return Err(GameError::NotConnected);
        }
        if self.players[actor as usize].settlements_remaining() == 0 {
            return Err(GameError::NoPiecesRemaining);
        }
        if !self.players[actor as usize].can_afford(&costs::SETTLEMENT) {
            return Err(GameError::CannotAfford);
        }

        self.players[actor as usize].pay(&costs::SETTLEMENT);
        self.buildings.insert(vertex, Building::Settlement(actor));
        self.players[actor as usize].settlements.push(vertex);
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} built a settlement", name));

        // A new settlement can sever an opponent's road path.
        self.refresh_longest_road();
        self.check_win(actor);
        Ok(())
    }

    fn build_city(&mut self, actor: PlayerId, vertex: VertexId) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        match self.buildings.get(&vertex) {
            Some(Building::Settlement(owner)) if *owner == actor => {}
            _ => return Err(GameError::InvalidTarget),
        }
        if self.players[actor as usize].cities_remaining() == 0 {
            return Err(GameError::NoPiecesRemaining);
        }
        if !self.players[actor as usize].can_afford(&costs::CITY) {
            return Err(GameError::CannotAfford);
        }

        self.players[actor as usize].pay(&costs::CITY);
        self.buildings.insert(vertex, Building::City(actor));
        let player = &mut self.players[actor as usize];
        player.settlements.retain(|&v| v != vertex);
        player.cities.push(vertex);
        let name = player.name.clone();
        self.log.push(format!("{} upgraded to a city", name));

        self.check_win(actor);
        Ok(())
    }

    // ==================== Development cards ====================

    fn buy_dev_card(&mut self, actor: PlayerId) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        if self.dev_deck.is_empty() {
            return Err(GameError::EmptyDeck);
        }
        if !self.players[actor as usize].can_afford(&costs::DEV_CARD) {
            return Err(GameError::CannotAfford);
        }

        self.players[actor as usize].pay(&costs::DEV_CARD);
        let card = self.dev_deck.pop().expect("checked non-empty");
        self.players[actor as usize]
            .dev_cards_bought_this_turn
            .push(card);
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} bought a development card", name));

        // Victory-point cards score the moment they are held.
        if card == DevCard::VictoryPoint {
            self.check_win(actor);
        }
        Ok(())
    }

    /// Take `card` from the actor's playable pile, enforcing the
    /// one-per-turn limit. Marks the turn's card as played on success.
    fn take_dev_card(&mut self, actor: PlayerId, card: DevCard) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        let dev_played = match &self.phase {
            Phase::Turn { dev_played, .. } => *dev_played,
            _ => false,
        };
        if dev_played {
            return Err(GameError::DevAlreadyPlayed);
        }
        if !self.players[actor as usize].play_dev_card(card) {
            return Err(GameError::NoSuchCard);
        }
        if let Phase::Turn { dev_played, .. } = &mut self.phase {
            *dev_played = true;
        }
        Ok(())
    }

    fn play_knight<R: Rng>(
        &mut self,
        actor: PlayerId,
        hex: HexId,
        steal_from: Option<PlayerId>,
        rng: &mut R,
    ) -> Result<(), GameError> {
        // Validate the robber move before consuming the card.
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        if self.board.hex(hex).is_none() {
            return Err(GameError::InvalidTarget);
        }
        if let Some(victim) = steal_from {
            let candidates =
                rules::theft_candidates(&self.board, &self.buildings, &self.players, hex, actor);
            if !candidates.contains(&victim) {
                return Err(GameError::InvalidTarget);
            }
        }

        self.take_dev_card(actor, DevCard::Knight)?;
        self.move_robber(actor, hex, steal_from, rng)?;
        self.refresh_largest_army(actor);
        self.check_win(actor);
        Ok(())
    }

    fn play_monopoly(&mut self, actor: PlayerId, resource: Resource) -> Result<(), GameError> {
        if !resource.is_tradeable() {
            return Err(GameError::GoldNotTradeable);
        }
        self.take_dev_card(actor, DevCard::Monopoly)?;

        let mut taken = 0;
        for player in &mut self.players {
            if player.id == actor {
                continue;
            }
            let count = player.resources.get(resource);
            player.resources.set(resource, 0);
            taken += count;
        }
        self.players[actor as usize].resources.add(resource, taken);
        let name = self.players[actor as usize].name.clone();
        self.log
            .push(format!("{} monopolized {} {:?}", name, taken, resource));
        Ok(())
    }

    fn play_year_of_plenty(
        &mut self,
        actor: PlayerId,
        first: Resource,
        second: Resource,
    ) -> Result<(), GameError> {
        if !first.is_tradeable() || !second.is_tradeable() {
            return Err(GameError::GoldNotTradeable);
        }
        self.take_dev_card(actor, DevCard::YearOfPlenty)?;

        let hand = &mut self.players[actor as usize].resources;
        hand.add(first, 1);
        hand.add(second, 1);
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} played year of plenty", name));
        Ok(())
    }

    fn play_road_building(&mut self, actor: PlayerId) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        if self.players[actor as usize].roads_remaining() == 0 {
            return Err(GameError::NoPiecesRemaining);
        }
        // Grant only what can actually be placed; a stranded grant would
        // block the turn forever.
        let free = 2
            .min(self.players[actor as usize].roads_remaining())
            .min(self.open_road_slots(actor));
        if free == 0 {
            return Err(GameError::NotConnected);
        }
        self.take_dev_card(actor, DevCard::RoadBuilding)?;
        self.set_stage(TurnStage::Building { free_roads: free });
        let name = self.players[actor as usize].name.clone();
        self.log.push(format!("{} played road building", name));
        Ok(())
    }

    /// Unoccupied edges the player could legally road right now, capped
    /// at the two a road-building grant can use.
    fn open_road_slots(&self, actor: PlayerId) -> u8 {
        self.board
            .edges()
            .iter()
            .filter(|e| {
                !self.roads.contains_key(&e.id)
                    && rules::road_attaches(&self.board, &self.buildings, &self.roads, actor, e.id)
            })
            .take(2)
            .count() as u8
    }

    // ==================== Trading ====================

    /// Bank exchange at the actor's best port rate for the given resource.
    fn trade(&mut self, actor: PlayerId, give: Resource, receive: Resource) -> Result<(), GameError> {
        self.require_stage(actor, |s| *s == TurnStage::Building { free_roads: 0 })?;
        if !give.is_tradeable() || !receive.is_tradeable() {
            return Err(GameError::GoldNotTradeable);
        }

        let rate = rules::port_rate(&self.board, &self.buildings, actor, give);
        let hand = &mut self.players[actor as usize].resources;
        if hand.get(give) < rate {
            return Err(GameError::CannotAfford);
        }
        hand.set(give, hand.get(give) - rate);
        hand.add(receive, 1);

        let name = self.players[actor as usize].name.clone();
        self.log.push(format!(
            "{} traded {} {:?} for a {:?}",
            name, rate, give, receive
        ));
        Ok(())
    }

    // ==================== Titles and victory ====================

    /// Recompute every player's longest road and reassign the title.
    /// The incumbent keeps it on ties; if the incumbent's road is broken
    /// and two others tie for the lead, nobody holds it.
    fn refresh_longest_road(&mut self) {
        for i in 0..self.players.len() {
            let id = self.players[i].id;
            self.players[i].longest_road_len =
                rules::longest_road(&self.board, &self.buildings, &self.roads, id);
        }

        let incumbent = self
            .players
            .iter()
            .find(|p| p.has_longest_road)
            .map(|p| (p.id, p.longest_road_len));
        let best = self
            .players
            .iter()
            .map(|p| p.longest_road_len)
            .max()
            .unwrap_or(0);

        let holder = if best < MIN_LONGEST_ROAD {
            None
        } else if matches!(incumbent, Some((_, len)) if len == best) {
            incumbent.map(|(id, _)| id)
        } else {
            let leaders: Vec<PlayerId> = self
                .players
                .iter()
                .filter(|p| p.longest_road_len == best)
                .map(|p| p.id)
                .collect();
            if leaders.len() == 1 {
                Some(leaders[0])
            } else {
                incumbent
                    .filter(|&(_, len)| len >= MIN_LONGEST_ROAD)
                    .map(|(id, _)| id)
            }
        };

        for player in &mut self.players {
            player.has_longest_road = holder == Some(player.id);
        }
    }

    /// Knight counts only grow, so the army title moves on a strict
    /// overtake and never needs a tiebreak.
    fn refresh_largest_army(&mut self, actor: PlayerId) {
        let actor_knights = self.players[actor as usize].knights_played;
        if actor_knights < MIN_LARGEST_ARMY {
            return;
        }
        let holder_knights = self
            .players
            .iter()
            .find(|p| p.has_largest_army)
            .map(|p| p.knights_played);
        match holder_knights {
            Some(held) if actor_knights <= held => {}
            _ => {
                for player in &mut self.players {
                    player.has_largest_army = player.id == actor;
                }
            }
        }
    }

    /// Victory is checked after every scoring change, mid-turn included.
    /// Title transfers can push a bystander over the line, so every
    /// player is scanned; the actor wins if several cross at once.
    fn check_win(&mut self, actor: PlayerId) {
        if matches!(self.phase, Phase::Finished { .. }) {
            return;
        }
        let winner = std::iter::once(actor)
            .chain(self.players.iter().map(|p| p.id))
            .find(|&p| self.score(p) >= WINNING_SCORE);
        if let Some(winner) = winner {
            let name = self.players[winner as usize].name.clone();
            self.log.push(format!("{} wins", name));
            self.phase = Phase::Finished { winner };
        }
    }

    // ==================== Introspection ====================

    /// Enumerate actions the given player could legally take right now.
    /// Drives clients' move hints: placements, robber moves, dev-card
    /// purchase and turn flow. Discards, dev-card plays and bank trades
    /// are omitted because their legal sets are combinatorial (a client
    /// offers those from the hand it already renders).
    pub fn valid_actions(&self, actor: PlayerId) -> Vec<PlayerAction> {
        let mut actions = Vec::new();
        match &self.phase {
            Phase::Lobby => {
                if self.players.len() >= MIN_PLAYERS {
                    actions.push(PlayerAction::Start);
                }
            }
            Phase::Setup {
                player, placing, ..
            } if *player == actor => match placing {
                SetupPlacing::Settlement => {
                    for vertex in self.board.vertices() {
                        if !self.buildings.contains_key(&vertex.id)
                            && rules::distance_rule_ok(&self.board, &self.buildings, vertex.id)
                        {
                            actions.push(PlayerAction::Build {
                                kind: BuildKind::Settlement,
                                target: vertex.id.0,
                            });
                        }
                    }
                }
                SetupPlacing::Road { settlement } => {
                    for &edge in &self.board.vertex(*settlement).unwrap().edges {
                        if !self.roads.contains_key(&edge) {
                            actions.push(PlayerAction::Build {
                                kind: BuildKind::Road,
                                target: edge.0,
                            });
                        }
                    }
                }
            },
            Phase::Turn { player, stage, .. } if *player == actor => match stage {
                TurnStage::AwaitingRoll => actions.push(PlayerAction::RollDice),
                TurnStage::Discarding { .. } => {}
                TurnStage::MovingRobber => {
                    for hex in self.board.hexes() {
                        let candidates = rules::theft_candidates(
                            &self.board,
                            &self.buildings,
                            &self.players,
                            hex.id,
                            actor,
                        );
                        actions.push(PlayerAction::MoveRobber {
                            hex: hex.id,
                            steal_from: None,
                        });
                        for victim in candidates {
                            actions.push(PlayerAction::MoveRobber {
                                hex: hex.id,
                                steal_from: Some(victim),
                            });
                        }
                    }
                }
                TurnStage::Building { free_roads } => {
                    let player = &self.players[actor as usize];
                    let can_pay_road = *free_roads > 0 || player.can_afford(&costs::ROAD);
                    if can_pay_road && player.roads_remaining() > 0 {
                        for edge in self.board.edges() {
                            if !self.roads.contains_key(&edge.id)
                                && rules::road_attaches(
                                    &self.board,
                                    &self.buildings,
                                    &self.roads,
                                    actor,
                                    edge.id,
                                )
                            {
                                actions.push(PlayerAction::Build {
                                    kind: BuildKind::Road,
                                    target: edge.id.0,
                                });
                            }
                        }
                    }
                    if *free_roads == 0 {
                        if player.can_afford(&costs::SETTLEMENT)
                            && player.settlements_remaining() > 0
                        {
                            for vertex in self.board.vertices() {
                                if !self.buildings.contains_key(&vertex.id)
                                    && rules::distance_rule_ok(
                                        &self.board,
                                        &self.buildings,
                                        vertex.id,
                                    )
                                    && rules::settlement_attaches(
                                        &self.board,
                                        &self.roads,
                                        actor,
                                        vertex.id,
                                    )
                                {
                                    actions.push(PlayerAction::Build {
                                        kind: BuildKind::Settlement,
                                        target: vertex.id.0,
                                    });
                                }
                            }
                        }
                        if player.can_afford(&costs::CITY) && player.cities_remaining() > 0 {
                            for &vertex in &player.settlements {
                                actions.push(PlayerAction::Build {
                                    kind: BuildKind::City,
                                    target: vertex.0,
                                });
                            }
                        }
                        if !self.dev_deck.is_empty() && player.can_afford(&costs::DEV_CARD) {
                            actions.push(PlayerAction::BuyDevCard);
                        }
                        actions.push(PlayerAction::EndTurn);
                    }
                }
            },
            _ => {}
        }
        actions
    }

    /// The wire-format view of this game.
    pub fn snapshot(&self) -> Snapshot {
        let mut buildings: Vec<BuildingEntry> = self
            .buildings
            .iter()
            .map(|(&vertex, building)| BuildingEntry {
                vertex,
                owner: building.owner(),
                is_city: matches!(building, Building::City(_)),
            })
            .collect();
        buildings.sort_by_key(|b| b.vertex);

        let mut roads: Vec<RoadEntry> = self
            .roads
            .iter()
            .map(|(&edge, &owner)| RoadEntry { edge, owner })
            .collect();
        roads.sort_by_key(|r| r.edge);

        Snapshot {
            board: self.board.clone(),
            players: self.players.clone(),
            phase: self.phase.clone(),
            buildings,
            roads,
            robber: self.robber,
            last_roll: self.last_roll,
            turn_number: self.turn_number,
            log: self.log.clone(),
            winner: match self.phase {
                Phase::Finished { winner } => Some(winner),
                _ => None,
            },
        }
    }
}
