//! Players, resources, development cards and piece pools.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::{EdgeId, PlayerId, VertexId};

/// Maximum settlements a player may have on the board at once.
pub const MAX_SETTLEMENTS: u8 = 5;
/// Maximum cities a player may have on the board at once.
pub const MAX_CITIES: u8 = 4;
/// Maximum roads a player may have on the board at once.
pub const MAX_ROADS: u8 = 15;

/// The resource types. Gold is hoarded for victory-point style scoring
/// variants and never moves through trades or ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Brick,
    Lumber,
    Ore,
    Grain,
    Wool,
    Gold,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Resource::Brick,
        Resource::Lumber,
        Resource::Ore,
        Resource::Grain,
        Resource::Wool,
        Resource::Gold,
    ];

    /// Resources that may flow through trades and ports.
    pub const TRADEABLE: [Resource; 5] = [
        Resource::Brick,
        Resource::Lumber,
        Resource::Ore,
        Resource::Grain,
        Resource::Wool,
    ];

    pub fn is_tradeable(&self) -> bool {
        *self != Resource::Gold
    }
}

/// A bundle of resources: a player's hand, a cost, or a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceHand {
    pub brick: u32,
    pub lumber: u32,
    pub ore: u32,
    pub grain: u32,
    pub wool: u32,
    pub gold: u32,
}

impl ResourceHand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a hand of tradeable resources (gold starts at zero).
    pub const fn with_amounts(brick: u32, lumber: u32, ore: u32, grain: u32, wool: u32) -> Self {
        Self {
            brick,
            lumber,
            ore,
            grain,
            wool,
            gold: 0,
        }
    }

    /// A hand holding `count` of a single resource.
    pub fn single(resource: Resource, count: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, count);
        hand
    }

    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Brick => self.brick,
            Resource::Lumber => self.lumber,
            Resource::Ore => self.ore,
            Resource::Grain => self.grain,
            Resource::Wool => self.wool,
            Resource::Gold => self.gold,
        }
    }

    pub fn set(&mut self, resource: Resource, count: u32) {
        match resource {
            Resource::Brick => self.brick = count,
            Resource::Lumber => self.lumber = count,
            Resource::Ore => self.ore = count,
            Resource::Grain => self.grain = count,
            Resource::Wool => self.wool = count,
            Resource::Gold => self.gold = count,
        }
    }

    pub fn add(&mut self, resource: Resource, count: u32) {
        self.set(resource, self.get(resource) + count);
    }

    pub fn add_hand(&mut self, other: &ResourceHand) {
        for resource in Resource::ALL {
            self.add(resource, other.get(resource));
        }
    }

    pub fn total(&self) -> u32 {
        Resource::ALL.iter().map(|&r| self.get(r)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// True if this hand covers every resource in `cost`.
    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        Resource::ALL.iter().all(|&r| self.get(r) >= cost.get(r))
    }

    /// Remove `cost` from this hand. Callers check `can_afford` first.
    pub fn subtract(&mut self, cost: &ResourceHand) {
        for resource in Resource::ALL {
            let have = self.get(resource);
            let need = cost.get(resource);
            debug_assert!(have >= need, "subtracting more {:?} than held", resource);
            self.set(resource, have - need);
        }
    }

    /// Remove one uniformly random card from this hand, if any.
    pub fn steal_random<R: Rng>(&mut self, rng: &mut R) -> Option<Resource> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let mut pick = rng.gen_range(0..total);
        for resource in Resource::ALL {
            let count = self.get(resource);
            if pick < count {
                self.set(resource, count - 1);
                return Some(resource);
            }
            pick -= count;
        }
        unreachable!("pick index exceeded hand total")
    }
}

/// Fixed build costs.
pub mod costs {
    use super::ResourceHand;

    pub const ROAD: ResourceHand = ResourceHand::with_amounts(1, 1, 0, 0, 0);
    pub const SETTLEMENT: ResourceHand = ResourceHand::with_amounts(1, 1, 0, 1, 1);
    pub const CITY: ResourceHand = ResourceHand::with_amounts(0, 0, 3, 2, 0);
    pub const DEV_CARD: ResourceHand = ResourceHand::with_amounts(0, 0, 1, 1, 1);
}

/// Development cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DevCard {
    Knight,
    VictoryPoint,
    RoadBuilding,
    YearOfPlenty,
    Monopoly,
}

impl DevCard {
    /// Victory-point cards score silently and are never played as an action.
    pub fn is_playable(&self) -> bool {
        *self != DevCard::VictoryPoint
    }

    /// The standard 25-card deck, unshuffled.
    pub fn standard_deck() -> Vec<DevCard> {
        let mut deck = Vec::with_capacity(25);
        for (card, count) in [
            (DevCard::Knight, 14),
            (DevCard::VictoryPoint, 5),
            (DevCard::RoadBuilding, 2),
            (DevCard::YearOfPlenty, 2),
            (DevCard::Monopoly, 2),
        ] {
            deck.extend(std::iter::repeat(card).take(count));
        }
        deck
    }
}

/// Seat colors, assigned in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerColor {
    Red,
    Blue,
    Orange,
    White,
}

impl PlayerColor {
    pub const ALL: [PlayerColor; 4] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Orange,
        PlayerColor::White,
    ];
}

/// One seated player: hand, cards, pieces and title state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub resources: ResourceHand,
    /// Cards held and playable (bought on a previous turn)
    pub dev_cards: Vec<DevCard>,
    /// Cards bought this turn; unplayable until next turn
    pub dev_cards_bought_this_turn: Vec<DevCard>,
    pub knights_played: u32,
    pub longest_road_len: u32,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    pub settlements: Vec<VertexId>,
    pub cities: Vec<VertexId>,
    pub roads: Vec<EdgeId>,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::ALL[id as usize % PlayerColor::ALL.len()],
            resources: ResourceHand::new(),
            dev_cards: Vec::new(),
            dev_cards_bought_this_turn: Vec::new(),
            knights_played: 0,
            longest_road_len: 0,
            has_longest_road: false,
            has_largest_army: false,
            settlements: Vec::new(),
            cities: Vec::new(),
            roads: Vec::new(),
        }
    }

    pub fn settlements_remaining(&self) -> u8 {
        MAX_SETTLEMENTS - self.settlements.len() as u8
    }

    pub fn cities_remaining(&self) -> u8 {
        MAX_CITIES - self.cities.len() as u8
    }

    pub fn roads_remaining(&self) -> u8 {
        MAX_ROADS - self.roads.len() as u8
    }

    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        self.resources.can_afford(cost)
    }

    /// Pay for a purchase. Callers check affordability first.
    pub fn pay(&mut self, cost: &ResourceHand) {
        self.resources.subtract(cost);
    }

    /// Move this turn's purchases into the playable pile.
    pub fn end_turn(&mut self) {
        self.dev_cards.append(&mut self.dev_cards_bought_this_turn);
    }

    pub fn holds_playable(&self, card: DevCard) -> bool {
        card.is_playable() && self.dev_cards.contains(&card)
    }

    /// Consume one copy of `card` from the playable pile.
    pub fn play_dev_card(&mut self, card: DevCard) -> bool {
        if !card.is_playable() {
            return false;
        }
        match self.dev_cards.iter().position(|&c| c == card) {
            Some(i) => {
                self.dev_cards.remove(i);
                if card == DevCard::Knight {
                    self.knights_played += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Victory points from held VP cards, both piles. Cards bought this
    /// turn still count toward the score.
    pub fn victory_card_points(&self) -> u32 {
        self.dev_cards
            .iter()
            .chain(&self.dev_cards_bought_this_turn)
            .filter(|&&c| c == DevCard::VictoryPoint)
            .count() as u32
    }
}
