//! The set of live matches.
//!
//! `DashMap` gives independent matches full parallelism while a `get_mut`
//! on one entry serializes everything inside that match.

use dashmap::DashMap;
use tidewater_core::Game;
use tracing::info;
use uuid::Uuid;

use crate::session::{MatchSession, Outbound};

#[derive(Default)]
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchSession>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new match with a standard board and return its id.
    pub fn create_match(&self) -> Uuid {
        self.create_with_game(Game::new())
    }

    pub fn create_with_game(&self, game: Game) -> Uuid {
        let id = Uuid::new_v4();
        self.matches.insert(id, MatchSession::with_game(id, game));
        info!(match_id = %id, "match created");
        id
    }

    /// Route one raw frame into a match. `None` if the match is gone.
    pub fn handle_text(&self, match_id: Uuid, sender: Uuid, raw: &str) -> Option<Vec<Outbound>> {
        self.matches
            .get_mut(&match_id)
            .map(|mut session| session.handle_text(sender, raw))
    }

    pub fn remove_match(&self, match_id: Uuid) -> bool {
        let removed = self.matches.remove(&match_id).is_some();
        if removed {
            info!(match_id = %match_id, "match removed");
        }
        removed
    }

    pub fn contains(&self, match_id: Uuid) -> bool {
        self.matches.contains_key(&match_id)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
