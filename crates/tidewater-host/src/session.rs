//! One hosted match: seat tokens, action dispatch and snapshot fan-out.

use std::collections::HashMap;

use tidewater_core::board::PlayerId;
use tidewater_core::{Game, GameError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServerMessage};

/// Who an outbound message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every token seated in the match
    All,
    One(Uuid),
}

/// A message the transport layer should deliver.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

/// A single match plus the token-to-seat binding.
///
/// All methods take `&mut self`: whoever owns the session serializes its
/// actions, which is the entire concurrency story per match.
pub struct MatchSession {
    id: Uuid,
    seats: HashMap<Uuid, PlayerId>,
    game: Game,
}

impl MatchSession {
    pub fn new(id: Uuid) -> Self {
        Self::with_game(id, Game::new())
    }

    pub fn with_game(id: Uuid, game: Game) -> Self {
        Self {
            id,
            seats: HashMap::new(),
            game,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Handle one raw client frame. Parse failures never touch the game.
    pub fn handle_text(&mut self, sender: Uuid, raw: &str) -> Vec<Outbound> {
        match serde_json::from_str::<ClientMessage>(raw) {
            Ok(message) => self.handle(sender, message),
            Err(err) => {
                warn!(match_id = %self.id, %err, "unparseable client frame");
                vec![error_to(
                    sender,
                    &GameError::Malformed(err.to_string()),
                )]
            }
        }
    }

    pub fn handle(&mut self, sender: Uuid, message: ClientMessage) -> Vec<Outbound> {
        match message {
            ClientMessage::Join { name, token } => self.join(sender, &name, token),
            ClientMessage::Action { action } => {
                let seat = match self.seats.get(&sender) {
                    Some(&seat) => seat,
                    None => {
                        return vec![error_to(
                            sender,
                            &GameError::Malformed("no seat bound to this token".to_string()),
                        )]
                    }
                };
                match self.game.apply(seat, action) {
                    Ok(()) => {
                        info!(match_id = %self.id, seat, "action accepted");
                        vec![self.broadcast_snapshot()]
                    }
                    Err(err) => {
                        info!(match_id = %self.id, seat, %err, "action rejected");
                        vec![error_to(sender, &err)]
                    }
                }
            }
        }
    }

    /// Seat the sender. Presenting a known token reclaims its seat after
    /// a reconnect; otherwise a fresh seat is requested from the game.
    fn join(&mut self, sender: Uuid, name: &str, token: Option<Uuid>) -> Vec<Outbound> {
        if let Some(token) = token {
            if let Some(&seat) = self.seats.get(&token) {
                // Rebind the seat to the current connection identity.
                if token != sender {
                    self.seats.remove(&token);
                    self.seats.insert(sender, seat);
                }
                info!(match_id = %self.id, seat, "seat reclaimed");
                return vec![
                    Outbound {
                        to: Recipient::One(sender),
                        message: ServerMessage::Joined {
                            token: sender,
                            seat,
                        },
                    },
                    Outbound {
                        to: Recipient::One(sender),
                        message: ServerMessage::Snapshot {
                            state: self.game.snapshot(),
                        },
                    },
                ];
            }
        }

        match self.game.join(name) {
            Ok(seat) => {
                self.seats.insert(sender, seat);
                info!(match_id = %self.id, seat, name, "player joined");
                vec![
                    Outbound {
                        to: Recipient::One(sender),
                        message: ServerMessage::Joined {
                            token: sender,
                            seat,
                        },
                    },
                    self.broadcast_snapshot(),
                ]
            }
            Err(err) => vec![error_to(sender, &err)],
        }
    }

    fn broadcast_snapshot(&self) -> Outbound {
        Outbound {
            to: Recipient::All,
            message: ServerMessage::Snapshot {
                state: self.game.snapshot(),
            },
        }
    }
}

fn error_to(sender: Uuid, err: &GameError) -> Outbound {
    Outbound {
        to: Recipient::One(sender),
        message: ServerMessage::Error {
            class: err.class(),
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_core::game::ErrorClass;
    use tidewater_core::PlayerAction;

    fn join(session: &mut MatchSession, name: &str) -> Uuid {
        let client = Uuid::new_v4();
        let out = session.handle(
            client,
            ClientMessage::Join {
                name: name.to_string(),
                token: None,
            },
        );
        assert!(matches!(
            out[0].message,
            ServerMessage::Joined { .. }
        ));
        client
    }

    #[test]
    fn join_assigns_sequential_seats() {
        let mut session = MatchSession::new(Uuid::new_v4());
        join(&mut session, "ada");
        let client = Uuid::new_v4();
        let out = session.handle(
            client,
            ClientMessage::Join {
                name: "bev".to_string(),
                token: None,
            },
        );

        match out[0].message {
            ServerMessage::Joined { seat, token } => {
                assert_eq!(seat, 1);
                assert_eq!(token, client);
            }
            ref other => panic!("expected Joined, got {:?}", other),
        }
        // Everyone sees the updated lobby.
        assert_eq!(out[1].to, Recipient::All);
        assert!(matches!(out[1].message, ServerMessage::Snapshot { .. }));
        assert_eq!(session.seat_count(), 2);
    }

    #[test]
    fn known_token_reclaims_its_seat() {
        let mut session = MatchSession::new(Uuid::new_v4());
        let original = join(&mut session, "ada");

        let reconnected = Uuid::new_v4();
        let out = session.handle(
            reconnected,
            ClientMessage::Join {
                name: "ada".to_string(),
                token: Some(original),
            },
        );

        match out[0].message {
            ServerMessage::Joined { seat, token } => {
                assert_eq!(seat, 0);
                assert_eq!(token, reconnected);
            }
            ref other => panic!("expected Joined, got {:?}", other),
        }
        // Same seat, no second player created.
        assert_eq!(session.seat_count(), 1);
        assert_eq!(session.game().players.len(), 1);
        // The old token no longer routes actions.
        let out = session.handle(
            original,
            ClientMessage::Action {
                action: PlayerAction::RollDice,
            },
        );
        assert!(matches!(
            out[0].message,
            ServerMessage::Error { class: ErrorClass::Malformed, .. }
        ));
    }

    #[test]
    fn action_without_a_seat_is_malformed() {
        let mut session = MatchSession::new(Uuid::new_v4());
        let out = session.handle(
            Uuid::new_v4(),
            ClientMessage::Action {
                action: PlayerAction::EndTurn,
            },
        );
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0].message,
            ServerMessage::Error { class: ErrorClass::Malformed, .. }
        ));
    }

    #[test]
    fn rejected_action_goes_only_to_sender() {
        let mut session = MatchSession::new(Uuid::new_v4());
        let ada = join(&mut session, "ada");
        join(&mut session, "bev");

        // Rolling dice in the lobby is a phase error.
        let out = session.handle(
            ada,
            ClientMessage::Action {
                action: PlayerAction::RollDice,
            },
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipient::One(ada));
        assert!(matches!(
            out[0].message,
            ServerMessage::Error { class: ErrorClass::Illegal, .. }
        ));
    }

    #[test]
    fn accepted_action_broadcasts_a_snapshot() {
        let mut session = MatchSession::new(Uuid::new_v4());
        let ada = join(&mut session, "ada");
        join(&mut session, "bev");

        let out = session.handle(
            ada,
            ClientMessage::Action {
                action: PlayerAction::Start,
            },
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipient::All);
        match &out[0].message {
            ServerMessage::Snapshot { state } => {
                assert!(matches!(
                    state.phase,
                    tidewater_core::Phase::Setup { player: 0, .. }
                ));
            }
            other => panic!("expected Snapshot, got {:?}", other),
        }
    }

    #[test]
    fn garbage_frames_answer_malformed() {
        let mut session = MatchSession::new(Uuid::new_v4());
        let client = Uuid::new_v4();
        let out = session.handle_text(client, "{not json");
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0].message,
            ServerMessage::Error { class: ErrorClass::Malformed, .. }
        ));
        // The game is untouched.
        assert_eq!(session.game().players.len(), 0);
    }
}
