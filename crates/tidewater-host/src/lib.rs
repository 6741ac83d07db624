//! Match hosting for the rule engine: identity tokens, per-match action
//! serialization and snapshot fan-out.
//!
//! This crate is transport-free. A server loop hands [`MatchSession`]
//! raw client text and delivers the returned [`Outbound`] messages over
//! whatever socket it owns; [`MatchRegistry`] scales that to many
//! concurrent matches with per-match locking.

pub mod protocol;
pub mod registry;
pub mod session;

pub use protocol::{ClientMessage, ServerMessage};
pub use registry::MatchRegistry;
pub use session::{MatchSession, Outbound, Recipient};
