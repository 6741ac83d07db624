//! Pure placement and scoring rules, separated from turn sequencing.
//!
//! Everything here takes the board graph plus ownership maps and answers a
//! question without mutating anything; the game loop in `game` decides when
//! each question applies.

use std::collections::{HashMap, HashSet};

use crate::board::{BoardGraph, EdgeId, HexId, PlayerId, VertexId};
use crate::player::Resource;

/// A building occupying a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Building {
    Settlement(PlayerId),
    City(PlayerId),
}

impl Building {
    pub fn owner(&self) -> PlayerId {
        match *self {
            Building::Settlement(p) | Building::City(p) => p,
        }
    }

    /// Victory points this building is worth
    pub fn score(&self) -> u32 {
        match self {
            Building::Settlement(_) => 1,
            Building::City(_) => 2,
        }
    }

    /// Resource cards produced per matching roll
    pub fn multiplier(&self) -> u32 {
        match self {
            Building::Settlement(_) => 1,
            Building::City(_) => 2,
        }
    }
}

pub type VertexOwners = HashMap<VertexId, Building>;
pub type RoadOwners = HashMap<EdgeId, PlayerId>;

/// Distance rule: a settlement needs every neighboring vertex empty.
pub fn distance_rule_ok(board: &BoardGraph, buildings: &VertexOwners, vertex: VertexId) -> bool {
    board.vertices()[vertex.0 as usize]
        .neighbors
        .iter()
        .all(|n| !buildings.contains_key(n))
}

/// Post-setup settlements must touch one of the builder's roads.
pub fn settlement_attaches(
    board: &BoardGraph,
    roads: &RoadOwners,
    player: PlayerId,
    vertex: VertexId,
) -> bool {
    board.vertices()[vertex.0 as usize]
        .edges
        .iter()
        .any(|e| roads.get(e) == Some(&player))
}

/// A road must continue the builder's network: either endpoint carries one
/// of their buildings, or an adjoining road reaches the endpoint through a
/// vertex not held by an opponent.
pub fn road_attaches(
    board: &BoardGraph,
    buildings: &VertexOwners,
    roads: &RoadOwners,
    player: PlayerId,
    edge: EdgeId,
) -> bool {
    for endpoint in board.edges()[edge.0 as usize].endpoints {
        match buildings.get(&endpoint) {
            Some(b) if b.owner() == player => return true,
            // An opponent's building severs the network at this vertex.
            Some(_) => continue,
            None => {}
        }
        let reaches = board.vertices()[endpoint.0 as usize]
            .edges
            .iter()
            .any(|e| *e != edge && roads.get(e) == Some(&player));
        if reaches {
            return true;
        }
    }
    false
}

/// Length of the player's longest simple road path.
///
/// Exhaustive DFS from every endpoint of every owned road; opponents'
/// buildings block continuation through their vertex. Road counts are
/// small enough that this stays cheap.
pub fn longest_road(
    board: &BoardGraph,
    buildings: &VertexOwners,
    roads: &RoadOwners,
    player: PlayerId,
) -> u32 {
    let owned: Vec<EdgeId> = roads
        .iter()
        .filter(|(_, &p)| p == player)
        .map(|(&e, _)| e)
        .collect();

    let mut best = 0;
    let mut visited = HashSet::new();
    for &edge in &owned {
        for endpoint in board.edges()[edge.0 as usize].endpoints {
            let len = dfs_road(board, buildings, roads, player, endpoint, &mut visited);
            best = best.max(len);
        }
    }
    best
}

fn dfs_road(
    board: &BoardGraph,
    buildings: &VertexOwners,
    roads: &RoadOwners,
    player: PlayerId,
    at: VertexId,
    visited: &mut HashSet<EdgeId>,
) -> u32 {
    // An opponent's building cuts the path, but the path may end here.
    if matches!(buildings.get(&at), Some(b) if b.owner() != player) && !visited.is_empty() {
        return 0;
    }

    let mut best = 0;
    for &edge in &board.vertices()[at.0 as usize].edges {
        if roads.get(&edge) != Some(&player) || visited.contains(&edge) {
            continue;
        }
        visited.insert(edge);
        let next = board.edges()[edge.0 as usize].other_endpoint(at);
        best = best.max(1 + dfs_road(board, buildings, roads, player, next, visited));
        visited.remove(&edge);
    }
    best
}

/// Who receives what for a production roll. The robber's hex is skipped
/// entirely; a roll matching no producing hex pays nobody.
pub fn roll_payout(
    board: &BoardGraph,
    buildings: &VertexOwners,
    robber: HexId,
    roll: u8,
) -> HashMap<PlayerId, Vec<(Resource, u32)>> {
    let mut payouts: HashMap<PlayerId, Vec<(Resource, u32)>> = HashMap::new();

    for hex in board.hexes() {
        if hex.id == robber || hex.token != Some(roll) {
            continue;
        }
        let resource = match hex.resource() {
            Some(r) => r,
            None => continue,
        };
        for corner in hex.corners {
            if let Some(building) = buildings.get(&corner) {
                payouts
                    .entry(building.owner())
                    .or_default()
                    .push((resource, building.multiplier()));
            }
        }
    }
    payouts
}

/// Players the robber's mover may steal from: owners of buildings on the
/// hex, other than the thief, with at least one card in hand.
pub fn theft_candidates(
    board: &BoardGraph,
    buildings: &VertexOwners,
    players: &[crate::player::Player],
    hex: HexId,
    thief: PlayerId,
) -> Vec<PlayerId> {
    let mut candidates: Vec<PlayerId> = board.hexes()[hex.0 as usize]
        .corners
        .iter()
        .filter_map(|c| buildings.get(c))
        .map(|b| b.owner())
        .filter(|&p| {
            p != thief
                && players
                    .iter()
                    .any(|pl| pl.id == p && !pl.resources.is_empty())
        })
        .collect();
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// Bank exchange rate for giving away `resource`: 2 with a matching 2:1
/// port, 3 with any 3:1 port, otherwise 4.
pub fn port_rate(
    board: &BoardGraph,
    buildings: &VertexOwners,
    player: PlayerId,
    resource: Resource,
) -> u32 {
    let mut rate = 4;
    for port in board.ports() {
        let owned = matches!(buildings.get(&port.vertex), Some(b) if b.owner() == player);
        if !owned {
            continue;
        }
        match (port.ratio, port.resource) {
            (2, Some(r)) if r == resource => return 2,
            (3, None) => rate = rate.min(3),
            _ => {}
        }
    }
    rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{HexDef, HexKind, PortDef};
    use crate::geometry::HexCoord;
    use crate::player::Player;

    fn two_hex_board() -> BoardGraph {
        let defs = [
            HexDef {
                coord: HexCoord::new(0, 0),
                kind: HexKind::Resource(Resource::Brick),
                token: Some(5),
            },
            HexDef {
                coord: HexCoord::new(1, 0),
                kind: HexKind::Resource(Resource::Grain),
                token: Some(5),
            },
        ];
        let ports = [
            PortDef {
                hex: HexCoord::new(0, 0),
                corner: 0,
                ratio: 2,
                resource: Some(Resource::Brick),
            },
            PortDef {
                hex: HexCoord::new(0, 0),
                corner: 3,
                ratio: 3,
                resource: None,
            },
        ];
        BoardGraph::resolve(&defs, &ports).unwrap()
    }

    /// A path of vertices along one hex's rim, plus the edges joining them.
    fn rim_path(board: &BoardGraph, hex: usize, len: usize) -> (Vec<VertexId>, Vec<EdgeId>) {
        let corners = board.hexes()[hex].corners;
        let vertices: Vec<VertexId> = corners.iter().copied().take(len + 1).collect();
        let edges = vertices
            .windows(2)
            .map(|w| {
                board.vertices()[w[0].0 as usize]
                    .edges
                    .iter()
                    .copied()
                    .find(|&e| board.edges()[e.0 as usize].other_endpoint(w[0]) == w[1])
                    .unwrap()
            })
            .collect();
        (vertices, edges)
    }

    #[test]
    fn distance_rule_blocks_neighbors_only() {
        let board = two_hex_board();
        let corners = board.hexes()[0].corners;
        let mut buildings = VertexOwners::new();
        buildings.insert(corners[0], Building::Settlement(0));

        assert!(!distance_rule_ok(&board, &buildings, corners[1]));
        assert!(!distance_rule_ok(&board, &buildings, corners[5]));
        assert!(distance_rule_ok(&board, &buildings, corners[2]));
        assert!(distance_rule_ok(&board, &buildings, corners[3]));
    }

    #[test]
    fn settlement_needs_an_incident_road() {
        let board = two_hex_board();
        let (vertices, edges) = rim_path(&board, 0, 1);
        let mut roads = RoadOwners::new();
        roads.insert(edges[0], 0);

        assert!(settlement_attaches(&board, &roads, 0, vertices[0]));
        assert!(settlement_attaches(&board, &roads, 0, vertices[1]));
        assert!(!settlement_attaches(&board, &roads, 1, vertices[0]));

        let far = board.hexes()[1].corners[2];
        assert!(!settlement_attaches(&board, &roads, 0, far));
    }

    #[test]
    fn road_attaches_via_building_or_road() {
        let board = two_hex_board();
        let (vertices, edges) = rim_path(&board, 0, 2);
        let mut buildings = VertexOwners::new();
        let mut roads = RoadOwners::new();

        // Nothing on the board yet: no attachment anywhere.
        assert!(!road_attaches(&board, &buildings, &roads, 0, edges[0]));

        buildings.insert(vertices[0], Building::Settlement(0));
        assert!(road_attaches(&board, &buildings, &roads, 0, edges[0]));
        assert!(!road_attaches(&board, &buildings, &roads, 0, edges[1]));

        roads.insert(edges[0], 0);
        assert!(road_attaches(&board, &buildings, &roads, 0, edges[1]));
    }

    #[test]
    fn enemy_building_severs_road_attachment() {
        let board = two_hex_board();
        let (vertices, edges) = rim_path(&board, 0, 2);
        let mut buildings = VertexOwners::new();
        let mut roads = RoadOwners::new();

        roads.insert(edges[0], 0);
        buildings.insert(vertices[1], Building::City(1));

        // The only route to edges[1] passes through the opponent's city.
        assert!(!road_attaches(&board, &buildings, &roads, 0, edges[1]));
    }

    #[test]
    fn longest_road_counts_simple_paths() {
        let board = two_hex_board();
        let (_, edges) = rim_path(&board, 0, 4);
        let buildings = VertexOwners::new();
        let mut roads = RoadOwners::new();

        for (i, &e) in edges.iter().enumerate() {
            roads.insert(e, 0);
            assert_eq!(longest_road(&board, &buildings, &roads, 0), i as u32 + 1);
        }
        assert_eq!(longest_road(&board, &buildings, &roads, 1), 0);
    }

    #[test]
    fn longest_road_broken_by_enemy_building() {
        let board = two_hex_board();
        let (vertices, edges) = rim_path(&board, 0, 4);
        let mut buildings = VertexOwners::new();
        let mut roads = RoadOwners::new();

        for &e in &edges {
            roads.insert(e, 0);
        }
        assert_eq!(longest_road(&board, &buildings, &roads, 0), 4);

        buildings.insert(vertices[2], Building::Settlement(1));
        assert_eq!(longest_road(&board, &buildings, &roads, 0), 2);
    }

    #[test]
    fn payout_skips_robber_and_doubles_cities() {
        let board = two_hex_board();
        let brick_hex = board.hexes()[0].id;
        let grain_hex = board.hexes()[1].id;
        let mut buildings = VertexOwners::new();
        buildings.insert(board.hexes()[0].corners[0], Building::Settlement(0));
        buildings.insert(board.hexes()[1].corners[0], Building::City(1));

        let payouts = roll_payout(&board, &buildings, grain_hex, 5);
        assert_eq!(payouts.get(&0), Some(&vec![(Resource::Brick, 1)]));
        assert_eq!(payouts.get(&1), None);

        let payouts = roll_payout(&board, &buildings, brick_hex, 5);
        assert_eq!(payouts.get(&0), None);
        assert_eq!(payouts.get(&1), Some(&vec![(Resource::Grain, 2)]));

        assert!(roll_payout(&board, &buildings, grain_hex, 9).is_empty());
    }

    #[test]
    fn theft_candidates_exclude_thief_and_empty_hands() {
        let board = two_hex_board();
        let hex = board.hexes()[0].id;
        let corners = board.hexes()[0].corners;

        let mut buildings = VertexOwners::new();
        buildings.insert(corners[0], Building::Settlement(0));
        buildings.insert(corners[2], Building::Settlement(1));
        buildings.insert(corners[4], Building::City(2));

        let mut players: Vec<Player> = (0..3).map(|i| Player::new(i, format!("p{}", i))).collect();
        players[1].resources.add(Resource::Wool, 1);
        players[2].resources.add(Resource::Ore, 2);

        let candidates = theft_candidates(&board, &buildings, &players, hex, 0);
        assert_eq!(candidates, vec![1, 2]);

        // Thief excluded even with cards; empty hands excluded.
        players[0].resources.add(Resource::Brick, 3);
        players[1].resources = Default::default();
        let candidates = theft_candidates(&board, &buildings, &players, hex, 0);
        assert_eq!(candidates, vec![2]);
    }

    #[test]
    fn port_rates() {
        let board = two_hex_board();
        let brick_port = board.ports()[0].vertex;
        let generic_port = board.ports()[1].vertex;
        let mut buildings = VertexOwners::new();

        assert_eq!(port_rate(&board, &buildings, 0, Resource::Brick), 4);

        buildings.insert(generic_port, Building::Settlement(0));
        assert_eq!(port_rate(&board, &buildings, 0, Resource::Brick), 3);
        assert_eq!(port_rate(&board, &buildings, 0, Resource::Wool), 3);

        buildings.insert(brick_port, Building::Settlement(0));
        assert_eq!(port_rate(&board, &buildings, 0, Resource::Brick), 2);
        assert_eq!(port_rate(&board, &buildings, 0, Resource::Wool), 3);

        // Port ownership doesn't leak to other players.
        assert_eq!(port_rate(&board, &buildings, 1, Resource::Brick), 4);
    }
}
