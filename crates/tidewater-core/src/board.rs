//! The board graph: canonical, deduplicated topology built once per match.
//!
//! A `BoardGraph` is constructed by [`BoardGraph::resolve`] from a list of
//! hex definitions (plus optional ports) and is read-only afterwards - a
//! custom board replaces the whole graph, never patches it. Ownership of
//! vertices and edges lives in the game state, not here.

use crate::geometry::{CornerKey, HexCoord};
use crate::player::Resource;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Player identifier (0-3 for a 4-player game)
pub type PlayerId = u8;

/// Index of a hex within one board graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexId(pub u16);

/// Index of a vertex (settlement slot) within one board graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub u16);

/// Index of an edge (road slot) within one board graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u16);

/// What a hex produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HexKind {
    /// Produces the given resource when its token is rolled
    Resource(Resource),
    /// No production, no token; the robber's starting home
    Desert,
}

/// Input definition of one hex, as supplied by a board layout or editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexDef {
    pub coord: HexCoord,
    pub kind: HexKind,
    /// Production token, 2-12 excluding 7. Always `None` for desert.
    pub token: Option<u8>,
}

/// Input definition of one port, addressed by hex + corner index so an
/// editor can describe it before any vertex identities exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDef {
    pub hex: HexCoord,
    /// Corner index 0-5, in the cyclic order of [`HexCoord::corner_keys`].
    pub corner: u8,
    /// Exchange ratio: 2 (specific resource) or 3 (any tradeable resource).
    pub ratio: u8,
    /// Required resource for 2:1 ports; `None` for 3:1 ports.
    pub resource: Option<Resource>,
}

/// One tile of the resolved board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hex {
    pub id: HexId,
    pub coord: HexCoord,
    /// Display-only pixel center
    pub center: (f64, f64),
    pub kind: HexKind,
    pub token: Option<u8>,
    /// The six corner vertices in cyclic order
    pub corners: [VertexId; 6],
}

impl Hex {
    /// The resource this hex produces, if any
    pub fn resource(&self) -> Option<Resource> {
        match self.kind {
            HexKind::Resource(r) => Some(r),
            HexKind::Desert => None,
        }
    }
}

/// One settlement slot of the resolved board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    /// Display-only pixel position; identity comes from the corner lattice
    pub position: (f64, f64),
    /// Hexes touching this vertex (1-3)
    pub hexes: Vec<HexId>,
    /// Vertices one edge away (2-3)
    pub neighbors: Vec<VertexId>,
    /// Incident edges (2-3)
    pub edges: Vec<EdgeId>,
}

/// One road slot of the resolved board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    /// Endpoint vertices, stored with the smaller id first
    pub endpoints: [VertexId; 2],
}

impl Edge {
    /// The endpoint that isn't `v`
    pub fn other_endpoint(&self, v: VertexId) -> VertexId {
        if self.endpoints[0] == v {
            self.endpoints[1]
        } else {
            self.endpoints[0]
        }
    }
}

/// A trading port attached to a coastal vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub vertex: VertexId,
    /// 2 or 3
    pub ratio: u8,
    /// Required resource for 2:1 ports
    pub resource: Option<Resource>,
}

/// Errors from board construction. A failed custom board leaves the
/// previous graph untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BoardError {
    #[error("board has no hexes")]
    Empty,

    #[error("duplicate hex at ({q}, {r})")]
    DuplicateHex { q: i32, r: i32 },

    #[error("hex at ({q}, {r}) shares no corner with the rest of the board")]
    DetachedHex { q: i32, r: i32 },

    #[error("production token {token} is out of range (2-12, no 7)")]
    BadToken { token: u8 },

    #[error("desert hexes cannot carry a production token")]
    DesertToken,

    #[error("port references a missing hex at ({q}, {r})")]
    PortHexMissing { q: i32, r: i32 },

    #[error("port corner index {corner} is out of range (0-5)")]
    BadPortCorner { corner: u8 },

    #[error("port ratio {ratio} must be 2 or 3")]
    BadPortRatio { ratio: u8 },

    #[error("a 2:1 port requires a tradeable resource; a 3:1 port takes none")]
    BadPortResource,

    #[error("two ports attach to the same vertex")]
    DuplicatePortVertex,
}

/// The complete, immutable board topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardGraph {
    hexes: Vec<Hex>,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    ports: Vec<Port>,
}

impl BoardGraph {
    /// Canonicalize a hex layout into a deduplicated vertex/edge graph.
    ///
    /// Deterministic: the same definition list always yields the same ids;
    /// the same hex *set* in any order yields an isomorphic graph.
    pub fn resolve(hex_defs: &[HexDef], port_defs: &[PortDef]) -> Result<Self, BoardError> {
        if hex_defs.is_empty() {
            return Err(BoardError::Empty);
        }

        let mut coords: HashMap<HexCoord, HexId> = HashMap::new();
        let mut vertex_ids: HashMap<CornerKey, VertexId> = HashMap::new();
        let mut edge_ids: HashMap<(VertexId, VertexId), EdgeId> = HashMap::new();

        let mut hexes: Vec<Hex> = Vec::with_capacity(hex_defs.len());
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut edges: Vec<Edge> = Vec::new();

        for def in hex_defs {
            match (def.kind, def.token) {
                (HexKind::Desert, Some(_)) => return Err(BoardError::DesertToken),
                (_, Some(t)) if !(2..=12).contains(&t) || t == 7 => {
                    return Err(BoardError::BadToken { token: t })
                }
                _ => {}
            }

            let hex_id = HexId(hexes.len() as u16);
            if coords.insert(def.coord, hex_id).is_some() {
                return Err(BoardError::DuplicateHex {
                    q: def.coord.q,
                    r: def.coord.r,
                });
            }

            // Intern the six corners, then link them pairwise into edges.
            let corners = def.coord.corner_keys().map(|key| {
                let id = *vertex_ids.entry(key).or_insert_with(|| {
                    let id = VertexId(vertices.len() as u16);
                    vertices.push(Vertex {
                        id,
                        position: key.to_pixel(),
                        hexes: Vec::new(),
                        neighbors: Vec::new(),
                        edges: Vec::new(),
                    });
                    id
                });
                vertices[id.0 as usize].hexes.push(hex_id);
                id
            });

            for i in 0..6 {
                let a = corners[i];
                let b = corners[(i + 1) % 6];
                let key = if a <= b { (a, b) } else { (b, a) };
                edge_ids.entry(key).or_insert_with(|| {
                    let id = EdgeId(edges.len() as u16);
                    edges.push(Edge {
                        id,
                        endpoints: [key.0, key.1],
                    });
                    vertices[a.0 as usize].neighbors.push(b);
                    vertices[a.0 as usize].edges.push(id);
                    vertices[b.0 as usize].neighbors.push(a);
                    vertices[b.0 as usize].edges.push(id);
                    id
                });
            }

            hexes.push(Hex {
                id: hex_id,
                coord: def.coord,
                center: def.coord.to_pixel(),
                kind: def.kind,
                token: def.token,
                corners,
            });
        }

        Self::check_connected(&hexes, &vertices)?;

        let mut ports = Vec::with_capacity(port_defs.len());
        let mut port_vertices = HashSet::new();
        for def in port_defs {
            let hex_id = coords.get(&def.hex).ok_or(BoardError::PortHexMissing {
                q: def.hex.q,
                r: def.hex.r,
            })?;
            if def.corner > 5 {
                return Err(BoardError::BadPortCorner { corner: def.corner });
            }
            let vertex = hexes[hex_id.0 as usize].corners[def.corner as usize];
            match (def.ratio, def.resource) {
                (2, Some(r)) if r.is_tradeable() => {}
                (3, None) => {}
                (2, _) | (3, _) => return Err(BoardError::BadPortResource),
                (ratio, _) => return Err(BoardError::BadPortRatio { ratio }),
            }
            if !port_vertices.insert(vertex) {
                return Err(BoardError::DuplicatePortVertex);
            }
            ports.push(Port {
                vertex,
                ratio: def.ratio,
                resource: def.resource,
            });
        }

        Ok(Self {
            hexes,
            vertices,
            edges,
            ports,
        })
    }

    /// Reject layouts where some hex is not corner-connected to the rest.
    fn check_connected(hexes: &[Hex], vertices: &[Vertex]) -> Result<(), BoardError> {
        let mut reached = vec![false; hexes.len()];
        let mut queue = vec![HexId(0)];
        reached[0] = true;

        while let Some(hex) = queue.pop() {
            for corner in hexes[hex.0 as usize].corners {
                for &other in &vertices[corner.0 as usize].hexes {
                    if !reached[other.0 as usize] {
                        reached[other.0 as usize] = true;
                        queue.push(other);
                    }
                }
            }
        }

        match reached.iter().position(|r| !r) {
            None => Ok(()),
            Some(i) => Err(BoardError::DetachedHex {
                q: hexes[i].coord.q,
                r: hexes[i].coord.r,
            }),
        }
    }

    /// The standard 19-hex layout with randomized resources, tokens and ports.
    pub fn standard() -> Self {
        let mut rng = rand::thread_rng();
        Self::standard_with_rng(&mut rng)
    }

    /// Standard layout with a provided RNG, for deterministic generation.
    pub fn standard_with_rng<R: Rng>(rng: &mut R) -> Self {
        let coords = standard_coords();

        // 4 lumber, 4 grain, 4 wool, 3 ore, 3 brick, 1 desert
        let mut kinds: Vec<HexKind> = Vec::with_capacity(19);
        for (resource, count) in [
            (Resource::Lumber, 4),
            (Resource::Grain, 4),
            (Resource::Wool, 4),
            (Resource::Ore, 3),
            (Resource::Brick, 3),
        ] {
            kinds.extend(std::iter::repeat(HexKind::Resource(resource)).take(count));
        }
        kinds.push(HexKind::Desert);
        kinds.shuffle(rng);

        let tokens = assign_tokens(&coords, &kinds, rng);

        let hex_defs: Vec<HexDef> = coords
            .iter()
            .zip(kinds.iter().zip(tokens.iter()))
            .map(|(&coord, (&kind, &token))| HexDef { coord, kind, token })
            .collect();

        // Two passes: resolve the bare layout to find coastal vertices,
        // then resolve again with the selected ports attached.
        let bare = Self::resolve(&hex_defs, &[])
            .expect("standard layout is a valid board");
        let port_defs = bare.pick_standard_ports(rng);

        Self::resolve(&hex_defs, &port_defs).expect("standard layout is a valid board")
    }

    /// Pick 9 well-spread coastal vertices and deal out the standard port
    /// mix (four 3:1, one 2:1 per tradeable resource).
    fn pick_standard_ports<R: Rng>(&self, rng: &mut R) -> Vec<PortDef> {
        let mut port_types: Vec<(u8, Option<Resource>)> = vec![(3, None); 4];
        for resource in Resource::TRADEABLE {
            port_types.push((2, Some(resource)));
        }
        port_types.shuffle(rng);

        let coastal: Vec<VertexId> = self
            .vertices
            .iter()
            .filter(|v| v.hexes.len() < 3)
            .map(|v| v.id)
            .collect();
        let chosen = self.spread_vertices(&coastal, port_types.len(), rng);

        chosen
            .into_iter()
            .zip(port_types)
            .map(|(vertex, (ratio, resource))| {
                let (hex, corner) = self.locate_corner(vertex);
                PortDef {
                    hex,
                    corner,
                    ratio,
                    resource,
                }
            })
            .collect()
    }

    /// Greedy max-min-distance selection so ports don't cluster.
    fn spread_vertices<R: Rng>(
        &self,
        candidates: &[VertexId],
        count: usize,
        rng: &mut R,
    ) -> Vec<VertexId> {
        let mut available = candidates.to_vec();
        available.shuffle(rng);
        if available.len() <= count {
            return available;
        }

        let mut selected: Vec<VertexId> = Vec::with_capacity(count);
        while selected.len() < count {
            let mut best: Option<(usize, f64)> = None;
            for (idx, &candidate) in available.iter().enumerate() {
                let min_dist = selected
                    .iter()
                    .map(|&s| self.vertex_distance(candidate, s))
                    .fold(f64::MAX, f64::min);
                if best.is_none() || min_dist > best.map_or(0.0, |(_, d)| d) {
                    best = Some((idx, min_dist));
                }
            }
            match best {
                Some((idx, _)) => selected.push(available.remove(idx)),
                None => break,
            }
        }
        selected
    }

    fn vertex_distance(&self, a: VertexId, b: VertexId) -> f64 {
        let (x1, y1) = self.vertices[a.0 as usize].position;
        let (x2, y2) = self.vertices[b.0 as usize].position;
        ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt()
    }

    /// Find some (hex, corner index) pair addressing the given vertex.
    fn locate_corner(&self, vertex: VertexId) -> (HexCoord, u8) {
        for hex in &self.hexes {
            if let Some(i) = hex.corners.iter().position(|&c| c == vertex) {
                return (hex.coord, i as u8);
            }
        }
        // Every vertex was interned from some hex corner.
        unreachable!("vertex {:?} not addressed by any hex", vertex)
    }

    // ==================== Queries ====================

    pub fn hexes(&self) -> &[Hex] {
        &self.hexes
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn hex(&self, id: HexId) -> Option<&Hex> {
        self.hexes.get(id.0 as usize)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0 as usize)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize)
    }

    /// The desert hex, if the layout has one (robber's starting position)
    pub fn desert_hex(&self) -> Option<HexId> {
        self.hexes
            .iter()
            .find(|h| h.kind == HexKind::Desert)
            .map(|h| h.id)
    }

    /// Export the definition this graph was built from, so the layout can
    /// be shipped to an editor and reconstructed.
    pub fn export(&self) -> (Vec<HexDef>, Vec<PortDef>) {
        let hex_defs = self
            .hexes
            .iter()
            .map(|h| HexDef {
                coord: h.coord,
                kind: h.kind,
                token: h.token,
            })
            .collect();
        let port_defs = self
            .ports
            .iter()
            .map(|p| {
                let (hex, corner) = self.locate_corner(p.vertex);
                PortDef {
                    hex,
                    corner,
                    ratio: p.ratio,
                    resource: p.resource,
                }
            })
            .collect();
        (hex_defs, port_defs)
    }
}

/// The 19 land coordinates of the standard board: center, ring 1, ring 2.
fn standard_coords() -> Vec<HexCoord> {
    vec![
        HexCoord::new(0, 0),
        HexCoord::new(1, 0),
        HexCoord::new(1, -1),
        HexCoord::new(0, -1),
        HexCoord::new(-1, 0),
        HexCoord::new(-1, 1),
        HexCoord::new(0, 1),
        HexCoord::new(2, 0),
        HexCoord::new(2, -1),
        HexCoord::new(2, -2),
        HexCoord::new(1, -2),
        HexCoord::new(0, -2),
        HexCoord::new(-1, -1),
        HexCoord::new(-2, 0),
        HexCoord::new(-2, 1),
        HexCoord::new(-2, 2),
        HexCoord::new(-1, 2),
        HexCoord::new(0, 2),
        HexCoord::new(1, 1),
    ]
}

/// Shuffle the standard token multiset onto the non-desert hexes, retrying
/// to keep 6s and 8s off adjacent hexes.
fn assign_tokens<R: Rng>(
    coords: &[HexCoord],
    kinds: &[HexKind],
    rng: &mut R,
) -> Vec<Option<u8>> {
    const MAX_ATTEMPTS: usize = 100;
    let base: Vec<u8> = vec![2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12];

    let mut tokens = base.clone();
    for attempt in 0..MAX_ATTEMPTS {
        tokens.shuffle(rng);
        let placed = place_tokens(coords, kinds, &tokens);
        if attempt + 1 == MAX_ATTEMPTS || no_adjacent_hotspots(coords, &placed) {
            return placed;
        }
    }
    place_tokens(coords, kinds, &tokens)
}

fn place_tokens(coords: &[HexCoord], kinds: &[HexKind], tokens: &[u8]) -> Vec<Option<u8>> {
    let mut next = tokens.iter().copied();
    coords
        .iter()
        .zip(kinds)
        .map(|(_, kind)| match kind {
            HexKind::Desert => None,
            HexKind::Resource(_) => next.next(),
        })
        .collect()
}

fn no_adjacent_hotspots(coords: &[HexCoord], tokens: &[Option<u8>]) -> bool {
    let by_coord: HashMap<HexCoord, u8> = coords
        .iter()
        .zip(tokens)
        .filter_map(|(&c, &t)| t.map(|t| (c, t)))
        .collect();

    for (coord, &token) in &by_coord {
        if token == 6 || token == 8 {
            for neighbor in coord.neighbors() {
                if matches!(by_coord.get(&neighbor), Some(&n) if n == 6 || n == 8) {
                    return false;
                }
            }
        }
    }
    true
}
