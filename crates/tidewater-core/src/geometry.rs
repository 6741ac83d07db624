//! Hex coordinate system and exact corner geometry.
//!
//! Hexes live on an axial grid (q, r). Corners are where settlements go,
//! and the same physical corner is computed by up to three different hexes,
//! so corner identity must never depend on floating-point rounding. Every
//! corner of a pointy-top hex lies on an integer half-step lattice:
//!
//! - a hex center sits at lattice point `(a, b) = (2q + r, 3r)`
//! - its six corners sit at fixed integer offsets from that point
//!
//! Pixel positions are a display-only projection of those lattice points
//! (`x = size * sqrt(3)/2 * a`, `y = size * b / 2`), applied as the very
//! last step; nothing downstream keys on them.

use serde::{Deserialize, Serialize};

/// Hex radius used for all pixel projections.
pub const HEX_SIZE: f64 = 60.0;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Axial coordinate for the hex grid.
///
/// `q` increases going east, `r` increases going southeast. The implicit
/// third coordinate satisfies q + r + s = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implicit third coordinate (s = -q - r)
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// The six neighboring hexes in clockwise order starting from East
    pub fn neighbors(&self) -> [HexCoord; 6] {
        [
            HexCoord::new(self.q + 1, self.r),
            HexCoord::new(self.q + 1, self.r - 1),
            HexCoord::new(self.q, self.r - 1),
            HexCoord::new(self.q - 1, self.r),
            HexCoord::new(self.q - 1, self.r + 1),
            HexCoord::new(self.q, self.r + 1),
        ]
    }

    /// Distance to another hex (in hex steps)
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Lattice point of this hex's center.
    pub const fn center_key(&self) -> CornerKey {
        CornerKey {
            a: 2 * self.q + self.r,
            b: 3 * self.r,
        }
    }

    /// The six corner lattice points in cyclic (clockwise) order, starting
    /// from the top corner. Consecutive entries are joined by an edge.
    ///
    /// The offsets encode the usual 60-degree corner pattern with a
    /// 30-degree start, expressed exactly: one lattice unit along `a` is
    /// sqrt(3)/2 hex radii, one unit along `b` is half a radius.
    pub fn corner_keys(&self) -> [CornerKey; 6] {
        const OFFSETS: [(i32, i32); 6] = [(0, -2), (1, -1), (1, 1), (0, 2), (-1, 1), (-1, -1)];
        let c = self.center_key();
        OFFSETS.map(|(da, db)| CornerKey {
            a: c.a + da,
            b: c.b + db,
        })
    }

    /// Pixel center of this hex (pointy-top orientation).
    pub fn to_pixel(&self) -> (f64, f64) {
        self.center_key().to_pixel()
    }
}

/// Exact integer key for a corner (or center) position.
///
/// Two hexes that share a physical corner compute the identical key, so
/// deduplication is plain `Eq` - no epsilon, no tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CornerKey {
    pub a: i32,
    pub b: i32,
}

impl CornerKey {
    /// Project to display coordinates. Identity never flows through this.
    pub fn to_pixel(&self) -> (f64, f64) {
        (
            HEX_SIZE * SQRT_3 / 2.0 * self.a as f64,
            HEX_SIZE * 0.5 * self.b as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn hex_neighbors_are_unique_and_adjacent() {
        let center = HexCoord::new(0, 0);
        let neighbors = center.neighbors();

        let unique: HashSet<_> = neighbors.iter().collect();
        assert_eq!(unique.len(), 6);

        for neighbor in &neighbors {
            assert_eq!(center.distance_to(neighbor), 1);
        }
    }

    #[test]
    fn hex_distance() {
        let a = HexCoord::new(0, 0);
        assert_eq!(a.distance_to(&HexCoord::new(2, -1)), 2);
        assert_eq!(a.distance_to(&HexCoord::new(-3, 3)), 3);
    }

    #[test]
    fn corner_keys_are_distinct() {
        let keys = HexCoord::new(0, 0).corner_keys();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn adjacent_hexes_share_exactly_two_corners() {
        let center = HexCoord::new(0, 0);
        let mine: HashSet<_> = center.corner_keys().into_iter().collect();

        for neighbor in center.neighbors() {
            let theirs: HashSet<_> = neighbor.corner_keys().into_iter().collect();
            assert_eq!(
                mine.intersection(&theirs).count(),
                2,
                "hex {:?} should share two corners with {:?}",
                center,
                neighbor
            );
        }
    }

    #[test]
    fn three_hexes_meet_at_one_corner() {
        // The top corner of (0,0) is also a corner of (0,-1) and (1,-1).
        let key = HexCoord::new(0, 0).corner_keys()[0];
        for hex in [HexCoord::new(0, -1), HexCoord::new(1, -1)] {
            assert!(
                hex.corner_keys().contains(&key),
                "{:?} should touch the shared corner",
                hex
            );
        }
    }

    #[test]
    fn corner_pixels_sit_one_radius_from_center() {
        let hex = HexCoord::new(3, -2);
        let (cx, cy) = hex.to_pixel();
        for key in hex.corner_keys() {
            let (x, y) = key.to_pixel();
            let dist = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            assert!(
                (dist - HEX_SIZE).abs() < 1e-9,
                "corner should be exactly one radius out, got {}",
                dist
            );
        }
    }

    #[test]
    fn top_corner_is_straight_up() {
        let hex = HexCoord::new(1, 1);
        let (cx, cy) = hex.to_pixel();
        let (x, y) = hex.corner_keys()[0].to_pixel();
        assert!((x - cx).abs() < 1e-9);
        assert!((y - (cy - HEX_SIZE)).abs() < 1e-9);
    }
}
