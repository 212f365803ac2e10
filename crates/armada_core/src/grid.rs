//! Toroidal grid geometry.
//!
//! The game board is an `N x N` torus: moving off one edge re-enters on the
//! opposite edge. Distances are toroidal Manhattan distances, so every pair
//! of cells is at most `N` apart per axis. All geometry queries used by the
//! planner live here; ore amounts are snapshot data owned by [`Grid`].

use serde::{Deserialize, Serialize};

/// One of the four orthogonal movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Toward smaller `y` (wrapping).
    North,
    /// Toward larger `x` (wrapping).
    East,
    /// Toward larger `y` (wrapping).
    South,
    /// Toward smaller `x` (wrapping).
    West,
}

/// All directions in clockwise order starting north.
pub const DIRECTIONS: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

impl Direction {
    /// Single-letter serialization used by the flight plan grammar.
    #[must_use]
    pub const fn to_char(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        }
    }

    /// Parse a direction letter.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'N' => Some(Direction::North),
            'E' => Some(Direction::East),
            'S' => Some(Direction::South),
            'W' => Some(Direction::West),
            _ => None,
        }
    }

    /// Direction ordinal used by the external wire format (N=0, E=1, S=2, W=3).
    #[must_use]
    pub const fn game_id(self) -> u8 {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// Inverse of [`Direction::game_id`].
    #[must_use]
    pub const fn from_game_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Direction::North),
            1 => Some(Direction::East),
            2 => Some(Direction::South),
            3 => Some(Direction::West),
            _ => None,
        }
    }

    /// The reverse direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// The next direction clockwise.
    #[must_use]
    pub const fn rotate_cw(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }
}

/// A cell coordinate on the torus. Always normalized to `0..size` per axis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Point {
    /// Column, `0..size`.
    pub x: u16,
    /// Row, `0..size`.
    pub y: u16,
}

impl Point {
    /// Create a point. Coordinates must already be in range.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The `N x N` torus with the current turn's per-cell ore amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    size: u16,
    /// Ore per cell in row-major order.
    ore: Vec<f64>,
}

impl Grid {
    /// Create a grid from row-major ore amounts.
    ///
    /// # Panics
    ///
    /// Panics if `ore.len() != size * size` or `size` is zero.
    #[must_use]
    pub fn new(size: u16, ore: Vec<f64>) -> Self {
        assert!(size > 0, "Grid size must be positive");
        assert_eq!(
            ore.len(),
            (size as usize) * (size as usize),
            "ore array must cover the full grid"
        );
        Self { size, ore }
    }

    /// Grid edge length.
    #[must_use]
    pub const fn size(&self) -> u16 {
        self.size
    }

    /// Row-major cell index.
    #[must_use]
    pub fn index(&self, p: Point) -> usize {
        (p.y as usize) * (self.size as usize) + (p.x as usize)
    }

    /// Inverse of [`Grid::index`].
    #[must_use]
    pub fn point(&self, index: usize) -> Point {
        Point::new(
            (index % self.size as usize) as u16,
            (index / self.size as usize) as u16,
        )
    }

    /// Ore currently on a cell.
    #[must_use]
    pub fn ore_at(&self, p: Point) -> f64 {
        self.ore[self.index(p)]
    }

    /// Total ore on the board.
    #[must_use]
    pub fn total_ore(&self) -> f64 {
        self.ore.iter().sum()
    }

    /// Iterate over every cell.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        let size = self.size;
        (0..size).flat_map(move |y| (0..size).map(move |x| Point::new(x, y)))
    }

    /// The neighbor of `p` one step in `dir`, wrapping at the edges.
    #[must_use]
    pub fn shift(&self, p: Point, dir: Direction) -> Point {
        let n = self.size;
        match dir {
            Direction::North => Point::new(p.x, (p.y + n - 1) % n),
            Direction::South => Point::new(p.x, (p.y + 1) % n),
            Direction::East => Point::new((p.x + 1) % n, p.y),
            Direction::West => Point::new((p.x + n - 1) % n, p.y),
        }
    }

    /// The cell `steps` cells from `p` in `dir`.
    #[must_use]
    pub fn shift_by(&self, p: Point, dir: Direction, steps: u16) -> Point {
        let n = self.size;
        let s = steps % n;
        match dir {
            Direction::North => Point::new(p.x, (p.y + n - s) % n),
            Direction::South => Point::new(p.x, (p.y + s) % n),
            Direction::East => Point::new((p.x + s) % n, p.y),
            Direction::West => Point::new((p.x + n - s) % n, p.y),
        }
    }

    /// Minimal wrapped step count along one axis, with the direction that
    /// achieves it. Returns `None` for zero displacement.
    fn axis_move(&self, from: u16, to: u16, pos: Direction, neg: Direction) -> Option<(Direction, u16)> {
        if from == to {
            return None;
        }
        let n = self.size;
        let forward = (to + n - from) % n;
        let backward = n - forward;
        if forward <= backward {
            Some((pos, forward))
        } else {
            Some((neg, backward))
        }
    }

    /// Toroidal Manhattan distance.
    #[must_use]
    pub fn distance(&self, a: Point, b: Point) -> u32 {
        let dx = self
            .axis_move(a.x, b.x, Direction::East, Direction::West)
            .map_or(0, |(_, s)| s);
        let dy = self
            .axis_move(a.y, b.y, Direction::South, Direction::North)
            .map_or(0, |(_, s)| s);
        u32::from(dx) + u32::from(dy)
    }

    /// Every minimal-length direction decomposition from `a` to `b`.
    ///
    /// Zero displacement yields nothing; one-axis displacement yields one
    /// `(direction, steps)` move; two-axis displacement yields both moves,
    /// x-axis first. Orderings are the caller's concern.
    #[must_use]
    pub fn moves_to(&self, a: Point, b: Point) -> Vec<(Direction, u16)> {
        let mut moves = Vec::with_capacity(2);
        if let Some(m) = self.axis_move(a.x, b.x, Direction::East, Direction::West) {
            moves.push(m);
        }
        if let Some(m) = self.axis_move(a.y, b.y, Direction::South, Direction::North) {
            moves.push(m);
        }
        moves
    }

    /// The four orthogonal neighbors.
    #[must_use]
    pub fn adjacent(&self, p: Point) -> [Point; 4] {
        [
            self.shift(p, Direction::North),
            self.shift(p, Direction::East),
            self.shift(p, Direction::South),
            self.shift(p, Direction::West),
        ]
    }

    /// The 3x3 block centered on `p` (including `p` itself).
    #[must_use]
    pub fn block9(&self, p: Point) -> Vec<Point> {
        let n = self.size;
        let mut out = Vec::with_capacity(9);
        for dy in [n - 1, 0, 1] {
            for dx in [n - 1, 0, 1] {
                out.push(Point::new((p.x + dx) % n, (p.y + dy) % n));
            }
        }
        out
    }

    /// All cells within toroidal Manhattan distance `1..=radius` of `p`.
    #[must_use]
    pub fn nearby(&self, p: Point, radius: u16) -> Vec<Point> {
        let mut out = Vec::new();
        for q in self.points() {
            let d = self.distance(p, q);
            if d > 0 && d <= u32::from(radius) {
                out.push(q);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid(size: u16) -> Grid {
        Grid::new(size, vec![0.0; (size as usize) * (size as usize)])
    }

    #[test]
    fn test_distance_wraps() {
        let g = grid(21);
        let a = Point::new(0, 0);
        let b = Point::new(20, 20);
        // One step west and one step north across the seam.
        assert_eq!(g.distance(a, b), 2);
    }

    #[test]
    fn test_distance_same_point_zero() {
        let g = grid(21);
        let p = Point::new(7, 13);
        assert_eq!(g.distance(p, p), 0);
    }

    #[test]
    fn test_moves_to_two_axes() {
        let g = grid(21);
        let moves = g.moves_to(Point::new(0, 0), Point::new(3, 19));
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&(Direction::East, 3)));
        assert!(moves.contains(&(Direction::North, 2)));
    }

    #[test]
    fn test_shift_by_round_trip() {
        let g = grid(21);
        let p = Point::new(5, 5);
        let q = g.shift_by(p, Direction::East, 25);
        assert_eq!(q, Point::new(9, 5));
        assert_eq!(g.shift_by(q, Direction::West, 25), p);
    }

    #[test]
    fn test_adjacent_are_distance_one() {
        let g = grid(5);
        for p in g.points() {
            for q in g.adjacent(p) {
                assert_eq!(g.distance(p, q), 1);
            }
        }
    }

    #[test]
    fn test_block9_size() {
        let g = grid(5);
        let block = g.block9(Point::new(0, 0));
        assert_eq!(block.len(), 9);
        for q in &block {
            assert!(g.distance(Point::new(0, 0), *q) <= 2);
        }
    }

    #[test]
    fn test_nearby_radius() {
        let g = grid(21);
        let p = Point::new(10, 10);
        let near = g.nearby(p, 2);
        // 4 at distance 1, 8 at distance 2.
        assert_eq!(near.len(), 12);
        assert!(!near.contains(&p));
    }

    proptest! {
        #[test]
        fn prop_distance_symmetric(ax in 0u16..21, ay in 0u16..21, bx in 0u16..21, by in 0u16..21) {
            let g = grid(21);
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            prop_assert_eq!(g.distance(a, b), g.distance(b, a));
        }

        #[test]
        fn prop_distance_triangle(
            ax in 0u16..21, ay in 0u16..21,
            bx in 0u16..21, by in 0u16..21,
            cx in 0u16..21, cy in 0u16..21,
        ) {
            let g = grid(21);
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            let c = Point::new(cx, cy);
            prop_assert!(g.distance(a, c) <= g.distance(a, b) + g.distance(b, c));
        }

        #[test]
        fn prop_moves_to_sum_to_distance(ax in 0u16..21, ay in 0u16..21, bx in 0u16..21, by in 0u16..21) {
            let g = grid(21);
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            let total: u32 = g.moves_to(a, b).iter().map(|(_, s)| u32::from(*s)).sum();
            prop_assert_eq!(total, g.distance(a, b));
        }
    }
}
