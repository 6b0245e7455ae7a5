use serde::{Deserialize, Serialize};

/// The six movement directions of the triangulated rhombus grid.
///
/// Each tile is a rhombus split into an up and a down triangle; the six
/// directions step between rhombus origins so that the neighborhood of a
/// vertex is hexagonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    Right = 0,
    DownRight = 1,
    Down = 2,
    Left = 3,
    UpLeft = 4,
    Up = 5,
}

impl Direction {
    pub const COUNT: usize = 6;

    /// All directions in index order. Iteration order is part of the
    /// deterministic generation contract.
    pub fn all() -> [Direction; 6] {
        [
            Direction::Right,
            Direction::DownRight,
            Direction::Down,
            Direction::Left,
            Direction::UpLeft,
            Direction::Up,
        ]
    }

    /// # Panics
    /// Panics on an index outside 0..6; an invalid direction constant is
    /// a programmer error, never data.
    pub fn from_index(i: usize) -> Direction {
        match i {
            0 => Direction::Right,
            1 => Direction::DownRight,
            2 => Direction::Down,
            3 => Direction::Left,
            4 => Direction::UpLeft,
            5 => Direction::Up,
            _ => panic!("Invalid direction index {}", i),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn reverse(self) -> Direction {
        Direction::from_index((self.index() + 3) % 6)
    }

    /// Column/row delta of one step, in the axial rhombus basis.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::DownRight => (0, 1),
            Direction::Down => (-1, 1),
            Direction::Left => (-1, 0),
            Direction::UpLeft => (0, -1),
            Direction::Up => (1, -1),
        }
    }
}

/// A position on the toroidal grid, encoded as `(row << col_bits) | col`.
///
/// Positions are cheap value types; equality is by encoded value. All
/// arithmetic goes through [`Geometry`] so wrapping is applied in one
/// place only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct MapPos(pub u32);

/// Grid dimensions and the position encoding derived from a size class.
///
/// Size `s` yields `2^(5 + s/2)` columns and `2^(5 + (s-1)/2)` rows, so
/// the grid grows by alternating axis per size step. Both axes wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    size: u32,
    col_bits: u32,
    row_bits: u32,
}

/// Largest supported size class.
pub const MAX_MAP_SIZE: u32 = 10;

impl Geometry {
    /// # Panics
    /// Panics if `size > MAX_MAP_SIZE`.
    pub fn new(size: u32) -> Geometry {
        assert!(
            size <= MAX_MAP_SIZE,
            "Map size must be 0-{}, got {}",
            MAX_MAP_SIZE,
            size
        );
        Geometry {
            size,
            col_bits: 5 + size / 2,
            row_bits: (5 + (size as i32 - 1).div_euclid(2)) as u32,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn cols(&self) -> u32 {
        1 << self.col_bits
    }

    pub fn rows(&self) -> u32 {
        1 << self.row_bits
    }

    pub fn tile_count(&self) -> usize {
        (self.cols() as usize) * (self.rows() as usize)
    }

    pub fn col_mask(&self) -> u32 {
        self.cols() - 1
    }

    pub fn row_mask(&self) -> u32 {
        self.rows() - 1
    }

    /// Encode a column/row pair; both wrap modulo the grid dimensions.
    pub fn pos(&self, col: u32, row: u32) -> MapPos {
        MapPos((row & self.row_mask()) << self.col_bits | (col & self.col_mask()))
    }

    pub fn col(&self, pos: MapPos) -> u32 {
        pos.0 & self.col_mask()
    }

    pub fn row(&self, pos: MapPos) -> u32 {
        pos.0 >> self.col_bits
    }

    /// Dense array index of a position.
    pub fn index(&self, pos: MapPos) -> usize {
        pos.0 as usize
    }

    /// Add a signed column/row delta with toroidal wrapping.
    pub fn pos_add(&self, pos: MapPos, dc: i32, dr: i32) -> MapPos {
        let col = (self.col(pos) as i32 + dc).rem_euclid(self.cols() as i32) as u32;
        let row = (self.row(pos) as i32 + dr).rem_euclid(self.rows() as i32) as u32;
        self.pos(col, row)
    }

    /// One step in a direction.
    pub fn move_in(&self, pos: MapPos, dir: Direction) -> MapPos {
        let (dc, dr) = dir.delta();
        self.pos_add(pos, dc, dr)
    }

    /// `n` steps in a direction.
    pub fn move_by(&self, pos: MapPos, dir: Direction, n: u32) -> MapPos {
        let (dc, dr) = dir.delta();
        self.pos_add(pos, dc * n as i32, dr * n as i32)
    }

    /// Iterate every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = MapPos> + use<> {
        let geom = *self;
        (0..geom.rows()).flat_map(move |r| (0..geom.cols()).map(move |c| geom.pos(c, r)))
    }

    /// Hex distance between two positions ignoring wrapping, used only
    /// by tests and debugging aids on deltas already known to be short.
    pub fn hex_distance(dc: i32, dr: i32) -> i32 {
        (dc.abs() + dr.abs() + (dc + dr).abs()) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_three_is_64_by_64() {
        let g = Geometry::new(3);
        assert_eq!(g.cols(), 64);
        assert_eq!(g.rows(), 64);
        assert_eq!(g.tile_count(), 4096);
    }

    #[test]
    fn size_zero_is_32_by_16() {
        let g = Geometry::new(0);
        assert_eq!(g.cols(), 32);
        assert_eq!(g.rows(), 16);
    }

    #[test]
    fn sizes_grow_by_alternating_axis() {
        for size in 1..=MAX_MAP_SIZE {
            let prev = Geometry::new(size - 1);
            let cur = Geometry::new(size);
            assert_eq!(
                cur.tile_count(),
                prev.tile_count() * 2,
                "size {} should double size {}",
                size,
                size - 1
            );
        }
    }

    #[test]
    #[should_panic(expected = "Map size must be")]
    fn oversized_geometry_panics() {
        Geometry::new(MAX_MAP_SIZE + 1);
    }

    #[test]
    fn pos_encoding_round_trip() {
        let g = Geometry::new(4);
        for row in [0, 1, g.rows() - 1] {
            for col in [0, 1, g.cols() - 1] {
                let p = g.pos(col, row);
                assert_eq!(g.col(p), col);
                assert_eq!(g.row(p), row);
            }
        }
    }

    #[test]
    fn pos_wraps_on_both_axes() {
        let g = Geometry::new(3);
        assert_eq!(g.pos(g.cols(), 0), g.pos(0, 0));
        assert_eq!(g.pos(0, g.rows() + 2), g.pos(0, 2));
        assert_eq!(g.pos_add(g.pos(0, 0), -1, -1), g.pos(g.cols() - 1, g.rows() - 1));
    }

    #[test]
    fn move_then_reverse_is_identity_everywhere() {
        let g = Geometry::new(1);
        for pos in g.positions() {
            for dir in Direction::all() {
                assert_eq!(
                    g.move_in(g.move_in(pos, dir), dir.reverse()),
                    pos,
                    "closure failed at col {} row {} dir {:?}",
                    g.col(pos),
                    g.row(pos),
                    dir
                );
            }
        }
    }

    #[test]
    fn move_by_matches_repeated_moves() {
        let g = Geometry::new(3);
        let start = g.pos(60, 3);
        for dir in Direction::all() {
            let mut stepped = start;
            for _ in 0..7 {
                stepped = g.move_in(stepped, dir);
            }
            assert_eq!(g.move_by(start, dir, 7), stepped);
        }
    }

    #[test]
    fn direction_reverse_pairs() {
        assert_eq!(Direction::Right.reverse(), Direction::Left);
        assert_eq!(Direction::DownRight.reverse(), Direction::UpLeft);
        assert_eq!(Direction::Down.reverse(), Direction::Up);
        for dir in Direction::all() {
            assert_eq!(dir.reverse().reverse(), dir);
        }
    }

    #[test]
    #[should_panic(expected = "Invalid direction index")]
    fn bad_direction_index_panics() {
        Direction::from_index(6);
    }

    #[test]
    fn positions_visit_every_tile_once() {
        let g = Geometry::new(0);
        let all: Vec<MapPos> = g.positions().collect();
        assert_eq!(all.len(), g.tile_count());
        let mut seen = vec![false; g.tile_count()];
        for p in all {
            assert!(!seen[g.index(p)], "position visited twice");
            seen[g.index(p)] = true;
        }
    }
}
