use std::sync::OnceLock;

use crate::map::position::{Geometry, MapPos};

/// Number of densely enumerated hex rings.
pub const DENSE_RINGS: u32 = 9;

/// Hex distances of the sparse far rings used by deposit spread.
const FAR_RING_DISTANCES: [i32; 4] = [10, 12, 14, 16];

/// Total offsets: origin + 6r per dense ring + one rotated seed per far ring.
pub const SPIRAL_LEN: usize = 1 + 270 + 24; // 295

/// Precomputed position offsets ordered outward from the origin in
/// rings: ring 0 is the origin, ring 1 its six neighbors, and so on.
///
/// Built once for the maximum supported radius and shared read-only by
/// every grid; generation passes address neighborhoods exclusively
/// through it.
#[derive(Debug)]
pub struct SpiralTable {
    offsets: Vec<(i32, i32)>,
}

/// 60° rotations of the axial rhombus basis. Applying all six to a
/// sextant seed enumerates a full hex ring.
const ROTATIONS: [[i32; 4]; 6] = [
    [1, 0, 0, 1],
    [0, -1, 1, 1],
    [-1, -1, 1, 0],
    [-1, 0, 0, -1],
    [0, 1, -1, -1],
    [1, 1, -1, 0],
];

impl SpiralTable {
    fn build() -> SpiralTable {
        let mut offsets = Vec::with_capacity(SPIRAL_LEN);
        offsets.push((0, 0));

        // Dense rings: sextant seed for ring r is (r, 0), (r-1, 1), ...,
        // (1, r-1); each rotation contributes one sextant.
        for ring in 1..=DENSE_RINGS as i32 {
            for m in ROTATIONS {
                for i in 0..ring {
                    let (c, r) = (ring - i, i);
                    offsets.push((m[0] * c + m[1] * r, m[2] * c + m[3] * r));
                }
            }
        }

        // Sparse far rings: a single seed per distance, still rotated
        // six ways so deposit spread stays roughly isotropic.
        for d in FAR_RING_DISTANCES {
            for m in ROTATIONS {
                offsets.push((m[0] * d, m[2] * d));
            }
        }

        debug_assert_eq!(offsets.len(), SPIRAL_LEN);
        SpiralTable { offsets }
    }

    /// Process-wide shared table, built on first use.
    pub fn shared() -> &'static SpiralTable {
        static TABLE: OnceLock<SpiralTable> = OnceLock::new();
        TABLE.get_or_init(SpiralTable::build)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Raw column/row delta of entry `index`.
    ///
    /// # Panics
    /// Panics when `index` is outside the built table; callers own the
    /// radius they request.
    pub fn offset(&self, index: usize) -> (i32, i32) {
        assert!(
            index < self.offsets.len(),
            "Spiral index {} outside built table of {} entries",
            index,
            self.offsets.len()
        );
        self.offsets[index]
    }

    /// Position at spiral entry `index` away from `origin`, wrapped to
    /// the given grid.
    pub fn pos_add(&self, geom: &Geometry, origin: MapPos, index: usize) -> MapPos {
        let (dc, dr) = self.offset(index);
        geom.pos_add(origin, dc, dr)
    }

    /// First spiral index of `ring`, valid for the dense rings.
    pub fn ring_start(ring: u32) -> usize {
        assert!(ring <= DENSE_RINGS, "Ring {} beyond dense spiral", ring);
        if ring == 0 {
            0
        } else {
            (1 + 3 * ring * (ring - 1)) as usize
        }
    }

    /// Number of entries in `ring`.
    pub fn ring_len(ring: u32) -> usize {
        assert!(ring <= DENSE_RINGS, "Ring {} beyond dense spiral", ring);
        if ring == 0 { 1 } else { (6 * ring) as usize }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_has_expected_length() {
        assert_eq!(SpiralTable::shared().len(), 295);
    }

    #[test]
    fn first_ring_is_the_six_neighbors() {
        let table = SpiralTable::shared();
        let ring1: HashSet<(i32, i32)> = (1..7).map(|i| table.offset(i)).collect();
        let expected: HashSet<(i32, i32)> =
            [(1, 0), (0, 1), (-1, 1), (-1, 0), (0, -1), (1, -1)].into_iter().collect();
        assert_eq!(ring1, expected);
    }

    #[test]
    fn dense_rings_have_no_duplicates() {
        let table = SpiralTable::shared();
        let dense_end = SpiralTable::ring_start(DENSE_RINGS) + SpiralTable::ring_len(DENSE_RINGS);
        let unique: HashSet<(i32, i32)> = (0..dense_end).map(|i| table.offset(i)).collect();
        assert_eq!(unique.len(), dense_end, "duplicate offset within dense rings");
    }

    #[test]
    fn offsets_ordered_by_non_decreasing_distance() {
        let table = SpiralTable::shared();
        let mut last = 0;
        for i in 0..table.len() {
            let (dc, dr) = table.offset(i);
            let d = Geometry::hex_distance(dc, dr);
            assert!(d >= last, "entry {} at distance {} after {}", i, d, last);
            last = d;
        }
    }

    #[test]
    fn each_dense_ring_sits_at_its_distance() {
        let table = SpiralTable::shared();
        for ring in 0..=DENSE_RINGS {
            let start = SpiralTable::ring_start(ring);
            for i in start..start + SpiralTable::ring_len(ring) {
                let (dc, dr) = table.offset(i);
                assert_eq!(
                    Geometry::hex_distance(dc, dr),
                    ring as i32,
                    "entry {} not on ring {}",
                    i,
                    ring
                );
            }
        }
    }

    #[test]
    fn ring_indexing_is_contiguous() {
        let mut next = 0;
        for ring in 0..=DENSE_RINGS {
            assert_eq!(SpiralTable::ring_start(ring), next);
            next += SpiralTable::ring_len(ring);
        }
        assert_eq!(next, 271);
    }

    #[test]
    #[should_panic(expected = "Spiral index")]
    fn out_of_range_index_panics() {
        SpiralTable::shared().offset(SPIRAL_LEN);
    }

    #[test]
    fn pos_add_wraps_on_grid() {
        let geom = Geometry::new(0);
        let table = SpiralTable::shared();
        let origin = geom.pos(0, 0);
        // Entry 4 is (-1, 0): wraps to the last column.
        let p = table.pos_add(&geom, origin, 4);
        assert_eq!(geom.col(p), geom.cols() - 1);
        assert_eq!(geom.row(p), 0);
    }
}
