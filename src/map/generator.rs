use tracing::debug;

use crate::config::map::MapConfig;
use crate::map::position::{Direction, Geometry, MapPos};
use crate::map::random::GameRandom;
use crate::map::spiral::SpiralTable;
use crate::map::tile::{Deposit, Terrain, TileRecord, object};

/// Height subdivision algorithm, chosen once at map creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightMode {
    Midpoints,
    DiamondSquare,
}

impl HeightMode {
    /// Config string form; [`MapConfig::validate`] has already rejected
    /// anything else, so an unknown value here is a programmer error.
    pub fn from_config(name: &str) -> HeightMode {
        match name {
            "midpoints" => HeightMode::Midpoints,
            "diamond-square" => HeightMode::DiamondSquare,
            other => panic!("Unknown generator mode '{}'", other),
        }
    }
}

/// Maximum raw height before rescaling to the public 0-31 range.
const MAX_RAW_HEIGHT: i32 = 255;

/// Largest adjacent raw-height delta the relax phase allows.
const MAX_HEIGHT_DELTA: i32 = 32;

/// Fixed multiplier applied to the per-map roughness draw; together
/// they set the initial displacement magnitude of the subdivision.
const SPIKYNESS: i32 = 5;

/// Minimum public height for a decorative mountain cross.
const CROSS_HEIGHT: u8 = 26;

/// Spacing of the coarse corner seed grid.
const SEED_STEP: usize = 16;

struct ClusterSpec {
    clusters_per_region: u32,
    objs_per_cluster: u32,
    radius_mask: usize,
    min: Terrain,
    max: Terrain,
    obj_base: u8,
    variant_mask: u8,
}

/// Surface object scatter, one row per species. Counts scale with the
/// region count so bigger maps stay equally dense.
const OBJECT_CLUSTERS: [ClusterSpec; 12] = [
    // Broadleaf stands on mid grass.
    ClusterSpec { clusters_per_region: 8, objs_per_cluster: 10, radius_mask: 0x7f, min: Terrain::Grass1, max: Terrain::Grass3, obj_base: object::TREE_0, variant_mask: 7 },
    // Pine stands reach down to shoreline grass.
    ClusterSpec { clusters_per_region: 6, objs_per_cluster: 8, radius_mask: 0x7f, min: Terrain::Grass0, max: Terrain::Grass2, obj_base: object::PINE_0, variant_mask: 7 },
    // Mixed stands: the variant mask spans both tree and pine ids.
    ClusterSpec { clusters_per_region: 4, objs_per_cluster: 6, radius_mask: 0x7f, min: Terrain::Grass1, max: Terrain::Grass3, obj_base: object::TREE_0, variant_mask: 15 },
    // Palms on desert.
    ClusterSpec { clusters_per_region: 2, objs_per_cluster: 6, radius_mask: 0x3f, min: Terrain::Desert0, max: Terrain::Tundra0, obj_base: object::PALM_0, variant_mask: 3 },
    // Submerged trees in shallow water.
    ClusterSpec { clusters_per_region: 2, objs_per_cluster: 4, radius_mask: 0x3f, min: Terrain::Water2, max: Terrain::Grass0, obj_base: object::WATER_TREE_0, variant_mask: 3 },
    // Stone piles on any grass.
    ClusterSpec { clusters_per_region: 6, objs_per_cluster: 4, radius_mask: 0x1f, min: Terrain::Grass0, max: Terrain::Desert0, obj_base: object::STONE_0, variant_mask: 7 },
    ClusterSpec { clusters_per_region: 2, objs_per_cluster: 2, radius_mask: 0x1f, min: Terrain::Grass0, max: Terrain::Desert0, obj_base: object::SANDSTONE_0, variant_mask: 1 },
    ClusterSpec { clusters_per_region: 1, objs_per_cluster: 1, radius_mask: 0x0f, min: Terrain::Grass0, max: Terrain::Desert0, obj_base: object::DEAD_TREE, variant_mask: 0 },
    ClusterSpec { clusters_per_region: 2, objs_per_cluster: 1, radius_mask: 0x0f, min: Terrain::Grass0, max: Terrain::Desert0, obj_base: object::STUB, variant_mask: 0 },
    ClusterSpec { clusters_per_region: 1, objs_per_cluster: 2, radius_mask: 0x0f, min: Terrain::Desert0, max: Terrain::Tundra0, obj_base: object::CADAVER_0, variant_mask: 1 },
    ClusterSpec { clusters_per_region: 2, objs_per_cluster: 4, radius_mask: 0x1f, min: Terrain::Desert0, max: Terrain::Tundra0, obj_base: object::CACTUS_0, variant_mask: 1 },
    ClusterSpec { clusters_per_region: 2, objs_per_cluster: 3, radius_mask: 0x1f, min: Terrain::Water2, max: Terrain::Grass0, obj_base: object::WATER_STONE_0, variant_mask: 1 },
];

/// Mineral deposits spread from mountain anchors.
const MINERAL_CLUSTERS: [(u32, Deposit); 4] = [
    (2, Deposit::Gold),
    (4, Deposit::Iron),
    (6, Deposit::Coal),
    (6, Deposit::Stone),
];

const ANCHOR_RETRIES: u32 = 100;
const SCARCE_ANCHOR_RETRIES: u32 = 200;

/// Multi-phase fractal/cellular map generator.
///
/// Phases run in a fixed order; every random draw goes through the one
/// owned [`GameRandom`], so a seed string fully determines the output.
/// The generator works on loose per-field arrays and is packed into
/// [`TileRecord`]s only at the end.
pub struct ClassicGenerator {
    geom: Geometry,
    rng: GameRandom,
    spiral: &'static SpiralTable,
    mode: HeightMode,
    water_level: i32,
    max_lake_area: usize,
    regions: u32,
    preserve_bugs: bool,

    heights: Vec<i32>,
    water: Vec<bool>,
    types_up: Vec<Terrain>,
    types_down: Vec<Terrain>,
    objects: Vec<u8>,
    deposits: Vec<(Deposit, u8)>,
    fish: Vec<u8>,
}

impl ClassicGenerator {
    pub fn new(config: &MapConfig, rng: GameRandom) -> ClassicGenerator {
        let geom = config.geometry();
        let n = geom.tile_count();
        ClassicGenerator {
            geom,
            rng,
            spiral: SpiralTable::shared(),
            mode: HeightMode::from_config(&config.generator),
            water_level: config.water_level,
            max_lake_area: config.max_lake_area as usize,
            regions: config.regions(),
            preserve_bugs: config.preserve_bugs,
            heights: vec![0; n],
            water: vec![false; n],
            types_up: vec![Terrain::Water0; n],
            types_down: vec![Terrain::Water0; n],
            objects: vec![object::NONE; n],
            deposits: vec![(Deposit::None, 0); n],
            fish: vec![0; n],
        }
    }

    /// Run every phase in order. Generation is atomic: there is no
    /// partial output and no cancellation.
    pub fn generate(&mut self) {
        self.seed_corners();
        match self.mode {
            HeightMode::Midpoints => self.subdivide_midpoints(),
            HeightMode::DiamondSquare => self.subdivide_diamond_square(),
        }
        self.relax_heights();
        self.carve_sea_level();
        self.rebase_heights();
        self.rescale_heights();
        debug!("height field complete");

        self.classify_types();
        self.remove_minor_islands();
        self.clear_shore_fish();
        self.grade_lake_depth();
        self.place_mountain_crosses();
        self.create_deserts();
        debug!("terrain types complete");

        self.place_object_clusters();
        self.place_mineral_deposits();
        self.demote_enclosed_objects();
        debug!("objects and deposits complete");
    }

    /// Tear into the parts a [`crate::map::Map`] is built from.
    pub fn into_parts(self) -> (Geometry, Vec<TileRecord>, GameRandom) {
        let mut tiles = vec![TileRecord::default(); self.geom.tile_count()];
        for pos in self.geom.positions() {
            let i = self.geom.index(pos);
            let t = &mut tiles[i];
            t.set_height(self.heights[i] as u8);
            t.set_types(self.types_up[i], self.types_down[i]);
            t.set_object(self.objects[i]);
            if self.types_up[i].is_water() && self.types_down[i].is_water() {
                t.set_fish(self.fish[i]);
            } else {
                let (deposit, amount) = self.deposits[i];
                t.set_deposit(deposit, amount);
            }
        }
        (self.geom, tiles, self.rng)
    }

    // --- Shared helpers ---

    fn idx(&self, pos: MapPos) -> usize {
        self.geom.index(pos)
    }

    fn h(&self, pos: MapPos) -> i32 {
        self.heights[self.idx(pos)]
    }

    fn set_h(&mut self, pos: MapPos, h: i32) {
        let i = self.idx(pos);
        self.heights[i] = h;
    }

    fn rand_pos(&mut self) -> MapPos {
        let col = self.rng.next() as u32 & self.geom.col_mask();
        let row = self.rng.next() as u32 & self.geom.row_mask();
        self.geom.pos(col, row)
    }

    /// Uniform offset in `[-magnitude/2, magnitude/2)`.
    fn rand_offset(&mut self, magnitude: i32) -> i32 {
        ((self.rng.next() as i32 * magnitude) >> 16) - magnitude / 2
    }

    fn is_water_tile(&self, pos: MapPos) -> bool {
        let i = self.idx(pos);
        self.types_up[i].is_water() && self.types_down[i].is_water()
    }

    // --- Phase 1: corner seeds ---

    /// Random heights on the corners of a coarse 16x16 sub-grid; the
    /// subdivision fills everything in between.
    fn seed_corners(&mut self) {
        for row in (0..self.geom.rows()).step_by(SEED_STEP) {
            for col in (0..self.geom.cols()).step_by(SEED_STEP) {
                let h = (self.rng.next() & 0xff) as i32;
                self.set_h(self.geom.pos(col, row), h);
            }
        }
    }

    // --- Phase 2: fractal subdivision ---

    fn initial_magnitude(&mut self) -> (i32, u16) {
        let draw = self.rng.next();
        let roughness = ((draw & 0x0f) + 6) as i32;
        (roughness * SPIKYNESS, draw)
    }

    /// Midpoint displacement: four halving steps from 8 down to 1, each
    /// filling edge and diagonal midpoints from averaged corners plus a
    /// shrinking random offset.
    fn subdivide_midpoints(&mut self) {
        let (mut magnitude, roughness_draw) = self.initial_magnitude();

        // Compatibility quirk: the original game let the high byte of
        // the previous random draw leak into the very first corner read.
        // Kept behind `preserve_bugs` so old seeds reproduce.
        let mut leak = self.preserve_bugs;

        let mut step = 8u32;
        while step > 0 {
            let two = step * 2;
            for row in (0..self.geom.rows()).step_by(two as usize) {
                for col in (0..self.geom.cols()).step_by(two as usize) {
                    let p00 = self.geom.pos(col, row);
                    let h00 = self.h(p00);
                    let mut h10 = self.h(self.geom.pos(col + two, row));
                    if leak {
                        h10 |= (roughness_draw as i32) & 0xff00;
                        leak = false;
                    }
                    let h01 = self.h(self.geom.pos(col, row + two));
                    let h11 = self.h(self.geom.pos(col + two, row + two));

                    let off_a = self.rand_offset(magnitude);
                    let off_b = self.rand_offset(magnitude);
                    let off_c = self.rand_offset(magnitude);
                    self.set_h(
                        self.geom.pos(col + step, row),
                        ((h00 + h10) / 2 + off_a).clamp(0, MAX_RAW_HEIGHT),
                    );
                    self.set_h(
                        self.geom.pos(col, row + step),
                        ((h00 + h01) / 2 + off_b).clamp(0, MAX_RAW_HEIGHT),
                    );
                    self.set_h(
                        self.geom.pos(col + step, row + step),
                        ((h00 + h11) / 2 + off_c).clamp(0, MAX_RAW_HEIGHT),
                    );
                }
            }
            step >>= 1;
            magnitude = (magnitude >> 1).max(1);
        }
    }

    /// Diamond-square: the diamond step averages the four cell corners
    /// into the center, the square step averages the diamond around
    /// each edge midpoint. Same step schedule as the midpoint variant.
    fn subdivide_diamond_square(&mut self) {
        let (mut magnitude, _) = self.initial_magnitude();

        let mut step = 8i32;
        while step > 0 {
            let two = step * 2;
            for row in (0..self.geom.rows() as i32).step_by(two as usize) {
                for col in (0..self.geom.cols() as i32).step_by(two as usize) {
                    let sum = self.h(self.geom.pos(col as u32, row as u32))
                        + self.h(self.geom.pos((col + two) as u32, row as u32))
                        + self.h(self.geom.pos(col as u32, (row + two) as u32))
                        + self.h(self.geom.pos((col + two) as u32, (row + two) as u32));
                    let off = self.rand_offset(magnitude);
                    self.set_h(
                        self.geom.pos((col + step) as u32, (row + step) as u32),
                        (sum / 4 + off).clamp(0, MAX_RAW_HEIGHT),
                    );
                }
            }
            for row in (0..self.geom.rows() as i32).step_by(two as usize) {
                for col in (0..self.geom.cols() as i32).step_by(two as usize) {
                    let origin = self.geom.pos(col as u32, row as u32);
                    let p0 = self.geom.pos_add(origin, step, 0);
                    let sum0 = self.h(origin)
                        + self.h(self.geom.pos_add(origin, two, 0))
                        + self.h(self.geom.pos_add(origin, step, -step))
                        + self.h(self.geom.pos_add(origin, step, step));
                    let off0 = self.rand_offset(magnitude);
                    self.set_h(p0, (sum0 / 4 + off0).clamp(0, MAX_RAW_HEIGHT));

                    let p1 = self.geom.pos_add(origin, 0, step);
                    let sum1 = self.h(origin)
                        + self.h(self.geom.pos_add(origin, 0, two))
                        + self.h(self.geom.pos_add(origin, -step, step))
                        + self.h(self.geom.pos_add(origin, step, step));
                    let off1 = self.rand_offset(magnitude);
                    self.set_h(p1, (sum1 / 4 + off1).clamp(0, MAX_RAW_HEIGHT));
                }
            }
            step >>= 1;
            magnitude = (magnitude >> 1).max(1);
        }
    }

    // --- Phase 3: relax ---

    /// Clamp adjacent deltas to `MAX_HEIGHT_DELTA`, lowering the higher
    /// side, until a fixed point. Terminates: every change strictly
    /// reduces the height sum, which is bounded below by zero.
    fn relax_heights(&mut self) {
        loop {
            let mut changed = false;
            for pos in self.geom.positions() {
                // Right/DownRight/Down cover each adjacent pair once.
                for dir in [Direction::Right, Direction::DownRight, Direction::Down] {
                    let other = self.geom.move_in(pos, dir);
                    let h0 = self.h(pos);
                    let h1 = self.h(other);
                    if h1 > h0 + MAX_HEIGHT_DELTA {
                        self.set_h(other, h0 + MAX_HEIGHT_DELTA);
                        changed = true;
                    } else if h0 > h1 + MAX_HEIGHT_DELTA {
                        self.set_h(pos, h1 + MAX_HEIGHT_DELTA);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    // --- Phase 4: sea carve ---

    /// Flood-fill low areas into lakes, bounded by `max_lake_area`.
    ///
    /// Oversized areas are lifted above the water level instead (in
    /// fill-sized chunks, so a huge basin ends up mostly land with a
    /// lake in whatever pocket remains under the limit). Carved tiles
    /// get their initial fish stock here.
    fn carve_sea_level(&mut self) {
        if self.water_level < 0 {
            return;
        }
        let wl = self.water_level;
        for level in 0..=wl {
            for pos in self.geom.positions() {
                let i = self.idx(pos);
                if self.water[i] || self.heights[i] != level {
                    continue;
                }
                let area = self.collect_low_area(pos, wl);
                if area.len() <= self.max_lake_area {
                    for &p in &area {
                        let j = self.geom.index(p);
                        self.water[j] = true;
                        self.heights[j] = (wl - 1).max(0);
                        let r = self.rng.next();
                        self.fish[j] = ((r & 3) + ((r >> 4) & 7)) as u8;
                    }
                } else {
                    for &p in &area {
                        let j = self.geom.index(p);
                        self.heights[j] = wl + 1;
                    }
                }
            }
        }
    }

    /// Contiguous non-water area at or below `wl` around `start`,
    /// abandoned as soon as it grows past the lake limit.
    fn collect_low_area(&self, start: MapPos, wl: i32) -> Vec<MapPos> {
        let mut seen = vec![false; self.geom.tile_count()];
        let mut area = Vec::new();
        let mut stack = vec![start];
        seen[self.idx(start)] = true;
        while let Some(pos) = stack.pop() {
            area.push(pos);
            if area.len() > self.max_lake_area {
                break;
            }
            for dir in Direction::all() {
                let n = self.geom.move_in(pos, dir);
                let j = self.idx(n);
                if !seen[j] && !self.water[j] && self.heights[j] <= wl {
                    seen[j] = true;
                    stack.push(n);
                }
            }
        }
        area
    }

    // --- Phases 5 and 6: rebase and rescale ---

    fn rebase_heights(&mut self) {
        if self.water_level < 0 {
            return;
        }
        let shift = self.water_level - 1;
        for i in 0..self.heights.len() {
            if self.water[i] {
                self.heights[i] = 0;
            } else {
                self.heights[i] = (self.heights[i] - shift).max(0);
            }
        }
    }

    fn rescale_heights(&mut self) {
        for h in &mut self.heights {
            *h = ((*h + 6) >> 3).min(31);
        }
    }

    // --- Type classification ---

    fn terrain_from_sum(sum: i32) -> Terrain {
        match sum {
            s if s < 3 => Terrain::Water0,
            s if s < 12 => Terrain::Grass0,
            s if s < 24 => Terrain::Grass1,
            s if s < 36 => Terrain::Grass2,
            s if s < 48 => Terrain::Grass3,
            s if s < 60 => Terrain::Tundra0,
            s if s < 72 => Terrain::Tundra1,
            s if s < 84 => Terrain::Tundra2,
            _ => Terrain::Snow0,
        }
    }

    /// Each triangle's type comes from the sum of its three corner
    /// heights through a fixed step function.
    fn classify_types(&mut self) {
        for pos in self.geom.positions() {
            let h0 = self.h(pos);
            let h_right = self.h(self.geom.move_in(pos, Direction::Right));
            let h_down_right = self.h(self.geom.move_in(pos, Direction::DownRight));
            let h_down = self.h(self.geom.move_in(pos, Direction::Down));

            let i = self.idx(pos);
            self.types_up[i] = Self::terrain_from_sum(h0 + h_right + h_down_right);
            self.types_down[i] = Self::terrain_from_sum(h0 + h_down_right + h_down);
        }
    }

    /// Flood-fill land components; only the dominant landmass survives.
    /// Everything else is flattened back to deep water so no micro
    /// island can strand a player.
    fn remove_minor_islands(&mut self) {
        let n = self.geom.tile_count();
        let mut component = vec![usize::MAX; n];
        let mut sizes: Vec<usize> = Vec::new();

        for start in self.geom.positions() {
            let si = self.idx(start);
            if self.heights[si] == 0 || component[si] != usize::MAX {
                continue;
            }
            let id = sizes.len();
            let mut size = 0usize;
            let mut stack = vec![start];
            component[si] = id;
            while let Some(pos) = stack.pop() {
                size += 1;
                for dir in Direction::all() {
                    let np = self.geom.move_in(pos, dir);
                    let j = self.idx(np);
                    if self.heights[j] > 0 && component[j] == usize::MAX {
                        component[j] = id;
                        stack.push(np);
                    }
                }
            }
            sizes.push(size);
        }

        let Some(largest) = sizes.iter().enumerate().max_by_key(|&(_, s)| *s).map(|(i, _)| i)
        else {
            return; // all-water map
        };

        for i in 0..n {
            if component[i] != usize::MAX && component[i] != largest {
                self.heights[i] = 0;
                self.types_up[i] = Terrain::Water0;
                self.types_down[i] = Terrain::Water0;
            }
        }
    }

    /// Classification can give a carved shoreline tile a land triangle;
    /// such mixed tiles carry no fish stock.
    fn clear_shore_fish(&mut self) {
        for pos in self.geom.positions() {
            if !self.is_water_tile(pos) {
                let i = self.idx(pos);
                self.fish[i] = 0;
            }
        }
    }

    /// True when any triangle of the 12 spiral-adjacent positions
    /// matches the predicate.
    fn neighborhood_has(&self, pos: MapPos, pred: impl Fn(Terrain) -> bool) -> bool {
        (1..=12).any(|i| {
            let p = self.spiral.pos_add(&self.geom, pos, i);
            let j = self.geom.index(p);
            pred(self.types_up[j]) || pred(self.types_down[j])
        })
    }

    /// Grade water depth inward from the shore: land-adjacent water
    /// becomes the shallowest band, then each band seeds the next one
    /// deeper, iterated to a fixed point. Untouched interior stays deep.
    fn grade_lake_depth(&mut self) {
        for pos in self.geom.positions() {
            let near_land = self.neighborhood_has(pos, |t| !t.is_water());
            if !near_land {
                continue;
            }
            let i = self.idx(pos);
            if self.types_up[i] == Terrain::Water0 {
                self.types_up[i] = Terrain::Water3;
            }
            if self.types_down[i] == Terrain::Water0 {
                self.types_down[i] = Terrain::Water3;
            }
        }

        loop {
            let mut changed = false;
            for pos in self.geom.positions() {
                let i = self.idx(pos);
                if self.types_up[i] != Terrain::Water0 && self.types_down[i] != Terrain::Water0 {
                    continue;
                }
                let next = if self.neighborhood_has(pos, |t| t == Terrain::Water3) {
                    Some(Terrain::Water2)
                } else if self.neighborhood_has(pos, |t| t == Terrain::Water2) {
                    Some(Terrain::Water1)
                } else {
                    None
                };
                if let Some(t) = next {
                    if self.types_up[i] == Terrain::Water0 {
                        self.types_up[i] = t;
                        changed = true;
                    }
                    if self.types_down[i] == Terrain::Water0 {
                        self.types_down[i] = t;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Decorative crosses on peaks that strictly dominate all six
    /// neighbors.
    fn place_mountain_crosses(&mut self) {
        for pos in self.geom.positions() {
            let h = self.h(pos);
            if h < CROSS_HEIGHT as i32 {
                continue;
            }
            let dominates = Direction::all()
                .iter()
                .all(|&d| self.h(self.geom.move_in(pos, d)) < h);
            if dominates {
                let i = self.idx(pos);
                self.objects[i] = object::CROSS;
            }
        }
    }

    /// The four triangles around a tile's own vertex, used by the
    /// desert seed test.
    fn grass_seed_test(&self, pos: MapPos) -> bool {
        let up_left = self.geom.move_in(pos, Direction::UpLeft);
        let up = self.geom.move_in(pos, Direction::Up);
        let i = self.idx(pos);
        let samples = [
            self.types_up[i],
            self.types_down[i],
            self.types_down[self.idx(up_left)],
            self.types_up[self.idx(up)],
        ];
        samples
            .iter()
            .all(|t| (Terrain::Grass0..Terrain::Desert0).contains(t))
    }

    fn desert_grade_for_ring(ring: u32) -> Terrain {
        match ring {
            0..=3 => Terrain::Desert2,
            4..=6 => Terrain::Desert1,
            _ => Terrain::Desert0,
        }
    }

    /// Seed one graded desert per region at grass-homogeneous anchors,
    /// then melt isolated fringe triangles back to grass.
    fn create_deserts(&mut self) {
        for _ in 0..self.regions {
            let mut anchor = None;
            for _ in 0..SCARCE_ANCHOR_RETRIES {
                let pos = self.rand_pos();
                if self.grass_seed_test(pos) {
                    anchor = Some(pos);
                    break;
                }
            }
            let Some(anchor) = anchor else {
                continue; // no grassland found; fewer deserts, not an error
            };

            for ring in 0..=8u32 {
                let grade = Self::desert_grade_for_ring(ring);
                let start = SpiralTable::ring_start(ring);
                for idx in start..start + SpiralTable::ring_len(ring) {
                    let p = self.spiral.pos_add(&self.geom, anchor, idx);
                    let j = self.geom.index(p);
                    if (Terrain::Grass0..Terrain::Desert0).contains(&self.types_up[j]) {
                        self.types_up[j] = grade;
                    }
                    if (Terrain::Grass0..Terrain::Desert0).contains(&self.types_down[j]) {
                        self.types_down[j] = grade;
                    }
                }
            }
        }

        // Fringe smoothing: intermediate desert with almost no desert
        // around it reverts to grass.
        for pos in self.geom.positions() {
            let mut desert_neighbors = 0;
            for i in 1..=6 {
                let p = self.spiral.pos_add(&self.geom, pos, i);
                let j = self.geom.index(p);
                for t in [self.types_up[j], self.types_down[j]] {
                    if (Terrain::Desert0..=Terrain::Desert2).contains(&t) {
                        desert_neighbors += 1;
                    }
                }
            }
            if desert_neighbors >= 2 {
                continue;
            }
            let i = self.idx(pos);
            for t in [&mut self.types_up[i], &mut self.types_down[i]] {
                if (Terrain::Desert0..=Terrain::Desert1).contains(t) {
                    *t = Terrain::Grass1;
                }
            }
        }
    }

    // --- Object and resource placement ---

    /// The six triangles incident on the vertex at `pos`; the
    /// homogeneity predicate of every placement pass.
    fn hexagon_types_in_range(&self, pos: MapPos, min: Terrain, max: Terrain) -> bool {
        let left = self.geom.move_in(pos, Direction::Left);
        let up_left = self.geom.move_in(pos, Direction::UpLeft);
        let up = self.geom.move_in(pos, Direction::Up);
        let triangles = [
            self.types_up[self.idx(pos)],
            self.types_down[self.idx(pos)],
            self.types_up[self.idx(left)],
            self.types_up[self.idx(up_left)],
            self.types_down[self.idx(up_left)],
            self.types_down[self.idx(up)],
        ];
        triangles.iter().all(|&t| t >= min && t < max)
    }

    fn place_object_clusters(&mut self) {
        for spec in &OBJECT_CLUSTERS {
            let clusters = spec.clusters_per_region * self.regions;
            for _ in 0..clusters {
                let mut anchor = None;
                for _ in 0..ANCHOR_RETRIES {
                    let pos = self.rand_pos();
                    if self.hexagon_types_in_range(pos, spec.min, spec.max) {
                        anchor = Some(pos);
                        break;
                    }
                }
                // Exhausting the retry budget just means sparser
                // terrain; skip the cluster.
                let Some(anchor) = anchor else { continue };

                for _ in 0..spec.objs_per_cluster {
                    let idx = self.rng.next() as usize & spec.radius_mask;
                    let p = self.spiral.pos_add(&self.geom, anchor, idx);
                    let j = self.geom.index(p);
                    if self.objects[j] == object::NONE
                        && self.hexagon_types_in_range(p, spec.min, spec.max)
                    {
                        let variant = self.rng.next() as u8 & spec.variant_mask;
                        self.objects[j] = spec.obj_base + variant;
                    }
                }
            }
        }
    }

    /// Deposits radiate from a mountain anchor with the amount dropping
    /// by four per spiral ring; an existing richer deposit wins
    /// (max-merge, never overwrite downward).
    fn place_mineral_deposits(&mut self) {
        for &(clusters_per_region, deposit) in &MINERAL_CLUSTERS {
            let clusters = clusters_per_region * self.regions;
            for _ in 0..clusters {
                let mut anchor = None;
                for _ in 0..SCARCE_ANCHOR_RETRIES {
                    let pos = self.rand_pos();
                    if self.hexagon_types_in_range(pos, Terrain::Tundra0, Terrain::Snow1) {
                        anchor = Some(pos);
                        break;
                    }
                }
                let Some(anchor) = anchor else { continue };

                let initial = 12 + (self.rng.next() & 0x0f) as i32;
                for ring in 0..=5u32 {
                    let amount = initial - 4 * ring as i32;
                    if amount <= 0 {
                        break;
                    }
                    let start = SpiralTable::ring_start(ring);
                    for idx in start..start + SpiralTable::ring_len(ring) {
                        let p = self.spiral.pos_add(&self.geom, anchor, idx);
                        if !self.hexagon_types_in_range(p, Terrain::Tundra0, Terrain::Snow1) {
                            continue;
                        }
                        let j = self.geom.index(p);
                        if amount as u8 > self.deposits[j].1 {
                            self.deposits[j] = (deposit, amount as u8);
                        }
                    }
                }
            }
        }
    }

    /// Strip the impassable flag off objects whose whole perimeter is
    /// water or blocked, so the transport network can always route
    /// around whatever survives generation.
    fn demote_enclosed_objects(&mut self) {
        for pos in self.geom.positions() {
            let i = self.idx(pos);
            if !object::is_impassable(self.objects[i]) {
                continue;
            }
            let enclosed = Direction::all().iter().all(|&d| {
                let n = self.geom.move_in(pos, d);
                let j = self.idx(n);
                object::is_impassable(self.objects[j]) || self.is_water_tile(n)
            });
            if enclosed {
                self.objects[i] = object::NONE;
            }
        }
    }
}
