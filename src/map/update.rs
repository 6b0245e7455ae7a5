use serde::{Deserialize, Serialize};

use crate::map::Map;
use crate::map::position::{Direction, MapPos};
use crate::map::tile::object;

/// Ticks coalesced into one batch of region-sized work.
const TICKS_PER_BATCH: u16 = 20;

/// Column stride between successive visited positions. Odd and coprime
/// to every power-of-two column count, so the walk covers the grid.
const COLUMN_STRIDE: u32 = 23;

/// Batches between sign-expiry sweeps.
const SIGN_DECAY_RESET: u16 = 16;

/// Fish stock a single water tile can hold.
pub const MAX_FISH: u8 = 10;

/// Scheduler bookkeeping for the amortized map walk. Serialized with
/// snapshots so a restored map resumes mid-walk instead of restarting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateState {
    pub last_tick: u16,
    pub counter: u16,
    pub remove_signs_counter: u16,
    pub initial_pos: MapPos,
}

impl Default for UpdateState {
    fn default() -> UpdateState {
        UpdateState {
            last_tick: 0,
            counter: 0,
            remove_signs_counter: SIGN_DECAY_RESET,
            initial_pos: MapPos(0),
        }
    }
}

impl Map {
    /// Advance the live map to `tick`.
    ///
    /// Work is amortized: every 20 elapsed ticks buy one batch of
    /// `region_count` position visits, and the walk position persists
    /// across calls, so cost per call stays bounded no matter how the
    /// caller paces its ticks. Tick arithmetic wraps.
    pub fn update(&mut self, tick: u16) {
        let delta = tick.wrapping_sub(self.update_state.last_tick);
        self.update_state.last_tick = tick;
        self.update_state.counter = self.update_state.counter.wrapping_add(delta);

        let mut iters: u32 = 0;
        while self.update_state.counter >= TICKS_PER_BATCH {
            iters += self.region_count;
            self.update_state.counter -= TICKS_PER_BATCH;
        }

        let mut pos = self.update_state.initial_pos;
        for _ in 0..iters {
            let delete_signs = if self.update_state.remove_signs_counter == 0 {
                self.update_state.remove_signs_counter = SIGN_DECAY_RESET;
                true
            } else {
                self.update_state.remove_signs_counter -= 1;
                false
            };

            self.update_hidden(pos);
            self.update_public(pos, delete_signs);
            pos = self.advance_walk(pos);
        }
        self.update_state.initial_pos = pos;
    }

    /// Next position of the update walk: 23 columns right, dropping to
    /// the next row when the column index wraps.
    fn advance_walk(&self, pos: MapPos) -> MapPos {
        let geom = self.geometry();
        let col = geom.col(pos) + COLUMN_STRIDE;
        let row = if col >= geom.cols() {
            geom.row(pos) + 1
        } else {
            geom.row(pos)
        };
        geom.pos(col, row)
    }

    /// Resources invisible to the player: the fish population. Stock
    /// slowly replenishes and drifts between adjacent water tiles, one
    /// unit at a time, never onto land and never past the cap.
    fn update_hidden(&mut self, pos: MapPos) {
        if !self.is_water_tile(pos) {
            return;
        }
        let r = self.rng.next();

        let fish = self.fish(pos);
        if fish > 0 && fish < MAX_FISH && r & 0x70 == 0 {
            self.tile_mut(pos).set_fish(fish + 1);
        }

        if self.fish(pos) > 0 {
            let dir = Direction::from_index((r % 6) as usize);
            let dest = self.geometry.move_in(pos, dir);
            if self.is_water_tile(dest) && self.fish(dest) < MAX_FISH {
                let moved = self.fish(pos) - 1;
                let arrived = self.fish(dest) + 1;
                self.tile_mut(pos).set_fish(moved);
                self.tile_mut(dest).set_fish(arrived);
            }
        }
    }

    /// Visible object life cycle: stump decay, felled trunks settling
    /// into stumps, sapling maturation, field aging and sign expiry.
    fn update_public(&mut self, pos: MapPos, delete_signs: bool) {
        let obj = self.object(pos);

        if obj == object::STUB {
            if self.rng.next() & 3 == 0 {
                self.set_object(pos, object::NONE, 0);
            }
        } else if (object::FELLED_PINE_0..=object::FELLED_PINE_0 + 4).contains(&obj)
            || (object::FELLED_TREE_0..=object::FELLED_TREE_0 + 4).contains(&obj)
        {
            self.set_object(pos, object::STUB, 0);
        } else if obj == object::NEW_PINE {
            let r = self.rng.next();
            if r & 0x300 == 0 {
                self.set_object(pos, object::PINE_0 + (r & 7) as u8, 0);
            }
        } else if obj == object::NEW_TREE {
            let r = self.rng.next();
            if r & 0x300 == 0 {
                self.set_object(pos, object::TREE_0 + (r & 7) as u8, 0);
            }
        } else if (object::FIELD_0..=object::FIELD_0 + 4).contains(&obj) {
            self.set_object(pos, obj + 1, 0);
        } else if obj == object::FIELD_0 + 5 {
            self.set_object(pos, object::FIELD_EXPIRED, 0);
        } else if obj == object::FIELD_EXPIRED {
            self.set_object(pos, object::NONE, 0);
        } else if delete_signs && object::is_sign(obj) {
            self.set_object(pos, object::NONE, 0);
        }
    }
}
