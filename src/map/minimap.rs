//! Minimap rendering: one color per tile, picked from a fixed palette
//! of terrain bands shaded by the local height gradient. The caller
//! owns invalidation; rendering itself reads the map without touching
//! any state.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::map::Map;
use crate::map::position::Direction;
use crate::map::tile::Terrain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Palette rows, one per terrain family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Water = 0,
    Grass = 1,
    Desert = 2,
    Tundra = 3,
    Snow = 4,
}

const BAND_COUNT: usize = 5;

/// Gradient steps per band: height deltas clamped to -8..=7.
const SHADE_STEPS: usize = 16;

const BASE_COLORS: [Color; BAND_COUNT] = [
    Color { r: 8, g: 60, b: 136 },   // water
    Color { r: 44, g: 108, b: 28 },  // grass
    Color { r: 180, g: 160, b: 80 }, // desert
    Color { r: 106, g: 82, b: 64 },  // tundra
    Color { r: 226, g: 226, b: 230 }, // snow
];

impl Band {
    fn of(terrain: Terrain) -> Band {
        match terrain {
            t if t < Terrain::Grass0 => Band::Water,
            t if t < Terrain::Desert0 => Band::Grass,
            t if t < Terrain::Tundra0 => Band::Desert,
            t if t < Terrain::Snow0 => Band::Tundra,
            _ => Band::Snow,
        }
    }
}

fn shade_channel(base: u8, step: usize) -> u8 {
    // Integer factor from roughly 2/3 to 4/3 of the base value.
    ((base as u32 * (16 + step as u32)) / 24).min(255) as u8
}

fn palette() -> &'static [[Color; SHADE_STEPS]; BAND_COUNT] {
    static PALETTE: OnceLock<[[Color; SHADE_STEPS]; BAND_COUNT]> = OnceLock::new();
    PALETTE.get_or_init(|| {
        let mut table = [[Color { r: 0, g: 0, b: 0 }; SHADE_STEPS]; BAND_COUNT];
        for (band, base) in BASE_COLORS.iter().enumerate() {
            for step in 0..SHADE_STEPS {
                table[band][step] = Color {
                    r: shade_channel(base.r, step),
                    g: shade_channel(base.g, step),
                    b: shade_channel(base.b, step),
                };
            }
        }
        table
    })
}

/// Color for one terrain triangle under the given height delta. The
/// delta is clamped into the palette's gradient range.
pub fn color(terrain: Terrain, height_delta: i32) -> Color {
    let step = (height_delta.clamp(-8, 7) + 8) as usize;
    palette()[Band::of(terrain) as usize][step]
}

/// Render the whole map, one color per tile in row-major order. The
/// gradient compares each tile with its down-right neighbor, so slopes
/// facing the lower-right corner render brighter.
pub fn minimap_colors(map: &Map) -> Vec<Color> {
    let geom = *map.geometry();
    geom.positions()
        .map(|pos| {
            let down_right = geom.move_in(pos, Direction::DownRight);
            let delta = map.height(pos) as i32 - map.height(down_right) as i32;
            color(map.type_up(pos), delta)
        })
        .collect()
}
