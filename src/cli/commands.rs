use std::collections::HashMap;
use std::path::Path;

use crate::config::map::MapConfig;
use crate::map::tile::{Deposit, object};
use crate::map::{Map, minimap};
use crate::persistence;

/// Generate a new map and save it as the tick-0 snapshot.
pub fn generate(config: &MapConfig, snapshot_dir: &Path) -> Result<(), String> {
    let map = Map::generate(config)?;
    print_map_summary(&map, 0);

    let path = persistence::save_snapshot(&map, 0, snapshot_dir)
        .map_err(|e| format!("Cannot save snapshot: {}", e))?;
    println!("\nMap saved to {}", path.display());
    Ok(())
}

/// Options controlling the headless run loop.
pub struct RunOptions {
    pub ticks: u64,
    pub snapshot_interval: u64,
    pub max_snapshots: usize,
}

/// Run the live map for a bounded number of ticks, autosaving along
/// the way. Loads a specific snapshot when given a path, otherwise the
/// latest valid one from the snapshot directory.
pub fn run(
    snapshot_dir: &Path,
    map_path: Option<&str>,
    options: &RunOptions,
) -> Result<(), String> {
    let snapshot = match map_path {
        Some(path) => {
            eprintln!("Loading map from {}", path);
            persistence::load_snapshot(Path::new(path))
                .map_err(|e| format!("Failed to load snapshot: {}", e))?
        }
        None => {
            eprintln!("Loading latest snapshot from {}", snapshot_dir.display());
            persistence::load_latest_valid_snapshot(snapshot_dir)
                .map_err(|e| format!("Failed to load snapshot: {}", e))?
        }
    };

    let start_tick = snapshot.tick;
    let mut map = snapshot
        .into_map()
        .map_err(|e| format!("Failed to restore map: {}", e))?;

    eprintln!(
        "Map loaded: {} ({} tiles), resuming at tick {}",
        map.name,
        map.geometry().tile_count(),
        start_tick
    );

    let mut ticks_since_snapshot: u64 = 0;
    let mut tick = start_tick;
    let end = start_tick + options.ticks;

    while tick < end {
        tick += 1;
        map.update(tick as u16);

        ticks_since_snapshot += 1;
        if ticks_since_snapshot >= options.snapshot_interval {
            match persistence::save_snapshot(&map, tick, snapshot_dir) {
                Ok(path) => {
                    ticks_since_snapshot = 0;
                    eprintln!("Snapshot saved: {}", path.display());

                    if let Err(e) =
                        persistence::prune_snapshots(snapshot_dir, options.max_snapshots)
                    {
                        eprintln!("Warning: snapshot pruning failed: {}", e);
                    }
                }
                Err(e) => {
                    eprintln!("Warning: snapshot save failed: {}", e);
                }
            }
        }
    }

    eprintln!("Saving final snapshot...");
    match persistence::save_snapshot(&map, tick, snapshot_dir) {
        Ok(path) => eprintln!("Final snapshot saved: {}", path.display()),
        Err(e) => eprintln!("Warning: final snapshot save failed: {}", e),
    }

    eprintln!("Run stopped at tick {}", tick);
    Ok(())
}

/// Inspect a tile or map summary from the latest snapshot.
pub fn inspect(
    snapshot_dir: &Path,
    tile_index: Option<u32>,
    show_map: bool,
) -> Result<(), String> {
    let snapshot = persistence::load_latest_valid_snapshot(snapshot_dir)
        .map_err(|e| format!("Failed to load snapshot: {}", e))?;
    let tick = snapshot.tick;
    let map = snapshot
        .into_map()
        .map_err(|e| format!("Failed to restore map: {}", e))?;

    if let Some(index) = tile_index {
        inspect_tile(&map, index)
    } else if show_map {
        print_map_summary(&map, tick);
        Ok(())
    } else {
        Err("Specify --tile <INDEX> or --map".to_string())
    }
}

fn inspect_tile(map: &Map, index: u32) -> Result<(), String> {
    let geom = map.geometry();
    if index as usize >= geom.tile_count() {
        return Err(format!(
            "Tile {} not found (map has {} tiles)",
            index,
            geom.tile_count()
        ));
    }
    let pos = crate::map::MapPos(index);

    println!("=== Tile {} ===", index);
    println!("Position: col {}, row {}", geom.col(pos), geom.row(pos));
    println!();
    println!("--- Terrain ---");
    println!("  Height: {}", map.height(pos));
    println!("  Up triangle: {:?}", map.type_up(pos));
    println!("  Down triangle: {:?}", map.type_down(pos));
    println!("  Water tile: {}", map.is_water_tile(pos));
    println!();
    println!("--- Surface ---");
    println!("  Object: {}", object_name(map.object(pos)));
    println!("  Object index: {}", map.object_index(pos));
    println!("  Paths: {:06b}", map.paths(pos));
    println!();
    println!("--- Resources ---");
    if map.is_water_tile(pos) {
        println!("  Fish: {}", map.fish(pos));
    } else {
        println!(
            "  Deposit: {:?} ({})",
            map.deposit(pos),
            map.deposit_amount(pos)
        );
    }
    println!();
    println!("--- Occupancy ---");
    match map.owner(pos) {
        Some(player) => println!("  Owner: player {}", player),
        None => println!("  Owner: (unclaimed)"),
    }
    println!("  Serf index: {}", map.serf_index(pos));
    println!("  Idle serf: {}", map.idle_serf(pos));

    Ok(())
}

/// Print a summary of a map: terrain makeup, objects, deposits.
pub fn print_map_summary(map: &Map, tick: u64) {
    println!("=== Map: {} ===", map.name);
    println!("ID: {}", map.id);
    println!("Tick: {}", tick);
    println!(
        "Grid: {}x{} (size {})",
        map.geometry().cols(),
        map.geometry().rows(),
        map.geometry().size()
    );
    println!("Seed: {}", map.rng());

    let mut terrain_counts: HashMap<&str, u32> = HashMap::new();
    let mut object_count: u32 = 0;
    let mut deposit_counts: HashMap<&str, u32> = HashMap::new();
    let mut total_fish: u64 = 0;

    for pos in map.geometry().positions() {
        let label = if map.is_water_tile(pos) {
            "Water"
        } else {
            match map.type_up(pos) {
                t if t < crate::map::Terrain::Grass0 => "Shore",
                t if t < crate::map::Terrain::Desert0 => "Grass",
                t if t < crate::map::Terrain::Tundra0 => "Desert",
                t if t < crate::map::Terrain::Snow0 => "Mountain",
                _ => "Snow",
            }
        };
        *terrain_counts.entry(label).or_insert(0) += 1;

        if map.object(pos) != object::NONE {
            object_count += 1;
        }
        if map.is_water_tile(pos) {
            total_fish += map.fish(pos) as u64;
        } else if map.deposit(pos) != Deposit::None {
            let name = match map.deposit(pos) {
                Deposit::Gold => "Gold",
                Deposit::Iron => "Iron",
                Deposit::Coal => "Coal",
                Deposit::Stone => "Stone",
                Deposit::None => unreachable!(),
            };
            *deposit_counts.entry(name).or_insert(0) += 1;
        }
    }

    println!("\nTerrain:");
    let mut terrain: Vec<_> = terrain_counts.into_iter().collect();
    terrain.sort_by(|a, b| b.1.cmp(&a.1));
    let total = map.geometry().tile_count() as f64;
    for (name, count) in terrain {
        println!(
            "  {:<10} {:>6} ({:.1}%)",
            name,
            count,
            count as f64 / total * 100.0
        );
    }

    println!("\nObjects: {}", object_count);
    println!("Fish: {}", total_fish);
    if deposit_counts.is_empty() {
        println!("Deposits: (none)");
    } else {
        println!("Deposits:");
        let mut deposits: Vec<_> = deposit_counts.into_iter().collect();
        deposits.sort();
        for (name, count) in deposits {
            println!("  {:<6} {:>5} tiles", name, count);
        }
    }

    let colors = minimap::minimap_colors(map);
    let avg_r = colors.iter().map(|c| c.r as u64).sum::<u64>() / colors.len() as u64;
    let avg_g = colors.iter().map(|c| c.g as u64).sum::<u64>() / colors.len() as u64;
    let avg_b = colors.iter().map(|c| c.b as u64).sum::<u64>() / colors.len() as u64;
    println!("Minimap mean color: #{:02x}{:02x}{:02x}", avg_r, avg_g, avg_b);
}

fn object_name(obj: u8) -> String {
    match obj {
        object::NONE => "(none)".to_string(),
        object::FLAG => "Flag".to_string(),
        object::SMALL_BUILDING => "Small building".to_string(),
        object::LARGE_BUILDING => "Large building".to_string(),
        object::CASTLE => "Castle".to_string(),
        o if (object::TREE_0..=object::TREE_0 + 7).contains(&o) => {
            format!("Tree {}", o - object::TREE_0)
        }
        o if (object::PINE_0..=object::PINE_0 + 7).contains(&o) => {
            format!("Pine {}", o - object::PINE_0)
        }
        o if (object::PALM_0..=object::PALM_0 + 3).contains(&o) => {
            format!("Palm {}", o - object::PALM_0)
        }
        o if (object::WATER_TREE_0..=object::WATER_TREE_0 + 3).contains(&o) => {
            format!("Water tree {}", o - object::WATER_TREE_0)
        }
        o if (object::STONE_0..=object::STONE_0 + 7).contains(&o) => {
            format!("Stone pile {}", o - object::STONE_0)
        }
        o if (object::SANDSTONE_0..=object::SANDSTONE_0 + 1).contains(&o) => {
            format!("Sandstone {}", o - object::SANDSTONE_0)
        }
        object::CROSS => "Cross".to_string(),
        object::STUB => "Stump".to_string(),
        object::DEAD_TREE => "Dead tree".to_string(),
        o if (object::FIELD_0..=object::FIELD_0 + 5).contains(&o) => {
            format!("Field stage {}", o - object::FIELD_0)
        }
        object::FIELD_EXPIRED => "Expired field".to_string(),
        object::NEW_PINE => "Pine sapling".to_string(),
        object::NEW_TREE => "Tree sapling".to_string(),
        o if object::is_sign(o) => "Sign".to_string(),
        o => format!("Object {}", o),
    }
}
