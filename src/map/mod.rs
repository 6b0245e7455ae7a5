pub mod generator;
pub mod minimap;
pub mod position;
pub mod random;
pub mod spiral;
pub mod tile;
pub mod update;

use std::fmt;

use tracing::info;
use uuid::Uuid;

use crate::config::map::MapConfig;
use crate::map::generator::ClassicGenerator;
use crate::map::update::UpdateState;
pub use position::{Direction, Geometry, MAX_MAP_SIZE, MapPos};
pub use random::GameRandom;
pub use tile::{Deposit, Terrain, TileRecord};

/// Callback fired for positions whose buildable surroundings changed.
pub type HeightObserver = Box<dyn FnMut(MapPos) + Send>;

/// The live game map: a toroidal grid of packed tile records plus the
/// PRNG that drives its amortized updates.
///
/// The map is fully determined by its creation config; everything that
/// happens after generation flows through the mutators here so path,
/// ownership and resource bit-fields stay consistent.
pub struct Map {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
    geometry: Geometry,
    tiles: Vec<TileRecord>,
    rng: GameRandom,
    region_count: u32,
    update_state: UpdateState,
    height_observer: Option<HeightObserver>,
}

impl Map {
    /// Generate a new map from the given config.
    ///
    /// An empty seed string draws one from OS entropy; the seed in use
    /// is always recoverable from the map name.
    pub fn generate(config: &MapConfig) -> Result<Map, String> {
        config.validate()?;
        let rng = if config.seed.is_empty() {
            GameRandom::from_entropy()
        } else {
            config.seed.parse().map_err(|e| format!("{}", e))?
        };
        let seed_string = rng.to_string();
        info!(
            seed = %seed_string,
            size = config.size,
            generator = %config.generator,
            "generating map"
        );

        let mut generator = ClassicGenerator::new(config, rng);
        generator.generate();
        let (geometry, tiles, rng) = generator.into_parts();

        Ok(Map {
            id: Uuid::new_v4(),
            name: format!("Map-{}", seed_string),
            created_at: format!(
                "{}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs()
            ),
            geometry,
            tiles,
            rng,
            region_count: config.regions(),
            update_state: UpdateState::default(),
            height_observer: None,
        })
    }

    /// Reassemble a map from stored parts (snapshot restore, tests).
    pub fn from_parts(
        id: Uuid,
        name: String,
        created_at: String,
        geometry: Geometry,
        tiles: Vec<TileRecord>,
        rng: GameRandom,
        region_count: u32,
        update_state: UpdateState,
    ) -> Result<Map, String> {
        if tiles.len() != geometry.tile_count() {
            return Err(format!(
                "Tile buffer holds {} records but a size-{} grid needs {}",
                tiles.len(),
                geometry.size(),
                geometry.tile_count()
            ));
        }
        Ok(Map {
            id,
            name,
            created_at,
            geometry,
            tiles,
            rng,
            region_count,
            update_state,
            height_observer: None,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn rng(&self) -> &GameRandom {
        &self.rng
    }

    pub fn region_count(&self) -> u32 {
        self.region_count
    }

    pub(crate) fn update_state(&self) -> &UpdateState {
        &self.update_state
    }

    pub(crate) fn tiles(&self) -> &[TileRecord] {
        &self.tiles
    }

    fn tile(&self, pos: MapPos) -> &TileRecord {
        &self.tiles[self.geometry.index(pos)]
    }

    fn tile_mut(&mut self, pos: MapPos) -> &mut TileRecord {
        let i = self.geometry.index(pos);
        &mut self.tiles[i]
    }

    // --- Read access ---

    pub fn height(&self, pos: MapPos) -> u8 {
        self.tile(pos).height()
    }

    pub fn type_up(&self, pos: MapPos) -> Terrain {
        self.tile(pos).type_up()
    }

    pub fn type_down(&self, pos: MapPos) -> Terrain {
        self.tile(pos).type_down()
    }

    /// Both triangles water. Fish live only on such tiles and serfs
    /// cannot stand on them.
    pub fn is_water_tile(&self, pos: MapPos) -> bool {
        self.tile(pos).type_up().is_water() && self.tile(pos).type_down().is_water()
    }

    pub fn object(&self, pos: MapPos) -> u8 {
        self.tile(pos).object()
    }

    pub fn object_index(&self, pos: MapPos) -> u16 {
        self.tile(pos).obj_index
    }

    pub fn idle_serf(&self, pos: MapPos) -> bool {
        self.tile(pos).idle_serf()
    }

    pub fn serf_index(&self, pos: MapPos) -> u16 {
        self.tile(pos).serf
    }

    pub fn owner(&self, pos: MapPos) -> Option<u8> {
        self.tile(pos).owner()
    }

    pub fn deposit(&self, pos: MapPos) -> Deposit {
        self.tile(pos).deposit()
    }

    pub fn deposit_amount(&self, pos: MapPos) -> u8 {
        self.tile(pos).deposit_amount()
    }

    /// Fish stock; meaningful only on water tiles.
    pub fn fish(&self, pos: MapPos) -> u8 {
        self.tile(pos).fish()
    }

    pub fn has_path(&self, pos: MapPos, dir: Direction) -> bool {
        self.tile(pos).has_path(dir)
    }

    pub fn paths(&self, pos: MapPos) -> u8 {
        self.tile(pos).paths
    }

    // --- Mutators ---

    /// Register a callback for positions whose surroundings changed
    /// height. Construction code uses this to re-check building sites.
    pub fn set_height_observer(&mut self, observer: impl FnMut(MapPos) + Send + 'static) {
        self.height_observer = Some(Box::new(observer));
    }

    pub fn clear_height_observer(&mut self) {
        self.height_observer = None;
    }

    /// Set the height at `pos` and notify the observer for each of the
    /// six neighbors, whose slopes all changed.
    pub fn set_height(&mut self, pos: MapPos, height: u8) {
        self.tile_mut(pos).set_height(height);
        let geometry = self.geometry;
        if let Some(observer) = &mut self.height_observer {
            for dir in Direction::all() {
                observer(geometry.move_in(pos, dir));
            }
        }
    }

    /// Place or remove an object. The companion game-object index is
    /// cleared whenever the tile goes back to empty.
    pub fn set_object(&mut self, pos: MapPos, obj: u8, index: u16) {
        let tile = self.tile_mut(pos);
        tile.set_object(obj);
        tile.obj_index = if obj == tile::object::NONE { 0 } else { index };
    }

    /// Take up to `amount` from the mineral deposit under `pos`. The
    /// deposit type resets once the amount hits zero.
    pub fn remove_ground_deposit(&mut self, pos: MapPos, amount: u8) {
        let tile = self.tile_mut(pos);
        let remaining = tile.deposit_amount().saturating_sub(amount);
        if remaining == 0 {
            tile.set_deposit(Deposit::None, 0);
        } else {
            tile.set_deposit(tile.deposit(), remaining);
        }
    }

    /// Take up to `amount` fish from a water tile, clamped at zero.
    pub fn remove_fish(&mut self, pos: MapPos, amount: u8) {
        let tile = self.tile_mut(pos);
        let remaining = tile.fish().saturating_sub(amount);
        tile.set_fish(remaining);
    }

    pub fn set_serf_index(&mut self, pos: MapPos, serf: u16) {
        self.tile_mut(pos).serf = serf;
    }

    pub fn set_idle_serf(&mut self, pos: MapPos, idle: bool) {
        self.tile_mut(pos).set_idle_serf(idle);
    }

    pub fn set_owner(&mut self, pos: MapPos, owner: Option<u8>) {
        self.tile_mut(pos).set_owner(owner);
    }

    pub fn add_path(&mut self, pos: MapPos, dir: Direction) {
        self.tile_mut(pos).paths |= 1 << dir.index();
    }

    pub fn del_path(&mut self, pos: MapPos, dir: Direction) {
        self.tile_mut(pos).paths &= !(1 << dir.index());
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.geometry.size())
            .field("tiles", &self.tiles.len())
            .field("region_count", &self.region_count)
            .field(
                "height_observer",
                &self.height_observer.as_ref().map(|_| "set"),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn test_map() -> Map {
        let config = MapConfig {
            seed: "2672814655273614".to_string(),
            size: 3,
            ..MapConfig::default()
        };
        Map::generate(&config).unwrap()
    }

    #[test]
    fn generate_rejects_invalid_config() {
        let config = MapConfig {
            size: 99,
            ..MapConfig::default()
        };
        assert!(Map::generate(&config).is_err());
    }

    #[test]
    fn generate_with_explicit_seed_names_map_after_it() {
        let map = test_map();
        assert_eq!(map.name, "Map-2672814655273614");
        assert_eq!(map.geometry().size(), 3);
        assert_eq!(map.geometry().tile_count(), 64 * 64);
    }

    #[test]
    fn two_maps_same_seed_have_identical_tiles() {
        let a = test_map();
        let b = test_map();
        for pos in a.geometry().positions() {
            assert_eq!(a.height(pos), b.height(pos));
            assert_eq!(a.type_up(pos), b.type_up(pos));
            assert_eq!(a.type_down(pos), b.type_down(pos));
            assert_eq!(a.object(pos), b.object(pos));
        }
        assert_eq!(a.rng(), b.rng());
        assert_ne!(a.id, b.id, "identity is per-instance, not per-seed");
    }

    #[test]
    fn empty_seed_draws_from_entropy() {
        let config = MapConfig {
            seed: String::new(),
            size: 0,
            ..MapConfig::default()
        };
        let map = Map::generate(&config).unwrap();
        assert!(map.name.starts_with("Map-"));
    }

    #[test]
    fn set_height_notifies_six_neighbors() {
        let mut map = test_map();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        map.set_height_observer(move |pos| sink.lock().unwrap().push(pos));

        let pos = map.geometry().pos(10, 10);
        map.set_height(pos, 7);
        assert_eq!(map.height(pos), 7);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 6);
        for dir in Direction::all() {
            assert!(seen.contains(&map.geometry().move_in(pos, dir)));
        }
        assert!(!seen.contains(&pos), "the mutated position itself is not notified");
    }

    #[test]
    fn no_observer_means_silent_height_change() {
        let mut map = test_map();
        let pos = map.geometry().pos(3, 3);
        map.set_height(pos, 12);
        assert_eq!(map.height(pos), 12);
    }

    #[test]
    fn set_object_clears_companion_index_on_removal() {
        let mut map = test_map();
        let pos = map.geometry().pos(5, 5);
        map.set_object(pos, tile::object::FLAG, 42);
        assert_eq!(map.object(pos), tile::object::FLAG);
        assert_eq!(map.object_index(pos), 42);

        map.set_object(pos, tile::object::NONE, 99);
        assert_eq!(map.object(pos), tile::object::NONE);
        assert_eq!(map.object_index(pos), 0);
    }

    #[test]
    fn remove_ground_deposit_clamps_and_clears_type() {
        let mut map = test_map();
        let pos = map.geometry().pos(1, 1);
        map.tile_mut(pos).set_deposit(Deposit::Coal, 3);

        map.remove_ground_deposit(pos, 2);
        assert_eq!(map.deposit(pos), Deposit::Coal);
        assert_eq!(map.deposit_amount(pos), 1);

        map.remove_ground_deposit(pos, 5);
        assert_eq!(map.deposit_amount(pos), 0);
        assert_eq!(
            map.deposit(pos),
            Deposit::None,
            "exhausted deposit must clear its type"
        );
    }

    #[test]
    fn remove_fish_clamps_at_zero() {
        let mut map = test_map();
        let pos = map.geometry().pos(2, 2);
        map.tile_mut(pos).set_fish(4);
        map.remove_fish(pos, 10);
        assert_eq!(map.fish(pos), 0);
        map.remove_fish(pos, 1);
        assert_eq!(map.fish(pos), 0);
    }

    #[test]
    fn paths_are_per_direction_bits() {
        let mut map = test_map();
        let pos = map.geometry().pos(8, 8);
        map.add_path(pos, Direction::Right);
        map.add_path(pos, Direction::Up);
        assert!(map.has_path(pos, Direction::Right));
        assert!(map.has_path(pos, Direction::Up));
        assert!(!map.has_path(pos, Direction::Down));

        map.del_path(pos, Direction::Right);
        assert!(!map.has_path(pos, Direction::Right));
        assert!(map.has_path(pos, Direction::Up));
    }

    #[test]
    fn owner_round_trip() {
        let mut map = test_map();
        let pos = map.geometry().pos(4, 4);
        assert_eq!(map.owner(pos), None);
        map.set_owner(pos, Some(2));
        assert_eq!(map.owner(pos), Some(2));
        map.set_owner(pos, None);
        assert_eq!(map.owner(pos), None);
    }

    #[test]
    fn from_parts_validates_tile_count() {
        let geometry = Geometry::new(0);
        let result = Map::from_parts(
            Uuid::new_v4(),
            "broken".to_string(),
            "0".to_string(),
            geometry,
            vec![TileRecord::default(); 3],
            GameRandom::from_state([1, 2, 3]),
            1,
            UpdateState::default(),
        );
        assert!(result.is_err());
    }
}
