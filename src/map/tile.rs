use serde::{Deserialize, Serialize};

// === Terrain ===

/// Per-triangle terrain classification, 4 bits on the wire.
///
/// Ordering matters: numeric ranges are used as predicates during
/// generation (water < Grass0, mountain terrain is Tundra0..=Snow1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Terrain {
    Water0 = 0,
    Water1 = 1,
    Water2 = 2,
    Water3 = 3,
    Grass0 = 4,
    Grass1 = 5,
    Grass2 = 6,
    Grass3 = 7,
    Desert0 = 8,
    Desert1 = 9,
    Desert2 = 10,
    Tundra0 = 11,
    Tundra1 = 12,
    Tundra2 = 13,
    Snow0 = 14,
    Snow1 = 15,
}

impl Terrain {
    /// # Panics
    /// Panics above 15; terrain nibbles never hold other values.
    pub fn from_id(id: u8) -> Terrain {
        match id {
            0 => Terrain::Water0,
            1 => Terrain::Water1,
            2 => Terrain::Water2,
            3 => Terrain::Water3,
            4 => Terrain::Grass0,
            5 => Terrain::Grass1,
            6 => Terrain::Grass2,
            7 => Terrain::Grass3,
            8 => Terrain::Desert0,
            9 => Terrain::Desert1,
            10 => Terrain::Desert2,
            11 => Terrain::Tundra0,
            12 => Terrain::Tundra1,
            13 => Terrain::Tundra2,
            14 => Terrain::Snow0,
            15 => Terrain::Snow1,
            _ => panic!("Invalid terrain id {}", id),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn is_water(self) -> bool {
        self < Terrain::Grass0
    }
}

// === Objects ===

/// Map object ids, 7 bits on the wire. Variant groups are contiguous so
/// the generator can pick `base + (rnd & mask)`.
pub mod object {
    pub const NONE: u8 = 0;
    pub const FLAG: u8 = 1;
    pub const SMALL_BUILDING: u8 = 2;
    pub const LARGE_BUILDING: u8 = 3;
    pub const CASTLE: u8 = 4;

    pub const TREE_0: u8 = 8; // ..=15, eight sway frames
    pub const PINE_0: u8 = 16; // ..=23
    pub const PALM_0: u8 = 24; // ..=27
    pub const WATER_TREE_0: u8 = 28; // ..=31

    pub const STONE_0: u8 = 32; // ..=39, variant encodes remaining stone
    pub const SANDSTONE_0: u8 = 40; // ..=41
    pub const CROSS: u8 = 42;
    pub const STUB: u8 = 43;
    pub const DEAD_TREE: u8 = 44;
    pub const CADAVER_0: u8 = 45; // ..=46
    pub const CACTUS_0: u8 = 47; // ..=48
    pub const WATER_STONE_0: u8 = 49; // ..=50

    pub const FIELD_0: u8 = 51; // ..=56, growth stages 0-5
    pub const FIELD_EXPIRED: u8 = 57;
    pub const NEW_PINE: u8 = 58;
    pub const NEW_TREE: u8 = 59;
    pub const FELLED_PINE_0: u8 = 60; // ..=64
    pub const FELLED_TREE_0: u8 = 65; // ..=69

    pub const SIGN_LARGE_GOLD: u8 = 70;
    pub const SIGN_SMALL_GOLD: u8 = 71;
    pub const SIGN_LARGE_IRON: u8 = 72;
    pub const SIGN_SMALL_IRON: u8 = 73;
    pub const SIGN_LARGE_COAL: u8 = 74;
    pub const SIGN_SMALL_COAL: u8 = 75;
    pub const SIGN_LARGE_STONE: u8 = 76;
    pub const SIGN_SMALL_STONE: u8 = 77;
    pub const SIGN_EMPTY: u8 = 78;

    pub const MAX: u8 = 0x7f;

    /// Objects a serf cannot walk through. Buildings are handled by the
    /// construction logic itself and are deliberately not listed.
    pub fn is_impassable(obj: u8) -> bool {
        (TREE_0..=WATER_TREE_0 + 3).contains(&obj)
            || (STONE_0..=SANDSTONE_0 + 1).contains(&obj)
            || obj == DEAD_TREE
    }

    pub fn is_sign(obj: u8) -> bool {
        (SIGN_LARGE_GOLD..=SIGN_EMPTY).contains(&obj)
    }
}

// === Ground deposits ===

/// Typed mineral deposit embedded in a tile, 3 bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Deposit {
    None = 0,
    Gold = 1,
    Iron = 2,
    Coal = 3,
    Stone = 4,
}

impl Deposit {
    pub fn from_id(id: u8) -> Deposit {
        match id {
            0 => Deposit::None,
            1 => Deposit::Gold,
            2 => Deposit::Iron,
            3 => Deposit::Coal,
            4 => Deposit::Stone,
            _ => panic!("Invalid deposit id {}", id),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

// === TileRecord ===

/// One packed per-position record. Ten bytes a tile keeps even the
/// largest grid comfortably in cache during the generation passes.
///
/// Layout:
/// - `height_owner`: bits 0-4 height, bits 5-6 owner id, bit 7 owner flag
/// - `types`: bits 4-7 up-triangle terrain, bits 0-3 down-triangle
/// - `obj`: bits 0-6 object id, bit 7 idle-serf flag
/// - `resource`: bits 5-7 deposit type, bits 0-4 amount; on water tiles
///   the whole byte is a raw fish count instead
/// - `paths`: one bit per direction, written by the road system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileRecord {
    height_owner: u8,
    types: u8,
    obj: u8,
    resource: u8,
    pub paths: u8,
    pub obj_index: u16,
    pub serf: u16,
}

pub const MAX_HEIGHT: u8 = 31;

impl TileRecord {
    pub fn height(&self) -> u8 {
        self.height_owner & 0x1f
    }

    pub fn set_height(&mut self, height: u8) {
        self.height_owner = (self.height_owner & 0xe0) | (height & 0x1f);
    }

    pub fn owner(&self) -> Option<u8> {
        if self.height_owner & 0x80 != 0 {
            Some((self.height_owner >> 5) & 0x03)
        } else {
            None
        }
    }

    pub fn set_owner(&mut self, owner: Option<u8>) {
        match owner {
            Some(id) => {
                self.height_owner = (self.height_owner & 0x1f) | 0x80 | ((id & 0x03) << 5);
            }
            None => self.height_owner &= 0x1f,
        }
    }

    pub fn type_up(&self) -> Terrain {
        Terrain::from_id(self.types >> 4)
    }

    pub fn type_down(&self) -> Terrain {
        Terrain::from_id(self.types & 0x0f)
    }

    pub fn set_types(&mut self, up: Terrain, down: Terrain) {
        self.types = (up.id() << 4) | down.id();
    }

    pub fn object(&self) -> u8 {
        self.obj & 0x7f
    }

    pub fn set_object(&mut self, obj: u8) {
        debug_assert!(obj <= object::MAX);
        self.obj = (self.obj & 0x80) | (obj & 0x7f);
    }

    pub fn idle_serf(&self) -> bool {
        self.obj & 0x80 != 0
    }

    pub fn set_idle_serf(&mut self, idle: bool) {
        if idle {
            self.obj |= 0x80;
        } else {
            self.obj &= 0x7f;
        }
    }

    pub fn deposit(&self) -> Deposit {
        Deposit::from_id(self.resource >> 5)
    }

    pub fn deposit_amount(&self) -> u8 {
        self.resource & 0x1f
    }

    pub fn set_deposit(&mut self, deposit: Deposit, amount: u8) {
        self.resource = (deposit.id() << 5) | (amount & 0x1f);
    }

    /// Raw fish count; only meaningful on water tiles, which repurpose
    /// the resource byte.
    pub fn fish(&self) -> u8 {
        self.resource
    }

    pub fn set_fish(&mut self, fish: u8) {
        self.resource = fish;
    }

    /// Whether the packed bytes decode to defined values. `water` tells
    /// the check how to read the resource byte, which holds a raw fish
    /// count on water tiles and a typed deposit elsewhere. Stored data
    /// must pass this before `deposit()` may be called on it.
    pub fn is_well_formed(&self, water: bool) -> bool {
        self.object() <= object::SIGN_EMPTY
            && (water || self.resource >> 5 <= Deposit::Stone.id())
    }

    pub fn has_path(&self, dir: crate::map::position::Direction) -> bool {
        self.paths & (1 << dir.index()) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::position::Direction;

    #[test]
    fn height_masked_to_five_bits() {
        let mut t = TileRecord::default();
        t.set_height(0xff);
        assert_eq!(t.height(), 31);
        t.set_height(7);
        assert_eq!(t.height(), 7);
    }

    #[test]
    fn owner_coexists_with_height() {
        let mut t = TileRecord::default();
        t.set_height(19);
        assert_eq!(t.owner(), None);
        t.set_owner(Some(2));
        assert_eq!(t.owner(), Some(2));
        assert_eq!(t.height(), 19);
        t.set_height(5);
        assert_eq!(t.owner(), Some(2));
        t.set_owner(None);
        assert_eq!(t.owner(), None);
        assert_eq!(t.height(), 5);
    }

    #[test]
    fn owner_id_masked_to_two_bits() {
        let mut t = TileRecord::default();
        t.set_owner(Some(7));
        assert_eq!(t.owner(), Some(3));
    }

    #[test]
    fn triangle_types_are_independent() {
        let mut t = TileRecord::default();
        t.set_types(Terrain::Snow1, Terrain::Water0);
        assert_eq!(t.type_up(), Terrain::Snow1);
        assert_eq!(t.type_down(), Terrain::Water0);
        t.set_types(Terrain::Desert1, Terrain::Grass2);
        assert_eq!(t.type_up(), Terrain::Desert1);
        assert_eq!(t.type_down(), Terrain::Grass2);
    }

    #[test]
    fn object_and_idle_serf_share_a_byte() {
        let mut t = TileRecord::default();
        t.set_object(object::TREE_0 + 3);
        t.set_idle_serf(true);
        assert_eq!(t.object(), object::TREE_0 + 3);
        assert!(t.idle_serf());
        t.set_object(object::NONE);
        assert!(t.idle_serf(), "clearing the object must keep the serf flag");
        t.set_idle_serf(false);
        assert_eq!(t.object(), object::NONE);
    }

    #[test]
    fn deposit_packs_type_and_amount() {
        let mut t = TileRecord::default();
        t.set_deposit(Deposit::Iron, 17);
        assert_eq!(t.deposit(), Deposit::Iron);
        assert_eq!(t.deposit_amount(), 17);
        t.set_deposit(Deposit::Gold, 40);
        assert_eq!(t.deposit_amount(), 8, "amount wraps into 5 bits");
    }

    #[test]
    fn fish_uses_full_resource_byte() {
        let mut t = TileRecord::default();
        t.set_fish(10);
        assert_eq!(t.fish(), 10);
    }

    #[test]
    fn terrain_ordering_predicates() {
        assert!(Terrain::Water3.is_water());
        assert!(!Terrain::Grass0.is_water());
        for id in 0..16 {
            assert_eq!(Terrain::from_id(id).id(), id);
        }
    }

    #[test]
    fn impassable_object_ranges() {
        assert!(object::is_impassable(object::TREE_0));
        assert!(object::is_impassable(object::STONE_0 + 7));
        assert!(object::is_impassable(object::DEAD_TREE));
        assert!(!object::is_impassable(object::NONE));
        assert!(!object::is_impassable(object::FLAG));
        assert!(!object::is_impassable(object::FIELD_0));
        assert!(!object::is_impassable(object::SIGN_EMPTY));
    }

    #[test]
    fn sign_range() {
        assert!(object::is_sign(object::SIGN_LARGE_GOLD));
        assert!(object::is_sign(object::SIGN_EMPTY));
        assert!(!object::is_sign(object::CROSS));
    }

    #[test]
    fn paths_bitmask_per_direction() {
        let mut t = TileRecord::default();
        t.paths = 1 << Direction::Down.index();
        assert!(t.has_path(Direction::Down));
        assert!(!t.has_path(Direction::Up));
    }

    #[test]
    fn record_serde_round_trip() {
        let mut t = TileRecord::default();
        t.set_height(12);
        t.set_owner(Some(1));
        t.set_types(Terrain::Grass2, Terrain::Grass1);
        t.set_object(object::PINE_0 + 2);
        t.set_deposit(Deposit::Coal, 9);
        t.obj_index = 1234;
        t.serf = 7;
        t.paths = 0b101;
        let encoded = bincode::serialize(&t).expect("serialize");
        let decoded: TileRecord = bincode::deserialize(&encoded).expect("deserialize");
        assert_eq!(t, decoded);
    }
}
