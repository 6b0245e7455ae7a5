use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::map::position::{Geometry, MAX_MAP_SIZE};
use crate::map::random::GameRandom;

fn default_seed() -> String {
    String::new()
}

fn default_size() -> u32 {
    5
}

fn default_generator() -> String {
    "midpoints".to_string()
}

fn default_water_level() -> i32 {
    20
}

fn default_max_lake_area() -> u32 {
    14
}

/// Parameters fixed at map creation. Stored with every snapshot so a
/// saved map can be regenerated or validated against its origin.
///
/// `seed` is the canonical 16-character PRNG string; empty means "draw
/// one from OS entropy". `region_count = 0` derives the live-update
/// batch size from the grid area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_seed")]
    pub seed: String,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default = "default_generator")]
    pub generator: String,
    #[serde(default = "default_water_level")]
    pub water_level: i32,
    #[serde(default = "default_max_lake_area")]
    pub max_lake_area: u32,
    #[serde(default)]
    pub region_count: u32,
    #[serde(default)]
    pub preserve_bugs: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            seed: default_seed(),
            size: default_size(),
            generator: default_generator(),
            water_level: default_water_level(),
            max_lake_area: default_max_lake_area(),
            region_count: 0,
            preserve_bugs: false,
        }
    }
}

impl MapConfig {
    /// Load map parameters from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| format!("Invalid TOML in {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !self.seed.is_empty() {
            self.seed
                .parse::<GameRandom>()
                .map_err(|e| e.to_string())?;
        }
        if self.size > MAX_MAP_SIZE {
            return Err(format!(
                "size must be 0-{}, got {}",
                MAX_MAP_SIZE, self.size
            ));
        }
        if self.generator != "midpoints" && self.generator != "diamond-square" {
            return Err(format!(
                "generator must be 'midpoints' or 'diamond-square', got '{}'",
                self.generator
            ));
        }
        if self.water_level > 250 {
            return Err(format!(
                "water_level must be <= 250 (raw height units), got {}",
                self.water_level
            ));
        }
        if self.max_lake_area == 0 {
            return Err("max_lake_area must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.size)
    }

    /// Live-update batch size: explicit, or one region per 32x32 block.
    pub fn regions(&self) -> u32 {
        if self.region_count > 0 {
            self.region_count
        } else {
            let geom = self.geometry();
            ((geom.cols() >> 5) * (geom.rows() >> 5)).max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        assert!(MapConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_size_rejected() {
        let config = MapConfig {
            size: 11,
            ..MapConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("size"), "Error should mention size: {}", err);
    }

    #[test]
    fn invalid_generator_rejected() {
        let config = MapConfig {
            generator: "perlin".to_string(),
            ..MapConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("generator"), "Error: {}", err);
    }

    #[test]
    fn invalid_seed_rejected() {
        let config = MapConfig {
            seed: "not-a-seed".to_string(),
            ..MapConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn canonical_seed_accepted() {
        let config = MapConfig {
            seed: "1111111111111111".to_string(),
            ..MapConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_lake_area_rejected() {
        let config = MapConfig {
            max_lake_area: 0,
            ..MapConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_water_level_is_valid_dry_world() {
        let config = MapConfig {
            water_level: -1,
            ..MapConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn regions_derived_from_grid_area() {
        let config = MapConfig {
            size: 3, // 64x64
            ..MapConfig::default()
        };
        assert_eq!(config.regions(), 4);

        let explicit = MapConfig {
            size: 3,
            region_count: 9,
            ..MapConfig::default()
        };
        assert_eq!(explicit.regions(), 9);
    }

    #[test]
    fn regions_never_zero_on_small_grids() {
        let config = MapConfig {
            size: 0, // 32x16
            ..MapConfig::default()
        };
        assert!(config.regions() >= 1);
    }

    #[test]
    fn from_toml_string() {
        let toml_str = r#"
seed = "1234567812345678"
size = 3
generator = "diamond-square"
water_level = 18
max_lake_area = 10
"#;
        let config: MapConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.size, 3);
        assert_eq!(config.generator, "diamond-square");
        assert_eq!(config.water_level, 18);
        assert!(!config.preserve_bugs);
        config.validate().unwrap();
    }

    #[test]
    fn from_toml_defaults_apply() {
        let config: MapConfig = toml::from_str("size = 4").unwrap();
        assert_eq!(config.seed, "");
        assert_eq!(config.generator, "midpoints");
        assert_eq!(config.water_level, 20);
        assert_eq!(config.max_lake_area, 14);
    }

    #[test]
    fn from_file_valid() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmpfile,
            r#"
seed = "8888888888888888"
size = 2
generator = "midpoints"
water_level = 25
max_lake_area = 20
preserve_bugs = true
"#
        )
        .unwrap();

        let config = MapConfig::from_file(tmpfile.path()).unwrap();
        assert_eq!(config.size, 2);
        assert_eq!(config.water_level, 25);
        assert!(config.preserve_bugs);
    }

    #[test]
    fn from_file_missing() {
        let err = MapConfig::from_file(Path::new("/nonexistent/map.toml")).unwrap_err();
        assert!(err.contains("Cannot read"), "Error: {}", err);
    }

    #[test]
    fn from_file_invalid_toml() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "this is not valid toml {{{{").unwrap();
        let err = MapConfig::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("Invalid TOML"), "Error: {}", err);
    }

    #[test]
    fn from_file_out_of_range() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        write!(tmpfile, "size = 99").unwrap();
        let err = MapConfig::from_file(tmpfile.path()).unwrap_err();
        assert!(err.contains("size"), "Error: {}", err);
    }
}
