//! # Biomes
//!
//! A biome names the atlas tiles used for the top, sides and bottom of a terrain
//! column. Columns pick a biome in two steps: the normalized terrain height
//! selects a height range, then the normalized biome noise value indexes into that
//! range's list of biome names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Atlas tiles of a biome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biome {
    /// Tile for upward faces.
    pub top_index: u32,
    /// Tile for side faces.
    pub side_index: u32,
    /// Tile for downward faces.
    pub bottom_index: u32,
}

/// Biome options for one band of normalized terrain height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiomeRange {
    /// Inclusive lower bound in `[0, 1]`.
    pub height_start: f64,
    /// Inclusive upper bound in `[0, 1]`.
    pub height_end: f64,
    /// Biome names, indexed by the normalized biome value.
    pub biomes: Vec<String>,
}

/// Biome lookup tables carried by every generation request.
///
/// Missing fields fall back to the default table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BiomeTable {
    /// Biome definitions by name.
    pub biomes: BTreeMap<String, Biome>,
    /// Height bands, searched in order.
    #[serde(rename = "biomesConfiguration")]
    pub ranges: Vec<BiomeRange>,
    /// Names of biomes that may grow trees.
    pub tree_biomes: Vec<String>,
}

impl Default for BiomeTable {
    fn default() -> Self {
        let biome = |top_index, side_index, bottom_index| Biome {
            top_index,
            side_index,
            bottom_index,
        };
        let range = |height_start, height_end, names: &[&str]| BiomeRange {
            height_start,
            height_end,
            biomes: names.iter().map(|n| (*n).to_owned()).collect(),
        };

        Self {
            biomes: BTreeMap::from([
                ("snowy".to_owned(), biome(165, 1, 43)),
                ("forest".to_owned(), biome(2, 3, 43)),
                ("desert".to_owned(), biome(35, 35, 35)),
            ]),
            ranges: vec![
                range(0.0, 0.425, &["forest", "desert", "desert"]),
                range(0.425, 0.575, &["forest"]),
                range(0.575, 1.0, &["forest", "snowy", "snowy"]),
            ],
            tree_biomes: vec!["default".to_owned(), "forest".to_owned()],
        }
    }
}

impl BiomeTable {
    /// Checks that every range is non-empty and names only known biomes.
    pub fn validate(&self) -> EngineResult<()> {
        if self.ranges.is_empty() {
            return Err(EngineError::BiomeConfiguration(
                "at least one height range is required".to_owned(),
            ));
        }
        for (i, range) in self.ranges.iter().enumerate() {
            if range.biomes.is_empty() {
                return Err(EngineError::BiomeConfiguration(format!(
                    "height range {i} lists no biomes"
                )));
            }
            if range.height_start > range.height_end {
                return Err(EngineError::BiomeConfiguration(format!(
                    "height range {i} starts at {} after its end {}",
                    range.height_start, range.height_end
                )));
            }
            if let Some(name) = range.biomes.iter().find(|n| !self.biomes.contains_key(*n)) {
                return Err(EngineError::BiomeConfiguration(format!(
                    "height range {i} names unknown biome `{name}`"
                )));
            }
        }
        Ok(())
    }

    /// Picks the biome name for a column.
    ///
    /// # Arguments
    /// * `height` - Terrain height normalized to `[0, 1]`
    /// * `value` - Biome noise normalized to `[0, 1]`
    ///
    /// # Returns
    /// The first range containing `height` decides; values below every range fall
    /// into the first range and values above into the last. Inside the range the
    /// name at `floor(value * len)` is used, clamped to the last entry.
    pub fn select(&self, height: f64, value: f64) -> Option<&str> {
        let range = self
            .ranges
            .iter()
            .find(|r| height >= r.height_start && height <= r.height_end)
            .or_else(|| match self.ranges.first() {
                Some(first) if height < first.height_start => Some(first),
                _ => self.ranges.last(),
            })?;

        let len = range.biomes.len();
        if len == 0 {
            return None;
        }
        let index = ((value * len as f64).floor().max(0.0) as usize).min(len - 1);
        Some(range.biomes[index].as_str())
    }

    /// Looks up a biome definition.
    pub fn biome(&self, name: &str) -> Option<&Biome> {
        self.biomes.get(name)
    }

    /// Whether columns of this biome may grow trees.
    pub fn grows_trees(&self, name: &str) -> bool {
        self.tree_biomes.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        BiomeTable::default().validate().unwrap();
    }

    #[test]
    fn first_matching_range_wins_on_shared_bounds() {
        let table = BiomeTable::default();
        // 0.425 closes the first range and opens the second
        assert_eq!(table.select(0.425, 0.9), Some("desert"));
        assert_eq!(table.select(0.5, 0.9), Some("forest"));
    }

    #[test]
    fn index_is_clamped_to_the_last_option() {
        let table = BiomeTable::default();
        assert_eq!(table.select(0.9, 1.0), Some("snowy"));
        assert_eq!(table.select(0.9, 0.0), Some("forest"));
        assert_eq!(table.select(0.1, 0.34), Some("desert"));
        assert_eq!(table.select(0.1, 0.33), Some("forest"));
    }

    #[test]
    fn out_of_range_heights_fall_back_to_the_ends() {
        let mut table = BiomeTable::default();
        table.ranges[0].height_start = 0.1;
        assert_eq!(table.select(0.05, 0.0), Some("forest"));
        assert_eq!(table.select(1.5, 0.99), Some("snowy"));
    }

    #[test]
    fn validation_catches_unknown_names_and_empty_ranges() {
        let mut table = BiomeTable::default();
        table.ranges[1].biomes.push("swamp".to_owned());
        assert!(matches!(
            table.validate(),
            Err(EngineError::BiomeConfiguration(message)) if message.contains("swamp")
        ));

        let mut table = BiomeTable::default();
        table.ranges[2].biomes.clear();
        assert!(table.validate().is_err());

        let mut table = BiomeTable::default();
        table.ranges.clear();
        assert!(table.validate().is_err());
    }

    #[test]
    fn tree_biomes_default_to_forest() {
        let table = BiomeTable::default();
        assert!(table.grows_trees("forest"));
        assert!(!table.grows_trees("desert"));
    }

    #[test]
    fn deserializes_worker_field_names() {
        let json = r#"{
            "biomes": { "plain": { "topIndex": 1, "sideIndex": 2, "bottomIndex": 3 } },
            "biomesConfiguration": [ { "heightStart": 0.0, "heightEnd": 1.0, "biomes": ["plain"] } ],
            "treeBiomes": []
        }"#;
        let table: BiomeTable = serde_json::from_str(json).unwrap();
        table.validate().unwrap();
        assert_eq!(table.biome("plain").map(|b| b.side_index), Some(2));
    }
}
