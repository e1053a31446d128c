//! Static game data and seed recommendations.
//!
//! Both are collaborators the orchestrators consult but never own. The
//! [`Catalog`] is a JSON-backed implementation of both traits; an empty
//! catalog answers with id-based fallback names and no recommendation.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Lookup of names and yields by game id.
pub trait GameData: Send + Sync {
    fn plant_name(&self, plant_id: i64) -> String;

    fn seed_name(&self, seed_id: i64) -> String;

    fn item_name(&self, item_id: i64) -> String;

    fn fruit_name(&self, fruit_id: i64) -> String;

    /// Experience granted by harvesting one plot of `plant_id`.
    fn plant_exp(&self, plant_id: i64) -> i64;

    /// Total growth time of the crop that `seed_id` grows into.
    fn grow_time(&self, seed_id: i64) -> Option<Duration>;

    fn is_fruit(&self, item_id: i64) -> bool;
}

/// Best seed for a level and plot count.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRecommendation {
    pub seed_id: i64,
    pub required_level: i64,
    pub name: String,
    pub exp_per_hour: f64,
}

pub trait SeedRecommender: Send + Sync {
    fn recommend(&self, level: i64, plot_count: usize) -> Option<SeedRecommendation>;
}

/// Recommender that never has an opinion; seed choice falls back to the
/// level heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecommendation;

impl SeedRecommender for NoRecommendation {
    fn recommend(&self, _level: i64, _plot_count: usize) -> Option<SeedRecommendation> {
        None
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FruitRecord {
    pub id: i64,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlantRecord {
    pub id: i64,
    pub name: String,
    pub seed_id: i64,
    #[serde(default)]
    pub fruit: FruitRecord,
    #[serde(default)]
    pub exp: i64,
    /// `"name:seconds;name:seconds;"` per growth stage.
    #[serde(default)]
    pub grow_phases: String,
    #[serde(default)]
    pub unlock_level: i64,
}

impl PlantRecord {
    pub fn grow_seconds(&self) -> u64 {
        self.grow_phases
            .split(';')
            .filter_map(|stage| stage.split_once(':'))
            .filter_map(|(_, secs)| secs.trim().parse::<u64>().ok())
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    plants: Vec<PlantRecord>,
    #[serde(default)]
    items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    plants: HashMap<i64, PlantRecord>,
    by_seed: HashMap<i64, i64>,
    by_fruit: HashMap<i64, i64>,
    items: HashMap<i64, String>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_records(file.plants, file.items))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_records(plants: Vec<PlantRecord>, items: Vec<ItemRecord>) -> Self {
        let mut catalog = Self::default();
        for plant in plants {
            catalog.by_seed.insert(plant.seed_id, plant.id);
            if plant.fruit.id > 0 {
                catalog.by_fruit.insert(plant.fruit.id, plant.id);
            }
            catalog.plants.insert(plant.id, plant);
        }
        catalog.items = items.into_iter().map(|item| (item.id, item.name)).collect();
        catalog
    }

    pub fn plant_count(&self) -> usize {
        self.plants.len()
    }

    fn by_seed(&self, seed_id: i64) -> Option<&PlantRecord> {
        self.by_seed.get(&seed_id).and_then(|id| self.plants.get(id))
    }

    fn by_fruit(&self, fruit_id: i64) -> Option<&PlantRecord> {
        self.by_fruit.get(&fruit_id).and_then(|id| self.plants.get(id))
    }
}

impl GameData for Catalog {
    fn plant_name(&self, plant_id: i64) -> String {
        match self.plants.get(&plant_id) {
            Some(plant) => plant.name.clone(),
            None => format!("plant {plant_id}"),
        }
    }

    fn seed_name(&self, seed_id: i64) -> String {
        match self.by_seed(seed_id) {
            Some(plant) => plant.name.clone(),
            None => format!("seed {seed_id}"),
        }
    }

    fn item_name(&self, item_id: i64) -> String {
        if let Some(name) = self.items.get(&item_id).filter(|name| !name.is_empty()) {
            return name.clone();
        }
        if let Some(plant) = self.by_seed(item_id) {
            return format!("{} seed", plant.name);
        }
        if let Some(plant) = self.by_fruit(item_id) {
            return format!("{} fruit", plant.name);
        }
        format!("item {item_id}")
    }

    fn fruit_name(&self, fruit_id: i64) -> String {
        match self.by_fruit(fruit_id) {
            Some(plant) => plant.name.clone(),
            None => format!("fruit {fruit_id}"),
        }
    }

    fn plant_exp(&self, plant_id: i64) -> i64 {
        self.plants.get(&plant_id).map(|p| p.exp).unwrap_or(0)
    }

    fn grow_time(&self, seed_id: i64) -> Option<Duration> {
        let secs = self.by_seed(seed_id)?.grow_seconds();
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    fn is_fruit(&self, item_id: i64) -> bool {
        self.by_fruit.contains_key(&item_id)
    }
}

/// Ranks unlocked crops by harvest experience per hour of growth.
impl SeedRecommender for Catalog {
    fn recommend(&self, level: i64, _plot_count: usize) -> Option<SeedRecommendation> {
        self.plants
            .values()
            .filter(|plant| plant.unlock_level <= level && plant.exp > 0)
            .filter_map(|plant| {
                let secs = plant.grow_seconds();
                (secs > 0).then(|| SeedRecommendation {
                    seed_id: plant.seed_id,
                    required_level: plant.unlock_level,
                    name: plant.name.clone(),
                    exp_per_hour: plant.exp as f64 * 3600.0 / secs as f64,
                })
            })
            .max_by(|a, b| {
                a.exp_per_hour
                    .total_cmp(&b.exp_per_hour)
                    .then_with(|| b.seed_id.cmp(&a.seed_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "plants": [
            {"id": 1020002, "name": "radish", "seed_id": 20002,
             "fruit": {"id": 40002, "count": 10, "name": "radish"},
             "exp": 2, "grow_phases": "seed:30;sprout:30;mature:0;", "unlock_level": 1},
            {"id": 1020003, "name": "carrot", "seed_id": 20003,
             "fruit": {"id": 40003, "count": 10, "name": "carrot"},
             "exp": 6, "grow_phases": "seed:60;sprout:60;mature:0;", "unlock_level": 3}
        ],
        "items": [{"id": 1001, "name": "gold"}]
    }"#;

    #[test]
    fn test_lookup_by_seed_and_fruit() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        assert_eq!(catalog.seed_name(20003), "carrot");
        assert_eq!(catalog.fruit_name(40002), "radish");
        assert_eq!(catalog.item_name(1001), "gold");
        assert_eq!(catalog.item_name(20002), "radish seed");
        assert!(catalog.is_fruit(40003));
        assert!(!catalog.is_fruit(20003));
        assert_eq!(catalog.grow_time(20002), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_empty_catalog_uses_fallback_names() {
        let catalog = Catalog::empty();

        assert_eq!(catalog.plant_name(5), "plant 5");
        assert_eq!(catalog.item_name(9), "item 9");
        assert_eq!(catalog.plant_exp(5), 0);
        assert!(catalog.recommend(10, 6).is_none());
    }

    #[test]
    fn test_recommendation_respects_level() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        // radish: 2 exp / 60s = 120/h, carrot: 6 exp / 120s = 180/h
        assert_eq!(catalog.recommend(1, 6).unwrap().seed_id, 20002);
        let best = catalog.recommend(5, 6).unwrap();
        assert_eq!(best.seed_id, 20003);
        assert_eq!(best.required_level, 3);
        assert!((best.exp_per_hour - 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            Catalog::from_json("{not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
