//! Core game data: plants, inventory, wallet, crop catalog, full snapshot.
//!
//! Everything here mirrors what the server sends. The server is authoritative
//! for growth, timers and the economy; these types only carry that state and
//! derive render attributes from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Growth stage at which a plant can be harvested.
pub const READY_STAGE: u8 = 3;

/// XP for watering a single plant when the server does not report one.
pub const WATERING_XP: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: u16,
    pub y: u16,
}

impl GridPos {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Extent of the farm grid. The server reports it with the snapshot; the
/// reference deployment uses 5x5.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSize {
    pub width: u16,
    pub height: u16,
}

impl Default for GridSize {
    fn default() -> Self {
        Self {
            width: 5,
            height: 5,
        }
    }
}

/// One planted crop, as reported by the server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    pub id: String,
    pub kind: String,
    pub stage: u8,
    pub planted_at: DateTime<Utc>,
    pub last_watered_at: DateTime<Utc>,
    #[serde(default)]
    pub watered: bool,
    #[serde(default)]
    pub withered: bool,
    pub position: GridPos,
}

/// Render-facing state of a plant. `Withered` and `Ready` are mutually
/// exclusive: a withered plant is blocked until watered, a ready plant is
/// blocked until harvested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlantStatus {
    Growing,
    NeedsWater,
    Ready,
    Withered,
}

impl Plant {
    pub fn status(&self) -> PlantStatus {
        if self.withered {
            PlantStatus::Withered
        } else if self.stage >= READY_STAGE {
            PlantStatus::Ready
        } else if !self.watered {
            PlantStatus::NeedsWater
        } else {
            PlantStatus::Growing
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == PlantStatus::Ready
    }

    /// Watering is meaningful when the plant is withered (cure) or has not
    /// been watered in the current cycle.
    pub fn needs_water(&self) -> bool {
        self.withered || (!self.watered && self.stage < READY_STAGE)
    }

    /// Growth fraction in [0, 1] for the progress bar.
    pub fn progress(&self) -> f32 {
        (self.stage as f32 / READY_STAGE as f32).clamp(0.0, 1.0)
    }

    /// Glyph for the current stage: generic sprout glyphs while growing, the
    /// crop's own emoji once ready, a wilted flower when withered.
    pub fn glyph(&self, catalog: &Catalog) -> &'static str {
        if self.withered {
            return "🥀";
        }
        match self.stage {
            0 => "🌱",
            1 => "🌿",
            _ if self.stage >= READY_STAGE => catalog
                .crop(&self.kind)
                .map(|c| c.emoji_static())
                .unwrap_or("🌾"),
            _ => "🪴",
        }
    }
}

/// Player wallet. Coins are spent on seeds and earned by selling; diamonds
/// come from level rewards.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: u64,
    #[serde(default)]
    pub coins: u64,
    #[serde(default)]
    pub diamonds: u64,
}

/// Seed and harvest counts per crop kind.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub seeds: BTreeMap<String, u32>,
    #[serde(default)]
    pub harvest: BTreeMap<String, u32>,
}

impl Inventory {
    pub fn seed_count(&self, kind: &str) -> u32 {
        self.seeds.get(kind).copied().unwrap_or(0)
    }

    pub fn harvest_count(&self, kind: &str) -> u32 {
        self.harvest.get(kind).copied().unwrap_or(0)
    }

    pub fn add_seeds(&mut self, kind: &str, count: u32) {
        *self.seeds.entry(kind.to_string()).or_insert(0) += count;
    }

    pub fn add_harvest(&mut self, kind: &str, count: u32) {
        *self.harvest.entry(kind.to_string()).or_insert(0) += count;
    }

    /// Removes seeds if enough are held; false leaves the count untouched.
    pub fn take_seeds(&mut self, kind: &str, count: u32) -> bool {
        take(&mut self.seeds, kind, count)
    }

    pub fn take_harvest(&mut self, kind: &str, count: u32) -> bool {
        take(&mut self.harvest, kind, count)
    }
}

fn take(map: &mut BTreeMap<String, u32>, kind: &str, count: u32) -> bool {
    let Some(held) = map.get_mut(kind) else {
        return false;
    };
    if *held < count {
        return false;
    }
    *held -= count;
    if *held == 0 {
        map.remove(kind);
    }
    true
}

/// Static per-crop data from `GET /plants/info`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropInfo {
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    pub seed_price: u64,
    pub sell_price: u64,
    #[serde(default)]
    pub growth_secs: u64,
    #[serde(default = "one")]
    pub required_level: u32,
    #[serde(default = "one_u32")]
    pub yield_count: u32,
    #[serde(default)]
    pub rarity: Option<String>,
    /// Server-supplied XP values; absent entries fall back to the static table.
    #[serde(default)]
    pub plant_xp: Option<u32>,
    #[serde(default)]
    pub harvest_xp: Option<u32>,
    #[serde(default)]
    pub sell_xp: Option<u32>,
}

fn one() -> u32 {
    1
}

fn one_u32() -> u32 {
    1
}

impl CropInfo {
    /// Emoji as a static str for the known crops; the catalog string is used
    /// for display elsewhere, this covers the grid fast path.
    pub fn emoji_static(&self) -> &'static str {
        match self.kind.as_str() {
            "carrot" => "🥕",
            "tomato" => "🍅",
            "cucumber" => "🥒",
            "strawberry" => "🍓",
            "pumpkin" => "🎃",
            _ => "🌾",
        }
    }
}

/// The crop catalog, keyed by crop kind.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    crops: BTreeMap<String, CropInfo>,
}

impl Catalog {
    pub fn from_crops(crops: Vec<CropInfo>) -> Self {
        Self {
            crops: crops.into_iter().map(|c| (c.kind.clone(), c)).collect(),
        }
    }

    pub fn crop(&self, kind: &str) -> Option<&CropInfo> {
        self.crops.get(kind)
    }

    pub fn crops(&self) -> impl Iterator<Item = &CropInfo> {
        self.crops.values()
    }

    pub fn display_name(&self, kind: &str) -> String {
        self.crop(kind)
            .filter(|c| !c.name.is_empty())
            .map(|c| c.name.clone())
            .unwrap_or_else(|| kind.to_string())
    }

    /// XP for planting one seed: catalog value, else static fallback.
    pub fn plant_xp(&self, kind: &str) -> u32 {
        self.crop(kind)
            .and_then(|c| c.plant_xp)
            .unwrap_or_else(|| fallback_xp(kind, XpAction::Plant))
    }

    /// XP for harvesting one plant.
    pub fn harvest_xp(&self, kind: &str) -> u32 {
        self.crop(kind)
            .and_then(|c| c.harvest_xp)
            .unwrap_or_else(|| fallback_xp(kind, XpAction::Harvest))
    }

    /// XP for selling one unit of harvest.
    pub fn sell_xp_per_unit(&self, kind: &str) -> u32 {
        self.crop(kind)
            .and_then(|c| c.sell_xp)
            .unwrap_or_else(|| fallback_xp(kind, XpAction::Sell))
    }
}

#[derive(Clone, Copy)]
enum XpAction {
    Plant,
    Harvest,
    Sell,
}

/// Static per-action XP used only when neither the action response nor the
/// catalog carries a value.
fn fallback_xp(kind: &str, action: XpAction) -> u32 {
    match action {
        XpAction::Plant => match kind {
            "carrot" => 5,
            "tomato" => 7,
            "cucumber" => 8,
            "strawberry" => 10,
            "pumpkin" => 15,
            _ => 5,
        },
        XpAction::Harvest => match kind {
            "carrot" => 10,
            "tomato" => 15,
            "cucumber" => 18,
            "strawberry" => 25,
            "pumpkin" => 40,
            _ => 10,
        },
        XpAction::Sell => match kind {
            "carrot" => 1,
            "tomato" => 2,
            "cucumber" => 3,
            "strawberry" => 4,
            "pumpkin" => 10,
            _ => 1,
        },
    }
}

/// Full game state from `GET /game/{playerId}`. The latest successful fetch
/// is always ground truth; optimistic edits never survive a refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub player: Player,
    #[serde(default)]
    pub farm: Vec<Plant>,
    #[serde(default)]
    pub inventory: Inventory,
    pub level: crate::progression::LevelInfo,
    #[serde(default)]
    pub grid: GridSize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn plant_at(x: u16, y: u16, stage: u8) -> Plant {
        Plant {
            id: format!("p-{x}-{y}"),
            kind: "carrot".to_string(),
            stage,
            planted_at: Utc::now(),
            last_watered_at: Utc::now(),
            watered: true,
            withered: false,
            position: GridPos::new(x, y),
        }
    }

    #[test]
    fn ready_and_withered_are_mutually_exclusive() {
        let mut p = plant_at(0, 0, READY_STAGE);
        assert_eq!(p.status(), PlantStatus::Ready);
        p.withered = true;
        assert_eq!(p.status(), PlantStatus::Withered);
        assert!(!p.is_ready());
    }

    #[test]
    fn unwatered_growing_plant_needs_water() {
        let mut p = plant_at(0, 0, 1);
        p.watered = false;
        assert_eq!(p.status(), PlantStatus::NeedsWater);
        assert!(p.needs_water());

        p.watered = true;
        assert_eq!(p.status(), PlantStatus::Growing);
        assert!(!p.needs_water());
    }

    #[test]
    fn withered_plant_needs_water_even_if_marked_watered() {
        let mut p = plant_at(0, 0, 2);
        p.watered = true;
        p.withered = true;
        assert!(p.needs_water());
    }

    #[test]
    fn inventory_take_rejects_shortfall() {
        let mut inv = Inventory::default();
        inv.add_seeds("carrot", 2);
        assert!(!inv.take_seeds("carrot", 3));
        assert_eq!(inv.seed_count("carrot"), 2);
        assert!(inv.take_seeds("carrot", 2));
        assert_eq!(inv.seed_count("carrot"), 0);
    }

    #[test]
    fn catalog_xp_prefers_server_values() {
        let mut crop = CropInfo {
            kind: "carrot".to_string(),
            name: "Carrot".to_string(),
            emoji: "🥕".to_string(),
            seed_price: 10,
            sell_price: 15,
            growth_secs: 60,
            required_level: 1,
            yield_count: 3,
            rarity: None,
            plant_xp: Some(99),
            harvest_xp: None,
            sell_xp: None,
        };
        let catalog = Catalog::from_crops(vec![crop.clone()]);
        assert_eq!(catalog.plant_xp("carrot"), 99);
        assert_eq!(catalog.harvest_xp("carrot"), 10);

        crop.plant_xp = None;
        let catalog = Catalog::from_crops(vec![crop]);
        assert_eq!(catalog.plant_xp("carrot"), 5);
        assert_eq!(catalog.plant_xp("unknown"), 5);
    }
}
