//! The mutating gameplay actions: plant, water, harvest, buy, sell.
//!
//! Each action is two-phase: a local precondition check that never touches
//! the network, then the authoritative server call. On success the touched
//! state is patched optimistically so the UI reacts immediately; the caller
//! must still schedule a full refresh, and the refreshed snapshot always
//! wins over the optimistic patch.

use crate::api::{ApiClient, ApiError};
use crate::grid::FarmGrid;
use crate::model::{Catalog, GameSnapshot, GridPos, Plant, PlantStatus, WATERING_XP};
use crate::progression::ProgressionTracker;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

/// Client-side validation failures are rejected before any network call;
/// `Api` wraps transport and server-reported failures.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("select a seed first")]
    NoSeedSelected,
    #[error("that cell is already planted")]
    CellOccupied,
    #[error("cell is outside the farm")]
    OutOfBounds,
    #[error("no {0} seeds left")]
    OutOfSeeds(String),
    #[error("{kind} unlocks at level {required}")]
    CropLocked { kind: String, required: u32 },
    #[error("unknown crop: {0}")]
    UnknownCrop(String),
    #[error("nothing planted there")]
    EmptyCell,
    #[error("plant is not ready to harvest")]
    NotReady,
    #[error("plant has withered; water it first")]
    PlantWithered,
    #[error("plant does not need watering")]
    AlreadyWatered,
    #[error("not enough coins: need {need}, have {have}")]
    InsufficientCoins { need: u64, have: u64 },
    #[error("not enough harvest: need {need}, have {have}")]
    InsufficientHarvest { need: u32, have: u32 },
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ActionError {
    /// Validation errors are rejected locally; everything else went over the
    /// wire.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ActionError::Api(_))
    }
}

/// Everything the action layer works on: the latest snapshot, the crop
/// catalog, and the progression tracker.
pub struct Session {
    pub snapshot: GameSnapshot,
    pub catalog: Catalog,
    pub tracker: ProgressionTracker,
}

impl Session {
    pub fn grid(&self) -> FarmGrid {
        FarmGrid::project(
            &self.snapshot.farm,
            self.snapshot.grid.width,
            self.snapshot.grid.height,
        )
    }

    fn plant_at(&self, pos: GridPos) -> Option<&Plant> {
        self.snapshot.farm.iter().find(|p| p.position == pos)
    }
}

/// Outcome of a bulk watering pass.
#[derive(Debug, Default)]
pub struct WaterAllReport {
    pub watered: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Precondition checks (pure, no I/O)
// ---------------------------------------------------------------------------

pub fn check_plant(session: &Session, kind: &str, pos: GridPos) -> Result<(), ActionError> {
    let grid = &session.snapshot.grid;
    if pos.x >= grid.width || pos.y >= grid.height {
        return Err(ActionError::OutOfBounds);
    }
    if session.plant_at(pos).is_some() {
        return Err(ActionError::CellOccupied);
    }
    let info = session.tracker.info();
    if !info.unlocked_plants.contains(kind) {
        let required = session
            .catalog
            .crop(kind)
            .map(|c| c.required_level)
            .unwrap_or(u32::MAX);
        return Err(ActionError::CropLocked {
            kind: kind.to_string(),
            required,
        });
    }
    if session.snapshot.inventory.seed_count(kind) == 0 {
        return Err(ActionError::OutOfSeeds(kind.to_string()));
    }
    Ok(())
}

pub fn check_water(session: &Session, pos: GridPos) -> Result<(), ActionError> {
    let plant = session.plant_at(pos).ok_or(ActionError::EmptyCell)?;
    if !plant.needs_water() {
        return Err(ActionError::AlreadyWatered);
    }
    Ok(())
}

pub fn check_harvest(session: &Session, pos: GridPos) -> Result<&Plant, ActionError> {
    let plant = session.plant_at(pos).ok_or(ActionError::EmptyCell)?;
    match plant.status() {
        PlantStatus::Ready => Ok(plant),
        PlantStatus::Withered => Err(ActionError::PlantWithered),
        _ => Err(ActionError::NotReady),
    }
}

pub fn check_buy(session: &Session, kind: &str, quantity: u32) -> Result<u64, ActionError> {
    let crop = session
        .catalog
        .crop(kind)
        .ok_or_else(|| ActionError::UnknownCrop(kind.to_string()))?;
    if !session.tracker.info().unlocked_plants.contains(kind) {
        return Err(ActionError::CropLocked {
            kind: kind.to_string(),
            required: crop.required_level,
        });
    }
    let need = crop.seed_price * quantity as u64;
    let have = session.snapshot.player.coins;
    if have < need {
        return Err(ActionError::InsufficientCoins { need, have });
    }
    Ok(need)
}

pub fn check_sell(session: &Session, kind: &str, quantity: u32) -> Result<u64, ActionError> {
    let crop = session
        .catalog
        .crop(kind)
        .ok_or_else(|| ActionError::UnknownCrop(kind.to_string()))?;
    let have = session.snapshot.inventory.harvest_count(kind);
    if have < quantity {
        return Err(ActionError::InsufficientHarvest {
            need: quantity,
            have,
        });
    }
    Ok(crop.sell_price * quantity as u64)
}

// ---------------------------------------------------------------------------
// Optimistic reconciliation (pure, applied only after server success)
// ---------------------------------------------------------------------------

fn apply_plant(snapshot: &mut GameSnapshot, kind: &str, pos: GridPos, id: Option<String>) {
    if !snapshot.inventory.take_seeds(kind, 1) {
        warn!(kind, "seed count drifted during plant round-trip");
    }
    let now = Utc::now();
    snapshot.farm.push(Plant {
        // The refresh replaces a placeholder id with the server's.
        id: id.unwrap_or_default(),
        kind: kind.to_string(),
        stage: 0,
        planted_at: now,
        last_watered_at: now,
        watered: false,
        withered: false,
        position: pos,
    });
}

fn apply_water(snapshot: &mut GameSnapshot, pos: GridPos) {
    if let Some(plant) = snapshot.farm.iter_mut().find(|p| p.position == pos) {
        plant.watered = true;
        plant.withered = false;
        plant.last_watered_at = Utc::now();
    }
}

fn apply_harvest(snapshot: &mut GameSnapshot, pos: GridPos, kind: &str, yield_count: u32) {
    snapshot.farm.retain(|p| p.position != pos);
    snapshot.inventory.add_harvest(kind, yield_count);
}

fn apply_buy(snapshot: &mut GameSnapshot, kind: &str, quantity: u32, total: u64) {
    snapshot.player.coins = snapshot.player.coins.saturating_sub(total);
    snapshot.inventory.add_seeds(kind, quantity);
}

fn apply_sell(snapshot: &mut GameSnapshot, kind: &str, quantity: u32, total: u64) {
    if !snapshot.inventory.take_harvest(kind, quantity) {
        warn!(kind, "harvest count drifted during sell round-trip");
    }
    snapshot.player.coins += total;
}

// ---------------------------------------------------------------------------
// Orchestrated actions (check, round-trip, reconcile, grant XP)
// ---------------------------------------------------------------------------

pub async fn plant(
    api: &ApiClient,
    session: &mut Session,
    kind: &str,
    pos: GridPos,
) -> Result<String, ActionError> {
    check_plant(session, kind, pos)?;
    let out = api.plant(kind, pos).await?;
    apply_plant(&mut session.snapshot, kind, pos, out.id);

    let xp = out.xp.unwrap_or_else(|| session.catalog.plant_xp(kind));
    session.tracker.grant_xp(xp as i64);
    info!(kind, x = pos.x, y = pos.y, xp, "planted");
    Ok(format!(
        "Planted {} (+{xp} XP)",
        session.catalog.display_name(kind)
    ))
}

pub async fn water(
    api: &ApiClient,
    session: &mut Session,
    pos: GridPos,
) -> Result<String, ActionError> {
    check_water(session, pos)?;
    let out = api.water(pos).await?;
    apply_water(&mut session.snapshot, pos);

    let xp = out.xp.unwrap_or(WATERING_XP);
    session.tracker.grant_xp(xp as i64);
    Ok(format!("Watered (+{xp} XP)"))
}

pub async fn harvest(
    api: &ApiClient,
    session: &mut Session,
    pos: GridPos,
) -> Result<String, ActionError> {
    let plant_id = check_harvest(session, pos)?.id.clone();
    let out = api.harvest(&plant_id).await?;

    // Trust the server's view of what was cut; fall back to the local cell.
    let kind = if out.plant_type.is_empty() {
        session
            .plant_at(pos)
            .map(|p| p.kind.clone())
            .unwrap_or_default()
    } else {
        out.plant_type.clone()
    };
    let yield_count = out.yield_count.max(1);
    apply_harvest(&mut session.snapshot, pos, &kind, yield_count);

    let xp = out.xp.unwrap_or_else(|| session.catalog.harvest_xp(&kind));
    session.tracker.grant_xp(xp as i64);
    info!(kind, yield_count, xp, "harvested");
    Ok(format!(
        "Harvested {yield_count} {} (+{xp} XP)",
        session.catalog.display_name(&kind)
    ))
}

pub async fn buy(
    api: &ApiClient,
    session: &mut Session,
    kind: &str,
    quantity: u32,
) -> Result<String, ActionError> {
    let expected = check_buy(session, kind, quantity)?;
    let out = api.buy(kind, quantity).await?;
    // The server's price wins if the catalog was stale.
    let total = if out.total_price > 0 {
        out.total_price
    } else {
        expected
    };
    apply_buy(&mut session.snapshot, kind, quantity, total);
    Ok(format!(
        "Bought {quantity} {} seeds for {total} coins",
        session.catalog.display_name(kind)
    ))
}

pub async fn sell(
    api: &ApiClient,
    session: &mut Session,
    kind: &str,
    quantity: u32,
) -> Result<String, ActionError> {
    let expected = check_sell(session, kind, quantity)?;
    let out = api.sell(kind, quantity).await?;
    let total = if out.total_price > 0 {
        out.total_price
    } else {
        expected
    };
    apply_sell(&mut session.snapshot, kind, quantity, total);

    let xp = out
        .xp
        .unwrap_or_else(|| session.catalog.sell_xp_per_unit(kind) * quantity);
    session.tracker.grant_xp(xp as i64);
    Ok(format!(
        "Sold {quantity} {} for {total} coins (+{xp} XP)",
        session.catalog.display_name(kind)
    ))
}

/// Waters every plant that is due, one request at a time. Sequential awaits
/// are the backpressure: the next request only leaves after the previous
/// response arrived. Per-cell domain rejections are counted, not fatal;
/// the pass stops early on a transport failure.
pub async fn water_all(
    api: &ApiClient,
    session: &mut Session,
) -> Result<WaterAllReport, ActionError> {
    let due = session.grid().due_for_water();
    let mut report = WaterAllReport::default();

    for pos in due {
        match water(api, session, pos).await {
            Ok(_) => report.watered += 1,
            Err(ActionError::Api(ApiError::Transport(e))) => {
                warn!(error = %e, "water-all aborted mid-pass");
                return Err(ActionError::Api(ApiError::Transport(e)));
            }
            Err(err) => {
                warn!(x = pos.x, y = pos.y, error = %err, "skipping cell");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::plant_at;
    use crate::model::{CropInfo, GridSize, Inventory, Player, READY_STAGE};
    use crate::progression::{LevelInfo, LevelTable, ProgressionTracker};
    use std::collections::BTreeSet;

    fn crop(kind: &str, seed_price: u64, sell_price: u64, required_level: u32) -> CropInfo {
        CropInfo {
            kind: kind.to_string(),
            name: kind.to_string(),
            emoji: String::new(),
            seed_price,
            sell_price,
            growth_secs: 60,
            required_level,
            yield_count: 3,
            rarity: None,
            plant_xp: None,
            harvest_xp: None,
            sell_xp: None,
        }
    }

    fn session() -> Session {
        let catalog = Catalog::from_crops(vec![
            crop("carrot", 10, 15, 1),
            crop("pumpkin", 100, 250, 5),
        ]);
        let mut inventory = Inventory::default();
        inventory.add_seeds("carrot", 2);
        inventory.add_harvest("carrot", 5);

        let snapshot = GameSnapshot {
            player: Player {
                id: 1,
                coins: 50,
                diamonds: 0,
            },
            farm: vec![plant_at(1, 1, READY_STAGE)],
            inventory,
            level: LevelInfo::default(),
            grid: GridSize::default(),
        };
        Session {
            snapshot,
            catalog,
            tracker: ProgressionTracker::new(
                LevelInfo {
                    unlocked_plants: BTreeSet::from(["carrot".to_string()]),
                    ..LevelInfo::default()
                },
                LevelTable::default(),
            ),
        }
    }

    #[test]
    fn plant_rejected_on_occupied_cell() {
        let s = session();
        let err = check_plant(&s, "carrot", GridPos::new(1, 1)).unwrap_err();
        assert!(matches!(err, ActionError::CellOccupied));
        assert!(err.is_validation());
    }

    #[test]
    fn plant_rejected_when_locked_or_out_of_seeds() {
        let mut s = session();
        assert!(matches!(
            check_plant(&s, "pumpkin", GridPos::new(0, 0)),
            Err(ActionError::CropLocked { required: 5, .. })
        ));

        s.snapshot.inventory.take_seeds("carrot", 2);
        assert!(matches!(
            check_plant(&s, "carrot", GridPos::new(0, 0)),
            Err(ActionError::OutOfSeeds(_))
        ));
    }

    #[test]
    fn plant_rejected_outside_grid() {
        let s = session();
        assert!(matches!(
            check_plant(&s, "carrot", GridPos::new(9, 0)),
            Err(ActionError::OutOfBounds)
        ));
    }

    #[test]
    fn harvest_rejected_unless_ready_and_not_withered() {
        let mut s = session();
        assert!(check_harvest(&s, GridPos::new(1, 1)).is_ok());

        s.snapshot.farm[0].stage = 1;
        assert!(matches!(
            check_harvest(&s, GridPos::new(1, 1)),
            Err(ActionError::NotReady)
        ));

        s.snapshot.farm[0].stage = READY_STAGE;
        s.snapshot.farm[0].withered = true;
        assert!(matches!(
            check_harvest(&s, GridPos::new(1, 1)),
            Err(ActionError::PlantWithered)
        ));

        assert!(matches!(
            check_harvest(&s, GridPos::new(0, 0)),
            Err(ActionError::EmptyCell)
        ));
    }

    #[test]
    fn water_rejected_when_not_due() {
        let mut s = session();
        // Ready plant, watered flag set by fixture: nothing to water.
        assert!(matches!(
            check_water(&s, GridPos::new(1, 1)),
            Err(ActionError::AlreadyWatered)
        ));

        s.snapshot.farm[0].withered = true;
        assert!(check_water(&s, GridPos::new(1, 1)).is_ok());
    }

    #[test]
    fn buy_enforces_price_times_quantity() {
        let s = session();
        // 50 coins, carrot seeds at 10: five are affordable, six are not.
        assert_eq!(check_buy(&s, "carrot", 5).unwrap(), 50);
        assert!(matches!(
            check_buy(&s, "carrot", 6),
            Err(ActionError::InsufficientCoins { need: 60, have: 50 })
        ));
    }

    #[test]
    fn buy_decrements_coins_exactly() {
        let mut s = session();
        apply_buy(&mut s.snapshot, "carrot", 3, 30);
        assert_eq!(s.snapshot.player.coins, 20);
        assert_eq!(s.snapshot.inventory.seed_count("carrot"), 5);
    }

    #[test]
    fn sell_of_entire_stock_leaves_zero() {
        let mut s = session();
        assert!(matches!(
            check_sell(&s, "carrot", 6),
            Err(ActionError::InsufficientHarvest { need: 6, have: 5 })
        ));

        let total = check_sell(&s, "carrot", 5).unwrap();
        assert_eq!(total, 75);
        apply_sell(&mut s.snapshot, "carrot", 5, total);
        assert_eq!(s.snapshot.inventory.harvest_count("carrot"), 0);
        assert_eq!(s.snapshot.player.coins, 125);
    }

    #[test]
    fn harvest_credits_full_yield() {
        let mut s = session();
        apply_harvest(&mut s.snapshot, GridPos::new(1, 1), "carrot", 3);
        assert_eq!(s.snapshot.inventory.harvest_count("carrot"), 8);
        assert!(s.snapshot.farm.is_empty());
    }

    #[test]
    fn plant_apply_inserts_stage_zero_and_spends_seed() {
        let mut s = session();
        apply_plant(&mut s.snapshot, "carrot", GridPos::new(0, 0), None);
        assert_eq!(s.snapshot.inventory.seed_count("carrot"), 1);
        let planted = s
            .snapshot
            .farm
            .iter()
            .find(|p| p.position == GridPos::new(0, 0))
            .unwrap();
        assert_eq!(planted.stage, 0);
        assert!(!planted.watered);
    }

    #[test]
    fn water_apply_cures_withered() {
        let mut s = session();
        s.snapshot.farm[0].withered = true;
        apply_water(&mut s.snapshot, GridPos::new(1, 1));
        assert!(!s.snapshot.farm[0].withered);
        assert!(s.snapshot.farm[0].watered);
    }
}
