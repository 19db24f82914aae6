//! Level and XP bookkeeping.
//!
//! One tracker owns the level state. XP thresholds, rewards and unlocks come
//! from the server level table (`GET /levels/table`); the client never bakes
//! in its own balance numbers. Past the end of the table the threshold grows
//! by a fixed x1.5 per level so a long session cannot run off the end.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Player level state, as carried in the game snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub current_level: u32,
    pub current_xp: u64,
    pub xp_to_next_level: u64,
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default)]
    pub unlocked_plants: BTreeSet<String>,
    #[serde(default)]
    pub unlocked_features: BTreeSet<String>,
}

impl Default for LevelInfo {
    fn default() -> Self {
        Self {
            current_level: 1,
            current_xp: 0,
            xp_to_next_level: 100,
            total_xp: 0,
            unlocked_plants: BTreeSet::from(["carrot".to_string()]),
            unlocked_features: BTreeSet::new(),
        }
    }
}

impl LevelInfo {
    pub fn progress(&self) -> f64 {
        if self.xp_to_next_level == 0 {
            return 1.0;
        }
        (self.current_xp as f64 / self.xp_to_next_level as f64).clamp(0.0, 1.0)
    }
}

/// One row of the server level table. `xp_required` is cumulative total XP
/// needed to reach the level.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRow {
    pub level: u32,
    pub xp_required: u64,
    #[serde(default)]
    pub reward_coins: u64,
    #[serde(default)]
    pub reward_diamonds: u64,
    #[serde(default)]
    pub unlocked_plants: Vec<String>,
    #[serde(default)]
    pub unlocked_features: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LevelTable {
    rows: BTreeMap<u32, LevelRow>,
}

impl LevelTable {
    pub fn from_rows(rows: Vec<LevelRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.level, r)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, level: u32) -> Option<&LevelRow> {
        self.rows.get(&level)
    }

    /// XP needed to climb from `level` to `level + 1`. Table-driven where
    /// both rows exist; beyond the table the previous threshold scales by
    /// x1.5 (rounded up, never zero).
    pub fn threshold_after(&self, level: u32, previous: u64) -> u64 {
        match (self.rows.get(&level), self.rows.get(&(level + 1))) {
            (Some(a), Some(b)) => b.xp_required.saturating_sub(a.xp_required).max(1),
            _ => ((previous.max(1)) * 3).div_ceil(2),
        }
    }
}

/// Net outcome of one or more level crossings, shown once and acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelUpEvent {
    pub old_level: u32,
    pub new_level: u32,
    pub coins: u64,
    pub diamonds: u64,
    pub unlocked_plants: BTreeSet<String>,
    pub unlocked_features: BTreeSet<String>,
}

impl LevelUpEvent {
    fn new(old_level: u32) -> Self {
        Self {
            old_level,
            new_level: old_level,
            coins: 0,
            diamonds: 0,
            unlocked_plants: BTreeSet::new(),
            unlocked_features: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, other: LevelUpEvent) {
        self.new_level = self.new_level.max(other.new_level);
        self.coins += other.coins;
        self.diamonds += other.diamonds;
        self.unlocked_plants.extend(other.unlocked_plants);
        self.unlocked_features.extend(other.unlocked_features);
    }
}

/// Owns [`LevelInfo`], applies XP grants, and holds at most one pending
/// [`LevelUpEvent`] until the presentation layer acknowledges it. A second
/// crossing while one is pending merges into it rather than queueing.
#[derive(Clone, Debug, Default)]
pub struct ProgressionTracker {
    info: LevelInfo,
    table: LevelTable,
    pending: Option<LevelUpEvent>,
}

impl ProgressionTracker {
    pub fn new(info: LevelInfo, table: LevelTable) -> Self {
        Self {
            info,
            table,
            pending: None,
        }
    }

    pub fn info(&self) -> &LevelInfo {
        &self.info
    }

    pub fn pending(&self) -> Option<&LevelUpEvent> {
        self.pending.as_ref()
    }

    /// Consumes the pending event; the Pending -> Idle transition.
    pub fn acknowledge(&mut self) -> Option<LevelUpEvent> {
        self.pending.take()
    }

    /// Applies an XP grant. Negative amounts are rejected without mutating
    /// state. A single grant may cross several thresholds; every crossed
    /// level's rewards and unlocks are unioned into one net event. Returns
    /// true when a level-up happened.
    pub fn grant_xp(&mut self, amount: i64) -> bool {
        if amount < 0 {
            return false;
        }
        let amount = amount as u64;
        self.info.total_xp += amount;

        let start_level = self.info.current_level;
        let mut xp = self.info.current_xp + amount;
        let mut threshold = self.info.xp_to_next_level.max(1);
        let mut event: Option<LevelUpEvent> = None;

        while xp >= threshold {
            xp -= threshold;
            let reached = self.info.current_level + 1;
            self.info.current_level = reached;
            threshold = self.table.threshold_after(reached, threshold);

            let ev = event.get_or_insert_with(|| LevelUpEvent::new(start_level));
            ev.new_level = reached;
            if let Some(row) = self.table.row(reached) {
                ev.coins += row.reward_coins;
                ev.diamonds += row.reward_diamonds;
                for kind in &row.unlocked_plants {
                    if self.info.unlocked_plants.insert(kind.clone()) {
                        ev.unlocked_plants.insert(kind.clone());
                    }
                }
                for feature in &row.unlocked_features {
                    if self.info.unlocked_features.insert(feature.clone()) {
                        ev.unlocked_features.insert(feature.clone());
                    }
                }
            }
        }

        self.info.current_xp = xp;
        self.info.xp_to_next_level = threshold;

        match event {
            Some(ev) => {
                self.push_pending(ev);
                true
            }
            None => false,
        }
    }

    /// Adopts a server-confirmed [`LevelInfo`] as ground truth. Local XP
    /// grants between refreshes are only estimates; the fetched state wins.
    /// If the server reports a level the client has not celebrated yet, the
    /// missing crossings become a pending event too.
    pub fn sync_from_server(&mut self, server: LevelInfo) {
        let old_level = self.info.current_level;
        if server.current_level > old_level {
            let mut ev = LevelUpEvent::new(old_level);
            ev.new_level = server.current_level;
            for level in (old_level + 1)..=server.current_level {
                if let Some(row) = self.table.row(level) {
                    ev.coins += row.reward_coins;
                    ev.diamonds += row.reward_diamonds;
                    ev.unlocked_plants.extend(row.unlocked_plants.iter().cloned());
                    ev.unlocked_features
                        .extend(row.unlocked_features.iter().cloned());
                }
            }
            // Only celebrate unlocks the client had not seen before.
            for known in &self.info.unlocked_plants {
                ev.unlocked_plants.remove(known);
            }
            for known in &self.info.unlocked_features {
                ev.unlocked_features.remove(known);
            }
            self.push_pending(ev);
        }
        self.info = server;
    }

    pub fn set_table(&mut self, table: LevelTable) {
        self.table = table;
    }

    fn push_pending(&mut self, event: LevelUpEvent) {
        match self.pending.as_mut() {
            Some(pending) => pending.absorb(event),
            None => self.pending = Some(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_table() -> LevelTable {
        // Cumulative thresholds: 100 XP to level 2, then 200, 300, 400.
        LevelTable::from_rows(vec![
            LevelRow {
                level: 1,
                xp_required: 0,
                reward_coins: 100,
                reward_diamonds: 1,
                unlocked_plants: vec!["carrot".to_string()],
                unlocked_features: vec!["basic_planting".to_string(), "watering".to_string()],
            },
            LevelRow {
                level: 2,
                xp_required: 100,
                reward_coins: 200,
                reward_diamonds: 0,
                unlocked_plants: vec!["tomato".to_string()],
                unlocked_features: vec!["selling".to_string()],
            },
            LevelRow {
                level: 3,
                xp_required: 300,
                reward_coins: 500,
                reward_diamonds: 2,
                unlocked_plants: vec!["cucumber".to_string()],
                unlocked_features: vec!["fertilizer".to_string()],
            },
            LevelRow {
                level: 4,
                xp_required: 600,
                reward_coins: 1000,
                reward_diamonds: 0,
                unlocked_plants: vec!["strawberry".to_string()],
                unlocked_features: vec!["greenhouse_unlock".to_string()],
            },
            LevelRow {
                level: 5,
                xp_required: 1000,
                reward_coins: 2000,
                reward_diamonds: 3,
                unlocked_plants: vec!["pumpkin".to_string()],
                unlocked_features: vec!["greenhouse_build".to_string()],
            },
        ])
    }

    fn tracker_at(level: u32, xp: u64, threshold: u64) -> ProgressionTracker {
        ProgressionTracker::new(
            LevelInfo {
                current_level: level,
                current_xp: xp,
                xp_to_next_level: threshold,
                total_xp: 0,
                unlocked_plants: BTreeSet::from(["carrot".to_string()]),
                unlocked_features: BTreeSet::new(),
            },
            reference_table(),
        )
    }

    #[test]
    fn crossing_one_threshold() {
        // Level 1, 90/100 XP, +25 -> level 2 with 15 XP left.
        let mut t = tracker_at(1, 90, 100);
        assert!(t.grant_xp(25));

        assert_eq!(t.info().current_level, 2);
        assert_eq!(t.info().current_xp, 15);
        assert_eq!(t.info().xp_to_next_level, 200);

        let ev = t.pending().expect("level-up pending");
        assert_eq!(ev.old_level, 1);
        assert_eq!(ev.new_level, 2);
        assert!(ev.unlocked_plants.contains("tomato"));
        assert_eq!(ev.coins, 200);
    }

    #[test]
    fn one_big_grant_crosses_multiple_levels() {
        let mut t = tracker_at(1, 0, 100);
        assert!(t.grant_xp(650)); // 100 + 200 + 300 = 600 to reach level 4

        assert_eq!(t.info().current_level, 4);
        assert_eq!(t.info().current_xp, 50);
        assert_eq!(t.info().xp_to_next_level, 400);

        let ev = t.pending().unwrap();
        assert_eq!((ev.old_level, ev.new_level), (1, 4));
        for kind in ["tomato", "cucumber", "strawberry"] {
            assert!(ev.unlocked_plants.contains(kind), "missing {kind}");
        }
        assert_eq!(ev.coins, 200 + 500 + 1000);
    }

    #[test]
    fn xp_application_is_additive() {
        let mut split = tracker_at(1, 0, 100);
        split.grant_xp(140);
        split.grant_xp(260);

        let mut lump = tracker_at(1, 0, 100);
        lump.grant_xp(400);

        assert_eq!(split.info().current_level, lump.info().current_level);
        assert_eq!(split.info().current_xp, lump.info().current_xp);
        assert_eq!(split.info().xp_to_next_level, lump.info().xp_to_next_level);
    }

    #[test]
    fn negative_grant_rejected_without_mutation() {
        let mut t = tracker_at(1, 42, 100);
        assert!(!t.grant_xp(-5));
        assert_eq!(t.info().current_xp, 42);
        assert_eq!(t.info().total_xp, 0);
        assert!(t.pending().is_none());
    }

    #[test]
    fn unlocks_are_monotonic() {
        let mut t = tracker_at(1, 0, 100);
        let mut seen_plants = t.info().unlocked_plants.clone();
        let mut seen_features = t.info().unlocked_features.clone();

        for _ in 0..8 {
            t.grant_xp(250);
            assert!(t.info().unlocked_plants.is_superset(&seen_plants));
            assert!(t.info().unlocked_features.is_superset(&seen_features));
            seen_plants = t.info().unlocked_plants.clone();
            seen_features = t.info().unlocked_features.clone();
        }
    }

    #[test]
    fn threshold_extends_past_table_by_growth_factor() {
        let table = reference_table();
        // Level 5 is the last row; 5 -> 6 falls back to x1.5 of the previous.
        assert_eq!(table.threshold_after(5, 400), 600);
        assert_eq!(table.threshold_after(6, 600), 900);
    }

    #[test]
    fn second_crossing_merges_into_pending_event() {
        let mut t = tracker_at(1, 90, 100);
        t.grant_xp(25); // -> level 2 pending
        t.grant_xp(200); // -> level 3 while still pending

        let ev = t.pending().unwrap();
        assert_eq!((ev.old_level, ev.new_level), (1, 3));
        assert!(ev.unlocked_plants.contains("tomato"));
        assert!(ev.unlocked_plants.contains("cucumber"));

        assert!(t.acknowledge().is_some());
        assert!(t.pending().is_none());
    }

    #[test]
    fn server_sync_is_ground_truth_and_detects_missed_level_ups() {
        let mut t = tracker_at(1, 90, 100);
        let server = LevelInfo {
            current_level: 3,
            current_xp: 10,
            xp_to_next_level: 300,
            total_xp: 310,
            unlocked_plants: BTreeSet::from([
                "carrot".to_string(),
                "tomato".to_string(),
                "cucumber".to_string(),
            ]),
            unlocked_features: BTreeSet::from(["selling".to_string()]),
        };
        t.sync_from_server(server.clone());

        assert_eq!(t.info().current_level, 3);
        assert_eq!(t.info().current_xp, 10);
        let ev = t.pending().unwrap();
        assert_eq!((ev.old_level, ev.new_level), (1, 3));
        assert!(ev.unlocked_plants.contains("tomato"));
    }
}
