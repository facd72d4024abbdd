//! Claim and upgrade rules.
//!
//! Everything here is pure: time is passed in by the `*_at` variants and
//! the level tables come from the current cycle.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::MinerSettings;
use crate::game::{FarmInfo, LevelPrice};

/// Moment the next claim becomes available, if the farm reports one.
fn claim_due_at(farm: &FarmInfo) -> Option<DateTime<Utc>> {
    let last_claim = farm.last_claim_at()?;
    let interval_ms = farm.claim_interval.filter(|ms| *ms >= 0)?;
    last_claim.checked_add_signed(TimeDelta::milliseconds(interval_ms))
}

/// Whether the claim cooldown has elapsed.
#[must_use]
pub fn is_claim_possible(farm: Option<&FarmInfo>) -> bool {
    is_claim_possible_at(farm, Utc::now())
}

#[must_use]
pub fn is_claim_possible_at(farm: Option<&FarmInfo>, now: DateTime<Utc>) -> bool {
    farm.and_then(claim_due_at).is_some_and(|due| now >= due)
}

/// Time to sleep until the next claim, or `default` when unknown or overdue.
#[must_use]
pub fn sleep_time_to_claim(farm: Option<&FarmInfo>, default: Duration) -> Duration {
    sleep_time_to_claim_at(farm, default, Utc::now())
}

#[must_use]
pub fn sleep_time_to_claim_at(
    farm: Option<&FarmInfo>,
    default: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let Some(due) = farm.and_then(claim_due_at) else {
        return default;
    };

    // Whole seconds, truncated toward zero.
    let remaining = (due - now).num_seconds();
    u64::try_from(remaining).map_or(default, Duration::from_secs)
}

/// Price of a level according to a settings table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpgradePrice {
    /// The table is empty: the settings could not be loaded.
    NotConfigured,
    /// No row for the requested level: the track is maxed out.
    MaxLevelReached,
    Price(f64),
}

/// Looks up the exact `level` in `table`.
#[must_use]
pub fn upgrade_price(table: &[LevelPrice], level: u32) -> UpgradePrice {
    if table.is_empty() {
        return UpgradePrice::NotConfigured;
    }

    table
        .iter()
        .find(|row| row.level == level)
        .map_or(UpgradePrice::MaxLevelReached, |row| UpgradePrice::Price(row.price))
}

/// Price tables downloaded at the start of a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelTables {
    pub workbench: Vec<LevelPrice>,
    pub toolkit: Vec<LevelPrice>,
}

impl LevelTables {
    #[must_use]
    pub fn speed_upgrade_price(&self, level: u32) -> UpgradePrice {
        upgrade_price(&self.workbench, level)
    }

    #[must_use]
    pub fn storage_upgrade_price(&self, level: u32) -> UpgradePrice {
        upgrade_price(&self.toolkit, level)
    }
}

/// The two independent upgrade tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeTrack {
    /// Workbench: farming speed.
    Speed,
    /// Toolkit: storage capacity.
    Storage,
}

impl UpgradeTrack {
    pub const ALL: [Self; 2] = [Self::Speed, Self::Storage];

    #[must_use]
    pub const fn level(self, farm: &FarmInfo) -> Option<u32> {
        match self {
            Self::Speed => farm.workbench_level,
            Self::Storage => farm.toolkit_level,
        }
    }

    #[must_use]
    pub const fn enabled(self, settings: &MinerSettings) -> bool {
        match self {
            Self::Speed => settings.upgrade_speed,
            Self::Storage => settings.upgrade_storage,
        }
    }

    #[must_use]
    pub const fn max_level(self, settings: &MinerSettings) -> u32 {
        match self {
            Self::Speed => settings.speed_max_level,
            Self::Storage => settings.storage_max_level,
        }
    }

    #[must_use]
    pub fn price(self, tables: &LevelTables, level: u32) -> UpgradePrice {
        match self {
            Self::Speed => tables.speed_upgrade_price(level),
            Self::Storage => tables.storage_upgrade_price(level),
        }
    }
}

impl fmt::Display for UpgradeTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Speed => write!(f, "Speed (workbench)"),
            Self::Storage => write!(f, "Storage (toolkit)"),
        }
    }
}

/// What to do about one track this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpgradeDecision {
    Disabled,
    /// The farm did not report the current level.
    LevelUnknown,
    /// The next level is above the configured cap.
    CappedBySettings,
    NotConfigured,
    MaxLevelReached,
    InsufficientFunds { price: f64 },
    Upgrade { level: u32, price: f64 },
}

/// Decides whether `track` should be upgraded with the given balance.
#[must_use]
pub fn decide_upgrade(
    track: UpgradeTrack,
    farm: &FarmInfo,
    tables: &LevelTables,
    balance: f64,
    settings: &MinerSettings,
) -> UpgradeDecision {
    if !track.enabled(settings) {
        return UpgradeDecision::Disabled;
    }

    let Some(level) = track.level(farm) else {
        return UpgradeDecision::LevelUnknown;
    };

    let next_level = level.saturating_add(1);
    if next_level > track.max_level(settings) {
        return UpgradeDecision::CappedBySettings;
    }

    match track.price(tables, next_level) {
        UpgradePrice::NotConfigured => UpgradeDecision::NotConfigured,
        UpgradePrice::MaxLevelReached => UpgradeDecision::MaxLevelReached,
        UpgradePrice::Price(price) if balance >= price => UpgradeDecision::Upgrade {
            level: next_level,
            price,
        },
        UpgradePrice::Price(price) => UpgradeDecision::InsufficientFunds { price },
    }
}
