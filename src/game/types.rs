//! Wire types returned by the game backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account state from `/user/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// Current token balance.
    pub tokens: f64,

    /// Fields the bot does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Claim timing and levels from `/user/farm`.
///
/// Upgrade endpoints answer with the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmInfo {
    #[serde(default)]
    pub last_claim: Option<String>,

    /// Cooldown between claims, in milliseconds.
    #[serde(default)]
    pub claim_interval: Option<i64>,

    /// Absent when the backend omits it; upgrades are skipped then.
    #[serde(default)]
    pub workbench_level: Option<u32>,

    #[serde(default)]
    pub toolkit_level: Option<u32>,
}

impl FarmInfo {
    /// Parses `lastClaim`; timestamps without an offset are taken as UTC.
    #[must_use]
    pub fn last_claim_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_claim.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }

        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}

/// Result of `/user/claim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimInfo {
    pub tokens: f64,
}

/// One row of a workbench or toolkit price table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelPrice {
    pub level: u32,
    pub price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let profile: ProfileInfo =
            serde_json::from_str(r#"{"tokens": 12.5, "id": 7, "name": "ann"}"#).unwrap();
        assert!((profile.tokens - 12.5).abs() < f64::EPSILON);
        assert_eq!(profile.extra.len(), 2);
    }

    #[test]
    fn test_farm_from_camel_case() {
        let farm: FarmInfo = serde_json::from_str(
            r#"{"lastClaim": "2024-05-01T10:00:00.000Z", "claimInterval": 3600000,
                "workbenchLevel": 2, "toolkitLevel": 3, "tokens": 1}"#,
        )
        .unwrap();
        assert_eq!(farm.claim_interval, Some(3_600_000));
        assert_eq!(farm.workbench_level, Some(2));
        assert_eq!(farm.toolkit_level, Some(3));
        assert_eq!(
            farm.last_claim_at().unwrap().to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_farm_missing_fields() {
        let farm: FarmInfo = serde_json::from_str("{}").unwrap();
        assert!(farm.last_claim.is_none());
        assert!(farm.claim_interval.is_none());
        assert!(farm.workbench_level.is_none());
        assert!(farm.toolkit_level.is_none());
        assert!(farm.last_claim_at().is_none());
    }

    #[test]
    fn test_naive_last_claim_is_utc() {
        let farm = FarmInfo {
            last_claim: Some("2024-05-01T10:00:00.123".to_owned()),
            ..FarmInfo::default()
        };
        assert_eq!(
            farm.last_claim_at().unwrap().timestamp_millis(),
            1_714_557_600_123
        );
    }

    #[test]
    fn test_garbage_last_claim() {
        let farm = FarmInfo {
            last_claim: Some("yesterday".to_owned()),
            ..FarmInfo::default()
        };
        assert!(farm.last_claim_at().is_none());
    }
}
