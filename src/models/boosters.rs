use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoosterType {
    Energy,
    Power,
}

impl BoosterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoosterType::Energy => "energy",
            BoosterType::Power => "power",
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct BoosterClaim {
    pub id: i64,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub claim_type: String,
    pub claim_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewBoosterClaim {
    pub claim_type: BoosterType,
}

/// Claims made at or after this instant still block a new one.
pub fn cooldown_start(now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
    now - cooldown
}

pub fn is_cooling_down(
    last_claim_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> bool {
    last_claim_at
        .map(|at| at >= cooldown_start(now, cooldown))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_window() {
        let now = Utc::now();
        let cooldown = Duration::hours(2);

        assert!(!is_cooling_down(None, now, cooldown));
        assert!(is_cooling_down(Some(now - Duration::minutes(119)), now, cooldown));
        assert!(is_cooling_down(Some(now - Duration::hours(2)), now, cooldown));
        assert!(!is_cooling_down(Some(now - Duration::minutes(121)), now, cooldown));
    }

    #[test]
    fn test_claim_type_wire_format() {
        let claim: NewBoosterClaim = serde_json::from_str(r#"{"claim_type": "energy"}"#).unwrap();
        assert_eq!(claim.claim_type, BoosterType::Energy);
        assert!(serde_json::from_str::<NewBoosterClaim>(r#"{"claim_type": "speed"}"#).is_err());
    }
}
