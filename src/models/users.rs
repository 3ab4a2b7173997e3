use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for a requested balance and for any single credit.
pub const MAX_POINTS: i64 = 1_000_000_000_000_000;

/// Column width of `username` and `first_name`.
pub const MAX_NAME_LENGTH: usize = 100;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub referred_by: Option<i64>,
    pub referred_points: i64,
    pub balance: i64,
    pub level_number: i32,
    pub level_name: String,
    pub welcome_bonus: bool,
    pub multitap_level: i32,
    pub recharging_speed_level: i32,
    pub autobot_status: bool,
    pub religion: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub date_joined: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Religion {
    Islamic,
    Buddhism,
    Christianity,
    Sikhism,
    Judaism,
    Hindu,
    Mothernature,
    Unaffiliated,
}

impl Religion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Religion::Islamic => "Islamic",
            Religion::Buddhism => "Buddhism",
            Religion::Christianity => "Christianity",
            Religion::Sikhism => "Sikhism",
            Religion::Judaism => "Judaism",
            Religion::Hindu => "Hindu",
            Religion::Mothernature => "Mothernature",
            Religion::Unaffiliated => "Unaffiliated",
        }
    }
}

impl FromStr for Religion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Islamic" => Ok(Religion::Islamic),
            "Buddhism" => Ok(Religion::Buddhism),
            "Christianity" => Ok(Religion::Christianity),
            "Sikhism" => Ok(Religion::Sikhism),
            "Judaism" => Ok(Religion::Judaism),
            "Hindu" => Ok(Religion::Hindu),
            "Mothernature" => Ok(Religion::Mothernature),
            "Unaffiliated" => Ok(Religion::Unaffiliated),
            other => Err(format!("\"{other}\" is not a valid choice.")),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub referred_by: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub telegram_id: i64,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AccessToken {
    pub access: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateBalance {
    pub amount: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateReligion {
    pub user_religion: Option<String>,
}

impl UpdateReligion {
    /// `null` clears the choice.
    pub fn religion(&self) -> Result<Option<Religion>, String> {
        self.user_religion.as_deref().map(str::parse).transpose()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdminCreditPoints {
    pub telegram_id: Option<i64>,
    pub username: Option<String>,
    pub points: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub level_number: i32,
    pub level_name: String,
    pub balance: i64,
}

impl From<&User> for BalanceSummary {
    fn from(user: &User) -> Self {
        BalanceSummary {
            level_number: user.level_number,
            level_name: user.level_name.clone(),
            balance: user.balance,
        }
    }
}

/// A claimed card with the yield of the level it currently sits at.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OwnedCard {
    pub name: String,
    pub card_level: i32,
    pub date_claimed: DateTime<Utc>,
    pub automine_points: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserDetails {
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub balance: i64,
    pub level_number: i32,
    pub level_name: String,
    pub welcome_bonus: bool,
    pub multitap_level: i32,
    pub recharging_speed_level: i32,
    pub autobot_status: bool,
    pub user_cards: Vec<OwnedCard>,
    pub user_religion: Option<String>,
}

impl UserDetails {
    pub fn new(user: User, user_cards: Vec<OwnedCard>) -> Self {
        UserDetails {
            telegram_id: user.telegram_id,
            username: user.username,
            first_name: user.first_name,
            balance: user.balance,
            level_number: user.level_number,
            level_name: user.level_name,
            welcome_bonus: user.welcome_bonus,
            multitap_level: user.multitap_level,
            recharging_speed_level: user.recharging_speed_level,
            autobot_status: user.autobot_status,
            user_cards,
            user_religion: user.religion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_religion_round_trips_through_str() {
        for religion in [
            Religion::Islamic,
            Religion::Buddhism,
            Religion::Christianity,
            Religion::Sikhism,
            Religion::Judaism,
            Religion::Hindu,
            Religion::Mothernature,
            Religion::Unaffiliated,
        ] {
            assert_eq!(religion.as_str().parse::<Religion>(), Ok(religion));
        }
    }

    #[test]
    fn test_unknown_religion_is_rejected() {
        let err = "Pastafarian".parse::<Religion>().unwrap_err();
        assert_eq!(err, "\"Pastafarian\" is not a valid choice.");
    }

    #[test]
    fn test_update_religion_accepts_null() {
        let update: UpdateReligion = serde_json::from_str(r#"{"user_religion": null}"#).unwrap();
        assert_eq!(update.religion(), Ok(None));

        let update: UpdateReligion =
            serde_json::from_str(r#"{"user_religion": "Hindu"}"#).unwrap();
        assert_eq!(update.religion(), Ok(Some(Religion::Hindu)));

        let update: UpdateReligion =
            serde_json::from_str(r#"{"user_religion": "Jedi"}"#).unwrap();
        assert!(update.religion().is_err());
    }
}
