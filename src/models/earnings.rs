use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MULTITAP_REASON: &str = "Mutitap Increase";
pub const RECHARGING_SPEED_REASON: &str = "Recharging Speed Increase";
pub const AUTOBOT_REASON: &str = "Auto Pray";

/// Upgrades are bought while the current level is at or below this value.
pub const MAX_UPGRADE_LEVEL: i32 = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "CREDIT",
            TransactionType::Debit => "DEBIT",
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Earning {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub transaction_type: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewEarning {
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Upgrades {
    pub multitap_level: i32,
    pub recharging_speed_level: i32,
    pub autobot_status: bool,
}

/// What recording an earning does to the owner's account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EarningEffect {
    Credit(i64),
    Multitap(i64),
    RechargingSpeed(i64),
    Autobot(i64),
    Nothing,
}

impl EarningEffect {
    /// Signed change to the balance.
    pub fn balance_delta(&self) -> i64 {
        match *self {
            EarningEffect::Credit(amount) => amount,
            EarningEffect::Multitap(amount)
            | EarningEffect::RechargingSpeed(amount)
            | EarningEffect::Autobot(amount) => -amount,
            EarningEffect::Nothing => 0,
        }
    }
}

/// Debits only move the balance when the reason names an upgrade that can still be bought.
pub fn earning_effect(earning: &NewEarning, upgrades: &Upgrades) -> EarningEffect {
    match earning.transaction_type {
        TransactionType::Credit => EarningEffect::Credit(earning.amount),
        TransactionType::Debit => match earning.reason.as_str() {
            MULTITAP_REASON if upgrades.multitap_level <= MAX_UPGRADE_LEVEL => {
                EarningEffect::Multitap(earning.amount)
            }
            RECHARGING_SPEED_REASON if upgrades.recharging_speed_level <= MAX_UPGRADE_LEVEL => {
                EarningEffect::RechargingSpeed(earning.amount)
            }
            AUTOBOT_REASON if !upgrades.autobot_status => EarningEffect::Autobot(earning.amount),
            _ => EarningEffect::Nothing,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debit(amount: i64, reason: &str) -> NewEarning {
        NewEarning {
            amount,
            transaction_type: TransactionType::Debit,
            reason: reason.to_string(),
        }
    }

    fn fresh() -> Upgrades {
        Upgrades {
            multitap_level: 0,
            recharging_speed_level: 0,
            autobot_status: false,
        }
    }

    #[test]
    fn test_credit_adds_amount() {
        let earning = NewEarning {
            amount: 250,
            transaction_type: TransactionType::Credit,
            reason: "Tap".to_string(),
        };
        let effect = earning_effect(&earning, &fresh());
        assert_eq!(effect, EarningEffect::Credit(250));
        assert_eq!(effect.balance_delta(), 250);
    }

    #[test]
    fn test_debit_buys_multitap_until_cap() {
        let mut upgrades = fresh();
        upgrades.multitap_level = MAX_UPGRADE_LEVEL;
        assert_eq!(
            earning_effect(&debit(100, MULTITAP_REASON), &upgrades),
            EarningEffect::Multitap(100)
        );

        upgrades.multitap_level = MAX_UPGRADE_LEVEL + 1;
        assert_eq!(
            earning_effect(&debit(100, MULTITAP_REASON), &upgrades),
            EarningEffect::Nothing
        );
    }

    #[test]
    fn test_debit_buys_recharging_speed() {
        let effect = earning_effect(&debit(40, RECHARGING_SPEED_REASON), &fresh());
        assert_eq!(effect, EarningEffect::RechargingSpeed(40));
        assert_eq!(effect.balance_delta(), -40);
    }

    #[test]
    fn test_autobot_is_bought_once() {
        let mut upgrades = fresh();
        assert_eq!(
            earning_effect(&debit(5_000, AUTOBOT_REASON), &upgrades),
            EarningEffect::Autobot(5_000)
        );

        upgrades.autobot_status = true;
        assert_eq!(
            earning_effect(&debit(5_000, AUTOBOT_REASON), &upgrades),
            EarningEffect::Nothing
        );
    }

    #[test]
    fn test_unknown_debit_reason_leaves_balance() {
        let effect = earning_effect(&debit(10, "Something else"), &fresh());
        assert_eq!(effect, EarningEffect::Nothing);
        assert_eq!(effect.balance_delta(), 0);
    }

    #[test]
    fn test_transaction_type_wire_format() {
        let earning: NewEarning = serde_json::from_str(
            r#"{"amount": 10, "transaction_type": "DEBIT", "reason": "Auto Pray"}"#,
        )
        .unwrap();
        assert_eq!(earning.transaction_type, TransactionType::Debit);
        assert_eq!(TransactionType::Credit.as_str(), "CREDIT");
    }
}
