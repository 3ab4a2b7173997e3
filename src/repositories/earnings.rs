use anyhow::bail;
use sqlx::PgPool;

use super::{
    users::{lock_user, refresh_level, BALANCE_LIMIT_MESSAGE},
    Rejection,
};
use crate::models::earnings::{
    earning_effect, Earning, EarningEffect, NewEarning, TransactionType, Upgrades,
};

#[derive(Clone)]
pub struct EarningRepository {
    conn: PgPool,
}

impl EarningRepository {
    pub fn new(conn: PgPool) -> Self {
        EarningRepository { conn }
    }

    /// Appends to the ledger and applies the earning to the owner's account.
    pub async fn record(
        &self,
        user_id: i64,
        earning: &NewEarning,
    ) -> Result<Earning, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let user = lock_user(&mut tx, user_id).await?;
        if earning.transaction_type == TransactionType::Debit && user.balance < earning.amount {
            bail!(Rejection::general("Insufficient Funds"));
        }

        let upgrades = Upgrades {
            multitap_level: user.multitap_level,
            recharging_speed_level: user.recharging_speed_level,
            autobot_status: user.autobot_status,
        };
        let effect = earning_effect(earning, &upgrades);

        let recorded = sqlx::query_as::<_, Earning>(
            r#"
                INSERT INTO earnings (user_id, amount, transaction_type, reason)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(earning.amount)
        .bind(earning.transaction_type.as_str())
        .bind(&earning.reason)
        .fetch_one(&mut *tx)
        .await?;

        let counter = match effect {
            EarningEffect::Multitap(_) => ", multitap_level = multitap_level + 1",
            EarningEffect::RechargingSpeed(_) => {
                ", recharging_speed_level = recharging_speed_level + 1"
            }
            EarningEffect::Autobot(_) => ", autobot_status = TRUE",
            EarningEffect::Credit(_) | EarningEffect::Nothing => "",
        };

        if effect != EarningEffect::Nothing {
            let updated = sqlx::query(&format!(
                r#"
                    UPDATE users SET balance = balance + $2{counter}
                    WHERE id = $1 AND balance::NUMERIC + $2 <= 9223372036854775807
                "#
            ))
            .bind(user_id)
            .bind(effect.balance_delta())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                bail!(Rejection::general(BALANCE_LIMIT_MESSAGE));
            }
        }

        refresh_level(&mut tx, user_id).await?;
        tx.commit().await?;

        log::debug!(
            "Recorded {} of {} for user {} ({:?}).",
            recorded.transaction_type,
            recorded.amount,
            user_id,
            effect
        );

        Ok(recorded)
    }
}
