use anyhow::bail;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::Rejection;
use crate::models::{
    rules::{self, Rule},
    users::{LoginRequest, OwnedCard, User},
};

pub const BALANCE_LIMIT_MESSAGE: &str = "Balance limit reached.";

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Returns the user and whether it was created by this call.
    pub async fn login_or_create(
        &self,
        login: &LoginRequest,
    ) -> Result<(User, bool), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let inserted = sqlx::query_as::<_, User>(
            r#"
                INSERT INTO users (telegram_id, username, first_name, referred_by)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (telegram_id) DO NOTHING
                RETURNING *
            "#,
        )
        .bind(login.telegram_id)
        .bind(login.username.as_deref().unwrap_or_default())
        .bind(login.first_name.as_deref().unwrap_or_default())
        .bind(login.referred_by)
        .fetch_optional(&mut *tx)
        .await?;

        let (user, created) = match inserted {
            Some(user) => {
                if let Some(referrer) = user.referred_by.filter(|r| *r != user.telegram_id) {
                    credit_referrer(&mut tx, referrer).await?;
                }
                (user, true)
            }
            None => {
                let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = $1")
                    .bind(login.telegram_id)
                    .fetch_one(&mut *tx)
                    .await?;
                (user, false)
            }
        };

        tx.commit().await?;

        Ok((user, created))
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_telegram_id(
        &self,
        telegram_id: i64,
    ) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 ORDER BY id LIMIT 1",
        )
        .bind(username)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    /// Stores a new session and drops the user's expired ones.
    pub async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let pruned = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND expires_at <= NOW()")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if pruned.rows_affected() > 0 {
            log::debug!(
                "Pruned {} expired sessions of user {}.",
                pruned.rows_affected(),
                user_id
            );
        }

        Ok(())
    }

    pub async fn get_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
                SELECT u.* FROM sessions s
                JOIN users u ON u.id = s.user_id
                WHERE s.token_hash = $1 AND s.expires_at > $2 AND u.is_active
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    pub async fn owned_cards(&self, user_id: i64) -> Result<Vec<OwnedCard>, anyhow::Error> {
        let cards = sqlx::query_as::<_, OwnedCard>(
            r#"
                SELECT c.name, ucc.card_level, ucc.date_claimed, cd.automine_points
                FROM user_card_claims ucc
                JOIN cards c ON c.id = ucc.card_id
                LEFT JOIN card_details cd
                    ON cd.card_id = ucc.card_id AND cd.level_number = ucc.card_level
                WHERE ucc.user_id = $1
                ORDER BY ucc.date_claimed
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(cards)
    }

    pub async fn claim_welcome_bonus(
        &self,
        user_id: i64,
        bonus: i64,
    ) -> Result<User, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let user = lock_user(&mut tx, user_id).await?;
        if user.welcome_bonus {
            bail!(Rejection::general("Welcome Bonus already claimed."));
        }

        credit_balance(&mut tx, user_id, bonus).await?;
        sqlx::query("UPDATE users SET welcome_bonus = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        refresh_level(&mut tx, user_id).await?;
        let user = fetch_user(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(user)
    }

    pub async fn update_religion(
        &self,
        user_id: i64,
        religion: Option<&str>,
    ) -> Result<User, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET religion = $2 WHERE id = $1 RETURNING *",
        )
        .bind(user_id)
        .bind(religion)
        .fetch_one(&self.conn)
        .await?;

        Ok(user)
    }

    /// Replaces the balance with a strictly larger amount.
    pub async fn raise_balance(&self, user_id: i64, amount: i64) -> Result<User, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let updated = sqlx::query("UPDATE users SET balance = $2 WHERE id = $1 AND balance < $2")
            .bind(user_id)
            .bind(amount)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            bail!(Rejection::general(
                "Updated amount should be greater than the current balance."
            ));
        }

        refresh_level(&mut tx, user_id).await?;
        let user = fetch_user(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(user)
    }

    pub async fn credit_points(&self, user_id: i64, points: i64) -> Result<User, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        credit_balance(&mut tx, user_id, points).await?;
        refresh_level(&mut tx, user_id).await?;
        let user = fetch_user(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Creates a staff account or promotes an existing user, replacing its password.
    pub async fn upsert_admin(
        &self,
        telegram_id: i64,
        username: &str,
        password_hash: &str,
    ) -> Result<User, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
                INSERT INTO users (telegram_id, username, is_staff, password_hash)
                VALUES ($1, $2, TRUE, $3)
                ON CONFLICT (telegram_id)
                DO UPDATE SET is_staff = TRUE, password_hash = EXCLUDED.password_hash
                RETURNING *
            "#,
        )
        .bind(telegram_id)
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.conn)
        .await?;

        Ok(user)
    }
}

pub(crate) async fn fetch_user(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<User, anyhow::Error> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(user)
}

/// Locks the user row for the rest of the transaction.
pub(crate) async fn lock_user(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<User, anyhow::Error> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(user)
}

/// Adds a non-negative amount, rejecting credits that would overflow the balance.
pub(crate) async fn credit_balance(
    conn: &mut PgConnection,
    user_id: i64,
    amount: i64,
) -> Result<(), anyhow::Error> {
    let updated = sqlx::query(
        r#"
            UPDATE users SET balance = balance + $2
            WHERE id = $1 AND balance <= 9223372036854775807 - $2
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        log::warn!("Credit of {} would overflow the balance of user {}.", amount, user_id);
        bail!(Rejection::general(BALANCE_LIMIT_MESSAGE));
    }

    Ok(())
}

/// Debits only when the balance covers the amount.
pub(crate) async fn debit_balance(
    conn: &mut PgConnection,
    user_id: i64,
    amount: i64,
) -> Result<bool, anyhow::Error> {
    let updated = sqlx::query(
        "UPDATE users SET balance = balance - $2 WHERE id = $1 AND balance >= $2",
    )
    .bind(user_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;

    Ok(updated.rows_affected() == 1)
}

/// Re-evaluates the user's level against the rules table after a balance change.
pub(crate) async fn refresh_level(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<(), anyhow::Error> {
    let (balance, level_number): (i64, i32) =
        sqlx::query_as("SELECT balance, level_number FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

    let rule = sqlx::query_as::<_, Rule>(
        r#"
            SELECT * FROM rules
            WHERE lower_points <= $1 AND higher_points >= $1
            ORDER BY id
            LIMIT 1
        "#,
    )
    .bind(balance)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(rule) = rules::promote(level_number, balance, rule.as_ref()) {
        sqlx::query("UPDATE users SET level_number = $2, level_name = $3 WHERE id = $1")
            .bind(user_id)
            .bind(rule.level_number)
            .bind(&rule.level_name)
            .execute(&mut *conn)
            .await?;

        log::info!(
            "User {} promoted from level {} to {} ({}).",
            user_id,
            level_number,
            rule.level_number,
            rule.level_name
        );
    }

    Ok(())
}

/// Pays the signup reward configured for the referrer's level, if any. A reward that
/// would overflow the referrer's totals is skipped so the signup still goes through.
async fn credit_referrer(
    conn: &mut PgConnection,
    referrer_telegram_id: i64,
) -> Result<(), anyhow::Error> {
    let referrer = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE telegram_id = $1 FOR UPDATE",
    )
    .bind(referrer_telegram_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(referrer) = referrer else {
        log::warn!("Referrer {} not found, skipping reward.", referrer_telegram_id);
        return Ok(());
    };

    let reward_amount: Option<i64> =
        sqlx::query_scalar("SELECT reward_amount FROM referral_rewards WHERE level_number = $1")
            .bind(referrer.level_number)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(reward_amount) = reward_amount else {
        log::warn!(
            "No referral reward configured for level {}.",
            referrer.level_number
        );
        return Ok(());
    };

    let updated = sqlx::query(
        r#"
            UPDATE users
            SET referred_points = referred_points + $2, balance = balance + $2
            WHERE id = $1
                AND balance <= 9223372036854775807 - $2
                AND referred_points <= 9223372036854775807 - $2
        "#,
    )
    .bind(referrer.id)
    .bind(reward_amount)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        log::warn!(
            "Referral reward of {} would overflow user {}, skipping.",
            reward_amount,
            referrer.telegram_id
        );
        return Ok(());
    }

    refresh_level(conn, referrer.id).await?;

    log::info!(
        "Credited referral reward of {} to user {}.",
        reward_amount,
        referrer.telegram_id
    );

    Ok(())
}
