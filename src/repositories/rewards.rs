use anyhow::bail;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};

use super::{
    users::{credit_balance, lock_user, refresh_level},
    Rejection,
};
use crate::models::{
    boosters::{self, BoosterClaim, BoosterType},
    rewards::{ClaimedDailyReward, DailyReward, DailyStreak, CLAIM_TIME_FORMAT},
};

#[derive(Clone)]
pub struct RewardRepository {
    conn: PgPool,
}

impl RewardRepository {
    pub fn new(conn: PgPool) -> Self {
        RewardRepository { conn }
    }

    pub async fn schedule(&self) -> Result<Vec<DailyReward>, anyhow::Error> {
        let schedule = sqlx::query_as::<_, DailyReward>(
            "SELECT day, points FROM daily_rewards ORDER BY day",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(schedule)
    }

    /// The user's streak, created on first use and reset when a day was missed.
    pub async fn current_streak(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<DailyStreak, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let mut streak = lock_streak(&mut tx, user_id).await?;
        if streak.expire(now) {
            save_streak(&mut tx, user_id, &streak).await?;
            log::info!("Daily reward streak of user {} was reset.", user_id);
        }

        tx.commit().await?;

        Ok(streak)
    }

    pub async fn claim_daily(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ClaimedDailyReward, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        lock_user(&mut tx, user_id).await?;
        let mut streak = lock_streak(&mut tx, user_id).await?;
        streak.expire(now);

        if !streak.can_claim(now) {
            let wait_until = streak
                .next_claim_time()
                .map(|at| at.format(CLAIM_TIME_FORMAT).to_string())
                .unwrap_or_default();
            bail!(Rejection::general(format!(
                "You cannot claim your reward yet. Please wait until {wait_until}"
            )));
        }

        let Some(claimed_points) = reward_points(&mut tx, streak.current_day).await? else {
            bail!(Rejection::general("Invalid reward configuration."));
        };

        streak.advance(now);
        save_streak(&mut tx, user_id, &streak).await?;

        credit_balance(&mut tx, user_id, claimed_points).await?;
        refresh_level(&mut tx, user_id).await?;

        let next_points = reward_points(&mut tx, streak.current_day).await?;
        tx.commit().await?;

        Ok(ClaimedDailyReward {
            current_day: streak.current_day,
            last_claimed_at: streak.last_claimed_at,
            claimed_points,
            reward_points: next_points,
        })
    }

    pub async fn recent_boosters(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<BoosterClaim>, anyhow::Error> {
        let claims = sqlx::query_as::<_, BoosterClaim>(
            r#"
                SELECT * FROM booster_claims
                WHERE user_id = $1 AND claim_at >= $2
                ORDER BY claim_at
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.conn)
        .await?;

        Ok(claims)
    }

    pub async fn claim_booster(
        &self,
        user_id: i64,
        claim_type: BoosterType,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<BoosterClaim, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        lock_user(&mut tx, user_id).await?;

        let last_claim_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(claim_at) FROM booster_claims WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        if boosters::is_cooling_down(last_claim_at, now, cooldown) {
            bail!(Rejection::general(format!(
                "You can only claim once every {} minutes.",
                cooldown.num_minutes()
            )));
        }

        let claim = sqlx::query_as::<_, BoosterClaim>(
            r#"
                INSERT INTO booster_claims (user_id, claim_type, claim_at, end_time)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(claim_type.as_str())
        .bind(now)
        .bind(now + cooldown)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(claim)
    }
}

async fn lock_streak(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<DailyStreak, anyhow::Error> {
    sqlx::query(
        "INSERT INTO user_daily_rewards (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let streak = sqlx::query_as::<_, DailyStreak>(
        r#"
            SELECT current_day, last_claimed_at FROM user_daily_rewards
            WHERE user_id = $1
            FOR UPDATE
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(streak)
}

async fn save_streak(
    conn: &mut PgConnection,
    user_id: i64,
    streak: &DailyStreak,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        "UPDATE user_daily_rewards SET current_day = $2, last_claimed_at = $3 WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(streak.current_day)
    .bind(streak.last_claimed_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn reward_points(conn: &mut PgConnection, day: i32) -> Result<Option<i64>, anyhow::Error> {
    let points: Option<i64> = sqlx::query_scalar("SELECT points FROM daily_rewards WHERE day = $1")
        .bind(day)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(points)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::repositories::fixtures::{create_user, rejection_message};

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    async fn seed_schedule(pool: &PgPool) {
        for day in 1..=7 {
            sqlx::query("INSERT INTO daily_rewards (day, points) VALUES ($1, $2)")
                .bind(day)
                .bind(i64::from(day) * 100)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    async fn stored_streak(pool: &PgPool, user_id: i64) -> DailyStreak {
        sqlx::query_as::<_, DailyStreak>(
            "SELECT current_day, last_claimed_at FROM user_daily_rewards WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_daily_claims_advance_once_a_day(pool: PgPool) {
        seed_schedule(&pool).await;
        let repository = RewardRepository::new(pool.clone());
        let user = create_user(&pool, 3_000).await;
        let start = morning();

        let claimed = repository.claim_daily(user.id, start).await.unwrap();
        assert_eq!(claimed.claimed_points, 100);
        assert_eq!(claimed.current_day, 2);
        assert_eq!(claimed.reward_points, Some(200));

        let err = repository
            .claim_daily(user.id, start + Duration::hours(3))
            .await
            .unwrap_err();
        assert!(rejection_message(err).starts_with("You cannot claim your reward yet."));

        let claimed = repository
            .claim_daily(user.id, start + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(claimed.claimed_points, 200);
        assert_eq!(claimed.current_day, 3);

        let balance: i64 = sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(balance, 300);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_missed_day_reset_is_persisted(pool: PgPool) {
        seed_schedule(&pool).await;
        let repository = RewardRepository::new(pool.clone());
        let user = create_user(&pool, 3_001).await;
        let start = morning();

        repository.claim_daily(user.id, start).await.unwrap();
        assert_eq!(stored_streak(&pool, user.id).await.current_day, 2);

        let streak = repository
            .current_streak(user.id, start + Duration::days(3))
            .await
            .unwrap();
        assert_eq!(streak, DailyStreak::default());
        assert_eq!(stored_streak(&pool, user.id).await, DailyStreak::default());

        let claimed = repository
            .claim_daily(user.id, start + Duration::days(3))
            .await
            .unwrap();
        assert_eq!(claimed.claimed_points, 100);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_booster_respects_cooldown(pool: PgPool) {
        let repository = RewardRepository::new(pool.clone());
        let user = create_user(&pool, 3_002).await;
        let cooldown = Duration::minutes(60);
        let start = morning();

        let claim = repository
            .claim_booster(user.id, BoosterType::Energy, start, cooldown)
            .await
            .unwrap();
        assert_eq!(claim.end_time, start + cooldown);

        let err = repository
            .claim_booster(user.id, BoosterType::Power, start + Duration::minutes(59), cooldown)
            .await
            .unwrap_err();
        assert_eq!(
            rejection_message(err),
            "You can only claim once every 60 minutes."
        );

        repository
            .claim_booster(user.id, BoosterType::Power, start + Duration::minutes(61), cooldown)
            .await
            .unwrap();
        let claims = repository.recent_boosters(user.id, start).await.unwrap();
        assert_eq!(claims.len(), 2);
    }
}
