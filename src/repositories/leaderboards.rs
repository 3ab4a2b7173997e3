use sqlx::PgPool;

use crate::models::leaderboards::{
    OverallRank, RankedUser, ReferralRank, ReferralRankedUser, LEADERBOARD_SIZE,
};

#[derive(Clone)]
pub struct LeaderboardRepository {
    conn: PgPool,
}

impl LeaderboardRepository {
    pub fn new(conn: PgPool) -> Self {
        LeaderboardRepository { conn }
    }

    pub async fn overall(&self) -> Result<Vec<RankedUser>, anyhow::Error> {
        let leaderboard = sqlx::query_as::<_, RankedUser>(
            r#"
                SELECT telegram_id, username, first_name, balance,
                    DENSE_RANK() OVER (
                        ORDER BY balance DESC, referred_points DESC, date_joined ASC
                    ) AS rank
                FROM users
                ORDER BY rank
                LIMIT $1
            "#,
        )
        .bind(LEADERBOARD_SIZE)
        .fetch_all(&self.conn)
        .await?;

        Ok(leaderboard)
    }

    pub async fn overall_rank(
        &self,
        telegram_id: i64,
    ) -> Result<Option<OverallRank>, anyhow::Error> {
        let rank = sqlx::query_as::<_, OverallRank>(
            r#"
                WITH ranked_users AS (
                    SELECT telegram_id, username, first_name, balance,
                        DENSE_RANK() OVER (
                            ORDER BY balance DESC, referred_points DESC, date_joined ASC
                        ) AS rank
                    FROM users
                )
                SELECT username, first_name, balance, rank
                FROM ranked_users
                WHERE telegram_id = $1
            "#,
        )
        .bind(telegram_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(rank)
    }

    pub async fn referral(&self) -> Result<Vec<ReferralRankedUser>, anyhow::Error> {
        let leaderboard = sqlx::query_as::<_, ReferralRankedUser>(
            r#"
                SELECT u.telegram_id, u.username, u.first_name, u.referred_points,
                    DENSE_RANK() OVER (ORDER BY u.referred_points DESC) AS rank,
                    (
                        SELECT COUNT(*) FROM users r WHERE r.referred_by = u.telegram_id
                    ) AS referral_count
                FROM users u
                ORDER BY rank
                LIMIT $1
            "#,
        )
        .bind(LEADERBOARD_SIZE)
        .fetch_all(&self.conn)
        .await?;

        Ok(leaderboard)
    }

    pub async fn referral_rank(
        &self,
        telegram_id: i64,
    ) -> Result<Option<ReferralRank>, anyhow::Error> {
        let rank = sqlx::query_as::<_, ReferralRank>(
            r#"
                WITH ranked_users AS (
                    SELECT telegram_id, username, first_name, referred_points,
                        DENSE_RANK() OVER (ORDER BY referred_points DESC) AS rank
                    FROM users
                )
                SELECT ru.username, ru.first_name, ru.referred_points, ru.rank,
                    (
                        SELECT COUNT(*) FROM users r WHERE r.referred_by = ru.telegram_id
                    ) AS referral_count
                FROM ranked_users ru
                WHERE ru.telegram_id = $1
            "#,
        )
        .bind(telegram_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(rank)
    }

    /// Users referred by `telegram_id`, ranked by balance.
    pub async fn referred_by(&self, telegram_id: i64) -> Result<Vec<RankedUser>, anyhow::Error> {
        let leaderboard = sqlx::query_as::<_, RankedUser>(
            r#"
                SELECT telegram_id, username, first_name, balance,
                    DENSE_RANK() OVER (ORDER BY balance DESC) AS rank
                FROM users
                WHERE referred_by = $1
                ORDER BY rank
            "#,
        )
        .bind(telegram_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(leaderboard)
    }
}
