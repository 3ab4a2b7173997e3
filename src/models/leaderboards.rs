use serde::Serialize;

pub const LEADERBOARD_SIZE: i64 = 1000;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct RankedUser {
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub balance: i64,
    pub rank: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct OverallRank {
    pub username: String,
    pub first_name: String,
    pub balance: i64,
    pub rank: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct OverallLeaderboard {
    pub leaderboard: Vec<RankedUser>,
    pub user_details: OverallRank,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ReferralRankedUser {
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub referred_points: i64,
    pub rank: i64,
    pub referral_count: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ReferralRank {
    pub username: String,
    pub first_name: String,
    pub referred_points: i64,
    pub rank: i64,
    pub referral_count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferralLeaderboard {
    pub leaderboard: Vec<ReferralRankedUser>,
    pub user_details: ReferralRank,
}
