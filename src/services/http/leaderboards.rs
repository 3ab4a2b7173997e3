use axum::{extract::State, Json};

use super::{auth::AuthUser, AppState};
use crate::{
    models::leaderboards::{OverallLeaderboard, RankedUser, ReferralLeaderboard},
    services::{call, leaderboards::LeaderboardRequest, ServiceError},
};

pub async fn overall(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<OverallLeaderboard>, ServiceError> {
    let leaderboard = call(&state.leaderboard_channel, "Leaderboard", |response| {
        LeaderboardRequest::Overall {
            telegram_id: user.telegram_id,
            response,
        }
    })
    .await?;

    Ok(Json(leaderboard))
}

pub async fn referral(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ReferralLeaderboard>, ServiceError> {
    let leaderboard = call(&state.leaderboard_channel, "Leaderboard", |response| {
        LeaderboardRequest::Referral {
            telegram_id: user.telegram_id,
            response,
        }
    })
    .await?;

    Ok(Json(leaderboard))
}

pub async fn my_referrals(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<RankedUser>>, ServiceError> {
    let referrals = call(&state.leaderboard_channel, "Leaderboard", |response| {
        LeaderboardRequest::MyReferrals {
            telegram_id: user.telegram_id,
            response,
        }
    })
    .await?;

    Ok(Json(referrals))
}
