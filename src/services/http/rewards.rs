use axum::{extract::State, http::StatusCode, Json};

use super::{auth::AuthUser, AppState, Payload};
use crate::{
    models::{
        boosters::{BoosterClaim, NewBoosterClaim},
        rewards::{ClaimedDailyReward, DailyRewardView},
    },
    services::{call, rewards::RewardRequest, ServiceError},
};

pub async fn list_daily_rewards(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<DailyRewardView>>, ServiceError> {
    let rewards = call(&state.reward_channel, "Reward", |response| {
        RewardRequest::ListDaily {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(rewards))
}

pub async fn claim_daily_reward(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<ClaimedDailyReward>, ServiceError> {
    let claimed = call(&state.reward_channel, "Reward", |response| {
        RewardRequest::ClaimDaily {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(claimed))
}

pub async fn list_boosters(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<BoosterClaim>>, ServiceError> {
    let claims = call(&state.reward_channel, "Reward", |response| {
        RewardRequest::ListBoosters {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(claims))
}

pub async fn claim_booster(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(claim): Payload<NewBoosterClaim>,
) -> Result<(StatusCode, Json<BoosterClaim>), ServiceError> {
    let claim = call(&state.reward_channel, "Reward", |response| {
        RewardRequest::ClaimBooster {
            user_id: user.id,
            claim_type: claim.claim_type,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(claim)))
}
