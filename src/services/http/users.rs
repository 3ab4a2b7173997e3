use axum::{extract::State, Json};

use super::{auth::AuthUser, AppState, Payload};
use crate::{
    models::users::{
        AccessToken, BalanceSummary, LoginRequest, UpdateBalance, UpdateReligion, UserDetails,
    },
    services::{call, users::UserRequest, ServiceError},
};

pub async fn login(
    State(state): State<AppState>,
    Payload(login): Payload<LoginRequest>,
) -> Result<Json<AccessToken>, ServiceError> {
    let token = call(&state.user_channel, "User", |response| UserRequest::Login {
        login,
        response,
    })
    .await?;

    Ok(Json(token))
}

pub async fn user_details(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserDetails>, ServiceError> {
    let details = call(&state.user_channel, "User", |response| {
        UserRequest::GetDetails {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(details))
}

pub async fn claim_welcome_bonus(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<BalanceSummary>, ServiceError> {
    let summary = call(&state.user_channel, "User", |response| {
        UserRequest::ClaimWelcomeBonus {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(summary))
}

pub async fn update_religion(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(update): Payload<UpdateReligion>,
) -> Result<Json<UserDetails>, ServiceError> {
    let religion = update
        .religion()
        .map_err(|message| ServiceError::validation("user_religion", message))?;

    let details = call(&state.user_channel, "User", |response| {
        UserRequest::UpdateReligion {
            user_id: user.id,
            religion,
            response,
        }
    })
    .await?;

    Ok(Json(details))
}

pub async fn update_balance(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(update): Payload<UpdateBalance>,
) -> Result<Json<BalanceSummary>, ServiceError> {
    let summary = call(&state.user_channel, "User", |response| {
        UserRequest::UpdateBalance {
            user_id: user.id,
            amount: update.amount,
            response,
        }
    })
    .await?;

    Ok(Json(summary))
}
