use axum::{
    extract::{Query, State},
    Json,
};

use super::{auth::AuthUser, AppState, Payload};
use crate::{
    models::cards::{CardLevelQuery, CardLevelView, CardView, ClaimCard, UpgradeCard},
    services::{call, cards::CardRequest, ServiceError},
};

pub async fn list_cards(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<CardView>>, ServiceError> {
    let cards = call(&state.card_channel, "Card", |response| CardRequest::List {
        user_id: user.id,
        response,
    })
    .await?;

    Ok(Json(cards))
}

pub async fn claim_card(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(claim): Payload<ClaimCard>,
) -> Result<Json<CardView>, ServiceError> {
    let card = call(&state.card_channel, "Card", |response| CardRequest::Claim {
        user_id: user.id,
        card_id: claim.id,
        response,
    })
    .await?;

    Ok(Json(card))
}

pub async fn upgrade_card(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(upgrade): Payload<UpgradeCard>,
) -> Result<Json<CardView>, ServiceError> {
    let card = call(&state.card_channel, "Card", |response| CardRequest::Upgrade {
        user_id: user.id,
        card_id: upgrade.id,
        response,
    })
    .await?;

    Ok(Json(card))
}

pub async fn card_details(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    Query(query): Query<CardLevelQuery>,
) -> Result<Json<CardLevelView>, ServiceError> {
    let details = call(&state.card_channel, "Card", |response| CardRequest::Details {
        query,
        response,
    })
    .await?;

    Ok(Json(details))
}
