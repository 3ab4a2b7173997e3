use axum::{extract::State, http::StatusCode, Json};

use super::{auth::AuthUser, AppState, Payload};
use crate::{
    models::earnings::{Earning, NewEarning},
    services::{call, earnings::EarningRequest, ServiceError},
};

pub async fn record_earning(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(earning): Payload<NewEarning>,
) -> Result<(StatusCode, Json<Earning>), ServiceError> {
    let recorded = call(&state.earning_channel, "Earning", |response| {
        EarningRequest::Record {
            user_id: user.id,
            earning,
            response,
        }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(recorded)))
}
