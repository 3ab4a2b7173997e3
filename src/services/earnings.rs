use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        earnings::{Earning, NewEarning},
        users::MAX_POINTS,
    },
    repositories::earnings::EarningRepository,
};

const MAX_REASON_LENGTH: usize = 255;

pub enum EarningRequest {
    Record {
        user_id: i64,
        earning: NewEarning,
        response: oneshot::Sender<Result<Earning, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct EarningRequestHandler {
    repository: EarningRepository,
}

impl EarningRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = EarningRepository::new(sql_conn);

        EarningRequestHandler { repository }
    }

    async fn record(&self, user_id: i64, earning: NewEarning) -> Result<Earning, ServiceError> {
        validate(&earning)?;

        Ok(self.repository.record(user_id, &earning).await?)
    }
}

fn validate(earning: &NewEarning) -> Result<(), ServiceError> {
    if earning.amount < 0 {
        return Err(ServiceError::validation(
            "amount",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    if earning.amount > MAX_POINTS {
        return Err(ServiceError::validation(
            "amount",
            format!("Ensure this value is less than or equal to {MAX_POINTS}."),
        ));
    }
    if earning.reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ServiceError::validation(
            "reason",
            format!("Ensure this field has no more than {MAX_REASON_LENGTH} characters."),
        ));
    }

    Ok(())
}

#[async_trait]
impl RequestHandler<EarningRequest> for EarningRequestHandler {
    async fn handle_request(&self, request: EarningRequest) {
        match request {
            EarningRequest::Record {
                user_id,
                earning,
                response,
            } => {
                let recorded = self.record(user_id, earning).await;
                let _ = response.send(recorded);
            }
        }
    }
}

pub struct EarningService;

impl EarningService {
    pub fn new() -> Self {
        EarningService {}
    }
}

#[async_trait]
impl Service<EarningRequest, EarningRequestHandler> for EarningService {}
