use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::leaderboards::{OverallLeaderboard, RankedUser, ReferralLeaderboard},
    repositories::leaderboards::LeaderboardRepository,
};

pub enum LeaderboardRequest {
    Overall {
        telegram_id: i64,
        response: oneshot::Sender<Result<OverallLeaderboard, ServiceError>>,
    },
    Referral {
        telegram_id: i64,
        response: oneshot::Sender<Result<ReferralLeaderboard, ServiceError>>,
    },
    MyReferrals {
        telegram_id: i64,
        response: oneshot::Sender<Result<Vec<RankedUser>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct LeaderboardRequestHandler {
    repository: LeaderboardRepository,
}

impl LeaderboardRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = LeaderboardRepository::new(sql_conn);

        LeaderboardRequestHandler { repository }
    }

    async fn overall(&self, telegram_id: i64) -> Result<OverallLeaderboard, ServiceError> {
        let leaderboard = self.repository.overall().await?;
        let user_details = self
            .repository
            .overall_rank(telegram_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))?;

        Ok(OverallLeaderboard {
            leaderboard,
            user_details,
        })
    }

    async fn referral(&self, telegram_id: i64) -> Result<ReferralLeaderboard, ServiceError> {
        let leaderboard = self.repository.referral().await?;
        let user_details = self
            .repository
            .referral_rank(telegram_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))?;

        Ok(ReferralLeaderboard {
            leaderboard,
            user_details,
        })
    }

    async fn my_referrals(&self, telegram_id: i64) -> Result<Vec<RankedUser>, ServiceError> {
        Ok(self.repository.referred_by(telegram_id).await?)
    }
}

#[async_trait]
impl RequestHandler<LeaderboardRequest> for LeaderboardRequestHandler {
    async fn handle_request(&self, request: LeaderboardRequest) {
        match request {
            LeaderboardRequest::Overall {
                telegram_id,
                response,
            } => {
                let leaderboard = self.overall(telegram_id).await;
                let _ = response.send(leaderboard);
            }
            LeaderboardRequest::Referral {
                telegram_id,
                response,
            } => {
                let leaderboard = self.referral(telegram_id).await;
                let _ = response.send(leaderboard);
            }
            LeaderboardRequest::MyReferrals {
                telegram_id,
                response,
            } => {
                let referrals = self.my_referrals(telegram_id).await;
                let _ = response.send(referrals);
            }
        }
    }
}

pub struct LeaderboardService;

impl LeaderboardService {
    pub fn new() -> Self {
        LeaderboardService {}
    }
}

#[async_trait]
impl Service<LeaderboardRequest, LeaderboardRequestHandler> for LeaderboardService {}
