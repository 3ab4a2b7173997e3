use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        boosters::{self, BoosterClaim, BoosterType},
        rewards::{ClaimedDailyReward, DailyReward, DailyRewardView, DailyStreak},
    },
    repositories::rewards::RewardRepository,
};

pub enum RewardRequest {
    ListDaily {
        user_id: i64,
        response: oneshot::Sender<Result<Vec<DailyRewardView>, ServiceError>>,
    },
    ClaimDaily {
        user_id: i64,
        response: oneshot::Sender<Result<ClaimedDailyReward, ServiceError>>,
    },
    ListBoosters {
        user_id: i64,
        response: oneshot::Sender<Result<Vec<BoosterClaim>, ServiceError>>,
    },
    ClaimBooster {
        user_id: i64,
        claim_type: BoosterType,
        response: oneshot::Sender<Result<BoosterClaim, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct RewardRequestHandler {
    repository: RewardRepository,
    booster_cooldown: Duration,
}

impl RewardRequestHandler {
    pub fn new(sql_conn: PgPool, booster_cooldown_minutes: i64) -> Self {
        let repository = RewardRepository::new(sql_conn);

        RewardRequestHandler {
            repository,
            booster_cooldown: Duration::minutes(booster_cooldown_minutes),
        }
    }

    async fn list_daily(&self, user_id: i64) -> Result<Vec<DailyRewardView>, ServiceError> {
        let now = Utc::now();
        let streak = self.repository.current_streak(user_id, now).await?;
        let schedule = self.repository.schedule().await?;

        Ok(daily_views(&schedule, &streak, now))
    }

    async fn claim_daily(&self, user_id: i64) -> Result<ClaimedDailyReward, ServiceError> {
        let claimed = self.repository.claim_daily(user_id, Utc::now()).await?;
        log::info!(
            "User {} claimed {} daily reward points, next day {}.",
            user_id,
            claimed.claimed_points,
            claimed.current_day
        );

        Ok(claimed)
    }

    async fn list_boosters(&self, user_id: i64) -> Result<Vec<BoosterClaim>, ServiceError> {
        let since = boosters::cooldown_start(Utc::now(), self.booster_cooldown);

        Ok(self.repository.recent_boosters(user_id, since).await?)
    }

    async fn claim_booster(
        &self,
        user_id: i64,
        claim_type: BoosterType,
    ) -> Result<BoosterClaim, ServiceError> {
        let claim = self
            .repository
            .claim_booster(user_id, claim_type, Utc::now(), self.booster_cooldown)
            .await?;
        log::info!("User {} claimed a {} booster.", user_id, claim.claim_type);

        Ok(claim)
    }
}

fn daily_views(
    schedule: &[DailyReward],
    streak: &DailyStreak,
    now: DateTime<Utc>,
) -> Vec<DailyRewardView> {
    schedule
        .iter()
        .map(|reward| DailyRewardView {
            day: reward.day,
            points: reward.points,
            status: streak.day_status(reward.day, now).label(),
        })
        .collect()
}

#[async_trait]
impl RequestHandler<RewardRequest> for RewardRequestHandler {
    async fn handle_request(&self, request: RewardRequest) {
        match request {
            RewardRequest::ListDaily { user_id, response } => {
                let rewards = self.list_daily(user_id).await;
                let _ = response.send(rewards);
            }
            RewardRequest::ClaimDaily { user_id, response } => {
                let claimed = self.claim_daily(user_id).await;
                let _ = response.send(claimed);
            }
            RewardRequest::ListBoosters { user_id, response } => {
                let claims = self.list_boosters(user_id).await;
                let _ = response.send(claims);
            }
            RewardRequest::ClaimBooster {
                user_id,
                claim_type,
                response,
            } => {
                let claim = self.claim_booster(user_id, claim_type).await;
                let _ = response.send(claim);
            }
        }
    }
}

pub struct RewardService;

impl RewardService {
    pub fn new() -> Self {
        RewardService {}
    }
}

#[async_trait]
impl Service<RewardRequest, RewardRequestHandler> for RewardService {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_views_label_each_day() {
        let schedule: Vec<DailyReward> = (1..=4)
            .map(|day| DailyReward {
                day,
                points: i64::from(day) * 500,
            })
            .collect();
        let claimed_at = Utc.with_ymd_and_hms(2024, 11, 1, 9, 30, 0).unwrap();
        let streak = DailyStreak {
            current_day: 3,
            last_claimed_at: Some(claimed_at),
        };

        let views = daily_views(&schedule, &streak, claimed_at + Duration::hours(3));
        let labels: Vec<&str> = views.iter().map(|view| view.status.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Claimed", "Claimed", "02 Nov 2024 09:30 AM", "Cannot Claim"]
        );

        let views = daily_views(&schedule, &streak, claimed_at + Duration::hours(25));
        assert_eq!(views[2].status, "Can Claim");
        assert_eq!(views[2].points, 1_500);
    }
}
