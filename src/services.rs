use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::{mpsc, oneshot};

use crate::repositories::{Missing, Rejection};
use crate::settings::Settings;

pub mod cards;
pub mod earnings;
pub mod http;
pub mod leaderboards;
pub mod rewards;
pub mod tasks;
pub mod users;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl ServiceError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(error: anyhow::Error) -> Self {
        let error = match error.downcast::<Rejection>() {
            Ok(rejection) => return ServiceError::validation(rejection.field, rejection.message),
            Err(error) => error,
        };
        let error = match error.downcast::<Missing>() {
            Ok(missing) => return ServiceError::NotFound(missing.0),
            Err(error) => error,
        };

        log::error!("Repository failure: {:#}", error);
        ServiceError::Database(error.to_string())
    }
}

pub type Reply<T> = oneshot::Sender<Result<T, ServiceError>>;

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Sends a request built around a fresh reply channel and waits for the answer.
pub async fn call<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    build: impl FnOnce(Reply<T>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (earning_tx, mut earning_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (leaderboard_tx, mut leaderboard_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (task_tx, mut task_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (card_tx, mut card_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (reward_tx, mut reward_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut user_service = users::UserService::new();
    let mut earning_service = earnings::EarningService::new();
    let mut leaderboard_service = leaderboards::LeaderboardService::new();
    let mut task_service = tasks::TaskService::new();
    let mut card_service = cards::CardService::new();
    let mut reward_service = rewards::RewardService::new();

    log::info!("Starting user service.");
    let user_handler = users::UserRequestHandler::new(
        pool.clone(),
        settings.auth.token_ttl_hours,
        settings.rewards.welcome_bonus,
    );
    tokio::spawn(async move {
        user_service.run(user_handler, &mut user_rx).await;
    });

    log::info!("Starting earning service.");
    let earning_handler = earnings::EarningRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        earning_service.run(earning_handler, &mut earning_rx).await;
    });

    log::info!("Starting leaderboard service.");
    let leaderboard_handler = leaderboards::LeaderboardRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        leaderboard_service
            .run(leaderboard_handler, &mut leaderboard_rx)
            .await;
    });

    log::info!("Starting task service.");
    let task_handler = tasks::TaskRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        task_service.run(task_handler, &mut task_rx).await;
    });

    log::info!("Starting card service.");
    let card_handler = cards::CardRequestHandler::new(pool.clone());
    tokio::spawn(async move {
        card_service.run(card_handler, &mut card_rx).await;
    });

    log::info!("Starting reward service.");
    let reward_handler =
        rewards::RewardRequestHandler::new(pool, settings.rewards.booster_cooldown_minutes);
    tokio::spawn(async move {
        reward_service.run(reward_handler, &mut reward_rx).await;
    });

    let app_state = http::AppState {
        user_channel: user_tx,
        earning_channel: earning_tx,
        leaderboard_channel: leaderboard_tx,
        task_channel: task_tx,
        card_channel: card_tx,
        reward_channel: reward_tx,
    };

    log::info!("Starting HTTP server.");
    http::start_http_server(app_state, &settings.server).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_become_validation_errors() {
        let error: ServiceError =
            anyhow::Error::new(Rejection::new("id", "Not a valid Card ID.")).into();

        match error {
            ServiceError::Validation { field, message } => {
                assert_eq!(field, "id");
                assert_eq!(message, "Not a valid Card ID.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_rows_become_not_found() {
        let error: ServiceError = anyhow::Error::new(Missing("gone".to_string())).into();
        assert!(matches!(error, ServiceError::NotFound(message) if message == "gone"));
    }

    #[test]
    fn test_other_failures_are_database_errors() {
        let error: ServiceError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(error, ServiceError::Database(_)));
    }

    #[tokio::test]
    async fn test_call_reports_closed_service() {
        let (tx, rx) = mpsc::channel::<Reply<i32>>(1);
        drop(rx);

        let result = call(&tx, "Test", |reply| reply).await;
        assert!(matches!(result, Err(ServiceError::Communication(..))));
    }

    #[tokio::test]
    async fn test_call_returns_reply() {
        let (tx, mut rx) = mpsc::channel::<Reply<i32>>(1);
        tokio::spawn(async move {
            if let Some(reply) = rx.recv().await {
                let _ = reply.send(Ok(7));
            }
        });

        assert_eq!(call(&tx, "Test", |reply| reply).await.unwrap(), 7);
    }
}
