use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::{
    cards::CardRequest, earnings::EarningRequest, leaderboards::LeaderboardRequest,
    rewards::RewardRequest, tasks::TaskRequest, users::UserRequest, ServiceError,
};
use crate::{repositories::NON_FIELD_ERRORS, settings::Server};

mod admin;
mod auth;
mod cards;
mod earnings;
mod leaderboards;
mod rewards;
mod tasks;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub user_channel: mpsc::Sender<UserRequest>,
    pub earning_channel: mpsc::Sender<EarningRequest>,
    pub leaderboard_channel: mpsc::Sender<LeaderboardRequest>,
    pub task_channel: mpsc::Sender<TaskRequest>,
    pub card_channel: mpsc::Sender<CardRequest>,
    pub reward_channel: mpsc::Sender<RewardRequest>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation { field, message } => {
                let mut body = Map::new();
                body.insert(field, json!([message]));
                (StatusCode::BAD_REQUEST, Json(Value::Object(body))).into_response()
            }
            ServiceError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
            }
            ServiceError::Unauthorized(detail) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
            }
            ServiceError::Forbidden(detail) => {
                (StatusCode::FORBIDDEN, Json(json!({ "detail": detail }))).into_response()
            }
            error @ (ServiceError::Database(_) | ServiceError::Communication(..)) => {
                log::error!("Request failed: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "Internal server error." })),
                )
                    .into_response()
            }
        }
    }
}

/// JSON body whose rejections are reported as 400 field errors.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(ServiceError::validation(
                NON_FIELD_ERRORS,
                rejection.body_text(),
            )),
        }
    }
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/login", post(users::login))
        .route("/user-details", get(users::user_details))
        .route(
            "/welcome-bonus",
            patch(users::claim_welcome_bonus).put(users::claim_welcome_bonus),
        )
        .route("/update-religion", patch(users::update_religion))
        .route("/update-balance", patch(users::update_balance))
        .route("/earning", post(earnings::record_earning))
        .route("/my-referral-leaderboard", get(leaderboards::my_referrals))
        .route("/overall-leaderboard", get(leaderboards::overall))
        .route("/referral-leaderboard", get(leaderboards::referral))
        .route("/tasks", get(tasks::list_tasks))
        .route("/claim-task", post(tasks::claim_task))
        .route("/cards", get(cards::list_cards))
        .route("/claim-card", post(cards::claim_card))
        .route("/update-card-level", post(cards::upgrade_card))
        .route("/card-details", get(cards::card_details))
        .route(
            "/booster-claims",
            get(rewards::list_boosters).post(rewards::claim_booster),
        )
        .route("/daily-rewards", get(rewards::list_daily_rewards))
        .route("/daily-rewards/claim", post(rewards::claim_daily_reward))
        .route("/admin/login", post(admin::login))
        .route(
            "/admin/update-points",
            patch(admin::credit_points).put(admin::credit_points),
        )
        .route("/admin/task", get(admin::list_tasks).post(admin::create_task))
        .route(
            "/admin/task/{id}",
            patch(admin::update_task).put(admin::update_task),
        )
        .route("/admin/card", get(admin::list_cards).post(admin::create_card))
        .route(
            "/admin/card/{id}",
            patch(admin::update_card).put(admin::update_card),
        )
        .route(
            "/admin/card-details",
            get(admin::list_card_details).post(admin::create_card_detail),
        )
        .route(
            "/admin/card-details/{id}",
            patch(admin::update_card_detail).put(admin::update_card_detail),
        )
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}

/// `*` allows every origin, otherwise only the listed ones.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|origin| {
            match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS origin {:?}.", origin);
                    None
                }
            }
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub async fn start_http_server(app_state: AppState, server: &Server) -> Result<(), anyhow::Error> {
    let app = router(app_state).layer(cors_layer(&server.cors_allowed_origins));

    let listener = tokio::net::TcpListener::bind(&server.listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request},
    };
    use chrono::Utc;
    use tower::ServiceExt;

    use super::*;
    use crate::models::users::User;

    fn user(is_staff: bool) -> User {
        User {
            id: 1,
            telegram_id: 1001,
            username: "pilgrim".to_string(),
            first_name: "Pilgrim".to_string(),
            referred_by: None,
            referred_points: 0,
            balance: 500,
            level_number: 1,
            level_name: "Seeker of Truth".to_string(),
            welcome_bonus: false,
            multitap_level: 0,
            recharging_speed_level: 0,
            autobot_status: false,
            religion: None,
            is_staff,
            is_active: true,
            password_hash: None,
            date_joined: Utc::now(),
        }
    }

    fn closed<T>() -> mpsc::Sender<T> {
        mpsc::channel(1).0
    }

    /// Users authenticate with the tokens `player` and `admin`; the task service
    /// answers the admin listing with an empty catalog.
    fn stub_state() -> AppState {
        let (user_channel, mut user_rx) = mpsc::channel(8);
        tokio::spawn(async move {
            while let Some(request) = user_rx.recv().await {
                if let UserRequest::Authenticate { token, response } = request {
                    let result = match token.as_str() {
                        "player" => Ok(user(false)),
                        "admin" => Ok(user(true)),
                        _ => Err(ServiceError::Unauthorized(
                            "Invalid or expired token.".to_string(),
                        )),
                    };
                    let _ = response.send(result);
                }
            }
        });

        let (task_channel, mut task_rx) = mpsc::channel(8);
        tokio::spawn(async move {
            while let Some(request) = task_rx.recv().await {
                if let TaskRequest::AdminList { response } = request {
                    let _ = response.send(Ok(Vec::new()));
                }
            }
        });

        AppState {
            user_channel,
            earning_channel: closed(),
            leaderboard_channel: closed(),
            task_channel,
            card_channel: closed(),
            reward_channel: closed(),
        }
    }

    fn request(
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(stub_state())
            .oneshot(request(Method::GET, "/health", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_unknown_token_is_unauthorized() {
        let response = router(stub_state())
            .oneshot(request(Method::GET, "/tasks", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(stub_state())
            .oneshot(request(Method::GET, "/tasks", Some("stolen"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_require_staff() {
        let response = router(stub_state())
            .oneshot(request(Method::GET, "/admin/task", Some("player"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router(stub_state())
            .oneshot(request(Method::GET, "/admin/task", Some("admin"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_bad_request() {
        let response = router(stub_state())
            .oneshot(request(
                Method::POST,
                "/earning",
                Some("player"),
                Some(r#"{"amount": "lots""#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await.get(NON_FIELD_ERRORS).is_some());
    }

    #[tokio::test]
    async fn test_unknown_religion_is_a_field_error() {
        let response = router(stub_state())
            .oneshot(request(
                Method::PATCH,
                "/update-religion",
                Some("player"),
                Some(r#"{"user_religion": "Jedi"}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "user_religion": ["\"Jedi\" is not a valid choice."] })
        );
    }

    #[tokio::test]
    async fn test_unavailable_service_is_an_internal_error() {
        let response = router(stub_state())
            .oneshot(request(Method::GET, "/cards", Some("player"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_bodies() {
        let response = ServiceError::validation("amount", "Too small.").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "amount": ["Too small."] }));

        let response =
            ServiceError::NotFound("Card details not found.".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({ "detail": "Card details not found." })
        );
    }

    async fn allowed_origin(allowed_origins: &[&str], origin: &str) -> Option<String> {
        let allowed_origins: Vec<String> = allowed_origins.iter().map(|o| o.to_string()).collect();
        let app = router(stub_state()).layer(cors_layer(&allowed_origins));

        let mut request = request(Method::GET, "/health", None, None);
        request
            .headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|value| value.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_cors_wildcard_allows_any_origin() {
        let allowed = allowed_origin(&["*"], "https://anywhere.example").await;

        assert_eq!(allowed.as_deref(), Some("*"));
    }

    #[tokio::test]
    async fn test_cors_list_echoes_only_listed_origins() {
        let origins = ["https://example.org", "bad\norigin"];

        let allowed = allowed_origin(&origins, "https://example.org").await;
        assert_eq!(allowed.as_deref(), Some("https://example.org"));

        let allowed = allowed_origin(&origins, "https://intruder.example").await;
        assert_eq!(allowed, None);
    }
}
