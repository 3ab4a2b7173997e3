use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::users::{
        AccessToken, AdminCreditPoints, AdminLoginRequest, BalanceSummary, LoginRequest,
        Religion, User, UserDetails, MAX_NAME_LENGTH, MAX_POINTS,
    },
    repositories::{users::UserRepository, NON_FIELD_ERRORS},
    utils,
};

pub const TOKEN_TYPE: &str = "Bearer";

pub enum UserRequest {
    Login {
        login: LoginRequest,
        response: oneshot::Sender<Result<AccessToken, ServiceError>>,
    },
    AdminLogin {
        login: AdminLoginRequest,
        response: oneshot::Sender<Result<AccessToken, ServiceError>>,
    },
    Authenticate {
        token: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    GetDetails {
        user_id: i64,
        response: oneshot::Sender<Result<UserDetails, ServiceError>>,
    },
    ClaimWelcomeBonus {
        user_id: i64,
        response: oneshot::Sender<Result<BalanceSummary, ServiceError>>,
    },
    UpdateReligion {
        user_id: i64,
        religion: Option<Religion>,
        response: oneshot::Sender<Result<UserDetails, ServiceError>>,
    },
    UpdateBalance {
        user_id: i64,
        amount: i64,
        response: oneshot::Sender<Result<BalanceSummary, ServiceError>>,
    },
    CreditPoints {
        credit: AdminCreditPoints,
        response: oneshot::Sender<Result<BalanceSummary, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
    token_ttl: Duration,
    welcome_bonus: i64,
}

impl UserRequestHandler {
    pub fn new(sql_conn: PgPool, token_ttl_hours: i64, welcome_bonus: i64) -> Self {
        let repository = UserRepository::new(sql_conn);

        UserRequestHandler {
            repository,
            token_ttl: Duration::hours(token_ttl_hours),
            welcome_bonus,
        }
    }

    async fn issue_token(&self, user: &User) -> Result<AccessToken, ServiceError> {
        let token = utils::generate_token();
        let expires_at = Utc::now() + self.token_ttl;

        self.repository
            .create_session(user.id, &utils::hash_token(&token), expires_at)
            .await?;

        Ok(AccessToken {
            access: token,
            token_type: TOKEN_TYPE.to_string(),
            expires_at,
        })
    }

    async fn login(&self, login: LoginRequest) -> Result<AccessToken, ServiceError> {
        validate_login(&login)?;

        let (user, created) = self.repository.login_or_create(&login).await?;
        if created {
            log::info!("Created user {} ({}).", user.telegram_id, user.username);
        }

        self.issue_token(&user).await
    }

    async fn admin_login(&self, login: AdminLoginRequest) -> Result<AccessToken, ServiceError> {
        let user = self.repository.get_user_by_telegram_id(login.telegram_id).await?;

        let admin = user.filter(|user| {
            user.is_staff
                && user.is_active
                && user
                    .password_hash
                    .as_deref()
                    .is_some_and(|hash| utils::verify_password(&login.password, hash))
        });

        match admin {
            Some(admin) => {
                log::info!("Admin {} logged in.", admin.telegram_id);
                self.issue_token(&admin).await
            }
            None => {
                log::warn!("Rejected admin login for {}.", login.telegram_id);
                Err(ServiceError::validation(
                    NON_FIELD_ERRORS,
                    "Sorry, you are not an admin.",
                ))
            }
        }
    }

    async fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        self.repository
            .get_session_user(&utils::hash_token(token), Utc::now())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid or expired token.".to_string()))
    }

    async fn details(&self, user_id: i64) -> Result<UserDetails, ServiceError> {
        let user = self
            .repository
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))?;
        let cards = self.repository.owned_cards(user_id).await?;

        Ok(UserDetails::new(user, cards))
    }

    async fn claim_welcome_bonus(&self, user_id: i64) -> Result<BalanceSummary, ServiceError> {
        let user = self
            .repository
            .claim_welcome_bonus(user_id, self.welcome_bonus)
            .await?;

        Ok(BalanceSummary::from(&user))
    }

    async fn update_religion(
        &self,
        user_id: i64,
        religion: Option<Religion>,
    ) -> Result<UserDetails, ServiceError> {
        let user = self
            .repository
            .update_religion(user_id, religion.map(|r| r.as_str()))
            .await?;
        let cards = self.repository.owned_cards(user_id).await?;

        Ok(UserDetails::new(user, cards))
    }

    async fn update_balance(
        &self,
        user_id: i64,
        amount: i64,
    ) -> Result<BalanceSummary, ServiceError> {
        validate_points("amount", amount)?;

        let user = self.repository.raise_balance(user_id, amount).await?;

        Ok(BalanceSummary::from(&user))
    }

    async fn credit_points(
        &self,
        credit: AdminCreditPoints,
    ) -> Result<BalanceSummary, ServiceError> {
        validate_points("points", credit.points)?;

        let user = match (credit.telegram_id, credit.username.as_deref()) {
            (Some(telegram_id), _) => {
                self.repository.get_user_by_telegram_id(telegram_id).await?
            }
            (None, Some(username)) if !username.is_empty() => {
                self.repository.get_user_by_username(username).await?
            }
            _ => {
                return Err(ServiceError::validation(
                    NON_FIELD_ERRORS,
                    "Either telegram_id or username must be provided.",
                ))
            }
        };
        let user = user.ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))?;

        let user = self.repository.credit_points(user.id, credit.points).await?;
        log::info!("Credited {} points to user {}.", credit.points, user.telegram_id);

        Ok(BalanceSummary::from(&user))
    }
}

fn validate_login(login: &LoginRequest) -> Result<(), ServiceError> {
    if login.telegram_id < 0 {
        return Err(ServiceError::validation(
            "telegram_id",
            "Ensure this value is greater than or equal to 0.",
        ));
    }

    let names = [
        ("username", login.username.as_deref()),
        ("first_name", login.first_name.as_deref()),
    ];
    for (field, value) in names {
        if value.is_some_and(|value| value.chars().count() > MAX_NAME_LENGTH) {
            return Err(ServiceError::validation(
                field,
                format!("Ensure this field has no more than {MAX_NAME_LENGTH} characters."),
            ));
        }
    }

    Ok(())
}

/// Balance targets and admin credits lie in `1..=MAX_POINTS`.
fn validate_points(field: &str, points: i64) -> Result<(), ServiceError> {
    if points < 1 {
        return Err(ServiceError::validation(
            field,
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    if points > MAX_POINTS {
        return Err(ServiceError::validation(
            field,
            format!("Ensure this value is less than or equal to {MAX_POINTS}."),
        ));
    }

    Ok(())
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Login { login, response } => {
                let token = self.login(login).await;
                let _ = response.send(token);
            }
            UserRequest::AdminLogin { login, response } => {
                let token = self.admin_login(login).await;
                let _ = response.send(token);
            }
            UserRequest::Authenticate { token, response } => {
                let user = self.authenticate(&token).await;
                let _ = response.send(user);
            }
            UserRequest::GetDetails { user_id, response } => {
                let details = self.details(user_id).await;
                let _ = response.send(details);
            }
            UserRequest::ClaimWelcomeBonus { user_id, response } => {
                let summary = self.claim_welcome_bonus(user_id).await;
                let _ = response.send(summary);
            }
            UserRequest::UpdateReligion {
                user_id,
                religion,
                response,
            } => {
                let details = self.update_religion(user_id, religion).await;
                let _ = response.send(details);
            }
            UserRequest::UpdateBalance {
                user_id,
                amount,
                response,
            } => {
                let summary = self.update_balance(user_id, amount).await;
                let _ = response.send(summary);
            }
            UserRequest::CreditPoints { credit, response } => {
                let summary = self.credit_points(credit).await;
                let _ = response.send(summary);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(telegram_id: i64) -> LoginRequest {
        LoginRequest {
            telegram_id,
            username: Some("seeker".to_string()),
            first_name: Some("Ada".to_string()),
            referred_by: None,
        }
    }

    fn field_of(err: ServiceError) -> String {
        match err {
            ServiceError::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_login_rejects_negative_telegram_id() {
        assert!(validate_login(&login(0)).is_ok());

        let err = validate_login(&login(-1)).unwrap_err();
        assert_eq!(field_of(err), "telegram_id");
    }

    #[test]
    fn test_login_bounds_username_length() {
        let mut request = login(42);
        request.username = Some("é".repeat(MAX_NAME_LENGTH));
        assert!(validate_login(&request).is_ok());

        request.username = Some("x".repeat(MAX_NAME_LENGTH + 1));
        assert_eq!(field_of(validate_login(&request).unwrap_err()), "username");
    }

    #[test]
    fn test_login_bounds_first_name_length() {
        let mut request = login(42);
        request.first_name = Some("x".repeat(MAX_NAME_LENGTH + 1));

        assert_eq!(field_of(validate_login(&request).unwrap_err()), "first_name");
    }

    #[test]
    fn test_points_must_be_positive_and_capped() {
        assert!(validate_points("amount", 1).is_ok());
        assert!(validate_points("amount", MAX_POINTS).is_ok());

        assert_eq!(field_of(validate_points("amount", 0).unwrap_err()), "amount");
        assert_eq!(field_of(validate_points("points", MAX_POINTS + 1).unwrap_err()), "points");
        assert_eq!(field_of(validate_points("points", i64::MAX).unwrap_err()), "points");
    }
}
