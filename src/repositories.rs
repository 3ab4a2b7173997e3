pub mod cards;
pub mod earnings;
pub mod leaderboards;
pub mod rewards;
pub mod tasks;
pub mod users;

/// Field used for errors that are not tied to a single input.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// A precondition the request failed. Carried through `anyhow` and surfaced as a 400.
#[derive(Debug, thiserror::Error)]
#[error("{field}: {message}")]
pub struct Rejection {
    pub field: &'static str,
    pub message: String,
}

impl Rejection {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Rejection {
            field,
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Rejection::new(NON_FIELD_ERRORS, message)
    }
}

/// The addressed row does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Missing(pub String);

#[cfg(test)]
pub(crate) mod fixtures {
    use sqlx::PgPool;

    use super::Rejection;
    use crate::models::users::User;

    pub async fn create_user(pool: &PgPool, telegram_id: i64) -> User {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (telegram_id, username) VALUES ($1, $2) RETURNING *",
        )
        .bind(telegram_id)
        .bind(format!("user{telegram_id}"))
        .fetch_one(pool)
        .await
        .unwrap()
    }

    pub async fn set_balance(pool: &PgPool, user_id: i64, balance: i64) {
        sqlx::query("UPDATE users SET balance = $2 WHERE id = $1")
            .bind(user_id)
            .bind(balance)
            .execute(pool)
            .await
            .unwrap();
    }

    pub fn rejection_message(err: anyhow::Error) -> String {
        match err.downcast::<Rejection>() {
            Ok(rejection) => rejection.message,
            Err(err) => panic!("expected a rejection, got {err:?}"),
        }
    }
}
