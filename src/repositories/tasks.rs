use anyhow::bail;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    users::{credit_balance, lock_user, refresh_level},
    Missing, Rejection,
};
use crate::models::tasks::{LastTaskClaim, NewTask, Task, TaskChanges, TaskType};

#[derive(Clone)]
pub struct TaskRepository {
    conn: PgPool,
}

impl TaskRepository {
    pub fn new(conn: PgPool) -> Self {
        TaskRepository { conn }
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, anyhow::Error> {
        let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY task_type, name")
            .fetch_all(&self.conn)
            .await?;

        Ok(tasks)
    }

    /// Most recent claim per task for one user.
    pub async fn last_claims(&self, user_id: i64) -> Result<Vec<LastTaskClaim>, anyhow::Error> {
        let claims = sqlx::query_as::<_, LastTaskClaim>(
            r#"
                SELECT task_id, MAX(date_claimed) AS date_claimed
                FROM user_task_claims
                WHERE user_id = $1
                GROUP BY task_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(claims)
    }

    pub async fn claim_task(
        &self,
        user_id: i64,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Task, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        lock_user(&mut tx, user_id).await?;

        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(task) = task else {
            bail!(Rejection::new("id", "Not a Valid Task ID"));
        };

        let last_claimed: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT MAX(date_claimed) FROM user_task_claims WHERE user_id = $1 AND task_id = $2",
        )
        .bind(user_id)
        .bind(task_id)
        .fetch_one(&mut *tx)
        .await?;

        if task.is_claimed(last_claimed, now) {
            let message = match task.task_type.parse::<TaskType>() {
                Ok(TaskType::Daily) => "Task already claimed today.".to_string(),
                _ => format!("Task already claimed for type: {}.", task.task_type),
            };
            bail!(Rejection::general(message));
        }

        sqlx::query(
            r#"
                INSERT INTO user_task_claims (user_id, task_id, claimed, date_claimed)
                VALUES ($1, $2, TRUE, $3)
            "#,
        )
        .bind(user_id)
        .bind(task_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        credit_balance(&mut tx, user_id, task.points).await?;
        refresh_level(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(task)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, anyhow::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
                INSERT INTO tasks
                    (id, name, description, task_type, points, image, url, action, is_telegram)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.task_type.as_str())
        .bind(task.points)
        .bind(&task.image)
        .bind(&task.url)
        .bind(task.action.as_str())
        .bind(task.is_telegram)
        .fetch_one(&self.conn)
        .await?;

        Ok(task)
    }

    pub async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Task, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut task) = task else {
            bail!(Missing("No Tasks matches the given query.".to_string()));
        };

        changes.apply(&mut task);

        let task = sqlx::query_as::<_, Task>(
            r#"
                UPDATE tasks
                SET name = $2, description = $3, task_type = $4, points = $5,
                    image = $6, url = $7, action = $8, is_telegram = $9
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(task.id)
        .bind(&task.name)
        .bind(&task.description)
        .bind(&task.task_type)
        .bind(task.points)
        .bind(&task.image)
        .bind(&task.url)
        .bind(&task.action)
        .bind(task.is_telegram)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(task)
    }
}
