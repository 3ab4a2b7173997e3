use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::tasks::{LastTaskClaim, NewTask, Task, TaskChanges, TaskView},
    repositories::tasks::TaskRepository,
};

pub enum TaskRequest {
    List {
        user_id: i64,
        response: oneshot::Sender<Result<Vec<TaskView>, ServiceError>>,
    },
    Claim {
        user_id: i64,
        task_id: Uuid,
        response: oneshot::Sender<Result<TaskView, ServiceError>>,
    },
    AdminList {
        response: oneshot::Sender<Result<Vec<Task>, ServiceError>>,
    },
    AdminCreate {
        task: NewTask,
        response: oneshot::Sender<Result<Task, ServiceError>>,
    },
    AdminUpdate {
        id: Uuid,
        changes: TaskChanges,
        response: oneshot::Sender<Result<Task, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct TaskRequestHandler {
    repository: TaskRepository,
}

impl TaskRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = TaskRepository::new(sql_conn);

        TaskRequestHandler { repository }
    }

    async fn list(&self, user_id: i64) -> Result<Vec<TaskView>, ServiceError> {
        let tasks = self.repository.list_tasks().await?;
        let claims = self.repository.last_claims(user_id).await?;

        Ok(task_views(tasks, &claims, Utc::now()))
    }

    async fn claim(&self, user_id: i64, task_id: Uuid) -> Result<TaskView, ServiceError> {
        let task = self.repository.claim_task(user_id, task_id, Utc::now()).await?;
        log::info!("User {} claimed task {} for {} points.", user_id, task.id, task.points);

        Ok(TaskView { task, claim: true })
    }

    async fn admin_list(&self) -> Result<Vec<Task>, ServiceError> {
        Ok(self.repository.list_tasks().await?)
    }

    async fn admin_create(&self, task: NewTask) -> Result<Task, ServiceError> {
        validate_name(&task.name)?;
        validate_points(task.points)?;

        let task = self.repository.create_task(&task).await?;
        log::info!("Created task {} ({}).", task.name, task.id);

        Ok(task)
    }

    async fn admin_update(&self, id: Uuid, changes: TaskChanges) -> Result<Task, ServiceError> {
        if let Some(name) = &changes.name {
            validate_name(name)?;
        }
        if let Some(points) = changes.points {
            validate_points(points)?;
        }

        let task = self.repository.update_task(id, changes).await?;
        log::info!("Updated task {} ({}).", task.name, task.id);

        Ok(task)
    }
}

fn task_views(tasks: Vec<Task>, claims: &[LastTaskClaim], now: DateTime<Utc>) -> Vec<TaskView> {
    let last_claimed: HashMap<Uuid, DateTime<Utc>> = claims
        .iter()
        .map(|claim| (claim.task_id, claim.date_claimed))
        .collect();

    tasks
        .into_iter()
        .map(|task| {
            let claim = task.is_claimed(last_claimed.get(&task.id).copied(), now);
            TaskView { task, claim }
        })
        .collect()
}

fn validate_name(name: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::validation("name", "This field may not be blank."));
    }
    Ok(())
}

fn validate_points(points: i64) -> Result<(), ServiceError> {
    if points < 0 {
        return Err(ServiceError::validation(
            "points",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    Ok(())
}

#[async_trait]
impl RequestHandler<TaskRequest> for TaskRequestHandler {
    async fn handle_request(&self, request: TaskRequest) {
        match request {
            TaskRequest::List { user_id, response } => {
                let tasks = self.list(user_id).await;
                let _ = response.send(tasks);
            }
            TaskRequest::Claim {
                user_id,
                task_id,
                response,
            } => {
                let task = self.claim(user_id, task_id).await;
                let _ = response.send(task);
            }
            TaskRequest::AdminList { response } => {
                let tasks = self.admin_list().await;
                let _ = response.send(tasks);
            }
            TaskRequest::AdminCreate { task, response } => {
                let task = self.admin_create(task).await;
                let _ = response.send(task);
            }
            TaskRequest::AdminUpdate {
                id,
                changes,
                response,
            } => {
                let task = self.admin_update(id, changes).await;
                let _ = response.send(task);
            }
        }
    }
}

pub struct TaskService;

impl TaskService {
    pub fn new() -> Self {
        TaskService {}
    }
}

#[async_trait]
impl Service<TaskRequest, TaskRequestHandler> for TaskService {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(task_type: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            name: format!("{task_type} task"),
            description: String::new(),
            task_type: task_type.to_string(),
            points: 100,
            image: None,
            url: None,
            action: "visit".to_string(),
            is_telegram: false,
        }
    }

    #[test]
    fn test_views_mark_claims_per_task_type() {
        let now = Utc::now();
        let daily = task("daily");
        let stale_daily = task("daily");
        let social = task("social");
        let untouched = task("partner");

        let claims = vec![
            LastTaskClaim {
                task_id: daily.id,
                date_claimed: now - Duration::hours(2),
            },
            LastTaskClaim {
                task_id: stale_daily.id,
                date_claimed: now - Duration::hours(30),
            },
            LastTaskClaim {
                task_id: social.id,
                date_claimed: now - Duration::days(30),
            },
        ];

        let views = task_views(vec![daily, stale_daily, social, untouched], &claims, now);
        let flags: Vec<bool> = views.iter().map(|view| view.claim).collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[test]
    fn test_admin_validation() {
        assert!(validate_name("  ").is_err());
        assert!(validate_name("Follow us").is_ok());
        assert!(validate_points(-5).is_err());
        assert!(validate_points(0).is_ok());
    }
}
