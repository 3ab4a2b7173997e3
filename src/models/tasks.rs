use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Daily,
    Social,
    Partner,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Daily => "daily",
            TaskType::Social => "social",
            TaskType::Partner => "partner",
        }
    }

    /// Daily tasks reopen a rolling day after the last claim, the rest are one-shot.
    pub fn is_claimed(&self, last_claimed: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self, last_claimed) {
            (_, None) => false,
            (TaskType::Daily, Some(at)) => at >= now - Duration::hours(24),
            (TaskType::Social | TaskType::Partner, Some(_)) => true,
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(TaskType::Daily),
            "social" => Ok(TaskType::Social),
            "partner" => Ok(TaskType::Partner),
            other => Err(format!("\"{other}\" is not a valid task type.")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Join,
    #[default]
    Visit,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskAction::Join => "join",
            TaskAction::Visit => "visit",
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub task_type: String,
    pub points: i64,
    pub image: Option<String>,
    pub url: Option<String>,
    pub action: String,
    pub is_telegram: bool,
}

impl Task {
    pub fn is_claimed(&self, last_claimed: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        self.task_type
            .parse::<TaskType>()
            .map(|task_type| task_type.is_claimed(last_claimed, now))
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub claim: bool,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct LastTaskClaim {
    pub task_id: Uuid,
    pub date_claimed: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimTask {
    pub id: Uuid,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub task_type: TaskType,
    pub points: i64,
    pub image: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub action: TaskAction,
    #[serde(default)]
    pub is_telegram: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub points: Option<i64>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub action: Option<TaskAction>,
    pub is_telegram: Option<bool>,
}

impl TaskChanges {
    pub fn apply(self, task: &mut Task) {
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(task_type) = self.task_type {
            task.task_type = task_type.as_str().to_string();
        }
        if let Some(points) = self.points {
            task.points = points;
        }
        if self.image.is_some() {
            task.image = self.image;
        }
        if self.url.is_some() {
            task.url = self.url;
        }
        if let Some(action) = self.action {
            task.action = action.as_str().to_string();
        }
        if let Some(is_telegram) = self.is_telegram {
            task.is_telegram = is_telegram;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(task_type: TaskType) -> Task {
        Task {
            id: Uuid::new_v4(),
            name: "Join channel".to_string(),
            description: "Join the community channel".to_string(),
            task_type: task_type.as_str().to_string(),
            points: 500,
            image: None,
            url: Some("https://t.me/example".to_string()),
            action: TaskAction::Join.as_str().to_string(),
            is_telegram: true,
        }
    }

    #[test]
    fn test_daily_task_reopens_after_a_rolling_day() {
        let now = Utc::now();
        let daily = task(TaskType::Daily);

        assert!(daily.is_claimed(Some(now - Duration::hours(23)), now));
        assert!(!daily.is_claimed(Some(now - Duration::hours(25)), now));
        assert!(!daily.is_claimed(None, now));
    }

    #[test]
    fn test_social_and_partner_tasks_stay_claimed() {
        let now = Utc::now();
        let long_ago = Some(now - Duration::days(90));

        assert!(task(TaskType::Social).is_claimed(long_ago, now));
        assert!(task(TaskType::Partner).is_claimed(long_ago, now));
        assert!(!task(TaskType::Partner).is_claimed(None, now));
    }

    #[test]
    fn test_changes_only_touch_given_fields() {
        let mut stored = task(TaskType::Social);
        let changes = TaskChanges {
            points: Some(1_000),
            task_type: Some(TaskType::Daily),
            ..Default::default()
        };
        changes.apply(&mut stored);

        assert_eq!(stored.points, 1_000);
        assert_eq!(stored.task_type, "daily");
        assert_eq!(stored.name, "Join channel");
        assert_eq!(stored.url.as_deref(), Some("https://t.me/example"));
    }

    #[test]
    fn test_new_task_defaults_to_visit() {
        let new_task: NewTask = serde_json::from_str(
            r#"{"name": "Visit site", "description": "d", "task_type": "partner", "points": 10}"#,
        )
        .unwrap();
        assert_eq!(new_task.action, TaskAction::Visit);
        assert!(!new_task.is_telegram);
    }
}
