use axum::{extract::State, Json};

use super::{auth::AuthUser, AppState, Payload};
use crate::{
    models::tasks::{ClaimTask, TaskView},
    services::{call, tasks::TaskRequest, ServiceError},
};

pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<TaskView>>, ServiceError> {
    let tasks = call(&state.task_channel, "Task", |response| TaskRequest::List {
        user_id: user.id,
        response,
    })
    .await?;

    Ok(Json(tasks))
}

pub async fn claim_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(claim): Payload<ClaimTask>,
) -> Result<Json<TaskView>, ServiceError> {
    let task = call(&state.task_channel, "Task", |response| TaskRequest::Claim {
        user_id: user.id,
        task_id: claim.id,
        response,
    })
    .await?;

    Ok(Json(task))
}
