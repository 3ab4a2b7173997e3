use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{auth::AdminUser, AppState, Payload};
use crate::{
    models::{
        cards::{Card, CardChanges, CardDetail, CardDetailChanges, NewCard, NewCardDetail},
        tasks::{NewTask, Task, TaskChanges},
        users::{AccessToken, AdminCreditPoints, AdminLoginRequest, BalanceSummary},
    },
    services::{call, cards::CardRequest, tasks::TaskRequest, users::UserRequest, ServiceError},
};

pub async fn login(
    State(state): State<AppState>,
    Payload(login): Payload<AdminLoginRequest>,
) -> Result<Json<AccessToken>, ServiceError> {
    let token = call(&state.user_channel, "User", |response| {
        UserRequest::AdminLogin { login, response }
    })
    .await?;

    Ok(Json(token))
}

pub async fn credit_points(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Payload(credit): Payload<AdminCreditPoints>,
) -> Result<Json<BalanceSummary>, ServiceError> {
    log::info!("Admin {} is crediting {} points.", admin.telegram_id, credit.points);

    let summary = call(&state.user_channel, "User", |response| {
        UserRequest::CreditPoints { credit, response }
    })
    .await?;

    Ok(Json(summary))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Task>>, ServiceError> {
    let tasks = call(&state.task_channel, "Task", |response| TaskRequest::AdminList {
        response,
    })
    .await?;

    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Payload(task): Payload<NewTask>,
) -> Result<(StatusCode, Json<Task>), ServiceError> {
    let task = call(&state.task_channel, "Task", |response| {
        TaskRequest::AdminCreate { task, response }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Payload(changes): Payload<TaskChanges>,
) -> Result<Json<Task>, ServiceError> {
    let task = call(&state.task_channel, "Task", |response| {
        TaskRequest::AdminUpdate {
            id,
            changes,
            response,
        }
    })
    .await?;

    Ok(Json(task))
}

pub async fn list_cards(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<Card>>, ServiceError> {
    let cards = call(&state.card_channel, "Card", |response| {
        CardRequest::AdminListCards { response }
    })
    .await?;

    Ok(Json(cards))
}

pub async fn create_card(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Payload(card): Payload<NewCard>,
) -> Result<(StatusCode, Json<Card>), ServiceError> {
    let card = call(&state.card_channel, "Card", |response| {
        CardRequest::AdminCreateCard { card, response }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn update_card(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    Payload(changes): Payload<CardChanges>,
) -> Result<Json<Card>, ServiceError> {
    let card = call(&state.card_channel, "Card", |response| {
        CardRequest::AdminUpdateCard {
            id,
            changes,
            response,
        }
    })
    .await?;

    Ok(Json(card))
}

pub async fn list_card_details(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<Vec<CardDetail>>, ServiceError> {
    let details = call(&state.card_channel, "Card", |response| {
        CardRequest::AdminListDetails { response }
    })
    .await?;

    Ok(Json(details))
}

pub async fn create_card_detail(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Payload(detail): Payload<NewCardDetail>,
) -> Result<(StatusCode, Json<CardDetail>), ServiceError> {
    let detail = call(&state.card_channel, "Card", |response| {
        CardRequest::AdminCreateDetail { detail, response }
    })
    .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn update_card_detail(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i64>,
    Payload(changes): Payload<CardDetailChanges>,
) -> Result<Json<CardDetail>, ServiceError> {
    let detail = call(&state.card_channel, "Card", |response| {
        CardRequest::AdminUpdateDetail {
            id,
            changes,
            response,
        }
    })
    .await?;

    Ok(Json(detail))
}
