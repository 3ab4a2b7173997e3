use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::cards::{
        Card, CardChanges, CardClaim, CardDetail, CardDetailChanges, CardLevelQuery,
        CardLevelView, CardProgress, CardView, NewCard, NewCardDetail, MAX_CARD_LEVEL,
    },
    repositories::{cards::CardRepository, users::UserRepository},
};

const DETAILS_NOT_FOUND: &str = "Card details not found.";

pub enum CardRequest {
    List {
        user_id: i64,
        response: oneshot::Sender<Result<Vec<CardView>, ServiceError>>,
    },
    Claim {
        user_id: i64,
        card_id: Uuid,
        response: oneshot::Sender<Result<CardView, ServiceError>>,
    },
    Upgrade {
        user_id: i64,
        card_id: Uuid,
        response: oneshot::Sender<Result<CardView, ServiceError>>,
    },
    Details {
        query: CardLevelQuery,
        response: oneshot::Sender<Result<CardLevelView, ServiceError>>,
    },
    AdminListCards {
        response: oneshot::Sender<Result<Vec<Card>, ServiceError>>,
    },
    AdminCreateCard {
        card: NewCard,
        response: oneshot::Sender<Result<Card, ServiceError>>,
    },
    AdminUpdateCard {
        id: Uuid,
        changes: CardChanges,
        response: oneshot::Sender<Result<Card, ServiceError>>,
    },
    AdminListDetails {
        response: oneshot::Sender<Result<Vec<CardDetail>, ServiceError>>,
    },
    AdminCreateDetail {
        detail: NewCardDetail,
        response: oneshot::Sender<Result<CardDetail, ServiceError>>,
    },
    AdminUpdateDetail {
        id: i64,
        changes: CardDetailChanges,
        response: oneshot::Sender<Result<CardDetail, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct CardRequestHandler {
    repository: CardRepository,
    users: UserRepository,
}

impl CardRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = CardRepository::new(sql_conn.clone());
        let users = UserRepository::new(sql_conn);

        CardRequestHandler { repository, users }
    }

    async fn list(&self, user_id: i64) -> Result<Vec<CardView>, ServiceError> {
        let user = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found.".to_string()))?;

        let cards = self.repository.list_cards().await?;
        let claims = self.repository.user_claims(user_id).await?;
        let details = self.repository.list_details().await?;

        Ok(card_views(cards, user.level_number, &claims, &details))
    }

    async fn claim(&self, user_id: i64, card_id: Uuid) -> Result<CardView, ServiceError> {
        Ok(self.repository.claim_card(user_id, card_id).await?)
    }

    async fn upgrade(&self, user_id: i64, card_id: Uuid) -> Result<CardView, ServiceError> {
        Ok(self.repository.upgrade_card(user_id, card_id).await?)
    }

    async fn details(&self, query: CardLevelQuery) -> Result<CardLevelView, ServiceError> {
        let (card_id, level_number) = parse_level_query(&query)?;

        self.repository
            .card_level(card_id, level_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(DETAILS_NOT_FOUND.to_string()))
    }

    async fn admin_list_cards(&self) -> Result<Vec<Card>, ServiceError> {
        Ok(self.repository.list_cards().await?)
    }

    async fn admin_create_card(&self, card: NewCard) -> Result<Card, ServiceError> {
        validate_card_name(&card.name)?;

        let card = self.repository.create_card(&card).await?;
        log::info!("Created card {} ({}).", card.name, card.id);

        Ok(card)
    }

    async fn admin_update_card(
        &self,
        id: Uuid,
        changes: CardChanges,
    ) -> Result<Card, ServiceError> {
        if let Some(name) = &changes.name {
            validate_card_name(name)?;
        }

        let card = self.repository.update_card(id, changes).await?;
        log::info!("Updated card {} ({}).", card.name, card.id);

        Ok(card)
    }

    async fn admin_list_details(&self) -> Result<Vec<CardDetail>, ServiceError> {
        Ok(self.repository.list_details().await?)
    }

    async fn admin_create_detail(&self, detail: NewCardDetail) -> Result<CardDetail, ServiceError> {
        validate_level(detail.level_number)?;
        validate_points("burning_points", detail.burning_points)?;
        validate_points("automine_points", detail.automine_points)?;

        Ok(self.repository.create_detail(&detail).await?)
    }

    async fn admin_update_detail(
        &self,
        id: i64,
        changes: CardDetailChanges,
    ) -> Result<CardDetail, ServiceError> {
        if let Some(level_number) = changes.level_number {
            validate_level(level_number)?;
        }
        if let Some(points) = changes.burning_points {
            validate_points("burning_points", points)?;
        }
        if let Some(points) = changes.automine_points {
            validate_points("automine_points", points)?;
        }

        Ok(self.repository.update_detail(id, changes).await?)
    }
}

/// Every card with the caller's claim, status and the detail row of its current level.
fn card_views(
    cards: Vec<Card>,
    user_level: i32,
    claims: &[CardClaim],
    details: &[CardDetail],
) -> Vec<CardView> {
    let progress = CardProgress::new(user_level, claims);
    let claimed: HashMap<Uuid, i32> = claims
        .iter()
        .map(|claim| (claim.card_id, claim.card_level))
        .collect();
    let details: HashMap<(Uuid, i32), &CardDetail> = details
        .iter()
        .map(|detail| ((detail.card_id, detail.level_number), detail))
        .collect();

    cards
        .into_iter()
        .map(|card| {
            let level = claimed.get(&card.id).copied();
            let status = progress.status(&card, level.is_some());
            let detail = details.get(&(card.id, level.unwrap_or(0))).copied();
            CardView::new(card, level, status, detail)
        })
        .collect()
}

fn parse_level_query(query: &CardLevelQuery) -> Result<(Uuid, i32), ServiceError> {
    let not_found = || ServiceError::NotFound(DETAILS_NOT_FOUND.to_string());

    let card_id = query
        .card_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(not_found)?;
    let level_number = query
        .level_number
        .as_deref()
        .and_then(|level| level.parse::<i32>().ok())
        .ok_or_else(not_found)?;

    Ok((card_id, level_number))
}

fn validate_card_name(name: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::validation("name", "This field may not be blank."));
    }
    Ok(())
}

fn validate_level(level_number: i32) -> Result<(), ServiceError> {
    if !(0..=MAX_CARD_LEVEL).contains(&level_number) {
        return Err(ServiceError::validation(
            "level_number",
            format!("Ensure this value is between 0 and {MAX_CARD_LEVEL}."),
        ));
    }
    Ok(())
}

fn validate_points(field: &str, points: i64) -> Result<(), ServiceError> {
    if points < 0 {
        return Err(ServiceError::validation(
            field,
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    Ok(())
}

#[async_trait]
impl RequestHandler<CardRequest> for CardRequestHandler {
    async fn handle_request(&self, request: CardRequest) {
        match request {
            CardRequest::List { user_id, response } => {
                let cards = self.list(user_id).await;
                let _ = response.send(cards);
            }
            CardRequest::Claim {
                user_id,
                card_id,
                response,
            } => {
                let card = self.claim(user_id, card_id).await;
                let _ = response.send(card);
            }
            CardRequest::Upgrade {
                user_id,
                card_id,
                response,
            } => {
                let card = self.upgrade(user_id, card_id).await;
                let _ = response.send(card);
            }
            CardRequest::Details { query, response } => {
                let details = self.details(query).await;
                let _ = response.send(details);
            }
            CardRequest::AdminListCards { response } => {
                let cards = self.admin_list_cards().await;
                let _ = response.send(cards);
            }
            CardRequest::AdminCreateCard { card, response } => {
                let card = self.admin_create_card(card).await;
                let _ = response.send(card);
            }
            CardRequest::AdminUpdateCard {
                id,
                changes,
                response,
            } => {
                let card = self.admin_update_card(id, changes).await;
                let _ = response.send(card);
            }
            CardRequest::AdminListDetails { response } => {
                let details = self.admin_list_details().await;
                let _ = response.send(details);
            }
            CardRequest::AdminCreateDetail { detail, response } => {
                let detail = self.admin_create_detail(detail).await;
                let _ = response.send(detail);
            }
            CardRequest::AdminUpdateDetail {
                id,
                changes,
                response,
            } => {
                let detail = self.admin_update_detail(id, changes).await;
                let _ = response.send(detail);
            }
        }
    }
}

pub struct CardService;

impl CardService {
    pub fn new() -> Self {
        CardService {}
    }
}

#[async_trait]
impl Service<CardRequest, CardRequestHandler> for CardService {}
