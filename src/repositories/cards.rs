use anyhow::bail;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    users::{debit_balance, lock_user, refresh_level},
    Missing, Rejection,
};
use crate::models::cards::{
    Card, CardChanges, CardClaim, CardDetail, CardDetailChanges, CardLevelView, CardProgress,
    CardStatus, CardView, NewCard, NewCardDetail, UserCardClaim, MAX_CARD_LEVEL,
};

#[derive(Clone)]
pub struct CardRepository {
    conn: PgPool,
}

impl CardRepository {
    pub fn new(conn: PgPool) -> Self {
        CardRepository { conn }
    }

    pub async fn list_cards(&self) -> Result<Vec<Card>, anyhow::Error> {
        let cards = sqlx::query_as::<_, Card>("SELECT * FROM cards ORDER BY card_type, number")
            .fetch_all(&self.conn)
            .await?;

        Ok(cards)
    }

    pub async fn user_claims(&self, user_id: i64) -> Result<Vec<CardClaim>, anyhow::Error> {
        let mut conn = self.conn.acquire().await?;
        user_claims(&mut conn, user_id).await
    }

    pub async fn list_details(&self) -> Result<Vec<CardDetail>, anyhow::Error> {
        let details = sqlx::query_as::<_, CardDetail>(
            "SELECT * FROM card_details ORDER BY card_id, level_number",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(details)
    }

    pub async fn card_level(
        &self,
        card_id: Uuid,
        level_number: i32,
    ) -> Result<Option<CardLevelView>, anyhow::Error> {
        let view = sqlx::query_as::<_, CardLevelView>(
            r#"
                SELECT c.id, c.name, c.number, c.card_type, c.image, c.description,
                    cd.level_number AS level, cd.burning_points, cd.automine_points
                FROM card_details cd
                JOIN cards c ON c.id = cd.card_id
                WHERE cd.card_id = $1 AND cd.level_number = $2
            "#,
        )
        .bind(card_id)
        .bind(level_number)
        .fetch_optional(&self.conn)
        .await?;

        Ok(view)
    }

    /// Buys a card at level zero for the level-zero burning cost.
    pub async fn claim_card(
        &self,
        user_id: i64,
        card_id: Uuid,
    ) -> Result<CardView, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let user = lock_user(&mut tx, user_id).await?;

        let Some(card) = get_card(&mut tx, card_id).await? else {
            bail!(Rejection::new("id", "Not a valid Card ID."));
        };

        let claims = user_claims(&mut tx, user_id).await?;
        if claims.iter().any(|claim| claim.card_id == card_id) {
            bail!(Rejection::general("Already Claimed."));
        }

        let progress = CardProgress::new(user.level_number, &claims);
        if progress.status(&card, false) == CardStatus::Locked {
            bail!(Rejection::general("This card is still locked."));
        }

        let Some(detail) = get_detail(&mut tx, card_id, 0).await? else {
            bail!(Rejection::general("Card details not found."));
        };

        if !debit_balance(&mut tx, user_id, detail.burning_points).await? {
            bail!(Rejection::general("Insufficient Funds."));
        }

        sqlx::query(
            r#"
                INSERT INTO user_card_claims (user_id, card_id, card_level, claimed)
                VALUES ($1, $2, 0, TRUE)
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .execute(&mut *tx)
        .await?;

        refresh_level(&mut tx, user_id).await?;
        tx.commit().await?;

        log::info!("User {} claimed card {} ({}).", user_id, card.name, card.id);

        Ok(CardView::new(card, Some(0), CardStatus::Claimed, Some(&detail)))
    }

    /// Raises a claimed card by one level, paying the next level's burning cost.
    pub async fn upgrade_card(
        &self,
        user_id: i64,
        card_id: Uuid,
    ) -> Result<CardView, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        lock_user(&mut tx, user_id).await?;

        let Some(card) = get_card(&mut tx, card_id).await? else {
            bail!(Rejection::new("id", "Invalid Card ID."));
        };

        let claim = sqlx::query_as::<_, UserCardClaim>(
            "SELECT * FROM user_card_claims WHERE user_id = $1 AND card_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(card_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(claim) = claim else {
            bail!(Rejection::new("id", "You haven't claimed this card yet."));
        };

        if claim.card_level >= MAX_CARD_LEVEL {
            bail!(Rejection::general(
                "Card level has already reached the maximum limit."
            ));
        }

        let next_level = claim.card_level + 1;
        let Some(detail) = get_detail(&mut tx, card_id, next_level).await? else {
            bail!(Rejection::general("Card details not found for the next level."));
        };

        if !debit_balance(&mut tx, user_id, detail.burning_points).await? {
            bail!(Rejection::general("Insufficient funds to upgrade this card."));
        }

        sqlx::query("UPDATE user_card_claims SET card_level = $2 WHERE id = $1")
            .bind(claim.id)
            .bind(next_level)
            .execute(&mut *tx)
            .await?;

        refresh_level(&mut tx, user_id).await?;
        tx.commit().await?;

        log::info!(
            "User {} upgraded card {} to level {}.",
            user_id,
            card.name,
            next_level
        );

        Ok(CardView::new(card, Some(next_level), CardStatus::Claimed, Some(&detail)))
    }

    pub async fn create_card(&self, card: &NewCard) -> Result<Card, anyhow::Error> {
        let card = sqlx::query_as::<_, Card>(
            r#"
                INSERT INTO cards (id, name, number, image, description, card_type)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&card.name)
        .bind(card.number)
        .bind(&card.image)
        .bind(&card.description)
        .bind(card.card_type.as_str())
        .fetch_one(&self.conn)
        .await?;

        Ok(card)
    }

    pub async fn update_card(&self, id: Uuid, changes: CardChanges) -> Result<Card, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(mut card) = card else {
            bail!(Missing("No Cards matches the given query.".to_string()));
        };

        changes.apply(&mut card);

        let card = sqlx::query_as::<_, Card>(
            r#"
                UPDATE cards
                SET name = $2, number = $3, image = $4, description = $5, card_type = $6
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(card.id)
        .bind(&card.name)
        .bind(card.number)
        .bind(&card.image)
        .bind(&card.description)
        .bind(&card.card_type)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(card)
    }

    pub async fn create_detail(&self, detail: &NewCardDetail) -> Result<CardDetail, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        if get_card(&mut tx, detail.card_id).await?.is_none() {
            bail!(Rejection::new("card_id", "Not a valid Card ID."));
        }
        if get_detail(&mut tx, detail.card_id, detail.level_number).await?.is_some() {
            bail!(Rejection::general("Details for this card level already exist."));
        }

        let created = sqlx::query_as::<_, CardDetail>(
            r#"
                INSERT INTO card_details (card_id, level_number, burning_points, automine_points)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            "#,
        )
        .bind(detail.card_id)
        .bind(detail.level_number)
        .bind(detail.burning_points)
        .bind(detail.automine_points)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    pub async fn update_detail(
        &self,
        id: i64,
        changes: CardDetailChanges,
    ) -> Result<CardDetail, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let detail = sqlx::query_as::<_, CardDetail>(
            "SELECT * FROM card_details WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(mut detail) = detail else {
            bail!(Missing("No CardsDetails matches the given query.".to_string()));
        };

        changes.apply(&mut detail);

        if get_card(&mut tx, detail.card_id).await?.is_none() {
            bail!(Rejection::new("card_id", "Not a valid Card ID."));
        }
        if let Some(existing) = get_detail(&mut tx, detail.card_id, detail.level_number).await? {
            if existing.id != detail.id {
                bail!(Rejection::general("Details for this card level already exist."));
            }
        }

        let updated = sqlx::query_as::<_, CardDetail>(
            r#"
                UPDATE card_details
                SET card_id = $2, level_number = $3, burning_points = $4, automine_points = $5
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(detail.id)
        .bind(detail.card_id)
        .bind(detail.level_number)
        .bind(detail.burning_points)
        .bind(detail.automine_points)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }
}

async fn get_card(conn: &mut PgConnection, card_id: Uuid) -> Result<Option<Card>, anyhow::Error> {
    let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
        .bind(card_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(card)
}

async fn get_detail(
    conn: &mut PgConnection,
    card_id: Uuid,
    level_number: i32,
) -> Result<Option<CardDetail>, anyhow::Error> {
    let detail = sqlx::query_as::<_, CardDetail>(
        "SELECT * FROM card_details WHERE card_id = $1 AND level_number = $2",
    )
    .bind(card_id)
    .bind(level_number)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(detail)
}

async fn user_claims(
    conn: &mut PgConnection,
    user_id: i64,
) -> Result<Vec<CardClaim>, anyhow::Error> {
    let claims = sqlx::query_as::<_, CardClaim>(
        r#"
            SELECT ucc.card_id, c.name, ucc.card_level
            FROM user_card_claims ucc
            JOIN cards c ON c.id = ucc.card_id
            WHERE ucc.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(claims)
}
