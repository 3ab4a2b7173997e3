use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cards at this level can no longer be upgraded.
pub const MAX_CARD_LEVEL: i32 = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Eternals,
    Divine,
    Specials,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Eternals => "eternals",
            CardType::Divine => "divine",
            CardType::Specials => "specials",
        }
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eternals" => Ok(CardType::Eternals),
            "divine" => Ok(CardType::Divine),
            "specials" => Ok(CardType::Specials),
            other => Err(format!("\"{other}\" is not a valid card type.")),
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Card {
    pub id: Uuid,
    pub name: String,
    pub number: i32,
    pub image: Option<String>,
    pub description: Option<String>,
    pub card_type: String,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CardDetail {
    pub id: i64,
    pub card_id: Uuid,
    pub level_number: i32,
    pub burning_points: i64,
    pub automine_points: i64,
}

/// A user's claim joined with the claimed card's name.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CardClaim {
    pub card_id: Uuid,
    pub name: String,
    pub card_level: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Claimed,
    Unlocked,
    Locked,
}

#[derive(Clone, Debug, Serialize)]
pub struct CardView {
    pub id: Uuid,
    pub name: String,
    pub number: i32,
    pub image: Option<String>,
    pub description: Option<String>,
    pub card_type: String,
    pub claim: bool,
    pub level: i32,
    pub status: CardStatus,
    pub burning_points: Option<i64>,
    pub automine_points: Option<i64>,
}

impl CardView {
    pub fn new(
        card: Card,
        level: Option<i32>,
        status: CardStatus,
        detail: Option<&CardDetail>,
    ) -> Self {
        CardView {
            id: card.id,
            name: card.name,
            number: card.number,
            image: card.image,
            description: card.description,
            card_type: card.card_type,
            claim: level.is_some(),
            level: level.unwrap_or(0),
            status,
            burning_points: detail.map(|d| d.burning_points),
            automine_points: detail.map(|d| d.automine_points),
        }
    }
}

/// Response of the card details lookup: one card at one level.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct CardLevelView {
    pub id: Uuid,
    pub name: String,
    pub number: i32,
    pub card_type: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub level: i32,
    pub burning_points: i64,
    pub automine_points: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClaimCard {
    pub id: Uuid,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpgradeCard {
    pub id: Uuid,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CardLevelQuery {
    pub card_id: Option<String>,
    pub level_number: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewCard {
    pub name: String,
    #[serde(default = "default_card_number")]
    pub number: i32,
    pub image: Option<String>,
    pub description: Option<String>,
    pub card_type: CardType,
}

fn default_card_number() -> i32 {
    1
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CardChanges {
    pub name: Option<String>,
    pub number: Option<i32>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub card_type: Option<CardType>,
}

impl CardChanges {
    pub fn apply(self, card: &mut Card) {
        if let Some(name) = self.name {
            card.name = name;
        }
        if let Some(number) = self.number {
            card.number = number;
        }
        if self.image.is_some() {
            card.image = self.image;
        }
        if self.description.is_some() {
            card.description = self.description;
        }
        if let Some(card_type) = self.card_type {
            card.card_type = card_type.as_str().to_string();
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewCardDetail {
    pub card_id: Uuid,
    #[serde(default)]
    pub level_number: i32,
    pub burning_points: i64,
    pub automine_points: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CardDetailChanges {
    pub card_id: Option<Uuid>,
    pub level_number: Option<i32>,
    pub burning_points: Option<i64>,
    pub automine_points: Option<i64>,
}

impl CardDetailChanges {
    pub fn apply(self, detail: &mut CardDetail) {
        if let Some(card_id) = self.card_id {
            detail.card_id = card_id;
        }
        if let Some(level_number) = self.level_number {
            detail.level_number = level_number;
        }
        if let Some(burning_points) = self.burning_points {
            detail.burning_points = burning_points;
        }
        if let Some(automine_points) = self.automine_points {
            detail.automine_points = automine_points;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    UserLevel(i32),
    Claimed(&'static str),
    CardLevel(&'static str, i32),
}

use Requirement::{CardLevel, Claimed, UserLevel};

const UNLOCK_TABLE: &[(CardType, &str, &[Requirement])] = &[
    (CardType::Eternals, "Eternal Flame", &[UserLevel(2)]),
    (CardType::Eternals, "Infinity Stone", &[UserLevel(2)]),
    (CardType::Eternals, "Timeless Spirit", &[UserLevel(2)]),
    (
        CardType::Eternals,
        "Arcane Eternity",
        &[Claimed("Infinity Stone"), Claimed("Timeless Spirit")],
    ),
    (CardType::Eternals, "Celestial Bond", &[CardLevel("Infinity Stone", 5)]),
    (CardType::Eternals, "Boundless Horizon", &[UserLevel(3)]),
    (CardType::Eternals, "Endless Resolve", &[CardLevel("Arcane Eternity", 3)]),
    (CardType::Eternals, "Infinite Grace", &[Claimed("Celestial Bond")]),
    (CardType::Eternals, "Eon's Blessing", &[UserLevel(3)]),
    (CardType::Eternals, "Perpetual Strength", &[Claimed("Eon's Blessing")]),
    (CardType::Divine, "Divine Radiance", &[UserLevel(2)]),
    (CardType::Divine, "Heavenly Beacon", &[UserLevel(2)]),
    (CardType::Divine, "Seraphim's Grace", &[UserLevel(4)]),
    (CardType::Divine, "Ascendant Aura", &[UserLevel(4)]),
    (
        CardType::Divine,
        "Sanctified Chalice",
        &[CardLevel("Boundless Horizon", 4), CardLevel("Seraphim's Grace", 2)],
    ),
    (
        CardType::Divine,
        "Celestial Crown",
        &[CardLevel("Celestial Bond", 3), CardLevel("Heavenly Beacon", 2)],
    ),
    (
        CardType::Divine,
        "Elysian Blessing",
        &[CardLevel("Infinity Stone", 5), CardLevel("Celestial Crown", 2)],
    ),
    (
        CardType::Divine,
        "Divine Wrath",
        &[CardLevel("Boundless Horizon", 4), CardLevel("Seraphim's Grace", 2)],
    ),
    (
        CardType::Divine,
        "Halo of Eternity",
        &[CardLevel("Infinity Stone", 5), CardLevel("Celestial Crown", 2)],
    ),
    (
        CardType::Divine,
        "Transcendent Light",
        &[CardLevel("Sanctified Chalice", 3), CardLevel("Halo of Eternity", 2)],
    ),
    (CardType::Specials, "Time Warp", &[UserLevel(5)]),
    (
        CardType::Specials,
        "Shadow Step",
        &[CardLevel("Sanctified Chalice", 3), CardLevel("Halo of Eternity", 2)],
    ),
    (CardType::Specials, "Elemental Burst", &[UserLevel(4)]),
    (CardType::Specials, "Magic Shield", &[UserLevel(6)]),
    (CardType::Specials, "Lucky Charm", &[UserLevel(7)]),
];

pub fn unlock_requirements(card_type: &str, name: &str) -> Option<&'static [Requirement]> {
    let card_type = card_type.parse::<CardType>().ok()?;
    UNLOCK_TABLE
        .iter()
        .find(|(t, n, _)| *t == card_type && *n == name)
        .map(|(_, _, requirements)| *requirements)
}

/// The user's standing against the unlock table.
pub struct CardProgress {
    pub user_level: i32,
    /// Claimed card name to its current level.
    pub claimed_levels: HashMap<String, i32>,
}

impl CardProgress {
    pub fn new(user_level: i32, claims: &[CardClaim]) -> Self {
        CardProgress {
            user_level,
            claimed_levels: claims
                .iter()
                .map(|claim| (claim.name.clone(), claim.card_level))
                .collect(),
        }
    }

    fn satisfies(&self, requirement: &Requirement) -> bool {
        match *requirement {
            UserLevel(level) => self.user_level >= level,
            Claimed(name) => self.claimed_levels.contains_key(name),
            CardLevel(name, level) => self.claimed_levels.get(name).copied().unwrap_or(0) >= level,
        }
    }

    /// Cards missing from the unlock table stay locked.
    pub fn is_unlocked(&self, card_type: &str, name: &str) -> bool {
        unlock_requirements(card_type, name)
            .map(|requirements| requirements.iter().all(|r| self.satisfies(r)))
            .unwrap_or(false)
    }

    pub fn status(&self, card: &Card, claimed: bool) -> CardStatus {
        if claimed {
            CardStatus::Claimed
        } else if self.is_unlocked(&card.card_type, &card.name) {
            CardStatus::Unlocked
        } else {
            CardStatus::Locked
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct UserCardClaim {
    pub id: i64,
    pub user_id: i64,
    pub card_id: Uuid,
    pub card_level: i32,
    pub claimed: bool,
    pub date_claimed: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(name: &str, card_level: i32) -> CardClaim {
        CardClaim {
            card_id: Uuid::new_v4(),
            name: name.to_string(),
            card_level,
        }
    }

    fn card(card_type: CardType, name: &str) -> Card {
        Card {
            id: Uuid::new_v4(),
            name: name.to_string(),
            number: 1,
            image: None,
            description: None,
            card_type: card_type.as_str().to_string(),
        }
    }

    #[test]
    fn test_level_gated_cards() {
        let beginner = CardProgress::new(1, &[]);
        let adept = CardProgress::new(2, &[]);

        assert!(!beginner.is_unlocked("eternals", "Eternal Flame"));
        assert!(adept.is_unlocked("eternals", "Eternal Flame"));
        assert!(!adept.is_unlocked("specials", "Lucky Charm"));
        assert!(CardProgress::new(7, &[]).is_unlocked("specials", "Lucky Charm"));
    }

    #[test]
    fn test_claim_gated_cards_need_every_dependency() {
        let one = CardProgress::new(1, &[claim("Infinity Stone", 0)]);
        assert!(!one.is_unlocked("eternals", "Arcane Eternity"));

        let both = CardProgress::new(
            1,
            &[claim("Infinity Stone", 0), claim("Timeless Spirit", 0)],
        );
        assert!(both.is_unlocked("eternals", "Arcane Eternity"));
    }

    #[test]
    fn test_card_level_gated_cards() {
        let low = CardProgress::new(9, &[claim("Infinity Stone", 4)]);
        assert!(!low.is_unlocked("eternals", "Celestial Bond"));

        let high = CardProgress::new(1, &[claim("Infinity Stone", 5)]);
        assert!(high.is_unlocked("eternals", "Celestial Bond"));

        let crown = CardProgress::new(
            1,
            &[claim("Celestial Bond", 3), claim("Heavenly Beacon", 2)],
        );
        assert!(crown.is_unlocked("divine", "Celestial Crown"));
        assert!(!crown.is_unlocked("divine", "Elysian Blessing"));
    }

    #[test]
    fn test_card_type_must_match_table() {
        let progress = CardProgress::new(10, &[]);
        assert!(progress.is_unlocked("specials", "Time Warp"));
        assert!(!progress.is_unlocked("divine", "Time Warp"));
        assert!(!progress.is_unlocked("specials", "Unknown Card"));
    }

    #[test]
    fn test_status_prefers_claimed() {
        let progress = CardProgress::new(1, &[]);
        let flame = card(CardType::Eternals, "Eternal Flame");

        assert_eq!(progress.status(&flame, true), CardStatus::Claimed);
        assert_eq!(progress.status(&flame, false), CardStatus::Locked);
        assert_eq!(
            CardProgress::new(2, &[]).status(&flame, false),
            CardStatus::Unlocked
        );
    }

    #[test]
    fn test_card_view_defaults_for_unclaimed_card() {
        let view = CardView::new(
            card(CardType::Divine, "Divine Radiance"),
            None,
            CardStatus::Locked,
            None,
        );
        assert!(!view.claim);
        assert_eq!(view.level, 0);
        assert!(view.burning_points.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "locked");
        assert_eq!(json["card_type"], "divine");
    }
}
