use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const STREAK_LENGTH: i32 = 7;

/// Display format for the next claim time.
pub const CLAIM_TIME_FORMAT: &str = "%d %b %Y %I:%M %p";

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct DailyReward {
    pub day: i32,
    pub points: i64,
}

/// A user's position in the seven day reward cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyStreak {
    pub current_day: i32,
    pub last_claimed_at: Option<DateTime<Utc>>,
}

impl Default for DailyStreak {
    fn default() -> Self {
        DailyStreak {
            current_day: 1,
            last_claimed_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DayStatus {
    Claimed,
    CanClaim,
    WaitUntil(DateTime<Utc>),
    CannotClaim,
}

impl DayStatus {
    pub fn label(&self) -> String {
        match self {
            DayStatus::Claimed => "Claimed".to_string(),
            DayStatus::CanClaim => "Can Claim".to_string(),
            DayStatus::WaitUntil(at) => at.format(CLAIM_TIME_FORMAT).to_string(),
            DayStatus::CannotClaim => "Cannot Claim".to_string(),
        }
    }
}

impl DailyStreak {
    pub fn next_claim_time(&self) -> Option<DateTime<Utc>> {
        self.last_claimed_at.map(|at| at + Duration::days(1))
    }

    /// More than a whole day went by after the claim window opened.
    pub fn missed_window(&self, now: DateTime<Utc>) -> bool {
        self.next_claim_time()
            .map(|next| now > next + Duration::days(1))
            .unwrap_or(false)
    }

    /// Resets a lapsed streak to day one. Returns true when the state changed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.missed_window(now) {
            *self = DailyStreak::default();
            return true;
        }
        false
    }

    pub fn can_claim(&self, now: DateTime<Utc>) -> bool {
        match self.next_claim_time() {
            None => true,
            Some(next) => now >= next,
        }
    }

    /// Moves to the next day of the cycle. Day seven wraps back to day one.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.current_day = if self.current_day < STREAK_LENGTH {
            self.current_day + 1
        } else {
            1
        };
        self.last_claimed_at = Some(now);
    }

    pub fn day_status(&self, day: i32, now: DateTime<Utc>) -> DayStatus {
        if day < self.current_day {
            DayStatus::Claimed
        } else if day == self.current_day {
            match self.next_claim_time() {
                Some(next) if now < next => DayStatus::WaitUntil(next),
                _ => DayStatus::CanClaim,
            }
        } else {
            DayStatus::CannotClaim
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DailyRewardView {
    pub day: i32,
    pub points: i64,
    pub status: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClaimedDailyReward {
    pub current_day: i32,
    pub last_claimed_at: Option<DateTime<Utc>>,
    pub claimed_points: i64,
    /// Points of the day that is claimable next.
    pub reward_points: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_streak_can_claim() {
        let streak = DailyStreak::default();
        assert!(streak.can_claim(at(0)));
        assert_eq!(streak.day_status(1, at(0)), DayStatus::CanClaim);
        assert_eq!(streak.day_status(2, at(0)), DayStatus::CannotClaim);
        assert!(streak.next_claim_time().is_none());
    }

    #[test]
    fn test_claim_waits_a_full_day() {
        let mut streak = DailyStreak::default();
        streak.advance(at(8));

        assert_eq!(streak.current_day, 2);
        assert!(!streak.can_claim(at(20)));
        assert!(streak.can_claim(at(8) + Duration::days(1)));
        assert_eq!(
            streak.day_status(2, at(20)),
            DayStatus::WaitUntil(at(8) + Duration::days(1))
        );
        assert_eq!(streak.day_status(1, at(20)), DayStatus::Claimed);
    }

    #[test]
    fn test_streak_resets_after_missed_day() {
        let mut streak = DailyStreak {
            current_day: 4,
            last_claimed_at: Some(at(8)),
        };

        assert!(!streak.expire(at(8) + Duration::days(2)));
        assert_eq!(streak.current_day, 4);

        assert!(streak.expire(at(9) + Duration::days(2)));
        assert_eq!(streak, DailyStreak::default());
    }

    #[test]
    fn test_day_seven_wraps_to_day_one() {
        let mut streak = DailyStreak {
            current_day: STREAK_LENGTH,
            last_claimed_at: None,
        };
        streak.advance(at(10));
        assert_eq!(streak.current_day, 1);
        assert_eq!(streak.last_claimed_at, Some(at(10)));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(DayStatus::Claimed.label(), "Claimed");
        assert_eq!(DayStatus::CanClaim.label(), "Can Claim");
        assert_eq!(DayStatus::CannotClaim.label(), "Cannot Claim");
        assert_eq!(DayStatus::WaitUntil(at(15)).label(), "01 Nov 2024 03:00 PM");
    }
}
