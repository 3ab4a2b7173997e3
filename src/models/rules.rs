use serde::Serialize;

/// One row of the level table: a balance range and the tap economy that goes with it.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Rule {
    pub id: i32,
    pub level_number: i32,
    pub level_name: String,
    pub lower_points: i64,
    pub higher_points: i64,
    pub per_tap: i32,
    pub point_refill: i32,
    pub number_of_tap: i32,
}

impl Rule {
    pub fn contains(&self, balance: i64) -> bool {
        self.lower_points <= balance && balance <= self.higher_points
    }
}

/// Returns the rule to move to, if any. Levels only ever go up.
pub fn promote(current_level: i32, balance: i64, rule: Option<&Rule>) -> Option<&Rule> {
    rule.filter(|rule| rule.contains(balance) && rule.level_number > current_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(level_number: i32, lower_points: i64, higher_points: i64) -> Rule {
        Rule {
            id: level_number,
            level_number,
            level_name: format!("Level {level_number}"),
            lower_points,
            higher_points,
            per_tap: 1,
            point_refill: 1,
            number_of_tap: 500,
        }
    }

    #[test]
    fn test_promote_raises_level_within_range() {
        let next = rule(2, 5_000, 24_999);
        let promoted = promote(1, 5_000, Some(&next)).unwrap();
        assert_eq!(promoted.level_number, 2);
        assert_eq!(promoted.level_name, "Level 2");
    }

    #[test]
    fn test_promote_never_lowers_level() {
        let lower = rule(2, 0, 4_999);
        assert!(promote(3, 100, Some(&lower)).is_none());
    }

    #[test]
    fn test_promote_ignores_same_level() {
        let same = rule(2, 5_000, 24_999);
        assert!(promote(2, 6_000, Some(&same)).is_none());
    }

    #[test]
    fn test_promote_requires_balance_in_range() {
        let next = rule(2, 5_000, 24_999);
        assert!(promote(1, 25_000, Some(&next)).is_none());
        assert!(promote(1, 100, None).is_none());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let r = rule(4, 100, 200);
        assert!(r.contains(100));
        assert!(r.contains(200));
        assert!(!r.contains(99));
        assert!(!r.contains(201));
    }
}
