pub mod boosters;
pub mod cards;
pub mod earnings;
pub mod leaderboards;
pub mod rewards;
pub mod rules;
pub mod tasks;
pub mod users;
