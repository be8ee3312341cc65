use serde::{Deserialize, Serialize};

/// Result row of the per-game profit aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameProfit {
    pub game_name: String,
    pub total_profit: i64,
}

/// Result row of the per-day, per-brand, per-game aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Calendar day in `YYYY-MM-DD` form
    pub date: String,
    pub brand_id: String,
    pub game_name: String,
    pub total_bet: i64,
    pub total_turnover: i64,
    pub average_payout: f64,
    pub total_count: u64,
    pub positive_win: i64,
}
