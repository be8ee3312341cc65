use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single synthetic gaming report.
///
/// Field names double as column names in every backend, so renaming one
/// means touching each adapter's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub username: String,
    pub username_game: String,
    pub currency: String,
    pub winloss: i64,
    pub bet: i64,
    pub turnover: i64,
    pub payout: f64,
    pub bet_time: DateTime<Utc>,
    pub brand_id: String,
    pub brand_name: String,
    pub game_id: String,
    pub game_name: String,
    pub game_type: String,
    pub transaction_id: String,
    pub round_id: String,
}

/// Column order shared by the SQL adapters.
pub const REPORT_COLUMNS: [&str; 15] = [
    "username",
    "username_game",
    "currency",
    "winloss",
    "bet",
    "turnover",
    "payout",
    "bet_time",
    "brand_id",
    "brand_name",
    "game_id",
    "game_name",
    "game_type",
    "transaction_id",
    "round_id",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_uses_column_names() {
        let report = Report {
            username: "u".to_string(),
            username_game: "u_pgsoft".to_string(),
            currency: "USD".to_string(),
            winloss: -12,
            bet: 100,
            turnover: 200,
            payout: 1.5,
            bet_time: "2025-01-02T03:04:05Z".parse().unwrap(),
            brand_id: "brand1".to_string(),
            brand_name: "Brand 1".to_string(),
            game_id: "game7".to_string(),
            game_name: "Game 7".to_string(),
            game_type: "type2".to_string(),
            transaction_id: "tx1".to_string(),
            round_id: "round1".to_string(),
        };

        let value = serde_json::to_value(&report).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), REPORT_COLUMNS.len());
        for column in REPORT_COLUMNS {
            assert!(object.contains_key(column), "missing {}", column);
        }
    }
}
