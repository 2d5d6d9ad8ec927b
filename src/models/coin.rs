use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stored extent of a coin's daily price history, as `[earliest_date, latest_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinCoverage {
    pub coin_id: String,
    pub earliest_date: NaiveDate,
    pub latest_date: NaiveDate,
}

impl CoinCoverage {
    /// Empty coverage anchored at `date`.
    pub fn empty_at(coin_id: &str, date: NaiveDate) -> Self {
        Self {
            coin_id: coin_id.to_string(),
            earliest_date: date,
            latest_date: date,
        }
    }
}
