pub mod aggregate;
pub mod report;

pub use aggregate::{DailySummary, GameProfit};
pub use report::Report;
