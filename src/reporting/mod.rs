pub mod compare;
pub mod date_range;
pub mod writes;

pub use compare::{BackendReport, Comparison, Timed};
pub use date_range::{DateRange, DateRangeError};
pub use writes::render_write_stats;
