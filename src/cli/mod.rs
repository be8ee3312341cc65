pub mod config;
pub mod run;
pub mod serve;

pub use run::{run, RunError, RunOptions};
