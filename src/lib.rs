pub mod cli;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod generator;
pub mod reporting;
pub mod storage;
pub mod web;
