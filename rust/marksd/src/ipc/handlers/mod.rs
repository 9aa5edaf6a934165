pub mod analytics;
pub mod backup_exchange;
pub mod board;
pub mod core;
pub mod entries;
pub mod grading;
pub mod roles;
