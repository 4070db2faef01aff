pub mod apis;
pub mod config;
pub mod error;
pub mod explorer;
pub mod ftm;
pub mod logging;
pub mod report;
pub mod tables;
