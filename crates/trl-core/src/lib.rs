#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod errors;
pub mod payload;
pub mod state;
pub mod traits;
pub mod types;
