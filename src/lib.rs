pub mod builder;
pub mod config;
pub mod cpmm;
pub mod db;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod solana;
pub mod submission;
pub mod utils;
pub mod valuation;

pub use error::{Error, Result};
