//! Credit risk scoring: model training and HTTP prediction serving.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod tracking;
pub mod training;

pub use error::{AppError, Result};
