//! Dropout-risk trajectory estimation for tutor dashboards.
//!
//! [`risk::estimate`] turns a student's [`models::RiskSnapshot`] into a
//! [`models::TrajectoryPrediction`]; [`risk::rank_for_intervention`] orders a
//! cohort by who needs attention first. `risk`, `survival`, `filter` and
//! `report` are pure; `db` and `input` are the data providers used by the CLI.

pub mod db;
pub mod error;
pub mod filter;
pub mod input;
pub mod logging;
pub mod models;
pub mod report;
pub mod risk;
pub mod survival;

pub use error::SnapshotError;
pub use models::{RiskSnapshot, TrajectoryPrediction};
pub use risk::{estimate, rank_for_intervention};
