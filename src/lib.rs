//! Performance ranking for team training data.
//!
//! Execution tallies (hits/misses) and weighted qualitative events are
//! aggregated per athlete and fundamento, blended into one score and ranked.
//! Scoring is pure over a fetched [`ranking::Snapshot`]; all I/O lives behind
//! the traits in [`repository`].

pub mod combiner;
pub mod config;
pub mod dates;
pub mod db;
pub mod engine;
pub mod error;
pub mod fundamento;
pub mod import;
pub mod models;
pub mod qualitative;
pub mod quantitative;
pub mod queue;
pub mod ranking;
pub mod repository;

pub use error::{RankingError, Result};
