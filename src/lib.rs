//! Per-model token usage and cost statistics for ChatGPT conversation exports.
//!
//! The binary parses `conversations.json` and hands the top-level array to
//! [`core::Orchestrator::run`], which returns the aggregated day/hour/model
//! series.

pub mod consts;
pub mod core;
pub mod data;
pub mod error;
pub mod pricing;
pub mod tokens;
mod utils;
