//! Core aggregation: conversation walking, usage buckets, and run orchestration

mod aggregator;
mod orchestrator;
mod scan;
mod types;
mod walker;

pub use orchestrator::Orchestrator;
pub use types::{Aggregator, BucketWithHours, Counters, DayBucket, HourBucket, RunResult};
pub use walker::ConversationWalker;
