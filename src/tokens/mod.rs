//! Token counting: async text tokenization, heuristics, and image estimates

mod bpe;
mod counter;
mod heuristic;
mod image;
mod protocol;
mod worker;

pub use bpe::{Encoding, TiktokenTokenizer};
pub use counter::TokenCounter;
pub use heuristic::estimate_tokens;
pub use image::estimate_image_tokens;
pub use protocol::{Signal, TokenizeRequest, WorkerMessage};
pub use worker::{TokenizeFailure, Tokenizer, TokenizerFactory};
