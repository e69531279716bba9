use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use tiktoken_rs::CoreBPE;

use super::heuristic::estimate_tokens;
use super::worker::{TokenizeFailure, Tokenizer};
use crate::error::AppError;

/// BPE vocabulary used for counting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// GPT-4o and later
    #[default]
    O200kBase,
    /// GPT-3.5 / GPT-4
    Cl100kBase,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::O200kBase => "o200k_base",
            Encoding::Cl100kBase => "cl100k_base",
        }
    }
}

impl FromStr for Encoding {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "o200k_base" | "o200k" => Ok(Encoding::O200kBase),
            "cl100k_base" | "cl100k" => Ok(Encoding::Cl100kBase),
            _ => Err(AppError::InvalidEncoding {
                input: s.to_string(),
            }),
        }
    }
}

pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn new(encoding: Encoding) -> Result<Self, String> {
        let bpe = match encoding {
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
        }
        .map_err(|e| format!("failed to load {}: {e}", encoding.name()))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode_len(&self, text: &str) -> Result<u64, TokenizeFailure> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.bpe.encode_with_special_tokens(text).len() as u64
        }))
        .map_err(|_| TokenizeFailure {
            error: "tokenizer panicked".to_string(),
            estimate: Some(estimate_tokens(text)),
        })
    }
}
