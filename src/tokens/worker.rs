//! Background tokenizer thread
//!
//! BPE encoding is CPU-bound, so it runs on a dedicated OS thread rather than
//! on the async runtime. The thread announces readiness once its tokenizer is
//! built, then answers requests in arrival order until the request channel
//! closes.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use super::protocol::{Signal, TokenizeRequest, WorkerMessage};

/// A tokenization failure, optionally carrying a usable estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizeFailure {
    pub error: String,
    pub estimate: Option<u64>,
}

/// Counts tokens for one encoding
pub trait Tokenizer: Send {
    fn encode_len(&self, text: &str) -> Result<u64, TokenizeFailure>;
}

/// Builds the tokenizer inside the worker thread
pub type TokenizerFactory = Arc<dyn Fn() -> Result<Box<dyn Tokenizer>, String> + Send + Sync>;

pub(super) fn spawn_worker(
    factory: TokenizerFactory,
    requests: mpsc::UnboundedReceiver<TokenizeRequest>,
    replies: mpsc::UnboundedSender<WorkerMessage>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("chatstats-tokenizer".to_string())
        .spawn(move || run_worker(factory, requests, replies))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "tokenizer construction panicked".to_string(), |s| s.to_string()),
    }
}

fn run_worker(
    factory: TokenizerFactory,
    mut requests: mpsc::UnboundedReceiver<TokenizeRequest>,
    replies: mpsc::UnboundedSender<WorkerMessage>,
) {
    let built = panic::catch_unwind(AssertUnwindSafe(|| factory()))
        .unwrap_or_else(|payload| Err(panic_message(payload)));
    let tokenizer = match built {
        Ok(tokenizer) => tokenizer,
        Err(error) => {
            let _ = replies.send(WorkerMessage::Signal(Signal::Unavailable { error }));
            return;
        }
    };
    if replies.send(WorkerMessage::Signal(Signal::Ready)).is_err() {
        return;
    }

    while let Some(TokenizeRequest { id, text }) = requests.blocking_recv() {
        let reply = match tokenizer.encode_len(&text) {
            Ok(count) => WorkerMessage::counted(id, count),
            Err(TokenizeFailure {
                error,
                estimate: Some(count),
            }) => WorkerMessage::fallback(id, count, error),
            Err(TokenizeFailure {
                error,
                estimate: None,
            }) => WorkerMessage::Failed { id, error },
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}
