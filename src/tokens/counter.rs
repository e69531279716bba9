//! Async token counting over the background worker
//!
//! Requests carry a monotonically increasing id; the caller side keeps an
//! `id -> oneshot` table and a dispatcher task resolves entries as replies
//! arrive, in whatever order they come.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::bpe::{Encoding, TiktokenTokenizer};
use super::heuristic::estimate_tokens;
use super::protocol::{Signal, TokenizeRequest, WorkerMessage};
use super::worker::{Tokenizer, TokenizerFactory, spawn_worker};
use crate::error::TokenizerError;

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(160);

type Reply = oneshot::Sender<Result<u64, TokenizerError>>;

struct WorkerHandle {
    generation: u64,
    requests: mpsc::UnboundedSender<TokenizeRequest>,
    ready: Arc<AtomicBool>,
}

#[derive(Default)]
struct Shared {
    handle: Option<WorkerHandle>,
    pending: HashMap<u64, Reply>,
    generation: u64,
    /// Set once the worker could not be constructed; counting stays heuristic
    unavailable: bool,
}

enum Route {
    Heuristic,
    Wait,
    Send(mpsc::UnboundedSender<TokenizeRequest>),
}

pub struct TokenCounter {
    factory: Option<TokenizerFactory>,
    shared: Arc<Mutex<Shared>>,
    next_id: AtomicU64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TokenCounter {
    /// Counter backed by a worker built from `factory`
    pub fn new(factory: TokenizerFactory) -> Self {
        Self {
            factory: Some(factory),
            shared: Arc::new(Mutex::new(Shared::default())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn tiktoken(encoding: Encoding) -> Self {
        Self::new(Arc::new(move || {
            TiktokenTokenizer::new(encoding).map(|t| Box::new(t) as Box<dyn Tokenizer>)
        }))
    }

    /// Counter with no background capability; always estimates
    pub fn heuristic() -> Self {
        Self {
            factory: None,
            shared: Arc::new(Mutex::new(Shared::default())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn is_heuristic(&self) -> bool {
        self.factory.is_none() || lock(&self.shared).unavailable
    }

    /// Count tokens in `text`, waiting for the worker if it is still starting
    pub async fn count_text_tokens(&self, text: &str) -> Result<u64, TokenizerError> {
        if text.is_empty() {
            return Ok(0);
        }

        let mut delay = INITIAL_BACKOFF;
        let requests = loop {
            match self.route() {
                Route::Heuristic => return Ok(estimate_tokens(text)),
                Route::Send(requests) => break requests,
                Route::Wait => {
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.shared).pending.insert(id, tx);

        let request = TokenizeRequest {
            id,
            text: text.to_string(),
        };
        if requests.send(request).is_err() {
            lock(&self.shared).pending.remove(&id);
            return Err(TokenizerError::WorkerCrashed);
        }

        rx.await.unwrap_or(Err(TokenizerError::WorkerCrashed))
    }

    /// Count tokens, degrading to the heuristic on any failure
    pub async fn count_or_estimate(&self, text: &str) -> u64 {
        match self.count_text_tokens(text).await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "token count degraded to estimate");
                estimate_tokens(text)
            }
        }
    }

    /// Stop the worker and reject everything still in flight
    pub fn shutdown(&self) {
        let mut shared = lock(&self.shared);
        shared.handle = None;
        let rejected = shared.pending.len();
        for (_, reply) in shared.pending.drain() {
            let _ = reply.send(Err(TokenizerError::Shutdown));
        }
        if rejected > 0 {
            debug!(rejected, "tokenizer shut down with pending requests");
        }
    }

    fn route(&self) -> Route {
        let Some(factory) = &self.factory else {
            return Route::Heuristic;
        };
        let mut shared = lock(&self.shared);
        if shared.unavailable {
            return Route::Heuristic;
        }
        if shared.handle.is_none() {
            if let Err(err) = self.start_worker(&mut shared, Arc::clone(factory)) {
                warn!(error = %err, "tokenizer worker could not be started; using estimates");
                shared.unavailable = true;
                return Route::Heuristic;
            }
        }
        match &shared.handle {
            Some(handle) if handle.ready.load(Ordering::Acquire) => {
                Route::Send(handle.requests.clone())
            }
            Some(_) => Route::Wait,
            None => Route::Heuristic,
        }
    }

    fn start_worker(&self, shared: &mut Shared, factory: TokenizerFactory) -> std::io::Result<()> {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        spawn_worker(factory, req_rx, reply_tx)?;

        shared.generation += 1;
        let generation = shared.generation;
        let ready = Arc::new(AtomicBool::new(false));
        shared.handle = Some(WorkerHandle {
            generation,
            requests: req_tx,
            ready: Arc::clone(&ready),
        });
        tokio::spawn(dispatch(reply_rx, Arc::clone(&self.shared), generation, ready));
        debug!(generation, "tokenizer worker started");
        Ok(())
    }
}

impl Drop for TokenCounter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn resolve(shared: &Mutex<Shared>, id: u64, result: Result<u64, TokenizerError>) {
    let reply = lock(shared).pending.remove(&id);
    match reply {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => debug!(id, "reply for unknown or abandoned request"),
    }
}

async fn dispatch(
    mut replies: mpsc::UnboundedReceiver<WorkerMessage>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    ready: Arc<AtomicBool>,
) {
    while let Some(message) = replies.recv().await {
        match message {
            WorkerMessage::Signal(Signal::Ready) => {
                ready.store(true, Ordering::Release);
                debug!(generation, "tokenizer worker ready");
            }
            WorkerMessage::Signal(Signal::Unavailable { error }) => {
                warn!(%error, "tokenizer could not be constructed; using estimates");
                let mut state = lock(&shared);
                if state.handle.as_ref().is_some_and(|h| h.generation == generation) {
                    state.handle = None;
                    state.unavailable = true;
                }
                return;
            }
            WorkerMessage::Counted {
                id,
                count,
                error,
                fallback_used,
            } => {
                if let Some(error) = error {
                    debug!(id, %error, fallback_used, "tokenizer returned fallback estimate");
                }
                resolve(&shared, id, Ok(count));
            }
            WorkerMessage::Failed { id, error } => {
                resolve(&shared, id, Err(TokenizerError::Failed(error)));
            }
        }
    }

    // Reply channel closed: the worker thread is gone
    let mut state = lock(&shared);
    if state.handle.as_ref().is_some_and(|h| h.generation == generation) {
        state.handle = None;
        if !ready.load(Ordering::Acquire) {
            // never came up; rebuilding would fail the same way
            state.unavailable = true;
        }
        let rejected = state.pending.len();
        for (_, reply) in state.pending.drain() {
            let _ = reply.send(Err(TokenizerError::WorkerCrashed));
        }
        warn!(generation, rejected, "tokenizer worker exited unexpectedly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::worker::TokenizeFailure;
    use std::sync::atomic::AtomicUsize;

    /// Counts whitespace-separated words, with a few magic inputs
    struct WordCounter;

    impl Tokenizer for WordCounter {
        fn encode_len(&self, text: &str) -> Result<u64, TokenizeFailure> {
            match text {
                "boom" => panic!("worker crash"),
                "estimate me" => Err(TokenizeFailure {
                    error: "unsupported".into(),
                    estimate: Some(42),
                }),
                "reject me" => Err(TokenizeFailure {
                    error: "unsupported".into(),
                    estimate: None,
                }),
                "slow" => {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok(1)
                }
                _ => Ok(text.split_whitespace().count() as u64),
            }
        }
    }

    fn word_factory(builds: Arc<AtomicUsize>) -> TokenizerFactory {
        Arc::new(move || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(WordCounter) as Box<dyn Tokenizer>)
        })
    }

    fn word_counter() -> TokenCounter {
        TokenCounter::new(word_factory(Arc::new(AtomicUsize::new(0))))
    }

    #[tokio::test]
    async fn heuristic_counter_without_background() {
        let counter = TokenCounter::heuristic();
        assert!(counter.is_heuristic());
        assert_eq!(counter.count_text_tokens("abcd").await, Ok(1));
        assert_eq!(counter.count_text_tokens("abcdefghi").await, Ok(3));
    }

    #[tokio::test]
    async fn empty_text_never_starts_worker() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = TokenCounter::new(word_factory(Arc::clone(&builds)));
        assert_eq!(counter.count_text_tokens("").await, Ok(0));
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn counts_through_worker_and_reuses_it() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = TokenCounter::new(word_factory(Arc::clone(&builds)));
        assert_eq!(counter.count_text_tokens("one two three").await, Ok(3));
        assert_eq!(counter.count_text_tokens("four").await, Ok(1));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(!counter.is_heuristic());
    }

    #[tokio::test]
    async fn concurrent_requests_get_their_own_answers() {
        let counter = word_counter();
        let (a, b, c) = tokio::join!(
            counter.count_text_tokens("a"),
            counter.count_text_tokens("a b"),
            counter.count_text_tokens("a b c"),
        );
        assert_eq!((a, b, c), (Ok(1), Ok(2), Ok(3)));
    }

    #[tokio::test]
    async fn waits_for_slow_startup() {
        let factory: TokenizerFactory = Arc::new(|| {
            std::thread::sleep(Duration::from_millis(80));
            Ok(Box::new(WordCounter) as Box<dyn Tokenizer>)
        });
        let counter = TokenCounter::new(factory);
        assert_eq!(counter.count_text_tokens("x y").await, Ok(2));
    }

    #[tokio::test]
    async fn fallback_estimate_resolves_successfully() {
        let counter = word_counter();
        assert_eq!(counter.count_text_tokens("estimate me").await, Ok(42));
    }

    #[tokio::test]
    async fn failure_without_fallback_is_error_then_estimated() {
        let counter = word_counter();
        assert_eq!(
            counter.count_text_tokens("reject me").await,
            Err(TokenizerError::Failed("unsupported".into()))
        );
        // 9 UTF-16 units -> 3
        assert_eq!(counter.count_or_estimate("reject me").await, 3);
    }

    #[tokio::test]
    async fn construction_failure_degrades_to_heuristic() {
        let factory: TokenizerFactory = Arc::new(|| Err("vocab missing".to_string()));
        let counter = TokenCounter::new(factory);
        assert_eq!(counter.count_text_tokens("abcdefgh").await, Ok(2));
        assert!(counter.is_heuristic());
        assert_eq!(counter.count_text_tokens("abcd").await, Ok(1));
    }

    #[tokio::test]
    async fn panicking_construction_degrades_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let factory: TokenizerFactory = {
            let builds = Arc::clone(&builds);
            Arc::new(move || -> Result<Box<dyn Tokenizer>, String> {
                builds.fetch_add(1, Ordering::SeqCst);
                panic!("tokenizer data unreadable")
            })
        };
        let counter = TokenCounter::new(factory);

        let counted = tokio::time::timeout(Duration::from_secs(3), counter.count_text_tokens("abcd"))
            .await
            .expect("count resolves");
        assert_eq!(counted, Ok(1));
        assert!(counter.is_heuristic());
        assert_eq!(counter.count_text_tokens("abcdefgh").await, Ok(2));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn crash_rejects_pending_and_worker_is_recreated() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = TokenCounter::new(word_factory(Arc::clone(&builds)));
        assert_eq!(counter.count_text_tokens("warm up").await, Ok(2));

        assert_eq!(
            counter.count_text_tokens("boom").await,
            Err(TokenizerError::WorkerCrashed)
        );

        assert_eq!(counter.count_text_tokens("after the crash").await, Ok(3));
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_rejects_in_flight_requests() {
        let counter = Arc::new(word_counter());
        assert_eq!(counter.count_text_tokens("ready").await, Ok(1));

        let in_flight = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move { counter.count_text_tokens("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        counter.shutdown();

        assert_eq!(in_flight.await.unwrap(), Err(TokenizerError::Shutdown));
    }

    #[tokio::test]
    async fn replies_are_matched_by_id_in_any_order() {
        let shared = Mutex::new(Shared::default());
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        lock(&shared).pending.insert(1, tx1);
        lock(&shared).pending.insert(2, tx2);

        resolve(&shared, 2, Ok(20));
        resolve(&shared, 1, Ok(10));
        resolve(&shared, 3, Ok(30));

        assert_eq!(rx1.await.unwrap(), Ok(10));
        assert_eq!(rx2.await.unwrap(), Ok(20));
        assert!(lock(&shared).pending.is_empty());
    }
}
