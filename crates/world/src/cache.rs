//! Memoization of chunk generation.
//!
//! Each chunk id moves through `not started -> pending -> completed`. Pending
//! entries carry a [`GenerationContext`] that other callers can join instead
//! of starting duplicate work. Completed entries live in a recency-ordered
//! store and the least recently used one is evicted past capacity.
//!
//! All state sits behind one `std::sync::Mutex`. Every operation is brief
//! and never awaits while holding it; the expensive generation work happens
//! outside, between `claim`/`cache_pending` and `cache_complete`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::sync::watch;

/// Completed entries kept by default.
pub const DEFAULT_CAPACITY: usize = 1000;

/// What happens to pending entries whose generation never finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingPolicy {
    /// Pending entries older than this are treated as abandoned: the next
    /// operation touching the id drops them and wakes joiners with
    /// [`GenerationStatus::Failed`]. `None` keeps them until
    /// [`GenerationCache::fail_pending`] or [`GenerationCache::clear`].
    pub pending_ttl: Option<Duration>,
}

/// Outcome observed by callers joining a pending generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStatus {
    Pending,
    Completed,
    Failed(String),
    /// The cache was cleared while the generation was in flight.
    Cancelled,
}

/// In-flight generation of one chunk. Cheap to clone; all clones observe the
/// same outcome.
#[derive(Clone)]
pub struct GenerationContext {
    chunk_id: String,
    seed: u64,
    started_at: Instant,
    status: Arc<watch::Sender<GenerationStatus>>,
}

impl GenerationContext {
    pub fn new(chunk_id: impl Into<String>, seed: u64) -> Self {
        let (status, _) = watch::channel(GenerationStatus::Pending);
        Self {
            chunk_id: chunk_id.into(),
            seed,
            started_at: Instant::now(),
            status: Arc::new(status),
        }
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn status(&self) -> GenerationStatus {
        self.status.borrow().clone()
    }

    /// Wait until the generation is no longer pending.
    pub async fn wait(&self) -> GenerationStatus {
        let mut rx = self.status.subscribe();
        match rx.wait_for(|s| *s != GenerationStatus::Pending).await {
            Ok(status) => status.clone(),
            // Unreachable while `self` holds the sender.
            Err(_) => GenerationStatus::Cancelled,
        }
    }

    fn resolve(&self, status: GenerationStatus) {
        // `send_replace` updates even when nobody is subscribed yet.
        self.status.send_replace(status);
    }

    fn same_generation(&self, other: &GenerationContext) -> bool {
        Arc::ptr_eq(&self.status, &other.status)
    }
}

impl std::fmt::Debug for GenerationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationContext")
            .field("chunk_id", &self.chunk_id)
            .field("seed", &self.seed)
            .field("elapsed", &self.elapsed())
            .field("status", &self.status())
            .finish()
    }
}

/// Result of [`GenerationCache::claim`].
#[derive(Debug)]
pub enum Claim<T> {
    /// Already generated.
    Cached(T),
    /// Someone else is generating it; wait on the context.
    Join(GenerationContext),
    /// The caller now owns generation and must finish with
    /// `cache_complete_for` or `abandon`.
    Owner(GenerationContext),
}

/// Result of [`GenerationCache::cache_complete_for`].
#[derive(Debug)]
pub enum Completion<T> {
    /// The chunk was stored; this is it.
    Stored(T),
    /// Another generation completed the id first. Its chunk was kept and the
    /// offered one discarded.
    Kept(T),
    /// A newer generation is in flight for the id. Nothing was stored; wait
    /// on its context.
    Superseded(GenerationContext),
}

struct CacheState<T> {
    pending: HashMap<String, GenerationContext>,
    /// Least recently used first.
    completed: IndexMap<String, T>,
}

pub struct GenerationCache<T> {
    state: Mutex<CacheState<T>>,
    capacity: usize,
    policy: PendingPolicy,
}

impl<T: Clone> GenerationCache<T> {
    pub fn new(capacity: usize, policy: PendingPolicy) -> Self {
        Self {
            state: Mutex::new(CacheState {
                pending: HashMap::new(),
                completed: IndexMap::new(),
            }),
            capacity: capacity.max(1),
            policy,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(capacity, PendingPolicy::default())
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().expect("generation cache poisoned")
    }

    /// Atomically return the cached chunk, join the in-flight generation, or
    /// register `context` as the in-flight generation.
    pub fn claim(&self, id: &str, context: GenerationContext) -> Claim<T> {
        let mut state = self.lock();
        if let Some(chunk) = touch(&mut state.completed, id) {
            return Claim::Cached(chunk);
        }
        self.drop_if_stale(&mut state, id);
        if let Some(existing) = state.pending.get(id) {
            return Claim::Join(existing.clone());
        }
        tracing::debug!("Claimed generation of {}", id);
        state.pending.insert(id.to_string(), context.clone());
        Claim::Owner(context)
    }

    /// Register an in-flight generation. If one is already registered it is
    /// kept, so concurrent registrations converge on a single context; returns
    /// whether `context` was the one stored.
    pub fn cache_pending(&self, id: &str, context: GenerationContext) -> bool {
        let mut state = self.lock();
        self.drop_if_stale(&mut state, id);
        if state.pending.contains_key(id) {
            return false;
        }
        state.pending.insert(id.to_string(), context);
        true
    }

    /// Store a finished chunk, clear its pending entry, and wake joiners.
    ///
    /// Completing an id twice keeps the later chunk.
    pub fn cache_complete(&self, id: &str, chunk: T) {
        let mut state = self.lock();
        self.store(&mut state, id, chunk);
    }

    fn store(&self, state: &mut CacheState<T>, id: &str, chunk: T) {
        state.completed.shift_remove(id);
        state.completed.insert(id.to_string(), chunk);
        while state.completed.len() > self.capacity {
            if let Some((evicted, _)) = state.completed.shift_remove_index(0) {
                tracing::debug!("Evicted least recently used chunk {}", evicted);
            }
        }
        if let Some(context) = state.pending.remove(id) {
            context.resolve(GenerationStatus::Completed);
        }
    }

    /// Store a chunk on behalf of `context` without overriding anyone else.
    ///
    /// Stores and wakes joiners if `context` is the registered generation or
    /// nothing is pending and nothing is cached. Otherwise the newer pending
    /// generation or the already cached chunk wins, so every caller of one id
    /// sees a single result.
    pub fn cache_complete_for(&self, context: &GenerationContext, chunk: T) -> Completion<T> {
        let id = context.chunk_id();
        let mut state = self.lock();
        match state.pending.get(id) {
            Some(current) if current.same_generation(context) => {}
            Some(current) => {
                tracing::warn!("Discarding stale generation of {}: a newer one is in flight", id);
                return Completion::Superseded(current.clone());
            }
            None => {
                if let Some(existing) = touch(&mut state.completed, id) {
                    tracing::warn!("Discarding stale generation of {}: already completed", id);
                    return Completion::Kept(existing);
                }
            }
        }
        self.store(&mut state, id, chunk.clone());
        Completion::Stored(chunk)
    }

    /// Completed chunk for `id`, marking it most recently used.
    pub fn get_cached(&self, id: &str) -> Option<T> {
        touch(&mut self.lock().completed, id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        let mut state = self.lock();
        self.drop_if_stale(&mut state, id);
        state.pending.contains_key(id)
    }

    pub fn get_pending_context(&self, id: &str) -> Option<GenerationContext> {
        let mut state = self.lock();
        self.drop_if_stale(&mut state, id);
        state.pending.get(id).cloned()
    }

    /// Abandon the in-flight generation of `id`, waking joiners with
    /// `reason`. Returns false if nothing was pending.
    pub fn fail_pending(&self, id: &str, reason: impl Into<String>) -> bool {
        let Some(context) = self.lock().pending.remove(id) else {
            return false;
        };
        let reason = reason.into();
        tracing::warn!("Generation of {} failed: {}", id, reason);
        context.resolve(GenerationStatus::Failed(reason));
        true
    }

    /// Like [`fail_pending`](Self::fail_pending), but only if `context` is
    /// still the registered generation, so a late failure cannot clobber a
    /// newer owner that took over after a TTL drop.
    pub fn abandon(&self, context: &GenerationContext, reason: impl Into<String>) -> bool {
        let removed = {
            let mut state = self.lock();
            let owned = state
                .pending
                .get(context.chunk_id())
                .is_some_and(|c| c.same_generation(context));
            owned && state.pending.remove(context.chunk_id()).is_some()
        };
        if removed {
            let reason = reason.into();
            tracing::warn!("Generation of {} abandoned: {}", context.chunk_id(), reason);
            context.resolve(GenerationStatus::Failed(reason));
        }
        removed
    }

    /// Drop every pending and completed entry. In-flight joiners are woken
    /// with [`GenerationStatus::Cancelled`].
    pub fn clear(&self) {
        let mut state = self.lock();
        for (_, context) in state.pending.drain() {
            context.resolve(GenerationStatus::Cancelled);
        }
        state.completed.clear();
        tracing::debug!("Generation cache cleared");
    }

    /// Completed entries currently held.
    pub fn len(&self) -> usize {
        self.lock().completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().completed.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> PendingPolicy {
        self.policy
    }

    /// Whether `context` is still the registered generation for its chunk.
    pub fn owns(&self, context: &GenerationContext) -> bool {
        self.lock()
            .pending
            .get(context.chunk_id())
            .is_some_and(|c| c.same_generation(context))
    }

    fn drop_if_stale(&self, state: &mut CacheState<T>, id: &str) {
        let Some(ttl) = self.policy.pending_ttl else {
            return;
        };
        let stale = state.pending.get(id).is_some_and(|c| c.elapsed() > ttl);
        if !stale {
            return;
        }
        if let Some(context) = state.pending.remove(id) {
            tracing::warn!("Dropping pending generation of {} after {:?}", id, context.elapsed());
            context.resolve(GenerationStatus::Failed(format!(
                "pending generation exceeded {ttl:?}"
            )));
        }
    }
}

impl<T: Clone> Default for GenerationCache<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

fn touch<T: Clone>(completed: &mut IndexMap<String, T>, id: &str) -> Option<T> {
    let index = completed.get_index_of(id)?;
    let last = completed.len() - 1;
    completed.move_index(index, last);
    completed.get_index(last).map(|(_, chunk)| chunk.clone())
}
