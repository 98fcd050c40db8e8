//! Process-wide cache of loaded models.
//!
//! [`ModelManager`] owns every model instance. Callers borrow them through
//! [`ModelHandle`]s, which count as references until dropped.
//!
//! # Loading
//!
//! The first `acquire` for a key spawns one load task and parks a shared
//! future for it in the slot. Concurrent callers for the same key wait on
//! that same future, so N callers trigger exactly one [`ModelLoader::load`]
//! and all observe the same model or the same error. A failed load leaves
//! the slot empty; the next `acquire` retries.
//!
//! Each caller waits at most `load_timeout`. Timing out only gives up that
//! caller's wait: the load task keeps running and installs the model for
//! whoever asks next.
//!
//! # Eviction
//!
//! After a load, least-recently-used entries with no references (and no
//! callers about to claim them) are evicted while the cache holds more than
//! `capacity` models or more than `memory_budget` bytes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{Result, SatzbauError};
use crate::model::{
    GrammarModel, LinguisticModel, LoadRequest, LoadedModel, ModelKey, ModelKind, ModelLoader,
};

pub const DEFAULT_CACHE_CAPACITY: usize = 4;
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Resource limits for the model cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLimits {
    /// Maximum number of loaded models kept around.
    pub capacity: usize,
    /// Optional cap on the summed memory footprint of loaded models.
    pub memory_budget: Option<u64>,
    /// How long a single caller waits for a load before giving up.
    pub load_timeout: Duration,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            memory_budget: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

/// Snapshot of one loaded model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub key: ModelKey,
    pub model_id: String,
    pub loaded_at: DateTime<Utc>,
    #[serde(rename = "loadMs", serialize_with = "serialize_millis")]
    pub load_duration: Duration,
    pub memory_bytes: u64,
    pub ref_count: usize,
    pub last_used: DateTime<Utc>,
}

fn serialize_millis<S: serde::Serializer>(
    d: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}

type LoadOutcome = std::result::Result<u64, SatzbauError>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

struct PendingLoad {
    generation: u64,
    /// Callers currently waiting on this load.
    waiters: usize,
    future: SharedLoad,
}

struct Entry {
    model: LoadedModel,
    model_id: String,
    generation: u64,
    ref_count: usize,
    /// Waiters of the load that have not claimed their reference yet.
    pending_claims: usize,
    loaded_at: DateTime<Utc>,
    load_duration: Duration,
    memory_bytes: u64,
    last_used: Instant,
    last_used_at: DateTime<Utc>,
}

enum Slot {
    Loading(PendingLoad),
    Loaded(Entry),
}

struct Inner {
    catalog: HashMap<ModelKey, String>,
    loader: Arc<dyn ModelLoader>,
    limits: CacheLimits,
    slots: Mutex<AHashMap<ModelKey, Slot>>,
    next_generation: AtomicU64,
}

/// Owner of all model instances. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct ModelManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelManager")
            .field("catalog", &self.inner.catalog)
            .field("limits", &self.inner.limits)
            .finish()
    }
}

enum Step {
    Ready(ModelHandle),
    Wait(SharedLoad),
}

impl ModelManager {
    /// Create a manager.
    ///
    /// `catalog` maps every acquirable key to the model id handed to the loader.
    pub fn new(
        catalog: HashMap<ModelKey, String>,
        loader: Arc<dyn ModelLoader>,
        limits: CacheLimits,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                loader,
                limits,
                slots: Mutex::new(AHashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    pub fn limits(&self) -> &CacheLimits {
        &self.inner.limits
    }

    /// Whether `(kind, language)` is configured at all.
    pub fn is_configured(&self, kind: ModelKind, language: &str) -> bool {
        self.inner
            .catalog
            .contains_key(&ModelKey::new(kind, language))
    }

    /// Get a ready handle, loading the model on first use.
    pub async fn acquire(&self, kind: ModelKind, language: &str) -> Result<ModelHandle> {
        self.acquire_with_timeout(kind, language, self.inner.limits.load_timeout)
            .await
    }

    /// Like [`acquire`](Self::acquire) with an explicit per-caller timeout.
    pub async fn acquire_with_timeout(
        &self,
        kind: ModelKind,
        language: &str,
        timeout: Duration,
    ) -> Result<ModelHandle> {
        let key = ModelKey::new(kind, language);
        let model_id = self
            .inner
            .catalog
            .get(&key)
            .cloned()
            .ok_or_else(|| SatzbauError::unsupported_language(language))?;

        // `None` when the timeout is too large to represent: wait without a deadline.
        let deadline = tokio::time::Instant::now().checked_add(timeout);
        let mut guard: Option<WaitGuard> = None;

        loop {
            let mut stale_guard = None;
            let step = {
                let mut slots = self.inner.slots.lock();
                match slots.get_mut(&key) {
                    Some(Slot::Loaded(entry)) => {
                        let waited = guard.as_ref().map(|g| g.generation);
                        Step::Ready(self.inner.claim(&key, entry, waited))
                    }
                    Some(Slot::Loading(pending)) => {
                        if guard.as_ref().map(|g| g.generation) != Some(pending.generation) {
                            pending.waiters += 1;
                            stale_guard = guard.replace(WaitGuard::new(
                                &self.inner,
                                &key,
                                pending.generation,
                            ));
                        }
                        Step::Wait(pending.future.clone())
                    }
                    None => {
                        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
                        let future = self.start_load(key.clone(), model_id.clone(), generation);
                        slots.insert(
                            key.clone(),
                            Slot::Loading(PendingLoad {
                                generation,
                                waiters: 1,
                                future: future.clone(),
                            }),
                        );
                        stale_guard =
                            guard.replace(WaitGuard::new(&self.inner, &key, generation));
                        Step::Wait(future)
                    }
                }
            };
            // Guards lock the slots on drop, so release them outside the lock.
            drop(stale_guard);

            match step {
                Step::Ready(handle) => {
                    if let Some(g) = guard.as_mut() {
                        g.disarm();
                    }
                    return Ok(handle);
                }
                Step::Wait(future) => {
                    let waited = match deadline {
                        Some(deadline) => tokio::time::timeout_at(deadline, future).await,
                        None => Ok(future.await),
                    };
                    match waited {
                        Err(_) => {
                            warn!("gave up waiting for model {key} after {timeout:?}");
                            return Err(SatzbauError::ModelLoadTimeout { key, timeout });
                        }
                        Ok(Err(err)) => {
                            if let Some(g) = guard.as_mut() {
                                g.disarm();
                            }
                            return Err(err);
                        }
                        // Installed; claim it on the next pass.
                        Ok(Ok(_)) => continue,
                    }
                }
            }
        }
    }

    fn start_load(&self, key: ModelKey, model_id: String, generation: u64) -> SharedLoad {
        let inner = Arc::clone(&self.inner);
        let loader = Arc::clone(&self.inner.loader);
        let request = LoadRequest {
            key: key.clone(),
            model_id,
        };

        let task_inner = Arc::clone(&inner);
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            info!("loading model {} ({})", request.key, request.model_id);
            let started = Instant::now();
            let joined = tokio::task::spawn_blocking(move || {
                let result = loader.load(&request);
                (request, result)
            })
            .await;

            let result = match joined {
                Ok((request, Ok(model))) if model.kind() == request.key.kind => Ok(model),
                Ok((request, Ok(model))) => Err(SatzbauError::model_load_failure(
                    request.key.clone(),
                    format!(
                        "loader returned a {} model for {}",
                        model.kind(),
                        request.key
                    )
                    .into(),
                )),
                Ok((request, Err(err))) => {
                    Err(SatzbauError::model_load_failure(request.key, err))
                }
                Err(join_err) => Err(SatzbauError::model_load_failure(
                    task_key.clone(),
                    format!("model loader panicked: {join_err}").into(),
                )),
            };
            task_inner.finish_load(&task_key, generation, result, started.elapsed())
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    inner.abandon_load(&key, generation);
                    Err(SatzbauError::internal(format!(
                        "load task for {key} did not complete: {join_err}"
                    )))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Give a handle back. Equivalent to dropping it.
    pub fn release(&self, handle: ModelHandle) {
        drop(handle);
    }

    /// Evict `(kind, language)` immediately.
    ///
    /// Fails with [`SatzbauError::ModelNotLoaded`] when nothing is loaded for
    /// the key (including while a load is still in flight) and with
    /// [`SatzbauError::ModelInUse`] while handles are outstanding or waiters
    /// of the load have yet to claim theirs.
    pub fn unload(&self, kind: ModelKind, language: &str) -> Result<()> {
        let key = ModelKey::new(kind, language);
        let removed = {
            let mut slots = self.inner.slots.lock();
            match slots.get(&key) {
                None | Some(Slot::Loading(_)) => return Err(SatzbauError::ModelNotLoaded(key)),
                Some(Slot::Loaded(entry)) if entry.ref_count + entry.pending_claims > 0 => {
                    return Err(SatzbauError::ModelInUse {
                        key,
                        ref_count: entry.ref_count + entry.pending_claims,
                    });
                }
                Some(Slot::Loaded(_)) => slots.remove(&key),
            }
        };
        drop(removed);
        info!("unloaded model {key}");
        Ok(())
    }

    /// Apply the capacity policy now. Returns the evicted keys.
    pub fn evict_idle(&self) -> Vec<ModelKey> {
        let evicted = {
            let mut slots = self.inner.slots.lock();
            self.inner.enforce_limits(&mut slots, None)
        };
        evicted.into_iter().map(|(key, _)| key).collect()
    }

    /// Unload every idle model. Returns the keys kept because they are in use.
    pub fn shutdown(&self) -> Vec<ModelKey> {
        let (removed, kept) = {
            let mut slots = self.inner.slots.lock();
            let idle: Vec<ModelKey> = slots
                .iter()
                .filter_map(|(key, slot)| match slot {
                    Slot::Loaded(e) if e.ref_count == 0 && e.pending_claims == 0 => {
                        Some(key.clone())
                    }
                    _ => None,
                })
                .collect();
            let removed: Vec<Slot> = idle.iter().filter_map(|k| slots.remove(k)).collect();
            let mut kept: Vec<ModelKey> = slots.keys().cloned().collect();
            kept.sort();
            (removed, kept)
        };
        info!(
            "model manager shutdown: unloaded {}, kept {} in use",
            removed.len(),
            kept.len()
        );
        kept
    }

    /// Status of every loaded model, sorted by key.
    pub fn status(&self) -> Vec<ModelStatus> {
        let slots = self.inner.slots.lock();
        let mut status: Vec<ModelStatus> = slots
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Loaded(e) => Some(ModelStatus {
                    key: key.clone(),
                    model_id: e.model_id.clone(),
                    loaded_at: e.loaded_at,
                    load_duration: e.load_duration,
                    memory_bytes: e.memory_bytes,
                    ref_count: e.ref_count,
                    last_used: e.last_used_at,
                }),
                Slot::Loading(_) => None,
            })
            .collect();
        status.sort_by(|a, b| a.key.cmp(&b.key));
        status
    }

    pub fn is_loaded(&self, kind: ModelKind, language: &str) -> bool {
        matches!(
            self.inner.slots.lock().get(&ModelKey::new(kind, language)),
            Some(Slot::Loaded(_))
        )
    }

    /// Number of loads currently in flight.
    pub fn loading_count(&self) -> usize {
        self.inner
            .slots
            .lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Loading(_)))
            .count()
    }

    /// Load both model kinds for each language and release them again.
    pub async fn warm_up(&self, languages: &[&str]) -> Result<()> {
        for language in languages {
            for kind in [ModelKind::Linguistic, ModelKind::Grammar] {
                let handle = self.acquire(kind, language).await?;
                self.release(handle);
            }
        }
        Ok(())
    }
}

impl Inner {
    fn claim(
        self: &Arc<Self>,
        key: &ModelKey,
        entry: &mut Entry,
        waited_generation: Option<u64>,
    ) -> ModelHandle {
        entry.ref_count += 1;
        if waited_generation == Some(entry.generation) {
            entry.pending_claims = entry.pending_claims.saturating_sub(1);
        }
        entry.last_used = Instant::now();
        entry.last_used_at = Utc::now();
        ModelHandle {
            inner: Arc::clone(self),
            key: key.clone(),
            generation: entry.generation,
            model: entry.model.clone(),
        }
    }

    fn finish_load(
        &self,
        key: &ModelKey,
        generation: u64,
        result: Result<LoadedModel>,
        elapsed: Duration,
    ) -> LoadOutcome {
        let mut evicted = Vec::new();
        let outcome = {
            let mut slots = self.slots.lock();
            let waiters = match slots.get(key) {
                Some(Slot::Loading(p)) if p.generation == generation => p.waiters,
                _ => 0,
            };
            match result {
                Ok(model) => {
                    let memory_bytes = model.memory_footprint();
                    let now = Utc::now();
                    slots.insert(
                        key.clone(),
                        Slot::Loaded(Entry {
                            model,
                            model_id: self.catalog.get(key).cloned().unwrap_or_default(),
                            generation,
                            ref_count: 0,
                            pending_claims: waiters,
                            loaded_at: now,
                            load_duration: elapsed,
                            memory_bytes,
                            last_used: Instant::now(),
                            last_used_at: now,
                        }),
                    );
                    info!("loaded model {key} in {elapsed:?} ({memory_bytes} bytes)");
                    evicted = self.enforce_limits(&mut slots, Some(key));
                    Ok(generation)
                }
                Err(err) => {
                    slots.remove(key);
                    warn!("loading model {key} failed: {err}");
                    Err(err)
                }
            }
        };
        // Model destructors may be heavy; run them without the lock.
        drop(evicted);
        outcome
    }

    fn abandon_load(&self, key: &ModelKey, generation: u64) {
        let mut slots = self.slots.lock();
        if matches!(slots.get(key), Some(Slot::Loading(p)) if p.generation == generation) {
            slots.remove(key);
        }
    }

    fn enforce_limits(
        &self,
        slots: &mut AHashMap<ModelKey, Slot>,
        protect: Option<&ModelKey>,
    ) -> Vec<(ModelKey, Slot)> {
        let mut evicted = Vec::new();
        loop {
            let (count, bytes) = slots.values().fold((0usize, 0u64), |(c, b), slot| match slot {
                Slot::Loaded(e) => (c + 1, b + e.memory_bytes),
                Slot::Loading(_) => (c, b),
            });
            let over_count = count > self.limits.capacity;
            let over_budget = self.limits.memory_budget.is_some_and(|budget| bytes > budget);
            if !over_count && !over_budget {
                break;
            }

            let victim = slots
                .iter()
                .filter_map(|(key, slot)| match slot {
                    Slot::Loaded(e)
                        if e.ref_count == 0
                            && e.pending_claims == 0
                            && Some(key) != protect =>
                    {
                        Some((key, e.last_used))
                    }
                    _ => None,
                })
                .min_by_key(|(_, last_used)| *last_used)
                .map(|(key, _)| key.clone());

            match victim {
                Some(key) => {
                    if let Some(slot) = slots.remove(&key) {
                        info!("evicted idle model {key}");
                        evicted.push((key, slot));
                    }
                }
                None => {
                    warn!(
                        "model cache over limits ({count} models, {bytes} bytes) but nothing is evictable"
                    );
                    break;
                }
            }
        }
        evicted
    }

    fn release_ref(&self, key: &ModelKey, generation: u64) {
        let mut slots = self.slots.lock();
        if let Some(Slot::Loaded(entry)) = slots.get_mut(key)
            && entry.generation == generation
        {
            entry.ref_count = entry.ref_count.saturating_sub(1);
            entry.last_used = Instant::now();
            entry.last_used_at = Utc::now();
            debug!("released {key}, {} references left", entry.ref_count);
        }
    }

    fn forget_waiter(&self, key: &ModelKey, generation: u64) {
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(Slot::Loading(p)) if p.generation == generation => {
                p.waiters = p.waiters.saturating_sub(1);
            }
            Some(Slot::Loaded(e)) if e.generation == generation => {
                e.pending_claims = e.pending_claims.saturating_sub(1);
            }
            _ => {}
        }
    }
}

/// Tracks one caller waiting on a load so that giving up (timeout or
/// cancellation) does not leave the entry pinned against eviction.
struct WaitGuard {
    inner: Arc<Inner>,
    key: ModelKey,
    generation: u64,
    armed: bool,
}

impl WaitGuard {
    fn new(inner: &Arc<Inner>, key: &ModelKey, generation: u64) -> Self {
        Self {
            inner: Arc::clone(inner),
            key: key.clone(),
            generation,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner.forget_waiter(&self.key, self.generation);
        }
    }
}

/// Borrowed model. Holds one reference until dropped.
pub struct ModelHandle {
    inner: Arc<Inner>,
    key: ModelKey,
    generation: u64,
    model: LoadedModel,
}

impl ModelHandle {
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    pub fn kind(&self) -> ModelKind {
        self.key.kind
    }

    pub fn language(&self) -> &str {
        &self.key.language
    }

    pub fn model(&self) -> &LoadedModel {
        &self.model
    }

    pub fn linguistic(&self) -> Option<&Arc<dyn LinguisticModel>> {
        self.model.as_linguistic()
    }

    pub fn grammar(&self) -> Option<&Arc<dyn GrammarModel>> {
        self.model.as_grammar()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.inner.release_ref(&self.key, self.generation);
    }
}
