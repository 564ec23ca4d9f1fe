//! Compilation cache with single-flight semantics.
//!
//! Compiled artifacts are memoized by `"{outputMode}:{sourcePath}"`. Each key maps to
//! a [`CacheSlot`] that moves through two states:
//!
//! ```text
//! (absent) ──insert──▶ Pending(shared future) ──ok──▶ Ready(artifact)
//!                              │
//!                              └──err──▶ (absent)
//! ```
//!
//! The first caller for a key inserts `Pending` and runs the producer. Every caller
//! that arrives while the compile is in flight clones the same shared future and
//! awaits it, so a key never has two concurrent compiles. A failed compile removes
//! the slot: the error reaches every waiter, and the next request retries.
//!
//! # Lifetime policies
//!
//! - [`CachePolicy::Shared`]: one map for the whole process. Used outside
//!   development, where sources are assumed immutable.
//! - [`CachePolicy::Scoped`]: one map per [`BuildContext`], registered by
//!   [`CompilationCache::begin_build`] and dropped by [`CompilationCache::end_build`].
//!   A context that was never begun, or has already ended, still compiles but
//!   retains nothing.
//!
//! The maps are the only shared mutable state in the engine. Slots are only ever
//! inserted, promoted from pending to ready, or removed.

pub mod meta_store;

pub use meta_store::MetaStore;

use crate::core::{EngineError, Result};
use crate::meta::CompiledArtifact;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// A compile in flight, awaitable by any number of callers.
pub type ArtifactFuture = Shared<BoxFuture<'static, Result<Arc<CompiledArtifact>, EngineError>>>;

type SlotMap = DashMap<String, CacheSlot>;

/// State of one cache key.
#[derive(Clone)]
pub enum CacheSlot {
    /// A compile is running; join it.
    Pending(ArtifactFuture),
    /// The compile finished successfully.
    Ready(Arc<CompiledArtifact>),
}

/// How long cached artifacts live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// One cache for the whole process
    Shared,
    /// One cache per build
    Scoped,
}

/// Identity of one host build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildContext {
    id: Uuid,
}

impl BuildContext {
    /// A fresh, unique build.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
        }
    }

    /// The build's unique id.
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Requests served by a ready or in-flight slot
    pub hits: usize,
    /// Requests that started a compile
    pub misses: usize,
    /// Slots currently held across all maps
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Memoizes compile results per key under a [`CachePolicy`].
pub struct CompilationCache {
    policy: CachePolicy,
    shared: Arc<SlotMap>,
    scoped: DashMap<Uuid, Arc<SlotMap>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CompilationCache {
    /// Create an empty cache.
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            shared: Arc::new(DashMap::new()),
            scoped: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// The lifetime policy in effect.
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Start a build, registering its map under [`CachePolicy::Scoped`].
    pub fn begin_build(&self) -> BuildContext {
        let ctx = BuildContext::new();
        if self.policy == CachePolicy::Scoped {
            self.scoped.insert(ctx.id, Arc::new(DashMap::new()));
        }
        ctx
    }

    fn map_for(&self, ctx: &BuildContext) -> Arc<SlotMap> {
        match self.policy {
            CachePolicy::Shared => Arc::clone(&self.shared),
            CachePolicy::Scoped => match self.scoped.get(&ctx.id) {
                Some(map) => Arc::clone(map.value()),
                None => {
                    tracing::debug!(target: "cache", "Build {} is not active; not caching", ctx.id);
                    Arc::new(DashMap::new())
                }
            },
        }
    }

    /// Return the artifact for `key`, running `producer` only if no slot exists.
    ///
    /// Concurrent callers for the same key share a single producer run. Errors from
    /// the producer are returned to every waiter and leave the key absent.
    pub async fn get_or_compile<F, Fut>(
        &self,
        ctx: &BuildContext,
        key: &str,
        producer: F,
    ) -> Result<Arc<CompiledArtifact>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<CompiledArtifact>>> + Send + 'static,
    {
        let map = self.map_for(ctx);

        let pending = match map.entry(key.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                CacheSlot::Ready(artifact) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(target: "cache", "Cache hit: {}", key);
                    return Ok(Arc::clone(artifact));
                }
                CacheSlot::Pending(future) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(target: "cache", "Joining in-flight compile: {}", key);
                    future.clone()
                }
            },
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: "cache", "Cache miss: {}", key);
                let future = producer().boxed().shared();
                entry.insert(CacheSlot::Pending(future.clone()));
                future
            }
        };
        // Entry guard released; never await while holding a shard lock.

        let result = pending.clone().await;
        settle(&map, key, &pending, &result);
        result
    }

    /// The ready artifact for `key`, if one exists. Never starts a compile.
    pub fn peek_ready(&self, ctx: &BuildContext, key: &str) -> Option<Arc<CompiledArtifact>> {
        let map = match self.policy {
            CachePolicy::Shared => Arc::clone(&self.shared),
            CachePolicy::Scoped => Arc::clone(self.scoped.get(&ctx.id)?.value()),
        };
        let slot = map.get(key)?;
        match slot.value() {
            CacheSlot::Ready(artifact) => Some(Arc::clone(artifact)),
            CacheSlot::Pending(_) => None,
        }
    }

    /// Drop the map of a finished build. No-op under [`CachePolicy::Shared`].
    pub fn end_build(&self, ctx: &BuildContext) {
        if let Some((_, map)) = self.scoped.remove(&ctx.id) {
            tracing::debug!(
                target: "cache",
                "Dropping build cache {} ({} entries)",
                ctx.id,
                map.len()
            );
        }
    }

    /// Remove every slot under every policy.
    pub fn flush(&self) {
        let stats = self.stats();
        tracing::debug!(
            target: "cache",
            "Flushing cache: {} entries, {} hits, {} misses ({:.1}% hit rate)",
            stats.entries,
            stats.hits,
            stats.misses,
            stats.hit_rate()
        );
        self.shared.clear();
        // Active builds stay registered.
        for map in self.scoped.iter() {
            map.value().clear();
        }
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let scoped_entries: usize = self.scoped.iter().map(|m| m.value().len()).sum();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.shared.len() + scoped_entries,
        }
    }
}

/// Promote or remove the slot that produced `result`.
///
/// Only the slot still holding this exact future is touched, so a flush or a newer
/// compile started in the meantime is never clobbered.
fn settle(
    map: &SlotMap,
    key: &str,
    future: &ArtifactFuture,
    result: &Result<Arc<CompiledArtifact>>,
) {
    let owns = |slot: &CacheSlot| matches!(slot, CacheSlot::Pending(f) if f.ptr_eq(future));

    match result {
        Ok(artifact) => {
            if let Some(mut slot) = map.get_mut(key) {
                if owns(slot.value()) {
                    *slot = CacheSlot::Ready(Arc::clone(artifact));
                }
            }
        }
        Err(e) => {
            if map.remove_if(key, |_, slot| owns(slot)).is_some() {
                tracing::debug!(target: "cache", "Evicting failed compile {}: {}", key, e);
            }
        }
    }
}

impl std::fmt::Debug for CompilationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationCache")
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}
