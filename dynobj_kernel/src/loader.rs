//! Load-once collaborator used by autoload.
//!
//! [`LoadOnce`] is the seam: the autoload registry only needs "load this
//! source unless it is already loaded". [`FeatureLoader`] is the in-process
//! implementation: features are registered by descriptor with a body closure.
//!
//! Per feature the loader tracks `Loading(thread)` or `Loaded`. A request from
//! the thread that is already loading the feature is a cycle and answers
//! `false` instead of recursing; a request from another thread blocks until
//! the load finishes. Waiting is itself tracked per thread, so a request that
//! would close a wait cycle between threads answers `false` as well.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};

use crate::context::ExecutionContext;
use crate::diagnostics::load_trace;
use crate::error::{ErrorObject, KResult};
use crate::thread::ThreadId;

/// Run a source at most once per runtime.
///
/// Returns `Ok(true)` when this call performed the load, `Ok(false)` when the
/// source was already loaded (or is being loaded further up this thread's
/// stack). Errors raised by the load propagate unchanged.
pub trait LoadOnce: Send + Sync + fmt::Debug {
    fn load_once(&self, ctx: &mut ExecutionContext, source: &str) -> KResult<bool>;
}

/// Body of a registered feature
pub type FeatureBody = Arc<dyn Fn(&mut ExecutionContext) -> KResult<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeatureState {
    Loading(ThreadId),
    Loaded,
}

/// Load progress, guarded by one mutex so waits and claims are consistent
#[derive(Debug, Default)]
struct LoadState {
    features: HashMap<String, FeatureState>,
    /// Feature each blocked thread is waiting for
    waiting_on: HashMap<ThreadId, String>,
}

impl LoadState {
    /// Whether `thread` waiting for `owner` would close a wait cycle:
    /// `owner` waits (transitively) for a feature `thread` is loading.
    fn closes_cycle(&self, thread: ThreadId, owner: ThreadId) -> bool {
        let mut current = owner;
        for _ in 0..=self.waiting_on.len() {
            let Some(source) = self.waiting_on.get(&current) else {
                return false;
            };
            match self.features.get(source) {
                Some(FeatureState::Loading(next)) if *next == thread => return true,
                Some(FeatureState::Loading(next)) => current = *next,
                _ => return false,
            }
        }
        false
    }
}

pub struct FeatureLoader {
    features: RwLock<HashMap<String, FeatureBody>>,
    state: Mutex<LoadState>,
    finished: Condvar,
}

impl fmt::Debug for FeatureLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = self
            .features
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<_> = features.keys().collect();
        names.sort();
        f.debug_struct("FeatureLoader")
            .field("features", &names)
            .finish_non_exhaustive()
    }
}

impl Default for FeatureLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureLoader {
    pub fn new() -> Self {
        Self {
            features: RwLock::new(HashMap::new()),
            state: Mutex::new(LoadState::default()),
            finished: Condvar::new(),
        }
    }

    /// Register (or replace) the body run when `source` is first loaded
    pub fn register<F>(&self, source: &str, body: F)
    where
        F: Fn(&mut ExecutionContext) -> KResult<()> + Send + Sync + 'static,
    {
        self.features
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(source.to_string(), Arc::new(body));
    }

    pub fn is_registered(&self, source: &str) -> bool {
        self.features
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(source)
    }

    pub fn is_loaded(&self, source: &str) -> bool {
        self.lock_state().features.get(source) == Some(&FeatureState::Loaded)
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn body(&self, source: &str) -> Option<FeatureBody> {
        self.features
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(source)
            .cloned()
    }

    /// Claim `source` for `thread`. Returns `false` when there is nothing to
    /// run: already loaded, being loaded by `thread` itself, or being loaded
    /// by a thread that is (transitively) waiting on `thread`.
    fn claim(&self, source: &str, thread: ThreadId) -> bool {
        let mut state = self.lock_state();
        loop {
            match state.features.get(source).copied() {
                Some(FeatureState::Loaded) => return false,
                Some(FeatureState::Loading(owner)) if owner == thread => {
                    load_trace(format_args!("{source}: recursive load on {thread}, skipped"));
                    return false;
                }
                Some(FeatureState::Loading(owner)) if state.closes_cycle(thread, owner) => {
                    load_trace(format_args!("{source}: {owner} waits on {thread}, skipped"));
                    return false;
                }
                Some(FeatureState::Loading(owner)) => {
                    load_trace(format_args!("{source}: {thread} waits for {owner}"));
                    state.waiting_on.insert(thread, source.to_string());
                    state = self
                        .finished
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    state.waiting_on.remove(&thread);
                }
                None => {
                    state.features.insert(source.to_string(), FeatureState::Loading(thread));
                    return true;
                }
            }
        }
    }

    fn finish(&self, source: &str, loaded: bool) {
        let mut state = self.lock_state();
        if loaded {
            state.features.insert(source.to_string(), FeatureState::Loaded);
        } else {
            state.features.remove(source);
        }
        self.finished.notify_all();
    }
}

/// Releases a claimed feature even if the body panics
struct InFlight<'a> {
    loader: &'a FeatureLoader,
    source: &'a str,
    done: bool,
}

impl InFlight<'_> {
    fn complete(mut self, loaded: bool) {
        self.done = true;
        self.loader.finish(self.source, loaded);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.loader.finish(self.source, false);
        }
    }
}

impl LoadOnce for FeatureLoader {
    fn load_once(&self, ctx: &mut ExecutionContext, source: &str) -> KResult<bool> {
        let Some(body) = self.body(source) else {
            return Err(ctx.raise_prepared(ErrorObject::missing_feature(source)));
        };
        if !self.claim(source, ctx.thread_id()) {
            return Ok(false);
        }

        load_trace(format_args!("{source}: loading on {}", ctx.thread_id()));
        let guard = InFlight {
            loader: self,
            source,
            done: false,
        };
        match body(ctx) {
            Ok(()) => {
                guard.complete(true);
                load_trace(format_args!("{source}: loaded"));
                Ok(true)
            }
            Err(flow) => {
                guard.complete(false);
                load_trace(format_args!("{source}: failed, unmarked"));
                Err(flow)
            }
        }
    }
}
