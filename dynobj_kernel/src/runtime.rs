//! The shared runtime.
//!
//! A `Runtime` is shared by all threads through `Arc`. It holds what is
//! runtime-wide: configuration, the fallback-handler table and its user
//! override slot, the thread registry, the autoload registry with its
//! load-once collaborator, the diagnostic sink, and the root `Object` scope.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::autoload::AutoloadRegistry;
use crate::cancel::CancelToken;
use crate::config::{RuntimeConfig, ThrowCompat};
use crate::context::ExecutionContext;
use crate::diagnostics::DiagnosticSink;
use crate::dispatch::{FallbackHook, FallbackTable};
use crate::error::{ErrorObject, KResult};
use crate::loader::{FeatureLoader, LoadOnce};
use crate::scope::{Scope, ScopeRef};
use crate::thread::ThreadRegistry;

#[derive(Debug)]
pub struct Runtime {
    debug: AtomicBool,
    throw_compat: ThrowCompat,
    fallback_table: FallbackTable,
    fallback_hook: RwLock<Option<Arc<dyn FallbackHook>>>,
    threads: ThreadRegistry,
    autoload: AutoloadRegistry,
    diagnostics: DiagnosticSink,
    cancel: CancelToken,
    object_scope: ScopeRef,
}

#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    loader: Option<Arc<dyn LoadOnce>>,
    diagnostics: DiagnosticSink,
    cancel: Option<CancelToken>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Load-once collaborator used by autoload. Defaults to an empty
    /// [`FeatureLoader`].
    pub fn loader(mut self, loader: Arc<dyn LoadOnce>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn diagnostics(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Arc<Runtime> {
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(FeatureLoader::new()) as Arc<dyn LoadOnce>);
        Arc::new(Runtime {
            debug: AtomicBool::new(self.config.debug),
            throw_compat: self.config.throw_compat,
            fallback_table: FallbackTable::builtin(),
            fallback_hook: RwLock::new(None),
            threads: ThreadRegistry::new(),
            autoload: AutoloadRegistry::new(loader),
            diagnostics: self.diagnostics,
            cancel: self.cancel.unwrap_or_default(),
            object_scope: Scope::root(),
        })
    }
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn new(config: RuntimeConfig) -> Arc<Runtime> {
        Self::builder().config(config).build()
    }

    // ===== Contexts =====

    /// Context for the primary thread. Only the first call succeeds.
    pub fn main_context(self: &Arc<Self>) -> KResult<ExecutionContext> {
        match self.threads.claim_primary() {
            Ok(id) => Ok(ExecutionContext::new(Arc::clone(self), id, true)),
            Err(existing) => Err(ErrorObject::thread_error(&format!(
                "primary thread already running as {}",
                existing
            ))
            .into()),
        }
    }

    /// Context for a non-primary thread
    pub fn thread_context(self: &Arc<Self>) -> ExecutionContext {
        let id = self.threads.allocate();
        ExecutionContext::new(Arc::clone(self), id, false)
    }

    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    // ===== Configuration =====

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    pub fn throw_compat(&self) -> ThrowCompat {
        self.throw_compat
    }

    // ===== Fallback resolution =====

    pub fn fallback_table(&self) -> &FallbackTable {
        &self.fallback_table
    }

    /// Install (or with `None` remove) the user-level fallback override
    pub fn set_fallback_hook(&self, hook: Option<Arc<dyn FallbackHook>>) {
        *self
            .fallback_hook
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = hook;
    }

    pub fn fallback_hook(&self) -> Option<Arc<dyn FallbackHook>> {
        self.fallback_hook
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // ===== Shared services =====

    pub fn autoload(&self) -> &AutoloadRegistry {
        &self.autoload
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn object_scope(&self) -> &ScopeRef {
        &self.object_scope
    }
}
