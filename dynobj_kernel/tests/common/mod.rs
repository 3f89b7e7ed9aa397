//! Shared helpers for integration tests
// Each test target uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dynobj_kernel::prelude::*;

/// Fresh runtime with default configuration and a capturing diagnostic sink
pub fn runtime() -> Arc<Runtime> {
    Runtime::builder()
        .diagnostics(dynobj_kernel::diagnostics::DiagnosticSink::capture())
        .build()
}

/// Runtime whose autoloads go through `loader`
pub fn runtime_with_loader(loader: Arc<FeatureLoader>) -> Arc<Runtime> {
    Runtime::builder().loader(loader).build()
}

/// The error a kernel operation raised; panics on any other outcome
pub fn raised<T: std::fmt::Debug>(result: KResult<T>) -> ErrorRef {
    match result {
        Err(Flow::Raise(err)) => err,
        other => panic!("expected a raise, got {:?}", other),
    }
}

/// Register `source` so that loading it defines `name` in `scope` as `value`,
/// counting every run of the body.
pub fn define_on_load(
    loader: &FeatureLoader,
    source: &str,
    scope: &ScopeRef,
    name: &'static str,
    value: Value,
) -> Arc<AtomicUsize> {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let scope = Arc::clone(scope);
    loader.register(source, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        scope.set_constant(name, value.clone());
        Ok(())
    });
    runs
}

/// Load-once collaborator that records every answer it gives
#[derive(Debug, Default)]
pub struct RecordingLoader {
    inner: FeatureLoader,
    answers: Mutex<Vec<bool>>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(&self) -> &FeatureLoader {
        &self.inner
    }

    pub fn answers(&self) -> Vec<bool> {
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl LoadOnce for RecordingLoader {
    fn load_once(&self, ctx: &mut ExecutionContext, source: &str) -> KResult<bool> {
        let answer = self.inner.load_once(ctx, source)?;
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(answer);
        Ok(answer)
    }
}
