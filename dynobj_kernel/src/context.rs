//! Per-thread execution context.
//!
//! One `ExecutionContext` exists per running thread and is never shared. It
//! owns the capture-point stack used by catch/throw, the last raised error,
//! the transient visibility/call-type markers the evaluator sets right before
//! reporting a failed send, and the frame stack backtraces are captured from.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::catch::{CaptureId, CapturePoint};
use crate::dispatch::{CallType, Visibility};
use crate::error::{ErrorRef, Flow, KResult};
use crate::runtime::Runtime;
use crate::thread::ThreadId;

/// A call frame as the evaluator reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub label: String,
    pub file: String,
    pub line: u32,
}

impl Frame {
    pub fn new(label: &str, file: &str, line: u32) -> Self {
        Self {
            label: label.to_string(),
            file: file.to_string(),
            line,
        }
    }

    /// Backtrace line, e.g. ``main.rb:3:in `run'``
    pub fn backtrace_line(&self) -> String {
        format!("{}:{}:in `{}'", self.file, self.line, self.label)
    }
}

#[derive(Debug)]
pub struct ExecutionContext {
    runtime: Arc<Runtime>,
    thread: ThreadId,
    primary: bool,
    pub(crate) catches: Vec<CapturePoint>,
    next_capture_id: u64,
    last_error: Option<ErrorRef>,
    last_visibility: Visibility,
    last_call_type: CallType,
    frames: Vec<Frame>,
}

impl ExecutionContext {
    pub(crate) fn new(runtime: Arc<Runtime>, thread: ThreadId, primary: bool) -> Self {
        Self {
            runtime,
            thread,
            primary,
            catches: Vec::new(),
            next_capture_id: 0,
            last_error: None,
            last_visibility: Visibility::Public,
            last_call_type: CallType::Normal,
            frames: Vec::new(),
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    // ===== Failed-send markers =====

    /// Record how the send that is about to be reported as unresolved was made.
    pub fn mark_failed_send(&mut self, visibility: Visibility, call_type: CallType) {
        self.last_visibility = visibility;
        self.last_call_type = call_type;
    }

    pub fn last_visibility(&self) -> Visibility {
        self.last_visibility
    }

    pub fn last_call_type(&self) -> CallType {
        self.last_call_type
    }

    // ===== Last error =====

    pub fn last_error(&self) -> Option<&ErrorRef> {
        self.last_error.as_ref()
    }

    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn set_last_error(&mut self, err: ErrorRef) {
        self.last_error = Some(err);
    }

    // ===== Frames =====

    /// Run `f` with `frame` pushed. The frame is popped on every exit path,
    /// including a panic unwinding out of `f`.
    pub fn with_frame<T, F>(&mut self, frame: Frame, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        let depth = self.frames.len();
        self.frames.push(frame);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        self.frames.truncate(depth);
        match outcome {
            Ok(result) => result,
            Err(panic_payload) => panic::resume_unwind(panic_payload),
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Current backtrace, innermost frame first
    pub fn capture_backtrace(&self) -> Vec<String> {
        self.frames.iter().rev().map(Frame::backtrace_line).collect()
    }

    // ===== Capture points =====

    pub fn capture_depth(&self) -> usize {
        self.catches.len()
    }

    pub(crate) fn next_capture_id(&mut self) -> CaptureId {
        self.next_capture_id += 1;
        CaptureId::new(self.thread, self.next_capture_id)
    }

    // ===== Interrupts =====

    /// Safepoint: fails with `Flow::Cancelled` once cancellation was requested.
    pub fn check_interrupts(&self) -> KResult<()> {
        if self.runtime.cancel_token().is_requested() {
            Err(Flow::Cancelled)
        } else {
            Ok(())
        }
    }
}
