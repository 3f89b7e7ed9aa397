//! Diagnostic output.
//!
//! Two channels exist. The debug-mode raise summary is advisory output that
//! belongs to the runtime, so it goes through a [`DiagnosticSink`] that
//! embedders and tests can capture. Internal tracing (`DYNK_LOAD_DEBUG=1`)
//! goes straight to stderr.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Default)]
pub enum DiagnosticSink {
    #[default]
    Stderr,
    /// Buffer lines in memory instead of printing them
    Capture(Mutex<Vec<String>>),
}

impl DiagnosticSink {
    pub fn capture() -> Self {
        DiagnosticSink::Capture(Mutex::new(Vec::new()))
    }

    pub fn emit(&self, line: &str) {
        match self {
            DiagnosticSink::Stderr => {
                let _ = writeln!(std::io::stderr(), "{line}");
            }
            DiagnosticSink::Capture(lines) => lines
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(line.to_string()),
        }
    }

    /// Lines captured so far (always empty for `Stderr`)
    pub fn captured(&self) -> Vec<String> {
        match self {
            DiagnosticSink::Stderr => Vec::new(),
            DiagnosticSink::Capture(lines) => lines
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }
}

/// Check if load tracing is enabled via `DYNK_LOAD_DEBUG`.
pub(crate) fn load_trace_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var("DYNK_LOAD_DEBUG").is_ok())
}

/// Emit a load trace line without relying on `eprintln!`.
pub(crate) fn load_trace(args: fmt::Arguments<'_>) {
    if load_trace_enabled() {
        let _ = writeln!(std::io::stderr(), "[load] {args}");
    }
}
