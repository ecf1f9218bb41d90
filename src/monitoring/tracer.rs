/*!
 * Call Tracing
 * Structured tracing for kernel calls using the tracing crate
 *
 * Library code logs through the `log` facade; the subscriber installed here
 * bridges those records so both end up in one stream.
 */

use crate::core::types::{Pid, Tid};
use crate::syscalls::types::{CallResult, SyscallNumber};
use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::{debug, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Immediate calls slower than this are reported at warn level
const SLOW_CALL_THRESHOLD: Duration = Duration::from_millis(10);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KERNEL_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        debug!(json = use_json, "structured tracing initialized");
    }
    installed
}

/// Generate a unique trace ID for call correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one kernel call, from dispatch until the caller resumes
pub struct CallSpan {
    span: tracing::Span,
    start: Instant,
    call: &'static str,
    trace_id: String,
    deferred: Cell<bool>,
}

impl CallSpan {
    pub fn new(call: &'static str, pid: Pid, tid: Tid) -> Self {
        let trace_id = generate_trace_id();
        let span = span!(
            Level::DEBUG,
            "kernel_call",
            trace_id = %trace_id,
            call = call,
            pid = pid,
            tid = tid,
            result = tracing::field::Empty,
            deferred = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            call,
            trace_id,
            deferred: Cell::new(false),
        }
    }

    pub fn for_number(number: Option<SyscallNumber>, pid: Pid, tid: Tid) -> Self {
        Self::new(number.map_or("unknown", SyscallNumber::name), pid, tid)
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Mark the call as resolved off the caller's stack; it may legitimately be slow
    pub fn record_deferred(&self) {
        self.deferred.set(true);
        self.span.record("deferred", true);
    }

    pub fn record_result(&self, result: CallResult) {
        self.span.record("result", tracing::field::debug(result));
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for CallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        if duration > SLOW_CALL_THRESHOLD && !self.deferred.get() {
            warn!(
                trace_id = %self.trace_id,
                call = self.call,
                duration_ms = duration.as_millis() as u64,
                "slow kernel call"
            );
        } else {
            debug!(
                call = self.call,
                duration_us = duration.as_micros() as u64,
                "kernel call completed"
            );
        }
    }
}
