//! Structured bench tracing with a thread-local sink for deterministic tests.
//! Records go to the `docbench::trace` log target and, when enabled, to the sink.

use serde::Serialize;
use std::cell::RefCell;

pub const TRACE_TARGET: &str = "docbench::trace";

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Guard that disables the thread-local sink on drop.
pub struct TraceSinkGuard;
impl Drop for TraceSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Enable the thread-local sink for the current thread. Returns a guard that will disable it on drop.
#[must_use]
pub fn enable_thread_sink() -> TraceSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    TraceSinkGuard
}

/// Push a message into the thread-local sink if enabled.
pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Drain and return the captured messages for the current thread.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// Peek at the current captured messages without clearing them.
pub fn snapshot() -> Vec<String> {
    TL_SINK.with(|s| s.borrow().as_ref().cloned().unwrap_or_default())
}

/// One timed engine operation.
#[derive(Debug, Clone, Serialize)]
pub struct BenchRecord<'a> {
    pub bench: &'static str,
    pub op: &'static str,
    pub collection: &'a str,
    pub duration_ms: u128,
    pub used_index: bool,
    pub result_count: usize,
}

impl BenchRecord<'_> {
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) => {
                write_str(&line);
                log::log!(target: TRACE_TARGET, log::Level::Trace, "{line}");
            }
            Err(e) => log::warn!("bench record for {} not serialized: {e}", self.op),
        }
    }
}

/// Emit a free-form trace line and capture it in the thread-local sink if enabled.
#[macro_export]
macro_rules! trace_bench {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        $crate::utils::devlog::write_str(&__s);
        log::log!(target: $crate::utils::devlog::TRACE_TARGET, log::Level::Trace, "{}", __s);
    }};
}
