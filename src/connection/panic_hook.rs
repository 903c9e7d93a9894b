//! Panic reporting through tracing.
//!
//! A driver panic inside a connection attempt is caught by [`super::probe`]
//! and turned into a demo outcome. The binary calls [`install`] so that the
//! panic does not also reach stderr through the default hook.

use std::any::Any;
use std::panic::{self, PanicHookInfo};
use std::thread;

/// Name given to the async runtime's worker threads.
///
/// Panics on these threads surface as join errors to whoever spawned the
/// task, so the hook only logs them at debug level.
pub const WORKER_THREAD_NAME: &str = "bt-worker";

/// Replace the default panic hook with one that logs through tracing.
pub fn install() {
    panic::set_hook(Box::new(|info| {
        report(info, thread::current().name());
    }));
}

fn report(info: &PanicHookInfo<'_>, thread: Option<&str>) {
    let panic = payload_message(info.payload());
    let location = info
        .location()
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if thread == Some(WORKER_THREAD_NAME) {
        tracing::debug!(%panic, %location, "task panicked");
    } else {
        tracing::error!(
            thread = thread.unwrap_or("unnamed"),
            %panic,
            %location,
            "internal panic"
        );
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
