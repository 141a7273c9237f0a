//! Panic containment for user callbacks
//!
//! Tickers and completion or cancel callbacks are caller code. A panic in one
//! is logged and swallowed so it only ever ends its own countdown.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

use super::types::CountdownId;

/// Runs `callback`, logging and swallowing a panic.
///
/// Returns `false` if the callback panicked.
pub(crate) fn guarded(id: &CountdownId, callback: &'static str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            warn!(
                countdown_id = %id,
                callback,
                panic = panic_message(payload.as_ref()),
                "countdown callback panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
