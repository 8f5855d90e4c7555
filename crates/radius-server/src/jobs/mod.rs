// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Periodic job bodies invoked by the [`crate::scheduler::Scheduler`].
//! Each function takes `&AppState` and returns nothing: failures are
//! logged internally rather than propagated, since there is no caller
//! to hand an error back to on a timer tick.

mod log_retention;
mod reaper;
mod stats;
mod trim;

use crate::app_state::AppState;

pub fn flush_session_buffer(state: &AppState) {
    match state.buffer.flush(&state.db) {
        Ok(n) if n > 0 => tracing::debug!(merged = n, "session buffer flushed"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "session buffer flush failed"),
    }
}

pub use log_retention::apply_log_retention;
pub use reaper::reap_dead_sessions;
pub use stats::{sample_server_sessions, sample_server_traffic, sample_user_sessions, sample_user_traffic};
pub use trim::trim_inactive_sessions;
