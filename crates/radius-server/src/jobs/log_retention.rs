// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::app_state::AppState;
use radius_store::LogRepository;
use tracing::{debug, error};

pub fn apply_log_retention(state: &AppState) {
    let repo = LogRepository::new(&state.db);
    match repo.apply_retention(state.config.radius_log_retention) {
        Ok(deleted) if deleted > 0 => debug!(deleted, "pruned log entries"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "log retention failed"),
    }
}
