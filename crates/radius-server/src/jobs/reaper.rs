// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dead-session reaping: an Active session whose NAS has stopped sending
//! Interim-Updates (crashed, lost power, or the Stop datagram was
//! dropped) is stopped with `Lost-Carrier` after a stale threshold.

use crate::app_state::AppState;
use chrono::Utc;
use radius_proto::dictionary::TerminateCause;
use radius_store::{SessionRepository, UserRepository};
use tracing::{error, info};

pub fn reap_dead_sessions(state: &AppState) {
    let threshold = Utc::now() - chrono::Duration::from_std(state.config.stale_session_threshold()).unwrap();
    let sessions = SessionRepository::new(&state.db);
    let users = UserRepository::new(&state.db);

    let touched = match sessions.bulk_reap_dead(threshold, TerminateCause::LostCarrier as i64, Utc::now()) {
        Ok(usernames) => usernames,
        Err(e) => {
            error!(error = %e, "dead session reap query failed");
            return;
        }
    };

    if touched.is_empty() {
        return;
    }
    info!(count = touched.len(), "reaped dead sessions");

    for username in &touched {
        match sessions.count_active_for_username(username) {
            Ok(current) => {
                if let Err(e) = users.refresh_session_counts(username, current) {
                    error!(%username, error = %e, "failed to refresh session counts after reap");
                }
            }
            Err(e) => error!(%username, error = %e, "failed to count active sessions after reap"),
        }
    }
}
