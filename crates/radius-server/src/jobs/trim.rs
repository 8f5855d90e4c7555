// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keep only the most recent N Stopped sessions by `stop_time`; delete
//! the rest. This is the only retention strategy for Stopped sessions --
//! no per-create trimming.

use crate::app_state::AppState;
use radius_store::SessionRepository;
use tracing::{debug, error};

pub fn trim_inactive_sessions(state: &AppState) {
    let sessions = SessionRepository::new(&state.db);
    match sessions.trim_stopped(state.config.max_inactive_sessions) {
        Ok(deleted) if deleted > 0 => debug!(deleted, "trimmed inactive sessions"),
        Ok(_) => {}
        Err(e) => error!(error = %e, "inactive session trim failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::config::Config;
    use chrono::Utc;
    use radius_store::session::StartFields;
    use radius_store::{Db, UserRepository as Users};

    #[test]
    fn trim_keeps_only_the_configured_count() {
        let mut config = Config::default();
        config.max_inactive_sessions = 1;
        let state = AppState::new(Db::open_in_memory().unwrap(), config);
        let users = Users::new(&state.db);
        let sessions = SessionRepository::new(&state.db);
        users.create("alice", "ctp:pw", 5, None).unwrap();

        for id in ["s1", "s2", "s3"] {
            sessions
                .insert_active(&StartFields {
                    session_id: id,
                    username: "alice",
                    nas_identifier: Some("nas-1"),
                    nas_ip_address: "10.0.0.5",
                    framed_ip_address: None,
                    calling_station_id: None,
                    start_time: Utc::now(),
                })
                .unwrap();
            sessions
                .stop(id, "10.0.0.5", Utc::now(), Some(1), &radius_store::session::Counters::default())
                .unwrap();
        }

        trim_inactive_sessions(&state);

        let conn = state.db.lock();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM radius_sessions WHERE status = 'stopped'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 1);
    }
}
