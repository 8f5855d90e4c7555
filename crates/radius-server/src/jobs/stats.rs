// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Four periodic samplers that snapshot current aggregates into the
//! time-series stats tables (C10).

use crate::app_state::AppState;
use radius_store::{SessionRepository, StatsRepository, UserRepository};
use tracing::error;

pub fn sample_server_sessions(state: &AppState) {
    let active = match SessionRepository::new(&state.db).count_active_total() {
        Ok(n) => n,
        Err(e) => {
            error!(error = %e, "failed to count active sessions for sampling");
            return;
        }
    };
    if let Err(e) = StatsRepository::new(&state.db).sample_server_sessions(active) {
        error!(error = %e, "failed to sample server sessions");
    }
}

pub fn sample_server_traffic(state: &AppState) {
    let (rx, tx) = match UserRepository::new(&state.db).aggregate_traffic() {
        Ok(totals) => totals,
        Err(e) => {
            error!(error = %e, "failed to aggregate traffic for sampling");
            return;
        }
    };
    if let Err(e) = StatsRepository::new(&state.db).sample_server_traffic(rx, tx) {
        error!(error = %e, "failed to sample server traffic");
    }
}

pub fn sample_user_sessions(state: &AppState) {
    let users = match UserRepository::new(&state.db).list_all() {
        Ok(users) => users,
        Err(e) => {
            error!(error = %e, "failed to list users for session sampling");
            return;
        }
    };
    let stats = StatsRepository::new(&state.db);
    for user in users {
        if let Err(e) = stats.sample_user_sessions(&user.username, user.current_sessions) {
            error!(username = %user.username, error = %e, "failed to sample user sessions");
        }
    }
}

pub fn sample_user_traffic(state: &AppState) {
    let users = match UserRepository::new(&state.db).list_all() {
        Ok(users) => users,
        Err(e) => {
            error!(error = %e, "failed to list users for traffic sampling");
            return;
        }
    };
    let stats = StatsRepository::new(&state.db);
    for user in users {
        if let Err(e) = stats.sample_user_traffic(&user.username, user.rx_traffic, user.tx_traffic) {
            error!(username = %user.username, error = %e, "failed to sample user traffic");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use crate::config::Config;
    use radius_store::session::StartFields;
    use radius_store::{Db, UserRepository as Users};

    fn count(state: &AppState, table: &str) -> i64 {
        let conn = state.db.lock();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn samplers_insert_one_row_per_call() {
        let state = AppState::new(Db::open_in_memory().unwrap(), Config::default());
        let users = Users::new(&state.db);
        let sessions = SessionRepository::new(&state.db);
        users.create("alice", "ctp:pw", 2, None).unwrap();
        users.add_traffic("alice", 100, 200).unwrap();
        sessions
            .insert_active(&StartFields {
                session_id: "s1",
                username: "alice",
                nas_identifier: Some("nas-1"),
                nas_ip_address: "10.0.0.5",
                framed_ip_address: None,
                calling_station_id: None,
                start_time: chrono::Utc::now(),
            })
            .unwrap();

        sample_server_sessions(&state);
        sample_server_traffic(&state);
        sample_user_sessions(&state);
        sample_user_traffic(&state);

        assert_eq!(count(&state, "stats_server_sessions"), 1);
        assert_eq!(count(&state, "stats_server_traffic"), 1);
        assert_eq!(count(&state, "stats_user_sessions"), 1);
        assert_eq!(count(&state, "stats_user_traffic"), 1);
    }
}
