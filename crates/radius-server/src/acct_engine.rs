// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Accounting engine (C6): classifies an Accounting-Request by
//! Acct-Status-Type and either enqueues into the Session Buffer or
//! handles NAS-On/Off synchronously.

use crate::app_state::AppState;
use crate::session_buffer::StartPayload;
use chrono::Utc;
use radius_proto::dictionary::{self, acct_status, TerminateCause};
use radius_proto::{Packet, Reply};
use radius_store::session::Counters;
use radius_store::{SessionRepository, UserRepository};
use tracing::warn;

pub fn handle_accounting_request(state: &AppState, request: &Packet, nas_ip: &str) -> Reply {
    let Some(status_type) = request
        .find(dictionary::ACCT_STATUS_TYPE)
        .and_then(|a| a.as_u32().ok())
    else {
        warn!(nas_ip, "accounting request missing Acct-Status-Type");
        return Reply::AcctResponse;
    };

    let Some(session_id) = request
        .find(dictionary::ACCT_SESSION_ID)
        .and_then(|a| a.as_text().ok())
    else {
        warn!(nas_ip, "accounting request missing Acct-Session-Id");
        return Reply::AcctResponse;
    };

    let username = request
        .find(dictionary::USER_NAME)
        .and_then(|a| a.as_text().ok())
        .unwrap_or("")
        .to_string();

    match status_type {
        acct_status::START => {
            state.buffer.add_start(session_id, nas_ip, &username, start_payload(request), Utc::now());
        }
        acct_status::STOP => {
            let terminate_cause = request
                .find(dictionary::ACCT_TERMINATE_CAUSE)
                .and_then(|a| a.as_u32().ok())
                .map(|v| v as i64);
            state
                .buffer
                .add_stop(session_id, nas_ip, &username, terminate_cause, counters(request), Utc::now());
        }
        acct_status::INTERIM_UPDATE => {
            state
                .buffer
                .add_update(session_id, nas_ip, &username, counters(request), Utc::now());
        }
        acct_status::ACCOUNTING_ON => {
            bulk_restart(state, nas_ip, TerminateCause::NasReboot as i64);
        }
        acct_status::ACCOUNTING_OFF => {
            bulk_restart(state, nas_ip, TerminateCause::NasRequest as i64);
        }
        other => {
            warn!(nas_ip, status_type = other, "unrecognized Acct-Status-Type");
        }
    }

    Reply::AcctResponse
}

fn start_payload(request: &Packet) -> StartPayload {
    StartPayload {
        nas_identifier: request
            .find(dictionary::NAS_IDENTIFIER)
            .and_then(|a| a.as_text().ok())
            .map(String::from),
        framed_ip_address: request
            .find(dictionary::FRAMED_IP_ADDRESS)
            .and_then(|a| a.as_ipv4().ok())
            .map(|ip| ip.to_string()),
        calling_station_id: request
            .find(dictionary::CALLING_STATION_ID)
            .and_then(|a| a.as_text().ok())
            .map(String::from),
    }
}

fn counters(request: &Packet) -> Counters {
    Counters {
        input_octets: attr_u32(request, dictionary::ACCT_INPUT_OCTETS),
        output_octets: attr_u32(request, dictionary::ACCT_OUTPUT_OCTETS),
        input_packets: attr_u32(request, dictionary::ACCT_INPUT_PACKETS),
        output_packets: attr_u32(request, dictionary::ACCT_OUTPUT_PACKETS),
        session_time: attr_u32(request, dictionary::ACCT_SESSION_TIME),
    }
}

fn attr_u32(request: &Packet, typ: u8) -> i64 {
    request.find(typ).and_then(|a| a.as_u32().ok()).unwrap_or(0) as i64
}

/// Accounting-On/Off: flush the buffer first so no pending Start/Update
/// for this NAS survives the bulk stop, then mark every Active session
/// for this NAS as stopped and refresh the affected users' counts.
fn bulk_restart(state: &AppState, nas_ip: &str, terminate_cause: i64) {
    if let Err(e) = state.buffer.flush(&state.db) {
        tracing::error!(nas_ip, error = %e, "flush before bulk restart failed");
    }

    let sessions = SessionRepository::new(&state.db);
    let touched = match sessions.bulk_stop_by_nas_ip(nas_ip, terminate_cause, Utc::now()) {
        Ok(usernames) => usernames,
        Err(e) => {
            tracing::error!(nas_ip, error = %e, "bulk stop by nas ip failed");
            return;
        }
    };

    let users = UserRepository::new(&state.db);
    for username in &touched {
        match sessions.count_active_for_username(username) {
            Ok(current) => {
                if let Err(e) = users.refresh_session_counts(username, current) {
                    tracing::error!(%username, error = %e, "failed to refresh session counts");
                }
            }
            Err(e) => tracing::error!(%username, error = %e, "failed to count active sessions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use radius_proto::attribute::Attribute;
    use radius_proto::packet::Code;
    use radius_store::{Db, SessionStatus, StartFields, UserRepository as Users};

    fn make_state() -> std::sync::Arc<AppState> {
        AppState::new(Db::open_in_memory().unwrap(), Config::default())
    }

    fn request(status: u32, attrs: Vec<Attribute>) -> Packet {
        let mut packet = Packet::new(Code::AccountingRequest, 1);
        packet = packet.with_attribute(Attribute::integer(dictionary::ACCT_STATUS_TYPE, status));
        for attr in attrs {
            packet = packet.with_attribute(attr);
        }
        packet
    }

    #[test]
    fn start_stop_flush_produces_stopped_session() {
        let state = make_state();
        Users::new(&state.db).create("alice", "ctp:pw", 2, None).unwrap();

        let start = request(
            acct_status::START,
            vec![
                Attribute::text(dictionary::ACCT_SESSION_ID, "s1"),
                Attribute::text(dictionary::USER_NAME, "alice"),
            ],
        );
        handle_accounting_request(&state, &start, "10.0.0.5");

        let stop = request(
            acct_status::STOP,
            vec![
                Attribute::text(dictionary::ACCT_SESSION_ID, "s1"),
                Attribute::text(dictionary::USER_NAME, "alice"),
                Attribute::integer(dictionary::ACCT_INPUT_OCTETS, 300),
                Attribute::integer(dictionary::ACCT_OUTPUT_OCTETS, 500),
                Attribute::integer(dictionary::ACCT_SESSION_TIME, 120),
                Attribute::integer(dictionary::ACCT_TERMINATE_CAUSE, 1),
            ],
        );
        handle_accounting_request(&state, &stop, "10.0.0.5");

        state.buffer.flush(&state.db).unwrap();
        let session = SessionRepository::new(&state.db).find("s1", "10.0.0.5").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Stopped);
        assert_eq!(session.input_octets, 300);
        assert_eq!(session.session_time, 120);
    }

    #[test]
    fn accounting_off_bulk_stops_and_refreshes_counts() {
        let state = make_state();
        let users = Users::new(&state.db);
        users.create("alice", "ctp:pw", 2, None).unwrap();
        let sessions = SessionRepository::new(&state.db);
        sessions
            .insert_active(&StartFields {
                session_id: "s1",
                username: "alice",
                nas_identifier: Some("nas-1"),
                nas_ip_address: "10.0.0.5",
                framed_ip_address: None,
                calling_station_id: None,
                start_time: Utc::now(),
            })
            .unwrap();
        users.refresh_session_counts("alice", 1).unwrap();

        let off = request(acct_status::ACCOUNTING_OFF, vec![]);
        handle_accounting_request(&state, &off, "10.0.0.5");

        let session = sessions.find("s1", "10.0.0.5").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Stopped);
        assert_eq!(session.terminate_cause, Some(TerminateCause::NasRequest as i64));

        let alice = users.find_by_username("alice").unwrap().unwrap();
        assert_eq!(alice.current_sessions, 0);
    }

    #[test]
    fn missing_session_id_is_logged_and_still_replies() {
        let state = make_state();
        let req = request(acct_status::START, vec![Attribute::text(dictionary::USER_NAME, "alice")]);
        let reply = handle_accounting_request(&state, &req, "10.0.0.5");
        assert!(matches!(reply, Reply::AcctResponse));
    }
}
