// SPDX-License-Identifier: Apache-2.0 OR MIT

use chrono::{Duration, Utc};
use radius_store::session::{Counters, StartFields};
use radius_store::{Db, NasRepository, SessionRepository, UserRepository};

#[test]
fn dead_session_reaping_decrements_current_sessions() {
    let db = Db::open_in_memory().unwrap();
    let users = UserRepository::new(&db);
    let sessions = SessionRepository::new(&db);

    users.create("alice", "ctp:pw", 2, None).unwrap();
    sessions
        .insert_active(&StartFields {
            session_id: "s1",
            username: "alice",
            nas_identifier: Some("nas-1"),
            nas_ip_address: "10.0.0.5",
            framed_ip_address: None,
            calling_station_id: None,
            start_time: Utc::now() - Duration::seconds(200),
        })
        .unwrap();
    users.refresh_session_counts("alice", 1).unwrap();

    let threshold = Utc::now() - Duration::seconds(180);
    let touched = sessions.bulk_reap_dead(threshold, 2, Utc::now()).unwrap();
    assert_eq!(touched, vec!["alice".to_string()]);

    let remaining = sessions.count_active_for_username("alice").unwrap();
    users.refresh_session_counts("alice", remaining).unwrap();

    let alice = users.find_by_username("alice").unwrap().unwrap();
    assert_eq!(alice.current_sessions, 0);
    assert_eq!(alice.remaining_sessions, 2);
}

#[test]
fn nas_registry_strictness_with_multiple_rows_at_same_ip() {
    let db = Db::open_in_memory().unwrap();
    let nas = NasRepository::new(&db);
    nas.create("nas-1", "10.0.0.5", b"secret-one", 1812, 1813).unwrap();
    nas.create("nas-2", "10.0.0.6", b"secret-two", 1812, 1813).unwrap();

    assert!(nas
        .find_by_ip_and_identifier("10.0.0.5", "nas-2")
        .unwrap()
        .is_none());
    let found = nas.find_by_ip_and_identifier("10.0.0.5", "nas-1").unwrap().unwrap();
    assert_eq!(found.shared_secret, b"secret-one");
}

#[test]
fn start_update_stop_collapse_yields_final_counters() {
    let db = Db::open_in_memory().unwrap();
    let users = UserRepository::new(&db);
    let sessions = SessionRepository::new(&db);

    users.create("alice", "ctp:pw", 2, None).unwrap();
    sessions
        .insert_active(&StartFields {
            session_id: "s1",
            username: "alice",
            nas_identifier: Some("nas-1"),
            nas_ip_address: "10.0.0.5",
            framed_ip_address: Some("10.8.0.2"),
            calling_station_id: None,
            start_time: Utc::now(),
        })
        .unwrap();

    // Interim-Update: input=100, output=200 -- deltas against zero.
    sessions
        .update_counters(
            "s1",
            "10.0.0.5",
            &Counters {
                input_octets: 100,
                output_octets: 200,
                input_packets: 1,
                output_packets: 1,
                session_time: 60,
            },
            Utc::now(),
        )
        .unwrap();
    users.add_traffic("alice", 100, 200).unwrap();

    // Stop: absolute counters 300/500, delta against prior 100/200.
    sessions
        .stop(
            "s1",
            "10.0.0.5",
            Utc::now(),
            Some(1),
            &Counters {
                input_octets: 300,
                output_octets: 500,
                input_packets: 3,
                output_packets: 5,
                session_time: 180,
            },
        )
        .unwrap();
    users.add_traffic("alice", 200, 300).unwrap();
    users.refresh_session_counts("alice", 0).unwrap();

    let session = sessions.find("s1", "10.0.0.5").unwrap().unwrap();
    assert_eq!(session.input_octets, 300);
    assert_eq!(session.output_octets, 500);
    assert_eq!(session.session_time, 180);
    assert_eq!(session.terminate_cause, Some(1));

    let alice = users.find_by_username("alice").unwrap().unwrap();
    assert_eq!(alice.rx_traffic, 300);
    assert_eq!(alice.tx_traffic, 500);
    assert_eq!(alice.total_traffic, 800);
    assert_eq!(alice.current_sessions, 0);
    assert_eq!(alice.remaining_sessions, 2);
}
