// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The write-behind Session Buffer: a FIFO queue of accounting operations
//! plus a "latest op per session" map, merged and committed to the store
//! on a fixed interval, on NAS-On/Off, and on shutdown.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use radius_proto::dictionary::TerminateCause;
use radius_store::session::{Counters, StartFields};
use radius_store::{Db, SessionRepository, UserRepository};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{error, warn};

const NAS_REQUEST_TERMINATE_CAUSE: i64 = TerminateCause::NasRequest as i64;

#[derive(Debug, Clone)]
pub struct StartPayload {
    pub nas_identifier: Option<String>,
    pub framed_ip_address: Option<String>,
    pub calling_station_id: Option<String>,
}

#[derive(Debug, Clone)]
enum OpKind {
    Start(StartPayload),
    Update(Counters),
    Stop {
        terminate_cause: Option<i64>,
        counters: Counters,
    },
}

#[derive(Debug, Clone)]
struct Operation {
    seq: u64,
    session_id: String,
    nas_ip: String,
    username: String,
    timestamp: DateTime<Utc>,
    kind: OpKind,
}

type Key = (String, String);

/// Single process-wide queue + pending-op map. Enqueue is lock-free aside
/// from the FIFO's own mutex, held only for O(1) push/drain operations.
pub struct SessionBuffer {
    queue: Mutex<VecDeque<Operation>>,
    pending: DashMap<Key, Operation>,
    next_seq: AtomicU64,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            pending: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn add_start(
        &self,
        session_id: &str,
        nas_ip: &str,
        username: &str,
        payload: StartPayload,
        timestamp: DateTime<Utc>,
    ) {
        let op = Operation {
            seq: self.next_seq(),
            session_id: session_id.to_string(),
            nas_ip: nas_ip.to_string(),
            username: username.to_string(),
            timestamp,
            kind: OpKind::Start(payload),
        };
        let key = (op.session_id.clone(), op.nas_ip.clone());
        self.pending.insert(key, op.clone());
        self.queue.lock().unwrap().push_back(op);
    }

    pub fn add_update(
        &self,
        session_id: &str,
        nas_ip: &str,
        username: &str,
        counters: Counters,
        timestamp: DateTime<Utc>,
    ) {
        let op = Operation {
            seq: self.next_seq(),
            session_id: session_id.to_string(),
            nas_ip: nas_ip.to_string(),
            username: username.to_string(),
            timestamp,
            kind: OpKind::Update(counters),
        };
        let key = (op.session_id.clone(), op.nas_ip.clone());
        self.queue.lock().unwrap().push_back(op.clone());
        // Cumulative-replace: fold into an existing Start/Update map entry,
        // otherwise (no entry, or the key was already Stopped) just record it.
        self.pending
            .entry(key)
            .and_modify(|existing| {
                if matches!(existing.kind, OpKind::Start(_) | OpKind::Update(_)) {
                    existing.kind = OpKind::Update(counters);
                    existing.seq = op.seq;
                    existing.timestamp = op.timestamp;
                } else {
                    *existing = op.clone();
                }
            })
            .or_insert(op);
    }

    pub fn add_stop(
        &self,
        session_id: &str,
        nas_ip: &str,
        username: &str,
        terminate_cause: Option<i64>,
        counters: Counters,
        timestamp: DateTime<Utc>,
    ) {
        let op = Operation {
            seq: self.next_seq(),
            session_id: session_id.to_string(),
            nas_ip: nas_ip.to_string(),
            username: username.to_string(),
            timestamp,
            kind: OpKind::Stop {
                terminate_cause,
                counters,
            },
        };
        let key = (op.session_id.clone(), op.nas_ip.clone());
        self.pending.insert(key, op.clone()); // Stop wins any prior state
        self.queue.lock().unwrap().push_back(op);
    }

    pub fn is_session_pending(&self, session_id: &str, nas_ip: &str) -> bool {
        self.pending
            .contains_key(&(session_id.to_string(), nas_ip.to_string()))
    }

    /// (# pending Starts) - (# pending Stops) for `username`, used by the
    /// auth engine's concurrency check.
    pub fn pending_active_count_for(&self, username: &str) -> i64 {
        let mut count = 0i64;
        for entry in self.pending.iter() {
            if entry.username != username {
                continue;
            }
            match entry.kind {
                OpKind::Start(_) => count += 1,
                OpKind::Stop { .. } => count -= 1,
                OpKind::Update(_) => {}
            }
        }
        count
    }

    /// Final synchronous flush on graceful shutdown. Errors are logged,
    /// never propagated -- there is nowhere left to re-enqueue to.
    pub fn shutdown(&self, db: &Db) {
        if let Err(e) = self.flush(db) {
            error!(error = %e, "final session buffer flush on shutdown failed");
        }
    }

    /// Drain the queue, merge per `(session_id, nas_ip)`, and apply each
    /// merged operation to the store. A group that fails to apply is pushed
    /// back onto the queue for the next flush and its pending entry is left
    /// in place. Returns the number of merged entries applied successfully.
    pub fn flush(&self, db: &Db) -> Result<usize> {
        let drained: VecDeque<Operation> = {
            let mut queue = self.queue.lock().unwrap();
            std::mem::take(&mut *queue)
        };
        if drained.is_empty() {
            return Ok(0);
        }

        let mut order: Vec<Key> = Vec::new();
        let mut groups: std::collections::HashMap<Key, Vec<Operation>> = std::collections::HashMap::new();
        for op in drained {
            let key = (op.session_id.clone(), op.nas_ip.clone());
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(op);
        }

        let mut touched_usernames: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut processed = 0usize;

        for key in &order {
            let ops = groups.remove(key).unwrap();
            let max_seq = ops.iter().map(|op| op.seq).max().unwrap_or(0);
            let username = ops[0].username.clone();

            if let Err(e) = self.apply_merged(db, key, &username, &ops) {
                error!(session_id = %key.0, nas_ip = %key.1, error = %e, "flush entry failed, re-enqueueing");
                self.queue.lock().unwrap().extend(ops);
                continue;
            }
            processed += 1;
            touched_usernames.insert(username.clone());

            // Only clear the map entry if nothing newer arrived during this flush.
            if let Some(entry) = self.pending.get(key) {
                if entry.seq <= max_seq {
                    drop(entry);
                    self.pending.remove(key);
                }
            }
        }

        for username in &touched_usernames {
            let sessions = SessionRepository::new(db);
            let users = UserRepository::new(db);
            match sessions.count_active_for_username(username) {
                Ok(current) => {
                    if let Err(e) = users.refresh_session_counts(username, current) {
                        error!(%username, error = %e, "failed to refresh session counts");
                    }
                }
                Err(e) => error!(%username, error = %e, "failed to count active sessions"),
            }
        }

        Ok(processed)
    }

    fn apply_merged(&self, db: &Db, key: &Key, username: &str, ops: &[Operation]) -> Result<()> {
        let (session_id, nas_ip) = key;
        let mut start_payload: Option<StartPayload> = None;
        let mut start_timestamp = ops[0].timestamp;
        let mut counters = Counters::default();
        let mut terminate_cause: Option<i64> = None;
        let mut has_stop = false;
        let mut last_timestamp = ops[0].timestamp;

        for op in ops {
            last_timestamp = op.timestamp;
            match &op.kind {
                OpKind::Start(p) => {
                    start_payload = Some(p.clone());
                    start_timestamp = op.timestamp;
                }
                OpKind::Update(c) => counters = *c,
                OpKind::Stop {
                    terminate_cause: tc,
                    counters: c,
                } => {
                    has_stop = true;
                    terminate_cause = *tc;
                    counters = *c;
                }
            }
        }

        let sessions = SessionRepository::new(db);
        let users = UserRepository::new(db);

        match (start_payload, has_stop) {
            (Some(payload), true) => self.apply_start_stop(
                &sessions,
                &users,
                session_id,
                nas_ip,
                username,
                &payload,
                start_timestamp,
                last_timestamp,
                terminate_cause,
                &counters,
            ),
            (Some(payload), false) => self.apply_start(
                &sessions,
                &users,
                session_id,
                nas_ip,
                username,
                &payload,
                start_timestamp,
                &counters,
            ),
            (None, true) => self.apply_stop(
                &sessions,
                &users,
                session_id,
                nas_ip,
                last_timestamp,
                terminate_cause,
                &counters,
            ),
            (None, false) => self.apply_update(&sessions, &users, session_id, nas_ip, last_timestamp, &counters),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_start(
        &self,
        sessions: &SessionRepository,
        users: &UserRepository,
        session_id: &str,
        nas_ip: &str,
        username: &str,
        payload: &StartPayload,
        start_time: DateTime<Utc>,
        counters: &Counters,
    ) -> Result<()> {
        if sessions
            .find(session_id, nas_ip)
            .context("looking up existing session for start")?
            .is_some()
        {
            warn!(session_id, nas_ip, "duplicate start, skipping");
            return Ok(());
        }

        self.displace_conflicting_session(sessions, username, payload.framed_ip_address.as_deref(), session_id)?;

        let fields = StartFields {
            session_id,
            username,
            nas_identifier: payload.nas_identifier.as_deref(),
            nas_ip_address: nas_ip,
            framed_ip_address: payload.framed_ip_address.as_deref(),
            calling_station_id: payload.calling_station_id.as_deref(),
            start_time,
        };
        sessions.insert_active(&fields).context("inserting new session")?;

        if counters.input_octets != 0 || counters.output_octets != 0 {
            sessions
                .update_counters(session_id, nas_ip, counters, start_time)
                .context("applying initial counters")?;
            users
                .add_traffic(username, counters.input_octets, counters.output_octets)
                .context("crediting initial traffic")?;
        }
        Ok(())
    }

    fn apply_update(
        &self,
        sessions: &SessionRepository,
        users: &UserRepository,
        session_id: &str,
        nas_ip: &str,
        last_updated: DateTime<Utc>,
        counters: &Counters,
    ) -> Result<()> {
        let existing = sessions
            .find(session_id, nas_ip)
            .context("looking up session for update")?;
        let Some(existing) = existing else {
            warn!(session_id, nas_ip, "update for unknown session, skipping");
            return Ok(());
        };

        let delta_rx = counter_delta(existing.input_octets, counters.input_octets);
        let delta_tx = counter_delta(existing.output_octets, counters.output_octets);
        users
            .add_traffic(&existing.username, delta_rx, delta_tx)
            .context("crediting interim traffic")?;
        sessions
            .update_counters(session_id, nas_ip, counters, last_updated)
            .context("overwriting session counters")?;
        Ok(())
    }

    fn apply_stop(
        &self,
        sessions: &SessionRepository,
        users: &UserRepository,
        session_id: &str,
        nas_ip: &str,
        stop_time: DateTime<Utc>,
        terminate_cause: Option<i64>,
        counters: &Counters,
    ) -> Result<()> {
        let existing = sessions
            .find(session_id, nas_ip)
            .context("looking up session for stop")?;
        let Some(existing) = existing else {
            warn!(session_id, nas_ip, "stop for unknown session, skipping");
            return Ok(());
        };

        let delta_rx = counter_delta(existing.input_octets, counters.input_octets);
        let delta_tx = counter_delta(existing.output_octets, counters.output_octets);
        users
            .add_traffic(&existing.username, delta_rx, delta_tx)
            .context("crediting final traffic")?;
        sessions
            .stop(session_id, nas_ip, stop_time, terminate_cause, counters)
            .context("marking session stopped")?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_start_stop(
        &self,
        sessions: &SessionRepository,
        users: &UserRepository,
        session_id: &str,
        nas_ip: &str,
        username: &str,
        payload: &StartPayload,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
        terminate_cause: Option<i64>,
        counters: &Counters,
    ) -> Result<()> {
        if sessions
            .find(session_id, nas_ip)
            .context("looking up existing session for start+stop")?
            .is_some()
        {
            warn!(session_id, nas_ip, "duplicate start, skipping");
            return Ok(());
        }

        self.displace_conflicting_session(sessions, username, payload.framed_ip_address.as_deref(), session_id)?;

        let fields = StartFields {
            session_id,
            username,
            nas_identifier: payload.nas_identifier.as_deref(),
            nas_ip_address: nas_ip,
            framed_ip_address: payload.framed_ip_address.as_deref(),
            calling_station_id: payload.calling_station_id.as_deref(),
            start_time,
        };
        sessions
            .insert_stopped(&fields, stop_time, terminate_cause, counters)
            .context("inserting collapsed start+stop session")?;
        users
            .add_traffic(username, counters.input_octets, counters.output_octets)
            .context("crediting start+stop traffic")?;
        Ok(())
    }

    fn displace_conflicting_session(
        &self,
        sessions: &SessionRepository,
        username: &str,
        framed_ip_address: Option<&str>,
        excluding_session_id: &str,
    ) -> Result<()> {
        let Some(framed_ip) = framed_ip_address else {
            return Ok(());
        };
        if let Some(conflict) = sessions
            .find_active_conflict(username, framed_ip, excluding_session_id)
            .context("checking for framed-ip conflict")?
        {
            sessions
                .stop(
                    &conflict.session_id,
                    &conflict.nas_ip_address,
                    Utc::now(),
                    Some(NAS_REQUEST_TERMINATE_CAUSE),
                    &Counters {
                        input_octets: conflict.input_octets,
                        output_octets: conflict.output_octets,
                        input_packets: conflict.input_packets,
                        output_packets: conflict.output_packets,
                        session_time: conflict.session_time,
                    },
                )
                .context("displacing stale session")?;
        }
        Ok(())
    }
}

impl Default for SessionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter-reset-aware delta: a NAS restarting an interface resets its
/// counters to zero, so a decrease is treated as "start over from `new`".
fn counter_delta(old: i64, new: i64) -> i64 {
    if new >= old {
        new - old
    } else {
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_store::UserRepository as Users;

    fn start_payload(framed_ip: Option<&str>) -> StartPayload {
        StartPayload {
            nas_identifier: Some("nas-1".into()),
            framed_ip_address: framed_ip.map(String::from),
            calling_station_id: None,
        }
    }

    #[test]
    fn pending_active_count_reflects_starts_minus_stops() {
        let buffer = SessionBuffer::new();
        buffer.add_start("s1", "10.0.0.5", "alice", start_payload(None), Utc::now());
        buffer.add_start("s2", "10.0.0.5", "alice", start_payload(None), Utc::now());
        assert_eq!(buffer.pending_active_count_for("alice"), 2);

        buffer.add_stop("s1", "10.0.0.5", "alice", None, Counters::default(), Utc::now());
        assert_eq!(buffer.pending_active_count_for("alice"), 1);
    }

    #[test]
    fn flush_collapses_start_update_stop_into_one_session() {
        let db = Db::open_in_memory().unwrap();
        Users::new(&db).create("alice", "ctp:pw", 2, None).unwrap();

        let buffer = SessionBuffer::new();
        let t0 = Utc::now();
        buffer.add_start("s1", "10.0.0.5", "alice", start_payload(Some("10.8.0.2")), t0);
        buffer.add_update(
            "s1",
            "10.0.0.5",
            "alice",
            Counters {
                input_octets: 100,
                output_octets: 200,
                input_packets: 1,
                output_packets: 1,
                session_time: 60,
            },
            t0,
        );
        buffer.add_stop(
            "s1",
            "10.0.0.5",
            "alice",
            Some(1),
            Counters {
                input_octets: 300,
                output_octets: 500,
                input_packets: 3,
                output_packets: 5,
                session_time: 180,
            },
            t0,
        );

        let processed = buffer.flush(&db).unwrap();
        assert_eq!(processed, 1);

        let sessions = SessionRepository::new(&db);
        let session = sessions.find("s1", "10.0.0.5").unwrap().unwrap();
        assert_eq!(session.status, radius_store::SessionStatus::Stopped);
        assert_eq!(session.input_octets, 300);
        assert_eq!(session.output_octets, 500);
        assert_eq!(session.session_time, 180);

        let users = Users::new(&db);
        let alice = users.find_by_username("alice").unwrap().unwrap();
        assert_eq!(alice.rx_traffic, 300);
        assert_eq!(alice.tx_traffic, 500);
        assert_eq!(alice.current_sessions, 0);
        assert_eq!(alice.remaining_sessions, 2);
        assert!(!buffer.is_session_pending("s1", "10.0.0.5"));
    }

    #[test]
    fn flush_displaces_session_with_conflicting_framed_ip() {
        let db = Db::open_in_memory().unwrap();
        Users::new(&db).create("alice", "ctp:pw", 2, None).unwrap();

        let buffer = SessionBuffer::new();
        buffer.add_start("s_old", "10.0.0.5", "alice", start_payload(Some("10.8.0.2")), Utc::now());
        buffer.flush(&db).unwrap();

        buffer.add_start("s_new", "10.0.0.5", "alice", start_payload(Some("10.8.0.2")), Utc::now());
        buffer.flush(&db).unwrap();

        let sessions = SessionRepository::new(&db);
        let old = sessions.find("s_old", "10.0.0.5").unwrap().unwrap();
        let new = sessions.find("s_new", "10.0.0.5").unwrap().unwrap();
        assert_eq!(old.status, radius_store::SessionStatus::Stopped);
        assert_eq!(old.terminate_cause, Some(10));
        assert_eq!(new.status, radius_store::SessionStatus::Active);
    }

    #[test]
    fn counter_reset_credits_full_new_value() {
        assert_eq!(counter_delta(500, 100), 100);
        assert_eq!(counter_delta(100, 300), 200);
    }

    /// A store failure during flush must not drop the operation: it goes
    /// back on the queue and the pending entry is left in place.
    #[test]
    fn flush_reenqueues_ops_on_store_failure() {
        let db = Db::open_in_memory().unwrap();
        db.lock().execute("DROP TABLE radius_sessions", []).unwrap();

        let buffer = SessionBuffer::new();
        buffer.add_start("s1", "10.0.0.5", "alice", start_payload(None), Utc::now());

        let processed = buffer.flush(&db).unwrap();
        assert_eq!(processed, 0);
        assert!(buffer.is_session_pending("s1", "10.0.0.5"));
        assert_eq!(buffer.queue.lock().unwrap().len(), 1);
    }
}
