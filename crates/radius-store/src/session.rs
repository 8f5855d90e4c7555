// SPDX-License-Identifier: Apache-2.0 OR MIT

//! VPN session records and the bulk operations the reaper and NAS-On/Off
//! handlers drive.

use crate::db::Db;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Stopped,
}

impl SessionStatus {
    fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Stopped => "stopped",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "stopped" => SessionStatus::Stopped,
            _ => SessionStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadiusSession {
    pub id: i64,
    pub session_id: String,
    pub username: String,
    pub nas_identifier: Option<String>,
    pub nas_ip_address: String,
    pub framed_ip_address: Option<String>,
    pub calling_station_id: Option<String>,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub stop_time: Option<DateTime<Utc>>,
    pub session_time: i64,
    pub input_octets: i64,
    pub output_octets: i64,
    pub input_packets: i64,
    pub output_packets: i64,
    pub terminate_cause: Option<i64>,
}

/// Fields carried by a Start operation.
pub struct StartFields<'a> {
    pub session_id: &'a str,
    pub username: &'a str,
    pub nas_identifier: Option<&'a str>,
    pub nas_ip_address: &'a str,
    pub framed_ip_address: Option<&'a str>,
    pub calling_station_id: Option<&'a str>,
    pub start_time: DateTime<Utc>,
}

/// Absolute counter values carried by an Update or Stop operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub input_octets: i64,
    pub output_octets: i64,
    pub input_packets: i64,
    pub output_packets: i64,
    pub session_time: i64,
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<RadiusSession> {
    Ok(RadiusSession {
        id: row.get(0)?,
        session_id: row.get(1)?,
        username: row.get(2)?,
        nas_identifier: row.get(3)?,
        nas_ip_address: row.get(4)?,
        framed_ip_address: row.get(5)?,
        calling_station_id: row.get(6)?,
        status: SessionStatus::from_str(&row.get::<_, String>(7)?),
        start_time: row.get(8)?,
        last_updated: row.get(9)?,
        stop_time: row.get(10)?,
        session_time: row.get(11)?,
        input_octets: row.get(12)?,
        output_octets: row.get(13)?,
        input_packets: row.get(14)?,
        output_packets: row.get(15)?,
        terminate_cause: row.get(16)?,
    })
}

const SELECT_COLUMNS: &str = "id, session_id, username, nas_identifier, nas_ip_address, \
     framed_ip_address, calling_station_id, status, start_time, last_updated, stop_time, \
     session_time, input_octets, output_octets, input_packets, output_packets, terminate_cause";

pub struct SessionRepository<'a> {
    db: &'a Db,
}

impl<'a> SessionRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn find(&self, session_id: &str, nas_ip_address: &str) -> Result<Option<RadiusSession>, StoreError> {
        let conn = self.db.lock();
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM radius_sessions WHERE session_id = ?1 AND nas_ip_address = ?2"
        );
        conn.query_row(&query, params![session_id, nas_ip_address], row_to_session)
            .optional()
            .map_err(StoreError::from)
    }

    /// Active session for `username` with the given `framed_ip_address`
    /// but a different `session_id` — the displacement check.
    pub fn find_active_conflict(
        &self,
        username: &str,
        framed_ip_address: &str,
        excluding_session_id: &str,
    ) -> Result<Option<RadiusSession>, StoreError> {
        let conn = self.db.lock();
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM radius_sessions
             WHERE username = ?1 AND framed_ip_address = ?2 AND session_id != ?3 AND status = 'active'
             LIMIT 1"
        );
        conn.query_row(
            &query,
            params![username, framed_ip_address, excluding_session_id],
            row_to_session,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn insert_active(&self, fields: &StartFields) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO radius_sessions
             (session_id, username, nas_identifier, nas_ip_address, framed_ip_address,
              calling_station_id, status, start_time, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?7, ?7)",
            params![
                fields.session_id,
                fields.username,
                fields.nas_identifier,
                fields.nas_ip_address,
                fields.framed_ip_address,
                fields.calling_station_id,
                fields.start_time,
            ],
        )?;
        Ok(())
    }

    /// Insert a session that arrived and departed within one flush window
    /// (a collapsed Start+Stop).
    pub fn insert_stopped(
        &self,
        fields: &StartFields,
        stop_time: DateTime<Utc>,
        terminate_cause: Option<i64>,
        counters: &Counters,
    ) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO radius_sessions
             (session_id, username, nas_identifier, nas_ip_address, framed_ip_address,
              calling_station_id, status, start_time, last_updated, stop_time,
              session_time, input_octets, output_octets, input_packets, output_packets, terminate_cause)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'stopped', ?7, ?8, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                fields.session_id,
                fields.username,
                fields.nas_identifier,
                fields.nas_ip_address,
                fields.framed_ip_address,
                fields.calling_station_id,
                fields.start_time,
                stop_time,
                counters.session_time,
                counters.input_octets,
                counters.output_octets,
                counters.input_packets,
                counters.output_packets,
                terminate_cause,
            ],
        )?;
        Ok(())
    }

    /// Overwrite counter fields with new absolute values (Interim-Update).
    pub fn update_counters(
        &self,
        session_id: &str,
        nas_ip_address: &str,
        counters: &Counters,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE radius_sessions
             SET input_octets = ?1, output_octets = ?2, input_packets = ?3, output_packets = ?4,
                 session_time = ?5, last_updated = ?6
             WHERE session_id = ?7 AND nas_ip_address = ?8",
            params![
                counters.input_octets,
                counters.output_octets,
                counters.input_packets,
                counters.output_packets,
                counters.session_time,
                last_updated,
                session_id,
                nas_ip_address,
            ],
        )?;
        Ok(())
    }

    pub fn stop(
        &self,
        session_id: &str,
        nas_ip_address: &str,
        stop_time: DateTime<Utc>,
        terminate_cause: Option<i64>,
        counters: &Counters,
    ) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE radius_sessions
             SET status = 'stopped', stop_time = ?1, terminate_cause = ?2,
                 input_octets = ?3, output_octets = ?4, input_packets = ?5, output_packets = ?6,
                 session_time = ?7, last_updated = ?1
             WHERE session_id = ?8 AND nas_ip_address = ?9",
            params![
                stop_time,
                terminate_cause,
                counters.input_octets,
                counters.output_octets,
                counters.input_packets,
                counters.output_packets,
                counters.session_time,
                session_id,
                nas_ip_address,
            ],
        )?;
        Ok(())
    }

    /// Total Active sessions across every NAS, for the server-wide stats
    /// sampler.
    pub fn count_active_total(&self) -> Result<i64, StoreError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM radius_sessions WHERE status = 'active'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_active_for_username(&self, username: &str) -> Result<i64, StoreError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM radius_sessions WHERE username = ?1 AND status = 'active'",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Bulk-stop every Active session for a NAS (Accounting-On/Off), returning
    /// the distinct usernames touched so their session counts can be refreshed.
    pub fn bulk_stop_by_nas_ip(
        &self,
        nas_ip_address: &str,
        terminate_cause: i64,
        stop_time: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.db.lock();
        let usernames: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT username FROM radius_sessions
                 WHERE nas_ip_address = ?1 AND status = 'active'",
            )?;
            stmt.query_map(params![nas_ip_address], |row| row.get(0))?
                .collect::<Result<_, _>>()?
        };
        conn.execute(
            "UPDATE radius_sessions
             SET status = 'stopped', stop_time = ?1, terminate_cause = ?2, last_updated = ?1
             WHERE nas_ip_address = ?3 AND status = 'active'",
            params![stop_time, terminate_cause, nas_ip_address],
        )?;
        Ok(usernames)
    }

    /// Bulk-stop every Active session whose `last_updated` is older than
    /// `threshold` (dead-session reaping), returning the usernames touched.
    pub fn bulk_reap_dead(
        &self,
        threshold: DateTime<Utc>,
        terminate_cause: i64,
        stop_time: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.db.lock();
        let usernames: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT username FROM radius_sessions
                 WHERE status = 'active' AND last_updated < ?1",
            )?;
            stmt.query_map(params![threshold], |row| row.get(0))?
                .collect::<Result<_, _>>()?
        };
        conn.execute(
            "UPDATE radius_sessions
             SET status = 'stopped', stop_time = ?1, terminate_cause = ?2, last_updated = ?1
             WHERE status = 'active' AND last_updated < ?3",
            params![stop_time, terminate_cause, threshold],
        )?;
        Ok(usernames)
    }

    /// Keep only the most recent `keep_n` Stopped sessions by `stop_time`.
    pub fn trim_stopped(&self, keep_n: i64) -> Result<usize, StoreError> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM radius_sessions
             WHERE status = 'stopped'
             AND id NOT IN (
                 SELECT id FROM radius_sessions
                 WHERE status = 'stopped'
                 ORDER BY stop_time DESC
                 LIMIT ?1
             )",
            params![keep_n],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn start(session_id: &str, username: &str, nas_ip: &str, framed_ip: Option<&str>) -> StartFields<'_> {
        StartFields {
            session_id,
            username,
            nas_identifier: Some("nas-1"),
            nas_ip_address: nas_ip,
            framed_ip_address: framed_ip,
            calling_station_id: None,
            start_time: Utc::now(),
        }
    }

    #[test]
    fn start_then_stop_round_trips() {
        let db = Db::open_in_memory().unwrap();
        let repo = SessionRepository::new(&db);
        repo.insert_active(&start("s1", "alice", "10.0.0.5", Some("10.8.0.2")))
            .unwrap();

        let counters = Counters {
            input_octets: 300,
            output_octets: 500,
            input_packets: 10,
            output_packets: 20,
            session_time: 120,
        };
        repo.stop("s1", "10.0.0.5", Utc::now(), Some(1), &counters).unwrap();

        let session = repo.find("s1", "10.0.0.5").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Stopped);
        assert_eq!(session.input_octets, 300);
        assert_eq!(session.session_time, 120);
        assert_eq!(session.terminate_cause, Some(1));
    }

    #[test]
    fn count_active_total_ignores_stopped() {
        let db = Db::open_in_memory().unwrap();
        let repo = SessionRepository::new(&db);
        repo.insert_active(&start("s1", "alice", "10.0.0.5", None)).unwrap();
        repo.insert_active(&start("s2", "bob", "10.0.0.6", None)).unwrap();
        repo.stop("s2", "10.0.0.6", Utc::now(), Some(1), &Counters::default())
            .unwrap();
        assert_eq!(repo.count_active_total().unwrap(), 1);
    }

    #[test]
    fn displacement_finds_conflicting_framed_ip() {
        let db = Db::open_in_memory().unwrap();
        let repo = SessionRepository::new(&db);
        repo.insert_active(&start("s_old", "alice", "10.0.0.5", Some("10.8.0.2")))
            .unwrap();

        let conflict = repo
            .find_active_conflict("alice", "10.8.0.2", "s_new")
            .unwrap();
        assert!(conflict.is_some());
        assert_eq!(conflict.unwrap().session_id, "s_old");
    }

    #[test]
    fn reaper_stops_stale_sessions_only() {
        let db = Db::open_in_memory().unwrap();
        let repo = SessionRepository::new(&db);
        repo.insert_active(&start("s1", "alice", "10.0.0.5", None)).unwrap();

        let threshold = Utc::now() + Duration::seconds(1);
        let touched = repo.bulk_reap_dead(threshold, 2, Utc::now()).unwrap();
        assert_eq!(touched, vec!["alice".to_string()]);

        let session = repo.find("s1", "10.0.0.5").unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Stopped);
        assert_eq!(session.terminate_cause, Some(2));
    }

    #[test]
    fn trim_keeps_only_most_recent_stopped() {
        let db = Db::open_in_memory().unwrap();
        let repo = SessionRepository::new(&db);
        for i in 0..5 {
            let sid = format!("s{i}");
            repo.insert_active(&start(&sid, "alice", "10.0.0.5", None)).unwrap();
            repo.stop(&sid, "10.0.0.5", Utc::now(), Some(1), &Counters::default())
                .unwrap();
        }
        let deleted = repo.trim_stopped(2).unwrap();
        assert_eq!(deleted, 3);
    }
}
