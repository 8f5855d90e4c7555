// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Append-only time-series snapshots sampled periodically by the
//! scheduler's stats jobs.

use crate::db::Db;
use crate::error::StoreError;
use chrono::Utc;
use rusqlite::params;

pub struct StatsRepository<'a> {
    db: &'a Db,
}

impl<'a> StatsRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn sample_server_sessions(&self, active_sessions: i64) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO stats_server_sessions (timestamp, active_sessions) VALUES (?1, ?2)",
            params![Utc::now(), active_sessions],
        )?;
        Ok(())
    }

    pub fn sample_server_traffic(&self, rx_traffic: i64, tx_traffic: i64) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO stats_server_traffic (timestamp, rx_traffic, tx_traffic, total_traffic)
             VALUES (?1, ?2, ?3, ?4)",
            params![Utc::now(), rx_traffic, tx_traffic, rx_traffic + tx_traffic],
        )?;
        Ok(())
    }

    pub fn sample_user_sessions(&self, username: &str, active_sessions: i64) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO stats_user_sessions (timestamp, username, active_sessions) VALUES (?1, ?2, ?3)",
            params![Utc::now(), username, active_sessions],
        )?;
        Ok(())
    }

    pub fn sample_user_traffic(
        &self,
        username: &str,
        rx_traffic: i64,
        tx_traffic: i64,
    ) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO stats_user_traffic (timestamp, username, rx_traffic, tx_traffic, total_traffic)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![Utc::now(), username, rx_traffic, tx_traffic, rx_traffic + tx_traffic],
        )?;
        Ok(())
    }
}
