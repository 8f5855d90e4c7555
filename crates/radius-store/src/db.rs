// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared SQLite connection and schema.

use crate::error::StoreError;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Thread-safe handle to a single SQLite connection, shared by every
/// repository in this crate. `rusqlite::Connection` is not `Sync`, so
/// access goes through a mutex exactly as the teacher's `SqliteStore` does.
pub struct Db {
    conn: Mutex<Connection>,
}

impl Db {
    /// Open (or create) a file-backed database and initialize its schema.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// An in-memory database, used pervasively by the test suite.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nas_clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                shared_secret BLOB NOT NULL,
                auth_port INTEGER NOT NULL,
                acct_port INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(identifier, ip_address)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nas_ip ON nas_clients(ip_address)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS radius_users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                max_concurrent_sessions INTEGER NOT NULL DEFAULT 0,
                expiration_date TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                allowed_traffic INTEGER,
                rx_traffic INTEGER NOT NULL DEFAULT 0,
                tx_traffic INTEGER NOT NULL DEFAULT 0,
                total_traffic INTEGER NOT NULL DEFAULT 0,
                current_sessions INTEGER NOT NULL DEFAULT 0,
                remaining_sessions INTEGER NOT NULL DEFAULT 0,
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS radius_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                username TEXT NOT NULL,
                nas_identifier TEXT,
                nas_ip_address TEXT NOT NULL,
                framed_ip_address TEXT,
                calling_station_id TEXT,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                stop_time TEXT,
                session_time INTEGER NOT NULL DEFAULT 0,
                input_octets INTEGER NOT NULL DEFAULT 0,
                output_octets INTEGER NOT NULL DEFAULT 0,
                input_packets INTEGER NOT NULL DEFAULT 0,
                output_packets INTEGER NOT NULL DEFAULT 0,
                terminate_cause INTEGER,
                UNIQUE(session_id, nas_ip_address)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_username ON radius_sessions(username)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_status ON radius_sessions(status)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_nas_ip ON radius_sessions(nas_ip_address)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS log_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                level TEXT NOT NULL,
                logger TEXT NOT NULL,
                message TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS stats_server_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                active_sessions INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS stats_server_traffic (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                rx_traffic INTEGER NOT NULL,
                tx_traffic INTEGER NOT NULL,
                total_traffic INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS stats_user_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                username TEXT NOT NULL,
                active_sessions INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS stats_user_traffic (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                username TEXT NOT NULL,
                rx_traffic INTEGER NOT NULL,
                tx_traffic INTEGER NOT NULL,
                total_traffic INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }
}
