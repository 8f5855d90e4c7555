// SPDX-License-Identifier: Apache-2.0 OR MIT

//! SQLite-backed persistence for the RADIUS core: NAS clients, users,
//! sessions, operational logs, and time-series stats snapshots.

pub mod db;
pub mod error;
pub mod log;
pub mod nas;
pub mod session;
pub mod stats;
pub mod user;

pub use db::Db;
pub use error::StoreError;
pub use log::{LogEntry, LogRepository};
pub use nas::{NasClient, NasRepository};
pub use session::{Counters, RadiusSession, SessionRepository, SessionStatus, StartFields};
pub use stats::StatsRepository;
pub use user::{RadiusUser, UserRepository, UserStatus};
