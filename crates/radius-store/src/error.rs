// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Store error types.

use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// The underlying SQLite connection returned an error.
    Database(rusqlite::Error),
    /// A row was expected but not found.
    NotFound(String),
    /// A uniqueness or shape constraint was violated by the caller.
    Conflict(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "database error: {e}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Conflict(s) => write!(f, "conflict: {s}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e)
    }
}
