// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared context injected into the dispatcher, both engines, and the
//! scheduler's jobs.

use crate::config::Config;
use crate::registry::NasRegistry;
use crate::session_buffer::SessionBuffer;
use radius_store::Db;
use std::sync::Arc;

pub struct AppState {
    pub db: Db,
    pub registry: NasRegistry,
    pub buffer: SessionBuffer,
    pub config: Config,
}

impl AppState {
    pub fn new(db: Db, config: Config) -> Arc<Self> {
        Arc::new(Self {
            db,
            registry: NasRegistry::new(),
            buffer: SessionBuffer::new(),
            config,
        })
    }
}
