// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bridges the `tracing` event stream into the log store so the
//! log-retention job has real rows to prune.

use radius_store::{Db, LogRepository};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// A `tracing_subscriber::Layer` that writes every event through
/// [`LogRepository::insert`] on its own database connection, independent of
/// whatever connection `AppState` uses.
pub struct StoreLogLayer {
    db: Db,
}

impl StoreLogLayer {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl<S: Subscriber> Layer<S> for StoreLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageVisitor::default();
        event.record(&mut message);

        let repo = LogRepository::new(&self.db);
        if let Err(e) = repo.insert(
            event.metadata().level().as_str(),
            event.metadata().target(),
            &message.0,
        ) {
            eprintln!("failed to persist log entry: {e}");
        }
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}
