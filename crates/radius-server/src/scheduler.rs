// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Job Scheduler (C8): single-threaded periodic job executor. Each job
//! gets its own `tokio::time::interval` tick inside one `select!` loop so
//! jobs never interleave (`max_instances=1`), and a late tick coalesces
//! into a single run rather than firing a backlog.

use crate::app_state::AppState;
use crate::jobs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

const MISFIRE_GRACE: Duration = Duration::from_secs(60);

struct Job {
    name: &'static str,
    interval: Duration,
    run: fn(&AppState),
}

pub struct Scheduler {
    state: Arc<AppState>,
    shutdown: Arc<tokio::sync::Notify>,
}

impl Scheduler {
    pub fn new(state: Arc<AppState>, shutdown: Arc<tokio::sync::Notify>) -> Self {
        Self { state, shutdown }
    }

    fn jobs(&self) -> Vec<Job> {
        let config = &self.state.config;
        vec![
            Job {
                name: "flush_session_buffer",
                interval: Duration::from_secs(config.session_buffer_flush_interval),
                run: jobs::flush_session_buffer,
            },
            Job {
                name: "reap_dead_sessions",
                interval: Duration::from_secs(config.dead_session_cleanup_interval),
                run: jobs::reap_dead_sessions,
            },
            Job {
                name: "trim_inactive_sessions",
                interval: Duration::from_secs(config.inactive_session_cleanup_interval),
                run: jobs::trim_inactive_sessions,
            },
            Job {
                name: "apply_log_retention",
                interval: Duration::from_secs(config.log_retention_interval),
                run: jobs::apply_log_retention,
            },
            Job {
                name: "sample_server_sessions",
                interval: Duration::from_secs(config.stats_sample_interval),
                run: jobs::sample_server_sessions,
            },
            Job {
                name: "sample_server_traffic",
                interval: Duration::from_secs(config.stats_sample_interval),
                run: jobs::sample_server_traffic,
            },
            Job {
                name: "sample_user_sessions",
                interval: Duration::from_secs(config.stats_sample_interval),
                run: jobs::sample_user_sessions,
            },
            Job {
                name: "sample_user_traffic",
                interval: Duration::from_secs(config.stats_sample_interval),
                run: jobs::sample_user_traffic,
            },
        ]
    }

    /// Run every job's ticker on one executor until shutdown is signaled.
    /// On shutdown, perform a final synchronous Session Buffer flush.
    pub async fn run(&self) {
        let jobs = self.jobs();
        let mut tickers: Vec<_> = jobs
            .iter()
            .map(|job| {
                let mut ticker = interval(job.interval);
                // A late tick coalesces into exactly one run instead of
                // firing once per missed period.
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            })
            .collect();

        info!(count = jobs.len(), "scheduler started");

        loop {
            let fired = tokio::select! {
                (index, _, _) = select_any(&mut tickers) => Some(index),
                _ = self.shutdown.notified() => None,
            };

            match fired {
                Some(index) => {
                    let job = &jobs[index];
                    let started = std::time::Instant::now();
                    (job.run)(&self.state);
                    let elapsed = started.elapsed();
                    if elapsed > MISFIRE_GRACE {
                        warn!(job = job.name, ?elapsed, "job run exceeded misfire grace");
                    }
                }
                None => break,
            }
        }

        info!("scheduler shutting down, performing final flush");
        self.state.buffer.shutdown(&self.state.db);
    }
}

/// Poll every ticker and return the index of whichever fires first, Rust's
/// `futures::future::select_all` reimplemented with `tokio::time::Interval`
/// to avoid pulling in the `futures` crate for one call site.
async fn select_any(tickers: &mut [tokio::time::Interval]) -> (usize, (), ()) {
    use std::future::poll_fn;
    use std::task::Poll;

    poll_fn(|cx| {
        for (index, ticker) in tickers.iter_mut().enumerate() {
            if ticker.poll_tick(cx).is_ready() {
                return Poll::Ready((index, (), ()));
            }
        }
        Poll::Pending
    })
    .await
}
