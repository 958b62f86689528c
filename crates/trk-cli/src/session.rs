//! A tracker bound to the configured database for one command.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use trk_client::{Offline, Online, Tracker};
use trk_store::Database;

use crate::Config;

/// Queue state after waiting for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub drained: bool,
    pub pending: usize,
}

/// Owns the runtime that performs deliveries for a [`Tracker`].
pub struct Session {
    runtime: Runtime,
    tracker: Tracker,
}

impl Session {
    /// Opens the database and builds a tracker on a fresh runtime.
    ///
    /// Restoring the tracker already schedules delivery of anything left in
    /// the queue; it runs while [`Session::flush`] waits.
    pub fn open(config: &Config) -> Result<Self> {
        let tracker_config = config.tracker_config()?;

        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create database directory")?;
        }
        let db = Database::open(&config.database_path)
            .with_context(|| format!("failed to open {}", config.database_path.display()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        let builder = Tracker::builder(tracker_config)
            .store(db)
            .runtime(runtime.handle().clone());
        let builder = if config.offline {
            builder.connectivity(Offline)
        } else {
            builder.connectivity(Online)
        };
        let tracker = builder.build().context("failed to start tracker")?;
        tracing::debug!(?tracker, "tracker ready");

        Ok(Self { runtime, tracker })
    }

    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Drives deliveries until the queue is empty or `timeout` elapses.
    pub fn flush(&self, timeout: Duration) -> FlushOutcome {
        let drained = self.runtime.block_on(self.tracker.wait_idle(timeout));
        FlushOutcome {
            drained,
            pending: self.tracker.pending_len(),
        }
    }
}
