//! Flush command for delivering everything left in the queue.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;

use crate::Config;
use crate::commands::track::report;
use crate::session::Session;

/// Runs the flush command, waiting up to `timeout` (or the configured default).
pub fn run<W: Write>(writer: &mut W, config: &Config, timeout: Option<Duration>) -> Result<()> {
    let session = Session::open(config)?;
    let pending = session.tracker().pending_len();
    if config.offline && pending > 0 {
        tracing::warn!(pending, "offline mode is enabled; nothing will be delivered");
    }

    let outcome = session.flush(timeout.unwrap_or_else(|| config.flush_timeout()));
    tracing::debug!(?outcome, "flush finished");
    report(writer, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_offline_reports_pending() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("trk.db"),
            api_key: Some("key123".to_string()),
            offline: true,
            ..Config::default()
        };

        let mut output = Vec::new();
        run(&mut output, &config, Some(Duration::ZERO)).unwrap();

        // The first run queues the device profile, which cannot leave offline.
        assert_eq!(String::from_utf8(output).unwrap(), "Pending: 1\n");
    }

    #[test]
    fn flush_requires_api_key() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("trk.db"),
            api_key: None,
            ..Config::default()
        };

        let mut output = Vec::new();
        let err = run(&mut output, &config, None).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }
}
