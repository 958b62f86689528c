//! Tracking commands: record, set, identify, alias and reset.
//!
//! Each command enqueues through the tracker, then waits briefly for the
//! queue to drain so one-shot invocations still deliver when online.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;

use trk_client::Tracker;
use trk_core::PropertyBag;

use crate::Config;
use crate::session::{FlushOutcome, Session};

/// A tracking call to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackAction {
    Event {
        name: String,
        properties: Vec<(String, String)>,
    },
    Set {
        properties: Vec<(String, String)>,
    },
    Identify {
        identity: String,
    },
    Alias {
        first: String,
        second: String,
    },
    Reset,
}

impl TrackAction {
    /// Applies the action to `tracker`.
    pub fn apply(&self, tracker: &Tracker) {
        match self {
            Self::Event { name, properties } => {
                tracker.record_event(name, &properties.iter().cloned().collect::<PropertyBag>());
            }
            Self::Set { properties } => {
                tracker.set_properties(&properties.iter().cloned().collect::<PropertyBag>());
            }
            Self::Identify { identity } => tracker.identify(identity),
            Self::Alias { first, second } => tracker.alias(first, second),
            Self::Reset => tracker.clear_identity(),
        }
    }
}

/// Runs a tracking command and reports the queue state.
pub fn run<W: Write>(writer: &mut W, config: &Config, action: &TrackAction) -> Result<()> {
    let session = Session::open(config)?;
    let before = session.tracker().pending_len();
    action.apply(session.tracker());
    let queued = session.tracker().pending_len().saturating_sub(before);
    tracing::debug!(?action, queued, "tracking command applied");

    if matches!(action, TrackAction::Reset) {
        writeln!(writer, "Identity: {}", session.tracker().identity())?;
    }

    let timeout = if config.offline {
        Duration::ZERO
    } else {
        config.flush_timeout()
    };
    let outcome = session.flush(timeout);
    report(writer, outcome)
}

pub(crate) fn report<W: Write>(writer: &mut W, outcome: FlushOutcome) -> Result<()> {
    if outcome.drained {
        writeln!(writer, "All requests delivered.")?;
    } else {
        writeln!(writer, "Pending: {}", outcome.pending)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use trk_store::{Database, QueueStore};

    fn offline_config(temp: &tempfile::TempDir) -> Config {
        Config {
            database_path: temp.path().join("trk.db"),
            api_key: Some("key123".to_string()),
            offline: true,
            ..Config::default()
        }
    }

    #[test]
    fn event_command_queues_request() {
        let temp = tempfile::tempdir().unwrap();
        let config = offline_config(&temp);
        let action = TrackAction::Event {
            name: "Opened".to_string(),
            properties: vec![("screen".to_string(), "home page".to_string())],
        };

        let mut output = Vec::new();
        run(&mut output, &config, &action).unwrap();

        // First run also queues the device profile.
        let mut db = Database::open(&config.database_path).unwrap();
        let queue = db.load_queue().unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue[0].contains("/s?"));
        assert!(queue[1].contains("/e?"));
        assert!(queue[1].ends_with("&_n=Opened&screen=home%20page"));

        assert_snapshot!(String::from_utf8(output).unwrap(), @"Pending: 2");
    }

    #[test]
    fn empty_event_name_is_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let config = offline_config(&temp);
        let action = TrackAction::Event {
            name: String::new(),
            properties: Vec::new(),
        };

        let mut output = Vec::new();
        run(&mut output, &config, &action).unwrap();

        let mut db = Database::open(&config.database_path).unwrap();
        assert_eq!(db.load_queue().unwrap().len(), 1);
    }

    #[test]
    fn reset_prints_new_identity() {
        let temp = tempfile::tempdir().unwrap();
        let config = offline_config(&temp);

        let mut output = Vec::new();
        run(&mut output, &config, &TrackAction::Reset).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Identity: "));
    }

    #[test]
    fn report_when_drained() {
        let mut output = Vec::new();
        report(
            &mut output,
            FlushOutcome {
                drained: true,
                pending: 0,
            },
        )
        .unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"All requests delivered.");
    }
}
