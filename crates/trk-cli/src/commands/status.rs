//! Status command for showing identity, device profile and queue size.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::Result;

use trk_client::KEY_IDENTITY;
use trk_core::DeviceProfile;
use trk_core::device::{KEY_SYSTEM_NAME, KEY_SYSTEM_VERSION};
use trk_store::{Database, PreferenceStore};

pub fn run<W: Write>(writer: &mut W, db: &mut Database, database_path: &Path) -> Result<()> {
    let preferences = db.load_preferences()?;
    let pending = db.pending_count()?;

    render(
        writer,
        database_path,
        &preferences,
        pending,
        &DeviceProfile::current(),
    )
}

fn render<W: Write>(
    writer: &mut W,
    database_path: &Path,
    preferences: &BTreeMap<String, String>,
    pending: usize,
    current: &DeviceProfile,
) -> Result<()> {
    writeln!(writer, "Tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(
        writer,
        "Identity: {}",
        preferences.get(KEY_IDENTITY).map_or("none", String::as_str)
    )?;

    match (
        preferences.get(KEY_SYSTEM_NAME),
        preferences.get(KEY_SYSTEM_VERSION),
    ) {
        (Some(name), Some(version)) => writeln!(writer, "Sent device: {name} {version}")?,
        _ => writeln!(writer, "Sent device: none")?,
    }
    writeln!(
        writer,
        "Current device: {} {}",
        current.system_name, current.system_version
    )?;
    if current.needs_resend(preferences) {
        writeln!(writer, "Device profile will be sent on next run.")?;
    }

    writeln!(writer, "Pending requests: {pending}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use trk_store::QueueStore;

    fn device() -> DeviceProfile {
        DeviceProfile::new("linux", "6.1")
    }

    #[test]
    fn status_on_fresh_database() {
        let mut output = Vec::new();
        render(
            &mut output,
            Path::new("/data/trk.db"),
            &BTreeMap::new(),
            0,
            &device(),
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Tracker status
        Database: /data/trk.db
        Identity: none
        Sent device: none
        Current device: linux 6.1
        Device profile will be sent on next run.
        Pending requests: 0
        ");
    }

    #[test]
    fn status_with_stored_identity_and_profile() {
        let preferences: BTreeMap<String, String> = [
            (KEY_IDENTITY, "user@example.com"),
            (KEY_SYSTEM_NAME, "linux"),
            (KEY_SYSTEM_VERSION, "6.1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut output = Vec::new();
        render(
            &mut output,
            Path::new("/data/trk.db"),
            &preferences,
            3,
            &device(),
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Tracker status
        Database: /data/trk.db
        Identity: user@example.com
        Sent device: linux 6.1
        Current device: linux 6.1
        Pending requests: 3
        ");
    }

    #[test]
    fn status_command_reads_database() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("trk.db");
        let mut db = Database::open(&db_path).unwrap();
        db.save_preferences(&[(KEY_IDENTITY, "anon-1")]).unwrap();
        db.save_queue(&["https://trk.kissmetrics.com/e?_k=k".to_string()])
            .unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut db, &db_path).unwrap();

        let output = String::from_utf8(output).unwrap();
        let output = output.replace(&db_path.display().to_string(), "[TEMP]/trk.db");
        assert!(output.contains("Database: [TEMP]/trk.db\n"));
        assert!(output.contains("Identity: anon-1\n"));
        assert!(output.ends_with("Pending requests: 1\n"));
    }
}
