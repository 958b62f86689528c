//! Device platform profile.
//!
//! The profile is persisted next to the identity. When the stored version
//! differs from the running one (first run, OS upgrade) the profile is sent
//! again as a property-set call.

use std::collections::BTreeMap;

use sysinfo::System;

use crate::properties::PropertyBag;

/// Preference key for the platform name.
pub const KEY_SYSTEM_NAME: &str = "systemName";
/// Preference key for the platform version.
pub const KEY_SYSTEM_VERSION: &str = "systemVersion";

const UNKNOWN: &str = "unknown";

/// Platform name and version of the running device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub system_name: String,
    pub system_version: String,
}

impl DeviceProfile {
    pub fn new(system_name: impl Into<String>, system_version: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            system_version: system_version.into(),
        }
    }

    /// Reads the profile of the host operating system.
    pub fn current() -> Self {
        let system_name = System::name()
            .map_or_else(|| std::env::consts::OS.to_string(), |name| name.to_lowercase());
        let system_version = System::os_version().unwrap_or_else(|| {
            tracing::debug!("operating system version unavailable");
            UNKNOWN.to_string()
        });
        Self {
            system_name,
            system_version,
        }
    }

    /// Whether the stored preferences lack this profile's version.
    ///
    /// Only the version is compared; a platform rename alone does not
    /// trigger a resend.
    pub fn needs_resend(&self, stored: &BTreeMap<String, String>) -> bool {
        stored.get(KEY_SYSTEM_VERSION) != Some(&self.system_version)
    }

    /// The profile as preference entries.
    pub fn entries(&self) -> [(&'static str, &str); 2] {
        [
            (KEY_SYSTEM_NAME, self.system_name.as_str()),
            (KEY_SYSTEM_VERSION, self.system_version.as_str()),
        ]
    }

    /// The profile as properties to send.
    pub fn to_properties(&self) -> PropertyBag {
        self.entries().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn resend_when_nothing_stored() {
        let profile = DeviceProfile::new("linux", "6.1");
        assert!(profile.needs_resend(&BTreeMap::new()));
    }

    #[test]
    fn resend_when_only_identity_stored() {
        let profile = DeviceProfile::new("linux", "6.1");
        assert!(profile.needs_resend(&stored(&[("identity", "u1")])));
    }

    #[test]
    fn resend_after_upgrade() {
        let profile = DeviceProfile::new("linux", "6.2");
        assert!(profile.needs_resend(&stored(&[
            ("systemName", "linux"),
            ("systemVersion", "6.1"),
        ])));
    }

    #[test]
    fn no_resend_when_version_matches() {
        let profile = DeviceProfile::new("linux", "6.1");
        assert!(!profile.needs_resend(&stored(&[
            ("identity", "u1"),
            ("systemName", "linux"),
            ("systemVersion", "6.1"),
        ])));
    }

    #[test]
    fn properties_carry_name_and_version() {
        let bag = DeviceProfile::new("android", "14").to_properties();
        assert_eq!(bag.get(KEY_SYSTEM_NAME), Some("android"));
        assert_eq!(bag.get(KEY_SYSTEM_VERSION), Some("14"));
    }

    #[test]
    fn current_profile_is_populated() {
        let profile = DeviceProfile::current();
        assert!(!profile.system_name.is_empty());
        assert!(!profile.system_version.is_empty());
    }
}
