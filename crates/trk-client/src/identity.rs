//! Identity and device-profile bootstrap.

use std::collections::BTreeMap;

use trk_core::{DeviceProfile, Identity, PropertyBag};
use trk_store::PreferenceStore;

/// Preference key holding the active identity.
pub const KEY_IDENTITY: &str = "identity";

/// State recovered from the preference store at construction.
#[derive(Debug)]
pub(crate) struct Bootstrap {
    pub(crate) identity: Identity,
    /// Properties to send because the device profile is new or changed.
    pub(crate) profile_update: Option<PropertyBag>,
}

/// Loads the identity and decides whether the device profile must be sent.
///
/// A missing or unreadable identity is replaced by a fresh random one. When
/// the stored platform version differs from `device`, the profile is stored
/// and returned together with `initial_properties` for sending.
pub(crate) fn bootstrap<S: PreferenceStore + ?Sized>(
    store: &mut S,
    device: &DeviceProfile,
    initial_properties: &PropertyBag,
) -> Bootstrap {
    let preferences = store.load_preferences().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load preferences; using defaults");
        BTreeMap::new()
    });

    let identity = match preferences
        .get(KEY_IDENTITY)
        .and_then(|value| Identity::new(value.as_str()).ok())
    {
        Some(identity) => identity,
        None => {
            let identity = Identity::random();
            tracing::debug!("generated new identity");
            persist_identity(store, &identity);
            identity
        }
    };

    let profile_update = if device.needs_resend(&preferences) {
        tracing::debug!(
            system_name = %device.system_name,
            system_version = %device.system_version,
            "device profile changed"
        );
        if let Err(err) = store.save_preferences(&device.entries()) {
            tracing::warn!(error = %err, "failed to persist device profile");
        }
        let mut properties = device.to_properties();
        properties.extend_from(initial_properties);
        Some(properties)
    } else {
        None
    };

    Bootstrap {
        identity,
        profile_update,
    }
}

/// Writes `identity` as the active identity. Failures are logged.
pub(crate) fn persist_identity<S: PreferenceStore + ?Sized>(store: &mut S, identity: &Identity) {
    if let Err(err) = store.save_preferences(&[(KEY_IDENTITY, identity.as_str())]) {
        tracing::warn!(error = %err, "failed to persist identity");
    }
}
