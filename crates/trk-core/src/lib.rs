//! Core domain logic for the tracking client.
//!
//! This crate contains the fundamental types and logic for:
//! - Validated identifiers: API key, identity, event name
//! - Property bags and their URL rendering
//! - Query encoding: turning tracking calls into request URLs
//! - Device profiles used to detect first run and platform upgrades

pub mod device;
pub mod properties;
pub mod query;
pub mod request;
pub mod types;

pub use device::DeviceProfile;
pub use properties::PropertyBag;
pub use query::{DEFAULT_HOST, EncodeError, Endpoint, QueryEncoder, encode_property_args};
pub use request::PendingRequest;
pub use types::{ApiKey, EventName, Identity, Scheme, ValidationError};
