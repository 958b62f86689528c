//! Durable tracking client.
//!
//! Records events, property updates and identity links as request URLs, keeps
//! them in a persisted FIFO queue and delivers them one at a time whenever the
//! network is available.
//!
//! ```no_run
//! use trk_client::{Tracker, TrackerConfig};
//! use trk_core::{ApiKey, PropertyBag};
//! use trk_store::Database;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Database::open(std::path::Path::new("trk.db"))?;
//! let tracker = Tracker::builder(TrackerConfig::new(ApiKey::new("api-key")?))
//!     .store(store)
//!     .build()?;
//!
//! tracker.record_event("Signed Up", &PropertyBag::new().with("plan", "pro"));
//! tracker.identify("user@example.com");
//! # Ok(())
//! # }
//! ```

mod config;
mod connectivity;
mod identity;
mod queue;
mod tracker;
mod transport;

pub use config::{DEFAULT_SUCCESS_STATUSES, RetryPolicy, TrackerConfig};
pub use connectivity::{Connectivity, ConnectivityFlag, Offline, Online};
pub use identity::KEY_IDENTITY;
pub use tracker::{ClientError, Tracker, TrackerBuilder};
pub use transport::{DEFAULT_TIMEOUT, HttpTransport, Transport, TransportError};
