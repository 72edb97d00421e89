//! Geofix - location acquisition over native location platforms
//!
//! This library wraps a native location layer behind a small asynchronous
//! API: one-shot requests, continuous watches, permission and enablement
//! handling, status change notifications and geodesic distance.
//!
//! ```ignore
//! use geofix::{LocationService, RequestOptions};
//!
//! let service = LocationService::builder(platform, authorization, settings).build();
//! let fix = service
//!     .get_current_location(&RequestOptions::new().maximum_age(Duration::from_secs(10)))
//!     .await?;
//! println!("{}, {}", fix.latitude, fix.longitude);
//! ```

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fix;
pub mod gate;
pub mod options;
pub mod permission;
pub mod platform;
pub mod registry;
pub mod service;
pub mod simulated;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{LocationError, LocationResult};
pub use fix::{Fix, GeoKeys, NativeFix};
pub use options::RequestOptions;
pub use permission::{AppLifecycle, AuthorizationService, AuthorizationStatus, SettingsPrompt};
pub use platform::{PlatformKind, PlatformLocationProvider};
pub use registry::WatchHandle;
pub use service::{LocationService, LocationServiceBuilder};
pub use status::{StatusEvent, SubscriptionId};
